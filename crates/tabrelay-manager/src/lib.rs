//! Tab memory manager — reclaims memory from background browser tabs.
//!
//! Reads the collector's tab snapshot, joins each tab with its renderer
//! process and resident memory, and kills renderers selected by the
//! configured strategy. Every cycle writes a per-tab usage report.

pub mod config;
pub mod manager;
pub mod process;
pub mod snapshot;
pub mod strategy;

pub use config::{ManagerConfig, Strategy};
pub use manager::{CycleReport, TabMemoryManager};
pub use process::{MemoryProcessTable, ProcessTable, RendererProcess, SystemProcessTable};
pub use snapshot::TabRecord;
pub use strategy::{KillDecision, KillReason, MemoryPolicy, TabUsage};
