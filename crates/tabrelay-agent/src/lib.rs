//! Tab reporter — relays browser tab lifecycle events to a local collector.
//!
//! On every qualifying tab event, and on a fixed heartbeat, the reporter
//! enumerates all open tabs, attaches each tab's host process id, and POSTs
//! the whole snapshot as JSON.

pub mod agent;
pub mod host;
pub mod reporter;
pub mod sink;
pub mod types;

pub use agent::Agent;
pub use host::{MemoryHost, TabHost};
pub use reporter::{ReporterStats, TabReporter};
pub use sink::{Delivery, HttpSink, ReportSink};
pub use types::*;
