//! Tab collector — receives tab report payloads and keeps the latest snapshot on disk.

pub mod routes;
pub mod state;

pub use routes::{build_router, serve};
pub use state::CollectorState;
