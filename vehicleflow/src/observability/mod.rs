//! Observability: stage timing, run traces, and log subscriber setup.

mod subscriber;
mod trace;

pub use subscriber::{init_tracing, LogFormat};
pub use trace::{RunTrace, StageTiming, StageTimer};
