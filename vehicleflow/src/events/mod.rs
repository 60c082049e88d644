//! Run lifecycle events and the sinks that receive them.

mod event;
mod sink;

pub use event::{EventKind, PipelineEvent};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
