//! Structured logging for stateforge.
//!
//! Subscriber setup with console and rolling NDJSON output, redaction of
//! failure messages, and the load-event log emitted by the plugins.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogger, LoadEvent, LoadEventEntry, RejectReason};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
