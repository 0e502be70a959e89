//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Monotonic counters
//! - Begin/complete tracing of units of work
//!
//! Observability is read-only: nothing here can fail an operation.
//!
//! ```ignore
//! use searchmap::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::IndexActivated, &[("index", "records-jobs-v2")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_indexes_activated();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_failure() {
        Severity::Error
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

/// Log a lifecycle event at WARN
pub fn warn_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(Severity::Warn, event.as_str(), fields);
}
