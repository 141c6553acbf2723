//! Observability sink for connection-level events.
//!
//! Notices, unexpected messages and parameter changes are never failures;
//! they are reported to the [`EventSink`] attached to the connection.

use crate::error::ErrorFields;
use crate::protocol::backend::MessageKind;

/// Receiver of non-fatal connection events.
pub trait EventSink: Send {
    /// A NoticeResponse arrived (diagnostic).
    fn notice(&mut self, fields: &ErrorFields);

    /// A message arrived that the active operation has no handler for (warning).
    ///
    /// `active` is false when no operation was active at all.
    fn unexpected(&mut self, kind: MessageKind, active: bool);

    /// The server reported a parameter value.
    fn parameter_status(&mut self, _name: &str, _value: &str) {}

    /// An ErrorResponse arrived after its operation had already resolved.
    ///
    /// No caller will see this error, so the default logs it.
    fn late_error(&mut self, fields: &ErrorFields) {
        tracing::warn!(
            severity = fields.severity().unwrap_or(""),
            code = fields.code().unwrap_or(""),
            "server error after operation completed: {}",
            fields.message().unwrap_or("")
        );
    }
}

/// Sink that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notice(&mut self, fields: &ErrorFields) {
        tracing::info!(
            severity = fields.severity().unwrap_or(""),
            code = fields.code().unwrap_or(""),
            "server notice: {}",
            fields.message().unwrap_or("")
        );
    }

    fn unexpected(&mut self, kind: MessageKind, active: bool) {
        if active {
            tracing::warn!("unhandled {} for the active operation", kind);
        } else {
            tracing::warn!("unexpected {} with no active operation", kind);
        }
    }

    fn parameter_status(&mut self, name: &str, value: &str) {
        tracing::debug!("parameter status {} = {}", name, value);
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropSink;

impl EventSink for DropSink {
    fn notice(&mut self, _fields: &ErrorFields) {}

    fn unexpected(&mut self, _kind: MessageKind, _active: bool) {}

    fn late_error(&mut self, _fields: &ErrorFields) {}
}
