//! Error types for pg-wire-client.

use std::collections::BTreeMap;

use thiserror::Error;

/// Result type for pg-wire-client operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error/notice field codes from the PostgreSQL protocol.
pub mod field_type {
    /// Severity (localized)
    pub const SEVERITY: u8 = b'S';
    /// Severity (non-localized, PostgreSQL 9.6+)
    pub const SEVERITY_NON_LOCALIZED: u8 = b'V';
    /// SQLSTATE code
    pub const CODE: u8 = b'C';
    /// Message
    pub const MESSAGE: u8 = b'M';
    /// Detail
    pub const DETAIL: u8 = b'D';
    /// Hint
    pub const HINT: u8 = b'H';
    /// Position in query
    pub const POSITION: u8 = b'P';
    /// Where (context)
    pub const WHERE: u8 = b'W';
    /// Table name
    pub const TABLE: u8 = b't';
    /// Column name
    pub const COLUMN: u8 = b'c';
    /// Constraint name
    pub const CONSTRAINT: u8 = b'n';
}

/// Fields of an ErrorResponse or NoticeResponse, keyed by their one-byte field code.
///
/// Every field the server sent is kept, including codes this crate has no accessor for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorFields {
    fields: BTreeMap<char, String>,
}

impl ErrorFields {
    /// Create an empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value for the same code.
    pub fn insert(&mut self, code: char, value: impl Into<String>) {
        self.fields.insert(code, value.into());
    }

    /// Look up a field by its code character (e.g. `'S'`, `'M'`).
    pub fn get(&self, code: char) -> Option<&str> {
        self.fields.get(&code).map(String::as_str)
    }

    /// Iterate over `(code, value)` pairs in code order.
    pub fn iter(&self) -> impl Iterator<Item = (char, &str)> {
        self.fields.iter().map(|(code, value)| (*code, value.as_str()))
    }

    /// Number of fields present.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if no fields are present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Severity: ERROR, FATAL, PANIC, WARNING, NOTICE, DEBUG, INFO, LOG
    pub fn severity(&self) -> Option<&str> {
        self.get(field_type::SEVERITY as char)
    }

    /// Non-localized severity, falling back to the localized one.
    pub fn severity_non_localized(&self) -> Option<&str> {
        self.get(field_type::SEVERITY_NON_LOCALIZED as char)
            .or_else(|| self.severity())
    }

    /// SQLSTATE error code (5 characters)
    pub fn code(&self) -> Option<&str> {
        self.get(field_type::CODE as char)
    }

    /// Primary message
    pub fn message(&self) -> Option<&str> {
        self.get(field_type::MESSAGE as char)
    }

    /// Detailed explanation
    pub fn detail(&self) -> Option<&str> {
        self.get(field_type::DETAIL as char)
    }

    /// Suggestion for fixing the error
    pub fn hint(&self) -> Option<&str> {
        self.get(field_type::HINT as char)
    }

    /// Cursor position in the query string (1-based)
    pub fn position(&self) -> Option<u32> {
        self.get(field_type::POSITION as char)
            .and_then(|p| p.parse().ok())
    }
}

impl FromIterator<(char, String)> for ErrorFields {
    fn from_iter<I: IntoIterator<Item = (char, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for ErrorFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(severity) = self.severity() {
            write!(f, "{}: ", severity)?;
        }
        if let Some(message) = self.message() {
            write!(f, "{}", message)?;
        }
        if let Some(code) = self.code() {
            write!(f, " (SQLSTATE {})", code)?;
        }
        if let Some(detail) = self.detail() {
            write!(f, "\nDETAIL: {}", detail)?;
        }
        if let Some(hint) = self.hint() {
            write!(f, "\nHINT: {}", hint)?;
        }
        Ok(())
    }
}

/// Error type for pg-wire-client.
#[derive(Debug, Error)]
pub enum Error {
    /// Server error response
    #[error("PostgreSQL error: {0}")]
    Server(ErrorFields),

    /// Protocol error (malformed frame, unknown tag, out-of-order message, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value decoding failed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Connection is broken and cannot be reused
    #[error("Connection is broken")]
    ConnectionBroken,

    /// Invalid usage (e.g., malformed connection URL)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Unsupported feature (e.g., password authentication)
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl From<core::convert::Infallible> for Error {
    fn from(never: core::convert::Infallible) -> Self {
        match never {}
    }
}

impl Error {
    /// Returns true if the error indicates the connection is broken and cannot be reused.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Error::Io(_) | Error::ConnectionBroken | Error::Protocol(_) => true,
            Error::Server(fields) => {
                // FATAL and PANIC errors indicate connection is broken
                matches!(fields.severity(), Some("FATAL") | Some("PANIC"))
            }
            _ => false,
        }
    }

    /// Get the SQLSTATE code if this is a server error.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(fields) => fields.code(),
            _ => None,
        }
    }

    /// Get the server-reported fields if this is a server error.
    pub fn server_fields(&self) -> Option<&ErrorFields> {
        match self {
            Error::Server(fields) => Some(fields),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ErrorFields {
        [
            ('S', "ERROR".to_string()),
            ('C', "42P01".to_string()),
            ('M', "relation \"nope\" does not exist".to_string()),
            ('P', "15".to_string()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_accessors() {
        let fields = sample();
        assert_eq!(fields.severity(), Some("ERROR"));
        assert_eq!(fields.severity_non_localized(), Some("ERROR"));
        assert_eq!(fields.code(), Some("42P01"));
        assert_eq!(fields.position(), Some(15));
        assert_eq!(fields.hint(), None);
        assert_eq!(fields.len(), 4);
    }

    #[test]
    fn test_display() {
        let fields = sample();
        assert_eq!(
            fields.to_string(),
            "ERROR: relation \"nope\" does not exist (SQLSTATE 42P01)"
        );
    }

    #[test]
    fn test_connection_broken() {
        assert!(!Error::Server(sample()).is_connection_broken());

        let mut fatal = sample();
        fatal.insert('S', "FATAL");
        assert!(Error::Server(fatal).is_connection_broken());
        assert!(Error::ConnectionBroken.is_connection_broken());
        assert!(!Error::Decode("x".into()).is_connection_broken());
    }

    #[test]
    fn test_sqlstate() {
        assert_eq!(Error::Server(sample()).sqlstate(), Some("42P01"));
        assert_eq!(Error::ConnectionBroken.sqlstate(), None);
    }
}
