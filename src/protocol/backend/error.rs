//! Error and notice response messages.

use crate::error::{Error, ErrorFields, Result};
use crate::protocol::codec::Reader;

/// Parse a `(field code, string)*` sequence terminated by a zero field code.
fn parse_fields(payload: &[u8]) -> Result<ErrorFields> {
    let mut fields = ErrorFields::new();
    let mut r = Reader::new(payload);

    loop {
        let field_type = r.read_u8()?;
        if field_type == 0 {
            break;
        }
        let value = r.read_cstr()?;
        fields.insert(field_type as char, value);
    }

    Ok(fields)
}

/// ErrorResponse message - the server rejected the current operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub fields: ErrorFields,
}

impl ErrorResponse {
    /// Parse an ErrorResponse message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(Self {
            fields: parse_fields(payload)?,
        })
    }

    /// Convert to an Error.
    pub fn into_error(self) -> Error {
        Error::Server(self.fields)
    }

    pub fn code(&self) -> Option<&str> {
        self.fields.code()
    }

    pub fn message(&self) -> Option<&str> {
        self.fields.message()
    }

    pub fn severity(&self) -> Option<&str> {
        self.fields.severity()
    }
}

/// NoticeResponse message - non-fatal warning/info from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeResponse {
    pub fields: ErrorFields,
}

impl NoticeResponse {
    /// Parse a NoticeResponse message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(Self {
            fields: parse_fields(payload)?,
        })
    }

    pub fn message(&self) -> Option<&str> {
        self.fields.message()
    }

    pub fn severity(&self) -> Option<&str> {
        self.fields.severity()
    }
}
