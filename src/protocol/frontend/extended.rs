//! Extended query protocol messages.

use crate::error::{Error, Result};
use crate::protocol::codec::MessageWriter;
use crate::protocol::types::{FormatCode, Oid};

/// Convert a list length to the Int16 count the wire format carries.
fn count(len: usize, what: &str) -> Result<i16> {
    i16::try_from(len).map_err(|_| {
        Error::InvalidUsage(format!("too many {}: {} (max {})", what, len, i16::MAX))
    })
}

/// Parse message: create a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parse {
    /// Statement name (empty string for unnamed statement)
    pub name: String,
    /// SQL query with $1, $2, ... placeholders
    pub query: String,
    /// Parameter type OIDs (0 = let server infer)
    pub param_oids: Vec<Oid>,
}

impl Parse {
    /// Parse into the unnamed statement, letting the server infer parameter types.
    pub fn unnamed(query: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            query: query.into(),
            param_oids: Vec::new(),
        }
    }

    /// Append the frame to `buf`.
    ///
    /// Fails without writing if there are more than `i16::MAX` parameter types.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut msg = MessageWriter::tagged(super::msg_type::PARSE);
        msg.write_cstr(&self.name);
        msg.write_cstr(&self.query);
        msg.write_i16(count(self.param_oids.len(), "parameter types")?);
        for &oid in &self.param_oids {
            msg.write_i32(oid as i32);
        }
        msg.finish_into(buf);
        Ok(())
    }
}

/// Bind message: create a portal from a prepared statement.
///
/// A `None` parameter is SQL NULL and is sent as length `-1` with no bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bind {
    /// Portal name (empty string for unnamed portal)
    pub portal: String,
    /// Statement name
    pub statement: String,
    /// Parameter format codes (empty = all text, one = applies to all)
    pub param_formats: Vec<FormatCode>,
    /// Raw parameter values
    pub params: Vec<Option<Vec<u8>>>,
    /// Result column format codes (empty = all text, one = applies to all)
    pub result_formats: Vec<FormatCode>,
}

impl Bind {
    /// Append the frame to `buf`.
    ///
    /// Fails without writing if any list is longer than `i16::MAX` or a
    /// parameter value is longer than `i32::MAX` bytes.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut msg = MessageWriter::tagged(super::msg_type::BIND);

        msg.write_cstr(&self.portal);
        msg.write_cstr(&self.statement);

        msg.write_i16(count(self.param_formats.len(), "parameter formats")?);
        for &fmt in &self.param_formats {
            msg.write_i16(fmt as i16);
        }

        msg.write_i16(count(self.params.len(), "parameters")?);
        for param in &self.params {
            match param {
                Some(bytes) => {
                    let len = i32::try_from(bytes.len()).map_err(|_| {
                        Error::InvalidUsage(format!("parameter too large: {} bytes", bytes.len()))
                    })?;
                    msg.write_i32(len);
                    msg.write_bytes(bytes);
                }
                None => {
                    msg.write_i32(-1);
                }
            }
        }

        msg.write_i16(count(self.result_formats.len(), "result formats")?);
        for &fmt in &self.result_formats {
            msg.write_i16(fmt as i16);
        }

        msg.finish_into(buf);
        Ok(())
    }
}

/// What a Describe message asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeTarget {
    Statement,
    Portal,
}

impl DescribeTarget {
    pub fn as_byte(self) -> u8 {
        match self {
            DescribeTarget::Statement => b'S',
            DescribeTarget::Portal => b'P',
        }
    }
}

/// Describe message: request metadata for a statement or portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Describe {
    pub target: DescribeTarget,
    pub name: String,
}

impl Describe {
    pub fn portal(name: impl Into<String>) -> Self {
        Self {
            target: DescribeTarget::Portal,
            name: name.into(),
        }
    }

    pub fn statement(name: impl Into<String>) -> Self {
        Self {
            target: DescribeTarget::Statement,
            name: name.into(),
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageWriter::tagged(super::msg_type::DESCRIBE);
        msg.write_u8(self.target.as_byte());
        msg.write_cstr(&self.name);
        msg.finish_into(buf);
    }
}

/// Execute message: run a portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execute {
    /// Portal name
    pub portal: String,
    /// Maximum number of rows to return (0 = unlimited)
    pub max_rows: i32,
}

impl Execute {
    pub fn new(portal: impl Into<String>, max_rows: i32) -> Self {
        Self {
            portal: portal.into(),
            max_rows,
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageWriter::tagged(super::msg_type::EXECUTE);
        msg.write_cstr(&self.portal);
        msg.write_i32(self.max_rows);
        msg.finish_into(buf);
    }
}

/// Write a Sync message.
///
/// This ends an extended query sequence and causes:
/// - Implicit COMMIT if successful and not in explicit transaction
/// - Implicit ROLLBACK if failed and not in explicit transaction
/// - Server responds with ReadyForQuery
pub fn write_sync(buf: &mut Vec<u8>) {
    MessageWriter::tagged(super::msg_type::SYNC).finish_into(buf);
}

/// Write a Flush message.
///
/// Forces the server to send all pending responses without waiting for Sync.
pub fn write_flush(buf: &mut Vec<u8>) {
    MessageWriter::tagged(super::msg_type::FLUSH).finish_into(buf);
}
