//! Authentication and session-level backend messages.

use crate::error::{Error, Result};
use crate::protocol::codec::Reader;
use crate::protocol::types::TransactionStatus;

/// Authentication method codes.
pub mod auth_type {
    pub const OK: i32 = 0;
    pub const KERBEROS_V5: i32 = 2;
    pub const CLEARTEXT_PASSWORD: i32 = 3;
    pub const MD5_PASSWORD: i32 = 5;
    pub const GSS: i32 = 7;
    pub const SSPI: i32 = 9;
    pub const SASL: i32 = 10;
}

fn auth_method_name(code: i32) -> &'static str {
    match code {
        auth_type::KERBEROS_V5 => "Kerberos V5",
        auth_type::CLEARTEXT_PASSWORD => "cleartext password",
        auth_type::MD5_PASSWORD => "MD5 password",
        auth_type::GSS => "GSSAPI",
        auth_type::SSPI => "SSPI",
        auth_type::SASL => "SASL",
        _ => "unknown",
    }
}

/// Authentication message from the server.
///
/// Only `AuthenticationOk` is accepted; every other method fails to decode
/// with [`Error::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
    /// Authentication successful
    Ok,
}

impl Authentication {
    /// Parse an Authentication message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let code = Reader::new(payload).read_i32()?;
        match code {
            auth_type::OK => Ok(Authentication::Ok),
            _ => Err(Error::Unsupported(format!(
                "authentication method {} ({})",
                auth_method_name(code),
                code
            ))),
        }
    }
}

/// BackendKeyData message - contains process ID and secret key for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendKeyData {
    /// Process ID of the backend
    pub pid: i32,
    /// Secret key for cancellation
    pub secret: i32,
}

impl BackendKeyData {
    /// Parse a BackendKeyData message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let pid = r.read_i32()?;
        let secret = r.read_i32()?;
        Ok(Self { pid, secret })
    }
}

/// ParameterStatus message - server parameter name and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterStatus {
    /// Parameter name
    pub name: String,
    /// Parameter value
    pub value: String,
}

impl ParameterStatus {
    /// Parse a ParameterStatus message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let name = r.read_cstr()?.to_string();
        let value = r.read_cstr()?.to_string();
        Ok(Self { name, value })
    }
}

/// ReadyForQuery message - the server finished an operation and awaits the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyForQuery {
    pub status: TransactionStatus,
}

impl ReadyForQuery {
    /// Parse a ReadyForQuery message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let byte = Reader::new(payload).read_u8()?;
        let status = TransactionStatus::from_byte(byte).ok_or_else(|| {
            Error::Protocol(format!("unexpected transaction status 0x{:02x}", byte))
        })?;
        Ok(Self { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_ok() {
        assert_eq!(Authentication::parse(&[0, 0, 0, 0]).unwrap(), Authentication::Ok);
    }

    #[test]
    fn test_authentication_unsupported() {
        let err = Authentication::parse(&[0, 0, 0, 5, 1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, Error::Unsupported(ref m) if m.contains("MD5")));
    }

    #[test]
    fn test_authentication_truncated() {
        assert!(matches!(
            Authentication::parse(&[0, 0]),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_backend_key_data() {
        let key = BackendKeyData::parse(&[0, 0, 0x30, 0x39, 0xff, 0xff, 0xff, 0xfe]).unwrap();
        assert_eq!(key.pid, 12345);
        assert_eq!(key.secret, -2);
    }

    #[test]
    fn test_parameter_status() {
        let param = ParameterStatus::parse(b"server_version\016.2\0").unwrap();
        assert_eq!(param.name, "server_version");
        assert_eq!(param.value, "16.2");
    }

    #[test]
    fn test_ready_for_query_statuses() {
        let idle = ReadyForQuery::parse(&[0x49]).unwrap();
        assert_eq!(idle.status, TransactionStatus::Idle);
        let block = ReadyForQuery::parse(&[0x54]).unwrap();
        assert_eq!(block.status, TransactionStatus::InTransaction);
        let failed = ReadyForQuery::parse(&[0x45]).unwrap();
        assert_eq!(failed.status, TransactionStatus::Failed);

        assert!(matches!(
            ReadyForQuery::parse(&[b'Q']),
            Err(Error::Protocol(_))
        ));
        assert!(ReadyForQuery::parse(&[]).is_err());
    }
}
