//! PostgreSQL backend (server → client) messages.
//!
//! Each message type is decoded from a payload the framer has already isolated.
//! [`BackendMessage::decode`] is the tag dispatch table.

pub mod auth;
pub mod error;
pub mod extended;
pub mod query;

pub use auth::{Authentication, BackendKeyData, ParameterStatus, ReadyForQuery};
pub use error::{ErrorResponse, NoticeResponse};
pub use extended::{BindComplete, NoData, ParseComplete};
pub use query::{ColumnDescriptor, CommandComplete, DataRow, EmptyQueryResponse, RowDescription};

use crate::error::{Error, Result};

/// Backend message type bytes.
pub mod msg_type {
    /// Authentication message
    pub const AUTHENTICATION: u8 = b'R';
    /// BackendKeyData
    pub const BACKEND_KEY_DATA: u8 = b'K';
    /// ParameterStatus
    pub const PARAMETER_STATUS: u8 = b'S';
    /// ReadyForQuery
    pub const READY_FOR_QUERY: u8 = b'Z';
    /// RowDescription
    pub const ROW_DESCRIPTION: u8 = b'T';
    /// DataRow
    pub const DATA_ROW: u8 = b'D';
    /// CommandComplete
    pub const COMMAND_COMPLETE: u8 = b'C';
    /// EmptyQueryResponse
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';
    /// ErrorResponse
    pub const ERROR_RESPONSE: u8 = b'E';
    /// NoticeResponse
    pub const NOTICE_RESPONSE: u8 = b'N';
    /// ParseComplete
    pub const PARSE_COMPLETE: u8 = b'1';
    /// BindComplete
    pub const BIND_COMPLETE: u8 = b'2';
    /// NoData
    pub const NO_DATA: u8 = b'n';
}

/// Discriminant of [`BackendMessage`], used for logging and unexpected-message reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Authentication,
    ParameterStatus,
    BackendKeyData,
    ReadyForQuery,
    ParseComplete,
    BindComplete,
    NoData,
    ErrorResponse,
    RowDescription,
    DataRow,
    CommandComplete,
    EmptyQueryResponse,
    NoticeResponse,
}

impl MessageKind {
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Authentication => "Authentication",
            MessageKind::ParameterStatus => "ParameterStatus",
            MessageKind::BackendKeyData => "BackendKeyData",
            MessageKind::ReadyForQuery => "ReadyForQuery",
            MessageKind::ParseComplete => "ParseComplete",
            MessageKind::BindComplete => "BindComplete",
            MessageKind::NoData => "NoData",
            MessageKind::ErrorResponse => "ErrorResponse",
            MessageKind::RowDescription => "RowDescription",
            MessageKind::DataRow => "DataRow",
            MessageKind::CommandComplete => "CommandComplete",
            MessageKind::EmptyQueryResponse => "EmptyQueryResponse",
            MessageKind::NoticeResponse => "NoticeResponse",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded message from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    Authentication(Authentication),
    ParameterStatus(ParameterStatus),
    BackendKeyData(BackendKeyData),
    ReadyForQuery(ReadyForQuery),
    ParseComplete(ParseComplete),
    BindComplete(BindComplete),
    NoData(NoData),
    ErrorResponse(ErrorResponse),
    RowDescription(RowDescription),
    DataRow(DataRow),
    CommandComplete(CommandComplete),
    EmptyQueryResponse(EmptyQueryResponse),
    NoticeResponse(NoticeResponse),
}

impl BackendMessage {
    /// Decode the payload of a frame with the given type byte.
    ///
    /// Unknown type bytes are a protocol error.
    pub fn decode(type_byte: u8, payload: &[u8]) -> Result<Self> {
        let msg = match type_byte {
            msg_type::AUTHENTICATION => Self::Authentication(Authentication::parse(payload)?),
            msg_type::PARAMETER_STATUS => Self::ParameterStatus(ParameterStatus::parse(payload)?),
            msg_type::BACKEND_KEY_DATA => Self::BackendKeyData(BackendKeyData::parse(payload)?),
            msg_type::READY_FOR_QUERY => Self::ReadyForQuery(ReadyForQuery::parse(payload)?),
            msg_type::PARSE_COMPLETE => Self::ParseComplete(ParseComplete::parse(payload)?),
            msg_type::BIND_COMPLETE => Self::BindComplete(BindComplete::parse(payload)?),
            msg_type::NO_DATA => Self::NoData(NoData::parse(payload)?),
            msg_type::ERROR_RESPONSE => Self::ErrorResponse(ErrorResponse::parse(payload)?),
            msg_type::ROW_DESCRIPTION => Self::RowDescription(RowDescription::parse(payload)?),
            msg_type::DATA_ROW => Self::DataRow(DataRow::parse(payload)?),
            msg_type::COMMAND_COMPLETE => Self::CommandComplete(CommandComplete::parse(payload)?),
            msg_type::EMPTY_QUERY_RESPONSE => {
                Self::EmptyQueryResponse(EmptyQueryResponse::parse(payload)?)
            }
            msg_type::NOTICE_RESPONSE => Self::NoticeResponse(NoticeResponse::parse(payload)?),
            _ => {
                return Err(Error::Protocol(format!(
                    "unexpected message type '{}' (0x{:02x})",
                    type_byte.escape_ascii(),
                    type_byte
                )));
            }
        };
        Ok(msg)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Authentication(_) => MessageKind::Authentication,
            Self::ParameterStatus(_) => MessageKind::ParameterStatus,
            Self::BackendKeyData(_) => MessageKind::BackendKeyData,
            Self::ReadyForQuery(_) => MessageKind::ReadyForQuery,
            Self::ParseComplete(_) => MessageKind::ParseComplete,
            Self::BindComplete(_) => MessageKind::BindComplete,
            Self::NoData(_) => MessageKind::NoData,
            Self::ErrorResponse(_) => MessageKind::ErrorResponse,
            Self::RowDescription(_) => MessageKind::RowDescription,
            Self::DataRow(_) => MessageKind::DataRow,
            Self::CommandComplete(_) => MessageKind::CommandComplete,
            Self::EmptyQueryResponse(_) => MessageKind::EmptyQueryResponse,
            Self::NoticeResponse(_) => MessageKind::NoticeResponse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::TransactionStatus;

    #[test]
    fn test_dispatch_ready_for_query() {
        let msg = BackendMessage::decode(b'Z', b"T").unwrap();
        assert_eq!(msg.kind(), MessageKind::ReadyForQuery);
        assert_eq!(
            msg,
            BackendMessage::ReadyForQuery(ReadyForQuery {
                status: TransactionStatus::InTransaction
            })
        );
    }

    #[test]
    fn test_dispatch_empty_payloads() {
        assert_eq!(
            BackendMessage::decode(b'1', &[]).unwrap().kind(),
            MessageKind::ParseComplete
        );
        assert_eq!(
            BackendMessage::decode(b'2', &[]).unwrap().kind(),
            MessageKind::BindComplete
        );
        assert_eq!(
            BackendMessage::decode(b'n', &[]).unwrap().kind(),
            MessageKind::NoData
        );
    }

    #[test]
    fn test_dispatch_unknown_tag() {
        let err = BackendMessage::decode(b'?', &[]).unwrap_err();
        assert!(matches!(err, Error::Protocol(ref m) if m.contains("'?'")));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(MessageKind::DataRow.to_string(), "DataRow");
        assert_eq!(MessageKind::ErrorResponse.name(), "ErrorResponse");
    }
}
