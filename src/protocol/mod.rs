//! PostgreSQL wire protocol implementation.
//!
//! This module contains the low-level protocol encoding and decoding.
//!
//! # Structure
//!
//! - `backend`: Server → Client messages (decoding and tag dispatch)
//! - `frontend`: Client → Server messages (encoding)
//! - `codec`: Byte cursor and two-phase frame writer
//! - `types`: Common protocol types (FormatCode, Oid, TransactionStatus)

pub mod backend;
pub mod codec;
pub mod frontend;
pub mod types;

// Re-export commonly used types
pub use backend::{BackendMessage, MessageKind};
pub use frontend::FrontendMessage;
pub use types::{FormatCode, Oid, TransactionStatus};
