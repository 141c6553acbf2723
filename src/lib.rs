//! A pipelined PostgreSQL wire protocol (v3.0) client.
//!
//! # Features
//!
//! - **Sans-I/O core**: framing, decoding and operation sequencing live in
//!   [`state::ConnectionStateMachine`], which never touches a socket
//! - **Pipelining**: any number of queries can be queued; each one's frames are
//!   sent as soon as the previous one has seen its ReadyForQuery
//! - **Extended query protocol**: every query runs through Parse/Bind/Describe/Execute/Sync
//!   with binary results
//! - **Pluggable value decoding**: a [`TypeRegistry`] maps type OIDs to codecs
//!
//! # Example
//!
//! ```no_run
//! use pg_wire_client::{Client, Row, Value};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> pg_wire_client::Result<()> {
//!     let client = Client::connect("postgres://postgres@localhost/postgres").await?;
//!
//!     let rows = client.query("SELECT 1+1+100").await?;
//!     assert_eq!(rows, [Row::Scalar(Value::Int4(102))]);
//!
//!     client.close().await
//! }
//! ```

pub mod buffer_set;
pub mod error;
pub mod handler;
pub mod opts;
pub mod protocol;
pub mod row;
pub mod state;
pub mod value;

#[cfg(feature = "tokio")]
pub mod tokio;

pub use buffer_set::BufferSet;
pub use error::{Error, ErrorFields, Result};
pub use handler::{DropSink, EventSink, TracingSink};
pub use opts::Opts;
pub use protocol::types::{FormatCode, Oid, TransactionStatus};
pub use row::Row;
pub use state::{ConnectionStateMachine, QueryResult, Session};
pub use value::{TypeRegistry, Value, ValueCodec};

#[cfg(feature = "tokio")]
pub use crate::tokio::Client;
