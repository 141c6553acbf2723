//! PostgreSQL frontend (client → server) messages.
//!
//! Every message type encodes to exactly one frame and never touches the transport.

pub mod extended;
pub mod simple;
pub mod startup;

pub use extended::{Bind, Describe, DescribeTarget, Execute, Parse, write_flush, write_sync};
pub use simple::Query;
pub use startup::{PROTOCOL_VERSION_3_0, Startup, write_terminate};

use crate::error::Result;

/// Frontend message type bytes.
pub mod msg_type {
    /// Query (simple query protocol)
    pub const QUERY: u8 = b'Q';
    /// Parse (extended query protocol)
    pub const PARSE: u8 = b'P';
    /// Bind (extended query protocol)
    pub const BIND: u8 = b'B';
    /// Execute (extended query protocol)
    pub const EXECUTE: u8 = b'E';
    /// Describe (extended query protocol)
    pub const DESCRIBE: u8 = b'D';
    /// Sync (extended query protocol)
    pub const SYNC: u8 = b'S';
    /// Flush (extended query protocol)
    pub const FLUSH: u8 = b'H';
    /// Terminate
    pub const TERMINATE: u8 = b'X';
}

/// Any message the client can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendMessage {
    Startup(Startup),
    Query(Query),
    Parse(Parse),
    Bind(Bind),
    Describe(Describe),
    Execute(Execute),
    Sync,
    Flush,
    Terminate,
}

impl FrontendMessage {
    /// Append this message's frame to `buf`.
    ///
    /// Only Parse and Bind can fail, when a count overflows its wire field.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            FrontendMessage::Startup(msg) => msg.encode(buf),
            FrontendMessage::Query(msg) => msg.encode(buf),
            FrontendMessage::Parse(msg) => msg.encode(buf)?,
            FrontendMessage::Bind(msg) => msg.encode(buf)?,
            FrontendMessage::Describe(msg) => msg.encode(buf),
            FrontendMessage::Execute(msg) => msg.encode(buf),
            FrontendMessage::Sync => write_sync(buf),
            FrontendMessage::Flush => write_flush(buf),
            FrontendMessage::Terminate => write_terminate(buf),
        }
        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_frame(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

macro_rules! impl_from {
    ($($ty:ident),*) => {
        $(
            impl From<$ty> for FrontendMessage {
                fn from(msg: $ty) -> Self {
                    FrontendMessage::$ty(msg)
                }
            }
        )*
    };
}

impl_from!(Startup, Query, Parse, Bind, Describe, Execute);
