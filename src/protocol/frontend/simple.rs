//! Simple query protocol messages.

use crate::protocol::codec::MessageWriter;

/// Query message.
///
/// The query string may contain multiple SQL statements separated by semicolons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub query: String,
}

impl Query {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageWriter::tagged(super::msg_type::QUERY);
        msg.write_cstr(&self.query);
        msg.finish_into(buf);
    }
}
