//! Startup and termination messages.

use crate::protocol::codec::MessageWriter;

/// Protocol version 3.0 (0x00030000)
pub const PROTOCOL_VERSION_3_0: i32 = 196608;

/// StartupMessage: the only frame sent without a type byte.
///
/// Parameters are (name, value) pairs. `user` is required; `database`,
/// `application_name`, `client_encoding` and friends are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Startup {
    pub params: Vec<(String, String)>,
}

impl Startup {
    /// Startup message carrying only `user` and `database`.
    pub fn new(user: &str, database: &str) -> Self {
        Self {
            params: vec![
                ("user".to_string(), user.to_string()),
                ("database".to_string(), database.to_string()),
            ],
        }
    }

    pub fn with_params(params: Vec<(String, String)>) -> Self {
        Self { params }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageWriter::untagged();
        msg.write_i32(PROTOCOL_VERSION_3_0);

        for (name, value) in &self.params {
            msg.write_cstr(name);
            msg.write_cstr(value);
        }

        // Terminator
        msg.write_u8(0);
        msg.finish_into(buf);
    }
}

/// Write a Terminate message.
///
/// Sent to cleanly close the connection.
pub fn write_terminate(buf: &mut Vec<u8>) {
    MessageWriter::tagged(super::msg_type::TERMINATE).finish_into(buf);
}
