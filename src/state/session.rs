//! Session metadata owned by the connection state machine.

use std::collections::HashMap;

use crate::protocol::backend::BackendKeyData;
use crate::protocol::types::TransactionStatus;

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Disconnected,
    /// Startup frame sent, waiting for the first ReadyForQuery.
    Handshake,
    Ready,
    /// Terminate was sent. Terminal.
    Closed,
    /// A connection-fatal error occurred. Terminal.
    Broken,
}

/// Session-level state reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub phase: Phase,
    /// Latest value of every ParameterStatus received
    pub server_params: HashMap<String, String>,
    /// Process id and cancellation secret, once BackendKeyData arrives
    pub backend_key: Option<BackendKeyData>,
    /// Status from the most recent ReadyForQuery
    pub transaction_status: TransactionStatus,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    pub fn is_broken(&self) -> bool {
        self.phase == Phase::Broken
    }

    /// True once the session can no longer run operations.
    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Closed | Phase::Broken)
    }

    pub fn server_param(&self, name: &str) -> Option<&str> {
        self.server_params.get(name).map(String::as_str)
    }

    /// Backend process id, -1 until BackendKeyData is received.
    pub fn process_id(&self) -> i32 {
        self.backend_key.as_ref().map_or(-1, |key| key.pid)
    }

    /// Cancellation secret, -1 until BackendKeyData is received.
    pub fn secret_key(&self) -> i32 {
        self.backend_key.as_ref().map_or(-1, |key| key.secret)
    }
}
