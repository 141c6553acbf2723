//! Handshake work item.

use crate::error::{Error, Result};
use crate::protocol::backend::{Authentication, BackendMessage};
use crate::protocol::frontend::Startup;
use crate::protocol::types::TransactionStatus;

use super::work::{Completion, Handled, WorkItem};

/// Sends the startup frame and resolves once the first ReadyForQuery arrives.
///
/// ParameterStatus and BackendKeyData are session messages and never reach this
/// item; only the authentication outcome and errors do.
pub struct StartupWork {
    startup: Startup,
    authenticated: bool,
    reply: Option<Completion<()>>,
}

impl StartupWork {
    pub fn new(startup: Startup, reply: Completion<()>) -> Self {
        Self {
            startup,
            authenticated: false,
            reply: Some(reply),
        }
    }

    fn resolve(&mut self, result: Result<()>) {
        if let Some(reply) = self.reply.take() {
            reply(result);
        }
    }
}

impl WorkItem for StartupWork {
    fn start(&mut self, out: &mut Vec<u8>) {
        tracing::debug!("sending startup message");
        self.startup.encode(out);
    }

    fn handle(&mut self, msg: BackendMessage) -> Handled {
        match msg {
            BackendMessage::Authentication(Authentication::Ok) => {
                self.authenticated = true;
                Handled::Consumed
            }
            BackendMessage::ErrorResponse(err) => {
                self.resolve(Err(err.into_error()));
                Handled::Consumed
            }
            _ => Handled::Unexpected,
        }
    }

    fn finish(mut self: Box<Self>, _status: TransactionStatus) {
        let result = if self.authenticated {
            Ok(())
        } else {
            Err(Error::Protocol(
                "ReadyForQuery received before AuthenticationOk".into(),
            ))
        };
        self.resolve(result);
    }

    fn fail(mut self: Box<Self>, error: Error) {
        self.resolve(Err(error));
    }
}
