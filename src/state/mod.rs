//! Sans-I/O state machines for the PostgreSQL protocol.
//!
//! Nothing here performs I/O. The connection state machine consumes inbound
//! bytes and produces outbound bytes; work items describe what one client
//! operation sends and how it reacts to the server's replies.

pub mod connection;
pub mod query;
pub mod session;
pub mod startup;
pub mod work;

pub use connection::ConnectionStateMachine;
pub use query::{QueryResult, QueryWork};
pub use session::{Phase, Session};
pub use startup::StartupWork;
pub use work::{Completion, Handled, WorkItem, WorkQueue};
