//! Asynchronous PostgreSQL client using Tokio.

mod conn;
mod stream;

pub use conn::Client;
pub use stream::Stream;
