//! Asynchronous PostgreSQL client.
//!
//! A [`Client`] is a cheap handle to a driver task that owns the socket and
//! the [`ConnectionStateMachine`]. Operations are sent to the driver as work
//! items and resolved through oneshot channels, so any number of queries can
//! be in flight while the server answers them strictly in order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{Error, Result};
use crate::handler::{EventSink, TracingSink};
use crate::opts::Opts;
use crate::protocol::backend::BackendKeyData;
use crate::protocol::types::TransactionStatus;
use crate::row::Row;
use crate::state::{
    Completion, ConnectionStateMachine, Phase, QueryResult, QueryWork, Session, StartupWork,
    WorkItem,
};
use crate::value::TypeRegistry;

use super::stream::Stream;

const READ_CHUNK: usize = 8192;

enum Command {
    Enqueue(Box<dyn WorkItem>),
    Terminate(oneshot::Sender<()>),
}

/// Handle to a PostgreSQL connection.
///
/// Clones share the same connection. The connection is closed when
/// [`Client::close`] is called or every clone has been dropped.
#[derive(Debug, Clone)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
    session: watch::Receiver<Session>,
    registry: Arc<TypeRegistry>,
}

impl Client {
    /// Connect to a PostgreSQL server.
    pub async fn connect<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        Self::connect_with_sink(opts, Box::new(TracingSink)).await
    }

    /// Connect, reporting notices and unexpected messages to `sink`.
    pub async fn connect_with_sink<O: TryInto<Opts>>(
        opts: O,
        sink: Box<dyn EventSink>,
    ) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts = opts.try_into()?;
        let stream = Stream::connect(&opts).await?;
        Self::connect_with_stream(stream, &opts, sink).await
    }

    /// Run the handshake over an already-open stream.
    ///
    /// Spawns the driver task on the current tokio runtime and resolves once the
    /// server reports ReadyForQuery.
    pub async fn connect_with_stream<S>(
        stream: S,
        opts: &Opts,
        sink: Box<dyn EventSink>,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (reply, ready) = oneshot::channel();
        let mut machine = ConnectionStateMachine::new(sink);
        machine.connect(StartupWork::new(opts.startup(), reply_to(reply)))?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (session_tx, session) = watch::channel(machine.session().clone());
        tokio::spawn(drive(stream, machine, command_rx, session_tx));

        wait(ready).await?;
        // The reply fires mid-chunk; wait for the driver to publish the Ready session.
        let mut session = session;
        let _ = session.wait_for(|s| s.phase != Phase::Handshake).await;
        tracing::debug!("connected");
        Ok(Self {
            commands,
            session,
            registry: Arc::new(TypeRegistry::default()),
        })
    }

    /// Use `registry` to decode the results of queries issued by this handle.
    pub fn with_type_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Run `sql` and collect its rows.
    ///
    /// The query is queued when this method is called, not when the returned
    /// future is first polled, so queries issued back to back run in call order.
    pub fn query(
        &self,
        sql: impl Into<String>,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send + 'static {
        let reply = self.submit(sql.into());
        async move { wait(reply).await.map(|result| result.rows) }
    }

    /// Like [`Client::query`], also returning the column descriptors and command tag.
    pub fn query_result(
        &self,
        sql: impl Into<String>,
    ) -> impl Future<Output = Result<QueryResult>> + Send + 'static {
        let reply = self.submit(sql.into());
        async move { wait(reply).await }
    }

    /// Run a statement and return the number of affected rows.
    ///
    /// Statements whose command tag carries no count report 0.
    pub fn execute(
        &self,
        sql: impl Into<String>,
    ) -> impl Future<Output = Result<u64>> + Send + 'static {
        let reply = self.submit(sql.into());
        async move {
            wait(reply)
                .await
                .map(|result| result.rows_affected().unwrap_or(0))
        }
    }

    fn submit(&self, sql: String) -> oneshot::Receiver<Result<QueryResult>> {
        let (reply, rx) = oneshot::channel();
        let work = QueryWork::new(sql, Arc::clone(&self.registry), reply_to(reply));
        // If the driver is gone the work item is dropped with its sender and
        // the receiver reports ConnectionBroken.
        let _ = self.commands.send(Command::Enqueue(Box::new(work)));
        rx
    }

    /// Snapshot of the session state.
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn server_params(&self) -> HashMap<String, String> {
        self.session.borrow().server_params.clone()
    }

    pub fn server_param(&self, name: &str) -> Option<String> {
        self.session.borrow().server_param(name).map(str::to_string)
    }

    /// Backend process id and cancellation secret.
    pub fn backend_key(&self) -> Option<BackendKeyData> {
        self.session.borrow().backend_key
    }

    /// Transaction status reported by the latest ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.session.borrow().transaction_status
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction_status().in_transaction()
    }

    /// True once the connection failed or was closed.
    pub fn is_broken(&self) -> bool {
        self.commands.is_closed() || self.session.borrow().is_terminated()
    }

    /// Send Terminate and wait for the driver to shut the socket down.
    ///
    /// Queries still queued on this connection fail with
    /// [`Error::ConnectionBroken`].
    pub async fn close(self) -> Result<()> {
        let (done, closed) = oneshot::channel();
        if self.commands.send(Command::Terminate(done)).is_err() {
            return Ok(());
        }
        let _ = closed.await;
        Ok(())
    }
}

fn reply_to<T: Send + 'static>(reply: oneshot::Sender<Result<T>>) -> Completion<T> {
    Box::new(move |result| {
        let _ = reply.send(result);
    })
}

async fn wait<T>(reply: oneshot::Receiver<Result<T>>) -> Result<T> {
    reply.await.map_err(|_| Error::ConnectionBroken)?
}

/// Driver task: the only reader and writer of the socket.
async fn drive<S>(
    mut stream: S,
    mut machine: ConnectionStateMachine,
    mut commands: mpsc::UnboundedReceiver<Command>,
    session: watch::Sender<Session>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut read_buf = vec![0u8; READ_CHUNK];
    let mut closed_tx = None;

    loop {
        let outbound = machine.take_outbound();
        if !outbound.is_empty() {
            let written = async {
                stream.write_all(&outbound).await?;
                stream.flush().await
            }
            .await;
            if let Err(e) = written {
                tracing::error!("write failed: {}", e);
                machine.fail(Error::Io(e));
            }
        }

        session.send_if_modified(|current| {
            if current != machine.session() {
                *current = machine.session().clone();
                true
            } else {
                false
            }
        });

        if machine.session().is_terminated() {
            break;
        }

        tokio::select! {
            read = stream.read(&mut read_buf) => match read {
                Ok(0) => machine.fail(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "server closed the connection",
                ))),
                Ok(n) => {
                    if let Err(e) = machine.feed(&read_buf[..n]) {
                        tracing::debug!("driver stopping: {}", e);
                    }
                }
                Err(e) => {
                    tracing::error!("read failed: {}", e);
                    machine.fail(Error::Io(e));
                }
            },
            command = commands.recv() => match command {
                Some(Command::Enqueue(item)) => machine.enqueue(item),
                Some(Command::Terminate(done)) => {
                    machine.terminate();
                    closed_tx = Some(done);
                }
                None => {
                    tracing::debug!("all handles dropped, closing connection");
                    machine.terminate();
                }
            },
        }
    }

    commands.close();
    while let Ok(command) = commands.try_recv() {
        match command {
            Command::Enqueue(item) => item.fail(Error::ConnectionBroken),
            Command::Terminate(done) => {
                let _ = done.send(());
            }
        }
    }
    let _ = stream.shutdown().await;
    if let Some(done) = closed_tx {
        let _ = done.send(());
    }
}
