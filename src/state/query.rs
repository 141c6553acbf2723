//! Extended-query work item.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::backend::{BackendMessage, ColumnDescriptor, CommandComplete, DataRow};
use crate::protocol::frontend::{Bind, Describe, Execute, Parse, write_sync};
use crate::protocol::types::{FormatCode, TransactionStatus};
use crate::row::Row;
use crate::value::TypeRegistry;

use super::work::{Completion, Handled, WorkItem};

/// Outcome of one query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResult {
    /// Decoded rows in arrival order
    pub rows: Vec<Row>,
    /// Column descriptors from RowDescription, if the statement returned rows
    pub columns: Option<Vec<ColumnDescriptor>>,
    /// CommandComplete tag; `None` for an empty query string
    pub command: Option<CommandComplete>,
}

impl QueryResult {
    /// Affected-row count parsed from the command tag.
    pub fn rows_affected(&self) -> Option<u64> {
        self.command.as_ref().and_then(CommandComplete::rows_affected)
    }
}

/// Runs one statement through the unnamed statement and portal:
/// Parse, Bind (binary results), Describe portal, Execute, Sync.
pub struct QueryWork {
    sql: String,
    registry: Arc<TypeRegistry>,
    columns: Option<Vec<ColumnDescriptor>>,
    rows: Vec<Row>,
    reply: Option<Completion<QueryResult>>,
}

impl QueryWork {
    pub fn new(
        sql: impl Into<String>,
        registry: Arc<TypeRegistry>,
        reply: Completion<QueryResult>,
    ) -> Self {
        Self {
            sql: sql.into(),
            registry,
            columns: None,
            rows: Vec::new(),
            reply: Some(reply),
        }
    }

    fn resolve(&mut self, result: Result<QueryResult>) {
        if let Some(reply) = self.reply.take() {
            reply(result);
        }
    }

    fn on_data_row(&mut self, row: &DataRow) {
        if self.reply.is_none() {
            // Already rejected; drain until ReadyForQuery.
            return;
        }
        let Some(columns) = self.columns.as_deref() else {
            self.resolve(Err(Error::Protocol(
                "DataRow received before RowDescription".into(),
            )));
            return;
        };
        match Row::decode(columns, row, &self.registry) {
            Ok(row) => self.rows.push(row),
            Err(e) => self.resolve(Err(e)),
        }
    }

    fn write_statement(&self, out: &mut Vec<u8>) -> Result<()> {
        Parse::unnamed(self.sql.as_str()).encode(out)?;
        Bind {
            result_formats: vec![FormatCode::Binary],
            ..Bind::default()
        }
        .encode(out)?;
        Describe::portal("").encode(out);
        Execute::new("", 0).encode(out);
        Ok(())
    }

    fn complete(&mut self, command: Option<CommandComplete>) {
        let result = QueryResult {
            rows: std::mem::take(&mut self.rows),
            columns: self.columns.take(),
            command,
        };
        self.resolve(Ok(result));
    }
}

impl WorkItem for QueryWork {
    fn start(&mut self, out: &mut Vec<u8>) {
        tracing::debug!(sql = %self.sql, "starting query");
        if let Err(e) = self.write_statement(out) {
            // Sync still goes out so the ReadyForQuery it earns retires this item.
            self.resolve(Err(e));
        }
        write_sync(out);
    }

    fn handle(&mut self, msg: BackendMessage) -> Handled {
        match msg {
            BackendMessage::ParseComplete(_)
            | BackendMessage::BindComplete(_)
            | BackendMessage::NoData(_) => {}
            BackendMessage::RowDescription(desc) => self.columns = Some(desc.fields),
            BackendMessage::DataRow(row) => self.on_data_row(&row),
            BackendMessage::CommandComplete(cmd) => self.complete(Some(cmd)),
            BackendMessage::EmptyQueryResponse(_) => self.complete(None),
            BackendMessage::ErrorResponse(err) => {
                if self.reply.is_none() {
                    return Handled::LateError(err.fields);
                }
                self.resolve(Err(err.into_error()));
            }
            _ => return Handled::Unexpected,
        }
        Handled::Consumed
    }

    fn finish(mut self: Box<Self>, _status: TransactionStatus) {
        if self.reply.is_some() {
            self.resolve(Err(Error::Protocol(
                "ReadyForQuery received before CommandComplete".into(),
            )));
        }
    }

    fn fail(mut self: Box<Self>, error: Error) {
        self.resolve(Err(error));
    }
}
