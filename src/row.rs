//! Decoded result rows.

use crate::error::{Error, Result};
use crate::protocol::backend::{ColumnDescriptor, DataRow};
use crate::value::{TypeRegistry, Value};

/// Name PostgreSQL gives to result columns without an alias.
pub const ANONYMOUS_COLUMN: &str = "?column?";

/// One decoded row.
///
/// A result with a single anonymous column (`SELECT 1+1`) collapses to a
/// bare scalar; every other shape is a record of named values in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Scalar(Value),
    Record(Vec<(String, Value)>),
}

impl Row {
    /// Decode a DataRow against the RowDescription recorded for the same result.
    pub fn decode(
        columns: &[ColumnDescriptor],
        row: &DataRow,
        registry: &TypeRegistry,
    ) -> Result<Self> {
        if row.len() != columns.len() {
            return Err(Error::Protocol(format!(
                "DataRow has {} values but RowDescription has {} fields",
                row.len(),
                columns.len()
            )));
        }

        if let ([column], [raw]) = (columns, row.values.as_slice()) {
            if column.name == ANONYMOUS_COLUMN {
                return Ok(Row::Scalar(registry.decode(column, raw.as_deref())?));
            }
        }

        columns
            .iter()
            .zip(&row.values)
            .map(|(column, raw)| {
                Ok((column.name.clone(), registry.decode(column, raw.as_deref())?))
            })
            .collect::<Result<Vec<_>>>()
            .map(Row::Record)
    }

    /// Look up a record field by column name (first match).
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Row::Scalar(_) => None,
            Row::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Row::Scalar(v) => Some(v),
            Row::Record(_) => None,
        }
    }

    /// Iterate over values in column order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        let (scalar, record) = match self {
            Row::Scalar(v) => (Some(v), None),
            Row::Record(fields) => (None, Some(fields.iter().map(|(_, v)| v))),
        };
        scalar.into_iter().chain(record.into_iter().flatten())
    }
}
