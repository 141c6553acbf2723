//! Query-related backend messages.

use crate::error::{Error, Result};
use crate::protocol::codec::Reader;
use crate::protocol::types::{FormatCode, Oid};

/// Column descriptor within a RowDescription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name (`?column?` for unnamed expressions)
    pub name: String,
    /// Table OID (0 if not a table column)
    pub table_oid: Oid,
    /// Column attribute number (0 if not a table column)
    pub column_id: i16,
    /// Data type OID
    pub type_oid: Oid,
    /// Type size (-1 for variable, -2 for null-terminated)
    pub type_size: i16,
    /// Type modifier (type-specific)
    pub type_modifier: i32,
    /// Format code of the values in DataRow
    pub format: FormatCode,
}

impl ColumnDescriptor {
    fn parse(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            name: r.read_cstr()?.to_string(),
            table_oid: r.read_i32()? as Oid,
            column_id: r.read_i16()?,
            type_oid: r.read_i32()? as Oid,
            type_size: r.read_i16()?,
            type_modifier: r.read_i32()?,
            format: FormatCode::from_i16(r.read_i16()?)?,
        })
    }
}

/// RowDescription message - describes the columns in a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDescription {
    pub fields: Vec<ColumnDescriptor>,
}

impl RowDescription {
    /// Parse a RowDescription message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let num_fields = r.read_i16()?;
        if num_fields < 0 {
            return Err(Error::Protocol(format!(
                "RowDescription: negative field count {}",
                num_fields
            )));
        }

        let mut fields = Vec::with_capacity(num_fields as usize);
        for _ in 0..num_fields {
            fields.push(ColumnDescriptor::parse(&mut r)?);
        }
        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// DataRow message - contains a single row of data.
///
/// Each value is `None` for SQL NULL (length `-1`); a zero-length value is
/// an empty, non-null value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRow {
    pub values: Vec<Option<Vec<u8>>>,
}

impl DataRow {
    /// Parse a DataRow message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let num_columns = r.read_i16()?;
        if num_columns < 0 {
            return Err(Error::Protocol(format!(
                "DataRow: negative column count {}",
                num_columns
            )));
        }

        let mut values = Vec::with_capacity(num_columns as usize);
        for _ in 0..num_columns {
            let len = r.read_i32()?;
            let value = match len {
                -1 => None,
                len if len < 0 => {
                    return Err(Error::Protocol(format!(
                        "DataRow: invalid value length {}",
                        len
                    )));
                }
                len => Some(r.read_bytes(len as usize)?.to_vec()),
            };
            values.push(value);
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a column value by index.
    ///
    /// Returns `None` if out of range, `Some(None)` for NULL.
    pub fn get(&self, index: usize) -> Option<Option<&[u8]>> {
        self.values.get(index).map(|v| v.as_deref())
    }
}

/// CommandComplete message - indicates successful completion of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandComplete {
    /// Command tag (e.g., "SELECT 5", "INSERT 0 1", "UPDATE 10")
    pub tag: String,
}

impl CommandComplete {
    /// Parse a CommandComplete message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let tag = Reader::new(payload).read_cstr()?.to_string();
        Ok(Self { tag })
    }

    /// Parse the number of rows affected from the command tag.
    ///
    /// Returns `Some(count)` for commands like SELECT, INSERT, UPDATE, DELETE.
    /// Returns `None` for other commands or parse failures.
    pub fn rows_affected(&self) -> Option<u64> {
        let parts: Vec<&str> = self.tag.split_whitespace().collect();

        match parts.as_slice() {
            ["SELECT", count] => count.parse().ok(),
            ["INSERT", _oid, count] => count.parse().ok(),
            ["UPDATE", count] => count.parse().ok(),
            ["DELETE", count] => count.parse().ok(),
            ["COPY", count] => count.parse().ok(),
            ["MOVE", count] => count.parse().ok(),
            ["FETCH", count] => count.parse().ok(),
            ["MERGE", count] => count.parse().ok(),
            _ => None,
        }
    }

    /// Get the command name from the tag.
    pub fn command(&self) -> Option<&str> {
        self.tag.split_whitespace().next()
    }
}

/// EmptyQueryResponse message - response to an empty query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyQueryResponse;

impl EmptyQueryResponse {
    /// Parse an EmptyQueryResponse message from payload bytes.
    pub fn parse(_payload: &[u8]) -> Result<Self> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::oid;

    fn field_bytes(name: &str, type_oid: u32, format: i16) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&16384_i32.to_be_bytes());
        buf.extend_from_slice(&2_i16.to_be_bytes());
        buf.extend_from_slice(&(type_oid as i32).to_be_bytes());
        buf.extend_from_slice(&4_i16.to_be_bytes());
        buf.extend_from_slice(&(-1_i32).to_be_bytes());
        buf.extend_from_slice(&format.to_be_bytes());
        buf
    }

    #[test]
    fn test_row_description() {
        let mut payload = 2_i16.to_be_bytes().to_vec();
        payload.extend(field_bytes("id", oid::TEXT, 1));
        payload.extend(field_bytes("value", oid::INT4, 0));

        let desc = RowDescription::parse(&payload).unwrap();
        assert_eq!(desc.len(), 2);
        assert_eq!(desc.fields[0].name, "id");
        assert_eq!(desc.fields[0].table_oid, 16384);
        assert_eq!(desc.fields[0].column_id, 2);
        assert_eq!(desc.fields[0].type_oid, oid::TEXT);
        assert_eq!(desc.fields[0].type_size, 4);
        assert_eq!(desc.fields[0].type_modifier, -1);
        assert_eq!(desc.fields[0].format, FormatCode::Binary);
        assert_eq!(desc.fields[1].format, FormatCode::Text);
    }

    #[test]
    fn test_row_description_bad_format_code() {
        let mut payload = 1_i16.to_be_bytes().to_vec();
        payload.extend(field_bytes("x", oid::INT4, 7));
        assert!(RowDescription::parse(&payload).is_err());
    }

    #[test]
    fn test_row_description_truncated() {
        let mut payload = 2_i16.to_be_bytes().to_vec();
        payload.extend(field_bytes("only_one", oid::INT4, 1));
        assert!(RowDescription::parse(&payload).is_err());
    }

    #[test]
    fn test_data_row_null_vs_empty() {
        let mut payload = 3_i16.to_be_bytes().to_vec();
        payload.extend_from_slice(&(-1_i32).to_be_bytes());
        payload.extend_from_slice(&0_i32.to_be_bytes());
        payload.extend_from_slice(&2_i32.to_be_bytes());
        payload.extend_from_slice(b"hi");

        let row = DataRow::parse(&payload).unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(0), Some(None));
        assert_eq!(row.get(1), Some(Some(&b""[..])));
        assert_eq!(row.get(2), Some(Some(&b"hi"[..])));
        assert_eq!(row.get(3), None);
    }

    #[test]
    fn test_data_row_overrun_fails() {
        let mut payload = 1_i16.to_be_bytes().to_vec();
        payload.extend_from_slice(&10_i32.to_be_bytes());
        payload.extend_from_slice(b"short");
        assert!(DataRow::parse(&payload).is_err());
    }

    #[test]
    fn test_command_complete() {
        let cc = CommandComplete::parse(b"INSERT 0 1\0").unwrap();
        assert_eq!(cc.tag, "INSERT 0 1");
        assert_eq!(cc.rows_affected(), Some(1));
        assert_eq!(cc.command(), Some("INSERT"));

        let cc = CommandComplete::parse(b"CREATE TABLE\0").unwrap();
        assert_eq!(cc.rows_affected(), None);
    }
}
