//! Value decoding keyed by type OID.
//!
//! A [`TypeRegistry`] maps type OIDs to [`ValueCodec`]s. Columns whose OID has
//! no registered codec decode to raw bytes.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::backend::ColumnDescriptor;
use crate::protocol::types::{FormatCode, Oid, oid};

/// A decoded column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// SQL NULL
    Null,
    Text(String),
    Int4(i32),
    /// Raw bytes of a type with no registered codec
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int4(value)
    }
}

/// Decoder for the non-NULL values of one type.
pub trait ValueCodec: Send + Sync {
    /// Decode `bytes`, encoded in `column.format`.
    fn decode(&self, column: &ColumnDescriptor, bytes: &[u8]) -> Result<Value>;
}

impl<F> ValueCodec for F
where
    F: Fn(&ColumnDescriptor, &[u8]) -> Result<Value> + Send + Sync,
{
    fn decode(&self, column: &ColumnDescriptor, bytes: &[u8]) -> Result<Value> {
        self(column, bytes)
    }
}

/// UTF-8 text; identical in text and binary format.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl ValueCodec for TextCodec {
    fn decode(&self, column: &ColumnDescriptor, bytes: &[u8]) -> Result<Value> {
        simdutf8::compat::from_utf8(bytes)
            .map(|s| Value::Text(s.to_owned()))
            .map_err(|e| Error::Decode(format!("column {}: invalid UTF-8: {}", column.name, e)))
    }
}

/// 4-byte signed integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Int4Codec;

impl ValueCodec for Int4Codec {
    fn decode(&self, column: &ColumnDescriptor, bytes: &[u8]) -> Result<Value> {
        match column.format {
            FormatCode::Binary => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    Error::Decode(format!(
                        "column {}: invalid int4 length: {}",
                        column.name,
                        bytes.len()
                    ))
                })?;
                Ok(Value::Int4(i32::from_be_bytes(arr)))
            }
            FormatCode::Text => {
                let s = simdutf8::compat::from_utf8(bytes)
                    .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
                s.parse()
                    .map(Value::Int4)
                    .map_err(|e| {
                        Error::Decode(format!("column {}: invalid int4: {}", column.name, e))
                    })
            }
        }
    }
}

/// OID → codec table.
#[derive(Clone)]
pub struct TypeRegistry {
    codecs: HashMap<Oid, Arc<dyn ValueCodec>>,
}

impl TypeRegistry {
    /// Registry with no codecs: every value decodes to raw bytes.
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Register (or replace) the codec for a type OID.
    pub fn register<C: ValueCodec + 'static>(&mut self, type_oid: Oid, codec: C) -> &mut Self {
        self.codecs.insert(type_oid, Arc::new(codec));
        self
    }

    pub fn contains(&self, type_oid: Oid) -> bool {
        self.codecs.contains_key(&type_oid)
    }

    /// Decode one field. `None` is SQL NULL.
    pub fn decode(&self, column: &ColumnDescriptor, raw: Option<&[u8]>) -> Result<Value> {
        let Some(bytes) = raw else {
            return Ok(Value::Null);
        };
        match self.codecs.get(&column.type_oid) {
            Some(codec) => codec.decode(column, bytes),
            None => Ok(Value::Bytes(bytes.to_vec())),
        }
    }
}

impl Default for TypeRegistry {
    /// Text family (`text`, `varchar`, `bpchar`, `name`) and `int4`.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(oid::TEXT, TextCodec)
            .register(oid::VARCHAR, TextCodec)
            .register(oid::BPCHAR, TextCodec)
            .register(oid::NAME, TextCodec)
            .register(oid::INT4, Int4Codec);
        registry
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut oids: Vec<_> = self.codecs.keys().copied().collect();
        oids.sort_unstable();
        f.debug_struct("TypeRegistry").field("oids", &oids).finish()
    }
}
