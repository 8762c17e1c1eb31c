//! Payload encoder.

use crate::error::{CodecError, CodecResult, ErrorKind};
use crate::value::{Row, Schema, Type, Value};
use bytes::BufMut;

/// First byte of an array payload.
pub const ARRAY_MARKER: u8 = b'A';
/// First byte of an error payload.
pub const ERROR_MARKER: u8 = b'E';

/// Encodes rows as an array payload.
///
/// # Errors
///
/// Fails with [`CodecError::TooLarge`] when a count or length does not fit
/// its 32-bit prefix. Nothing is produced in that case.
pub fn encode_array(rows: &[Row]) -> CodecResult<Vec<u8>> {
    let mut encoder = PayloadEncoder::new();
    encoder.array(rows)?;
    Ok(encoder.into_bytes())
}

/// Encodes a schema as an array of `(name, tag)` pairs.
///
/// # Errors
///
/// Fails if a column name is too large.
pub fn encode_schema(schema: &Schema) -> CodecResult<Vec<u8>> {
    let mut encoder = PayloadEncoder::new();
    encoder.schema(schema)?;
    Ok(encoder.into_bytes())
}

/// Encodes an error payload.
pub fn encode_error(kind: ErrorKind, message: &str) -> Vec<u8> {
    let mut encoder = PayloadEncoder::new();
    encoder.error(kind, message);
    encoder.into_bytes()
}

/// Encodes a single row as a bare tuple record, without a payload marker.
///
/// # Errors
///
/// Fails if a length does not fit its prefix.
pub fn encode_row(values: &[Value]) -> CodecResult<Vec<u8>> {
    let mut encoder = PayloadEncoder::with_capacity(tuple_len(values)?);
    encoder.put_tuple(values);
    Ok(encoder.into_bytes())
}

/// Converts a schema into the rows of its array encoding.
#[must_use]
pub fn schema_rows(schema: &Schema) -> Vec<Row> {
    schema
        .columns()
        .iter()
        .map(|c| {
            vec![
                Value::Text(c.name.clone()),
                Value::Integer(i64::from(c.ty.tag())),
            ]
        })
        .collect()
}

/// Writes payloads into a reusable byte buffer.
///
/// Every method validates its input before touching the buffer, so a
/// failed call leaves the buffer exactly as it was.
#[derive(Debug, Default)]
pub struct PayloadEncoder {
    buffer: Vec<u8>,
}

impl PayloadEncoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Appends an array payload.
    ///
    /// # Errors
    ///
    /// Fails if a count or length does not fit its 32-bit prefix.
    pub fn array(&mut self, rows: &[Row]) -> CodecResult<()> {
        let count = prefix(rows.len(), "row count")?;
        let mut total = 5usize;
        for row in rows {
            total = total.saturating_add(tuple_len(row)?);
        }

        self.buffer.reserve(total);
        self.buffer.put_u8(ARRAY_MARKER);
        self.buffer.put_u32_le(count);
        for row in rows {
            self.put_tuple(row);
        }
        Ok(())
    }

    /// Appends a schema payload.
    ///
    /// # Errors
    ///
    /// Fails if a column name is too large.
    pub fn schema(&mut self, schema: &Schema) -> CodecResult<()> {
        self.array(&schema_rows(schema))
    }

    /// Appends an error payload.
    ///
    /// Messages longer than the length prefix allows are cut at a character
    /// boundary.
    pub fn error(&mut self, kind: ErrorKind, message: &str) {
        let message = clamp_message(message);
        self.buffer.reserve(6 + message.len());
        self.buffer.put_u8(ERROR_MARKER);
        self.buffer.put_u8(kind.code());
        // clamp_message guarantees the length fits.
        self.buffer.put_u32_le(message.len() as u32);
        self.buffer.put_slice(message.as_bytes());
    }

    /// Drops everything written so far.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// The encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the encoder and returns the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    // Callers validate with `tuple_len` first.
    #[allow(clippy::cast_possible_truncation)]
    fn put_tuple(&mut self, values: &[Value]) {
        self.buffer.put_u32_le(values.len() as u32);
        for value in values {
            self.buffer.put_u8(value.value_type().tag());
            match value {
                Value::Null => {}
                Value::Integer(n) => self.buffer.put_i64_le(*n),
                Value::Real(r) => self.buffer.put_u64_le(r.to_bits()),
                Value::Text(s) => {
                    self.buffer.put_u32_le(s.len() as u32);
                    self.buffer.put_slice(s.as_bytes());
                }
                Value::Blob(b) => {
                    self.buffer.put_u32_le(b.len() as u32);
                    self.buffer.put_slice(b);
                }
            }
        }
    }
}

fn prefix(len: usize, what: &'static str) -> CodecResult<u32> {
    u32::try_from(len).map_err(|_| CodecError::TooLarge { what, len })
}

/// Encoded size of a tuple, checking every length prefix.
fn tuple_len(values: &[Value]) -> CodecResult<usize> {
    prefix(values.len(), "tuple arity")?;
    let mut total = 4usize;
    for value in values {
        let body = match value {
            Value::Null => 0,
            Value::Integer(_) | Value::Real(_) => 8,
            Value::Text(s) => 4 + prefix(s.len(), Type::Text.name())? as usize,
            Value::Blob(b) => 4 + prefix(b.len(), Type::Blob.name())? as usize,
        };
        total = total.saturating_add(1 + body);
    }
    Ok(total)
}

fn clamp_message(message: &str) -> &str {
    const MAX: usize = u32::MAX as usize;
    if message.len() <= MAX {
        return message;
    }
    let mut end = MAX;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}
