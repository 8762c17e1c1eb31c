//! Payload decoder.

use crate::encoder::{ARRAY_MARKER, ERROR_MARKER};
use crate::error::{CodecError, CodecResult, ErrorKind};
use crate::value::{Column, Row, Schema, Type, Value};
use bytes::Buf;

/// A decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// An array of rows.
    Array(Vec<Row>),
    /// An error record.
    Error(ErrorPayload),
}

/// A decoded error record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

/// Decodes any payload, dispatching on its marker byte.
///
/// # Errors
///
/// Fails on an unknown marker, malformed body or trailing bytes.
pub fn decode_payload(bytes: &[u8]) -> CodecResult<Payload> {
    let mut decoder = PayloadDecoder::new(bytes);
    let payload = match decoder.read_u8()? {
        ARRAY_MARKER => Payload::Array(decoder.array_body()?),
        ERROR_MARKER => Payload::Error(decoder.error_body()?),
        other => return Err(CodecError::UnknownMarker(other)),
    };
    decoder.finish()?;
    Ok(payload)
}

/// Decodes an array payload.
///
/// # Errors
///
/// Fails if the payload is malformed or is not an array.
pub fn decode_array(bytes: &[u8]) -> CodecResult<Vec<Row>> {
    match decode_payload(bytes)? {
        Payload::Array(rows) => Ok(rows),
        Payload::Error(_) => Err(CodecError::UnexpectedPayload { expected: "array" }),
    }
}

/// Decodes a schema payload.
///
/// # Errors
///
/// Fails if the payload is not an array of `(text, tag)` pairs.
pub fn decode_schema(bytes: &[u8]) -> CodecResult<Schema> {
    schema_from_rows(decode_array(bytes)?)
}

/// Decodes an error payload.
///
/// # Errors
///
/// Fails if the payload is malformed or is not an error.
pub fn decode_error(bytes: &[u8]) -> CodecResult<ErrorPayload> {
    match decode_payload(bytes)? {
        Payload::Error(e) => Ok(e),
        Payload::Array(_) => Err(CodecError::UnexpectedPayload { expected: "error" }),
    }
}

/// Decodes a bare tuple record written by [`crate::encode_row`].
///
/// # Errors
///
/// Fails if the record is malformed or has trailing bytes.
pub fn decode_row(bytes: &[u8]) -> CodecResult<Row> {
    let mut decoder = PayloadDecoder::new(bytes);
    let row = decoder.tuple()?;
    decoder.finish()?;
    Ok(row)
}

/// Rebuilds a schema from the rows of its array encoding.
///
/// # Errors
///
/// Fails if a row is not a `(text, valid tag)` pair.
pub fn schema_from_rows(rows: Vec<Row>) -> CodecResult<Schema> {
    let mut columns = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let mut values = row.into_iter();
        let (name, tag) = match (values.next(), values.next(), values.next()) {
            (Some(Value::Text(name)), Some(Value::Integer(tag)), None) => (name, tag),
            _ => {
                return Err(CodecError::invalid_schema(format!(
                    "column {i} is not a (name, tag) pair"
                )))
            }
        };
        let ty = u8::try_from(tag)
            .ok()
            .and_then(Type::from_tag)
            .ok_or_else(|| CodecError::invalid_schema(format!("column {i} has bad tag {tag}")))?;
        columns.push(Column::new(name, ty));
    }
    Ok(Schema::new(columns))
}

/// Reads payload items from a byte slice.
pub struct PayloadDecoder<'a> {
    input: &'a [u8],
}

impl<'a> PayloadDecoder<'a> {
    /// Creates a decoder over `input`.
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    /// Bytes not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.input.remaining()
    }

    /// Fails unless the whole input was consumed.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TrailingBytes`] when input is left.
    pub fn finish(&self) -> CodecResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }

    /// Reads one tuple: arity followed by tagged values.
    ///
    /// # Errors
    ///
    /// Fails on truncated input, unknown tags or invalid UTF-8.
    pub fn tuple(&mut self) -> CodecResult<Row> {
        let arity = self.read_u32()? as usize;
        // Each value takes at least its tag byte.
        let mut row = Vec::with_capacity(arity.min(self.remaining()));
        for _ in 0..arity {
            row.push(self.value()?);
        }
        Ok(row)
    }

    /// Reads one tagged value.
    ///
    /// # Errors
    ///
    /// Fails on truncated input, unknown tags or invalid UTF-8.
    pub fn value(&mut self) -> CodecResult<Value> {
        let tag = self.read_u8()?;
        match Type::from_tag(tag) {
            Some(Type::Null) => Ok(Value::Null),
            Some(Type::Integer) => {
                self.need(8)?;
                Ok(Value::Integer(self.input.get_i64_le()))
            }
            Some(Type::Real) => {
                self.need(8)?;
                Ok(Value::Real(f64::from_bits(self.input.get_u64_le())))
            }
            Some(Type::Text) => {
                let bytes = self.read_prefixed()?;
                let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Text(text.to_string()))
            }
            Some(Type::Blob) => Ok(Value::Blob(self.read_prefixed()?.to_vec())),
            None => Err(CodecError::UnknownTag(tag)),
        }
    }

    fn array_body(&mut self) -> CodecResult<Vec<Row>> {
        let count = self.read_u32()? as usize;
        // Each tuple takes at least its arity prefix.
        let mut rows = Vec::with_capacity(count.min(self.remaining() / 4));
        for _ in 0..count {
            rows.push(self.tuple()?);
        }
        Ok(rows)
    }

    fn error_body(&mut self) -> CodecResult<ErrorPayload> {
        let code = self.read_u8()?;
        let kind = ErrorKind::from_code(code).ok_or(CodecError::UnknownErrorKind(code))?;
        let bytes = self.read_prefixed()?;
        let message = std::str::from_utf8(bytes)
            .map_err(|_| CodecError::InvalidUtf8)?
            .to_string();
        Ok(ErrorPayload { kind, message })
    }

    fn need(&self, needed: usize) -> CodecResult<()> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(CodecError::UnexpectedEof { needed, remaining });
        }
        Ok(())
    }

    fn read_u8(&mut self) -> CodecResult<u8> {
        self.need(1)?;
        Ok(self.input.get_u8())
    }

    fn read_u32(&mut self) -> CodecResult<u32> {
        self.need(4)?;
        Ok(self.input.get_u32_le())
    }

    fn read_prefixed(&mut self) -> CodecResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.need(len)?;
        let (head, tail) = self.input.split_at(len);
        self.input = tail;
        Ok(head)
    }
}
