//! # ColderStorage Codec
//!
//! The buffer protocol shared by the engine and its foreign callers.
//!
//! Every payload starts with a marker byte:
//!
//! - `A`: an array of tuples, `| count u32 | (arity u32, value*)* |`
//! - `E`: an error record, `| kind u8 | len u32 | message |`
//!
//! Values are tagged with their [`Type`]: null carries no body, integers and
//! reals are eight little-endian bytes, text and blobs are length-prefixed.
//! A schema is an array of `(name, tag)` pairs, so it decodes with the same
//! code as any other array. Rows stored on disk use the bare tuple encoding
//! without a marker.
//!
//! ## Usage
//!
//! ```
//! use colderstorage_codec::{decode_array, encode_array, Value};
//!
//! let rows = vec![vec![Value::Integer(1), Value::Text("apple".into())]];
//! let bytes = encode_array(&rows).unwrap();
//! assert_eq!(decode_array(&bytes).unwrap(), rows);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{
    decode_array, decode_error, decode_payload, decode_row, decode_schema, schema_from_rows,
    ErrorPayload, Payload, PayloadDecoder,
};
pub use encoder::{
    encode_array, encode_error, encode_row, encode_schema, schema_rows, PayloadEncoder,
    ARRAY_MARKER, ERROR_MARKER,
};
pub use error::{CodecError, CodecResult, ErrorKind};
pub use value::{Column, Row, Schema, Type, Value};
