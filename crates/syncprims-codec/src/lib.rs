//! Declarative binary layouts for the sync protocol stack.
//!
//! Every wire structure (SLP headers, PADP fragment headers, CMP packets, DLP
//! arguments) is described once as a [`Schema`]: an ordered, `const`-built
//! list of [`FieldDescriptor`]s. The codec walks the schema to turn a
//! [`Record`] into bytes and back. There is no runtime reflection.
//!
//! Length and count fields are never stored. A field declared with
//! [`FieldDescriptor::length_of`] is recomputed from its target's actual size
//! on every encode, and only read (to size the target) on decode.

pub mod codec;
pub mod error;
pub mod schema;
pub mod value;
pub mod wire;

pub use codec::{
    decode, decode_prefix, decode_value, encode, encode_into, encode_value, latin1_decode,
    latin1_encode,
};
pub use error::{CodecError, Result};
pub use schema::{ByteOrder, FieldDescriptor, Length, Schema, WireType};
pub use value::{Record, Value};
pub use wire::{WireRecord, WireValue};
