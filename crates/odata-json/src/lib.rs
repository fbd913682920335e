//! Streaming reader and writer for the OData JSON wire format.
//!
//! The read side is a pull tokenizer ([`JsonReader`]) layered with
//! speculative lookahead and in-stream error detection
//! ([`BufferingJsonReader`]) and control-annotation reordering
//! ([`ReorderingJsonReader`]). The write side ([`JsonWriter`]) is a
//! push-style emitter with automatic separators, OData primitive formatting
//! and bounded-buffer flushing. Both sides come in synchronous and, behind
//! the `async-tokio` feature, tokio-backed flavors with identical
//! observable semantics.

#![allow(missing_docs)]

mod base64;
mod error;
mod node;
mod odata_error;
mod pool;
mod types;

mod reader;
mod writer;

#[cfg(test)]
mod tests;

pub use error::{ReadError, SyntaxError, WriteError};
pub use node::{BufferedNode, NodeKind, Number, Value};
pub use odata_error::{ODataError, ODataErrorDetail, ODataInnerError};
pub use pool::{BufferPool, SharedBufferPool};
pub use reader::{
    BinaryValueReader, BufferingJsonReader, Encoding, JsonReader, ReaderOptions,
    ReorderingJsonReader, TextValueReader,
};
pub use types::{Date, DateTimeOffset, Duration, Guid, TimeOfDay};
pub use writer::{
    JsonWriter, Primitive, StreamValueWriter, TextValueWriter, WriterOptions,
};

#[cfg(feature = "async-tokio")]
pub use reader::{
    AsyncBinaryValueReader, AsyncBufferingJsonReader, AsyncJsonReader, AsyncReorderingJsonReader,
    AsyncTextValueReader,
};
#[cfg(feature = "async-tokio")]
pub use writer::{AsyncJsonWriter, AsyncStreamValueWriter, AsyncTextValueWriter};
