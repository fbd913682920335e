//! The pull reader chain.
//!
//! [`JsonReader`] is the plain tokenizer driver: one node per [`read`] call,
//! pulled from any [`std::io::Read`] source in chunks whose boundaries are
//! never observable in the results. [`BufferingJsonReader`] layers lookahead
//! and the in-stream error protocol on top of it, and
//! [`ReorderingJsonReader`] additionally surfaces control annotations ahead
//! of data properties. All three expose the same node-at-a-time surface.
//!
//! [`read`]: JsonReader::read

mod buffering;
mod core;
mod reordering;
mod scanner;
mod source;

#[cfg(feature = "async-tokio")]
mod async_reader;

use std::io::Read;
use std::sync::Arc;

use crate::base64::Base64Decoder;
use crate::error::{ReadError, SyntaxError};
use crate::node::{NodeKind, Value};
use crate::pool::BufferPool;

pub use buffering::BufferingJsonReader;
pub use reordering::ReorderingJsonReader;
pub use source::Encoding;

#[cfg(feature = "async-tokio")]
pub use async_reader::{
    AsyncBinaryValueReader, AsyncBufferingJsonReader, AsyncJsonReader, AsyncReorderingJsonReader,
    AsyncTextValueReader,
};

use self::core::CoreReader;

/// Options shared by every reader in the chain.
#[derive(Clone)]
pub struct ReaderOptions {
    /// When true (the default), decimal literals that do not fit `i64` are
    /// decoded losslessly as [`crate::Number::Decimal`]. When false, every
    /// non-integer number is narrowed to an IEEE-754 double.
    pub ieee754_compatible: bool,
    /// Maximum container nesting depth before the reader refuses input.
    pub max_depth: usize,
    /// Size of the byte chunks pulled from the underlying source.
    pub chunk_size: usize,
    /// Input encoding. `None` detects UTF-16/UTF-32 from a BOM and falls
    /// back to UTF-8.
    pub encoding: Option<Encoding>,
    /// Optional arena the tokenizer rents its character buffer from.
    pub buffer_pool: Option<Arc<dyn BufferPool + Send + Sync>>,
    /// When set, [`BufferingJsonReader::read`] transparently probes any
    /// top-level property with this name for an in-stream error object and
    /// surfaces a hit as [`ReadError::InStream`].
    pub in_stream_error_trigger: Option<String>,
    /// Recursion bound for `innererror`/`internalexception` nesting while
    /// parsing an in-stream error candidate.
    pub max_inner_error_depth: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            ieee754_compatible: true,
            max_depth: 100,
            chunk_size: 4 * 1024,
            encoding: None,
            buffer_pool: None,
            in_stream_error_trigger: None,
            max_inner_error_depth: 5,
        }
    }
}

impl std::fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("ieee754_compatible", &self.ieee754_compatible)
            .field("max_depth", &self.max_depth)
            .field("chunk_size", &self.chunk_size)
            .field("encoding", &self.encoding)
            .field("buffer_pool", &self.buffer_pool.is_some())
            .field("in_stream_error_trigger", &self.in_stream_error_trigger)
            .field("max_inner_error_depth", &self.max_inner_error_depth)
            .finish()
    }
}

impl ReaderOptions {
    fn make_core(&self) -> CoreReader {
        CoreReader::new(
            self.ieee754_compatible,
            self.max_depth,
            self.encoding,
            self.buffer_pool
                .clone()
                .map(|p| p as Arc<dyn BufferPool>),
        )
    }
}

/// The refill side of a synchronous driver.
struct Pump<R> {
    input: R,
    chunk: Vec<u8>,
    eof_sent: bool,
}

enum Refill<'a> {
    Bytes(&'a [u8]),
    End,
}

impl<R: Read> Pump<R> {
    fn new(input: R, chunk_size: usize) -> Self {
        Self {
            input,
            chunk: vec![0; chunk_size.max(1)],
            eof_sent: false,
        }
    }

    fn refill(&mut self) -> Result<Refill<'_>, ReadError> {
        if self.eof_sent {
            // The core asked for more input after end of input was already
            // delivered; the payload must be truncated.
            return Err(SyntaxError::UnexpectedEndOfInput.into());
        }
        let n = self.input.read(&mut self.chunk)?;
        if n == 0 {
            log::trace!("input exhausted, delivering end of input");
            self.eof_sent = true;
            Ok(Refill::End)
        } else {
            log::trace!("refilled {n} bytes");
            Ok(Refill::Bytes(&self.chunk[..n]))
        }
    }
}

/// Node-pull surface shared by the three synchronous readers, so the
/// structural skip below works over any of them.
pub(crate) trait NodePull {
    fn pull(&mut self) -> Result<bool, ReadError>;
    fn pulled_kind(&self) -> NodeKind;
}

fn skip_value_impl(r: &mut dyn NodePull) -> Result<(), ReadError> {
    match r.pulled_kind() {
        NodeKind::Property => {
            r.pull()?;
            skip_value_impl(r)
        }
        NodeKind::StartObject | NodeKind::StartArray => {
            let mut depth = 1usize;
            while depth > 0 {
                r.pull()?;
                match r.pulled_kind() {
                    NodeKind::StartObject | NodeKind::StartArray => depth += 1,
                    NodeKind::EndObject | NodeKind::EndArray => depth -= 1,
                    NodeKind::EndOfInput => {
                        return Err(SyntaxError::UnexpectedEndOfInput.into());
                    }
                    _ => {}
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Chunked character delivery from a live or replayed stream carve-out.
pub(crate) trait StreamChunks {
    /// Appends up to `max` characters to `out`. `Ok(true)` means the
    /// underlying value is complete.
    fn stream_chunk(&mut self, out: &mut String, max: usize) -> Result<bool, ReadError>;
}

enum TextSource<'a> {
    Live(&'a mut dyn StreamChunks),
    Buffered { text: String, pos: usize },
}

/// Incremental access to a string value carved out of the payload.
///
/// Obtained from one of the readers while positioned on a streamable value;
/// the parent reader is repositioned past the value once the carve-out is
/// drained.
pub struct TextValueReader<'a> {
    source: TextSource<'a>,
    done: bool,
}

impl<'a> TextValueReader<'a> {
    pub(crate) fn live(source: &'a mut dyn StreamChunks) -> Self {
        Self {
            source: TextSource::Live(source),
            done: false,
        }
    }

    pub(crate) fn buffered(text: String) -> Self {
        Self {
            source: TextSource::Buffered { text, pos: 0 },
            done: false,
        }
    }

    /// Appends up to `max` characters to `out`, returning true once the
    /// value is exhausted.
    pub fn read_chars(&mut self, out: &mut String, max: usize) -> Result<bool, ReadError> {
        if self.done {
            return Ok(true);
        }
        let done = match &mut self.source {
            TextSource::Live(chunks) => chunks.stream_chunk(out, max)?,
            TextSource::Buffered { text, pos } => {
                let mut taken = 0;
                for c in text[*pos..].chars() {
                    if taken >= max {
                        break;
                    }
                    out.push(c);
                    *pos += c.len_utf8();
                    taken += 1;
                }
                *pos >= text.len()
            }
        };
        self.done = done;
        Ok(done)
    }

    /// Drains the rest of the value into one string.
    pub fn read_to_string(&mut self) -> Result<String, ReadError> {
        let mut out = String::new();
        while !self.read_chars(&mut out, usize::MAX)? {}
        Ok(out)
    }
}

/// Incremental access to a base64 binary value carved out of the payload.
pub struct BinaryValueReader<'a> {
    text: TextValueReader<'a>,
    decoder: Base64Decoder,
    scratch: String,
}

impl<'a> BinaryValueReader<'a> {
    pub(crate) fn new(text: TextValueReader<'a>) -> Self {
        Self {
            text,
            decoder: Base64Decoder::new(),
            scratch: String::new(),
        }
    }

    /// Appends decoded bytes to `out`, pulling up to `max_chars` base64
    /// characters per call. Returns true once the value is exhausted.
    pub fn read_bytes(&mut self, out: &mut Vec<u8>, max_chars: usize) -> Result<bool, ReadError> {
        self.scratch.clear();
        let done = self.text.read_chars(&mut self.scratch, max_chars)?;
        self.decoder.decode_chunk(&self.scratch, out)?;
        if done {
            self.decoder.finish()?;
        }
        Ok(done)
    }

    /// Drains the rest of the value into one byte vector.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, ReadError> {
        let mut out = Vec::new();
        while !self.read_bytes(&mut out, 4 * 1024)? {}
        Ok(out)
    }
}

/// The plain streaming tokenizer over a [`Read`] source.
pub struct JsonReader<R> {
    core: CoreReader,
    pump: Pump<R>,
}

impl<R: Read> JsonReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_options(input, &ReaderOptions::default())
    }

    pub fn with_options(input: R, options: &ReaderOptions) -> Self {
        Self {
            core: options.make_core(),
            pump: Pump::new(input, options.chunk_size),
        }
    }

    /// Advances to the next node. Returns false at end of input.
    pub fn read(&mut self) -> Result<bool, ReadError> {
        loop {
            if let Some(more) = self.core.try_read()? {
                return Ok(more);
            }
            match self.pump.refill()? {
                Refill::Bytes(bytes) => self.core.feed(bytes)?,
                Refill::End => self.core.close()?,
            }
        }
    }

    /// Advances and checks that the next node is a property; returns its
    /// name.
    pub fn read_property_name(&mut self) -> Result<String, ReadError> {
        self.expect_next(NodeKind::Property)?;
        match self.core.value().and_then(Value::as_str) {
            Some(name) => Ok(name.to_owned()),
            None => Err(SyntaxError::InStreamState.into()),
        }
    }

    /// Advances and checks that the next node opens an object.
    pub fn read_start_object(&mut self) -> Result<(), ReadError> {
        self.expect_next(NodeKind::StartObject)
    }

    /// Advances and checks that the next node closes an object.
    pub fn read_end_object(&mut self) -> Result<(), ReadError> {
        self.expect_next(NodeKind::EndObject)
    }

    /// Advances and checks that the next node opens an array.
    pub fn read_start_array(&mut self) -> Result<(), ReadError> {
        self.expect_next(NodeKind::StartArray)
    }

    /// Advances and checks that the next node closes an array.
    pub fn read_end_array(&mut self) -> Result<(), ReadError> {
        self.expect_next(NodeKind::EndArray)
    }

    /// Advances and checks that the next node is a primitive; returns its
    /// decoded value.
    pub fn read_primitive(&mut self) -> Result<Value, ReadError> {
        self.expect_next(NodeKind::PrimitiveValue)?;
        self.get_value()
    }

    fn expect_next(&mut self, expected: NodeKind) -> Result<(), ReadError> {
        self.read()?;
        let actual = self.core.node_kind();
        if actual == expected {
            Ok(())
        } else {
            Err(SyntaxError::UnexpectedNodeKind { expected, actual }.into())
        }
    }

    /// The kind of the node the reader is positioned on.
    pub fn node_kind(&self) -> NodeKind {
        self.core.node_kind()
    }

    /// The decoded value of the current node, if it carries one.
    pub fn value(&self) -> Option<&Value> {
        self.core.value()
    }

    /// The property name when positioned on a [`NodeKind::Property`] node.
    pub fn property_name(&self) -> Option<&str> {
        if self.core.node_kind() == NodeKind::Property {
            self.core.value().and_then(Value::as_str)
        } else {
            None
        }
    }

    /// The current node's value; structural nodes yield `Null`. Fails if the
    /// value was consumed by a stream carve-out.
    pub fn get_value(&self) -> Result<Value, ReadError> {
        get_value_impl(self.core.node_kind(), self.core.value())
    }

    /// Whether the value at the read position can be drained through a
    /// stream carve-out (strings and `null` qualify).
    pub fn can_stream(&mut self) -> Result<bool, ReadError> {
        loop {
            if let Some(answer) = self.core.try_can_stream()? {
                return Ok(answer);
            }
            match self.pump.refill()? {
                Refill::Bytes(bytes) => self.core.feed(bytes)?,
                Refill::End => self.core.close()?,
            }
        }
    }

    /// Carves the value at the read position out as an incremental text
    /// stream.
    pub fn text_value_reader(&mut self) -> Result<TextValueReader<'_>, ReadError> {
        loop {
            if self.core.try_begin_stream()?.is_some() {
                return Ok(TextValueReader::live(self));
            }
            match self.pump.refill()? {
                Refill::Bytes(bytes) => self.core.feed(bytes)?,
                Refill::End => self.core.close()?,
            }
        }
    }

    /// Carves the value at the read position out as an incremental binary
    /// stream, decoding base64 on the way.
    pub fn binary_value_reader(&mut self) -> Result<BinaryValueReader<'_>, ReadError> {
        Ok(BinaryValueReader::new(self.text_value_reader()?))
    }

    /// Skips the value at the current node, including whole subtrees.
    pub fn skip_value(&mut self) -> Result<(), ReadError> {
        skip_value_impl(self)
    }
}

impl<R: Read> NodePull for JsonReader<R> {
    fn pull(&mut self) -> Result<bool, ReadError> {
        self.read()
    }

    fn pulled_kind(&self) -> NodeKind {
        self.node_kind()
    }
}

impl<R: Read> StreamChunks for JsonReader<R> {
    fn stream_chunk(&mut self, out: &mut String, max: usize) -> Result<bool, ReadError> {
        loop {
            if let Some(done) = self.core.try_stream_text(out, max)? {
                return Ok(done);
            }
            match self.pump.refill()? {
                Refill::Bytes(bytes) => self.core.feed(bytes)?,
                Refill::End => self.core.close()?,
            }
        }
    }
}

fn get_value_impl(kind: NodeKind, value: Option<&Value>) -> Result<Value, ReadError> {
    match kind {
        NodeKind::PrimitiveValue => match value {
            Some(v) => Ok(v.clone()),
            None => Err(SyntaxError::InStreamState.into()),
        },
        NodeKind::Property => match value {
            Some(v) => Ok(v.clone()),
            None => Err(SyntaxError::InStreamState.into()),
        },
        _ => Ok(Value::Null),
    }
}
