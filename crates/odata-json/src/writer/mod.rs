//! The push-style JSON emitter.
//!
//! [`JsonWriter`] drives the scope-tracking [`core::WriterCore`] over any
//! [`std::io::Write`] sink. Commas and colons are inserted automatically,
//! primitive formatting follows the OData interoperability rules, and two
//! stream scopes let callers push large binary or text values through the
//! bounded buffer without materializing them.

mod core;
mod escape;
mod format;

#[cfg(feature = "async-tokio")]
mod async_writer;

use std::io::Write;

use crate::error::WriteError;
use crate::reader::Encoding;

pub use format::Primitive;

#[cfg(feature = "async-tokio")]
pub use async_writer::{AsyncJsonWriter, AsyncStreamValueWriter, AsyncTextValueWriter};

use self::core::WriterCore;

/// Options for the emitter.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// When true, 64-bit integers and decimals are written as quoted
    /// strings so JSON-number-as-double consumers cannot lose precision.
    pub ieee754_compatible: bool,
    /// Capacity of the bounded output buffer; flushing to the sink happens
    /// once pending content would exceed `buffer_size - 1`.
    pub buffer_size: usize,
    /// Output text encoding.
    pub encoding: Encoding,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            ieee754_compatible: false,
            buffer_size: 4 * 1024,
            encoding: Encoding::Utf8,
        }
    }
}

/// A streaming JSON writer over a [`Write`] sink.
pub struct JsonWriter<W> {
    core: WriterCore,
    sink: W,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, &WriterOptions::default())
    }

    pub fn with_options(sink: W, options: &WriterOptions) -> Self {
        Self {
            core: WriterCore::new(
                options.buffer_size,
                options.ieee754_compatible,
                options.encoding,
            ),
            sink,
        }
    }

    fn drain(&mut self) -> Result<(), WriteError> {
        while let Some(chunk) = self.core.take_pending() {
            self.sink.write_all(&chunk)?;
        }
        Ok(())
    }

    pub fn start_object(&mut self) -> Result<(), WriteError> {
        self.core.start_object()?;
        self.drain()
    }

    pub fn end_object(&mut self) -> Result<(), WriteError> {
        self.core.end_object()?;
        self.drain()
    }

    pub fn start_array(&mut self) -> Result<(), WriteError> {
        self.core.start_array()?;
        self.drain()
    }

    pub fn end_array(&mut self) -> Result<(), WriteError> {
        self.core.end_array()?;
        self.drain()
    }

    pub fn write_name(&mut self, name: &str) -> Result<(), WriteError> {
        self.core.write_name(name)?;
        self.drain()
    }

    pub fn write_value(&mut self, value: &Primitive) -> Result<(), WriteError> {
        self.core.write_primitive(value)?;
        self.drain()
    }

    /// Writes pre-formatted JSON verbatim: no escaping, no coercion. The
    /// caller is responsible for supplying valid JSON.
    pub fn write_raw_value(&mut self, text: &str) -> Result<(), WriteError> {
        self.core.write_raw_value(text)?;
        self.drain()
    }

    /// Opens a stream value scope accepting raw bytes, base64-encoding them
    /// incrementally into one JSON string.
    pub fn start_stream_value_scope(&mut self) -> Result<StreamValueWriter<'_, W>, WriteError> {
        self.core.begin_binary_stream()?;
        self.drain()?;
        Ok(StreamValueWriter { writer: self })
    }

    /// Opens a text value scope. `application/json` content passes through
    /// unescaped; any other content type is written as an escaped JSON
    /// string literal.
    pub fn start_text_value_scope(
        &mut self,
        content_type: &str,
    ) -> Result<TextValueWriter<'_, W>, WriteError> {
        self.core.begin_text_stream(content_type)?;
        self.drain()?;
        Ok(TextValueWriter { writer: self })
    }

    /// Pushes all pending content to the sink. Safe to call repeatedly; a
    /// flush with nothing pending is a no-op.
    pub fn flush(&mut self) -> Result<(), WriteError> {
        self.core.spill_all();
        self.drain()?;
        self.sink.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying sink.
    pub fn into_inner(mut self) -> Result<W, WriteError> {
        self.flush()?;
        Ok(self.sink)
    }
}

/// The byte sink of an open stream value scope.
pub struct StreamValueWriter<'a, W: Write> {
    writer: &'a mut JsonWriter<W>,
}

impl<W: Write> StreamValueWriter<'_, W> {
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        self.writer.core.append_binary(bytes)?;
        self.writer.drain()
    }

    /// Completes the base64 value and closes the scope.
    pub fn finish(self) -> Result<(), WriteError> {
        self.writer.core.end_binary_stream()?;
        self.writer.drain()
    }
}

/// The character sink of an open text value scope.
pub struct TextValueWriter<'a, W: Write> {
    writer: &'a mut JsonWriter<W>,
}

impl<W: Write> TextValueWriter<'_, W> {
    pub fn write_chars(&mut self, s: &str) -> Result<(), WriteError> {
        self.writer.core.append_text(s)?;
        self.writer.drain()
    }

    /// Closes the scope, terminating the string literal if one was opened.
    pub fn finish(self) -> Result<(), WriteError> {
        self.writer.core.end_text_stream()?;
        self.writer.drain()
    }
}
