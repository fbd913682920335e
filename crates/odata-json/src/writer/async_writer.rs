//! Tokio-backed driver over the same emitter core as the synchronous
//! writer. Suspension happens only while draining sink-ready chunks, never
//! mid-token.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::WriteError;

use super::core::WriterCore;
use super::{Primitive, WriterOptions};

/// A streaming JSON writer over an [`AsyncWrite`] sink.
pub struct AsyncJsonWriter<W> {
    core: WriterCore,
    sink: W,
}

impl<W: AsyncWrite + Unpin> AsyncJsonWriter<W> {
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

    async fn drain(&mut self) -> Result<(), WriteError> {
        while let Some(chunk) = self.core.take_pending() {
            self.sink.write_all(&chunk).await?;
        }
        Ok(())
    }

    pub async fn start_object(&mut self) -> Result<(), WriteError> {
        self.core.start_object()?;
        self.drain().await
    }

    pub async fn end_object(&mut self) -> Result<(), WriteError> {
        self.core.end_object()?;
        self.drain().await
    }

    pub async fn start_array(&mut self) -> Result<(), WriteError> {
        self.core.start_array()?;
        self.drain().await
    }

    pub async fn end_array(&mut self) -> Result<(), WriteError> {
        self.core.end_array()?;
        self.drain().await
    }

    pub async fn write_name(&mut self, name: &str) -> Result<(), WriteError> {
        self.core.write_name(name)?;
        self.drain().await
    }

    pub async fn write_value(&mut self, value: &Primitive) -> Result<(), WriteError> {
        self.core.write_primitive(value)?;
        self.drain().await
    }

    pub async fn write_raw_value(&mut self, text: &str) -> Result<(), WriteError> {
        self.core.write_raw_value(text)?;
        self.drain().await
    }

    pub async fn start_stream_value_scope(
        &mut self,
    ) -> Result<AsyncStreamValueWriter<'_, W>, WriteError> {
        self.core.begin_binary_stream()?;
        self.drain().await?;
        Ok(AsyncStreamValueWriter { writer: self })
    }

    pub async fn start_text_value_scope(
        &mut self,
        content_type: &str,
    ) -> Result<AsyncTextValueWriter<'_, W>, WriteError> {
        self.core.begin_text_stream(content_type)?;
        self.drain().await?;
        Ok(AsyncTextValueWriter { writer: self })
    }

    /// Pushes all pending content to the sink; idempotent.
    pub async fn flush(&mut self) -> Result<(), WriteError> {
        self.core.spill_all();
        self.drain().await?;
        self.sink.flush().await?;
        Ok(())
    }

    pub async fn into_inner(mut self) -> Result<W, WriteError> {
        self.flush().await?;
        Ok(self.sink)
    }
}

/// The byte sink of an open stream value scope, async flavor.
pub struct AsyncStreamValueWriter<'a, W: AsyncWrite + Unpin> {
    writer: &'a mut AsyncJsonWriter<W>,
}

impl<W: AsyncWrite + Unpin> AsyncStreamValueWriter<'_, W> {
    pub async fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        self.writer.core.append_binary(bytes)?;
        self.writer.drain().await
    }

    pub async fn finish(self) -> Result<(), WriteError> {
        self.writer.core.end_binary_stream()?;
        self.writer.drain().await
    }
}

/// The character sink of an open text value scope, async flavor.
pub struct AsyncTextValueWriter<'a, W: AsyncWrite + Unpin> {
    writer: &'a mut AsyncJsonWriter<W>,
}

impl<W: AsyncWrite + Unpin> AsyncTextValueWriter<'_, W> {
    pub async fn write_chars(&mut self, s: &str) -> Result<(), WriteError> {
        self.writer.core.append_text(s)?;
        self.writer.drain().await
    }

    pub async fn finish(self) -> Result<(), WriteError> {
        self.writer.core.end_text_stream()?;
        self.writer.drain().await
    }
}
