//! Tokio-backed drivers over the same chunk-fed cores as the synchronous
//! readers.
//!
//! Only the refill primitive differs: a buffer refill awaits the underlying
//! [`AsyncRead`]. Scanning never suspends mid-token because the cores
//! themselves never perform I/O, which keeps the observable node sequences
//! byte-for-byte identical to the synchronous drivers.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::base64::Base64Decoder;
use crate::error::{ReadError, SyntaxError};
use crate::node::{NodeKind, Value};
use crate::odata_error::ODataError;

use super::buffering::{BufferingCore, Event, ProbeOutcome, StreamStart};
use super::core::CoreReader;
use super::reordering::ReorderingCore;
use super::{get_value_impl, ReaderOptions};

struct AsyncPump<R> {
    input: R,
    chunk: Vec<u8>,
    eof_sent: bool,
}

enum Refill<'a> {
    Bytes(&'a [u8]),
    End,
}

impl<R: AsyncRead + Unpin> AsyncPump<R> {
    fn new(input: R, chunk_size: usize) -> Self {
        Self {
            input,
            chunk: vec![0; chunk_size.max(1)],
            eof_sent: false,
        }
    }

    async fn refill(&mut self) -> Result<Refill<'_>, ReadError> {
        if self.eof_sent {
            return Err(SyntaxError::UnexpectedEndOfInput.into());
        }
        let n = self.input.read(&mut self.chunk).await?;
        if n == 0 {
            self.eof_sent = true;
            Ok(Refill::End)
        } else {
            Ok(Refill::Bytes(&self.chunk[..n]))
        }
    }
}

/// Async counterpart of the crate-private synchronous stream-chunk trait.
/// Public only so it can appear in bounds; the module keeps it sealed.
pub trait AsyncStreamChunks {
    #[allow(async_fn_in_trait)]
    async fn stream_chunk(&mut self, out: &mut String, max: usize) -> Result<bool, ReadError>;
}

enum AsyncTextSource<'a, S> {
    Live(&'a mut S),
    Buffered { text: String, pos: usize },
}

/// Incremental access to a string value, async flavor.
pub struct AsyncTextValueReader<'a, S> {
    source: AsyncTextSource<'a, S>,
    done: bool,
}

impl<'a, S: AsyncStreamChunks> AsyncTextValueReader<'a, S> {
    fn live(source: &'a mut S) -> Self {
        Self {
            source: AsyncTextSource::Live(source),
            done: false,
        }
    }

    fn buffered(text: String) -> Self {
        Self {
            source: AsyncTextSource::Buffered { text, pos: 0 },
            done: false,
        }
    }

    /// Appends up to `max` characters to `out`, returning true once the
    /// value is exhausted.
    pub async fn read_chars(&mut self, out: &mut String, max: usize) -> Result<bool, ReadError> {
        if self.done {
            return Ok(true);
        }
        let done = match &mut self.source {
            AsyncTextSource::Live(chunks) => chunks.stream_chunk(out, max).await?,
            AsyncTextSource::Buffered { text, pos } => {
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

    pub async fn read_to_string(&mut self) -> Result<String, ReadError> {
        let mut out = String::new();
        while !self.read_chars(&mut out, usize::MAX).await? {}
        Ok(out)
    }
}

/// Incremental access to a base64 binary value, async flavor.
pub struct AsyncBinaryValueReader<'a, S> {
    text: AsyncTextValueReader<'a, S>,
    decoder: Base64Decoder,
    scratch: String,
}

impl<'a, S: AsyncStreamChunks> AsyncBinaryValueReader<'a, S> {
    fn new(text: AsyncTextValueReader<'a, S>) -> Self {
        Self {
            text,
            decoder: Base64Decoder::new(),
            scratch: String::new(),
        }
    }

    pub async fn read_bytes(
        &mut self,
        out: &mut Vec<u8>,
        max_chars: usize,
    ) -> Result<bool, ReadError> {
        self.scratch.clear();
        let done = self.text.read_chars(&mut self.scratch, max_chars).await?;
        self.decoder.decode_chunk(&self.scratch, out)?;
        if done {
            self.decoder.finish()?;
        }
        Ok(done)
    }

    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, ReadError> {
        let mut out = Vec::new();
        while !self.read_bytes(&mut out, 4 * 1024).await? {}
        Ok(out)
    }
}

async fn skip_value_async<P>(reader: &mut P) -> Result<(), ReadError>
where
    P: AsyncNodePull,
{
    match reader.pulled_kind() {
        NodeKind::Property => {
            reader.pull().await?;
            Box::pin(skip_value_async(reader)).await
        }
        NodeKind::StartObject | NodeKind::StartArray => {
            let mut depth = 1usize;
            while depth > 0 {
                reader.pull().await?;
                match reader.pulled_kind() {
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

trait AsyncNodePull {
    async fn pull(&mut self) -> Result<bool, ReadError>;
    fn pulled_kind(&self) -> NodeKind;
}

macro_rules! common_async_accessors {
    () => {
        pub fn node_kind(&self) -> NodeKind {
            self.core.node_kind()
        }

        pub fn value(&self) -> Option<&Value> {
            self.core.value()
        }

        pub fn property_name(&self) -> Option<&str> {
            if self.core.node_kind() == NodeKind::Property {
                self.core.value().and_then(Value::as_str)
            } else {
                None
            }
        }

        pub fn get_value(&self) -> Result<Value, ReadError> {
            get_value_impl(self.core.node_kind(), self.core.value())
        }

        pub async fn skip_value(&mut self) -> Result<(), ReadError> {
            skip_value_async(self).await
        }
    };
}

/// The plain streaming tokenizer over an [`AsyncRead`] source.
pub struct AsyncJsonReader<R> {
    core: CoreReader,
    pump: AsyncPump<R>,
}

impl<R: AsyncRead + Unpin> AsyncJsonReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_options(input, &ReaderOptions::default())
    }

    pub fn with_options(input: R, options: &ReaderOptions) -> Self {
        Self {
            core: options.make_core(),
            pump: AsyncPump::new(input, options.chunk_size),
        }
    }

    async fn refill(&mut self) -> Result<(), ReadError> {
        match self.pump.refill().await? {
            Refill::Bytes(bytes) => self.core.feed(bytes)?,
            Refill::End => self.core.close()?,
        }
        Ok(())
    }

    /// Advances to the next node. Returns false at end of input.
    pub async fn read(&mut self) -> Result<bool, ReadError> {
        loop {
            if let Some(more) = self.core.try_read()? {
                return Ok(more);
            }
            self.refill().await?;
        }
    }

    pub async fn can_stream(&mut self) -> Result<bool, ReadError> {
        loop {
            if let Some(answer) = self.core.try_can_stream()? {
                return Ok(answer);
            }
            self.refill().await?;
        }
    }

    pub async fn text_value_reader(
        &mut self,
    ) -> Result<AsyncTextValueReader<'_, Self>, ReadError> {
        loop {
            if self.core.try_begin_stream()?.is_some() {
                return Ok(AsyncTextValueReader::live(self));
            }
            self.refill().await?;
        }
    }

    pub async fn binary_value_reader(
        &mut self,
    ) -> Result<AsyncBinaryValueReader<'_, Self>, ReadError> {
        Ok(AsyncBinaryValueReader::new(self.text_value_reader().await?))
    }

    common_async_accessors!();
}

impl<R: AsyncRead + Unpin> AsyncStreamChunks for AsyncJsonReader<R> {
    async fn stream_chunk(&mut self, out: &mut String, max: usize) -> Result<bool, ReadError> {
        loop {
            if let Some(done) = self.core.try_stream_text(out, max)? {
                return Ok(done);
            }
            self.refill().await?;
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncNodePull for AsyncJsonReader<R> {
    async fn pull(&mut self) -> Result<bool, ReadError> {
        self.read().await
    }

    fn pulled_kind(&self) -> NodeKind {
        self.node_kind()
    }
}

/// The lookahead reader over an [`AsyncRead`] source.
pub struct AsyncBufferingJsonReader<R> {
    core: BufferingCore,
    pump: AsyncPump<R>,
}

impl<R: AsyncRead + Unpin> AsyncBufferingJsonReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_options(input, &ReaderOptions::default())
    }

    pub fn with_options(input: R, options: &ReaderOptions) -> Self {
        Self {
            core: BufferingCore::new(options.make_core(), options),
            pump: AsyncPump::new(input, options.chunk_size),
        }
    }

    async fn refill(&mut self) -> Result<(), ReadError> {
        match self.pump.refill().await? {
            Refill::Bytes(bytes) => self.core.feed(bytes)?,
            Refill::End => self.core.close()?,
        }
        Ok(())
    }

    /// Advances to the next node. An intercepted in-stream error surfaces
    /// as [`ReadError::InStream`], carrying the structured error to the
    /// caller even when discovery happens deep inside an awaited refill.
    pub async fn read(&mut self) -> Result<bool, ReadError> {
        loop {
            match self.core.try_read()? {
                Some(Event::Node { more, .. }) => return Ok(more),
                Some(Event::InStreamError(err)) => return Err(ReadError::InStream(err)),
                None => self.refill().await?,
            }
        }
    }

    pub fn start_buffering(&mut self) {
        self.core.start_buffering();
    }

    pub fn stop_buffering(&mut self) {
        self.core.stop_buffering();
    }

    /// The in-stream error protocol; see the synchronous
    /// [`super::BufferingJsonReader::start_buffering_and_try_read_in_stream_error`].
    pub async fn start_buffering_and_try_read_in_stream_error(
        &mut self,
        trigger: &str,
    ) -> Result<Option<ODataError>, ReadError> {
        if !self.core.arm_explicit_probe(trigger) {
            return Ok(None);
        }
        loop {
            match self.core.try_probe_step()? {
                Some(ProbeOutcome::Error(err)) => return Ok(Some(err)),
                Some(ProbeOutcome::Clean) => return Ok(None),
                None => self.refill().await?,
            }
        }
    }

    pub async fn can_stream(&mut self) -> Result<bool, ReadError> {
        loop {
            if let Some(answer) = self.core.try_can_stream()? {
                return Ok(answer);
            }
            self.refill().await?;
        }
    }

    pub async fn text_value_reader(
        &mut self,
    ) -> Result<AsyncTextValueReader<'_, Self>, ReadError> {
        loop {
            match self.core.try_begin_stream()? {
                Some(StreamStart::Live) => return Ok(AsyncTextValueReader::live(self)),
                Some(StreamStart::Buffered(text)) => {
                    return Ok(AsyncTextValueReader::buffered(text));
                }
                None => self.refill().await?,
            }
        }
    }

    pub async fn binary_value_reader(
        &mut self,
    ) -> Result<AsyncBinaryValueReader<'_, Self>, ReadError> {
        Ok(AsyncBinaryValueReader::new(self.text_value_reader().await?))
    }

    common_async_accessors!();
}

impl<R: AsyncRead + Unpin> AsyncStreamChunks for AsyncBufferingJsonReader<R> {
    async fn stream_chunk(&mut self, out: &mut String, max: usize) -> Result<bool, ReadError> {
        loop {
            if let Some(done) = self.core.try_stream_text(out, max)? {
                return Ok(done);
            }
            self.refill().await?;
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncNodePull for AsyncBufferingJsonReader<R> {
    async fn pull(&mut self) -> Result<bool, ReadError> {
        self.read().await
    }

    fn pulled_kind(&self) -> NodeKind {
        self.node_kind()
    }
}

/// The full reader chain over an [`AsyncRead`] source.
pub struct AsyncReorderingJsonReader<R> {
    core: ReorderingCore,
    pump: AsyncPump<R>,
}

impl<R: AsyncRead + Unpin> AsyncReorderingJsonReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_options(input, &ReaderOptions::default())
    }

    pub fn with_options(input: R, options: &ReaderOptions) -> Self {
        Self {
            core: ReorderingCore::new(BufferingCore::new(options.make_core(), options)),
            pump: AsyncPump::new(input, options.chunk_size),
        }
    }

    async fn refill(&mut self) -> Result<(), ReadError> {
        match self.pump.refill().await? {
            Refill::Bytes(bytes) => self.core.inner_mut().feed(bytes)?,
            Refill::End => self.core.inner_mut().close()?,
        }
        Ok(())
    }

    pub async fn read(&mut self) -> Result<bool, ReadError> {
        loop {
            match self.core.try_read()? {
                Some(Event::Node { more, .. }) => return Ok(more),
                Some(Event::InStreamError(err)) => return Err(ReadError::InStream(err)),
                None => self.refill().await?,
            }
        }
    }

    pub fn start_buffering(&mut self) {
        self.core.inner_mut().start_buffering();
    }

    pub fn stop_buffering(&mut self) {
        self.core.inner_mut().stop_buffering();
    }

    pub async fn start_buffering_and_try_read_in_stream_error(
        &mut self,
        trigger: &str,
    ) -> Result<Option<ODataError>, ReadError> {
        if !self.core.inner_mut().arm_explicit_probe(trigger) {
            return Ok(None);
        }
        loop {
            match self.core.inner_mut().try_probe_step()? {
                Some(ProbeOutcome::Error(err)) => return Ok(Some(err)),
                Some(ProbeOutcome::Clean) => return Ok(None),
                None => self.refill().await?,
            }
        }
    }

    pub async fn can_stream(&mut self) -> Result<bool, ReadError> {
        loop {
            if let Some(answer) = self.core.try_can_stream()? {
                return Ok(answer);
            }
            self.refill().await?;
        }
    }

    pub async fn text_value_reader(
        &mut self,
    ) -> Result<AsyncTextValueReader<'_, Self>, ReadError> {
        loop {
            match self.core.try_begin_stream()? {
                Some(StreamStart::Live) => return Ok(AsyncTextValueReader::live(self)),
                Some(StreamStart::Buffered(text)) => {
                    return Ok(AsyncTextValueReader::buffered(text));
                }
                None => self.refill().await?,
            }
        }
    }

    pub async fn binary_value_reader(
        &mut self,
    ) -> Result<AsyncBinaryValueReader<'_, Self>, ReadError> {
        Ok(AsyncBinaryValueReader::new(self.text_value_reader().await?))
    }

    common_async_accessors!();
}

impl<R: AsyncRead + Unpin> AsyncStreamChunks for AsyncReorderingJsonReader<R> {
    async fn stream_chunk(&mut self, out: &mut String, max: usize) -> Result<bool, ReadError> {
        loop {
            if let Some(done) = self.core.try_stream_text(out, max)? {
                return Ok(done);
            }
            self.refill().await?;
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncNodePull for AsyncReorderingJsonReader<R> {
    async fn pull(&mut self) -> Result<bool, ReadError> {
        self.read().await
    }

    fn pulled_kind(&self) -> NodeKind {
        self.node_kind()
    }
}
