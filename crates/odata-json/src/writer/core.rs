//! The sink-free emitter core.
//!
//! All output is staged through a bounded buffer with a flush threshold one
//! byte below its capacity: a write that would cross the threshold first
//! moves the buffer's content to the pending queue, and a single piece
//! larger than the threshold goes to the queue directly, bypassing the
//! buffer while preserving order. Escape sequences and formatted tokens are
//! pushed as atomic pieces so a flush boundary can never land inside one.
//! Drivers drain the pending queue into their sink after every operation.

use std::collections::VecDeque;

use crate::base64::Base64Encoder;
use crate::error::WriteError;
use crate::reader::Encoding;

use super::escape::escape_of;
use super::format::{format_primitive, Formatted};
use super::Primitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Object,
    Array,
}

impl ScopeKind {
    fn name(self) -> &'static str {
        match self {
            ScopeKind::Object => "object",
            ScopeKind::Array => "array",
        }
    }
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    items: usize,
    name_written: bool,
}

#[derive(Debug)]
enum StreamKind {
    Binary(Base64Encoder),
    Text { raw: bool },
}

fn encode_text(s: &str, encoding: Encoding, out: &mut Vec<u8>) {
    match encoding {
        Encoding::Utf8 => out.extend_from_slice(s.as_bytes()),
        Encoding::Utf16Le => {
            for unit in s.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
        }
        Encoding::Utf16Be => {
            for unit in s.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
        }
        Encoding::Utf32Le => {
            for c in s.chars() {
                out.extend_from_slice(&(c as u32).to_le_bytes());
            }
        }
        Encoding::Utf32Be => {
            for c in s.chars() {
                out.extend_from_slice(&(c as u32).to_be_bytes());
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct WriterCore {
    buf: Vec<u8>,
    threshold: usize,
    pending: VecDeque<Vec<u8>>,
    scopes: Vec<Scope>,
    stream: Option<StreamKind>,
    ieee754_compatible: bool,
    encoding: Encoding,
}

impl WriterCore {
    pub(crate) fn new(buffer_size: usize, ieee754_compatible: bool, encoding: Encoding) -> Self {
        let threshold = buffer_size.saturating_sub(1).max(1);
        Self {
            buf: Vec::with_capacity(threshold + 1),
            threshold,
            pending: VecDeque::new(),
            scopes: Vec::new(),
            stream: None,
            ieee754_compatible,
            encoding,
        }
    }

    // -- buffer discipline -------------------------------------------------

    fn spill_buf(&mut self) {
        if !self.buf.is_empty() {
            log::trace!("spilling {} buffered bytes to the sink queue", self.buf.len());
            self.pending.push_back(std::mem::take(&mut self.buf));
        }
    }

    fn push_atomic(&mut self, bytes: &[u8]) {
        if self.buf.len() + bytes.len() > self.threshold {
            self.spill_buf();
            if bytes.len() > self.threshold {
                self.pending.push_back(bytes.to_vec());
                return;
            }
        }
        self.buf.extend_from_slice(bytes);
    }

    fn push_splittable(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        while !rest.is_empty() {
            if self.buf.len() >= self.threshold {
                self.spill_buf();
            }
            let take = (self.threshold - self.buf.len()).min(rest.len());
            self.buf.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
        }
    }

    fn write_atomic(&mut self, s: &str) {
        match self.encoding {
            Encoding::Utf8 => self.push_atomic(s.as_bytes()),
            _ => {
                let mut bytes = Vec::with_capacity(s.len() * 2);
                encode_text(s, self.encoding, &mut bytes);
                self.push_atomic(&bytes);
            }
        }
    }

    fn write_clean(&mut self, s: &str) {
        match self.encoding {
            Encoding::Utf8 => self.push_splittable(s.as_bytes()),
            _ => {
                let mut bytes = Vec::with_capacity(s.len() * 2);
                encode_text(s, self.encoding, &mut bytes);
                self.push_splittable(&bytes);
            }
        }
    }

    fn write_escaped(&mut self, s: &str) {
        let mut clean_start = 0;
        for (i, c) in s.char_indices() {
            if let Some(esc) = escape_of(c) {
                if i > clean_start {
                    self.write_clean(&s[clean_start..i]);
                }
                self.write_atomic(&esc);
                clean_start = i + c.len_utf8();
            }
        }
        if clean_start < s.len() {
            self.write_clean(&s[clean_start..]);
        }
    }

    /// Hands the next sink-ready chunk to the driver.
    pub(crate) fn take_pending(&mut self) -> Option<Vec<u8>> {
        self.pending.pop_front()
    }

    /// Moves all buffered content to the pending queue, for an explicit
    /// flush. A no-op on an empty buffer, so flushing is idempotent.
    pub(crate) fn spill_all(&mut self) {
        self.spill_buf();
    }

    // -- separator and scope discipline ------------------------------------

    fn ensure_no_stream(&self) -> Result<(), WriteError> {
        if self.stream.is_some() {
            return Err(WriteError::StreamScopeOpen);
        }
        Ok(())
    }

    fn before_value(&mut self) -> Result<(), WriteError> {
        self.ensure_no_stream()?;
        let comma = match self.scopes.last_mut() {
            Some(scope) if scope.kind == ScopeKind::Object => {
                if !scope.name_written {
                    return Err(WriteError::ValueWithoutName);
                }
                scope.name_written = false;
                false
            }
            Some(scope) => {
                let comma = scope.items > 0;
                scope.items += 1;
                comma
            }
            None => false,
        };
        if comma {
            self.write_atomic(",");
        }
        Ok(())
    }

    pub(crate) fn write_name(&mut self, name: &str) -> Result<(), WriteError> {
        self.ensure_no_stream()?;
        let comma = match self.scopes.last_mut() {
            Some(scope) if scope.kind == ScopeKind::Object && !scope.name_written => {
                let comma = scope.items > 0;
                scope.items += 1;
                scope.name_written = true;
                comma
            }
            _ => return Err(WriteError::NameOutsideObject),
        };
        if comma {
            self.write_atomic(",");
        }
        self.write_atomic("\"");
        self.write_escaped(name);
        self.write_atomic("\":");
        Ok(())
    }

    pub(crate) fn start_object(&mut self) -> Result<(), WriteError> {
        self.before_value()?;
        self.scopes.push(Scope {
            kind: ScopeKind::Object,
            items: 0,
            name_written: false,
        });
        self.write_atomic("{");
        Ok(())
    }

    pub(crate) fn start_array(&mut self) -> Result<(), WriteError> {
        self.before_value()?;
        self.scopes.push(Scope {
            kind: ScopeKind::Array,
            items: 0,
            name_written: false,
        });
        self.write_atomic("[");
        Ok(())
    }

    fn end_scope(&mut self, kind: ScopeKind) -> Result<(), WriteError> {
        self.ensure_no_stream()?;
        match self.scopes.last() {
            None => return Err(WriteError::NoOpenScope),
            Some(scope) if scope.kind != kind => {
                return Err(WriteError::ScopeMismatch {
                    expected: kind.name(),
                    actual: scope.kind.name(),
                });
            }
            Some(scope) if scope.name_written => return Err(WriteError::ValueWithoutName),
            Some(_) => {}
        }
        self.scopes.pop();
        self.write_atomic(match kind {
            ScopeKind::Object => "}",
            ScopeKind::Array => "]",
        });
        Ok(())
    }

    pub(crate) fn end_object(&mut self) -> Result<(), WriteError> {
        self.end_scope(ScopeKind::Object)
    }

    pub(crate) fn end_array(&mut self) -> Result<(), WriteError> {
        self.end_scope(ScopeKind::Array)
    }

    // -- values ------------------------------------------------------------

    pub(crate) fn write_primitive(&mut self, value: &Primitive) -> Result<(), WriteError> {
        self.before_value()?;
        match format_primitive(value, self.ieee754_compatible) {
            Formatted::Bare(token) => self.write_atomic(&token),
            Formatted::Quoted(body) => {
                self.write_atomic("\"");
                self.write_clean(&body);
                self.write_atomic("\"");
            }
            Formatted::EscapedString(body) => {
                self.write_atomic("\"");
                self.write_escaped(&body);
                self.write_atomic("\"");
            }
            Formatted::Binary(bytes) => {
                self.write_atomic("\"");
                let mut encoder = Base64Encoder::new();
                let mut text = String::new();
                encoder.encode_chunk(&bytes, &mut text);
                encoder.finish(&mut text);
                self.write_clean(&text);
                self.write_atomic("\"");
            }
        }
        Ok(())
    }

    /// Injects pre-formatted JSON verbatim. Participates in separator
    /// bookkeeping like any value; the caller guarantees validity.
    pub(crate) fn write_raw_value(&mut self, text: &str) -> Result<(), WriteError> {
        self.before_value()?;
        self.write_clean(text);
        Ok(())
    }

    // -- stream value scopes -----------------------------------------------

    pub(crate) fn begin_binary_stream(&mut self) -> Result<(), WriteError> {
        self.before_value()?;
        self.write_atomic("\"");
        self.stream = Some(StreamKind::Binary(Base64Encoder::new()));
        Ok(())
    }

    pub(crate) fn append_binary(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        let Some(StreamKind::Binary(mut encoder)) = self.stream.take() else {
            return Err(WriteError::NoStreamScope);
        };
        let mut text = String::new();
        encoder.encode_chunk(bytes, &mut text);
        self.stream = Some(StreamKind::Binary(encoder));
        self.write_clean(&text);
        Ok(())
    }

    pub(crate) fn end_binary_stream(&mut self) -> Result<(), WriteError> {
        let Some(StreamKind::Binary(mut encoder)) = self.stream.take() else {
            return Err(WriteError::NoStreamScope);
        };
        let mut text = String::new();
        encoder.finish(&mut text);
        self.write_clean(&text);
        self.write_atomic("\"");
        Ok(())
    }

    /// `application/json` content passes through raw; any other content
    /// type is written as an escaped JSON string literal.
    pub(crate) fn begin_text_stream(&mut self, content_type: &str) -> Result<(), WriteError> {
        self.before_value()?;
        let raw = content_type.eq_ignore_ascii_case("application/json");
        if !raw {
            self.write_atomic("\"");
        }
        self.stream = Some(StreamKind::Text { raw });
        Ok(())
    }

    pub(crate) fn append_text(&mut self, s: &str) -> Result<(), WriteError> {
        let raw = match &self.stream {
            Some(StreamKind::Text { raw }) => *raw,
            _ => return Err(WriteError::NoStreamScope),
        };
        if raw {
            self.write_clean(s);
        } else {
            self.write_escaped(s);
        }
        Ok(())
    }

    pub(crate) fn end_text_stream(&mut self) -> Result<(), WriteError> {
        let raw = match self.stream.take() {
            Some(StreamKind::Text { raw }) => raw,
            other => {
                self.stream = other;
                return Err(WriteError::NoStreamScope);
            }
        };
        if !raw {
            self.write_atomic("\"");
        }
        Ok(())
    }
}
