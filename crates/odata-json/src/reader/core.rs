//! The chunk-fed reader core shared by every driver.
//!
//! `CoreReader` owns the decoder window and the scanner but never performs
//! I/O: callers feed it byte chunks and ask it to advance. Every `try_*`
//! method returns `Ok(None)` to mean "feed me more input and ask again",
//! which is what lets one core serve both the blocking `Read`-based readers
//! and the tokio-based ones.

use std::sync::Arc;

use crate::error::SyntaxError;
use crate::node::{NodeKind, Value};
use crate::pool::BufferPool;

use super::scanner::{Scanner, ValueClass};
use super::source::{CharWindow, Encoding};

/// Initial capacity of the decoded character window.
const WINDOW_CAPACITY: usize = 4 * 1024;

#[derive(Debug)]
pub(crate) struct CoreReader {
    window: CharWindow,
    scanner: Scanner,
    kind: NodeKind,
    value: Option<Value>,
}

impl CoreReader {
    pub(crate) fn new(
        ieee754_compatible: bool,
        max_depth: usize,
        encoding: Option<Encoding>,
        pool: Option<Arc<dyn BufferPool>>,
    ) -> Self {
        Self {
            window: CharWindow::new(WINDOW_CAPACITY, encoding, pool),
            scanner: Scanner::new(ieee754_compatible, max_depth),
            kind: NodeKind::None,
            value: None,
        }
    }

    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Result<(), SyntaxError> {
        self.window.feed(bytes)
    }

    pub(crate) fn close(&mut self) -> Result<(), SyntaxError> {
        self.window.close()
    }

    /// Advances to the next node. `Ok(Some(true))` means a content node was
    /// produced, `Ok(Some(false))` means end of input.
    pub(crate) fn try_read(&mut self) -> Result<Option<bool>, SyntaxError> {
        if self.scanner.in_stream_state() {
            return Err(SyntaxError::InStreamState);
        }
        match self.scanner.try_next(&mut self.window)? {
            None => Ok(None),
            Some((kind, value)) => {
                self.kind = kind;
                self.value = value;
                Ok(Some(kind != NodeKind::EndOfInput))
            }
        }
    }

    pub(crate) fn node_kind(&self) -> NodeKind {
        self.kind
    }

    pub(crate) fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Overrides the current node, used by layers that replay buffered nodes.
    pub(crate) fn set_node(&mut self, kind: NodeKind, value: Option<Value>) {
        self.kind = kind;
        self.value = value;
    }

    /// Whether the upcoming value can be drained through a stream carve-out.
    pub(crate) fn try_can_stream(&mut self) -> Result<Option<bool>, SyntaxError> {
        match self.scanner.try_peek_value_class(&mut self.window)? {
            None => Ok(None),
            Some(class) => Ok(Some(class != ValueClass::Other)),
        }
    }

    pub(crate) fn try_begin_stream(&mut self) -> Result<Option<()>, SyntaxError> {
        self.scanner.try_begin_value_stream(&mut self.window)
    }

    /// Drains up to `limit` characters of the streamed value into `out`.
    /// `Ok(Some(true))` means the value completed; the current node becomes
    /// a consumed primitive so structural navigation keeps working.
    pub(crate) fn try_stream_text(
        &mut self,
        out: &mut String,
        limit: usize,
    ) -> Result<Option<bool>, SyntaxError> {
        match self.scanner.try_stream_text(&mut self.window, out, limit)? {
            None => Ok(None),
            Some(done) => {
                if done {
                    self.kind = NodeKind::PrimitiveValue;
                    self.value = None;
                }
                Ok(Some(done))
            }
        }
    }
}
