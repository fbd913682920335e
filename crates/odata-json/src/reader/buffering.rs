//! Lookahead buffering and the in-stream error protocol.
//!
//! [`BufferingCore`] is a passthrough over [`CoreReader`] until a buffering
//! session begins. A session captures every pulled node into the buffered
//! queue; `stop_buffering` discards the queue and keeps delivered nodes
//! delivered, while the in-stream error probe either surfaces a parsed
//! [`ODataError`] or leaves the core replaying the queue so the caller
//! observes exactly the node sequence a plain tokenizer would have produced.

use std::collections::VecDeque;
use std::io::Read;

use crate::error::{ReadError, SyntaxError};
use crate::node::{BufferedNode, NodeKind, Value};
use crate::odata_error::{parse_in_stream_error, ODataError};

use super::core::CoreReader;
use super::{
    get_value_impl, skip_value_impl, BinaryValueReader, NodePull, Pump, ReaderOptions, Refill,
    StreamChunks, TextValueReader,
};

/// One consumer-visible step of the buffering layer.
pub(crate) enum Event {
    Node { more: bool, from_replay: bool },
    InStreamError(ODataError),
}

/// Result of a completed in-stream error probe.
pub(crate) enum ProbeOutcome {
    Error(ODataError),
    /// The candidate was unintelligible (or never applicable); the queue is
    /// set up for verbatim replay where needed.
    Clean,
}

/// How a stream carve-out should be served at the current position.
pub(crate) enum StreamStart {
    Live,
    Buffered(String),
}

#[derive(Debug)]
struct Probe {
    /// Nesting depth within the captured value subtree.
    depth: usize,
    /// Index in `captured` where the value subtree begins.
    value_offset: usize,
    /// Whether the trigger property itself still has to be delivered after
    /// an unintelligible candidate (the auto-interception path).
    redeliver: bool,
}

pub(crate) struct BufferingCore {
    inner: CoreReader,
    /// Nodes awaiting verbatim replay ahead of any live read.
    replay: VecDeque<BufferedNode>,
    /// The buffered node queue of the active session.
    captured: Vec<BufferedNode>,
    capturing: bool,
    probe: Option<Probe>,
    /// Consumer-visible container depth, for the "directly under the
    /// document root" precondition.
    depth: usize,
    trigger: Option<String>,
    max_inner_error_depth: usize,
}

fn depth_delta(kind: NodeKind, depth: &mut usize) {
    match kind {
        NodeKind::StartObject | NodeKind::StartArray => *depth += 1,
        NodeKind::EndObject | NodeKind::EndArray => *depth = depth.saturating_sub(1),
        _ => {}
    }
}

fn buffered_streamable(node: &BufferedNode) -> bool {
    node.kind == NodeKind::PrimitiveValue
        && matches!(node.value, Some(Value::String(_)) | Some(Value::Null))
}

impl BufferingCore {
    pub(crate) fn new(inner: CoreReader, options: &ReaderOptions) -> Self {
        Self {
            inner,
            replay: VecDeque::new(),
            captured: Vec::new(),
            capturing: false,
            probe: None,
            depth: 0,
            trigger: options.in_stream_error_trigger.clone(),
            max_inner_error_depth: options.max_inner_error_depth,
        }
    }

    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Result<(), SyntaxError> {
        self.inner.feed(bytes)
    }

    pub(crate) fn close(&mut self) -> Result<(), SyntaxError> {
        self.inner.close()
    }

    pub(crate) fn node_kind(&self) -> NodeKind {
        self.inner.node_kind()
    }

    pub(crate) fn value(&self) -> Option<&Value> {
        self.inner.value()
    }

    /// Begins capturing pulled nodes into the buffered queue.
    pub(crate) fn start_buffering(&mut self) {
        self.captured.clear();
        self.capturing = true;
    }

    /// Ends the session, discarding the queue. Nodes already delivered stay
    /// delivered; no replay occurs.
    pub(crate) fn stop_buffering(&mut self) {
        self.capturing = false;
        self.captured.clear();
    }

    fn surface(&mut self, node: BufferedNode, from_replay: bool) -> Event {
        if self.capturing {
            self.captured.push(node.clone());
        }
        depth_delta(node.kind, &mut self.depth);
        let more = node.kind != NodeKind::EndOfInput;
        self.inner.set_node(node.kind, node.value);
        Event::Node { more, from_replay }
    }

    /// Surfaces a node owned by an outer layer (the reorderer's replay)
    /// without touching depth or the session queue, both of which were
    /// already accounted for when the node was originally pulled.
    pub(crate) fn resurface(&mut self, node: BufferedNode) -> Event {
        let more = node.kind != NodeKind::EndOfInput;
        self.inner.set_node(node.kind, node.value);
        Event::Node {
            more,
            from_replay: true,
        }
    }

    pub(crate) fn try_read(&mut self) -> Result<Option<Event>, SyntaxError> {
        if self.probe.is_some() {
            return match self.try_probe_step()? {
                None => Ok(None),
                Some(ProbeOutcome::Error(err)) => Ok(Some(Event::InStreamError(err))),
                Some(ProbeOutcome::Clean) => self.deliver_after_probe(),
            };
        }
        if let Some(node) = self.replay.pop_front() {
            return Ok(Some(self.surface(node, true)));
        }
        let Some(more) = self.inner.try_read()? else {
            return Ok(None);
        };
        let node = BufferedNode::new(self.inner.node_kind(), self.inner.value().cloned());
        if more
            && !self.capturing
            && node.kind == NodeKind::Property
            && self.depth == 1
            && self
                .trigger
                .as_deref()
                .is_some_and(|t| node.name() == Some(t))
        {
            self.captured.clear();
            self.captured.push(node);
            self.capturing = true;
            self.probe = Some(Probe {
                depth: 0,
                value_offset: 1,
                redeliver: true,
            });
            return match self.try_probe_step()? {
                None => Ok(None),
                Some(ProbeOutcome::Error(err)) => Ok(Some(Event::InStreamError(err))),
                Some(ProbeOutcome::Clean) => self.deliver_after_probe(),
            };
        }
        Ok(Some(self.surface(node, false)))
    }

    fn deliver_after_probe(&mut self) -> Result<Option<Event>, SyntaxError> {
        match self.replay.pop_front() {
            Some(node) => Ok(Some(self.surface(node, true))),
            // A captured value subtree always holds at least one node.
            None => Err(SyntaxError::UnexpectedEndOfInput),
        }
    }

    /// Arms the explicit in-stream error probe if the preconditions hold:
    /// positioned live on a `Property` named `trigger` directly under the
    /// document root.
    pub(crate) fn arm_explicit_probe(&mut self, trigger: &str) -> bool {
        if self.probe.is_some() || !self.replay.is_empty() {
            return false;
        }
        if self.inner.node_kind() != NodeKind::Property
            || self.depth != 1
            || self.inner.value().and_then(Value::as_str) != Some(trigger)
        {
            return false;
        }
        self.captured.clear();
        self.captured.push(BufferedNode::new(
            NodeKind::Property,
            self.inner.value().cloned(),
        ));
        self.capturing = true;
        self.probe = Some(Probe {
            depth: 0,
            value_offset: 1,
            redeliver: false,
        });
        true
    }

    /// Advances an armed probe: captures the trigger property's value
    /// subtree, then parses it as an error candidate. `Ok(None)` means more
    /// input is needed.
    pub(crate) fn try_probe_step(&mut self) -> Result<Option<ProbeOutcome>, SyntaxError> {
        loop {
            let Some(probe) = self.probe.as_mut() else {
                return Err(SyntaxError::InStreamState);
            };
            let Some(more) = self.inner.try_read()? else {
                return Ok(None);
            };
            if !more {
                return Err(SyntaxError::UnexpectedEndOfInput);
            }
            let kind = self.inner.node_kind();
            depth_delta(kind, &mut probe.depth);
            let complete = probe.depth == 0;
            self.captured
                .push(BufferedNode::new(kind, self.inner.value().cloned()));
            if !complete {
                continue;
            }
            let probe = match self.probe.take() {
                Some(p) => p,
                None => return Err(SyntaxError::InStreamState),
            };
            self.capturing = false;
            let outcome = parse_in_stream_error(
                &self.captured[probe.value_offset..],
                self.max_inner_error_depth,
            )?;
            return match outcome {
                Some(err) => {
                    log::debug!("in-stream error candidate accepted: {err}");
                    self.captured.clear();
                    Ok(Some(ProbeOutcome::Error(err)))
                }
                None => {
                    log::debug!(
                        "in-stream error candidate unintelligible, replaying {} nodes",
                        self.captured.len()
                    );
                    self.replay = self.captured.drain(..).collect();
                    if !probe.redeliver {
                        // The trigger property was already delivered before
                        // the explicit probe; drop it from the replay.
                        self.replay.pop_front();
                    }
                    Ok(Some(ProbeOutcome::Clean))
                }
            };
        }
    }

    /// Streamability of the value at the read position, honoring buffered
    /// nodes ahead of the live tokenizer.
    pub(crate) fn try_can_stream(&mut self) -> Result<Option<bool>, SyntaxError> {
        if let Some(front) = self.replay.front() {
            return Ok(Some(buffered_streamable(front)));
        }
        self.inner.try_can_stream()
    }

    pub(crate) fn try_begin_stream(&mut self) -> Result<Option<StreamStart>, SyntaxError> {
        if let Some(front) = self.replay.front() {
            if !buffered_streamable(front) {
                return Err(SyntaxError::NotStreamable);
            }
            let node = match self.replay.pop_front() {
                Some(n) => n,
                None => return Err(SyntaxError::NotStreamable),
            };
            if self.capturing {
                self.captured.push(node.clone());
            }
            let text = match node.value {
                Some(Value::String(s)) => s,
                _ => String::new(),
            };
            self.inner.set_node(NodeKind::PrimitiveValue, None);
            return Ok(Some(StreamStart::Buffered(text)));
        }
        Ok(self.inner.try_begin_stream()?.map(|()| StreamStart::Live))
    }

    pub(crate) fn try_stream_text(
        &mut self,
        out: &mut String,
        limit: usize,
    ) -> Result<Option<bool>, SyntaxError> {
        self.inner.try_stream_text(out, limit)
    }
}

/// The lookahead reader over a [`Read`] source: a passthrough tokenizer
/// with explicit buffering sessions and in-stream error detection.
pub struct BufferingJsonReader<R> {
    core: BufferingCore,
    pump: Pump<R>,
}

impl<R: Read> BufferingJsonReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_options(input, &ReaderOptions::default())
    }

    pub fn with_options(input: R, options: &ReaderOptions) -> Self {
        Self {
            core: BufferingCore::new(options.make_core(), options),
            pump: Pump::new(input, options.chunk_size),
        }
    }

    fn refill(&mut self) -> Result<(), ReadError> {
        match self.pump.refill()? {
            Refill::Bytes(bytes) => self.core.feed(bytes)?,
            Refill::End => self.core.close()?,
        }
        Ok(())
    }

    /// Advances to the next node. An intercepted in-stream error surfaces
    /// as [`ReadError::InStream`].
    pub fn read(&mut self) -> Result<bool, ReadError> {
        loop {
            match self.core.try_read()? {
                Some(Event::Node { more, .. }) => return Ok(more),
                Some(Event::InStreamError(err)) => return Err(ReadError::InStream(err)),
                None => self.refill()?,
            }
        }
    }

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

    /// Begins capturing subsequently pulled nodes into the buffered queue
    /// while still delivering them.
    pub fn start_buffering(&mut self) {
        self.core.start_buffering();
    }

    /// Ends the buffering session, discarding the queue.
    pub fn stop_buffering(&mut self) {
        self.core.stop_buffering();
    }

    /// The in-stream error protocol. Must be invoked while positioned on a
    /// `Property` node directly under the document root whose name equals
    /// `trigger`; otherwise this is a no-op returning `Ok(None)`.
    ///
    /// A well-formed candidate is returned parsed; an unintelligible one
    /// leaves the reader replaying the buffered nodes so subsequent reads
    /// proceed exactly as if no interception had occurred.
    pub fn start_buffering_and_try_read_in_stream_error(
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
                None => self.refill()?,
            }
        }
    }

    pub fn can_stream(&mut self) -> Result<bool, ReadError> {
        loop {
            if let Some(answer) = self.core.try_can_stream()? {
                return Ok(answer);
            }
            self.refill()?;
        }
    }

    pub fn text_value_reader(&mut self) -> Result<TextValueReader<'_>, ReadError> {
        loop {
            match self.core.try_begin_stream()? {
                Some(StreamStart::Live) => return Ok(TextValueReader::live(self)),
                Some(StreamStart::Buffered(text)) => {
                    return Ok(TextValueReader::buffered(text));
                }
                None => self.refill()?,
            }
        }
    }

    pub fn binary_value_reader(&mut self) -> Result<BinaryValueReader<'_>, ReadError> {
        Ok(BinaryValueReader::new(self.text_value_reader()?))
    }

    pub fn skip_value(&mut self) -> Result<(), ReadError> {
        skip_value_impl(self)
    }
}

impl<R: Read> NodePull for BufferingJsonReader<R> {
    fn pull(&mut self) -> Result<bool, ReadError> {
        self.read()
    }

    fn pulled_kind(&self) -> NodeKind {
        self.node_kind()
    }
}

impl<R: Read> StreamChunks for BufferingJsonReader<R> {
    fn stream_chunk(&mut self, out: &mut String, max: usize) -> Result<bool, ReadError> {
        loop {
            if let Some(done) = self.core.try_stream_text(out, max)? {
                return Ok(done);
            }
            self.refill()?;
        }
    }
}
