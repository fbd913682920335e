//! Control-annotation reordering.
//!
//! On entering a live object scope the reorderer captures that object's
//! nodes up to the matching close, then replays them with any of the
//! control annotations `type`, `id`, `etag` (prefixed or simplified
//! spelling) moved to the front in that fixed order. The pass descends
//! into nested objects, including objects inside nested arrays, so every
//! scope in the captured subtree is reordered. Instance-annotation name
//! validation is enforced only at the scope entered live; names in nested
//! scopes are ranked but never rejected.

use std::collections::VecDeque;
use std::io::Read;

use crate::error::{ReadError, SyntaxError};
use crate::node::{BufferedNode, NodeKind, Value};
use crate::odata_error::ODataError;

use super::buffering::{BufferingCore, Event, ProbeOutcome, StreamStart};
use super::{
    get_value_impl, skip_value_impl, BinaryValueReader, NodePull, Pump, ReaderOptions, Refill,
    StreamChunks, TextValueReader,
};

/// Annotation suffixes this layer recognizes, shared by the `@odata.`
/// prefixed and the simplified spellings.
const KNOWN_ANNOTATIONS: &[&str] = &[
    "context",
    "type",
    "id",
    "etag",
    "editLink",
    "readLink",
    "mediaEditLink",
    "mediaReadLink",
    "mediaContentType",
    "mediaEtag",
    "count",
    "nextLink",
    "deltaLink",
    "removed",
    "bind",
    "navigationLink",
    "associationLink",
];

/// Position in the fixed front ordering, if the name is one of the
/// reordered control annotations.
fn annotation_rank(suffix: &str) -> Option<usize> {
    match suffix {
        "type" => Some(0),
        "id" => Some(1),
        "etag" => Some(2),
        _ => None,
    }
}

/// Classifies a property name: `Ok(Some(rank))` for a reordered control
/// annotation, `Ok(None)` for anything left in place, `Err` for a reserved
/// spelling this layer does not recognize.
fn classify(name: &str) -> Result<Option<usize>, SyntaxError> {
    let Some(body) = name.strip_prefix('@') else {
        return Ok(None);
    };
    if let Some(suffix) = body.strip_prefix("odata.") {
        if !KNOWN_ANNOTATIONS.contains(&suffix) {
            return Err(SyntaxError::UnknownODataAnnotation(name.to_owned()));
        }
        return Ok(annotation_rank(suffix));
    }
    if body.contains('.') {
        // Custom-namespace instance annotation, tolerated in place.
        return Ok(None);
    }
    if !KNOWN_ANNOTATIONS.contains(&body) {
        return Err(SyntaxError::InvalidInstanceAnnotationName(name.to_owned()));
    }
    Ok(annotation_rank(body))
}

/// End index (exclusive) of the complete value subtree starting at `start`.
fn subtree_end(nodes: &[BufferedNode], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    loop {
        match nodes[i].kind {
            NodeKind::StartObject | NodeKind::StartArray => depth += 1,
            NodeKind::EndObject | NodeKind::EndArray => depth -= 1,
            _ => {}
        }
        i += 1;
        if depth == 0 {
            return i;
        }
    }
}

/// Reorders every object scope inside one complete value subtree. Nested
/// scopes are rank-only: unknown reserved spellings are left in place.
fn reorder_value(nodes: Vec<BufferedNode>) -> Result<Vec<BufferedNode>, SyntaxError> {
    match nodes.first().map(|n| n.kind) {
        Some(NodeKind::StartObject) => {
            let mut out = Vec::with_capacity(nodes.len());
            out.push(BufferedNode::new(NodeKind::StartObject, None));
            out.extend(reorder_object(nodes[1..].to_vec(), false)?);
            Ok(out)
        }
        Some(NodeKind::StartArray) => {
            let mut out = Vec::with_capacity(nodes.len());
            out.push(BufferedNode::new(NodeKind::StartArray, None));
            let mut i = 1;
            while i < nodes.len() - 1 {
                let j = subtree_end(&nodes, i);
                out.extend(reorder_value(nodes[i..j].to_vec())?);
                i = j;
            }
            out.push(BufferedNode::new(NodeKind::EndArray, None));
            Ok(out)
        }
        _ => Ok(nodes),
    }
}

/// Reorders one captured object body (everything after `StartObject` up to
/// and including the matching `EndObject`). `validate` applies the reserved
/// name check; it is true only for the scope entered live.
fn reorder_object(
    nodes: Vec<BufferedNode>,
    validate: bool,
) -> Result<Vec<BufferedNode>, SyntaxError> {
    let mut segments: Vec<(Option<usize>, Vec<BufferedNode>)> = Vec::new();
    let mut i = 0;
    while i < nodes.len() {
        if nodes[i].kind == NodeKind::EndObject && i == nodes.len() - 1 {
            break;
        }
        let Some(name) = nodes[i].name() else {
            return Err(SyntaxError::UnexpectedToken(format!("{:?}", nodes[i].kind)));
        };
        let rank = if validate {
            classify(name)?
        } else {
            classify(name).unwrap_or(None)
        };
        // The property node plus its complete value subtree form a segment.
        let j = subtree_end(&nodes, i + 1);
        let mut segment = Vec::with_capacity(j - i);
        segment.push(nodes[i].clone());
        segment.extend(reorder_value(nodes[i + 1..j].to_vec())?);
        segments.push((rank, segment));
        i = j;
    }
    let mut out = Vec::with_capacity(nodes.len());
    for wanted in 0..3 {
        for (rank, segment) in &segments {
            if *rank == Some(wanted) {
                out.extend_from_slice(segment);
            }
        }
    }
    for (rank, segment) in &segments {
        if rank.is_none() {
            out.extend_from_slice(segment);
        }
    }
    out.push(BufferedNode::new(NodeKind::EndObject, None));
    Ok(out)
}

struct Capture {
    nodes: Vec<BufferedNode>,
    depth: usize,
}

pub(crate) struct ReorderingCore {
    inner: BufferingCore,
    queue: VecDeque<BufferedNode>,
    capture: Option<Capture>,
}

impl ReorderingCore {
    pub(crate) fn new(inner: BufferingCore) -> Self {
        Self {
            inner,
            queue: VecDeque::new(),
            capture: None,
        }
    }

    pub(crate) fn inner_mut(&mut self) -> &mut BufferingCore {
        &mut self.inner
    }

    pub(crate) fn node_kind(&self) -> NodeKind {
        self.inner.node_kind()
    }

    pub(crate) fn value(&self) -> Option<&Value> {
        self.inner.value()
    }

    pub(crate) fn try_read(&mut self) -> Result<Option<Event>, SyntaxError> {
        if self.capture.is_some() {
            return self.continue_capture();
        }
        if let Some(node) = self.queue.pop_front() {
            return Ok(Some(self.inner.resurface(node)));
        }
        let Some(event) = self.inner.try_read()? else {
            return Ok(None);
        };
        if let Event::Node { more, from_replay } = &event {
            if *more && !*from_replay && self.inner.node_kind() == NodeKind::StartObject {
                self.capture = Some(Capture {
                    nodes: Vec::new(),
                    depth: 1,
                });
            }
        }
        Ok(Some(event))
    }

    fn continue_capture(&mut self) -> Result<Option<Event>, SyntaxError> {
        loop {
            let Some(event) = self.inner.try_read()? else {
                return Ok(None);
            };
            match event {
                Event::InStreamError(err) => {
                    self.capture = None;
                    return Ok(Some(Event::InStreamError(err)));
                }
                Event::Node { more, .. } => {
                    if !more {
                        return Err(SyntaxError::UnexpectedEndOfInput);
                    }
                    let node =
                        BufferedNode::new(self.inner.node_kind(), self.inner.value().cloned());
                    let Some(capture) = self.capture.as_mut() else {
                        return Err(SyntaxError::InStreamState);
                    };
                    match node.kind {
                        NodeKind::StartObject | NodeKind::StartArray => capture.depth += 1,
                        NodeKind::EndObject | NodeKind::EndArray => capture.depth -= 1,
                        _ => {}
                    }
                    capture.nodes.push(node);
                    if capture.depth == 0 {
                        break;
                    }
                }
            }
        }
        let Some(capture) = self.capture.take() else {
            return Err(SyntaxError::InStreamState);
        };
        log::trace!("reordering object scope of {} nodes", capture.nodes.len());
        self.queue = reorder_object(capture.nodes, true)?.into();
        match self.queue.pop_front() {
            Some(node) => Ok(Some(self.inner.resurface(node))),
            // reorder_object always emits at least the closing node.
            None => Err(SyntaxError::UnexpectedEndOfInput),
        }
    }

    pub(crate) fn try_can_stream(&mut self) -> Result<Option<bool>, SyntaxError> {
        if let Some(front) = self.queue.front() {
            return Ok(Some(
                front.kind == NodeKind::PrimitiveValue
                    && matches!(front.value, Some(Value::String(_)) | Some(Value::Null)),
            ));
        }
        self.inner.try_can_stream()
    }

    pub(crate) fn try_begin_stream(&mut self) -> Result<Option<StreamStart>, SyntaxError> {
        if self.queue.front().is_some() {
            let streamable = matches!(self.try_can_stream()?, Some(true));
            if !streamable {
                return Err(SyntaxError::NotStreamable);
            }
            let Some(node) = self.queue.pop_front() else {
                return Err(SyntaxError::NotStreamable);
            };
            let text = match node.value {
                Some(Value::String(s)) => s,
                _ => String::new(),
            };
            self.inner.resurface(BufferedNode::new(NodeKind::PrimitiveValue, None));
            return Ok(Some(StreamStart::Buffered(text)));
        }
        self.inner.try_begin_stream()
    }

    pub(crate) fn try_stream_text(
        &mut self,
        out: &mut String,
        limit: usize,
    ) -> Result<Option<bool>, SyntaxError> {
        self.inner.try_stream_text(out, limit)
    }
}

/// The full reader chain over a [`Read`] source: tokenizer, lookahead
/// buffering and control-annotation reordering.
pub struct ReorderingJsonReader<R> {
    core: ReorderingCore,
    pump: Pump<R>,
}

impl<R: Read> ReorderingJsonReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_options(input, &ReaderOptions::default())
    }

    pub fn with_options(input: R, options: &ReaderOptions) -> Self {
        Self {
            core: ReorderingCore::new(BufferingCore::new(options.make_core(), options)),
            pump: Pump::new(input, options.chunk_size),
        }
    }

    fn refill(&mut self) -> Result<(), ReadError> {
        match self.pump.refill()? {
            Refill::Bytes(bytes) => self.core.inner_mut().feed(bytes)?,
            Refill::End => self.core.inner_mut().close()?,
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

    pub fn get_value(&self) -> Result<Value, ReadError> {
        get_value_impl(self.core.node_kind(), self.core.value())
    }

    /// Starts a lookahead session on the underlying buffering layer.
    pub fn start_buffering(&mut self) {
        self.core.inner_mut().start_buffering();
    }

    /// Ends the lookahead session; buffered nodes replay before live reads.
    pub fn stop_buffering(&mut self) {
        self.core.inner_mut().stop_buffering();
    }

    /// The in-stream error protocol, applicable while positioned live on
    /// the trigger property. See
    /// [`BufferingJsonReader::start_buffering_and_try_read_in_stream_error`].
    ///
    /// [`BufferingJsonReader::start_buffering_and_try_read_in_stream_error`]:
    /// super::BufferingJsonReader::start_buffering_and_try_read_in_stream_error
    pub fn start_buffering_and_try_read_in_stream_error(
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

impl<R: Read> NodePull for ReorderingJsonReader<R> {
    fn pull(&mut self) -> Result<bool, ReadError> {
        self.read()
    }

    fn pulled_kind(&self) -> NodeKind {
        self.node_kind()
    }
}

impl<R: Read> StreamChunks for ReorderingJsonReader<R> {
    fn stream_chunk(&mut self, out: &mut String, max: usize) -> Result<bool, ReadError> {
        loop {
            if let Some(done) = self.core.try_stream_text(out, max)? {
                return Ok(done);
            }
            self.refill()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognizes_spellings() {
        assert_eq!(classify("@odata.type").unwrap(), Some(0));
        assert_eq!(classify("@id").unwrap(), Some(1));
        assert_eq!(classify("@odata.etag").unwrap(), Some(2));
        assert_eq!(classify("@odata.count").unwrap(), None);
        assert_eq!(classify("@removed").unwrap(), None);
        assert_eq!(classify("name").unwrap(), None);
        assert_eq!(classify("@custom.hint").unwrap(), None);
    }

    #[test]
    fn classify_rejects_unknown_reserved_names() {
        assert!(matches!(
            classify("@odata.unknownThing"),
            Err(SyntaxError::UnknownODataAnnotation(_))
        ));
        assert!(matches!(
            classify("@bogus"),
            Err(SyntaxError::InvalidInstanceAnnotationName(_))
        ));
    }

    fn prop(name: &str) -> BufferedNode {
        BufferedNode::new(NodeKind::Property, Some(Value::String(name.into())))
    }

    fn string(v: &str) -> BufferedNode {
        BufferedNode::new(NodeKind::PrimitiveValue, Some(Value::String(v.into())))
    }

    #[test]
    fn reorder_moves_annotations_to_front() {
        let body = vec![
            prop("name"),
            string("x"),
            prop("@odata.etag"),
            string("W/\"1\""),
            prop("@odata.type"),
            string("#T"),
            BufferedNode::new(NodeKind::EndObject, None),
        ];
        let out = reorder_object(body, true).unwrap();
        let names: Vec<&str> = out.iter().filter_map(BufferedNode::name).collect();
        assert_eq!(names, ["@odata.type", "@odata.etag", "name"]);
    }

    #[test]
    fn reorder_keeps_other_properties_stable() {
        let body = vec![
            prop("b"),
            string("1"),
            prop("@id"),
            string("urn:1"),
            prop("a"),
            string("2"),
            BufferedNode::new(NodeKind::EndObject, None),
        ];
        let out = reorder_object(body, true).unwrap();
        let names: Vec<&str> = out.iter().filter_map(BufferedNode::name).collect();
        assert_eq!(names, ["@id", "b", "a"]);
    }

    #[test]
    fn reorder_descends_into_nested_objects() {
        let body = vec![
            prop("child"),
            BufferedNode::new(NodeKind::StartObject, None),
            prop("z"),
            string("1"),
            prop("@bogus"),
            string("2"),
            prop("@odata.type"),
            string("ct"),
            BufferedNode::new(NodeKind::EndObject, None),
            prop("@odata.etag"),
            string("e"),
            BufferedNode::new(NodeKind::EndObject, None),
        ];
        let out = reorder_object(body, true).unwrap();
        let names: Vec<&str> = out.iter().filter_map(BufferedNode::name).collect();
        // The nested scope is reordered; its unknown name is tolerated.
        assert_eq!(names, ["@odata.etag", "child", "@odata.type", "z", "@bogus"]);
    }
}
