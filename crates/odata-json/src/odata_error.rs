//! The OData in-stream error payload and its candidate parser.
//!
//! The parser runs over nodes captured by a lookahead session. It is
//! deliberately forgiving in one direction only: any structural surprise
//! (wrong JSON type for a known field, a duplicate field, an unknown
//! top-level key) marks the candidate unintelligible and parsing stops,
//! without raising an error — the buffered nodes are then replayed as
//! ordinary payload. Unknown keys nested under `details` elements and
//! `innererror` are tolerated and skipped.

use core::fmt;

use crate::error::SyntaxError;
use crate::node::{BufferedNode, NodeKind, Value};

/// One entry of an error's `details` collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ODataErrorDetail {
    pub code: Option<String>,
    pub message: Option<String>,
    pub target: Option<String>,
}

/// The recursive `innererror` member: arbitrary string-valued properties
/// plus an optional nested inner error under `internalexception`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ODataInnerError {
    pub properties: Vec<(String, String)>,
    pub inner: Option<Box<ODataInnerError>>,
}

impl ODataInnerError {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A business error embedded in a payload where a normal value was expected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ODataError {
    pub code: Option<String>,
    pub message: Option<String>,
    pub target: Option<String>,
    pub details: Vec<ODataErrorDetail>,
    pub inner_error: Option<ODataInnerError>,
}

impl fmt::Display for ODataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.code.as_deref().unwrap_or("<no code>"),
            self.message.as_deref().unwrap_or("<no message>")
        )
    }
}

impl std::error::Error for ODataError {}

struct Cursor<'a> {
    nodes: &'a [BufferedNode],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn next(&mut self) -> Option<&'a BufferedNode> {
        let n = self.nodes.get(self.pos)?;
        self.pos += 1;
        Some(n)
    }

    /// Skips a complete value subtree starting at the next node.
    fn skip_value(&mut self) -> bool {
        let mut depth = 0usize;
        loop {
            let Some(n) = self.next() else { return false };
            match n.kind {
                NodeKind::StartObject | NodeKind::StartArray => depth += 1,
                NodeKind::EndObject | NodeKind::EndArray => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            if depth == 0 {
                return true;
            }
        }
    }
}

/// Attempts to interpret a buffered value subtree as an OData error object.
///
/// `Ok(None)` means the candidate was unintelligible; `Err` is raised only
/// for the `innererror` recursion bound, which protects against hostile
/// nesting and is a hard failure by design.
pub(crate) fn parse_in_stream_error(
    nodes: &[BufferedNode],
    max_inner_error_depth: usize,
) -> Result<Option<ODataError>, SyntaxError> {
    let mut cur = Cursor { nodes, pos: 0 };
    parse_error_object(&mut cur, max_inner_error_depth)
}

fn string_value(node: &BufferedNode) -> Option<&str> {
    if node.kind == NodeKind::PrimitiveValue {
        node.value.as_ref().and_then(Value::as_str)
    } else {
        None
    }
}

fn parse_error_object(
    cur: &mut Cursor<'_>,
    max_depth: usize,
) -> Result<Option<ODataError>, SyntaxError> {
    match cur.next() {
        Some(n) if n.kind == NodeKind::StartObject => {}
        _ => return Ok(None),
    }
    let mut error = ODataError::default();
    let mut seen_details = false;
    let mut seen_inner = false;
    loop {
        let Some(node) = cur.next() else {
            return Ok(None);
        };
        match node.kind {
            NodeKind::EndObject => return Ok(Some(error)),
            NodeKind::Property => {}
            _ => return Ok(None),
        }
        let Some(name) = node.name().map(str::to_owned) else {
            return Ok(None);
        };
        match name.as_str() {
            "code" | "message" | "target" => {
                let slot = match name.as_str() {
                    "code" => &mut error.code,
                    "message" => &mut error.message,
                    _ => &mut error.target,
                };
                if slot.is_some() {
                    return Ok(None);
                }
                let Some(value) = cur.next() else {
                    return Ok(None);
                };
                match string_value(value) {
                    Some(s) => *slot = Some(s.to_owned()),
                    None => return Ok(None),
                }
            }
            "details" => {
                if seen_details {
                    return Ok(None);
                }
                seen_details = true;
                match parse_details(cur)? {
                    Some(details) => error.details = details,
                    None => return Ok(None),
                }
            }
            "innererror" => {
                if seen_inner {
                    return Ok(None);
                }
                seen_inner = true;
                match parse_inner_error(cur, 1, max_depth)? {
                    Some(inner) => error.inner_error = Some(inner),
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        }
    }
}

fn parse_details(cur: &mut Cursor<'_>) -> Result<Option<Vec<ODataErrorDetail>>, SyntaxError> {
    match cur.next() {
        Some(n) if n.kind == NodeKind::StartArray => {}
        _ => return Ok(None),
    }
    let mut details = Vec::new();
    loop {
        let Some(node) = cur.next() else {
            return Ok(None);
        };
        match node.kind {
            NodeKind::EndArray => return Ok(Some(details)),
            NodeKind::StartObject => {}
            _ => return Ok(None),
        }
        let mut detail = ODataErrorDetail::default();
        loop {
            let Some(member) = cur.next() else {
                return Ok(None);
            };
            match member.kind {
                NodeKind::EndObject => break,
                NodeKind::Property => {}
                _ => return Ok(None),
            }
            let Some(name) = member.name().map(str::to_owned) else {
                return Ok(None);
            };
            match name.as_str() {
                "code" | "message" | "target" => {
                    let slot = match name.as_str() {
                        "code" => &mut detail.code,
                        "message" => &mut detail.message,
                        _ => &mut detail.target,
                    };
                    if slot.is_some() {
                        return Ok(None);
                    }
                    let Some(value) = cur.next() else {
                        return Ok(None);
                    };
                    match string_value(value) {
                        Some(s) => *slot = Some(s.to_owned()),
                        None => return Ok(None),
                    }
                }
                // Unknown detail members are tolerated and skipped.
                _ => {
                    if !cur.skip_value() {
                        return Ok(None);
                    }
                }
            }
        }
        details.push(detail);
    }
}

fn parse_inner_error(
    cur: &mut Cursor<'_>,
    depth: usize,
    max_depth: usize,
) -> Result<Option<ODataInnerError>, SyntaxError> {
    if depth > max_depth {
        return Err(SyntaxError::InnerErrorDepthExceeded(max_depth));
    }
    match cur.next() {
        Some(n) if n.kind == NodeKind::StartObject => {}
        _ => return Ok(None),
    }
    let mut inner = ODataInnerError::default();
    loop {
        let Some(node) = cur.next() else {
            return Ok(None);
        };
        match node.kind {
            NodeKind::EndObject => return Ok(Some(inner)),
            NodeKind::Property => {}
            _ => return Ok(None),
        }
        let Some(name) = node.name().map(str::to_owned) else {
            return Ok(None);
        };
        if name == "internalexception" {
            if inner.inner.is_some() {
                return Ok(None);
            }
            match parse_inner_error(cur, depth + 1, max_depth)? {
                Some(nested) => inner.inner = Some(Box::new(nested)),
                None => return Ok(None),
            }
            continue;
        }
        // String-valued members are kept; anything else is tolerated and
        // skipped without poisoning the candidate.
        let Some(peek) = cur.nodes.get(cur.pos) else {
            return Ok(None);
        };
        if let Some(s) = string_value(peek) {
            inner.properties.push((name, s.to_owned()));
            cur.pos += 1;
        } else if !cur.skip_value() {
            return Ok(None);
        }
    }
}
