//! Error types for the reader chain and the writer family.
//!
//! Two kinds of failures are kept strictly apart: syntax/usage errors
//! ([`SyntaxError`], unrecoverable, raised immediately) and business
//! in-stream errors ([`ReadError::InStream`], a well-formed OData error
//! object found by speculative lookahead). Callers branch on the variant to
//! distinguish "the server told us about an error" from "the payload is
//! corrupt".

use thiserror::Error;

use crate::node::NodeKind;
use crate::odata_error::ODataError;

/// A malformed payload or an illegal API call sequence.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("missing colon after property name '{0}'")]
    MissingColon(String),
    #[error("expected ',' or '}}' after a property value")]
    MissingCommaInObject,
    #[error("expected ',' or ']' after an array element")]
    MissingCommaInArray,
    #[error("unexpected comma in {0} context")]
    UnexpectedComma(&'static str),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("unrecognized escape sequence '{0}'")]
    UnrecognizedEscape(String),
    #[error("invalid unicode escape sequence '{0}'")]
    InvalidUnicodeEscape(String),
    #[error("unexpected end of string")]
    UnexpectedEndOfString,
    #[error("unexpected end of input with an open scope")]
    UnexpectedEndOfInput,
    #[error("a second top-level value was found after the first completed")]
    MultipleTopLevelValues,
    #[error("expected a {expected:?} node but found {actual:?}")]
    UnexpectedNodeKind {
        expected: NodeKind,
        actual: NodeKind,
    },
    #[error("cannot read or access a value in stream state")]
    InStreamState,
    #[error("the current value cannot be streamed")]
    NotStreamable,
    #[error("invalid character '{0}' in a base64-encoded value")]
    InvalidBase64(char),
    #[error("invalid {0} byte sequence in input")]
    InvalidEncoding(&'static str),
    #[error("payload nesting exceeds the depth limit of {0}")]
    DepthLimitExceeded(usize),
    #[error("nested 'innererror' objects exceed the depth limit of {0}")]
    InnerErrorDepthExceeded(usize),
    #[error("invalid instance annotation name '{0}'")]
    InvalidInstanceAnnotationName(String),
    #[error("unrecognized OData annotation '{0}'")]
    UnknownODataAnnotation(String),
}

/// Failure while pulling nodes from the reader chain.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A business error object embedded in the payload, detected via the
    /// in-stream error protocol. Carries the fully parsed error value.
    #[error("in-stream error: {0}")]
    InStream(ODataError),
}

impl ReadError {
    /// Returns the structured in-stream error, if that is what this is.
    pub fn into_in_stream_error(self) -> Option<ODataError> {
        match self {
            ReadError::InStream(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure while emitting JSON through the writer.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no scope is open")]
    NoOpenScope,
    #[error("attempted to end {expected} scope while {actual} scope is open")]
    ScopeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("property names can only be written inside an object scope")]
    NameOutsideObject,
    #[error("a value inside an object scope must be preceded by a property name")]
    ValueWithoutName,
    #[error("a stream value scope is open; complete it before writing")]
    StreamScopeOpen,
    #[error("no stream value scope is open")]
    NoStreamScope,
}
