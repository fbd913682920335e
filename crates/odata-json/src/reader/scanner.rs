//! The chunk-fed tokenizer state machine.
//!
//! The scanner pulls characters from a [`CharWindow`] and produces one node
//! per call. When the window runs dry mid-token it returns `None` ("need
//! more input") with all in-flight lexical state preserved — string escapes,
//! number stages, keyword progress, even the middle of a `\uXXXX` escape or
//! a surrogate pair — so that resuming after a refill yields results
//! identical to parsing the whole input from a single buffer. Both the
//! synchronous and asynchronous drivers instantiate this one machine; the
//! only thing they add is how a refill is performed.

use crate::error::SyntaxError;
use crate::node::{NodeKind, Number, Value};

use super::source::CharWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    /// Inside an object, before a property name. `first` is true right
    /// after `{`, where `}` is legal; after a comma it is not.
    BeforePropertyName { first: bool },
    AfterPropertyName,
    BeforePropertyValue,
    /// Inside an array, before an element. `first` is true right after `[`.
    BeforeArrayValue { first: bool },
    AfterPropertyValue,
    AfterArrayValue,
    /// The single top-level value has completed.
    End,
    /// `EndOfInput` has been emitted.
    Finished,
}

#[derive(Debug, Clone, Copy)]
enum Esc {
    None,
    /// A backslash has been consumed.
    Start,
    /// Inside `\uXXXX`, accumulating hex digits.
    Unicode { acc: u32, len: u8 },
}

#[derive(Debug)]
struct StrScan {
    quote: char,
    esc: Esc,
}

#[derive(Debug, PartialEq)]
enum StrStep {
    NeedMore,
    /// The chunk limit was reached before the closing quote.
    Progress,
    Done,
}

impl StrScan {
    /// Advances string scanning, appending decoded characters to `out`.
    /// Stops at the closing quote, at the chunk `limit`, or when the window
    /// is exhausted.
    fn step(
        &mut self,
        pending_high: &mut Option<u16>,
        w: &mut CharWindow,
        out: &mut String,
        limit: usize,
    ) -> Result<StrStep, SyntaxError> {
        let start_len = out.len();
        loop {
            if out.len().saturating_sub(start_len) >= limit {
                return Ok(StrStep::Progress);
            }
            let Some(c) = w.peek() else {
                if w.is_closed() {
                    return Err(SyntaxError::UnexpectedEndOfString);
                }
                return Ok(StrStep::NeedMore);
            };
            match self.esc {
                Esc::None => {
                    if pending_high.is_some() && c != '\\' {
                        return Err(SyntaxError::InvalidUnicodeEscape(format!(
                            "unpaired surrogate before '{c}'"
                        )));
                    }
                    w.bump();
                    if c == '\\' {
                        self.esc = Esc::Start;
                    } else if c == self.quote {
                        return Ok(StrStep::Done);
                    } else {
                        out.push(c);
                    }
                }
                Esc::Start => {
                    w.bump();
                    if pending_high.is_some() && c != 'u' {
                        return Err(SyntaxError::InvalidUnicodeEscape(format!(
                            "unpaired surrogate before '\\{c}'"
                        )));
                    }
                    match c {
                        '"' => out.push('"'),
                        '\'' => out.push('\''),
                        '\\' => out.push('\\'),
                        '/' => out.push('/'),
                        'b' => out.push('\u{0008}'),
                        'f' => out.push('\u{000C}'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'u' => {
                            self.esc = Esc::Unicode { acc: 0, len: 0 };
                            continue;
                        }
                        other => {
                            return Err(SyntaxError::UnrecognizedEscape(format!("\\{other}")));
                        }
                    }
                    self.esc = Esc::None;
                }
                Esc::Unicode { acc, len } => {
                    w.bump();
                    let Some(d) = c.to_digit(16) else {
                        return Err(SyntaxError::InvalidUnicodeEscape(format!("\\u..{c}")));
                    };
                    let acc = (acc << 4) | d;
                    if len < 3 {
                        self.esc = Esc::Unicode { acc, len: len + 1 };
                        continue;
                    }
                    self.esc = Esc::None;
                    match (*pending_high, acc) {
                        (Some(high), 0xDC00..=0xDFFF) => {
                            let cp =
                                0x10000 + (((high as u32 - 0xD800) << 10) | (acc - 0xDC00));
                            *pending_high = None;
                            out.push(char::from_u32(cp).ok_or_else(|| {
                                SyntaxError::InvalidUnicodeEscape(format!("\\u{acc:04X}"))
                            })?);
                        }
                        (Some(_), _) | (None, 0xDC00..=0xDFFF) => {
                            return Err(SyntaxError::InvalidUnicodeEscape(format!(
                                "\\u{acc:04X}"
                            )));
                        }
                        (None, 0xD800..=0xDBFF) => *pending_high = Some(acc as u16),
                        (None, cp) => {
                            out.push(char::from_u32(cp).ok_or_else(|| {
                                SyntaxError::InvalidUnicodeEscape(format!("\\u{cp:04X}"))
                            })?);
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumStage {
    Sign,
    Zero,
    Int,
    Dot,
    Frac,
    Exp,
    ExpSign,
    ExpDigits,
}

impl NumStage {
    fn is_terminal(self) -> bool {
        matches!(
            self,
            NumStage::Zero | NumStage::Int | NumStage::Frac | NumStage::ExpDigits
        )
    }
}

#[derive(Debug)]
struct KeywordScan {
    expected: &'static str,
    matched: usize,
}

impl KeywordScan {
    /// Returns `Ok(Some(true))` when the keyword matched completely with a
    /// confirmed token boundary after it.
    fn step(&mut self, w: &mut CharWindow) -> Result<Option<bool>, SyntaxError> {
        let bytes = self.expected.as_bytes();
        while self.matched < bytes.len() {
            let Some(c) = w.peek() else {
                if w.is_closed() {
                    return Err(SyntaxError::UnexpectedToken(
                        self.expected[..self.matched].to_owned(),
                    ));
                }
                return Ok(None);
            };
            if c == bytes[self.matched] as char {
                w.bump();
                self.matched += 1;
            } else {
                return Err(SyntaxError::UnexpectedToken(format!(
                    "{}{c}",
                    &self.expected[..self.matched]
                )));
            }
        }
        // Confirm the literal is not a prefix of a longer identifier.
        match w.peek() {
            None if !w.is_closed() => Ok(None),
            Some(c) if is_ident_char(c) => Err(SyntaxError::UnexpectedToken(format!(
                "{}{c}",
                self.expected
            ))),
            _ => Ok(Some(true)),
        }
    }
}

#[derive(Debug)]
enum Lex {
    Idle,
    Str(StrScan),
    Num(NumStage),
    Keyword(KeywordScan),
    UnquotedName,
}

/// Class of the value at the read position, used by the carve-out API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueClass {
    String,
    Null,
    Other,
}

/// The carve-out currently draining a value, if any.
#[derive(Debug)]
enum StreamMode {
    None,
    Text(StrScan),
    Null(KeywordScan),
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

#[derive(Debug)]
pub(crate) struct Scanner {
    phase: Phase,
    scopes: Vec<ScopeKind>,
    lex: Lex,
    scratch: String,
    pending_high: Option<u16>,
    last_name: String,
    stream: StreamMode,
    ieee754_compatible: bool,
    max_depth: usize,
}

impl Scanner {
    pub(crate) fn new(ieee754_compatible: bool, max_depth: usize) -> Self {
        Self {
            phase: Phase::Start,
            scopes: Vec::new(),
            lex: Lex::Idle,
            scratch: String::new(),
            pending_high: None,
            last_name: String::new(),
            stream: StreamMode::None,
            ieee754_compatible,
            max_depth,
        }
    }

    /// Produces the next node, or `None` when the window needs a refill.
    pub(crate) fn try_next(
        &mut self,
        w: &mut CharWindow,
    ) -> Result<Option<(NodeKind, Option<Value>)>, SyntaxError> {
        debug_assert!(matches!(self.stream, StreamMode::None));
        loop {
            if !matches!(self.lex, Lex::Idle) {
                match self.resume_literal(w)? {
                    None => return Ok(None),
                    Some(node) => return Ok(Some(node)),
                }
            }
            while let Some(c) = w.peek() {
                if c.is_whitespace() {
                    w.bump();
                } else {
                    break;
                }
            }
            let Some(c) = w.peek() else {
                if !w.is_closed() {
                    return Ok(None);
                }
                return self.at_end_of_input().map(Some);
            };
            match self.phase {
                Phase::Start | Phase::BeforePropertyValue => {
                    if let Some(node) = self.start_value(c, w)? {
                        return Ok(Some(node));
                    }
                }
                Phase::BeforeArrayValue { first } => {
                    if c == ']' {
                        if !first {
                            return Err(SyntaxError::UnexpectedComma("array"));
                        }
                        w.bump();
                        return Ok(Some(self.end_scope(NodeKind::EndArray)));
                    }
                    if let Some(node) = self.start_value(c, w)? {
                        return Ok(Some(node));
                    }
                }
                Phase::BeforePropertyName { first } => {
                    if c == '}' {
                        if !first {
                            return Err(SyntaxError::UnexpectedComma("object"));
                        }
                        w.bump();
                        return Ok(Some(self.end_scope(NodeKind::EndObject)));
                    }
                    if c == '"' || c == '\'' {
                        w.bump();
                        self.scratch.clear();
                        self.lex = Lex::Str(StrScan {
                            quote: c,
                            esc: Esc::None,
                        });
                    } else if is_ident_start(c) {
                        self.scratch.clear();
                        self.lex = Lex::UnquotedName;
                    } else if c == ',' {
                        return Err(SyntaxError::UnexpectedComma("object"));
                    } else {
                        return Err(SyntaxError::UnexpectedToken(c.to_string()));
                    }
                }
                Phase::AfterPropertyName => {
                    if c == ':' {
                        w.bump();
                        self.phase = Phase::BeforePropertyValue;
                    } else {
                        return Err(SyntaxError::MissingColon(self.last_name.clone()));
                    }
                }
                Phase::AfterPropertyValue => match c {
                    ',' => {
                        w.bump();
                        self.phase = Phase::BeforePropertyName { first: false };
                    }
                    '}' => {
                        w.bump();
                        return Ok(Some(self.end_scope(NodeKind::EndObject)));
                    }
                    _ => return Err(SyntaxError::MissingCommaInObject),
                },
                Phase::AfterArrayValue => match c {
                    ',' => {
                        w.bump();
                        self.phase = Phase::BeforeArrayValue { first: false };
                    }
                    ']' => {
                        w.bump();
                        return Ok(Some(self.end_scope(NodeKind::EndArray)));
                    }
                    _ => return Err(SyntaxError::MissingCommaInArray),
                },
                Phase::End => return Err(SyntaxError::MultipleTopLevelValues),
                Phase::Finished => return Ok(Some((NodeKind::EndOfInput, None))),
            }
        }
    }

    fn at_end_of_input(&mut self) -> Result<(NodeKind, Option<Value>), SyntaxError> {
        match self.phase {
            Phase::Start | Phase::End | Phase::Finished => {
                self.phase = Phase::Finished;
                Ok((NodeKind::EndOfInput, None))
            }
            _ => Err(SyntaxError::UnexpectedEndOfInput),
        }
    }

    /// Begins (or refuses) a value at `c`. Returns a node for structural
    /// openers; literal starts arm the lexer and return `None` so the main
    /// loop resumes them.
    fn start_value(
        &mut self,
        c: char,
        w: &mut CharWindow,
    ) -> Result<Option<(NodeKind, Option<Value>)>, SyntaxError> {
        match c {
            '{' => {
                w.bump();
                self.push_scope(ScopeKind::Object)?;
                self.phase = Phase::BeforePropertyName { first: true };
                Ok(Some((NodeKind::StartObject, None)))
            }
            '[' => {
                w.bump();
                self.push_scope(ScopeKind::Array)?;
                self.phase = Phase::BeforeArrayValue { first: true };
                Ok(Some((NodeKind::StartArray, None)))
            }
            '"' | '\'' => {
                w.bump();
                self.scratch.clear();
                self.lex = Lex::Str(StrScan {
                    quote: c,
                    esc: Esc::None,
                });
                Ok(None)
            }
            '-' => {
                w.bump();
                self.scratch.clear();
                self.scratch.push(c);
                self.lex = Lex::Num(NumStage::Sign);
                Ok(None)
            }
            '0' => {
                w.bump();
                self.scratch.clear();
                self.scratch.push(c);
                self.lex = Lex::Num(NumStage::Zero);
                Ok(None)
            }
            '1'..='9' => {
                w.bump();
                self.scratch.clear();
                self.scratch.push(c);
                self.lex = Lex::Num(NumStage::Int);
                Ok(None)
            }
            't' => {
                self.lex = Lex::Keyword(KeywordScan {
                    expected: "true",
                    matched: 0,
                });
                Ok(None)
            }
            'f' => {
                self.lex = Lex::Keyword(KeywordScan {
                    expected: "false",
                    matched: 0,
                });
                Ok(None)
            }
            'n' => {
                self.lex = Lex::Keyword(KeywordScan {
                    expected: "null",
                    matched: 0,
                });
                Ok(None)
            }
            ',' => Err(SyntaxError::UnexpectedComma(match self.scopes.last() {
                None => "document",
                Some(ScopeKind::Object) => "property",
                Some(ScopeKind::Array) => "array",
            })),
            other => Err(SyntaxError::UnexpectedToken(other.to_string())),
        }
    }

    fn push_scope(&mut self, kind: ScopeKind) -> Result<(), SyntaxError> {
        if self.scopes.len() >= self.max_depth {
            return Err(SyntaxError::DepthLimitExceeded(self.max_depth));
        }
        self.scopes.push(kind);
        Ok(())
    }

    fn end_scope(&mut self, node: NodeKind) -> (NodeKind, Option<Value>) {
        self.scopes.pop();
        self.phase = self.value_done_phase();
        (node, None)
    }

    fn value_done_phase(&self) -> Phase {
        match self.scopes.last() {
            None => Phase::End,
            Some(ScopeKind::Object) => Phase::AfterPropertyValue,
            Some(ScopeKind::Array) => Phase::AfterArrayValue,
        }
    }

    fn resume_literal(
        &mut self,
        w: &mut CharWindow,
    ) -> Result<Option<(NodeKind, Option<Value>)>, SyntaxError> {
        match &mut self.lex {
            Lex::Idle => unreachable!("resume_literal called while idle"),
            Lex::Str(scan) => {
                let mut out = std::mem::take(&mut self.scratch);
                let step = scan.step(&mut self.pending_high, w, &mut out, usize::MAX);
                self.scratch = out;
                match step? {
                    StrStep::NeedMore | StrStep::Progress => Ok(None),
                    StrStep::Done => {
                        self.lex = Lex::Idle;
                        let text = std::mem::take(&mut self.scratch);
                        if matches!(self.phase, Phase::BeforePropertyName { .. }) {
                            self.last_name = text.clone();
                            self.phase = Phase::AfterPropertyName;
                            Ok(Some((NodeKind::Property, Some(Value::String(text)))))
                        } else {
                            self.phase = self.value_done_phase();
                            Ok(Some((
                                NodeKind::PrimitiveValue,
                                Some(Value::String(text)),
                            )))
                        }
                    }
                }
            }
            Lex::UnquotedName => {
                loop {
                    let Some(c) = w.peek() else {
                        if !w.is_closed() {
                            return Ok(None);
                        }
                        break;
                    };
                    if is_ident_char(c) {
                        w.bump();
                        self.scratch.push(c);
                    } else {
                        break;
                    }
                }
                self.lex = Lex::Idle;
                let name = std::mem::take(&mut self.scratch);
                self.last_name = name.clone();
                self.phase = Phase::AfterPropertyName;
                Ok(Some((NodeKind::Property, Some(Value::String(name)))))
            }
            Lex::Num(stage) => {
                loop {
                    let Some(c) = w.peek() else {
                        if !w.is_closed() {
                            return Ok(None);
                        }
                        break;
                    };
                    let next = match (*stage, c) {
                        (NumStage::Sign, '0') => Some(NumStage::Zero),
                        (NumStage::Sign, '1'..='9') => Some(NumStage::Int),
                        (NumStage::Zero | NumStage::Int, '.') => Some(NumStage::Dot),
                        (NumStage::Zero | NumStage::Int, 'e' | 'E') => Some(NumStage::Exp),
                        (NumStage::Int, '0'..='9') => Some(NumStage::Int),
                        (NumStage::Dot | NumStage::Frac, '0'..='9') => Some(NumStage::Frac),
                        (NumStage::Frac, 'e' | 'E') => Some(NumStage::Exp),
                        (NumStage::Exp, '+' | '-') => Some(NumStage::ExpSign),
                        (NumStage::Exp | NumStage::ExpSign | NumStage::ExpDigits, '0'..='9') => {
                            Some(NumStage::ExpDigits)
                        }
                        _ => None,
                    };
                    match next {
                        Some(s) => {
                            w.bump();
                            self.scratch.push(c);
                            *stage = s;
                        }
                        None => break,
                    }
                }
                let stage = *stage;
                let Some(c) = w.peek() else {
                    if !w.is_closed() {
                        return Ok(None);
                    }
                    return self.finish_number(stage);
                };
                // A number must end at whitespace or a structural delimiter.
                if stage.is_terminal() && (c.is_whitespace() || matches!(c, ',' | '}' | ']')) {
                    self.finish_number(stage)
                } else {
                    Err(SyntaxError::InvalidNumber(format!("{}{c}", self.scratch)))
                }
            }
            Lex::Keyword(scan) => match scan.step(w)? {
                None => Ok(None),
                Some(_) => {
                    let value = match scan.expected {
                        "true" => Value::Bool(true),
                        "false" => Value::Bool(false),
                        _ => Value::Null,
                    };
                    self.lex = Lex::Idle;
                    self.phase = self.value_done_phase();
                    Ok(Some((NodeKind::PrimitiveValue, Some(value))))
                }
            },
        }
    }

    fn finish_number(
        &mut self,
        stage: NumStage,
    ) -> Result<Option<(NodeKind, Option<Value>)>, SyntaxError> {
        if !stage.is_terminal() {
            return Err(SyntaxError::InvalidNumber(self.scratch.clone()));
        }
        self.lex = Lex::Idle;
        let lexeme = std::mem::take(&mut self.scratch);
        let number = if self.ieee754_compatible {
            if lexeme.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
                match lexeme.parse::<i64>() {
                    Ok(i) => Number::Int(i),
                    // Preserve precision for integers wider than i64.
                    Err(_) => Number::Decimal(lexeme),
                }
            } else {
                Number::Decimal(lexeme)
            }
        } else {
            let d = lexeme
                .parse::<f64>()
                .map_err(|_| SyntaxError::InvalidNumber(lexeme.clone()))?;
            Number::Double(d)
        };
        self.phase = self.value_done_phase();
        Ok(Some((NodeKind::PrimitiveValue, Some(Value::Number(number)))))
    }

    // ------------------------------------------------------------------
    // Stream carve-out support
    // ------------------------------------------------------------------

    /// Classifies the value at the read position without consuming it.
    /// Returns `None` when more input is needed to decide.
    pub(crate) fn try_peek_value_class(
        &mut self,
        w: &mut CharWindow,
    ) -> Result<Option<ValueClass>, SyntaxError> {
        if !matches!(self.lex, Lex::Idle) || !matches!(self.stream, StreamMode::None) {
            return Ok(Some(ValueClass::Other));
        }
        loop {
            while let Some(c) = w.peek() {
                if c.is_whitespace() {
                    w.bump();
                } else {
                    break;
                }
            }
            let Some(c) = w.peek() else {
                if !w.is_closed() {
                    return Ok(None);
                }
                return Ok(Some(ValueClass::Other));
            };
            match self.phase {
                Phase::AfterPropertyName => {
                    if c == ':' {
                        w.bump();
                        self.phase = Phase::BeforePropertyValue;
                        continue;
                    }
                    return Err(SyntaxError::MissingColon(self.last_name.clone()));
                }
                Phase::Start | Phase::BeforePropertyValue | Phase::BeforeArrayValue { .. } => {
                    return Ok(Some(match c {
                        '"' | '\'' => ValueClass::String,
                        'n' => ValueClass::Null,
                        _ => ValueClass::Other,
                    }));
                }
                _ => return Ok(Some(ValueClass::Other)),
            }
        }
    }

    /// Enters stream state on the value at the read position. Returns
    /// `None` when more input is needed to reach the value.
    pub(crate) fn try_begin_value_stream(
        &mut self,
        w: &mut CharWindow,
    ) -> Result<Option<()>, SyntaxError> {
        let Some(class) = self.try_peek_value_class(w)? else {
            return Ok(None);
        };
        match class {
            ValueClass::String => {
                let Some(quote) = w.bump() else {
                    return Err(SyntaxError::UnexpectedEndOfInput);
                };
                self.stream = StreamMode::Text(StrScan {
                    quote,
                    esc: Esc::None,
                });
                Ok(Some(()))
            }
            ValueClass::Null => {
                self.stream = StreamMode::Null(KeywordScan {
                    expected: "null",
                    matched: 0,
                });
                Ok(Some(()))
            }
            ValueClass::Other => Err(SyntaxError::NotStreamable),
        }
    }

    /// Drains up to `limit` decoded characters of the streamed value into
    /// `out`. `Ok(Some(true))` means the value is complete and the scanner
    /// is repositioned after it; `None` means a refill is needed.
    pub(crate) fn try_stream_text(
        &mut self,
        w: &mut CharWindow,
        out: &mut String,
        limit: usize,
    ) -> Result<Option<bool>, SyntaxError> {
        match &mut self.stream {
            StreamMode::None => Err(SyntaxError::InStreamState),
            StreamMode::Text(scan) => {
                match scan.step(&mut self.pending_high, w, out, limit)? {
                    StrStep::NeedMore => Ok(None),
                    StrStep::Progress => Ok(Some(false)),
                    StrStep::Done => {
                        self.stream = StreamMode::None;
                        self.phase = self.value_done_phase();
                        Ok(Some(true))
                    }
                }
            }
            StreamMode::Null(scan) => match scan.step(w)? {
                None => Ok(None),
                Some(_) => {
                    self.stream = StreamMode::None;
                    self.phase = self.value_done_phase();
                    Ok(Some(true))
                }
            },
        }
    }

    pub(crate) fn in_stream_state(&self) -> bool {
        !matches!(self.stream, StreamMode::None)
    }
}
