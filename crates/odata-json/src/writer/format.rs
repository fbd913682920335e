//! Primitive value formatting.
//!
//! One closed sum type covers every primitive the emitter can write, with a
//! single formatting function keyed by variant. The quoting rules here are
//! interoperability-critical: 64-bit integers and decimals are stringified
//! under IEEE754-compatible mode, non-finite floats are always quoted, and
//! an integral double keeps a trailing `.0`.

use crate::types::{Date, DateTimeOffset, Duration, Guid, TimeOfDay};

/// A primitive value the emitter knows how to format.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    /// A decimal lexeme carried as text to avoid precision loss.
    Decimal(String),
    String(String),
    /// Binary data, written as a base64 string.
    Bytes(Vec<u8>),
    Guid(Guid),
    Date(Date),
    TimeOfDay(TimeOfDay),
    DateTimeOffset(DateTimeOffset),
    Duration(Duration),
}

/// How a formatted primitive must be written out.
#[derive(Debug, PartialEq)]
pub(crate) enum Formatted {
    /// Verbatim token, no quotes.
    Bare(String),
    /// Quoted, contents guaranteed escape-free.
    Quoted(String),
    /// A string value that still needs JSON escaping.
    EscapedString(String),
    /// Binary data to be base64-encoded inside quotes.
    Binary(Vec<u8>),
}

fn format_double(d: f64) -> Formatted {
    if d.is_nan() {
        return Formatted::Quoted("NaN".to_owned());
    }
    if d.is_infinite() {
        return Formatted::Quoted(if d > 0.0 { "INF" } else { "-INF" }.to_owned());
    }
    if d == d.trunc() {
        // Integral doubles keep a fractional part for backward compatibility.
        Formatted::Bare(format!("{d:.1}"))
    } else {
        Formatted::Bare(format!("{d}"))
    }
}

fn format_single(f: f32) -> Formatted {
    if f.is_nan() {
        return Formatted::Quoted("NaN".to_owned());
    }
    if f.is_infinite() {
        return Formatted::Quoted(if f > 0.0 { "INF" } else { "-INF" }.to_owned());
    }
    Formatted::Bare(format!("{f}"))
}

pub(crate) fn format_primitive(value: &Primitive, ieee754_compatible: bool) -> Formatted {
    match value {
        Primitive::Null => Formatted::Bare("null".to_owned()),
        Primitive::Bool(b) => Formatted::Bare(if *b { "true" } else { "false" }.to_owned()),
        Primitive::SByte(v) => Formatted::Bare(v.to_string()),
        Primitive::Byte(v) => Formatted::Bare(v.to_string()),
        Primitive::Int16(v) => Formatted::Bare(v.to_string()),
        Primitive::Int32(v) => Formatted::Bare(v.to_string()),
        Primitive::Int64(v) => {
            if ieee754_compatible {
                Formatted::Quoted(v.to_string())
            } else {
                Formatted::Bare(v.to_string())
            }
        }
        Primitive::Single(f) => format_single(*f),
        Primitive::Double(d) => format_double(*d),
        Primitive::Decimal(s) => {
            if ieee754_compatible {
                Formatted::Quoted(s.clone())
            } else {
                Formatted::Bare(s.clone())
            }
        }
        Primitive::String(s) => Formatted::EscapedString(s.clone()),
        Primitive::Bytes(b) => Formatted::Binary(b.clone()),
        Primitive::Guid(g) => Formatted::Quoted(g.to_string()),
        Primitive::Date(d) => Formatted::Quoted(d.to_string()),
        Primitive::TimeOfDay(t) => Formatted::Quoted(t.to_string()),
        Primitive::DateTimeOffset(dto) => Formatted::Quoted(dto.to_string()),
        Primitive::Duration(d) => Formatted::Quoted(d.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_quoting_follows_mode() {
        let d = Primitive::Decimal("42.2".to_owned());
        assert_eq!(
            format_primitive(&d, true),
            Formatted::Quoted("42.2".to_owned())
        );
        assert_eq!(
            format_primitive(&d, false),
            Formatted::Bare("42.2".to_owned())
        );
    }

    #[test]
    fn non_finite_doubles_are_always_quoted() {
        for mode in [true, false] {
            assert_eq!(
                format_primitive(&Primitive::Double(f64::NAN), mode),
                Formatted::Quoted("NaN".to_owned())
            );
            assert_eq!(
                format_primitive(&Primitive::Double(f64::INFINITY), mode),
                Formatted::Quoted("INF".to_owned())
            );
            assert_eq!(
                format_primitive(&Primitive::Double(f64::NEG_INFINITY), mode),
                Formatted::Quoted("-INF".to_owned())
            );
        }
    }

    #[test]
    fn integral_double_keeps_fraction_but_single_does_not() {
        assert_eq!(
            format_primitive(&Primitive::Double(42.0), false),
            Formatted::Bare("42.0".to_owned())
        );
        assert_eq!(
            format_primitive(&Primitive::Single(42.0), false),
            Formatted::Bare("42".to_owned())
        );
    }

    #[test]
    fn int64_quoting_follows_mode() {
        assert_eq!(
            format_primitive(&Primitive::Int64(1), true),
            Formatted::Quoted("1".to_owned())
        );
        assert_eq!(
            format_primitive(&Primitive::Int64(1), false),
            Formatted::Bare("1".to_owned())
        );
    }
}
