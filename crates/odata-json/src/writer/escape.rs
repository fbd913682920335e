//! JSON string escaping.
//!
//! Only the characters JSON requires to be escaped are touched: the quote,
//! the backslash and C0 controls. Everything else, including non-ASCII, is
//! written through in the configured output encoding.

use std::borrow::Cow;

/// The escape sequence for `c`, if it needs one.
pub(crate) fn escape_of(c: char) -> Option<Cow<'static, str>> {
    Some(match c {
        '"' => Cow::Borrowed("\\\""),
        '\\' => Cow::Borrowed("\\\\"),
        '\u{0008}' => Cow::Borrowed("\\b"),
        '\u{000C}' => Cow::Borrowed("\\f"),
        '\n' => Cow::Borrowed("\\n"),
        '\r' => Cow::Borrowed("\\r"),
        '\t' => Cow::Borrowed("\\t"),
        c if (c as u32) < 0x20 => Cow::Owned(format!("\\u{:04x}", c as u32)),
        _ => return None,
    })
}
