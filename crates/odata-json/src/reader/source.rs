//! Character source for the tokenizer.
//!
//! [`CharWindow`] is a growable window of decoded characters the scanner
//! pulls from. Bytes are fed in arbitrarily sized chunks; the decoder
//! carries partial code units (and unpaired UTF-16 surrogate halves) across
//! chunk boundaries so a refill can land anywhere in the input.

use std::sync::Arc;

use crate::error::SyntaxError;
use crate::pool::BufferPool;

/// Text encoding of the payload bytes.
///
/// When not forced, the encoding is detected from a byte-order mark and
/// defaults to UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

#[derive(Debug)]
struct ByteDecoder {
    encoding: Option<Encoding>,
    /// Partial code unit (or undetected BOM prefix) carried between chunks.
    pending: [u8; 4],
    pending_len: usize,
    /// A UTF-16 high surrogate waiting for its low half.
    pending_high: Option<u16>,
    bom_checked: bool,
}

impl ByteDecoder {
    fn new(forced: Option<Encoding>) -> Self {
        Self {
            encoding: forced,
            pending: [0; 4],
            pending_len: 0,
            pending_high: None,
            bom_checked: forced.is_some(),
        }
    }

    fn decode(&mut self, bytes: &[u8], out: &mut Vec<char>) -> Result<(), SyntaxError> {
        if !self.bom_checked {
            // Accumulate up to four bytes before sniffing; the longest BOM
            // (UTF-32) is four bytes and a prefix of the UTF-16 one.
            if self.pending_len + bytes.len() < 4 {
                self.pending[self.pending_len..self.pending_len + bytes.len()]
                    .copy_from_slice(bytes);
                self.pending_len += bytes.len();
                return Ok(());
            }
            let mut owned = Vec::with_capacity(self.pending_len + bytes.len());
            owned.extend_from_slice(&self.pending[..self.pending_len]);
            owned.extend_from_slice(bytes);
            self.pending_len = 0;
            let skip = self.sniff_bom(&owned);
            self.bom_checked = true;
            return self.decode_units(&owned[skip..], out);
        }
        self.decode_units(bytes, out)
    }

    fn sniff_bom(&mut self, bytes: &[u8]) -> usize {
        if bytes.len() >= 4 && bytes[..4] == [0x00, 0x00, 0xFE, 0xFF] {
            self.encoding = Some(Encoding::Utf32Be);
            return 4;
        }
        if bytes.len() >= 4 && bytes[..4] == [0xFF, 0xFE, 0x00, 0x00] {
            self.encoding = Some(Encoding::Utf32Le);
            return 4;
        }
        if bytes.len() >= 2 && bytes[..2] == [0xFE, 0xFF] {
            self.encoding = Some(Encoding::Utf16Be);
            return 2;
        }
        if bytes.len() >= 2 && bytes[..2] == [0xFF, 0xFE] {
            self.encoding = Some(Encoding::Utf16Le);
            return 2;
        }
        if bytes.len() >= 3 && bytes[..3] == [0xEF, 0xBB, 0xBF] {
            self.encoding = Some(Encoding::Utf8);
            return 3;
        }
        self.encoding.get_or_insert(Encoding::Utf8);
        0
    }

    fn decode_units(&mut self, bytes: &[u8], out: &mut Vec<char>) -> Result<(), SyntaxError> {
        match self.encoding.unwrap_or(Encoding::Utf8) {
            Encoding::Utf8 => self.decode_utf8(bytes, out),
            Encoding::Utf16Le => self.decode_utf16(bytes, out, true),
            Encoding::Utf16Be => self.decode_utf16(bytes, out, false),
            Encoding::Utf32Le => self.decode_utf32(bytes, out, true),
            Encoding::Utf32Be => self.decode_utf32(bytes, out, false),
        }
    }

    fn decode_utf8(&mut self, bytes: &[u8], out: &mut Vec<char>) -> Result<(), SyntaxError> {
        let mut i = 0;
        // Stitch a pending multi-byte sequence together first.
        while self.pending_len > 0 && i < bytes.len() {
            self.pending[self.pending_len] = bytes[i];
            self.pending_len += 1;
            i += 1;
            let need = utf8_len(self.pending[0]).ok_or(SyntaxError::InvalidEncoding("UTF-8"))?;
            if self.pending_len == need {
                let seq = &self.pending[..need];
                out.push(decode_utf8_seq(seq)?);
                self.pending_len = 0;
            }
        }
        while i < bytes.len() {
            let b = bytes[i];
            let need = utf8_len(b).ok_or(SyntaxError::InvalidEncoding("UTF-8"))?;
            if i + need > bytes.len() {
                let rest = bytes.len() - i;
                self.pending[..rest].copy_from_slice(&bytes[i..]);
                self.pending_len = rest;
                return Ok(());
            }
            out.push(decode_utf8_seq(&bytes[i..i + need])?);
            i += need;
        }
        Ok(())
    }

    fn decode_utf16(
        &mut self,
        bytes: &[u8],
        out: &mut Vec<char>,
        little: bool,
    ) -> Result<(), SyntaxError> {
        for &b in bytes {
            self.pending[self.pending_len] = b;
            self.pending_len += 1;
            if self.pending_len < 2 {
                continue;
            }
            let unit = if little {
                u16::from_le_bytes([self.pending[0], self.pending[1]])
            } else {
                u16::from_be_bytes([self.pending[0], self.pending[1]])
            };
            self.pending_len = 0;
            if let Some(high) = self.pending_high.take() {
                if (0xDC00..=0xDFFF).contains(&unit) {
                    let cp = 0x10000 + (((high as u32 - 0xD800) << 10) | (unit as u32 - 0xDC00));
                    out.push(char::from_u32(cp).ok_or(SyntaxError::InvalidEncoding("UTF-16"))?);
                    continue;
                }
                return Err(SyntaxError::InvalidEncoding("UTF-16"));
            }
            match unit {
                0xD800..=0xDBFF => self.pending_high = Some(unit),
                0xDC00..=0xDFFF => return Err(SyntaxError::InvalidEncoding("UTF-16")),
                _ => out.push(char::from_u32(unit as u32).expect("BMP scalar")),
            }
        }
        Ok(())
    }

    fn decode_utf32(
        &mut self,
        bytes: &[u8],
        out: &mut Vec<char>,
        little: bool,
    ) -> Result<(), SyntaxError> {
        for &b in bytes {
            self.pending[self.pending_len] = b;
            self.pending_len += 1;
            if self.pending_len < 4 {
                continue;
            }
            let unit = if little {
                u32::from_le_bytes(self.pending)
            } else {
                u32::from_be_bytes(self.pending)
            };
            self.pending_len = 0;
            out.push(char::from_u32(unit).ok_or(SyntaxError::InvalidEncoding("UTF-32"))?);
        }
        Ok(())
    }

    /// Flushes any bytes held back for BOM sniffing and verifies no partial
    /// code unit remains.
    fn finish(&mut self, out: &mut Vec<char>) -> Result<(), SyntaxError> {
        if !self.bom_checked && self.pending_len > 0 {
            let held: Vec<u8> = self.pending[..self.pending_len].to_vec();
            self.pending_len = 0;
            let skip = self.sniff_bom(&held);
            self.bom_checked = true;
            self.decode_units(&held[skip..], out)?;
        }
        if self.pending_high.is_some() {
            return Err(SyntaxError::InvalidEncoding("UTF-16"));
        }
        if self.pending_len > 0 {
            return Err(SyntaxError::InvalidEncoding("truncated"));
        }
        Ok(())
    }
}

fn utf8_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

fn decode_utf8_seq(seq: &[u8]) -> Result<char, SyntaxError> {
    let bad = SyntaxError::InvalidEncoding("UTF-8");
    let cp = match seq.len() {
        1 => seq[0] as u32,
        2 => {
            if seq[1] & 0xC0 != 0x80 {
                return Err(bad);
            }
            (((seq[0] & 0x1F) as u32) << 6) | (seq[1] & 0x3F) as u32
        }
        3 => {
            if seq[1] & 0xC0 != 0x80 || seq[2] & 0xC0 != 0x80 {
                return Err(bad);
            }
            let cp = (((seq[0] & 0x0F) as u32) << 12)
                | (((seq[1] & 0x3F) as u32) << 6)
                | (seq[2] & 0x3F) as u32;
            if cp < 0x800 {
                return Err(bad);
            }
            cp
        }
        _ => {
            if seq[1] & 0xC0 != 0x80 || seq[2] & 0xC0 != 0x80 || seq[3] & 0xC0 != 0x80 {
                return Err(bad);
            }
            let cp = (((seq[0] & 0x07) as u32) << 18)
                | (((seq[1] & 0x3F) as u32) << 12)
                | (((seq[2] & 0x3F) as u32) << 6)
                | (seq[3] & 0x3F) as u32;
            if cp < 0x10000 {
                return Err(bad);
            }
            cp
        }
    };
    char::from_u32(cp).ok_or(bad)
}

/// The tokenizer's internal character window, optionally backed by a rented
/// pool buffer that is returned exactly once on drop.
pub(crate) struct CharWindow {
    decoder: ByteDecoder,
    buf: Vec<char>,
    pos: usize,
    closed: bool,
    pool: Option<Arc<dyn BufferPool>>,
}

impl std::fmt::Debug for CharWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharWindow")
            .field("available", &(self.buf.len() - self.pos))
            .field("closed", &self.closed)
            .finish()
    }
}

impl CharWindow {
    pub(crate) fn new(
        capacity: usize,
        encoding: Option<Encoding>,
        pool: Option<Arc<dyn BufferPool>>,
    ) -> Self {
        let buf = match &pool {
            Some(p) => p.rent(capacity),
            None => Vec::with_capacity(capacity),
        };
        Self {
            decoder: ByteDecoder::new(encoding),
            buf,
            pos: 0,
            closed: false,
            pool,
        }
    }

    /// Decodes `bytes` into the window. Consumed characters are compacted
    /// away first so the window stays bounded by the unread tail.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Result<(), SyntaxError> {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        self.decoder.decode(bytes, &mut self.buf)
    }

    /// Marks end of input. Fails if a partial code unit is still pending.
    pub(crate) fn close(&mut self) -> Result<(), SyntaxError> {
        self.closed = true;
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        self.decoder.finish(&mut self.buf)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.buf.get(self.pos).copied()
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.buf.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

impl Drop for CharWindow {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.give_back(std::mem::take(&mut self.buf));
        }
    }
}
