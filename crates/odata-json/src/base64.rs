//! Incremental base64 encoding and decoding.
//!
//! Both directions operate on chunks of arbitrary size: the encoder carries
//! up to two pending input bytes between calls, the decoder carries up to
//! three pending sextets. This is what lets the stream carve-outs move
//! multi-megabyte binary values through bounded buffers.

use crate::error::SyntaxError;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Streaming base64 encoder.
#[derive(Debug, Default)]
pub(crate) struct Base64Encoder {
    carry: [u8; 2],
    carry_len: usize,
}

impl Base64Encoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Encodes `input`, appending complete 4-character groups to `out`.
    pub(crate) fn encode_chunk(&mut self, input: &[u8], out: &mut String) {
        let mut bytes = [0u8; 3];
        let mut have = self.carry_len;
        bytes[..have].copy_from_slice(&self.carry[..have]);
        for &b in input {
            bytes[have] = b;
            have += 1;
            if have == 3 {
                Self::emit_group(&bytes, out);
                have = 0;
            }
        }
        self.carry[..have].copy_from_slice(&bytes[..have]);
        self.carry_len = have;
    }

    /// Flushes the pending bytes, padding the final group.
    pub(crate) fn finish(&mut self, out: &mut String) {
        match self.carry_len {
            0 => {}
            1 => {
                let b = self.carry[0] as usize;
                out.push(ALPHABET[b >> 2] as char);
                out.push(ALPHABET[(b << 4) & 0x3f] as char);
                out.push_str("==");
            }
            _ => {
                let b0 = self.carry[0] as usize;
                let b1 = self.carry[1] as usize;
                out.push(ALPHABET[b0 >> 2] as char);
                out.push(ALPHABET[((b0 << 4) | (b1 >> 4)) & 0x3f] as char);
                out.push(ALPHABET[(b1 << 2) & 0x3f] as char);
                out.push('=');
            }
        }
        self.carry_len = 0;
    }

    fn emit_group(bytes: &[u8; 3], out: &mut String) {
        let n = ((bytes[0] as usize) << 16) | ((bytes[1] as usize) << 8) | bytes[2] as usize;
        out.push(ALPHABET[(n >> 18) & 0x3f] as char);
        out.push(ALPHABET[(n >> 12) & 0x3f] as char);
        out.push(ALPHABET[(n >> 6) & 0x3f] as char);
        out.push(ALPHABET[n & 0x3f] as char);
    }
}

fn sextet(c: char) -> Option<u8> {
    match c {
        'A'..='Z' => Some(c as u8 - b'A'),
        'a'..='z' => Some(c as u8 - b'a' + 26),
        '0'..='9' => Some(c as u8 - b'0' + 52),
        '+' => Some(62),
        '/' => Some(63),
        _ => None,
    }
}

/// Streaming base64 decoder.
#[derive(Debug, Default)]
pub(crate) struct Base64Decoder {
    quad: [u8; 4],
    quad_len: usize,
    finished: bool,
    /// One more `=` is still legal after a two-sextet final group.
    pad_allowed: bool,
}

impl Base64Decoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Decodes `input` characters, appending bytes to `out`. Padding (`=`)
    /// terminates the stream; anything after it is an error.
    pub(crate) fn decode_chunk(&mut self, input: &str, out: &mut Vec<u8>) -> Result<(), SyntaxError> {
        for c in input.chars() {
            if self.finished {
                if c == '=' && self.pad_allowed {
                    self.pad_allowed = false;
                    continue;
                }
                return Err(SyntaxError::InvalidBase64(c));
            }
            if c == '=' {
                match self.quad_len {
                    2 => {
                        out.push((self.quad[0] << 2) | (self.quad[1] >> 4));
                        self.finished = true;
                        self.pad_allowed = true;
                        self.quad_len = 0;
                    }
                    3 => {
                        out.push((self.quad[0] << 2) | (self.quad[1] >> 4));
                        out.push((self.quad[1] << 4) | (self.quad[2] >> 2));
                        self.finished = true;
                        self.quad_len = 0;
                    }
                    _ => return Err(SyntaxError::InvalidBase64(c)),
                }
                continue;
            }
            let s = sextet(c).ok_or(SyntaxError::InvalidBase64(c))?;
            self.quad[self.quad_len] = s;
            self.quad_len += 1;
            if self.quad_len == 4 {
                out.push((self.quad[0] << 2) | (self.quad[1] >> 4));
                out.push((self.quad[1] << 4) | (self.quad[2] >> 2));
                out.push((self.quad[2] << 6) | self.quad[3]);
                self.quad_len = 0;
            }
        }
        Ok(())
    }

    /// Verifies the stream ended on a group boundary.
    pub(crate) fn finish(&mut self) -> Result<(), SyntaxError> {
        if self.quad_len != 0 {
            return Err(SyntaxError::UnexpectedEndOfString);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_all(input: &[u8], chunk: usize) -> String {
        let mut enc = Base64Encoder::new();
        let mut out = String::new();
        for piece in input.chunks(chunk.max(1)) {
            enc.encode_chunk(piece, &mut out);
        }
        enc.finish(&mut out);
        out
    }

    fn decode_all(input: &str, chunk: usize) -> Vec<u8> {
        let mut dec = Base64Decoder::new();
        let mut out = Vec::new();
        let chars: Vec<char> = input.chars().collect();
        for piece in chars.chunks(chunk.max(1)) {
            let s: String = piece.iter().collect();
            dec.decode_chunk(&s, &mut out).unwrap();
        }
        dec.finish().unwrap();
        out
    }

    #[test]
    fn encode_known_vectors() {
        assert_eq!(encode_all(b"", 3), "");
        assert_eq!(encode_all(b"f", 3), "Zg==");
        assert_eq!(encode_all(b"fo", 3), "Zm8=");
        assert_eq!(encode_all(b"foo", 3), "Zm9v");
        assert_eq!(encode_all(b"foobar", 3), "Zm9vYmFy");
    }

    #[test]
    fn chunk_size_does_not_matter() {
        let data: Vec<u8> = (0u8..=255).collect();
        let whole = encode_all(&data, data.len());
        for chunk in 1..7 {
            assert_eq!(encode_all(&data, chunk), whole);
        }
        for chunk in 1..7 {
            assert_eq!(decode_all(&whole, chunk), data);
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        let mut dec = Base64Decoder::new();
        let mut out = Vec::new();
        assert_eq!(
            dec.decode_chunk("Zm!v", &mut out),
            Err(SyntaxError::InvalidBase64('!'))
        );
    }

    #[test]
    fn decode_rejects_data_after_padding() {
        let mut dec = Base64Decoder::new();
        let mut out = Vec::new();
        assert!(dec.decode_chunk("Zg==Zg", &mut out).is_err());
    }
}
