use std::io::{self, Read};

use crate::{JsonReader, NodeKind, ReaderOptions, Value};

pub fn nodes(input: &str) -> Vec<(NodeKind, Option<Value>)> {
    nodes_with(input, &ReaderOptions::default())
}

pub fn nodes_with(input: &str, options: &ReaderOptions) -> Vec<(NodeKind, Option<Value>)> {
    let mut reader = JsonReader::with_options(input.as_bytes(), options);
    let mut out = Vec::new();
    while reader.read().unwrap() {
        out.push((reader.node_kind(), reader.value().cloned()));
    }
    out
}

/// A reader that delivers its data split at predetermined boundaries, so
/// chunk seams land in arbitrary places.
pub struct SplitReader {
    data: Vec<u8>,
    boundaries: Vec<usize>,
    pos: usize,
}

impl SplitReader {
    /// `splits` are interpreted modulo the remaining length, so any random
    /// vector produces a valid partition.
    pub fn new(data: &[u8], splits: &[usize]) -> Self {
        let mut boundaries = Vec::new();
        let mut pos = 0;
        for s in splits {
            if pos >= data.len() {
                break;
            }
            let size = 1 + (s % (data.len() - pos));
            pos += size;
            boundaries.push(pos);
        }
        boundaries.push(data.len());
        Self {
            data: data.to_vec(),
            boundaries,
            pos: 0,
        }
    }
}

impl Read for SplitReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let end = self
            .boundaries
            .iter()
            .copied()
            .find(|b| *b > self.pos)
            .unwrap_or(self.data.len());
        let n = (end - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
