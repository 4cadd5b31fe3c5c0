//! Length-prefixed binary encoding shared by every serialized message.
//!
//! All integers are little-endian. Byte strings are a `u32` length followed
//! by the raw bytes; chunk lists are a `u32` count of byte strings. Parsing
//! fails closed: unknown envelope tags, truncated fields, and trailing bytes
//! are all errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("unexpected end of message")]
    UnexpectedEof,

    #[error("trailing bytes after message")]
    TrailingBytes,

    #[error("unknown {kind} tag {tag}")]
    UnknownTag { kind: &'static str, tag: u8 },

    #[error("invalid utf-8 string field")]
    InvalidString,

    #[error("invalid length field")]
    InvalidLength,
}

#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_bytes(&mut self, v: &[u8]) {
        self.put_u32(v.len() as u32);
        self.buf.extend_from_slice(v);
    }

    pub fn put_str(&mut self, v: &str) {
        self.put_bytes(v.as_bytes());
    }

    pub fn put_chunks(&mut self, chunks: &[Vec<u8>]) {
        self.put_u32(chunks.len() as u32);
        for chunk in chunks {
            self.put_bytes(chunk);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.data.len() - self.pos < n {
            return Err(WireError::UnexpectedEof);
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32, WireError> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes(raw.try_into().expect("4 bytes")))
    }

    pub fn u64(&mut self) -> Result<u64, WireError> {
        let raw = self.take(8)?;
        Ok(u64::from_le_bytes(raw.try_into().expect("8 bytes")))
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.u32()? as usize;
        if len > self.data.len() - self.pos {
            return Err(WireError::InvalidLength);
        }
        Ok(self.take(len)?.to_vec())
    }

    pub fn string(&mut self) -> Result<String, WireError> {
        String::from_utf8(self.bytes()?).map_err(|_| WireError::InvalidString)
    }

    pub fn chunks(&mut self) -> Result<Vec<Vec<u8>>, WireError> {
        let count = self.u32()? as usize;
        if count > self.data.len() - self.pos {
            return Err(WireError::InvalidLength);
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.bytes()?);
        }
        Ok(out)
    }

    /// Every message parser calls this last so extra data fails closed.
    pub fn finish(self) -> Result<(), WireError> {
        if self.pos != self.data.len() {
            return Err(WireError::TrailingBytes);
        }
        Ok(())
    }
}

/// Encode an ordered chunk list as a standalone byte stream. Demux packs its
/// per-secret chunks this way, and MSP packs each role's share parts.
pub fn pack_chunks(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut w = Writer::new();
    w.put_chunks(chunks);
    w.into_bytes()
}

pub fn unpack_chunks(data: &[u8]) -> Result<Vec<Vec<u8>>, WireError> {
    let mut r = Reader::new(data);
    let chunks = r.chunks()?;
    r.finish()?;
    Ok(chunks)
}
