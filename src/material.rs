//! Materials: persisted artifacts keyed by a node's digest, carrying that
//! node's lock-time output buffer.

use crate::crypto::{hmac_sha256, random_bytes};
use crate::wire::{Reader, WireError, Writer};
use thiserror::Error;

pub const NONCE_SIZE: usize = 24;

#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("missing material for node {0}")]
    Missing(String),

    #[error("material digest mismatch")]
    DigestMismatch,

    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub id: Vec<u8>,
    pub nonce: Vec<u8>,
    comment: String,
    pub data: Vec<Vec<u8>>,
}

impl Material {
    pub fn new(id: Vec<u8>, data: Vec<Vec<u8>>) -> Self {
        Self {
            id,
            nonce: random_bytes::<NONCE_SIZE>().to_vec(),
            comment: String::new(),
            data,
        }
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// `HMAC-SHA-256(nonce, id ‖ data…)`
    pub fn digest(&self) -> Vec<u8> {
        let mut parts: Vec<&[u8]> = vec![&self.id];
        parts.extend(self.data.iter().map(Vec::as_slice));
        hmac_sha256(&self.nonce, &parts)
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode(&mut w);
        w.into_bytes()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(data);
        let mtrl = Self::decode(&mut r)?;
        r.finish()?;
        Ok(mtrl)
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        w.put_bytes(&self.id);
        w.put_bytes(&self.nonce);
        w.put_str(&self.comment);
        w.put_chunks(&self.data);
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            id: r.bytes()?,
            nonce: r.bytes()?,
            comment: r.string()?,
            data: r.chunks()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marshal_roundtrip_preserves_digest() {
        let mtrl = Material::new(vec![0xab; 32], vec![b"chunk one".to_vec(), Vec::new()]);
        let parsed = Material::unmarshal(&mtrl.marshal()).unwrap();
        assert_eq!(parsed, mtrl);
        assert_eq!(parsed.digest(), mtrl.digest());
    }

    #[test]
    fn digest_covers_id_and_data() {
        let base = Material::new(vec![1; 32], vec![b"data".to_vec()]);

        let mut other = base.clone();
        other.id = vec![2; 32];
        assert_ne!(other.digest(), base.digest());

        let mut other = base.clone();
        other.data[0] = b"tampered".to_vec();
        assert_ne!(other.digest(), base.digest());
    }
}
