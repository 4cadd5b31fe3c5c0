//! Payloads: the encrypted byte stream a vault protects.
//!
//! Both variants encrypt with NaCl secretbox under a fresh 32-byte key,
//! which locking threads into the policy graph as the root secret. Attached
//! payloads carry their ciphertext inline; detached payloads store it as a
//! material keyed by the payload digest, so the vault file and the bytes
//! can travel separately.

use crate::crypto::{hmac_sha256, random_bytes};
use crate::material::Material;
use crate::wire::{Reader, WireError, Writer};
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Key, Nonce, XSalsa20Poly1305};
use std::io::{Read, Write};
use thiserror::Error;

pub const NONCE_SIZE: usize = 24;
pub const KEY_SIZE: usize = 32;

const TAG_ATTACHED: u8 = 1;
const TAG_DETACHED: u8 = 2;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("payload is not locked")]
    NotLocked,

    #[error("invalid payload key length")]
    InvalidKey,

    #[error("missing material for detached payload")]
    MissingMaterial,

    #[error("io error")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Attached(Attached),
    Detached(Detached),
}

impl Payload {
    pub fn digest(&self) -> Result<Vec<u8>, PayloadError> {
        match self {
            Self::Attached(p) => Ok(p.digest()),
            Self::Detached(p) => p.digest().map(<[u8]>::to_vec),
        }
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode(&mut w);
        w.into_bytes()
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        match self {
            Self::Attached(p) => {
                w.put_u8(TAG_ATTACHED);
                w.put_bytes(&p.nonce);
                w.put_bytes(&p.data);
            }
            Self::Detached(p) => {
                w.put_u8(TAG_DETACHED);
                w.put_bytes(&p.nonce);
                w.put_bytes(&p.plaintext_digest);
            }
        }
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let tag = r.u8()?;
        match tag {
            TAG_ATTACHED => Ok(Self::Attached(Attached {
                nonce: r.bytes()?,
                data: r.bytes()?,
            })),
            TAG_DETACHED => Ok(Self::Detached(Detached {
                nonce: r.bytes()?,
                plaintext_digest: r.bytes()?,
            })),
            tag => Err(WireError::UnknownTag { kind: "payload", tag }),
        }
    }
}

fn seal(data: &[u8]) -> Result<(Vec<u8>, Vec<u8>), PayloadError> {
    let key = random_bytes::<KEY_SIZE>();
    let nonce = random_bytes::<NONCE_SIZE>();

    let cipher = XSalsa20Poly1305::new(Key::from_slice(&key));
    let ct = cipher
        .encrypt(Nonce::from_slice(&nonce), data)
        .map_err(|_| PayloadError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ct.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ct);
    Ok((out, key.to_vec()))
}

fn open(nbox: &[u8], key: &[u8]) -> Result<Vec<u8>, PayloadError> {
    let key: [u8; KEY_SIZE] = key.try_into().map_err(|_| PayloadError::InvalidKey)?;
    if nbox.len() < NONCE_SIZE {
        return Err(PayloadError::DecryptionFailed);
    }

    let cipher = XSalsa20Poly1305::new(Key::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(&nbox[..NONCE_SIZE]), &nbox[NONCE_SIZE..])
        .map_err(|_| PayloadError::DecryptionFailed)
}

/// Payload whose ciphertext travels inside the vault message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attached {
    pub nonce: Vec<u8>,
    pub data: Vec<u8>,
}

impl Attached {
    pub fn new() -> Self {
        Self {
            nonce: random_bytes::<NONCE_SIZE>().to_vec(),
            data: Vec::new(),
        }
    }

    /// Encrypt the reader's bytes under a fresh key and return the key.
    pub fn lock(&mut self, r: &mut dyn Read) -> Result<Vec<u8>, PayloadError> {
        let mut data = Vec::new();
        r.read_to_end(&mut data)?;

        let (boxed, key) = seal(&data)?;
        self.data = boxed;
        Ok(key)
    }

    pub fn unlock(&self, w: &mut dyn Write, key: &[u8]) -> Result<(), PayloadError> {
        let data = open(&self.data, key)?;
        w.write_all(&data)?;
        Ok(())
    }

    /// `HMAC-SHA-256(nonce, ciphertext)`
    pub fn digest(&self) -> Vec<u8> {
        hmac_sha256(&self.nonce, &[&self.data])
    }
}

impl Default for Attached {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload whose ciphertext is stored as a material keyed by the digest of
/// the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detached {
    pub nonce: Vec<u8>,
    plaintext_digest: Vec<u8>,
}

impl Detached {
    pub fn new() -> Self {
        Self {
            nonce: random_bytes::<NONCE_SIZE>().to_vec(),
            plaintext_digest: Vec::new(),
        }
    }

    /// Encrypt the reader's bytes and return the key plus the ciphertext
    /// material the caller must store. The digest is taken over the
    /// plaintext before encryption.
    pub fn lock(&mut self, r: &mut dyn Read) -> Result<(Vec<u8>, Material), PayloadError> {
        let mut data = Vec::new();
        r.read_to_end(&mut data)?;

        self.plaintext_digest = hmac_sha256(&self.nonce, &[&data]);
        let (boxed, key) = seal(&data)?;

        let mtrl = Material::new(self.plaintext_digest.clone(), vec![boxed]);
        Ok((key, mtrl))
    }

    pub fn unlock(
        &self,
        w: &mut dyn Write,
        key: &[u8],
        mtrl: &Material,
    ) -> Result<(), PayloadError> {
        let boxed = mtrl.data.first().ok_or(PayloadError::MissingMaterial)?;
        let data = open(boxed, key)?;
        w.write_all(&data)?;
        Ok(())
    }

    pub fn digest(&self) -> Result<&[u8], PayloadError> {
        if self.plaintext_digest.is_empty() {
            return Err(PayloadError::NotLocked);
        }
        Ok(&self.plaintext_digest)
    }
}

impl Default for Detached {
    fn default() -> Self {
        Self::new()
    }
}
