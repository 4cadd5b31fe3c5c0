//! Symmetric-key cryptex over NaCl secretbox (XSalsa20-Poly1305).
//!
//! The key input is a pre-shared byte string; when it is absent at close
//! time a fresh 32-byte key is generated and written back into the input
//! buffer so the parent captures it as its own secret. The actual cipher
//! key is SHA-256 of that byte string, which lets arbitrary-length
//! passwords act as keys.

use super::{CryptexError, non_nil_len};
use crate::crypto::{random_bytes, random_vec};
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Key, Nonce, XSalsa20Poly1305};
use sha2::{Digest, Sha256};

pub const NONCE_SIZE: usize = 24;
pub const OVERHEAD: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretBox {
    pub comment: String,
}

impl SecretBox {
    pub fn new(comment: impl Into<String>) -> Self {
        Self { comment: comment.into() }
    }

    pub fn close(
        &self,
        inputs: &mut [Option<Vec<u8>>],
        secrets: &[Vec<u8>],
    ) -> Result<(), CryptexError> {
        if inputs.len() != 2 {
            return Err(CryptexError::Arity("SecretBox supports exactly 2 inputs"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("SecretBox supports only a single secret"));
        }

        let pass = match inputs[0].take() {
            Some(pass) if !pass.is_empty() => pass,
            _ => random_vec(32),
        };
        let key = Sha256::digest(&pass);
        let nonce = random_bytes::<NONCE_SIZE>();

        let cipher = XSalsa20Poly1305::new(Key::from_slice(&key));
        let ct = cipher
            .encrypt(Nonce::from_slice(&nonce), secrets[0].as_slice())
            .map_err(|_| CryptexError::InvalidState("secretbox seal failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ct.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ct);

        inputs[0] = Some(pass);
        inputs[1] = Some(out);
        Ok(())
    }

    pub fn open(
        &self,
        secrets: &mut [Vec<u8>],
        inputs: &[Option<Vec<u8>>],
    ) -> Result<(), CryptexError> {
        if inputs.len() != 2 {
            return Err(CryptexError::Arity("SecretBox supports exactly 2 inputs"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("SecretBox supports only a single secret"));
        }
        if non_nil_len(inputs) != 2 {
            return Err(CryptexError::Unsatisfied("SecretBox requires both inputs"));
        }

        let pass = inputs[0].as_ref().expect("checked non-nil");
        let nbox = inputs[1].as_ref().expect("checked non-nil");
        if nbox.len() < NONCE_SIZE + OVERHEAD {
            return Err(CryptexError::DecryptionFailed);
        }

        let key = Sha256::digest(pass);
        let cipher = XSalsa20Poly1305::new(Key::from_slice(&key));
        let secret = cipher
            .decrypt(Nonce::from_slice(&nbox[..NONCE_SIZE]), &nbox[NONCE_SIZE..])
            .map_err(|_| CryptexError::DecryptionFailed)?;

        secrets[0] = secret;
        Ok(())
    }
}
