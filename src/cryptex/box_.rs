//! Public-key cryptex over NaCl box (Curve25519 + XSalsa20-Poly1305).
//!
//! Closing generates an ephemeral keypair and seals the secret to the
//! recipient's 32-byte Curve25519 public key. The ciphertext input packs
//! `ephemeral pubkey(32) ‖ nonce(24) ‖ box`; the second input carries the
//! recipient's private key at open time.

use super::{CryptexError, secretbox::OVERHEAD};
use crate::crypto::random_bytes;
use crypto_box::aead::Aead;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::rngs::OsRng;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoBox {
    pub comment: String,
    pub public_key: Vec<u8>,
}

impl CryptoBox {
    pub fn new(public_key: Vec<u8>, comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            public_key,
        }
    }

    fn validate(&self) -> Result<[u8; KEY_SIZE], CryptexError> {
        let key: [u8; KEY_SIZE] = self
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| CryptexError::InvalidState("public key must be 32 bytes".into()))?;
        Ok(key)
    }

    pub fn close(
        &self,
        inputs: &mut [Option<Vec<u8>>],
        secrets: &[Vec<u8>],
    ) -> Result<(), CryptexError> {
        let peer_key = self.validate()?;
        if inputs.len() != 2 {
            return Err(CryptexError::Arity("Box supports exactly 2 inputs"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("Box supports only a single secret"));
        }

        let ephemeral = SecretKey::generate(&mut OsRng);
        let nonce = random_bytes::<NONCE_SIZE>();

        let sbox = SalsaBox::new(&PublicKey::from(peer_key), &ephemeral);
        let ct = sbox
            .encrypt(GenericArray::from_slice(&nonce), secrets[0].as_slice())
            .map_err(|_| CryptexError::InvalidState("box seal failed".into()))?;

        let mut out = Vec::with_capacity(KEY_SIZE + NONCE_SIZE + ct.len());
        out.extend_from_slice(ephemeral.public_key().as_bytes());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ct);

        inputs[0] = Some(out);
        inputs[1] = None;
        Ok(())
    }

    pub fn open(
        &self,
        secrets: &mut [Vec<u8>],
        inputs: &[Option<Vec<u8>>],
    ) -> Result<(), CryptexError> {
        let peer_key = self.validate()?;
        if inputs.len() != 2 {
            return Err(CryptexError::Arity("Box supports exactly 2 inputs"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("Box supports only a single secret"));
        }

        let key_slice = inputs[1]
            .as_deref()
            .ok_or(CryptexError::Unsatisfied("Box requires a private key input"))?;
        let key_bytes: [u8; KEY_SIZE] = key_slice
            .try_into()
            .map_err(|_| CryptexError::InvalidState("private key must be 32 bytes".into()))?;
        let secret_key = SecretKey::from(key_bytes);

        if secret_key.public_key().as_bytes() != &peer_key {
            return Err(CryptexError::DecryptionFailed);
        }

        let nbox = inputs[0]
            .as_deref()
            .ok_or(CryptexError::Unsatisfied("Box requires a ciphertext input"))?;
        if nbox.len() < KEY_SIZE + NONCE_SIZE + OVERHEAD {
            return Err(CryptexError::DecryptionFailed);
        }

        let ephemeral_key: [u8; KEY_SIZE] = nbox[..KEY_SIZE].try_into().expect("32 bytes");
        let sbox = SalsaBox::new(&PublicKey::from(ephemeral_key), &secret_key);
        let secret = sbox
            .decrypt(
                GenericArray::from_slice(&nbox[KEY_SIZE..KEY_SIZE + NONCE_SIZE]),
                &nbox[KEY_SIZE + NONCE_SIZE..],
            )
            .map_err(|_| CryptexError::DecryptionFailed)?;

        secrets[0] = secret;
        Ok(())
    }
}
