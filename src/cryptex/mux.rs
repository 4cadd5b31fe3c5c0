//! One-of-many cryptex: any single input recovers the secret.
//!
//! Each input position gets its own mask derived from a fresh 32-byte
//! random, the position key of a seeded SSKG sequence, and HKDF-SHA-256:
//!
//!   input[i] = r_i ‖ (secret ⊕ HKDF(salt = ∅, ikm = r_i ⊕ sskg.key(i)))
//!
//! The 32-byte seed is fixed at construction; changing it invalidates every
//! closure made under it.

use super::CryptexError;
use crate::crypto::{random_bytes, xor};
use crate::sskg;
use hkdf::Hkdf;
use sha2::Sha256;

pub const SEED_SIZE: usize = 32;
const HSIZE: usize = sskg::KEY_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mux {
    pub comment: String,
    pub seed: Vec<u8>,
}

impl Mux {
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            seed: random_bytes::<SEED_SIZE>().to_vec(),
        }
    }

    fn validate(&self) -> Result<(), CryptexError> {
        if self.seed.len() != SEED_SIZE {
            return Err(CryptexError::InvalidState("seed must be 32 bytes".into()));
        }
        Ok(())
    }

    pub fn close(
        &self,
        inputs: &mut [Option<Vec<u8>>],
        secrets: &[Vec<u8>],
    ) -> Result<(), CryptexError> {
        self.validate()?;
        if inputs.len() <= 1 {
            return Err(CryptexError::Arity("Mux requires 2 or more inputs"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("Mux supports only a single secret"));
        }
        let secret = &secrets[0];

        let mut seq = sskg::Seq::new(&self.seed, inputs.len());
        for slot in inputs.iter_mut() {
            let r = random_bytes::<HSIZE>();
            let position_key = seq
                .key(HSIZE)
                .ok_or(CryptexError::InvalidState("seed sequence exhausted".into()))?;
            let mask = derive_mask(&r, &position_key, secret.len())?;

            let mut out = Vec::with_capacity(HSIZE + secret.len());
            out.extend_from_slice(&r);
            out.extend_from_slice(&xor(secret, &mask));
            *slot = Some(out);

            seq.next();
        }
        Ok(())
    }

    pub fn open(
        &self,
        secrets: &mut [Vec<u8>],
        inputs: &[Option<Vec<u8>>],
    ) -> Result<(), CryptexError> {
        self.validate()?;
        if inputs.is_empty() {
            return Err(CryptexError::Arity("Mux requires 2 or more inputs"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("Mux supports only a single secret"));
        }

        let mut seq = sskg::Seq::new(&self.seed, inputs.len());
        for input in inputs {
            let Some(input) = input else {
                seq.next();
                continue;
            };
            if input.len() < HSIZE {
                return Err(CryptexError::DecryptionFailed);
            }

            let position_key = seq
                .key(HSIZE)
                .ok_or(CryptexError::InvalidState("seed sequence exhausted".into()))?;
            let mask = derive_mask(&input[..HSIZE], &position_key, input.len() - HSIZE)?;
            secrets[0] = xor(&input[HSIZE..], &mask);
            return Ok(());
        }

        Err(CryptexError::Unsatisfied("Mux requires at least 1 non-nil input"))
    }
}

/// Stretch `r ⊕ position_key` into a mask of `len` bytes.
pub(super) fn derive_mask(
    r: &[u8],
    position_key: &[u8],
    len: usize,
) -> Result<Vec<u8>, CryptexError> {
    let ikm = xor(r, position_key);
    let hk = Hkdf::<Sha256>::new(None, &ikm);
    let mut mask = vec![0u8; len];
    hk.expand(&[], &mut mask)
        .map_err(|_| CryptexError::InvalidState("mask length exceeds HKDF limit".into()))?;
    Ok(mask)
}
