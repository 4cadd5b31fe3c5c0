//! All-or-nothing cryptex: the secret is the XOR of every input.
//!
//! Closing fills every input after the first with fresh random pads of the
//! secret's length and stores `secret ⊕ pads` in the first. There is no
//! header or nonce; every input is required to open.

use super::{CryptexError, non_nil_len};
use crate::crypto::{random_vec, xor_in_place};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xor {
    pub comment: String,
}

impl Xor {
    pub fn new(comment: impl Into<String>) -> Self {
        Self { comment: comment.into() }
    }

    pub fn close(
        &self,
        inputs: &mut [Option<Vec<u8>>],
        secrets: &[Vec<u8>],
    ) -> Result<(), CryptexError> {
        if inputs.is_empty() {
            return Err(CryptexError::Arity("XOR requires at least 1 input"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("XOR supports only a single secret"));
        }

        let mut buf = secrets[0].clone();
        for slot in inputs[1..].iter_mut() {
            let pad = random_vec(buf.len());
            xor_in_place(&mut buf, &pad);
            *slot = Some(pad);
        }
        inputs[0] = Some(buf);
        Ok(())
    }

    pub fn open(
        &self,
        secrets: &mut [Vec<u8>],
        inputs: &[Option<Vec<u8>>],
    ) -> Result<(), CryptexError> {
        if non_nil_len(inputs) != inputs.len() || inputs.is_empty() {
            return Err(CryptexError::Unsatisfied("XOR requires every input"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("XOR supports only a single secret"));
        }

        let mut buf = inputs[0].clone().expect("checked non-nil");
        for input in &inputs[1..] {
            let pad = input.as_deref().expect("checked non-nil");
            if pad.len() != buf.len() {
                return Err(CryptexError::DecryptionFailed);
            }
            xor_in_place(&mut buf, pad);
        }

        secrets[0] = buf;
        Ok(())
    }
}
