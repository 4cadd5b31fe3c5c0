//! Many-into-one cryptex: the inverse shape of Mux.
//!
//! Each incoming secret is masked with the same SSKG/HKDF construction as
//! Mux and the masked chunks are packed into a single framed input. Every
//! chunk is required on open, one per secret, in order.

use super::{CryptexError, mux::derive_mask};
use crate::crypto::{random_bytes, xor};
use crate::sskg;
use crate::wire::{pack_chunks, unpack_chunks};

pub const SEED_SIZE: usize = 32;
const HSIZE: usize = sskg::KEY_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demux {
    pub comment: String,
    pub seed: Vec<u8>,
}

impl Demux {
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
        if inputs.len() != 1 {
            return Err(CryptexError::Arity("Demux requires exactly 1 input"));
        }
        if secrets.len() <= 1 {
            return Err(CryptexError::Arity("Demux supports 2 or more secrets"));
        }

        let mut chunks = Vec::with_capacity(secrets.len());
        let mut seq = sskg::Seq::new(&self.seed, secrets.len());
        for secret in secrets {
            let r = random_bytes::<HSIZE>();
            let position_key = seq
                .key(HSIZE)
                .ok_or(CryptexError::InvalidState("seed sequence exhausted".into()))?;
            let mask = derive_mask(&r, &position_key, secret.len())?;

            let mut chunk = Vec::with_capacity(HSIZE + secret.len());
            chunk.extend_from_slice(&r);
            chunk.extend_from_slice(&xor(secret, &mask));
            chunks.push(chunk);

            seq.next();
        }

        inputs[0] = Some(pack_chunks(&chunks));
        Ok(())
    }

    pub fn open(
        &self,
        secrets: &mut [Vec<u8>],
        inputs: &[Option<Vec<u8>>],
    ) -> Result<(), CryptexError> {
        self.validate()?;
        if inputs.len() != 1 {
            return Err(CryptexError::Arity("Demux requires exactly 1 input"));
        }
        if secrets.len() <= 1 {
            return Err(CryptexError::Arity("Demux supports 2 or more secrets"));
        }
        let input = inputs[0]
            .as_deref()
            .ok_or(CryptexError::Unsatisfied("Demux requires a non-nil input"))?;

        let chunks = unpack_chunks(input)?;
        if chunks.len() != secrets.len() {
            return Err(CryptexError::InvalidState(
                "secret count must equal chunk count".into(),
            ));
        }

        let mut seq = sskg::Seq::new(&self.seed, secrets.len());
        for (secret, chunk) in secrets.iter_mut().zip(&chunks) {
            if chunk.len() < HSIZE {
                return Err(CryptexError::DecryptionFailed);
            }

            let position_key = seq
                .key(HSIZE)
                .ok_or(CryptexError::InvalidState("seed sequence exhausted".into()))?;
            let mask = derive_mask(&chunk[..HSIZE], &position_key, chunk.len() - HSIZE)?;
            *secret = xor(&chunk[HSIZE..], &mask);

            seq.next();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cryptex::testutil::{empty_secrets, slots};

    #[test]
    fn roundtrip_preserves_order_and_lengths() {
        let cptx = Demux::new("joined");
        let mut inputs = slots(1);
        let secrets = vec![b"first".to_vec(), b"the second".to_vec(), b"3rd".to_vec()];

        cptx.close(&mut inputs, &secrets).unwrap();

        let mut opened = empty_secrets(3);
        cptx.open(&mut opened, &inputs).unwrap();
        assert_eq!(opened, secrets);
    }

    #[test]
    fn chunk_count_mismatch_is_rejected() {
        let cptx = Demux::new("");
        let mut inputs = slots(1);
        let secrets = vec![b"a".to_vec(), b"b".to_vec()];
        cptx.close(&mut inputs, &secrets).unwrap();

        let mut opened = empty_secrets(3);
        assert!(matches!(
            cptx.open(&mut opened, &inputs),
            Err(CryptexError::InvalidState(_))
        ));
    }

    #[test]
    fn nil_input_is_unsatisfied() {
        let cptx = Demux::new("");
        let mut opened = empty_secrets(2);
        let err = cptx.open(&mut opened, &slots(1)).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn mux_and_demux_share_the_mask_construction() {
        // a demux chunk produced under a seed opens as the same position of
        // a mux with the same seed
        let demux = Demux::new("");
        let mut inputs = slots(1);
        let secrets = vec![b"left ct".to_vec(), b"right ct".to_vec()];
        demux.close(&mut inputs, &secrets).unwrap();

        let chunks = unpack_chunks(inputs[0].as_deref().unwrap()).unwrap();
        let mux = super::super::Mux {
            comment: String::new(),
            seed: demux.seed.clone(),
        };

        let mut opened = empty_secrets(1);
        mux.open(&mut opened, &[Some(chunks[0].clone()), None]).unwrap();
        assert_eq!(opened[0], secrets[0]);
    }
}
