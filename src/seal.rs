//! Seals: detached OpenPGP signatures over a plan's or vault's seal-data.
//!
//! A seal stores the serialized public entity alongside the signature so
//! verification needs nothing but the sealed message. Seals are
//! append-only; adding one changes the containing digest.

use crate::crypto::{hmac_sha256, random_bytes};
use crate::wire::{Reader, WireError, Writer};
use chrono::Utc;
use pgp::composed::{Deserializable, SignedPublicKey, SignedSecretKey, StandaloneSignature};
use pgp::crypto::hash::HashAlgorithm;
use pgp::packet::{SignatureConfig, SignatureType, SignatureVersion, Subpacket, SubpacketData};
use pgp::ser::Serialize;
use pgp::types::{KeyTrait, SecretKeyTrait};
use std::io::Cursor;
use thiserror::Error;

pub const NONCE_SIZE: usize = 24;

const TAG_OPENPGP: u8 = 1;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("openpgp error: {0}")]
    Pgp(String),

    #[error("seal verification failed")]
    VerificationFailed,

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Constructs seals; the vault and plan only know how to carry and check
/// them.
pub trait Sealer {
    fn seal(&self, data: &[u8]) -> Result<Seal, SealError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seal {
    OpenPgp(OpenPgpSeal),
}

impl Seal {
    /// `HMAC-SHA-256(nonce, entity ‖ signature)`
    pub fn digest(&self) -> Vec<u8> {
        match self {
            Self::OpenPgp(s) => hmac_sha256(&s.nonce, &[&s.entity, &s.signature]),
        }
    }

    pub fn check(&self, data: &[u8]) -> Result<(), SealError> {
        match self {
            Self::OpenPgp(s) => s.check(data),
        }
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        match self {
            Self::OpenPgp(s) => {
                w.put_u8(TAG_OPENPGP);
                w.put_bytes(&s.nonce);
                w.put_bytes(&s.entity);
                w.put_bytes(&s.signature);
            }
        }
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let tag = r.u8()?;
        match tag {
            TAG_OPENPGP => Ok(Self::OpenPgp(OpenPgpSeal {
                nonce: r.bytes()?,
                entity: r.bytes()?,
                signature: r.bytes()?,
            })),
            tag => Err(WireError::UnknownTag { kind: "seal", tag }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPgpSeal {
    pub nonce: Vec<u8>,
    pub entity: Vec<u8>,
    pub signature: Vec<u8>,
}

impl OpenPgpSeal {
    /// Detached-sign `data` with the signer's primary key. The signer's
    /// public entity is embedded for later verification.
    pub fn new(signer: &SignedSecretKey, data: &[u8]) -> Result<Self, SealError> {
        let config = SignatureConfig::new_v4(
            SignatureVersion::V4,
            SignatureType::Binary,
            signer.algorithm(),
            HashAlgorithm::SHA2_256,
            vec![
                Subpacket::regular(SubpacketData::SignatureCreationTime(Utc::now())),
                Subpacket::regular(SubpacketData::Issuer(signer.key_id())),
            ],
            vec![],
        );

        let signature = config
            .sign(signer, String::new, data)
            .map_err(|e| SealError::Pgp(e.to_string()))?;
        let signature = StandaloneSignature::new(signature)
            .to_bytes()
            .map_err(|e| SealError::Pgp(e.to_string()))?;

        let public = SignedPublicKey::new(
            signer.primary_key.public_key(),
            signer.details.clone(),
            signer.public_subkeys.clone(),
        );
        let entity = public.to_bytes().map_err(|e| SealError::Pgp(e.to_string()))?;

        Ok(Self {
            nonce: random_bytes::<NONCE_SIZE>().to_vec(),
            entity,
            signature,
        })
    }

    pub fn check(&self, data: &[u8]) -> Result<(), SealError> {
        let public = SignedPublicKey::from_bytes(Cursor::new(&self.entity))
            .map_err(|e| SealError::Pgp(e.to_string()))?;
        let signature = StandaloneSignature::from_bytes(Cursor::new(&self.signature))
            .map_err(|e| SealError::Pgp(e.to_string()))?;

        signature
            .verify(&public, data)
            .map_err(|_| SealError::VerificationFailed)
    }
}

impl Sealer for SignedSecretKey {
    fn seal(&self, data: &[u8]) -> Result<Seal, SealError> {
        Ok(Seal::OpenPgp(OpenPgpSeal::new(self, data)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::openpgp_keypair;

    #[test]
    fn seal_checks_out_and_rejects_tampering() {
        let (signer, _) = openpgp_keypair("sealer@example.com");
        let seal = signer.seal(b"plan seal data").unwrap();

        seal.check(b"plan seal data").unwrap();
        assert!(matches!(
            seal.check(b"other data"),
            Err(SealError::VerificationFailed)
        ));
    }

    #[test]
    fn envelope_roundtrip_preserves_digest() {
        let (signer, _) = openpgp_keypair("sealer@example.com");
        let seal = signer.seal(b"data").unwrap();

        let mut w = Writer::new();
        seal.encode(&mut w);
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        let parsed = Seal::decode(&mut r).unwrap();
        r.finish().unwrap();

        assert_eq!(parsed, seal);
        assert_eq!(parsed.digest(), seal.digest());
    }
}
