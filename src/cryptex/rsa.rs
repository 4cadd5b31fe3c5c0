//! RSA-OAEP cryptex.
//!
//! The cryptex carries a DER-encoded PKIX public key. Closing stores the
//! OAEP/SHA-256 ciphertext in the first input; the second input carries the
//! holder's PKCS#1 private key at open time.

use super::CryptexError;
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rsa {
    pub comment: String,
    pub public_key: Vec<u8>,
}

impl Rsa {
    pub fn new(public_key: Vec<u8>, comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            public_key,
        }
    }

    fn public_key(&self) -> Result<RsaPublicKey, CryptexError> {
        RsaPublicKey::from_public_key_der(&self.public_key)
            .map_err(|e| CryptexError::InvalidState(format!("invalid RSA public key: {e}")))
    }

    pub fn close(
        &self,
        inputs: &mut [Option<Vec<u8>>],
        secrets: &[Vec<u8>],
    ) -> Result<(), CryptexError> {
        if inputs.len() != 2 {
            return Err(CryptexError::Arity("RSA supports exactly 2 inputs"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("RSA supports only a single secret"));
        }

        let public_key = self.public_key()?;
        let ct = public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &secrets[0])
            .map_err(|e| CryptexError::InvalidState(format!("OAEP encryption failed: {e}")))?;

        inputs[0] = Some(ct);
        inputs[1] = None;
        Ok(())
    }

    pub fn open(
        &self,
        secrets: &mut [Vec<u8>],
        inputs: &[Option<Vec<u8>>],
    ) -> Result<(), CryptexError> {
        if inputs.len() != 2 {
            return Err(CryptexError::Arity("RSA supports exactly 2 inputs"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("RSA supports only a single secret"));
        }

        let ct = inputs[0]
            .as_deref()
            .ok_or(CryptexError::Unsatisfied("RSA requires a ciphertext input"))?;
        let key_der = inputs[1]
            .as_deref()
            .ok_or(CryptexError::Unsatisfied("RSA requires a private key input"))?;

        let private_key = parse_private_key(key_der)?;
        let secret = private_key
            .decrypt(Oaep::new::<Sha256>(), ct)
            .map_err(|_| CryptexError::DecryptionFailed)?;

        secrets[0] = secret;
        Ok(())
    }
}

/// Key holders supply either DER (PKCS#1) or the PEM form an SSH key secret
/// loads.
fn parse_private_key(data: &[u8]) -> Result<RsaPrivateKey, CryptexError> {
    if let Ok(key) = RsaPrivateKey::from_pkcs1_der(data) {
        return Ok(key);
    }

    std::str::from_utf8(data)
        .map_err(|_| CryptexError::InvalidState("invalid RSA private key".into()))
        .and_then(|pem| {
            RsaPrivateKey::from_pkcs1_pem(pem)
                .map_err(|e| CryptexError::InvalidState(format!("invalid RSA private key: {e}")))
        })
}
