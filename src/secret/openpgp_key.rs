//! OpenPGP private key secret.
//!
//! Declared by the key ids of the entities it may supply. Loading parses a
//! binary private keyring and returns the serialized entities whose primary
//! key or any subkey matches a declared id.

use super::SecretError;
use pgp::composed::{Deserializable, SignedSecretKey};
use pgp::ser::Serialize;
use pgp::types::KeyTrait;
use std::io::{Cursor, Read};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPgpKey {
    pub comment: String,
    pub key_ids: Vec<u64>,
}

impl OpenPgpKey {
    pub fn new(key_ids: Vec<u64>, comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            key_ids,
        }
    }

    pub fn load(&self, r: &mut dyn Read) -> Result<Vec<Vec<u8>>, SecretError> {
        let mut data = Vec::new();
        r.read_to_end(&mut data)?;

        let keys: Vec<SignedSecretKey> = SignedSecretKey::from_bytes_many(Cursor::new(&data))
            .collect::<Result<_, _>>()
            .map_err(|e| SecretError::InvalidKeyring(e.to_string()))?;

        let mut out = Vec::new();
        for key in &keys {
            if self.matches(key) {
                let serialized = key
                    .to_bytes()
                    .map_err(|e| SecretError::InvalidKeyring(e.to_string()))?;
                out.extend_from_slice(&serialized);
            }
        }

        if out.is_empty() {
            return Err(SecretError::MissingOpenPgpKeys);
        }
        Ok(vec![out])
    }

    fn matches(&self, key: &SignedSecretKey) -> bool {
        self.key_ids.iter().any(|&id| {
            key_id_u64(&key.key_id()) == id
                || key
                    .secret_subkeys
                    .iter()
                    .any(|subkey| key_id_u64(&subkey.key_id()) == id)
        })
    }
}

/// Numeric form of an 8-byte OpenPGP key id.
pub fn key_id_u64(id: &pgp::types::KeyId) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(id.as_ref());
    u64::from_be_bytes(raw)
}
