//! OpenPGP cryptex.
//!
//! The cryptex carries one or more serialized public entities. Closing
//! encrypts the secret to all of them as a binary OpenPGP message; the
//! second input carries a serialized private keyring at open time, and any
//! keyring key matching one of the entities decrypts.

use super::CryptexError;
use pgp::composed::{Deserializable, Message, SignedPublicKey, SignedSecretKey};
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::ser::Serialize;
use rand::rngs::OsRng;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPgp {
    pub comment: String,
    pub entities: Vec<Vec<u8>>,
}

impl OpenPgp {
    pub fn new(entities: Vec<Vec<u8>>, comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            entities,
        }
    }

    fn public_keys(&self) -> Result<Vec<SignedPublicKey>, CryptexError> {
        if self.entities.is_empty() {
            return Err(CryptexError::InvalidState("no OpenPGP entities".into()));
        }
        self.entities
            .iter()
            .map(|data| {
                SignedPublicKey::from_bytes(Cursor::new(data)).map_err(|e| {
                    CryptexError::InvalidState(format!("invalid OpenPGP entity: {e}"))
                })
            })
            .collect()
    }

    pub fn close(
        &self,
        inputs: &mut [Option<Vec<u8>>],
        secrets: &[Vec<u8>],
    ) -> Result<(), CryptexError> {
        if inputs.len() != 2 {
            return Err(CryptexError::Arity("OpenPGP supports exactly 2 inputs"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("OpenPGP supports only a single secret"));
        }

        let keys = self.public_keys()?;
        let key_refs: Vec<&SignedPublicKey> = keys.iter().collect();

        let message = Message::new_literal_bytes("", &secrets[0]);
        let encrypted = message
            .encrypt_to_keys(&mut OsRng, SymmetricKeyAlgorithm::AES256, &key_refs)
            .map_err(|e| CryptexError::InvalidState(format!("OpenPGP encryption failed: {e}")))?;
        let data = encrypted
            .to_bytes()
            .map_err(|e| CryptexError::InvalidState(format!("OpenPGP encoding failed: {e}")))?;

        inputs[0] = Some(data);
        inputs[1] = None;
        Ok(())
    }

    pub fn open(
        &self,
        secrets: &mut [Vec<u8>],
        inputs: &[Option<Vec<u8>>],
    ) -> Result<(), CryptexError> {
        if inputs.len() != 2 {
            return Err(CryptexError::Arity("OpenPGP supports exactly 2 inputs"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("OpenPGP supports only a single secret"));
        }

        let ct = inputs[0]
            .as_deref()
            .ok_or(CryptexError::Unsatisfied("OpenPGP requires a ciphertext input"))?;
        let keyring = inputs[1]
            .as_deref()
            .ok_or(CryptexError::Unsatisfied("OpenPGP requires a keyring input"))?;

        let keys: Vec<SignedSecretKey> = SignedSecretKey::from_bytes_many(Cursor::new(keyring))
            .collect::<Result<_, _>>()
            .map_err(|e| CryptexError::InvalidState(format!("invalid OpenPGP keyring: {e}")))?;
        if keys.is_empty() {
            return Err(CryptexError::Unsatisfied("OpenPGP keyring holds no keys"));
        }
        let key_refs: Vec<&SignedSecretKey> = keys.iter().collect();

        let message = Message::from_bytes(Cursor::new(ct))
            .map_err(|e| CryptexError::InvalidState(format!("invalid OpenPGP message: {e}")))?;
        let (mut decrypted, _) = message
            .decrypt(String::new, &key_refs)
            .map_err(|_| CryptexError::DecryptionFailed)?;
        let decrypted_message = decrypted
            .next()
            .ok_or(CryptexError::DecryptionFailed)?
            .map_err(|_| CryptexError::DecryptionFailed)?;
        let content = decrypted_message
            .get_content()
            .map_err(|_| CryptexError::DecryptionFailed)?
            .ok_or(CryptexError::DecryptionFailed)?;

        secrets[0] = content;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cryptex::testutil::{empty_secrets, slots};
    use crate::fixtures::openpgp_keypair;

    #[test]
    fn roundtrip_with_single_recipient() {
        let (secret_key, public_key) = openpgp_keypair("alice@example.com");
        let cptx = OpenPgp::new(
            vec![public_key.to_bytes().unwrap()],
            "alice@example.com",
        );

        let mut inputs = slots(2);
        let secrets = vec![b"pgp protected".to_vec()];
        cptx.close(&mut inputs, &secrets).unwrap();
        assert!(inputs[1].is_none());

        inputs[1] = Some(secret_key.to_bytes().unwrap());
        let mut opened = empty_secrets(1);
        cptx.open(&mut opened, &inputs).unwrap();
        assert_eq!(opened, secrets);
    }

    #[test]
    fn any_recipient_key_opens_a_multi_entity_closure() {
        let (alice_secret, alice_public) = openpgp_keypair("alice@example.com");
        let (bob_secret, bob_public) = openpgp_keypair("bob@example.com");
        let cptx = OpenPgp::new(
            vec![alice_public.to_bytes().unwrap(), bob_public.to_bytes().unwrap()],
            "either",
        );

        let mut inputs = slots(2);
        let secrets = vec![b"shared".to_vec()];
        cptx.close(&mut inputs, &secrets).unwrap();

        for key in [&alice_secret, &bob_secret] {
            let mut with_key = inputs.clone();
            with_key[1] = Some(key.to_bytes().unwrap());
            let mut opened = empty_secrets(1);
            cptx.open(&mut opened, &with_key).unwrap();
            assert_eq!(opened, secrets);
        }
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let (_, public_key) = openpgp_keypair("alice@example.com");
        let (other_secret, _) = openpgp_keypair("mallory@example.com");
        let cptx = OpenPgp::new(vec![public_key.to_bytes().unwrap()], "");

        let mut inputs = slots(2);
        cptx.close(&mut inputs, &[b"secret".to_vec()]).unwrap();

        inputs[1] = Some(other_secret.to_bytes().unwrap());
        let mut opened = empty_secrets(1);
        let err = cptx.open(&mut opened, &inputs).unwrap_err();
        assert!(err.is_recoverable());
    }
}
