//! Terminal driver: resolves secrets interactively and backs materials with
//! the file store.

use super::prompt;
use super::store::Db;
use crate::armor::{Message, armor};
use crate::driver::{Driver, DriverError, SecretInput};
use crate::material::Material;
use crate::payload::{Attached, Detached, Payload};
use crate::secret::{OpenPgpKey, Secret};
use pgp::composed::{Deserializable, SignedSecretKey};
use pgp::ser::Serialize;
use pgp::types::KeyTrait;
use secrecy::ExposeSecret;
use std::fs;
use std::io::{Cursor, Read};
use std::path::PathBuf;

pub struct TerminalDriver {
    db: Db,
    detach: Option<PathBuf>,
    openpgp_dir: Option<PathBuf>,
    secring: Option<Vec<SignedSecretKey>>,
}

impl TerminalDriver {
    pub fn new(db: Db, detach: Option<PathBuf>, openpgp_dir: Option<PathBuf>) -> Self {
        Self {
            db,
            detach,
            openpgp_dir,
            secring: None,
        }
    }

    pub fn db_mut(&mut self) -> &mut Db {
        &mut self.db
    }

    fn load_openpgp_secret(&mut self, sec: &OpenPgpKey) -> Result<SecretInput, DriverError> {
        let keys = match self.secring()? {
            Some(keys) => keys,
            None => return Ok(SecretInput::Skip),
        };

        let mut keyring = Vec::new();
        for key in keys {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(key.key_id().as_ref());
            if sec.key_ids.contains(&u64::from_be_bytes(raw)) {
                let data = key
                    .to_bytes()
                    .map_err(|e| DriverError::Store(e.to_string()))?;
                keyring.extend_from_slice(&data);
            }
        }
        if keyring.is_empty() {
            return Ok(SecretInput::Skip);
        }

        Ok(SecretInput::Data(
            Secret::OpenPgpKey(sec.clone()).load(&mut Cursor::new(keyring))?,
        ))
    }

    fn secring(&mut self) -> Result<Option<&[SignedSecretKey]>, DriverError> {
        if self.secring.is_none() {
            let Some(dir) = &self.openpgp_dir else {
                return Ok(None);
            };
            let path = dir.join("secring.gpg");
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(err) => return Err(err.into()),
            };

            let keys: Vec<SignedSecretKey> = SignedSecretKey::from_bytes_many(Cursor::new(data))
                .collect::<Result<_, _>>()
                .map_err(|e| DriverError::Store(format!("invalid keyring: {e}")))?;
            self.secring = Some(keys);
        }
        Ok(self.secring.as_deref())
    }
}

impl Driver for TerminalDriver {
    fn load_material(&mut self, id: &[u8]) -> Result<Option<Material>, DriverError> {
        self.db
            .load(id)
            .map_err(|e| DriverError::Store(e.to_string()))
    }

    fn store_material(&mut self, mtrl: &Material) -> Result<(), DriverError> {
        self.db.store(mtrl);
        Ok(())
    }

    fn lock_payload(&mut self, r: &mut dyn Read) -> Result<(Payload, Vec<u8>), DriverError> {
        if let Some(path) = &self.detach {
            let mut payload = Detached::new();
            let (key, mtrl) = payload.lock(r)?;

            let armored = armor(&Message::Material(mtrl.clone()))
                .map_err(|e| DriverError::Store(e.to_string()))?;
            fs::write(path, armored)?;

            self.db.store(&mtrl);
            return Ok((Payload::Detached(payload), key));
        }

        let mut payload = Attached::new();
        let key = payload.lock(r)?;
        Ok((Payload::Attached(payload), key))
    }

    fn load_secret(&mut self, sec: &Secret) -> Result<SecretInput, DriverError> {
        match sec {
            Secret::Password(_) => {
                let passwd = prompt::prompt_secret(&format!("password for '{}': ", sec.comment()))
                    .map_err(|e| DriverError::Prompt(e.to_string()))?;
                if passwd.expose_secret().is_empty() {
                    return Ok(SecretInput::Skip);
                }
                Ok(SecretInput::Data(
                    sec.load(&mut passwd.expose_secret().as_bytes())?,
                ))
            }
            Secret::OpenPgpKey(key) => self.load_openpgp_secret(&key.clone()),
            Secret::SshKey(_) => {
                let path = prompt::prompt_secret(&format!(
                    "ssh key path for '{}': ",
                    sec.comment()
                ))
                .map_err(|e| DriverError::Prompt(e.to_string()))?;
                if path.expose_secret().is_empty() {
                    return Ok(SecretInput::Skip);
                }

                let data = fs::read(path.expose_secret())?;
                Ok(SecretInput::Data(sec.load(&mut data.as_slice())?))
            }
        }
    }
}
