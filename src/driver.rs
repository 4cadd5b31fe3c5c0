//! The driver: the vault's interactive collaborator.
//!
//! A driver owns material storage (with whatever commit semantics its
//! backing store needs), produces the payload envelope at lock time, and
//! resolves secret inputs. Returning `SecretInput::Skip` defers the
//! surrounding subtree to a later run; returning an error aborts the walk.

use crate::material::{Material, MaterialError};
use crate::payload::{Payload, PayloadError};
use crate::secret::{Secret, SecretError};
use crate::wire::WireError;
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Material(#[from] MaterialError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("material store failure: {0}")]
    Store(String),
}

pub enum SecretInput {
    Data(Vec<Vec<u8>>),
    Skip,
}

pub trait Driver {
    /// Retrieve material by node digest; `None` when the store has no entry.
    fn load_material(&mut self, id: &[u8]) -> Result<Option<Material>, DriverError>;

    /// Save material keyed by its node digest.
    fn store_material(&mut self, mtrl: &Material) -> Result<(), DriverError>;

    /// Encrypt the reader's bytes and return the payload envelope plus its
    /// decryption key.
    fn lock_payload(&mut self, r: &mut dyn Read) -> Result<(Payload, Vec<u8>), DriverError>;

    /// Resolve a secret's input data, or signal that it cannot be provided
    /// yet.
    fn load_secret(&mut self, sec: &Secret) -> Result<SecretInput, DriverError>;
}
