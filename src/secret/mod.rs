//! Secrets: typed leaves of the policy graph whose values are supplied by
//! the user or environment.
//!
//! Each secret declares a phase: `Dual` secrets are consulted during both
//! locking and unlocking (passwords seed SecretBox keys), `Unlock` secrets
//! only during unlocking (private key material never touches the locker).

mod openpgp_key;
mod password;
pub mod ssh_key;

pub use openpgp_key::OpenPgpKey;
pub use password::Password;
pub use ssh_key::{SshKey, fingerprint_of_authorized_key, parse_authorized_key};

use crate::wire::{Reader, WireError, Writer};
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("invalid ssh key fingerprint")]
    InvalidFingerprint,

    #[error("unsupported fingerprint hash algorithm {0:?}")]
    UnsupportedHash(String),

    #[error("ssh key fingerprint mismatch")]
    FingerprintMismatch,

    #[error("invalid ssh key: {0}")]
    InvalidSshKey(String),

    #[error("missing openpgp key(s)")]
    MissingOpenPgpKeys,

    #[error("invalid openpgp keyring: {0}")]
    InvalidKeyring(String),
}

/// The point at which a secret input is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unlock,
    Dual,
}

const TAG_PASSWORD: u8 = 1;
const TAG_OPENPGP_KEY: u8 = 2;
const TAG_SSH_KEY: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    Password(Password),
    OpenPgpKey(OpenPgpKey),
    SshKey(SshKey),
}

impl Secret {
    pub fn comment(&self) -> &str {
        match self {
            Self::Password(s) => &s.comment,
            Self::OpenPgpKey(s) => &s.comment,
            Self::SshKey(s) => &s.comment,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Self::Password(_) => Phase::Dual,
            Self::OpenPgpKey(_) | Self::SshKey(_) => Phase::Unlock,
        }
    }

    /// Variant name as rendered by `inspect`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::OpenPgpKey(_) => "openpgpkey",
            Self::SshKey(_) => "sshkey",
        }
    }

    /// Read the raw input and return the internal form consumed by the
    /// parent cryptex.
    pub fn load(&self, r: &mut dyn Read) -> Result<Vec<Vec<u8>>, SecretError> {
        match self {
            Self::Password(s) => s.load(r),
            Self::OpenPgpKey(s) => s.load(r),
            Self::SshKey(s) => s.load(r),
        }
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            Self::Password(s) => {
                w.put_u8(TAG_PASSWORD);
                w.put_str(&s.comment);
            }
            Self::OpenPgpKey(s) => {
                w.put_u8(TAG_OPENPGP_KEY);
                w.put_str(&s.comment);
                w.put_u32(s.key_ids.len() as u32);
                for id in &s.key_ids {
                    w.put_u64(*id);
                }
            }
            Self::SshKey(s) => {
                w.put_u8(TAG_SSH_KEY);
                w.put_str(&s.comment);
                w.put_str(&s.fingerprint);
            }
        }
        w.into_bytes()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(data);
        let sec = Self::decode(&mut r)?;
        r.finish()?;
        Ok(sec)
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let tag = r.u8()?;
        let sec = match tag {
            TAG_PASSWORD => Self::Password(Password { comment: r.string()? }),
            TAG_OPENPGP_KEY => {
                let comment = r.string()?;
                let count = r.u32()? as usize;
                let mut key_ids = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    key_ids.push(r.u64()?);
                }
                Self::OpenPgpKey(OpenPgpKey { comment, key_ids })
            }
            TAG_SSH_KEY => Self::SshKey(SshKey {
                comment: r.string()?,
                fingerprint: r.string()?,
            }),
            tag => return Err(WireError::UnknownTag { kind: "secret", tag }),
        };
        Ok(sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrip_preserves_every_variant() {
        let cases = vec![
            Secret::Password(Password::new("op 1 secret")),
            Secret::OpenPgpKey(OpenPgpKey::new(vec![0xdead_beef_cafe_f00d], "a keyid")),
            Secret::SshKey(SshKey {
                comment: "a fingerprint".into(),
                fingerprint: "SHA256:AAAA".into(),
            }),
        ];

        for sec in cases {
            let parsed = Secret::unmarshal(&sec.marshal()).unwrap();
            assert_eq!(parsed, sec);
        }
    }

    #[test]
    fn phases_follow_the_variant() {
        assert_eq!(Secret::Password(Password::new("")).phase(), Phase::Dual);
        assert_eq!(
            Secret::OpenPgpKey(OpenPgpKey::new(vec![], "")).phase(),
            Phase::Unlock
        );
    }

    #[test]
    fn unknown_tag_fails_closed() {
        assert!(matches!(
            Secret::unmarshal(&[99]),
            Err(WireError::UnknownTag { kind: "secret", tag: 99 })
        ));
    }
}
