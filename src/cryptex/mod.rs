//! Cryptexes: cryptographic combiners relating a fixed number of inputs
//! (ciphertexts, shares, key placeholders) to a fixed number of secrets.
//!
//! `close` encloses the secrets into the inputs during locking; `open`
//! recovers the secrets from the inputs during unlocking. Both operate on
//! caller-owned buffers: `close` fills the `None` input slots (and may
//! overwrite pre-shared ones), `open` fills every secret slot or fails.
//! The round-trip law `open(close(inputs, secrets)) == secrets` holds for
//! every variant and every valid buffer shape.

mod box_;
mod demux;
mod msp;
mod mux;
mod openpgp;
mod rsa;
mod secretbox;
mod sss;
mod xor;

pub use box_::CryptoBox;
pub use demux::Demux;
pub use msp::Msp;
pub use mux::Mux;
pub use openpgp::OpenPgp;
pub use rsa::Rsa;
pub use secretbox::SecretBox;
pub use sss::Sss;
pub use xor::Xor;

use crate::wire::{Reader, WireError, Writer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptexError {
    /// Wrong number of inputs or secrets for the variant. Always fatal at
    /// the caller.
    #[error("{0}")]
    Arity(&'static str),

    /// Malformed cryptex state: bad seed or key length, unparseable key
    /// material, unparseable predicate.
    #[error("{0}")]
    InvalidState(String),

    /// The provided inputs cannot satisfy the cryptex yet (nil slots,
    /// too few shares). Candidates for skip propagation.
    #[error("{0}")]
    Unsatisfied(&'static str),

    /// Authenticated decryption or share recombination failed.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl CryptexError {
    /// Whether the unlock walker may absorb this failure by marking the
    /// vertex skipped (when at least one child is already skipped).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unsatisfied(_) | Self::DecryptionFailed)
    }
}

const TAG_SECRETBOX: u8 = 1;
const TAG_BOX: u8 = 2;
const TAG_RSA: u8 = 3;
const TAG_OPENPGP: u8 = 4;
const TAG_XOR: u8 = 5;
const TAG_SSS: u8 = 6;
const TAG_MUX: u8 = 7;
const TAG_DEMUX: u8 = 8;
const TAG_MSP: u8 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cryptex {
    SecretBox(SecretBox),
    Box(CryptoBox),
    Rsa(Rsa),
    OpenPgp(OpenPgp),
    Xor(Xor),
    Sss(Sss),
    Mux(Mux),
    Demux(Demux),
    Msp(Msp),
}

impl Cryptex {
    pub fn comment(&self) -> &str {
        match self {
            Self::SecretBox(c) => &c.comment,
            Self::Box(c) => &c.comment,
            Self::Rsa(c) => &c.comment,
            Self::OpenPgp(c) => &c.comment,
            Self::Xor(c) => &c.comment,
            Self::Sss(c) => &c.comment,
            Self::Mux(c) => &c.comment,
            Self::Demux(c) => &c.comment,
            Self::Msp(c) => &c.comment,
        }
    }

    /// Variant name as rendered by `inspect`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SecretBox(_) => "secretbox",
            Self::Box(_) => "box",
            Self::Rsa(_) => "rsa",
            Self::OpenPgp(_) => "openpgp",
            Self::Xor(_) => "xor",
            Self::Sss(_) => "sss",
            Self::Mux(_) => "mux",
            Self::Demux(_) => "demux",
            Self::Msp(_) => "msp",
        }
    }

    /// Enclose the secrets into the inputs.
    pub fn close(
        &self,
        inputs: &mut [Option<Vec<u8>>],
        secrets: &[Vec<u8>],
    ) -> Result<(), CryptexError> {
        match self {
            Self::SecretBox(c) => c.close(inputs, secrets),
            Self::Box(c) => c.close(inputs, secrets),
            Self::Rsa(c) => c.close(inputs, secrets),
            Self::OpenPgp(c) => c.close(inputs, secrets),
            Self::Xor(c) => c.close(inputs, secrets),
            Self::Sss(c) => c.close(inputs, secrets),
            Self::Mux(c) => c.close(inputs, secrets),
            Self::Demux(c) => c.close(inputs, secrets),
            Self::Msp(c) => c.close(inputs, secrets),
        }
    }

    /// Recover the secrets from the inputs.
    pub fn open(
        &self,
        secrets: &mut [Vec<u8>],
        inputs: &[Option<Vec<u8>>],
    ) -> Result<(), CryptexError> {
        match self {
            Self::SecretBox(c) => c.open(secrets, inputs),
            Self::Box(c) => c.open(secrets, inputs),
            Self::Rsa(c) => c.open(secrets, inputs),
            Self::OpenPgp(c) => c.open(secrets, inputs),
            Self::Xor(c) => c.open(secrets, inputs),
            Self::Sss(c) => c.open(secrets, inputs),
            Self::Mux(c) => c.open(secrets, inputs),
            Self::Demux(c) => c.open(secrets, inputs),
            Self::Msp(c) => c.open(secrets, inputs),
        }
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            Self::SecretBox(c) => {
                w.put_u8(TAG_SECRETBOX);
                w.put_str(&c.comment);
            }
            Self::Box(c) => {
                w.put_u8(TAG_BOX);
                w.put_str(&c.comment);
                w.put_bytes(&c.public_key);
            }
            Self::Rsa(c) => {
                w.put_u8(TAG_RSA);
                w.put_str(&c.comment);
                w.put_bytes(&c.public_key);
            }
            Self::OpenPgp(c) => {
                w.put_u8(TAG_OPENPGP);
                w.put_str(&c.comment);
                w.put_chunks(&c.entities);
            }
            Self::Xor(c) => {
                w.put_u8(TAG_XOR);
                w.put_str(&c.comment);
            }
            Self::Sss(c) => {
                w.put_u8(TAG_SSS);
                w.put_str(&c.comment);
                w.put_u32(c.n);
                w.put_u32(c.k);
            }
            Self::Mux(c) => {
                w.put_u8(TAG_MUX);
                w.put_str(&c.comment);
                w.put_bytes(&c.seed);
            }
            Self::Demux(c) => {
                w.put_u8(TAG_DEMUX);
                w.put_str(&c.comment);
                w.put_bytes(&c.seed);
            }
            Self::Msp(c) => {
                w.put_u8(TAG_MSP);
                w.put_str(&c.comment);
                w.put_str(&c.predicate);
                let roles: Vec<Vec<u8>> =
                    c.input_table.iter().map(|r| r.as_bytes().to_vec()).collect();
                w.put_chunks(&roles);
            }
        }
        w.into_bytes()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(data);
        let cptx = Self::decode(&mut r)?;
        r.finish()?;
        Ok(cptx)
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let tag = r.u8()?;
        let cptx = match tag {
            TAG_SECRETBOX => Self::SecretBox(SecretBox { comment: r.string()? }),
            TAG_BOX => Self::Box(CryptoBox {
                comment: r.string()?,
                public_key: r.bytes()?,
            }),
            TAG_RSA => Self::Rsa(Rsa {
                comment: r.string()?,
                public_key: r.bytes()?,
            }),
            TAG_OPENPGP => Self::OpenPgp(OpenPgp {
                comment: r.string()?,
                entities: r.chunks()?,
            }),
            TAG_XOR => Self::Xor(Xor { comment: r.string()? }),
            TAG_SSS => {
                let comment = r.string()?;
                Self::Sss(Sss {
                    comment,
                    n: r.u32()?,
                    k: r.u32()?,
                })
            }
            TAG_MUX => Self::Mux(Mux {
                comment: r.string()?,
                seed: r.bytes()?,
            }),
            TAG_DEMUX => Self::Demux(Demux {
                comment: r.string()?,
                seed: r.bytes()?,
            }),
            TAG_MSP => {
                let comment = r.string()?;
                let predicate = r.string()?;
                let mut input_table = Vec::new();
                for role in r.chunks()? {
                    input_table
                        .push(String::from_utf8(role).map_err(|_| WireError::InvalidString)?);
                }
                Self::Msp(Msp {
                    comment,
                    predicate,
                    input_table,
                })
            }
            tag => return Err(WireError::UnknownTag { kind: "cryptex", tag }),
        };
        Ok(cptx)
    }
}

/// Number of non-nil input slots.
pub(crate) fn non_nil_len(inputs: &[Option<Vec<u8>>]) -> usize {
    inputs.iter().filter(|i| i.is_some()).count()
}

#[cfg(test)]
pub(crate) mod testutil {
    /// Shape an input buffer of `n` empty slots for `close`.
    pub fn slots(n: usize) -> Vec<Option<Vec<u8>>> {
        vec![None; n]
    }

    /// Shape a secrets buffer of `n` empty slots for `open`.
    pub fn empty_secrets(n: usize) -> Vec<Vec<u8>> {
        vec![Vec::new(); n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrip_preserves_every_variant() {
        let cases = vec![
            Cryptex::SecretBox(SecretBox::new("a box")),
            Cryptex::Box(CryptoBox::new(vec![7u8; 32], "a pk box")),
            Cryptex::Rsa(Rsa::new(vec![1, 2, 3], "an rsa box")),
            Cryptex::OpenPgp(OpenPgp::new(vec![vec![9u8; 12]], "a pgp box")),
            Cryptex::Xor(Xor::new("an xor")),
            Cryptex::Sss(Sss::new(7, 5, "a threshold")),
            Cryptex::Mux(Mux::new("a mux")),
            Cryptex::Demux(Demux::new("a demux")),
            Cryptex::Msp(
                Msp::new("(a & b) | c", vec!["a".into(), "b".into(), "c".into()], "an msp")
                    .unwrap(),
            ),
        ];

        for cptx in cases {
            let data = cptx.marshal();
            let parsed = Cryptex::unmarshal(&data).unwrap();
            assert_eq!(parsed, cptx);
            assert_eq!(parsed.marshal(), data);
        }
    }

    #[test]
    fn unknown_tag_fails_closed() {
        let mut w = Writer::new();
        w.put_u8(200);
        assert!(matches!(
            Cryptex::unmarshal(&w.into_bytes()),
            Err(WireError::UnknownTag { kind: "cryptex", tag: 200 })
        ));
    }

    #[test]
    fn trailing_bytes_fail_closed() {
        let mut data = Cryptex::Xor(Xor::new("x")).marshal();
        data.push(0);
        assert!(matches!(Cryptex::unmarshal(&data), Err(WireError::TrailingBytes)));
    }
}
