//! Armored message framing.
//!
//! Plans, vaults, and materials are wrapped in a tagged binary envelope and
//! carried as PEM blocks with an `X-Digest` header (and a `Comment` header
//! when one is set). Unarmoring recomputes the digest and refuses blocks
//! that do not match.

use crate::material::Material;
use crate::plan::Plan;
use crate::vault::{Vault, VaultError};
use crate::wire::{Reader, WireError, Writer};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

const TAG_PLAN: u8 = 1;
const TAG_VAULT: u8 = 2;
const TAG_MATERIAL: u8 = 3;

const DIGEST_HEADER: &str = "X-Digest";
const COMMENT_HEADER: &str = "Comment";
const LINE_WIDTH: usize = 64;

#[derive(Debug, Error)]
pub enum ArmorError {
    #[error("invalid armored message")]
    InvalidPem,

    #[error("unknown armor block type {0:?}")]
    UnknownBlockType(String),

    #[error("armored digest mismatch")]
    DigestMismatch,

    #[error("invalid base64 payload")]
    Base64,

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Top-level exportable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Plan(Plan),
    Vault(Vault),
    Material(Material),
}

impl Message {
    pub fn comment(&self) -> &str {
        match self {
            Self::Plan(p) => p.comment(),
            Self::Vault(v) => v.comment(),
            Self::Material(m) => m.comment(),
        }
    }

    pub fn digest(&self) -> Result<Vec<u8>, VaultError> {
        match self {
            Self::Plan(p) => Ok(p.digest()),
            Self::Vault(v) => v.digest(),
            Self::Material(m) => Ok(m.digest()),
        }
    }

    fn pem_type(&self) -> &'static str {
        match self {
            Self::Plan(_) => "VCRYPT PLAN",
            Self::Vault(_) => "VCRYPT VAULT",
            Self::Material(_) => "VCRYPT MATERIAL",
        }
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            Self::Plan(p) => {
                w.put_u8(TAG_PLAN);
                p.encode(&mut w);
            }
            Self::Vault(v) => {
                w.put_u8(TAG_VAULT);
                v.encode(&mut w);
            }
            Self::Material(m) => {
                w.put_u8(TAG_MATERIAL);
                m.encode(&mut w);
            }
        }
        w.into_bytes()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(data);
        let msg = match r.u8()? {
            TAG_PLAN => Self::Plan(Plan::decode(&mut r)?),
            TAG_VAULT => Self::Vault(Vault::decode(&mut r)?),
            TAG_MATERIAL => Self::Material(Material::decode(&mut r)?),
            tag => return Err(WireError::UnknownTag { kind: "message", tag }),
        };
        r.finish()?;
        Ok(msg)
    }
}

/// PEM-encode a message with its digest header.
pub fn armor(msg: &Message) -> Result<String, ArmorError> {
    let digest = msg.digest()?;
    let data = STANDARD.encode(msg.marshal());

    let mut out = String::new();
    out.push_str(&format!("-----BEGIN {}-----\n", msg.pem_type()));
    if !msg.comment().is_empty() {
        out.push_str(&format!("{COMMENT_HEADER}: {}\n", msg.comment()));
    }
    out.push_str(&format!("{DIGEST_HEADER}: {}\n\n", STANDARD.encode(digest)));

    for chunk in data.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(std::str::from_utf8(chunk).expect("base64 is ascii"));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", msg.pem_type()));
    Ok(out)
}

/// Parse the first armored block in `data` and verify its digest header.
pub fn unarmor(data: &str) -> Result<Message, ArmorError> {
    let mut lines = data.lines();

    let block_type = loop {
        let line = lines.next().ok_or(ArmorError::InvalidPem)?.trim();
        if let Some(rest) = line.strip_prefix("-----BEGIN ") {
            break rest.strip_suffix("-----").ok_or(ArmorError::InvalidPem)?.to_string();
        }
    };
    if !matches!(
        block_type.as_str(),
        "VCRYPT PLAN" | "VCRYPT VAULT" | "VCRYPT MATERIAL"
    ) {
        return Err(ArmorError::UnknownBlockType(block_type));
    }

    let mut digest_header: Option<String> = None;
    let end_line = format!("-----END {block_type}-----");
    let mut body = String::new();
    let mut in_headers = true;

    for line in lines {
        let line = line.trim();
        if line == end_line {
            let msg = Message::unmarshal(
                &STANDARD.decode(&body).map_err(|_| ArmorError::Base64)?,
            )?;

            let declared = digest_header.ok_or(ArmorError::InvalidPem)?;
            let declared = STANDARD.decode(declared.as_str()).map_err(|_| ArmorError::Base64)?;
            if msg.digest()? != declared {
                return Err(ArmorError::DigestMismatch);
            }
            return Ok(msg);
        }

        if in_headers {
            if line.is_empty() {
                in_headers = false;
                continue;
            }
            match line.split_once(": ") {
                Some((DIGEST_HEADER, value)) => digest_header = Some(value.to_string()),
                Some((COMMENT_HEADER, _)) => {}
                _ => return Err(ArmorError::InvalidPem),
            }
            continue;
        }
        body.push_str(line);
    }

    Err(ArmorError::InvalidPem)
}
