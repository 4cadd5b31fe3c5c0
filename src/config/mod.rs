//! Typed plan configuration decoded from the sectioned config language.

mod parser;

pub use parser::{Section, parse};

use crate::cryptex::{
    CryptoBox, Cryptex, CryptexError, Demux, Msp, Mux, OpenPgp, Rsa, SecretBox, Sss, Xor,
};
use crate::dag::GraphError;
use crate::secret::ssh_key::{fingerprint_of_authorized_key, parse_authorized_key};
use crate::secret::{OpenPgpKey, Password, Secret, SecretError, SshKey};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use pgp::composed::{Deserializable, SignedPublicKey};
use pgp::ser::Serialize;
use rsa::BigUint;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::RsaPublicKey;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error at line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("unknown config {key:?} in section {section:?}")]
    UnknownKey { section: String, key: String },

    #[error("missing required config {key:?} in section {section:?}")]
    MissingKey { section: String, key: String },

    #[error("config {key:?} in section {section:?} has {count} values, expected 1")]
    DuplicateKey {
        section: String,
        key: String,
        count: usize,
    },

    #[error("invalid value for {key:?} in section {section:?}: {msg}")]
    InvalidValue {
        section: String,
        key: String,
        msg: String,
    },

    #[error("unknown section type {0:?}")]
    UnknownSection(String),

    #[error("missing root cryptex {0:?}")]
    MissingRootCryptex(String),

    #[error("missing node for edge {0:?}")]
    MissingEdgeTarget(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Cryptex(#[from] CryptexError),

    #[error(transparent)]
    Secret(#[from] SecretError),
}

#[derive(Debug, Default)]
pub struct PlanConfig {
    pub comment: String,
    pub root: String,

    pub secretboxes: HashMap<String, SecretBoxConfig>,
    pub boxes: HashMap<String, BoxConfig>,
    pub rsas: HashMap<String, RsaConfig>,
    pub openpgps: HashMap<String, OpenPgpConfig>,
    pub xors: HashMap<String, XorConfig>,
    pub ssss: HashMap<String, SssConfig>,
    pub muxes: HashMap<String, MuxConfig>,
    pub demuxes: HashMap<String, DemuxConfig>,
    pub msps: HashMap<String, MspConfig>,

    pub passwords: HashMap<String, PasswordConfig>,
    pub openpgp_keys: HashMap<String, OpenPgpKeyConfig>,
    pub ssh_keys: HashMap<String, SshKeyConfig>,

    pub materials: HashMap<String, MarkerConfig>,
}

/// A cryptex section by reference, dispatched by type.
pub enum CryptexSection<'a> {
    SecretBox(&'a SecretBoxConfig),
    Box(&'a BoxConfig),
    Rsa(&'a RsaConfig),
    OpenPgp(&'a OpenPgpConfig),
    Xor(&'a XorConfig),
    Sss(&'a SssConfig),
    Mux(&'a MuxConfig),
    Demux(&'a DemuxConfig),
    Msp(&'a MspConfig),
}

impl CryptexSection<'_> {
    pub fn edges(&self) -> &[String] {
        match self {
            Self::SecretBox(c) => &c.edges,
            Self::Box(c) => &c.edges,
            Self::Rsa(c) => &c.edges,
            Self::OpenPgp(c) => &c.edges,
            Self::Xor(c) => &c.edges,
            Self::Sss(c) => &c.edges,
            Self::Mux(c) => &c.edges,
            Self::Demux(c) => &c.edges,
            Self::Msp(c) => &c.edges,
        }
    }

    pub fn cryptex(&self) -> Result<Cryptex, ConfigError> {
        match self {
            Self::SecretBox(c) => Ok(Cryptex::SecretBox(SecretBox::new(&c.comment))),
            Self::Box(c) => {
                let key = STANDARD.decode(&c.public_key).map_err(|e| {
                    ConfigError::InvalidValue {
                        section: "box".into(),
                        key: "publickey".into(),
                        msg: e.to_string(),
                    }
                })?;
                Ok(Cryptex::Box(CryptoBox::new(key, &c.comment)))
            }
            Self::Rsa(c) => Ok(Cryptex::Rsa(Rsa::new(c.public_key_der()?, &c.comment))),
            Self::OpenPgp(c) => {
                let mut entities = Vec::with_capacity(c.public_keys.len());
                for armored in &c.public_keys {
                    let (key, _) = SignedPublicKey::from_armor_single(std::io::Cursor::new(armored.as_bytes()))
                        .map_err(|e| ConfigError::InvalidValue {
                            section: "openpgp".into(),
                            key: "publickey".into(),
                            msg: e.to_string(),
                        })?;
                    entities.push(key.to_bytes().map_err(|e| ConfigError::InvalidValue {
                        section: "openpgp".into(),
                        key: "publickey".into(),
                        msg: e.to_string(),
                    })?);
                }
                Ok(Cryptex::OpenPgp(OpenPgp::new(entities, &c.comment)))
            }
            Self::Xor(c) => Ok(Cryptex::Xor(Xor::new(&c.comment))),
            Self::Sss(c) => Ok(Cryptex::Sss(Sss::new(c.max_shares, c.required_shares, &c.comment))),
            Self::Mux(c) => Ok(Cryptex::Mux(Mux::new(&c.comment))),
            Self::Demux(c) => Ok(Cryptex::Demux(Demux::new(&c.comment))),
            Self::Msp(c) => Ok(Cryptex::Msp(Msp::new(
                &c.predicate,
                c.edges.clone(),
                &c.comment,
            )?)),
        }
    }
}

impl PlanConfig {
    pub fn parse(data: &str) -> Result<Self, ConfigError> {
        let sections = parser::parse(data)?;
        let mut cfg = Self::default();

        let mut root = Fields::new(&sections[0]);
        cfg.root = root.required("root")?;
        cfg.comment = root.optional("comment")?.unwrap_or_default();
        root.finish()?;

        for section in &sections[1..] {
            let id = section.id.clone();
            let mut fields = Fields::new(section);
            match section.stype.as_str() {
                "secretbox" => {
                    cfg.secretboxes.insert(id, SecretBoxConfig::decode(&mut fields)?);
                }
                "box" => {
                    cfg.boxes.insert(id, BoxConfig::decode(&mut fields)?);
                }
                "rsa" => {
                    cfg.rsas.insert(id, RsaConfig::decode(&mut fields)?);
                }
                "openpgp" => {
                    cfg.openpgps.insert(id, OpenPgpConfig::decode(&mut fields)?);
                }
                "xor" => {
                    cfg.xors.insert(id, XorConfig::decode(&mut fields)?);
                }
                "sss" => {
                    cfg.ssss.insert(id, SssConfig::decode(&mut fields)?);
                }
                "mux" => {
                    cfg.muxes.insert(id, MuxConfig::decode(&mut fields)?);
                }
                "demux" => {
                    cfg.demuxes.insert(id, DemuxConfig::decode(&mut fields)?);
                }
                "msp" => {
                    cfg.msps.insert(id, MspConfig::decode(&mut fields)?);
                }
                "password" => {
                    cfg.passwords.insert(id, PasswordConfig::decode(&mut fields)?);
                }
                "openpgp-key" => {
                    cfg.openpgp_keys.insert(id, OpenPgpKeyConfig::decode(&mut fields)?);
                }
                "ssh-key" => {
                    cfg.ssh_keys.insert(id, SshKeyConfig::decode(&mut fields)?);
                }
                "material" => {
                    cfg.materials.insert(id, MarkerConfig::decode(&mut fields)?);
                }
                other => return Err(ConfigError::UnknownSection(other.to_string())),
            }
            fields.finish()?;
        }
        Ok(cfg)
    }

    pub fn cryptex_section(&self, name: &str) -> Option<CryptexSection<'_>> {
        if let Some(c) = self.secretboxes.get(name) {
            return Some(CryptexSection::SecretBox(c));
        }
        if let Some(c) = self.boxes.get(name) {
            return Some(CryptexSection::Box(c));
        }
        if let Some(c) = self.rsas.get(name) {
            return Some(CryptexSection::Rsa(c));
        }
        if let Some(c) = self.openpgps.get(name) {
            return Some(CryptexSection::OpenPgp(c));
        }
        if let Some(c) = self.xors.get(name) {
            return Some(CryptexSection::Xor(c));
        }
        if let Some(c) = self.ssss.get(name) {
            return Some(CryptexSection::Sss(c));
        }
        if let Some(c) = self.muxes.get(name) {
            return Some(CryptexSection::Mux(c));
        }
        if let Some(c) = self.demuxes.get(name) {
            return Some(CryptexSection::Demux(c));
        }
        if let Some(c) = self.msps.get(name) {
            return Some(CryptexSection::Msp(c));
        }
        None
    }

    pub fn secret_section(&self, name: &str) -> Option<Result<Secret, ConfigError>> {
        if let Some(c) = self.passwords.get(name) {
            return Some(Ok(Secret::Password(Password::new(&c.comment))));
        }
        if let Some(c) = self.openpgp_keys.get(name) {
            return Some(c.secret());
        }
        if let Some(c) = self.ssh_keys.get(name) {
            return Some(c.secret());
        }
        None
    }
}

#[derive(Debug, Default)]
pub struct SecretBoxConfig {
    pub comment: String,
    pub edges: Vec<String>,
}

impl SecretBoxConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
            edges: fields.all("edge"),
        })
    }
}

#[derive(Debug, Default)]
pub struct XorConfig {
    pub comment: String,
    pub edges: Vec<String>,
}

impl XorConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
            edges: fields.all("edge"),
        })
    }
}

#[derive(Debug, Default)]
pub struct MuxConfig {
    pub comment: String,
    pub edges: Vec<String>,
}

impl MuxConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
            edges: fields.all("edge"),
        })
    }
}

#[derive(Debug, Default)]
pub struct DemuxConfig {
    pub comment: String,
    pub edges: Vec<String>,
}

impl DemuxConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
            edges: fields.all("edge"),
        })
    }
}

#[derive(Debug, Default)]
pub struct BoxConfig {
    pub comment: String,
    pub edges: Vec<String>,
    pub public_key: String,
}

impl BoxConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
            edges: fields.all("edge"),
            public_key: fields.required("publickey")?,
        })
    }
}

#[derive(Debug, Default)]
pub struct OpenPgpConfig {
    pub comment: String,
    pub edges: Vec<String>,
    pub public_keys: Vec<String>,
}

impl OpenPgpConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        let cfg = Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
            edges: fields.all("edge"),
            public_keys: fields.all("publickey"),
        };
        if cfg.public_keys.is_empty() {
            return Err(fields.missing("publickey"));
        }
        Ok(cfg)
    }
}

#[derive(Debug, Default)]
pub struct SssConfig {
    pub comment: String,
    pub edges: Vec<String>,
    pub max_shares: u32,
    pub required_shares: u32,
}

impl SssConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
            edges: fields.all("edge"),
            max_shares: fields.int("max-shares")?,
            required_shares: fields.int("required-shares")?,
        })
    }
}

#[derive(Debug, Default)]
pub struct MspConfig {
    pub comment: String,
    pub edges: Vec<String>,
    pub predicate: String,
}

impl MspConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
            edges: fields.all("edge"),
            predicate: fields.required("predicate")?,
        })
    }
}

/// RSA accepts its public key as either a PEM PKIX block or an
/// `authorized_keys` line.
#[derive(Debug, Default)]
pub struct RsaConfig {
    pub comment: String,
    pub edges: Vec<String>,
    pub pkix_key: Option<String>,
    pub ssh_key: Option<String>,
}

impl RsaConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        let cfg = Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
            edges: fields.all("edge"),
            pkix_key: fields.optional("pkix-key")?,
            ssh_key: fields.optional("ssh-key")?,
        };
        if cfg.pkix_key.is_none() && cfg.ssh_key.is_none() {
            return Err(fields.missing("pkix-key"));
        }
        Ok(cfg)
    }
}

impl RsaConfig {
    fn public_key_der(&self) -> Result<Vec<u8>, ConfigError> {
        let invalid = |msg: String| ConfigError::InvalidValue {
            section: "rsa".into(),
            key: if self.pkix_key.is_some() { "pkix-key" } else { "ssh-key" }.into(),
            msg,
        };

        if let Some(pem) = &self.pkix_key {
            let key = RsaPublicKey::from_public_key_pem(pem).map_err(|e| invalid(e.to_string()))?;
            return key
                .to_public_key_der()
                .map(|der| der.as_bytes().to_vec())
                .map_err(|e| invalid(e.to_string()));
        }

        let line = self.ssh_key.as_ref().expect("one key form present");
        let (e, n) = parse_authorized_key(line)?;
        let key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
            .map_err(|e| invalid(e.to_string()))?;
        key.to_public_key_der()
            .map(|der| der.as_bytes().to_vec())
            .map_err(|e| invalid(e.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct PasswordConfig {
    pub comment: String,
}

impl PasswordConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default)]
pub struct OpenPgpKeyConfig {
    pub comment: String,
    pub key_ids: Vec<String>,
}

impl OpenPgpKeyConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
            key_ids: fields.all("keyid"),
        })
    }

    fn secret(&self) -> Result<Secret, ConfigError> {
        let mut key_ids = Vec::with_capacity(self.key_ids.len());
        for id in &self.key_ids {
            let id = u64::from_str_radix(id, 16).map_err(|e| ConfigError::InvalidValue {
                section: "openpgp-key".into(),
                key: "keyid".into(),
                msg: e.to_string(),
            })?;
            key_ids.push(id);
        }
        Ok(Secret::OpenPgpKey(OpenPgpKey::new(key_ids, &self.comment)))
    }
}

/// SSH keys are declared by fingerprint, spelled directly or derived from
/// an `authorized_keys` line.
#[derive(Debug, Default)]
pub struct SshKeyConfig {
    pub comment: String,
    pub fingerprint: Option<String>,
    pub authorized_key: Option<String>,
}

impl SshKeyConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        let cfg = Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
            fingerprint: fields.optional("fingerprint")?,
            authorized_key: fields.optional("authorized-key")?,
        };
        if cfg.fingerprint.is_none() && cfg.authorized_key.is_none() {
            return Err(fields.missing("fingerprint"));
        }
        Ok(cfg)
    }

    fn secret(&self) -> Result<Secret, ConfigError> {
        let fingerprint = match (&self.fingerprint, &self.authorized_key) {
            (Some(fp), _) => fp.clone(),
            (None, Some(line)) => fingerprint_of_authorized_key(line)?,
            (None, None) => unreachable!("validated during decode"),
        };
        Ok(Secret::SshKey(SshKey::new(fingerprint, &self.comment)?))
    }
}

#[derive(Debug, Default)]
pub struct MarkerConfig {
    pub comment: String,
}

impl MarkerConfig {
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            comment: fields.optional("comment")?.unwrap_or_default(),
        })
    }
}

/// Key accessor over a section that tracks consumption so unknown keys fail
/// loudly.
struct Fields<'a> {
    section: &'a Section,
    taken: Vec<bool>,
}

impl<'a> Fields<'a> {
    fn new(section: &'a Section) -> Self {
        Self {
            taken: vec![false; section.values.len()],
            section,
        }
    }

    fn all(&mut self, key: &str) -> Vec<String> {
        let mut out = Vec::new();
        for (i, (k, v)) in self.section.values.iter().enumerate() {
            if k == key {
                self.taken[i] = true;
                out.push(v.clone());
            }
        }
        out
    }

    fn optional(&mut self, key: &str) -> Result<Option<String>, ConfigError> {
        let values = self.all(key);
        match values.len() {
            0 => Ok(None),
            1 => Ok(values.into_iter().next()),
            count => Err(ConfigError::DuplicateKey {
                section: self.name(),
                key: key.to_string(),
                count,
            }),
        }
    }

    fn required(&mut self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)?.ok_or_else(|| self.missing(key))
    }

    fn int(&mut self, key: &str) -> Result<u32, ConfigError> {
        let value = self.required(key)?;
        value.parse().map_err(|_| ConfigError::InvalidValue {
            section: self.name(),
            key: key.to_string(),
            msg: format!("{value:?} is not an integer"),
        })
    }

    fn missing(&self, key: &str) -> ConfigError {
        ConfigError::MissingKey {
            section: self.name(),
            key: key.to_string(),
        }
    }

    fn finish(&self) -> Result<(), ConfigError> {
        for (i, (key, _)) in self.section.values.iter().enumerate() {
            if !self.taken[i] {
                return Err(ConfigError::UnknownKey {
                    section: self.name(),
                    key: key.clone(),
                });
            }
        }
        Ok(())
    }

    fn name(&self) -> String {
        if self.section.stype.is_empty() {
            "root".to_string()
        } else {
            format!("{} {:?}", self.section.stype, self.section.id)
        }
    }
}
