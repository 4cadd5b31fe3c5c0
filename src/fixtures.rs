//! Shared test fixtures: reference plan configs, an in-memory driver, and
//! key-material generators.

use crate::driver::{Driver, DriverError, SecretInput};
use crate::material::Material;
use crate::payload::{Attached, Payload};
use crate::secret::Secret;
use crate::secret::ssh_key::fingerprint_of;
use pgp::composed::{
    KeyType, SecretKeyParamsBuilder, SignedPublicKey, SignedSecretKey, SubkeyParamsBuilder,
};
use pgp::ser::Serialize;
use pgp::types::{KeyTrait, SecretKeyTrait};
use rand::rngs::OsRng;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::HashMap;
use std::io::Read;

/// Driver backed by in-memory maps: secrets are keyed by their comment, and
/// a missing entry defers the secret. Materials accumulate across runs like
/// a committed store.
#[derive(Default)]
pub struct TestDriver {
    pub secrets: HashMap<String, Vec<u8>>,
    pub materials: HashMap<Vec<u8>, Vec<u8>>,
}

impl TestDriver {
    pub fn new(secrets: &[(&str, &str)]) -> Self {
        Self {
            secrets: secrets
                .iter()
                .map(|(name, value)| (name.to_string(), value.as_bytes().to_vec()))
                .collect(),
            materials: HashMap::new(),
        }
    }

    pub fn new_from(secrets: &[(String, Vec<u8>)]) -> Self {
        Self {
            secrets: secrets.iter().cloned().collect(),
            materials: HashMap::new(),
        }
    }
}

impl Driver for TestDriver {
    fn load_material(&mut self, id: &[u8]) -> Result<Option<Material>, DriverError> {
        match self.materials.get(id) {
            Some(data) => Ok(Some(Material::unmarshal(data)?)),
            None => Ok(None),
        }
    }

    fn store_material(&mut self, mtrl: &Material) -> Result<(), DriverError> {
        self.materials.insert(mtrl.id.clone(), mtrl.marshal());
        Ok(())
    }

    fn lock_payload(&mut self, r: &mut dyn Read) -> Result<(Payload, Vec<u8>), DriverError> {
        let mut payload = Attached::new();
        let key = payload.lock(r)?;
        Ok((Payload::Attached(payload), key))
    }

    fn load_secret(&mut self, sec: &Secret) -> Result<SecretInput, DriverError> {
        match self.secrets.get(sec.comment()) {
            Some(data) => Ok(SecretInput::Data(sec.load(&mut data.as_slice())?)),
            None => Ok(SecretInput::Skip),
        }
    }
}

/// Generate a self-signed EdDSA key with an ECDH encryption subkey.
pub fn openpgp_keypair(email: &str) -> (SignedSecretKey, SignedPublicKey) {
    let params = SecretKeyParamsBuilder::default()
        .key_type(KeyType::EdDSA)
        .can_create_certificates(true)
        .can_sign(true)
        .primary_user_id(format!("Test User <{email}>"))
        .subkey(
            SubkeyParamsBuilder::default()
                .key_type(KeyType::ECDH)
                .can_encrypt(true)
                .build()
                .expect("subkey params"),
        )
        .build()
        .expect("key params");

    let secret_key = params.generate().expect("generate openpgp key");
    let signed = secret_key.sign(String::new).expect("self-sign key");
    let public = SignedPublicKey::new(
        signed.primary_key.public_key(),
        signed.details.clone(),
        signed.public_subkeys.clone(),
    );
    (signed, public)
}

// [secretbox "master key"] -> [secretbox "op N key"] -> password + material
pub const TWO_MAN_PLAN_CONFIG: &str = r#"
comment = Two-man rule plan
root = master key

[secretbox "master key"]
edge = op 1 key
edge = op 2 key

[secretbox "op 1 key"]
comment = operator 1 key
edge = op 1 password
edge = op 1 material

[secretbox "op 2 key"]
comment = operator 2 key
edge = op 2 password
edge = op 2 material

[password "op 1 password"]
comment = op 1 secret

[password "op 2 password"]
comment = op 2 secret

[material "op 1 material"]

[material "op 2 material"]
"#;

// a request-approve-unlock chain of three secretboxes
pub const TWO_PARTY_PLAN_CONFIG: &str = r#"
comment = Two-party 3 step plan
root = step 3

[secretbox "step 3"]
edge = step 3 password
edge = step 2

[secretbox "step 2"]
edge = step 2 password
edge = step 1

[secretbox "step 1"]
edge = step 1 password
edge = material

[password "step 3 password"]
comment = party 1 password 2

[password "step 2 password"]
comment = party 2 password

[password "step 1 password"]
comment = party 1 password 1

[material]
"#;

// top -> mux -> {left, right} -> demux -> bottom -> material
pub const DIAMOND_PLAN_CONFIG: &str = r#"
comment = Diamond shaped plan
root = top

[secretbox "top"]
comment = step 3
edge = top password
edge = mux

[mux]
edge = left
edge = right

[secretbox "left"]
comment = step 2a
edge = left password
edge = demux

[secretbox "right"]
comment = step 2b
edge = right password
edge = demux

[demux]
edge = bottom

[secretbox "bottom"]
comment = step 1
edge = bottom password
edge = bottom material

[password "top password"]
comment = step 3 password

[password "left password"]
comment = step 2a password

[password "right password"]
comment = step 2b password

[password "bottom password"]
comment = step 1 password

[material "bottom material"]
"#;

pub struct DnssecFixture {
    pub config: String,
    /// `(key id hex, serialized private keyring)` per user, in config order.
    pub keys: Vec<(String, Vec<u8>)>,
}

impl DnssecFixture {
    pub fn driver_with_keys(&self, indexes: &[usize]) -> TestDriver {
        let mut drv = TestDriver::default();
        for &i in indexes {
            self.add_key(&mut drv, i);
        }
        drv
    }

    pub fn add_key(&self, drv: &mut TestDriver, index: usize) {
        let (keyid, keyring) = &self.keys[index];
        drv.secrets.insert(keyid.clone(), keyring.clone());
    }
}

/// The DNSSEC-root-style plan: sss(7, 5) over seven OpenPGP branches.
pub fn dnssec_fixture() -> DnssecFixture {
    let users = ["alice", "bob", "claire", "david", "emily", "frank", "gloria"];

    let mut config = String::from(
        "comment = DNSSEC Root Key\nroot = five-of-seven\n\n[sss \"five-of-seven\"]\nmax-shares = 7\nrequired-shares = 5\n",
    );
    for user in users {
        config.push_str(&format!("edge = {user}@example.com\n"));
    }

    let mut keys = Vec::new();
    for user in users {
        let email = format!("{user}@example.com");
        let (secret_key, public_key) = openpgp_keypair(&email);
        let keyid = hex::encode(secret_key.key_id().as_ref());
        let armored = public_key
            .to_armored_string(None)
            .expect("armor public key");

        config.push_str(&format!(
            "\n[openpgp \"{email}\"]\npublickey = \"{armored}\"\nedge = {user} material\nedge = {keyid}\n"
        ));
        config.push_str(&format!(
            "\n[openpgp-key \"{keyid}\"]\ncomment = {keyid}\nkeyid = {keyid}\n"
        ));
        config.push_str(&format!("\n[material \"{user} material\"]\n"));

        keys.push((keyid, secret_key.to_bytes().expect("serialize key")));
    }

    DnssecFixture { config, keys }
}

pub struct AcmeBankFixture {
    pub config: String,
    pub all_secrets: Vec<(String, Vec<u8>)>,
    president_key: (String, Vec<u8>),
}

impl AcmeBankFixture {
    fn passwords(names: &[&str]) -> Vec<(String, Vec<u8>)> {
        names
            .iter()
            .map(|name| (format!("{name} password"), format!("{name} secret").into_bytes()))
            .collect()
    }

    pub fn minimal_sets(&self) -> Vec<Vec<(String, Vec<u8>)>> {
        let president = self.president_key.clone();
        vec![
            // president & vp-quorum
            [vec![president.clone()], Self::passwords(&["bob quorum", "claire quorum"])].concat(),
            // president & so-quorum
            [vec![president], Self::passwords(&["emily quorum", "frank quorum"])].concat(),
            // vp-quorum & so-quorum
            Self::passwords(&["bob quorum", "david quorum", "emily quorum", "gloria quorum"]),
            // vp-consensus
            Self::passwords(&["bob consensus", "claire consensus", "david consensus"]),
            // so-consensus
            Self::passwords(&["emily consensus", "frank consensus", "gloria consensus"]),
        ]
    }

    pub fn unsatisfying_sets(&self) -> Vec<Vec<(String, Vec<u8>)>> {
        vec![
            vec![self.president_key.clone()],
            Self::passwords(&["bob quorum", "claire quorum"]),
            Self::passwords(&["bob consensus", "claire consensus"]),
            [
                vec![self.president_key.clone()],
                Self::passwords(&["bob quorum"]),
            ]
            .concat(),
        ]
    }
}

/// The Acme-bank MSP plan: a predicate over a president's SSH-backed RSA
/// branch, 2-of-3 officer quorums, and full-consensus XOR branches.
pub fn acme_bank_fixture() -> AcmeBankFixture {
    let private = RsaPrivateKey::new(&mut OsRng, 2048).expect("generate rsa key");
    let pem = private
        .to_pkcs1_pem(LineEnding::LF)
        .expect("encode rsa key")
        .to_string();
    let fingerprint = fingerprint_of(&RsaPublicKey::from(&private));
    let ssh_line = authorized_key_line(&RsaPublicKey::from(&private));

    let vps = ["bob", "claire", "david"];
    let sos = ["emily", "frank", "gloria"];

    let mut config = format!(
        r#"comment = Acme Bank master key
root = master-key

[msp "master-key"]
predicate = "((president & (vp-quorum | so-quorum)) | (vp-quorum & so-quorum) | vp-consensus | so-consensus)"
edge = president
edge = vp-quorum
edge = so-quorum
edge = vp-consensus
edge = so-consensus

[rsa "president"]
ssh-key = "{ssh_line}"
edge = president material
edge = president key

[ssh-key "president key"]
comment = president ssh key
fingerprint = {fingerprint}

[material "president material"]

[sss "vp-quorum"]
max-shares = 3
required-shares = 2
edge = bob quorum vote
edge = claire quorum vote
edge = david quorum vote

[sss "so-quorum"]
max-shares = 3
required-shares = 2
edge = emily quorum vote
edge = frank quorum vote
edge = gloria quorum vote

[xor "vp-consensus"]
edge = bob consensus vote
edge = claire consensus vote
edge = david consensus vote

[xor "so-consensus"]
edge = emily consensus vote
edge = frank consensus vote
edge = gloria consensus vote
"#
    );

    for name in vps.iter().chain(&sos) {
        for kind in ["quorum", "consensus"] {
            config.push_str(&format!(
                "\n[secretbox \"{name} {kind} vote\"]\nedge = {name} {kind} password\nedge = {name} {kind} material\n\n[password \"{name} {kind} password\"]\ncomment = {name} {kind} password\n\n[material \"{name} {kind} material\"]\n"
            ));
        }
    }

    let president_key = ("president ssh key".to_string(), pem.into_bytes());
    let mut all_secrets = vec![president_key.clone()];
    for name in vps.iter().chain(&sos) {
        for kind in ["quorum", "consensus"] {
            all_secrets.push((
                format!("{name} {kind} password"),
                format!("{name} {kind} secret").into_bytes(),
            ));
        }
    }

    AcmeBankFixture {
        config,
        all_secrets,
        president_key,
    }
}

fn authorized_key_line(public: &RsaPublicKey) -> String {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    let blob = crate::secret::ssh_key::ssh_wire_public_key(public);
    format!("ssh-rsa {} president@acme.bank", STANDARD.encode(blob))
}
