//! Vaults: a locked payload bundled with the plan that protects it, the
//! marker materials produced while locking, and optional seals.
//!
//! Locking walks the policy graph breadth-first from the root, closing each
//! cryptex over the secrets buffered at its vertex and pushing the produced
//! inputs down onto its children. Unlocking shapes per-vertex output
//! buffers breadth-first, then recovers bottom-up in reverse depth-first
//! order, skipping subtrees whose inputs cannot be provided yet. Recovered
//! intermediates are written back through the driver so a later run can
//! resume where this one stopped.

use crate::crypto::{hmac_sha256, random_bytes};
use crate::cryptex::CryptexError;
use crate::dag::{GraphError, Vertex};
use crate::driver::{Driver, DriverError, SecretInput};
use crate::graph::Graph;
use crate::material::{Material, MaterialError};
use crate::node::NodeValue;
use crate::payload::{Payload, PayloadError};
use crate::plan::Plan;
use crate::seal::{Seal, SealError, Sealer};
use crate::secret::Phase;
use crate::wire::{Reader, WireError, Writer};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{Read, Write};
use thiserror::Error;
use zeroize::Zeroizing;

pub const NONCE_SIZE: usize = 24;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault is already locked")]
    AlreadyLocked,

    #[error("unlocked vault has no digest")]
    NotLocked,

    #[error("secret {0:?} is required during lock")]
    LockSecretUnavailable(String),

    #[error("no output buffered for graph vertex")]
    MissingOutput,

    #[error("payload key was not recovered")]
    MissingRootKey,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Cryptex(#[from] CryptexError),

    #[error(transparent)]
    Material(#[from] MaterialError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Seal(#[from] SealError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    comment: String,
    pub nonce: Vec<u8>,
    pub plan: Plan,
    payload: Option<Payload>,
    pub materials: Vec<Material>,
    seals: Vec<Seal>,
}

impl Vault {
    pub fn new(plan: Plan, comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            nonce: random_bytes::<NONCE_SIZE>().to_vec(),
            plan,
            payload: None,
            materials: Vec::new(),
            seals: Vec::new(),
        }
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn seals(&self) -> &[Seal] {
        &self.seals
    }

    pub fn add_seal(&mut self, sealer: &dyn Sealer) -> Result<&Seal, SealError> {
        let seal = sealer.seal(&self.seal_data())?;
        self.seals.push(seal);
        Ok(self.seals.last().expect("just pushed"))
    }

    /// `nonce ‖ root.digest ‖ comment`
    pub fn seal_data(&self) -> Vec<u8> {
        let root = self.plan.nodes[0].digest();
        let mut data = Vec::with_capacity(self.nonce.len() + root.len() + self.comment.len());
        data.extend_from_slice(&self.nonce);
        data.extend_from_slice(&root);
        data.extend_from_slice(self.comment.as_bytes());
        data
    }

    /// `HMAC-SHA-256(nonce, plan ‖ materials… ‖ seals… ‖ payload)`.
    /// Defined only once the vault is locked.
    pub fn digest(&self) -> Result<Vec<u8>, VaultError> {
        let payload = self.payload.as_ref().ok_or(VaultError::NotLocked)?;

        let plan = self.plan.digest();
        let materials: Vec<Vec<u8>> = self.materials.iter().map(Material::digest).collect();
        let seals: Vec<Vec<u8>> = self.seals.iter().map(Seal::digest).collect();
        let payload_digest = payload.digest()?;

        let mut parts: Vec<&[u8]> = vec![&plan];
        parts.extend(materials.iter().map(Vec::as_slice));
        parts.extend(seals.iter().map(Vec::as_slice));
        parts.push(&payload_digest);
        Ok(hmac_sha256(&self.nonce, &parts))
    }

    /// Encrypt the reader's bytes and split the payload key across the
    /// policy graph.
    pub fn lock(&mut self, r: &mut dyn Read, drv: &mut dyn Driver) -> Result<(), VaultError> {
        if self.payload.is_some() {
            return Err(VaultError::AlreadyLocked);
        }

        let (payload, root_key) = drv.lock_payload(r)?;
        let graph = self.plan.graph()?;

        let mut outputs: HashMap<Vertex, Vec<Vec<u8>>> = HashMap::new();
        outputs.insert(graph.root(), vec![root_key]);

        let mut materials = Vec::new();
        graph.bfs(|v| -> Result<(), VaultError> {
            match graph.value(v) {
                NodeValue::Cryptex(cptx) => {
                    let edges = graph.edges(v);
                    let mut inputs: Vec<Option<Vec<u8>>> = Vec::with_capacity(edges.len());
                    for &child in edges {
                        inputs.push(match graph.value(child) {
                            NodeValue::Secret(sec) if sec.phase() == Phase::Dual => {
                                match drv.load_secret(sec)? {
                                    SecretInput::Data(data) => data.into_iter().next(),
                                    SecretInput::Skip => {
                                        return Err(VaultError::LockSecretUnavailable(
                                            sec.comment().to_string(),
                                        ));
                                    }
                                }
                            }
                            _ => None,
                        });
                    }

                    let secrets = outputs.get(&v).ok_or(VaultError::MissingOutput)?.clone();
                    cptx.close(&mut inputs, &secrets)?;

                    for (&child, input) in edges.iter().zip(inputs) {
                        if let Some(data) = input {
                            outputs.entry(child).or_default().push(data);
                        }
                    }

                    let digest = graph.digest_of(v).ok_or(GraphError::MissingVertex)?;
                    drv.store_material(&Material::new(digest.to_vec(), secrets))?;
                }
                NodeValue::Marker(_) => {
                    let digest = graph.digest_of(v).ok_or(GraphError::MissingVertex)?;
                    let data = outputs.remove(&v).unwrap_or_default();
                    materials.push(Material::new(digest.to_vec(), data));
                }
                NodeValue::Secret(_) => {
                    // its buffer was filled by the parent's close
                }
            }
            Ok(())
        })?;

        self.materials = materials;
        self.payload = Some(payload);
        Ok(())
    }

    /// Recombine whatever the driver can provide and decrypt the payload.
    /// Returns `false` when the root could not be recovered yet; solved
    /// intermediates are stored through the driver either way.
    pub fn unlock(&self, w: &mut dyn Write, drv: &mut dyn Driver) -> Result<bool, VaultError> {
        let payload = self.payload.as_ref().ok_or(VaultError::NotLocked)?;
        let graph = self.plan.graph()?;
        let root = graph.root();

        // pass 1: one output slot per consumer edge, plus the root key slot
        let mut outputs: HashMap<Vertex, VecDeque<Option<Vec<u8>>>> = HashMap::new();
        outputs.insert(root, VecDeque::from([None]));
        graph
            .bfs(|v| -> Result<(), VaultError> {
                for &child in graph.edges(v) {
                    outputs.entry(child).or_default().push_back(None);
                }
                Ok(())
            })
            .expect("shaping walk is infallible");

        // pass 2: children before parents
        let mut skipped: HashSet<Vertex> = HashSet::new();
        graph.reverse_dfs(|v| {
            self.solve(&graph, v, drv, &mut outputs, &mut skipped)
        })?;

        if skipped.contains(&root) {
            return Ok(false);
        }

        let root_key = Zeroizing::new(
            outputs
                .get_mut(&root)
                .and_then(VecDeque::pop_front)
                .flatten()
                .ok_or(VaultError::MissingRootKey)?,
        );

        match payload {
            Payload::Attached(p) => p.unlock(w, &root_key)?,
            Payload::Detached(p) => {
                let digest = p.digest()?;
                let mtrl = drv
                    .load_material(digest)?
                    .ok_or(PayloadError::MissingMaterial)?;
                p.unlock(w, &root_key, &mtrl)?;
            }
        }
        Ok(true)
    }

    fn solve(
        &self,
        graph: &Graph,
        v: Vertex,
        drv: &mut dyn Driver,
        outputs: &mut HashMap<Vertex, VecDeque<Option<Vec<u8>>>>,
        skipped: &mut HashSet<Vertex>,
    ) -> Result<(), VaultError> {
        let digest = graph.digest_of(v).ok_or(GraphError::MissingVertex)?.to_vec();

        // a previous run may have solved this subtree already
        if let Some(mtrl) = drv.load_material(&digest)? {
            outputs.insert(v, mtrl.data.into_iter().map(Some).collect());
            return Ok(());
        }

        match graph.value(v) {
            NodeValue::Marker(_) => {
                let mtrl = self
                    .materials
                    .iter()
                    .find(|m| m.id == digest)
                    .ok_or_else(|| MaterialError::Missing(hex::encode(&digest[..8])))?;
                outputs.insert(v, mtrl.data.iter().cloned().map(Some).collect());
            }
            NodeValue::Secret(sec) => match drv.load_secret(sec)? {
                SecretInput::Data(data) => {
                    outputs.insert(v, data.into_iter().map(Some).collect());
                }
                SecretInput::Skip => {
                    skipped.insert(v);
                }
            },
            NodeValue::Cryptex(cptx) => {
                let edges = graph.edges(v);
                let mut skippable = false;
                let mut inputs: Vec<Option<Vec<u8>>> = Vec::with_capacity(edges.len());
                for &child in edges {
                    if skipped.contains(&child) {
                        skippable = true;
                        inputs.push(None);
                        continue;
                    }
                    inputs.push(
                        outputs
                            .get_mut(&child)
                            .and_then(VecDeque::pop_front)
                            .flatten(),
                    );
                }

                let slots = outputs.get(&v).map_or(0, VecDeque::len);
                let mut secrets = vec![Vec::new(); slots];
                match cptx.open(&mut secrets, &inputs) {
                    Ok(()) => {
                        drv.store_material(&Material::new(digest, secrets.clone()))?;
                        outputs.insert(v, secrets.into_iter().map(Some).collect());
                    }
                    Err(err) if skippable && err.is_recoverable() => {
                        skipped.insert(v);
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Ok(())
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        w.put_str(&self.comment);
        w.put_bytes(&self.nonce);

        let mut pw = Writer::new();
        self.plan.encode(&mut pw);
        w.put_bytes(&pw.into_bytes());

        w.put_u32(self.materials.len() as u32);
        for mtrl in &self.materials {
            mtrl.encode(w);
        }
        w.put_u32(self.seals.len() as u32);
        for seal in &self.seals {
            seal.encode(w);
        }

        match &self.payload {
            Some(payload) => {
                w.put_u8(1);
                payload.encode(w);
            }
            None => w.put_u8(0),
        }
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let comment = r.string()?;
        let nonce = r.bytes()?;

        let plan_bytes = r.bytes()?;
        let mut pr = Reader::new(&plan_bytes);
        let plan = Plan::decode(&mut pr)?;
        pr.finish()?;

        let material_count = r.u32()? as usize;
        let mut materials = Vec::with_capacity(material_count.min(4096));
        for _ in 0..material_count {
            materials.push(Material::decode(r)?);
        }

        let seal_count = r.u32()? as usize;
        let mut seals = Vec::with_capacity(seal_count.min(64));
        for _ in 0..seal_count {
            seals.push(Seal::decode(r)?);
        }

        let payload = match r.u8()? {
            0 => None,
            _ => Some(Payload::decode(r)?),
        };

        Ok(Self {
            comment,
            nonce,
            plan,
            payload,
            materials,
            seals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{
        DIAMOND_PLAN_CONFIG, TWO_MAN_PLAN_CONFIG, TWO_PARTY_PLAN_CONFIG, TestDriver,
        acme_bank_fixture, dnssec_fixture,
    };
    use crate::crypto::random_vec;

    fn lock_vault(config: &str, drv: &mut TestDriver) -> (Vault, Vec<u8>) {
        let plan = Plan::from_config(config).unwrap();
        let mut vault = Vault::new(plan, "a test vault");
        let payload = random_vec(256);
        vault.lock(&mut payload.as_slice(), drv).unwrap();
        (vault, payload)
    }

    #[test]
    fn two_man_rule_unlocks_with_both_passwords() {
        let mut locker = TestDriver::new(&[("op 1 secret", "key #1"), ("op 2 secret", "key #2")]);
        let (vault, payload) = lock_vault(TWO_MAN_PLAN_CONFIG, &mut locker);

        let mut drv = TestDriver::new(&[("op 1 secret", "key #1"), ("op 2 secret", "key #2")]);
        let mut out = Vec::new();
        assert!(vault.unlock(&mut out, &mut drv).unwrap());
        assert_eq!(out, payload);
    }

    #[test]
    fn two_man_rule_is_partial_with_one_password() {
        let mut locker = TestDriver::new(&[("op 1 secret", "key #1"), ("op 2 secret", "key #2")]);
        let (vault, _) = lock_vault(TWO_MAN_PLAN_CONFIG, &mut locker);

        let mut drv = TestDriver::new(&[("op 1 secret", "key #1")]);
        let mut out = Vec::new();
        assert!(!vault.unlock(&mut out, &mut drv).unwrap());
        assert!(out.is_empty());

        // the solved operator subtree was cached for the next run
        assert!(!drv.materials.is_empty());
    }

    #[test]
    fn lockers_material_cache_short_circuits_unlock() {
        let mut drv = TestDriver::new(&[("op 1 secret", "key #1"), ("op 2 secret", "key #2")]);
        let (vault, payload) = lock_vault(TWO_MAN_PLAN_CONFIG, &mut drv);

        // same driver, no passwords needed: every cryptex output was cached
        // at lock time
        drv.secrets.clear();
        let mut out = Vec::new();
        assert!(vault.unlock(&mut out, &mut drv).unwrap());
        assert_eq!(out, payload);
    }

    #[test]
    fn unlocking_twice_yields_identical_plaintext() {
        let mut locker = TestDriver::new(&[("op 1 secret", "key #1"), ("op 2 secret", "key #2")]);
        let (vault, payload) = lock_vault(TWO_MAN_PLAN_CONFIG, &mut locker);

        let mut drv = TestDriver::new(&[("op 1 secret", "key #1"), ("op 2 secret", "key #2")]);
        let mut first = Vec::new();
        let mut second = Vec::new();
        assert!(vault.unlock(&mut first, &mut drv).unwrap());
        assert!(vault.unlock(&mut second, &mut drv).unwrap());
        assert_eq!(first, payload);
        assert_eq!(first, second);
    }

    #[test]
    fn two_party_partial_unlock_resumes_from_cached_intermediates() {
        let all = [
            ("party 1 password 1", "step #1 secret"),
            ("party 2 password", "step #2 secret"),
            ("party 1 password 2", "step #3 secret"),
        ];
        let mut locker = TestDriver::new(&all);
        let (vault, payload) = lock_vault(TWO_PARTY_PLAN_CONFIG, &mut locker);

        // party 1 alone: the middle password is missing, the root stays
        // skipped, but the inner step is solved and cached
        let mut drv = TestDriver::new(&[
            ("party 1 password 1", "step #1 secret"),
            ("party 1 password 2", "step #3 secret"),
        ]);
        let mut out = Vec::new();
        assert!(!vault.unlock(&mut out, &mut drv).unwrap());
        assert!(out.is_empty());

        // party 2 supplies the middle password; party 1's first password is
        // no longer needed thanks to the cache
        drv.secrets.remove("party 1 password 1");
        drv.secrets
            .insert("party 2 password".into(), b"step #2 secret".to_vec());
        assert!(vault.unlock(&mut out, &mut drv).unwrap());
        assert_eq!(out, payload);
    }

    #[test]
    fn diamond_unlocks_through_either_mux_arm() {
        let all = [
            ("step 3 password", "step #3 password"),
            ("step 2a password", "step #2a password"),
            ("step 2b password", "step #2b password"),
            ("step 1 password", "step #1 password"),
        ];
        let mut locker = TestDriver::new(&all);
        let (vault, payload) = lock_vault(DIAMOND_PLAN_CONFIG, &mut locker);

        // all four passwords
        let mut drv = TestDriver::new(&all);
        let mut out = Vec::new();
        assert!(vault.unlock(&mut out, &mut drv).unwrap());
        assert_eq!(out, payload);

        // top, bottom, and exactly one of the middle passwords
        for arm in ["step 2a password", "step 2b password"] {
            let mut drv = TestDriver::new(&[
                ("step 3 password", "step #3 password"),
                (arm, if arm.contains("2a") { "step #2a password" } else { "step #2b password" }),
                ("step 1 password", "step #1 password"),
            ]);
            let mut out = Vec::new();
            assert!(vault.unlock(&mut out, &mut drv).unwrap(), "arm {arm}");
            assert_eq!(out, payload);
        }

        // top and bottom alone are not enough
        let mut drv = TestDriver::new(&[
            ("step 3 password", "step #3 password"),
            ("step 1 password", "step #1 password"),
        ]);
        let mut out = Vec::new();
        assert!(!vault.unlock(&mut out, &mut drv).unwrap());
    }

    #[test]
    fn dnssec_five_of_seven_threshold() {
        let fixture = dnssec_fixture();
        let mut locker = TestDriver::default();
        let (vault, payload) = lock_vault(&fixture.config, &mut locker);

        // five distinct keys succeed
        let mut drv = fixture.driver_with_keys(&[0, 2, 3, 5, 6]);
        let mut out = Vec::new();
        assert!(vault.unlock(&mut out, &mut drv).unwrap());
        assert_eq!(out, payload);

        // four keys leave the root skipped
        let mut drv = fixture.driver_with_keys(&[0, 1, 2, 3]);
        let mut out = Vec::new();
        assert!(!vault.unlock(&mut out, &mut drv).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn dnssec_multipass_accumulates_one_key_at_a_time() {
        let fixture = dnssec_fixture();
        let mut locker = TestDriver::default();
        let (vault, payload) = lock_vault(&fixture.config, &mut locker);

        let mut drv = TestDriver::default();
        let mut out = Vec::new();
        for pass in 0..7 {
            // each pass holds exactly one key; earlier branches survive as
            // cached materials
            drv.secrets.clear();
            fixture.add_key(&mut drv, pass);

            let unlocked = vault.unlock(&mut out, &mut drv).unwrap();
            if pass < 4 {
                assert!(!unlocked, "pass {pass} opened too early");
                assert!(out.is_empty());
            } else {
                assert!(unlocked, "pass {pass} failed to open");
                break;
            }
        }
        assert_eq!(out, payload);
    }

    #[test]
    fn acme_msp_minimal_and_unsatisfying_sets() {
        let fixture = acme_bank_fixture();
        let mut locker = TestDriver::new_from(&fixture.all_secrets);
        let (vault, payload) = lock_vault(&fixture.config, &mut locker);

        for set in fixture.minimal_sets() {
            let mut drv = TestDriver::new_from(&set);
            let mut out = Vec::new();
            assert!(vault.unlock(&mut out, &mut drv).unwrap(), "{set:?}");
            assert_eq!(out, payload);
        }

        for set in fixture.unsatisfying_sets() {
            let mut drv = TestDriver::new_from(&set);
            let mut out = Vec::new();
            assert!(!vault.unlock(&mut out, &mut drv).unwrap(), "{set:?}");
            assert!(out.is_empty());
        }
    }

    #[test]
    fn digest_requires_a_locked_vault() {
        let plan = Plan::from_config(TWO_MAN_PLAN_CONFIG).unwrap();
        let vault = Vault::new(plan, "unlocked");
        assert!(matches!(vault.digest(), Err(VaultError::NotLocked)));
    }

    #[test]
    fn marshal_roundtrip_preserves_digest() {
        let mut locker = TestDriver::new(&[("op 1 secret", "key #1"), ("op 2 secret", "key #2")]);
        let (vault, _) = lock_vault(TWO_MAN_PLAN_CONFIG, &mut locker);

        let mut w = Writer::new();
        vault.encode(&mut w);
        let data = w.into_bytes();

        let mut r = Reader::new(&data);
        let parsed = Vault::decode(&mut r).unwrap();
        r.finish().unwrap();

        assert_eq!(parsed, vault);
        assert_eq!(parsed.digest().unwrap(), vault.digest().unwrap());
    }

    #[test]
    fn locking_twice_is_rejected() {
        let mut drv = TestDriver::new(&[("op 1 secret", "key #1"), ("op 2 secret", "key #2")]);
        let (mut vault, _) = lock_vault(TWO_MAN_PLAN_CONFIG, &mut drv);

        let err = vault.lock(&mut &b"again"[..], &mut drv).unwrap_err();
        assert!(matches!(err, VaultError::AlreadyLocked));
    }

    #[test]
    fn lock_fails_fast_on_missing_dual_secret() {
        let plan = Plan::from_config(TWO_MAN_PLAN_CONFIG).unwrap();
        let mut vault = Vault::new(plan, "");
        let mut drv = TestDriver::new(&[("op 1 secret", "key #1")]);

        let err = vault.lock(&mut &b"payload"[..], &mut drv).unwrap_err();
        assert!(matches!(err, VaultError::LockSecretUnavailable(_)));
        assert!(vault.payload().is_none());
    }
}
