//! Plans: the policy graph serialized as a canonical node list.
//!
//! `nodes[0]` is the root; the rest follow in reverse depth-first order.
//! Plans are immutable once built, except that seals may be appended.

use crate::config::{self, ConfigError};
use crate::crypto::{hmac_sha256, random_bytes};
use crate::dag::GraphError;
use crate::graph::Graph;
use crate::node::Node;
use crate::seal::{Seal, SealError, Sealer};
use crate::wire::{Reader, WireError, Writer};

pub const NONCE_SIZE: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub nonce: Vec<u8>,
    comment: String,
    pub nodes: Vec<Node>,
    seals: Vec<Seal>,
}

impl Plan {
    /// Materialize a plan from a built graph.
    pub fn new(graph: &mut Graph, comment: impl Into<String>) -> Result<Self, GraphError> {
        Ok(Self {
            nonce: random_bytes::<NONCE_SIZE>().to_vec(),
            comment: comment.into(),
            nodes: graph.nodes()?,
            seals: Vec::new(),
        })
    }

    /// Parse config text and build the plan it describes.
    pub fn from_config(data: &str) -> Result<Self, ConfigError> {
        let cfg = config::PlanConfig::parse(data)?;
        let mut graph = crate::builder::build(&cfg)?;
        let comment = cfg.comment.clone();
        Ok(Self::new(&mut graph, comment)?)
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// `HMAC-SHA-256(nonce, root.digest ‖ comment ‖ seals…)`
    pub fn digest(&self) -> Vec<u8> {
        let root = self.nodes[0].digest();
        let seal_digests: Vec<Vec<u8>> = self.seals.iter().map(Seal::digest).collect();

        let mut parts: Vec<&[u8]> = vec![&root, self.comment.as_bytes()];
        parts.extend(seal_digests.iter().map(Vec::as_slice));
        hmac_sha256(&self.nonce, &parts)
    }

    /// Rebuild the policy graph from the node list.
    pub fn graph(&self) -> Result<Graph, GraphError> {
        Graph::build(&self.nodes)
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
        let root = self.nodes[0].digest();
        let mut data = Vec::with_capacity(self.nonce.len() + root.len() + self.comment.len());
        data.extend_from_slice(&self.nonce);
        data.extend_from_slice(&root);
        data.extend_from_slice(self.comment.as_bytes());
        data
    }

    /// Walk the rebuilt graph breadth-first, handing each vertex's node to
    /// the callback.
    pub fn bfs<E: From<GraphError>>(
        &self,
        mut f: impl FnMut(&Node) -> Result<(), E>,
    ) -> Result<(), E> {
        let graph = self.graph()?;
        // Graph::build inserts vertices in node-list order, so the handle
        // index doubles as the node index.
        graph.bfs(|v| f(&self.nodes[v.index()]))
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        w.put_bytes(&self.nonce);
        w.put_str(&self.comment);
        w.put_u32(self.nodes.len() as u32);
        for node in &self.nodes {
            node.encode(w);
        }
        w.put_u32(self.seals.len() as u32);
        for seal in &self.seals {
            seal.encode(w);
        }
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let nonce = r.bytes()?;
        let comment = r.string()?;

        let node_count = r.u32()? as usize;
        let mut nodes = Vec::with_capacity(node_count.min(4096));
        for _ in 0..node_count {
            nodes.push(Node::decode(r)?);
        }

        let seal_count = r.u32()? as usize;
        let mut seals = Vec::with_capacity(seal_count.min(64));
        for _ in 0..seal_count {
            seals.push(Seal::decode(r)?);
        }

        if nodes.is_empty() {
            return Err(WireError::InvalidLength);
        }

        Ok(Self {
            nonce,
            comment,
            nodes,
            seals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{TWO_MAN_PLAN_CONFIG, openpgp_keypair};

    fn roundtrip(plan: &Plan) -> Plan {
        let mut w = Writer::new();
        plan.encode(&mut w);
        let data = w.into_bytes();

        let mut r = Reader::new(&data);
        let parsed = Plan::decode(&mut r).unwrap();
        r.finish().unwrap();
        parsed
    }

    #[test]
    fn build_from_config_orders_nodes_root_first() {
        let plan = Plan::from_config(TWO_MAN_PLAN_CONFIG).unwrap();
        assert_eq!(plan.comment(), "Two-man rule plan");

        let comments: Vec<&str> = plan.nodes.iter().map(Node::comment).collect();
        assert_eq!(
            comments,
            [
                "",                // [secretbox "master key"]
                "operator 1 key",  // [secretbox "op 1 key"]
                "operator 2 key",  // [secretbox "op 2 key"]
                "op 1 secret",     // [password "op 1 password"]
                "op 2 secret",     // [password "op 2 password"]
                "",                // [material "op 1 material"]
                "",                // [material "op 2 material"]
            ]
        );
    }

    #[test]
    fn marshal_roundtrip_preserves_digest() {
        let plan = Plan::from_config(TWO_MAN_PLAN_CONFIG).unwrap();
        let parsed = roundtrip(&plan);
        assert_eq!(parsed, plan);
        assert_eq!(parsed.digest(), plan.digest());
    }

    #[test]
    fn adding_a_seal_changes_the_digest() {
        let mut plan = Plan::from_config(TWO_MAN_PLAN_CONFIG).unwrap();
        let before = plan.digest();

        let (signer, _) = openpgp_keypair("sealer@example.com");
        plan.add_seal(&signer).unwrap();
        assert_ne!(plan.digest(), before);

        // the seal survives serialization and still verifies
        let parsed = roundtrip(&plan);
        assert_eq!(parsed.digest(), plan.digest());
        parsed.seals()[0].check(&parsed.seal_data()).unwrap();
    }

    #[test]
    fn mutating_fields_changes_the_digest() {
        let plan = Plan::from_config(TWO_MAN_PLAN_CONFIG).unwrap();
        let base = plan.digest();

        let mut other = plan.clone();
        other.comment = "tampered".into();
        assert_ne!(other.digest(), base);

        let mut other = plan.clone();
        other.nonce = vec![0u8; NONCE_SIZE];
        assert_ne!(other.digest(), base);
    }

    #[test]
    fn bfs_visits_root_first_parents_before_children() {
        let plan = Plan::from_config(TWO_MAN_PLAN_CONFIG).unwrap();
        let mut order = Vec::new();
        plan.bfs(|node| -> Result<(), GraphError> {
            order.push(node.comment().to_string());
            Ok(())
        })
        .unwrap();

        assert_eq!(
            order,
            [
                "",
                "operator 1 key",
                "operator 2 key",
                "op 1 secret",
                "",
                "op 2 secret",
                "",
            ]
        );
    }
}
