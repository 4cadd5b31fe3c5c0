//! The policy graph: a DAG of cryptexes, secrets, and markers, plus the
//! digest and nonce caches that give every vertex a content-addressed node
//! identity.

use crate::crypto::random_bytes;
use crate::cryptex::Cryptex;
use crate::dag::{Dag, GraphError, Vertex};
use crate::node::{self, Node, NodeValue};
use std::collections::HashMap;

pub struct Graph {
    dag: Dag<NodeValue>,
    digests: HashMap<Vertex, Vec<u8>>,
    nonces: HashMap<Vertex, Vec<u8>>,
}

impl Graph {
    pub fn new(cptx: Cryptex) -> Self {
        Self {
            dag: Dag::new_with_root(NodeValue::Cryptex(cptx)),
            digests: HashMap::new(),
            nonces: HashMap::new(),
        }
    }

    pub fn root(&self) -> Vertex {
        self.dag.root()
    }

    pub fn len(&self) -> usize {
        self.dag.len()
    }

    pub fn value(&self, v: Vertex) -> &NodeValue {
        self.dag.value(v)
    }

    pub fn edges(&self, v: Vertex) -> &[Vertex] {
        self.dag.edges(v)
    }

    /// Cached node digest for a vertex. Populated by `nodes()` and by
    /// `build()`.
    pub fn digest_of(&self, v: Vertex) -> Option<&[u8]> {
        self.digests.get(&v).map(Vec::as_slice)
    }

    /// Insert a vertex with a parent edge from `from`.
    pub fn add(&mut self, value: NodeValue, from: Vertex) -> Result<Vertex, GraphError> {
        let to = self.dag.add(value);
        self.dag.add_edge(to, from)?;
        Ok(to)
    }

    pub fn add_vertex(&mut self, value: NodeValue) -> Vertex {
        self.dag.add(value)
    }

    pub fn add_edge(&mut self, to: Vertex, from: Vertex) -> Result<(), GraphError> {
        self.dag.add_edge(to, from)
    }

    pub fn bfs<E>(&self, f: impl FnMut(Vertex) -> Result<(), E>) -> Result<(), E> {
        self.dag.bfs(f)
    }

    pub fn dfs<E>(&self, f: impl FnMut(Vertex) -> Result<(), E>) -> Result<(), E> {
        self.dag.dfs(f)
    }

    pub fn reverse_dfs<E>(&self, f: impl FnMut(Vertex) -> Result<(), E>) -> Result<(), E> {
        self.dag.reverse_dfs(f)
    }

    /// Materialize the graph as nodes in reverse depth-first order, root
    /// first. Digests and nonces are cached so repeated calls are stable.
    pub fn nodes(&mut self) -> Result<Vec<Node>, GraphError> {
        let mut order = Vec::with_capacity(self.dag.len());
        self.dag
            .reverse_dfs(|v| -> Result<(), GraphError> {
                order.push(v);
                Ok(())
            })
            .expect("walk is infallible");

        let mut nodes = Vec::with_capacity(order.len());
        for v in order {
            let node = self.node(v)?;
            let digest = node.digest();
            self.digests.insert(v, digest);
            self.nonces.insert(v, node.nonce.clone());
            nodes.insert(0, node); // push front so the root lands first
        }
        Ok(nodes)
    }

    fn node(&self, v: Vertex) -> Result<Node, GraphError> {
        let nonce = match self.nonces.get(&v) {
            Some(nonce) => nonce.clone(),
            None => self.gen_nonce(),
        };

        let mut inputs = Vec::with_capacity(self.dag.edges(v).len());
        for &child in self.dag.edges(v) {
            let digest = self
                .digests
                .get(&child)
                .ok_or(GraphError::MissingVertex)?;
            inputs.push(digest.clone());
        }

        Ok(Node {
            nonce,
            inputs,
            value: self.dag.value(v).clone(),
        })
    }

    /// Node nonces are unique within one graph; collisions are re-rolled.
    fn gen_nonce(&self) -> Vec<u8> {
        loop {
            let nonce = random_bytes::<{ node::NONCE_SIZE }>().to_vec();
            if !self.nonces.values().any(|n| *n == nonce) {
                return nonce;
            }
        }
    }

    /// Rebuild a graph from a serialized node list: all vertices first, then
    /// edges resolved through a digest map.
    pub fn build(nodes: &[Node]) -> Result<Self, GraphError> {
        let root_node = nodes.first().ok_or(GraphError::MissingVertex)?;
        let NodeValue::Cryptex(root_cptx) = &root_node.value else {
            return Err(GraphError::RootNotCryptex);
        };

        let mut graph = Self::new(root_cptx.clone());
        let root = graph.root();
        let root_digest = root_node.digest();
        graph.digests.insert(root, root_digest.clone());
        graph.nonces.insert(root, root_node.nonce.clone());

        let mut verts: HashMap<Vec<u8>, Vertex> = HashMap::new();
        verts.insert(root_digest, root);

        for node in &nodes[1..] {
            let v = graph.dag.add(node.value.clone());
            let digest = node.digest();
            graph.digests.insert(v, digest.clone());
            graph.nonces.insert(v, node.nonce.clone());
            verts.insert(digest, v);
        }

        for node in nodes {
            let from = verts[&node.digest()];
            for input in &node.inputs {
                let to = *verts.get(input).ok_or(GraphError::MissingEdgeTarget)?;
                graph.dag.add_edge(to, from)?;
            }
        }

        Ok(graph)
    }
}
