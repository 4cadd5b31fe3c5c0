//! Reify a typed plan config into a policy graph.
//!
//! Edges are resolved by section name. A name already materialized as a
//! vertex gets a new edge to the existing vertex instead of a duplicate, so
//! shared subgraphs (a demux feeding several parents, a common branch)
//! stay shared.

use crate::config::{ConfigError, PlanConfig};
use crate::dag::Vertex;
use crate::graph::Graph;
use crate::node::{Marker, NodeValue};
use std::collections::HashMap;

pub fn build(cfg: &PlanConfig) -> Result<Graph, ConfigError> {
    let root = cfg
        .cryptex_section(&cfg.root)
        .ok_or_else(|| ConfigError::MissingRootCryptex(cfg.root.clone()))?;

    let mut graph = Graph::new(root.cryptex()?);
    let mut builder = Builder {
        cfg,
        verts: HashMap::new(),
    };

    let graph_root = graph.root();
    for edge in root.edges() {
        builder.build_edge(&mut graph, edge, graph_root)?;
    }
    Ok(graph)
}

struct Builder<'a> {
    cfg: &'a PlanConfig,
    verts: HashMap<String, Vertex>,
}

impl Builder<'_> {
    fn build_edge(
        &mut self,
        graph: &mut Graph,
        name: &str,
        from: Vertex,
    ) -> Result<(), ConfigError> {
        if let Some(&to) = self.verts.get(name) {
            graph.add_edge(to, from)?;
            return Ok(());
        }
        self.build_vertex(graph, name, from)
    }

    fn build_vertex(
        &mut self,
        graph: &mut Graph,
        name: &str,
        from: Vertex,
    ) -> Result<(), ConfigError> {
        if let Some(section) = self.cfg.cryptex_section(name) {
            let to = graph.add(NodeValue::Cryptex(section.cryptex()?), from)?;
            self.verts.insert(name.to_string(), to);

            for edge in section.edges() {
                self.build_edge(graph, edge, to)?;
            }
            return Ok(());
        }

        if let Some(secret) = self.cfg.secret_section(name) {
            let to = graph.add(NodeValue::Secret(secret?), from)?;
            self.verts.insert(name.to_string(), to);
            return Ok(());
        }

        if let Some(marker) = self.cfg.materials.get(name) {
            let to = graph.add(NodeValue::Marker(Marker::new(&marker.comment)), from)?;
            self.verts.insert(name.to_string(), to);
            return Ok(());
        }

        Err(ConfigError::MissingEdgeTarget(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{DIAMOND_PLAN_CONFIG, TWO_MAN_PLAN_CONFIG};
    use crate::node::NodeType;

    #[test]
    fn two_man_graph_has_expected_shape() {
        let cfg = PlanConfig::parse(TWO_MAN_PLAN_CONFIG).unwrap();
        let graph = build(&cfg).unwrap();

        assert_eq!(graph.len(), 7);
        assert_eq!(graph.edges(graph.root()).len(), 2);

        for &op in graph.edges(graph.root()) {
            let children = graph.edges(op);
            assert_eq!(children.len(), 2);
            assert_eq!(graph.value(children[0]).node_type(), NodeType::Secret);
            assert_eq!(graph.value(children[1]).node_type(), NodeType::Marker);
        }
    }

    #[test]
    fn diamond_shares_the_demux_vertex() {
        let cfg = PlanConfig::parse(DIAMOND_PLAN_CONFIG).unwrap();
        let graph = build(&cfg).unwrap();

        // top, mux, left, right, demux, bottom + 4 passwords + 1 material
        assert_eq!(graph.len(), 11);

        let mux = graph.edges(graph.root())[1];
        let (left, right) = (graph.edges(mux)[0], graph.edges(mux)[1]);
        assert_eq!(graph.edges(left)[1], graph.edges(right)[1]);
    }

    #[test]
    fn missing_root_cryptex_fails() {
        let cfg = PlanConfig::parse("root = nowhere\n[password \"p\"]\n").unwrap();
        assert!(matches!(
            build(&cfg),
            Err(ConfigError::MissingRootCryptex(_))
        ));
    }

    #[test]
    fn unknown_edge_name_fails() {
        let cfg =
            PlanConfig::parse("root = x\n[secretbox \"x\"]\nedge = ghost\n").unwrap();
        assert!(matches!(build(&cfg), Err(ConfigError::MissingEdgeTarget(name)) if name == "ghost"));
    }
}
