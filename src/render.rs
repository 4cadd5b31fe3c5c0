//! Textual rendering of plan and vault graphs.
//!
//! Produces a git-log-style multicolumn drawing: `*` (or `S` for solved
//! vault nodes) marks a node, `|` carries a column, `/` and `\` contract
//! and expand, `_` carries a lateral merge, `.` turns a corner. The walk is
//! breadth-first; per node it emits inbound contraction rows, the target
//! row (with a detail column), and an outbound expansion row. Contractions
//! prefer adjacent column pairs, then nearly-adjacent, then non-adjacent.

use crate::dag::GraphError;
use crate::node::{Node, NodeValue};
use crate::plan::Plan;

pub struct RenderNode {
    pub id: Vec<u8>,
    pub edges: Vec<Vec<u8>>,
    pub marker: char,
    pub detail: String,
}

/// Render a plan's graph with `*` node markers and digest details.
pub fn plan_graph(plan: &Plan) -> Result<Vec<String>, GraphError> {
    let mut nodes = Vec::with_capacity(plan.nodes.len());
    plan.bfs(|node| -> Result<(), GraphError> {
        nodes.push(RenderNode {
            id: node.digest(),
            edges: node.inputs.clone(),
            marker: '*',
            detail: node_detail(node),
        });
        Ok(())
    })?;
    lines(&nodes)
}

/// Detail column: short digest, bracketed type, comment.
pub fn node_detail(node: &Node) -> String {
    let id = node.digest();
    let kind = match &node.value {
        NodeValue::Cryptex(c) => c.kind(),
        NodeValue::Secret(s) => s.kind(),
        NodeValue::Marker(_) => "material",
    };
    format!("{} {:<12} {}", hex::encode(&id[..8]), format!("[{kind}]"), node.comment())
}

pub fn lines(nodes: &[RenderNode]) -> Result<Vec<String>, GraphError> {
    let root = nodes.first().ok_or(GraphError::MissingVertex)?;
    let mut columns = Columns(vec![root.id.clone()]);

    let mut rows: Vec<Row> = Vec::new();
    for node in nodes {
        rows.extend(columns.inbound_edge_rows(&node.id));
        rows.extend(columns.target_rows(node)?);

        let reversed: Vec<Vec<u8>> = node.edges.iter().rev().cloned().collect();
        rows.extend(columns.outbound_edge_rows(&node.id, &reversed)?);
    }

    let width = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
    Ok(rows
        .into_iter()
        .map(|mut row| {
            row.cells.resize(width, ' ');
            let mut line: String = row.cells.into_iter().collect();
            line.push_str(&row.detail);
            line
        })
        .collect())
}

struct Row {
    cells: Vec<char>,
    detail: String,
}

impl Row {
    fn new(cells: Vec<char>) -> Self {
        Self {
            cells,
            detail: String::new(),
        }
    }
}

/// The active columns: one pending child digest per drawing column.
struct Columns(Vec<Vec<u8>>);

impl Columns {
    fn index(&self, id: &[u8]) -> Result<usize, GraphError> {
        self.0
            .iter()
            .position(|col| col == id)
            .ok_or(GraphError::MissingVertex)
    }

    // | |_|/   then   |/| |
    fn non_adjacent(&self, id: &[u8]) -> bool {
        let cols = &self.0;
        if cols.len() < 3 {
            return false;
        }
        cols.iter().take(cols.len() - 3).enumerate().any(|(i, x)| {
            cols[i + 3..]
                .iter()
                .any(|y| x == id && y == id)
        })
    }

    // | |/   then   |/|
    fn nearly_adjacent(&self, id: &[u8]) -> bool {
        let cols = &self.0;
        if cols.len() <= 2 {
            return false;
        }
        let mut x = &cols[0];
        for y in &cols[2..] {
            if x == id && y == id {
                return true;
            }
            x = y;
        }
        false
    }

    // |/
    fn adjacent(&self, id: &[u8]) -> bool {
        let cols = &self.0;
        cols.len() > 1 && cols.windows(2).any(|w| w[0] == id && w[1] == id)
    }

    /// Drop the last duplicate column of `id`, returning the first and last
    /// occurrence indexes before removal.
    fn contract(&mut self, id: &[u8]) -> (usize, usize) {
        let mut first = usize::MAX;
        let mut last = 0;
        for (i, col) in self.0.iter().enumerate() {
            if col == id {
                if first == usize::MAX {
                    first = i;
                }
                last = i;
            }
        }
        self.0.remove(last);
        (first, last)
    }

    fn inbound_edge_rows(&mut self, id: &[u8]) -> Vec<Row> {
        let mut rows = Vec::new();
        loop {
            if self.non_adjacent(id) {
                let (to, from) = self.contract(id);
                rows.push(self.lateral_row(to, from));
                rows.push(self.contraction_row(to, false));
            } else if self.nearly_adjacent(id) {
                let (to, _) = self.contract(id);
                rows.push(self.contraction_row(to + 1, true));
                rows.push(self.double_contraction_row(to));
            } else if self.adjacent(id) {
                let (to, _) = self.contract(id);
                rows.push(self.contraction_row(to, true));
            } else {
                return rows;
            }
        }
    }

    fn contraction_row(&self, idx: usize, shift_left: bool) -> Row {
        let mut cells = Vec::new();
        for i in 0..self.0.len() {
            if i < idx {
                cells.extend(['|', ' ']);
            } else if i == idx {
                cells.extend(['|', '/']);
            } else if shift_left {
                cells.extend([' ', '/']);
            } else {
                cells.extend(['|', ' ']);
            }
        }
        Row::new(cells)
    }

    fn lateral_row(&self, idx_to: usize, idx_from: usize) -> Row {
        let mut cells = Vec::new();
        for i in 0..self.0.len() {
            if i <= idx_to {
                cells.extend(['|', ' ']);
            } else if i == idx_from - 1 {
                cells.extend(['|', '/']);
            } else if i < idx_from {
                cells.extend(['|', '_']);
            } else {
                cells.extend([' ', '/']);
            }
        }
        Row::new(cells)
    }

    fn double_contraction_row(&self, idx: usize) -> Row {
        let mut cells = Vec::new();
        for i in 0..self.0.len() {
            if i < idx {
                cells.extend(['|', ' ']);
            } else if i == idx {
                cells.extend(['|', '/']);
            } else if i == idx + 1 {
                cells.extend(['|', ' ']);
            } else {
                cells.extend(['/', ' ']);
            }
        }
        Row::new(cells)
    }

    fn target_rows(&self, node: &RenderNode) -> Result<Vec<Row>, GraphError> {
        let idx = self.index(&node.id)?;
        let edge_count = node.edges.len();
        let mut rows = Vec::new();

        if edge_count > 2 && idx != self.0.len() - 1 {
            // make room for the corner and its arms
            rows.push(self.half_shift_row(idx));
            for spaces in 0..edge_count - 2 {
                rows.push(self.shift_row(idx, spaces));
            }
        }

        let mut row = self.target_row(idx, node.marker, edge_count);
        row.detail = node.detail.clone();
        rows.push(row);
        Ok(rows)
    }

    fn half_shift_row(&self, idx: usize) -> Row {
        let mut cells = Vec::new();
        for i in 0..self.0.len() {
            if i > idx + 1 {
                cells.extend(['\\', ' ']);
            } else {
                cells.extend(['|', ' ']);
            }
        }
        Row::new(cells)
    }

    fn shift_row(&self, idx: usize, spaces: usize) -> Row {
        let mut cells = Vec::new();
        for i in 0..self.0.len() {
            if i < idx {
                cells.extend(['|', ' ']);
            } else if i == idx {
                cells.extend(['|', ' ']);
                cells.extend(std::iter::repeat_n(' ', spaces));
            } else {
                cells.extend([' ', '\\']);
            }
        }
        Row::new(cells)
    }

    fn target_row(&self, idx: usize, marker: char, edge_count: usize) -> Row {
        let mut cells = Vec::new();
        for i in 0..self.0.len() {
            if i < idx {
                cells.extend(['|', ' ']);
            } else if i == idx {
                if edge_count < 3 {
                    cells.extend([marker, ' ']);
                    continue;
                }
                cells.extend([marker, '-']);
                for _ in 0..edge_count - 3 {
                    cells.extend(['-', '-']);
                }
                cells.extend(['.', ' ']);
            } else if i == idx + 1 && edge_count < 3 {
                cells.extend(['|', ' ']);
            } else if edge_count < 2 {
                cells.extend(['|', ' ']);
            } else {
                cells.extend(['\\', ' ']);
            }
        }
        Row::new(cells)
    }

    fn outbound_edge_rows(
        &mut self,
        id: &[u8],
        edges: &[Vec<u8>],
    ) -> Result<Vec<Row>, GraphError> {
        let idx = self.index(id)?;
        self.expand(idx, edges);

        let mut rows = Vec::new();
        match edges.len() {
            0 => {
                if self.0.len() > idx {
                    rows.push(self.sink_row(idx));
                }
            }
            1 => {}
            count => rows.push(self.expansion_row(idx, count)),
        }
        Ok(rows)
    }

    fn sink_row(&self, idx: usize) -> Row {
        let mut cells = Vec::new();
        for i in 0..self.0.len() {
            if i < idx {
                cells.extend(['|', ' ']);
            } else {
                cells.extend([' ', '/']);
            }
        }
        Row::new(cells)
    }

    fn expansion_row(&self, idx: usize, _edge_count: usize) -> Row {
        let mut cells = Vec::new();
        for i in 0..self.0.len() {
            if i < idx {
                cells.extend(['|', ' ']);
            } else if i == idx {
                cells.extend(['|', '\\']);
            } else if i != self.0.len() - 1 {
                cells.extend([' ', '\\']);
            }
        }
        Row::new(cells)
    }

    /// Replace the column at `idx` with the node's outbound edges.
    fn expand(&mut self, idx: usize, edges: &[Vec<u8>]) {
        self.0.splice(idx..=idx, edges.iter().cloned());
    }
}
