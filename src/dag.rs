//! Directed acyclic graph with an arena of index handles.
//!
//! Vertices are identified by `Vertex` handles, not by value: two vertices
//! may hold equal payloads, and parallel edges between the same pair are
//! permitted and meaningful. Every edge insertion re-runs a three-color
//! depth-first cycle check from the root.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("cycle detected")]
    Cycle,

    #[error("to vertex not found")]
    MissingTo,

    #[error("from vertex not found")]
    MissingFrom,

    #[error("vertex missing in DAG")]
    MissingVertex,

    #[error("edge names a node missing from the list")]
    MissingEdgeTarget,

    #[error("root node is not a cryptex")]
    RootNotCryptex,
}

/// Handle to a vertex in one `Dag`. Handles from different graphs must not
/// be mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vertex(usize);

impl Vertex {
    pub fn index(self) -> usize {
        self.0
    }
}

pub struct Dag<T> {
    values: Vec<T>,
    edges: Vec<Vec<Vertex>>,
    root: Vertex,
}

impl<T> Dag<T> {
    pub fn new_with_root(value: T) -> Self {
        Self {
            values: vec![value],
            edges: vec![Vec::new()],
            root: Vertex(0),
        }
    }

    pub fn root(&self) -> Vertex {
        self.root
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn add(&mut self, value: T) -> Vertex {
        self.values.push(value);
        self.edges.push(Vec::new());
        Vertex(self.values.len() - 1)
    }

    pub fn value(&self, v: Vertex) -> &T {
        &self.values[v.0]
    }

    /// Ordered out-edges (children) of a vertex.
    pub fn edges(&self, v: Vertex) -> &[Vertex] {
        &self.edges[v.0]
    }

    /// Find the first vertex holding an equal value.
    pub fn get_by_value(&self, value: &T) -> Option<Vertex>
    where
        T: PartialEq,
    {
        self.values.iter().position(|v| v == value).map(Vertex)
    }

    /// Insert a directed edge from `from` down to `to`.
    pub fn add_edge(&mut self, to: Vertex, from: Vertex) -> Result<(), GraphError> {
        if to.0 >= self.values.len() {
            return Err(GraphError::MissingTo);
        }
        if from.0 >= self.values.len() {
            return Err(GraphError::MissingFrom);
        }

        self.edges[from.0].push(to);
        if self.cyclic_check().is_err() {
            self.edges[from.0].pop();
            return Err(GraphError::Cycle);
        }
        Ok(())
    }

    fn cyclic_check(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn visit<T>(g: &Dag<T>, v: Vertex, colors: &mut [Color]) -> Result<(), GraphError> {
            match colors[v.0] {
                Color::Black => return Ok(()),
                Color::Gray => return Err(GraphError::Cycle),
                Color::White => {}
            }

            colors[v.0] = Color::Gray;
            for &child in &g.edges[v.0] {
                visit(g, child, colors)?;
            }
            colors[v.0] = Color::Black;
            Ok(())
        }

        let mut colors = vec![Color::White; self.values.len()];
        visit(self, self.root, &mut colors)
    }

    /// Breadth-first walk from the root: parents before children, each
    /// vertex visited at most once. An error from the callback aborts the
    /// walk and propagates.
    pub fn bfs<E>(&self, mut f: impl FnMut(Vertex) -> Result<(), E>) -> Result<(), E> {
        let mut queued = vec![false; self.values.len()];
        let mut queue = std::collections::VecDeque::new();

        queued[self.root.0] = true;
        queue.push_back(self.root);

        while let Some(v) = queue.pop_front() {
            f(v)?;
            for &child in &self.edges[v.0] {
                if !queued[child.0] {
                    queued[child.0] = true;
                    queue.push_back(child);
                }
            }
        }
        Ok(())
    }

    /// Preorder depth-first walk from the root.
    pub fn dfs<E>(&self, mut f: impl FnMut(Vertex) -> Result<(), E>) -> Result<(), E> {
        let mut visited = vec![false; self.values.len()];
        self.dfs_from(self.root, &mut visited, &mut f)
    }

    fn dfs_from<E>(
        &self,
        v: Vertex,
        visited: &mut [bool],
        f: &mut impl FnMut(Vertex) -> Result<(), E>,
    ) -> Result<(), E> {
        visited[v.0] = true;
        f(v)?;
        for &child in &self.edges[v.0] {
            if !visited[child.0] {
                self.dfs_from(child, visited, f)?;
            }
        }
        Ok(())
    }

    /// Postorder depth-first walk: children before parents. The root is
    /// visited last.
    pub fn reverse_dfs<E>(&self, mut f: impl FnMut(Vertex) -> Result<(), E>) -> Result<(), E> {
        let mut visited = vec![false; self.values.len()];
        self.rdfs_from(self.root, &mut visited, &mut f)
    }

    fn rdfs_from<E>(
        &self,
        v: Vertex,
        visited: &mut [bool],
        f: &mut impl FnMut(Vertex) -> Result<(), E>,
    ) -> Result<(), E> {
        visited[v.0] = true;
        for &child in &self.edges[v.0] {
            if !visited[child.0] {
                self.rdfs_from(child, visited, f)?;
            }
        }
        f(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // chain: a -> b -> c
    fn chain() -> Dag<&'static str> {
        let mut g = Dag::new_with_root("a");
        let b = g.add("b");
        let c = g.add("c");
        g.add_edge(b, g.root()).unwrap();
        g.add_edge(c, b).unwrap();
        g
    }

    // diamond: a -> {b, c} -> d
    fn diamond() -> Dag<&'static str> {
        let mut g = Dag::new_with_root("a");
        let b = g.add("b");
        let c = g.add("c");
        let d = g.add("d");
        g.add_edge(b, g.root()).unwrap();
        g.add_edge(c, g.root()).unwrap();
        g.add_edge(d, b).unwrap();
        g.add_edge(d, c).unwrap();
        g
    }

    // binary tree: a -> {b -> {d, e}, c -> {f, g}}
    fn binary_tree() -> Dag<&'static str> {
        let mut g = Dag::new_with_root("a");
        let b = g.add("b");
        let c = g.add("c");
        let d = g.add("d");
        let e = g.add("e");
        let f = g.add("f");
        let h = g.add("g");
        g.add_edge(b, g.root()).unwrap();
        g.add_edge(c, g.root()).unwrap();
        g.add_edge(d, b).unwrap();
        g.add_edge(e, b).unwrap();
        g.add_edge(f, c).unwrap();
        g.add_edge(h, c).unwrap();
        g
    }

    fn collect<'a>(g: &Dag<&'a str>, walk: &str) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut f = |v: Vertex| -> Result<(), ()> {
            out.push(*g.value(v));
            Ok(())
        };
        match walk {
            "bfs" => g.bfs(&mut f).unwrap(),
            "dfs" => g.dfs(&mut f).unwrap(),
            "rdfs" => g.reverse_dfs(&mut f).unwrap(),
            _ => unreachable!(),
        }
        out
    }

    #[test]
    fn walk_orders_on_reference_graphs() {
        let g = chain();
        assert_eq!(collect(&g, "bfs"), ["a", "b", "c"]);
        assert_eq!(collect(&g, "dfs"), ["a", "b", "c"]);
        assert_eq!(collect(&g, "rdfs"), ["c", "b", "a"]);

        let g = diamond();
        assert_eq!(collect(&g, "bfs"), ["a", "b", "c", "d"]);
        assert_eq!(collect(&g, "dfs"), ["a", "b", "d", "c"]);
        assert_eq!(collect(&g, "rdfs"), ["d", "b", "c", "a"]);

        let g = binary_tree();
        assert_eq!(collect(&g, "bfs"), ["a", "b", "c", "d", "e", "f", "g"]);
        assert_eq!(collect(&g, "dfs"), ["a", "b", "d", "e", "c", "f", "g"]);
        assert_eq!(collect(&g, "rdfs"), ["d", "e", "b", "f", "g", "c", "a"]);
    }

    #[test]
    fn add_edge_rejects_cycles() {
        let mut g = Dag::new_with_root("a");
        let b = g.add("b");
        let c = g.add("c");
        g.add_edge(b, g.root()).unwrap();
        g.add_edge(c, b).unwrap();

        assert_eq!(g.add_edge(g.root(), c), Err(GraphError::Cycle));
        assert_eq!(g.add_edge(b, b), Err(GraphError::Cycle));

        // the failed insertion must not leave the edge behind
        assert_eq!(g.edges(c).len(), 0);
    }

    #[test]
    fn parallel_edges_are_preserved_in_order() {
        let mut g = Dag::new_with_root("a");
        let b = g.add("b");
        g.add_edge(b, g.root()).unwrap();
        g.add_edge(b, g.root()).unwrap();
        assert_eq!(g.edges(g.root()), &[b, b]);
    }

    #[test]
    fn callback_error_aborts_walk() {
        let g = binary_tree();
        let mut seen = 0;
        let err = g.bfs(|_| -> Result<(), &'static str> {
            seen += 1;
            if seen == 3 { Err("stop") } else { Ok(()) }
        });
        assert_eq!(err, Err("stop"));
        assert_eq!(seen, 3);
    }

    #[test]
    fn get_by_value_finds_first_match() {
        let g = diamond();
        let d = g.get_by_value(&"d").unwrap();
        assert_eq!(*g.value(d), "d");
        assert!(g.get_by_value(&"z").is_none());
    }
}
