//! Cause→effect graph over the field paths of one batch.
//!
//! Every effect has at most one cause, so the graph is a forest stored as
//! parent pointers plus ordered child lists.

use std::collections::{BTreeMap, HashSet};

/// One accepted cause→effect link.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub cause: String,
    pub effect: String,
    pub confidence: f64,
    pub trigger: String,
    /// Names of the signals that produced the link
    pub signals: Vec<String>,
}

/// Why an edge was not inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRejection {
    UnknownNode,
    SelfLoop,
    /// The effect already has a recorded cause
    AlreadyCaused,
    /// The cause is a descendant of the effect
    Cycle,
}

impl EdgeRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeRejection::UnknownNode => "unknown field path",
            EdgeRejection::SelfLoop => "self-loop",
            EdgeRejection::AlreadyCaused => "effect already has a cause",
            EdgeRejection::Cycle => "would create a cycle",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    /// Node paths in batch order
    nodes: Vec<String>,
    known: HashSet<String>,
    parent: BTreeMap<String, Edge>,
    children: BTreeMap<String, Vec<String>>,
}

impl CausalGraph {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut graph = Self::default();
        for path in paths {
            let path = path.into();
            if graph.known.insert(path.clone()) {
                graph.nodes.push(path);
            }
        }
        graph
    }

    pub fn contains(&self, path: &str) -> bool {
        self.known.contains(path)
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn cause_of(&self, path: &str) -> Option<&Edge> {
        self.parent.get(path)
    }

    pub fn has_cause(&self, path: &str) -> bool {
        self.parent.contains_key(path)
    }

    /// Direct effects in insertion order
    pub fn effects_of(&self, path: &str) -> &[String] {
        self.children.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Insert an edge, rejecting self-loops, second causes and cycles.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), EdgeRejection> {
        if !self.contains(&edge.cause) || !self.contains(&edge.effect) {
            return Err(EdgeRejection::UnknownNode);
        }
        if edge.cause == edge.effect {
            return Err(EdgeRejection::SelfLoop);
        }
        if self.has_cause(&edge.effect) {
            return Err(EdgeRejection::AlreadyCaused);
        }
        if self.is_ancestor(&edge.effect, &edge.cause) {
            return Err(EdgeRejection::Cycle);
        }
        self.children
            .entry(edge.cause.clone())
            .or_default()
            .push(edge.effect.clone());
        self.parent.insert(edge.effect.clone(), edge);
        Ok(())
    }

    /// Walk parent pointers up from `node` looking for `ancestor`.
    fn is_ancestor(&self, ancestor: &str, node: &str) -> bool {
        let mut visited = HashSet::new();
        let mut current = Some(node);
        while let Some(path) = current {
            if path == ancestor {
                return true;
            }
            if !visited.insert(path) {
                return false;
            }
            current = self.parent.get(path).map(|e| e.cause.as_str());
        }
        false
    }

    /// Number of causal hops from the node's root (roots are 0)
    pub fn depth(&self, path: &str) -> u32 {
        let mut depth = 0;
        let mut current = path;
        while let Some(edge) = self.parent.get(current) {
            depth += 1;
            current = edge.cause.as_str();
        }
        depth
    }

    /// Accepted edges, ordered by effect position in the batch
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.nodes.iter().filter_map(|n| self.parent.get(n))
    }
}
