//! Directed drainage graph and upstream closure

use crate::hydrofabric::schema::HydrofabricSchema;
use geofabric_core::{FeatureCollection, Result};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Drainage network as an adjacency map from each node to the nodes that
/// drain directly into it.
///
/// Nodes are segment (or basin) identifiers; an edge `u -> d` means `u`
/// drains into `d`. Built fresh for each run and never persisted.
#[derive(Debug, Clone, Default)]
pub struct DrainageGraph {
    upstream: HashMap<i64, Vec<i64>>,
    nodes: HashSet<i64>,
    edge_count: usize,
}

impl DrainageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from a river layer under `schema`.
    ///
    /// Only segments that take part in at least one edge become nodes, so a
    /// lone segment with no links is absent from the graph.
    pub fn from_rivers(rivers: &FeatureCollection, schema: &HydrofabricSchema) -> Result<Self> {
        let mut graph = Self::new();
        for (index, feature) in rivers.iter().enumerate() {
            let id = schema.river_id(feature, index)?;
            for (up, down) in schema.edges(id, feature) {
                graph.add_edge(up, down);
            }
        }
        debug!(
            "Built {} drainage graph: {} nodes, {} edges",
            schema.name,
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Add `upstream -> downstream`, ignoring duplicates.
    pub fn add_edge(&mut self, upstream: i64, downstream: i64) {
        self.nodes.insert(upstream);
        self.nodes.insert(downstream);
        let parents = self.upstream.entry(downstream).or_default();
        if !parents.contains(&upstream) {
            parents.push(upstream);
            self.edge_count += 1;
        }
    }

    pub fn contains(&self, node: i64) -> bool {
        self.nodes.contains(&node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Nodes draining directly into `node`.
    pub fn direct_upstream(&self, node: i64) -> &[i64] {
        self.upstream.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All ancestors of `outlet` plus the outlet itself.
    ///
    /// An outlet that is not in the graph yields an empty set and a warning.
    /// Cycles in malformed input terminate through the visited set.
    pub fn upstream_closure(&self, outlet: i64) -> UpstreamClosure {
        if !self.contains(outlet) {
            warn!("Basin ID {} not found in the river network", outlet);
            return UpstreamClosure {
                outlet,
                members: BTreeSet::new(),
                outlet_in_graph: false,
            };
        }

        let mut visited = BTreeSet::from([outlet]);
        let mut queue = VecDeque::from([outlet]);
        while let Some(node) = queue.pop_front() {
            for &parent in self.direct_upstream(node) {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        UpstreamClosure {
            outlet,
            members: visited,
            outlet_in_graph: true,
        }
    }
}

/// Result of an upstream-closure query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamClosure {
    pub outlet: i64,
    /// Sorted member identifiers
    pub members: BTreeSet<i64>,
    /// `false` when the outlet was missing and `members` is empty
    pub outlet_in_graph: bool,
}

impl UpstreamClosure {
    pub fn contains(&self, id: i64) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
