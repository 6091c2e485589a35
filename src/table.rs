//! Forwarding metrics towards several targets at once.

use crate::{EddEngine, EddResult, EdgeId, Error, RoadGraph, ShortestPaths, VertexId};
use log::{info, warn};

/// The EDD of a road graph towards one target.
#[derive(Clone, Debug)]
pub struct ForwardingTableEntry {
    target: VertexId,
    graph: Option<RoadGraph>,
    stale: bool,
}

impl ForwardingTableEntry {
    /// The target intersection.
    pub fn target(&self) -> VertexId {
        self.target
    }

    /// The graph holding the EDD towards the target, once computed.
    pub fn graph(&self) -> Option<&RoadGraph> {
        self.graph.as_ref()
    }

    /// Whether the last recomputation failed, leaving older results in place.
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

/// Per-target copies of a road graph with EDD computed towards each target.
#[derive(Clone, Debug, Default)]
pub struct ForwardingTable {
    entries: Vec<ForwardingTableEntry>,
}

impl ForwardingTable {
    /// Creates a table for the given targets, without any results yet.
    pub fn new(targets: impl IntoIterator<Item = VertexId>) -> Self {
        let mut table = Self::default();
        for target in targets {
            table.add_target(target);
        }
        table
    }

    /// Adds a target, returning `false` if it was already present.
    pub fn add_target(&mut self, target: VertexId) -> bool {
        if self.entry(target).is_some() {
            return false;
        }
        self.entries.push(ForwardingTableEntry {
            target,
            graph: None,
            stale: false,
        });
        true
    }

    /// The targets, in the order they were added.
    pub fn targets(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.entries.iter().map(|entry| entry.target)
    }

    /// The entry for a target.
    pub fn entry(&self, target: VertexId) -> Option<&ForwardingTableEntry> {
        self.entries.iter().find(|entry| entry.target == target)
    }

    /// Recomputes the EDD towards every target on a fresh copy of `graph`.
    ///
    /// A failure for one target does not stop the others; the failed
    /// targets keep their previous results, are marked stale and are returned.
    pub fn recompute(
        &mut self,
        engine: &EddEngine,
        graph: &RoadGraph,
        paths: Option<&ShortestPaths>,
    ) -> Vec<(VertexId, Error)> {
        let mut failed = vec![];
        for entry in &mut self.entries {
            let mut copy = graph.clone();
            match engine.compute_edd(&mut copy, entry.target, paths) {
                Ok(()) => {
                    entry.graph = Some(copy);
                    entry.stale = false;
                }
                Err(err) => {
                    warn!("EDD towards {:?} failed: {}", entry.target, err);
                    entry.stale = true;
                    failed.push((entry.target, err));
                }
            }
        }
        info!(
            "recomputed EDD for {} targets, {} failed",
            self.entries.len(),
            failed.len()
        );
        failed
    }

    /// The EDD of an edge towards a target.
    pub fn edge_edd(&self, target: VertexId, edge: EdgeId) -> Option<EddResult> {
        let graph = self.entry(target)?.graph.as_ref()?;
        graph.contains_edge(edge).then(|| *graph.edge(edge).edd())
    }

    /// The EDD of a packet waiting at an intersection towards a target.
    pub fn vertex_edd(&self, target: VertexId, vertex: VertexId) -> Option<EddResult> {
        let graph = self.entry(target)?.graph.as_ref()?;
        graph.contains_vertex(vertex).then(|| *graph.vertex(vertex).edd())
    }
}
