//! The road network: intersections joined by directed road segments.

use crate::delay::EdgeDelayMetrics;
use crate::edd::EddResult;
use crate::forwarding::ForwardingMetrics;
use crate::math::Point2d;
use crate::stats::TrafficStatistics;
use crate::{EdgeId, VertexId};
use cgmath::MetricSpace;
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::collections::HashSet;

/// The outgoing or incoming edges of an intersection.
pub(crate) type EdgeList = SmallVec<[EdgeId; 4]>;

/// A road network.
///
/// Cloning the graph copies the traffic statistics along with it,
/// so a clone can be used as an exclusively owned working copy.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoadGraph {
    /// The intersections.
    vertices: SlotMap<VertexId, Vertex>,
    /// The road segments.
    edges: SlotMap<EdgeId, RoadSegment>,
    /// The vertices, by index.
    vertex_order: Vec<VertexId>,
    /// The edges, by order.
    edge_order: Vec<EdgeId>,
    /// The target the EDD fields were last computed for.
    edd_target: Option<VertexId>,
}

/// A road intersection.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    /// The vertex ID.
    id: VertexId,
    /// A contiguous index into all-pairs matrices.
    index: usize,
    /// The coordinates of the intersection in m.
    position: Point2d,
    /// The edges leaving this intersection.
    edges_out: EdgeList,
    /// The edges entering this intersection.
    edges_in: EdgeList,
    /// The EDD from this intersection to the current target.
    edd: EddResult,
    /// The outgoing edges sorted by ascending EDD.
    ranking: EdgeList,
}

/// A directed road segment.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoadSegment {
    /// The edge ID.
    id: EdgeId,
    /// A contiguous index used to address the edge in a linear system.
    order: usize,
    /// The intersection the edge starts at.
    tail: VertexId,
    /// The intersection the edge ends at.
    head: VertexId,
    /// The length of the segment in m.
    length: f64,
    /// The traffic observed on the segment.
    stats: TrafficStatistics,
    /// The most recently computed delay metrics.
    delay: EdgeDelayMetrics,
    /// The most recently computed forwarding metrics.
    forwarding: ForwardingMetrics,
    /// The EDD from the tail of this edge, when carried along it, to the current target.
    edd: EddResult,
}

impl RoadGraph {
    /// Creates an empty road graph.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds an intersection at the given coordinates.
    pub fn add_vertex(&mut self, position: Point2d) -> VertexId {
        let index = self.vertex_order.len();
        let id = self.vertices.insert_with_key(|id| Vertex {
            id,
            index,
            position,
            edges_out: SmallVec::new(),
            edges_in: SmallVec::new(),
            edd: EddResult::default(),
            ranking: SmallVec::new(),
        });
        self.vertex_order.push(id);
        id
    }

    /// Adds a straight directed edge between two intersections.
    pub fn add_edge(&mut self, tail: VertexId, head: VertexId) -> EdgeId {
        let length = self.vertices[tail].position.distance(self.vertices[head].position);
        self.add_edge_with_length(tail, head, length)
    }

    /// Adds a directed edge of the given length in m between two intersections.
    pub fn add_edge_with_length(&mut self, tail: VertexId, head: VertexId, length: f64) -> EdgeId {
        let order = self.edge_order.len();
        let id = self.edges.insert_with_key(|id| RoadSegment {
            id,
            order,
            tail,
            head,
            length,
            stats: TrafficStatistics::default(),
            delay: EdgeDelayMetrics::default(),
            forwarding: ForwardingMetrics::default(),
            edd: EddResult::default(),
        });
        self.vertices[tail].edges_out.push(id);
        self.vertices[head].edges_in.push(id);
        self.edge_order.push(id);
        id
    }

    /// Adds a two-way road, returning the edges `a -> b` and `b -> a`.
    pub fn add_road(&mut self, a: VertexId, b: VertexId) -> (EdgeId, EdgeId) {
        (self.add_edge(a, b), self.add_edge(b, a))
    }

    /// The number of intersections.
    pub fn vertex_count(&self) -> usize {
        self.vertex_order.len()
    }

    /// The number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.edge_order.len()
    }

    /// Whether the vertex belongs to this graph.
    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.vertices.contains_key(id)
    }

    /// Whether the edge belongs to this graph.
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(id)
    }

    /// Gets a reference to the vertex with the given ID.
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id]
    }

    /// Gets a reference to the edge with the given ID.
    pub fn edge(&self, id: EdgeId) -> &RoadSegment {
        &self.edges[id]
    }

    /// Gets the vertex with the given contiguous index.
    pub fn vertex_at(&self, index: usize) -> VertexId {
        self.vertex_order[index]
    }

    /// Gets the edge with the given order.
    pub fn edge_at(&self, order: usize) -> EdgeId {
        self.edge_order[order]
    }

    /// Finds the edge from `tail` to `head`, if there is one.
    pub fn find_edge(&self, tail: VertexId, head: VertexId) -> Option<EdgeId> {
        self.vertices[tail]
            .edges_out
            .iter()
            .copied()
            .find(|id| self.edges[*id].head == head)
    }

    /// Gets the traffic statistics of an edge for updating.
    pub fn stats_mut(&mut self, id: EdgeId) -> &mut TrafficStatistics {
        &mut self.edges[id].stats
    }

    /// Returns an iterator over the vertices in index order.
    pub fn iter_vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertex_order.iter().map(move |id| &self.vertices[*id])
    }

    /// Returns an iterator over the edges in order.
    pub fn iter_edges(&self) -> impl Iterator<Item = &RoadSegment> {
        self.edge_order.iter().map(move |id| &self.edges[*id])
    }

    /// The target the EDD fields were last computed for.
    pub fn edd_target(&self) -> Option<VertexId> {
        self.edd_target
    }

    /// The arrival count of an intersection: the vehicles which reached it over any edge.
    pub fn intersection_arrivals(&self, id: VertexId) -> u64 {
        self.vertices[id]
            .edges_in
            .iter()
            .map(|e| self.edges[*e].stats.arrival_count)
            .sum()
    }

    /// Finds the vertices from which `target` can be reached, including `target` itself.
    pub fn reaching(&self, target: VertexId) -> HashSet<VertexId> {
        let reached = pathfinding::directed::dijkstra::dijkstra_all(&target, |id| {
            self.vertices[*id]
                .edges_in
                .iter()
                .map(|e| (self.edges[*e].tail, 1usize))
                .collect::<SmallVec<[_; 4]>>()
        });
        reached.into_keys().chain(std::iter::once(target)).collect()
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id]
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> &mut RoadSegment {
        &mut self.edges[id]
    }

    pub(crate) fn set_edd_target(&mut self, target: Option<VertexId>) {
        self.edd_target = target;
    }
}

impl Vertex {
    /// Gets the vertex's ID.
    pub fn id(&self) -> VertexId {
        self.id
    }

    /// A contiguous index into all-pairs matrices.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The coordinates of the intersection.
    pub fn position(&self) -> Point2d {
        self.position
    }

    /// The edges leaving this intersection.
    pub fn edges_out(&self) -> &[EdgeId] {
        &self.edges_out
    }

    /// The edges entering this intersection.
    pub fn edges_in(&self) -> &[EdgeId] {
        &self.edges_in
    }

    /// The EDD from this intersection to the current target.
    pub fn edd(&self) -> &EddResult {
        &self.edd
    }

    /// The outgoing edges sorted by ascending EDD.
    pub fn ranking(&self) -> &[EdgeId] {
        &self.ranking
    }

    pub(crate) fn set_edd(&mut self, edd: EddResult, ranking: EdgeList) {
        self.edd = edd;
        self.ranking = ranking;
    }
}

impl RoadSegment {
    /// Gets the edge's ID.
    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// The contiguous index of the edge in a linear system.
    pub fn order(&self) -> usize {
        self.order
    }

    /// The intersection the edge starts at.
    pub fn tail(&self) -> VertexId {
        self.tail
    }

    /// The intersection the edge ends at.
    pub fn head(&self) -> VertexId {
        self.head
    }

    /// The length of the segment in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The traffic observed on the segment.
    pub fn stats(&self) -> &TrafficStatistics {
        &self.stats
    }

    /// The delay metrics from the latest recompute.
    pub fn delay(&self) -> &EdgeDelayMetrics {
        &self.delay
    }

    /// The forwarding metrics from the latest recompute.
    pub fn forwarding(&self) -> &ForwardingMetrics {
        &self.forwarding
    }

    /// The EDD from the latest recompute.
    pub fn edd(&self) -> &EddResult {
        &self.edd
    }

    pub(crate) fn set_delay(&mut self, delay: EdgeDelayMetrics) {
        self.delay = delay;
    }

    pub(crate) fn set_forwarding(&mut self, forwarding: ForwardingMetrics) {
        self.forwarding = forwarding;
    }

    pub(crate) fn set_edd(&mut self, edd: EddResult) {
        self.edd = edd;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn build_graph() {
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(Point2d::new(0.0, 0.0));
        let b = graph.add_vertex(Point2d::new(300.0, 400.0));
        let c = graph.add_vertex(Point2d::new(300.0, 0.0));
        let (ab, ba) = graph.add_road(a, b);
        let bc = graph.add_edge_with_length(b, c, 1000.0);

        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_approx_eq!(graph.edge(ab).length(), 500.0);
        assert_eq!(graph.edge(bc).length(), 1000.0);
        assert_eq!(graph.edge(ba).order(), 1);
        assert_eq!(graph.edge_at(2), bc);
        assert_eq!(graph.vertex(c).index(), 2);
        assert_eq!(graph.vertex(b).edges_out(), &[ba, bc]);
        assert_eq!(graph.vertex(b).edges_in(), &[ab]);
        assert_eq!(graph.find_edge(b, c), Some(bc));
        assert_eq!(graph.find_edge(c, b), None);
    }

    #[test]
    fn clones_carry_statistics() {
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(Point2d::new(0.0, 0.0));
        let b = graph.add_vertex(Point2d::new(100.0, 0.0));
        let ab = graph.add_edge(a, b);
        graph.stats_mut(ab).record_interarrival(3.0);

        let mut copy = graph.clone();
        assert_eq!(copy.edge(ab).stats().mean_interarrival(), Some(3.0));
        copy.stats_mut(ab).record_interarrival(5.0);
        assert_eq!(graph.edge(ab).stats().mean_interarrival(), Some(3.0));
    }

    #[test]
    fn reaching_follows_direction() {
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(Point2d::new(0.0, 0.0));
        let b = graph.add_vertex(Point2d::new(100.0, 0.0));
        let c = graph.add_vertex(Point2d::new(200.0, 0.0));
        let d = graph.add_vertex(Point2d::new(300.0, 0.0));
        graph.add_edge(a, b);
        graph.add_edge(b, c);
        graph.add_edge(d, c);
        graph.add_edge(c, d);

        let reaching = graph.reaching(b);
        assert!(reaching.contains(&a));
        assert!(reaching.contains(&b));
        assert!(!reaching.contains(&c));
        assert!(!reaching.contains(&d));
        assert_eq!(graph.reaching(c).len(), 4);
    }

    #[test]
    fn intersection_arrivals_sum_incoming_edges() {
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(Point2d::new(0.0, 0.0));
        let b = graph.add_vertex(Point2d::new(100.0, 0.0));
        let c = graph.add_vertex(Point2d::new(100.0, 100.0));
        let ab = graph.add_edge(a, b);
        let cb = graph.add_edge(c, b);
        graph.stats_mut(ab).arrival_count = 3;
        graph.stats_mut(cb).arrival_count = 4;
        assert_eq!(graph.intersection_arrivals(b), 7);
        assert_eq!(graph.intersection_arrivals(a), 0);
    }
}
