//! Expected Delivery Delay (EDD) of every road segment towards a target.
//!
//! Under the linear system policy, a packet carried along edge `e` reaches
//! the head intersection after `edge_delay(e)` and then leaves on one of the
//! outgoing edges `e'` with probability `P(e')`:
//!
//! ```text
//! EDD(e) = edge_delay(e) + Σ P(e') · EDD(e')
//! ```
//!
//! which over all edges is `(P - I) · EDD = -edge_delay`. The variance is
//! obtained in the same way from `P²` and the edge delay variances.

use crate::config::EddPolicy;
use crate::delay::edge_delay_metrics;
use crate::forwarding::{self, required_weight};
use crate::graph::EdgeList;
use crate::math::{clamp_delay, LinearSystem, INFINITE_DELAY};
use crate::paths::{PathWeight, ShortestPaths};
use crate::{EdgeId, EngineConfig, Error, Result, RoadGraph, RoadSegment, VertexId};
use itertools::Itertools;
use log::{debug, log_enabled, trace, Level};
use std::borrow::Cow;

/// The expected delivery delay of a packet and its spread.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EddResult {
    /// The expected delivery delay in s.
    pub edd: f64,
    /// The variance of the delivery delay in s<sup>2</sup>.
    pub edd_variance: f64,
    /// The standard deviation of the delivery delay in s.
    pub edd_sd: f64,
}

impl Default for EddResult {
    fn default() -> Self {
        Self::unreachable()
    }
}

impl EddResult {
    /// Creates a result from a delay and its variance, clamping both.
    pub fn new(edd: f64, edd_variance: f64) -> Self {
        let edd_variance = clamp_delay(edd_variance);
        Self {
            edd: clamp_delay(edd),
            edd_variance,
            edd_sd: clamp_delay(edd_variance.sqrt()),
        }
    }

    /// The result at the target itself.
    pub const fn zero() -> Self {
        Self {
            edd: 0.0,
            edd_variance: 0.0,
            edd_sd: 0.0,
        }
    }

    /// The result for a point from which the target cannot be reached.
    pub const fn unreachable() -> Self {
        Self {
            edd: INFINITE_DELAY,
            edd_variance: INFINITE_DELAY,
            edd_sd: INFINITE_DELAY,
        }
    }

    /// Whether the target can be reached at all.
    pub fn is_reachable(&self) -> bool {
        self.edd < INFINITE_DELAY
    }
}

/// Computes forwarding metrics and EDD for a road graph.
#[derive(Clone, Debug)]
pub struct EddEngine {
    config: EngineConfig,
}

impl EddEngine {
    /// Creates an engine, validating the configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recomputes the delay metrics of every edge from its traffic statistics.
    pub fn compute_edge_delays(&self, graph: &mut RoadGraph) -> Result<()> {
        for order in 0..graph.edge_count() {
            let id = graph.edge_at(order);
            let delay = edge_delay_metrics(&self.config, graph.edge(id))?;
            graph.edge_mut(id).set_delay(delay);
        }
        Ok(())
    }

    /// Recomputes the forwarding metrics of every edge towards `target`.
    ///
    /// Edge delays must be current when the DELAY metric is selected.
    /// If the metric needs shortest paths and `paths` is `None` or has the
    /// wrong weight, they are computed here.
    pub fn compute_forwarding_probabilities(
        &self,
        graph: &mut RoadGraph,
        target: VertexId,
        paths: Option<&ShortestPaths>,
    ) -> Result<()> {
        check_vertex(graph, target)?;
        let paths = required_weight(self.config.link_selection)
            .map(|weight| paths_for(graph, weight, paths));
        forwarding::compute_all(&self.config, graph, target, paths.as_deref())
    }

    /// Fully recomputes edge delays, forwarding metrics and EDD towards `target`,
    /// storing the results in the graph.
    ///
    /// On failure the graph's EDD fields are left in an unspecified state
    /// and [RoadGraph::edd_target] is cleared.
    pub fn compute_edd(
        &self,
        graph: &mut RoadGraph,
        target: VertexId,
        paths: Option<&ShortestPaths>,
    ) -> Result<()> {
        check_vertex(graph, target)?;
        graph.set_edd_target(None);
        debug!(
            "computing EDD towards {:?} ({} edges, {:?})",
            target,
            graph.edge_count(),
            self.config.edd_policy
        );

        self.compute_edge_delays(graph)?;
        self.compute_forwarding_probabilities(graph, target, paths)?;

        let (edd, variance) = match self.config.edd_policy {
            EddPolicy::LinearSystem => (
                self.solve_edd(graph, target)?,
                self.solve_edd_variance(graph, target)?,
            ),
            EddPolicy::ShortestPath => shortest_path_edd(graph, target, paths),
        };

        self.store_results(graph, target, &edd, &variance);
        graph.set_edd_target(Some(target));
        Ok(())
    }

    /// Builds the linear system whose solution is the EDD of each edge,
    /// from the graph's current delay and forwarding metrics.
    pub fn build_edd_system(&self, graph: &RoadGraph, target: VertexId) -> LinearSystem {
        build_system(graph, target, |p| p, |edge| edge.delay().edge_delay)
    }

    /// Builds the linear system whose solution is the EDD variance of each edge.
    pub fn build_edd_variance_system(&self, graph: &RoadGraph, target: VertexId) -> LinearSystem {
        build_system(graph, target, |p| p * p, |edge| edge.delay().edge_delay_variance)
    }

    /// Solves for the EDD of each edge, indexed by edge order.
    pub fn solve_edd(&self, graph: &RoadGraph, target: VertexId) -> Result<Vec<f64>> {
        let system = self.build_edd_system(graph, target);
        self.solve(system)
    }

    /// Solves for the EDD variance of each edge, indexed by edge order.
    pub fn solve_edd_variance(&self, graph: &RoadGraph, target: VertexId) -> Result<Vec<f64>> {
        let system = self.build_edd_variance_system(graph, target);
        self.solve(system)
    }

    fn solve(&self, mut system: LinearSystem) -> Result<Vec<f64>> {
        let solution: Vec<f64> = system
            .solve(self.config.tolerance)?
            .iter()
            .map(|x| clamp_delay(*x))
            .collect();
        if log_enabled!(Level::Trace) {
            trace!("{}", system);
        }
        Ok(solution)
    }

    /// Writes the per-edge results onto the graph, then derives
    /// each intersection's EDD and edge ranking.
    fn store_results(&self, graph: &mut RoadGraph, target: VertexId, edd: &[f64], variance: &[f64]) {
        let reaching = graph.reaching(target);

        for order in 0..graph.edge_count() {
            let id = graph.edge_at(order);
            let edge = graph.edge(id);
            let result = if reaching.contains(&edge.head()) {
                EddResult::new(edd[order], variance[order])
            } else {
                EddResult::unreachable()
            };
            graph.edge_mut(id).set_edd(result);
        }

        for index in 0..graph.vertex_count() {
            let id = graph.vertex_at(index);
            let vertex = graph.vertex(id);
            let ranking = vertex
                .edges_out()
                .iter()
                .copied()
                .sorted_by(|a, b| graph.edge(*a).edd().edd.total_cmp(&graph.edge(*b).edd().edd))
                .collect::<EdgeList>();

            let result = if id == target {
                EddResult::zero()
            } else if !reaching.contains(&id) {
                EddResult::unreachable()
            } else {
                match self.config.edd_policy {
                    EddPolicy::LinearSystem => self.intersection_edd(graph, &ranking),
                    EddPolicy::ShortestPath => ranking
                        .first()
                        .map(|e| *graph.edge(*e).edd())
                        .unwrap_or_else(EddResult::unreachable),
                }
            };
            graph.vertex_mut(id).set_edd(result, ranking);
        }
    }

    /// The EDD of a packet waiting at an intersection: the edge EDDs weighted
    /// by the forwarding probabilities.
    ///
    /// Without any branch statistics the best ranked edge is used.
    fn intersection_edd(&self, graph: &RoadGraph, ranking: &[EdgeId]) -> EddResult {
        let total: f64 = ranking.iter().map(|e| graph.edge(*e).forwarding().p).sum();
        if total <= self.config.tolerance {
            return ranking
                .first()
                .map(|e| *graph.edge(*e).edd())
                .unwrap_or_else(EddResult::unreachable);
        }
        let (edd, variance) = ranking.iter().fold((0.0, 0.0), |(edd, variance), e| {
            let edge = graph.edge(*e);
            let p = edge.forwarding().p / total;
            (edd + p * edge.edd().edd, variance + p * p * edge.edd().edd_variance)
        });
        EddResult::new(edd, variance)
    }
}

fn check_vertex(graph: &RoadGraph, id: VertexId) -> Result<()> {
    if graph.contains_vertex(id) {
        Ok(())
    } else {
        Err(Error::UnknownVertex(id))
    }
}

/// Uses the supplied shortest paths if they have the right weight,
/// otherwise computes them.
fn paths_for<'a>(
    graph: &RoadGraph,
    weight: PathWeight,
    supplied: Option<&'a ShortestPaths>,
) -> Cow<'a, ShortestPaths> {
    match supplied {
        Some(paths) if paths.weight() == weight => Cow::Borrowed(paths),
        _ => {
            debug!("computing shortest paths weighted by {:?}", weight);
            Cow::Owned(ShortestPaths::floyd_warshall(graph, weight))
        }
    }
}

/// Builds `(W(P) - I) · x = -rhs`, where row `e` holds the transformed
/// forwarding probabilities of the edges leaving the head of `e`.
///
/// An edge whose head cannot reach the target gets the decoupled row
/// `-x = -INFINITE_DELAY`, keeping closed unreachable regions out of the solve.
fn build_system(
    graph: &RoadGraph,
    target: VertexId,
    transform: impl Fn(f64) -> f64,
    rhs: impl Fn(&RoadSegment) -> f64,
) -> LinearSystem {
    let reaching = graph.reaching(target);
    let mut system = LinearSystem::new(graph.edge_count());
    for edge in graph.iter_edges() {
        let row = edge.order();
        if !reaching.contains(&edge.head()) {
            system.set_coefficient(row, row, -1.0);
            system.set_rhs(row, -INFINITE_DELAY);
            continue;
        }
        if edge.head() != target {
            for id in graph.vertex(edge.head()).edges_out() {
                let next = graph.edge(*id);
                system.set_coefficient(row, next.order(), transform(next.forwarding().p));
            }
        }
        system.set_coefficient(row, row, -1.0);
        system.set_rhs(row, -rhs(edge));
    }
    system
}

/// The EDD of each edge when the packet follows the minimum-delay path.
fn shortest_path_edd(
    graph: &RoadGraph,
    target: VertexId,
    paths: Option<&ShortestPaths>,
) -> (Vec<f64>, Vec<f64>) {
    let delays = paths_for(graph, PathWeight::EdgeDelay, paths);
    let variances = paths_for(graph, PathWeight::EdgeDelayVariance, paths);
    graph
        .iter_edges()
        .map(|edge| {
            let delay = edge.delay();
            (
                clamp_delay(delay.edge_delay + delays.cost(edge.head(), target)),
                clamp_delay(delay.edge_delay_variance + variances.cost(edge.head(), target)),
            )
        })
        .unzip()
}
