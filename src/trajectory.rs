//! EDD of a packet held by one vehicle following a known route.

use crate::config::TrajectoryModel;
use crate::delay::sub_edge_delay_metrics;
use crate::{EddEngine, EddResult, EdgeId, Error, Result, RoadGraph, VertexId};
use log::trace;
use smallvec::SmallVec;

/// The planned route of a vehicle.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trajectory {
    /// The edges the vehicle will travel, starting with the one it is on.
    edges: Vec<EdgeId>,
    /// The distance already travelled along the first edge in m.
    offset: f64,
}

/// A possible way for the packet to reach the target: its probability,
/// and the mean and variance of the delay in that case.
type Outcome = (f64, f64, f64);

impl Trajectory {
    /// Creates a trajectory. It is validated against a graph when used.
    pub fn new(edges: Vec<EdgeId>, offset: f64) -> Self {
        Self { edges, offset }
    }

    /// Creates a trajectory through a sequence of intersections.
    pub fn from_vertices(graph: &RoadGraph, vertices: &[VertexId], offset: f64) -> Result<Self> {
        let edges = vertices
            .windows(2)
            .map(|w| {
                graph.find_edge(w[0], w[1]).ok_or_else(|| {
                    Error::InvalidTrajectory(format!("no road from {:?} to {:?}", w[0], w[1]))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(edges, offset))
    }

    /// The edges of the route.
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// The distance already travelled along the first edge in m.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    fn validate(&self, graph: &RoadGraph) -> Result<()> {
        let first = *self
            .edges
            .first()
            .ok_or_else(|| Error::InvalidTrajectory("no edges".into()))?;
        if let Some(id) = self.edges.iter().find(|id| !graph.contains_edge(**id)) {
            return Err(Error::UnknownEdge(*id));
        }
        for pair in self.edges.windows(2) {
            if graph.edge(pair[0]).head() != graph.edge(pair[1]).tail() {
                return Err(Error::InvalidTrajectory(format!(
                    "edges {:?} and {:?} are not consecutive",
                    pair[0], pair[1]
                )));
            }
        }
        let length = graph.edge(first).length();
        if !(0.0..=length).contains(&self.offset) {
            return Err(Error::InvalidTrajectory(format!(
                "offset {} is outside the first edge (length {})",
                self.offset, length
            )));
        }
        Ok(())
    }
}

impl EddEngine {
    /// Computes the EDD towards `target` of a packet carried by a vehicle
    /// following `trajectory`.
    ///
    /// The opportunistic model, and the carry-only model when the route ends
    /// before reaching the target, read the graph's EDD, which must have been
    /// computed for the same target.
    pub fn vehicle_edd(
        &self,
        graph: &RoadGraph,
        trajectory: &Trajectory,
        target: VertexId,
    ) -> Result<EddResult> {
        if !graph.contains_vertex(target) {
            return Err(Error::UnknownVertex(target));
        }
        trajectory.validate(graph)?;

        let config = self.config();
        let model = config.trajectory_model;
        let computed = graph.edd_target() == Some(target);
        if model == TrajectoryModel::Opportunistic && !computed {
            return Err(Error::EddNotComputed { target });
        }

        let mut outcomes = SmallVec::<[Outcome; 8]>::new();
        let mut remaining = 1.0;
        let mut elapsed = 0.0;
        let mut elapsed_variance = 0.0;
        let mut last = graph.edge(trajectory.edges[0]).tail();

        for (i, id) in trajectory.edges.iter().enumerate() {
            let edge = graph.edge(*id);
            let length = match i {
                0 => edge.length() - trajectory.offset,
                _ => edge.length(),
            };
            let carry = length / config.vehicle_speed;

            // Only the road the vehicle is on is relayed along; afterwards it carries
            if i == 0 && model == TrajectoryModel::Opportunistic {
                let sub = sub_edge_delay_metrics(config, edge, length)?;
                if sub.edge_delay < carry {
                    elapsed += sub.edge_delay;
                    elapsed_variance += sub.edge_delay_variance;
                } else {
                    elapsed += carry;
                }
            } else {
                elapsed += carry;
            }

            last = edge.head();
            if last == target {
                outcomes.push((remaining, elapsed, elapsed_variance));
                remaining = 0.0;
                break;
            }

            if model == TrajectoryModel::Opportunistic {
                // Hand over to a vehicle on any road ranked ahead of the one we take
                let next = trajectory.edges.get(i + 1).copied();
                let mut miss = 1.0;
                for candidate in graph.vertex(last).ranking() {
                    if Some(*candidate) == next {
                        break;
                    }
                    let candidate = graph.edge(*candidate);
                    let edd = candidate.edd();
                    if !edd.is_reachable() {
                        break;
                    }
                    let cp = candidate.forwarding().cp;
                    outcomes.push((
                        remaining * miss * cp,
                        elapsed + edd.edd,
                        elapsed_variance + edd.edd_variance,
                    ));
                    miss *= 1.0 - cp;
                }
                remaining *= miss;
            }
        }

        // The route ends before the target
        if remaining > 0.0 {
            if !computed {
                return Err(Error::EddNotComputed { target });
            }
            let edd = graph.vertex(last).edd();
            outcomes.push((remaining, elapsed + edd.edd, elapsed_variance + edd.edd_variance));
        }

        trace!("vehicle EDD outcomes {:?}", outcomes);
        Ok(mixture(&outcomes))
    }
}

/// The mean and variance of a mixture of outcomes.
fn mixture(outcomes: &[Outcome]) -> EddResult {
    let total: f64 = outcomes.iter().map(|o| o.0).sum();
    if total <= 0.0 {
        return EddResult::unreachable();
    }
    let (mean, square) = outcomes.iter().fold((0.0, 0.0), |(mean, square), (p, m, v)| {
        let p = p / total;
        (mean + p * m, square + p * (v + m * m))
    });
    EddResult::new(mean, (square - mean * mean).max(0.0))
}
