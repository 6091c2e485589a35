//! Forwarding probabilities at road intersections.
//!
//! At an intersection the packet carrier ranks the outgoing edges by a
//! link-selection metric and hands the packet to the first vehicle it meets
//! on the best-ranked edge. An edge is only used if no better-ranked edge
//! offered a contact, and the carrier keeps the packet when it turns onto an
//! edge without having met anyone on a better one.

use crate::delay::arrival_rate;
use crate::math::angle_towards;
use crate::paths::{PathWeight, ShortestPaths};
use crate::{EdgeId, EngineConfig, Error, LinkSelection, Result, RoadGraph, VertexId};
use itertools::Itertools;
use smallvec::SmallVec;

/// The forwarding metrics of an edge towards one target, as seen from its tail intersection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForwardingMetrics {
    /// The link-selection sort key; lower is better.
    pub theta: f64,
    /// The position of the edge when sorted by `theta`, starting from zero.
    pub rank: usize,
    /// Probability of meeting a vehicle on this edge within communication range.
    pub cp: f64,
    /// Probability that this edge is the best one offering a contact.
    pub p_prime: f64,
    /// Probability that the packet leaves the intersection on this edge,
    /// including the carrier keeping it.
    pub p: f64,
    /// As `p`, excluding the carrier keeping the packet.
    pub p_pure: f64,
    /// Probability that a vehicle arriving at the intersection turns onto this edge.
    pub q: f64,
}

/// The forwarding metrics of each outgoing edge of one intersection.
pub(crate) type IntersectionMetrics = SmallVec<[(EdgeId, ForwardingMetrics); 4]>;

/// The shortest path weight the link-selection metric needs, if any.
pub(crate) fn required_weight(selection: LinkSelection) -> Option<PathWeight> {
    match selection {
        LinkSelection::Angle => None,
        LinkSelection::Distance => Some(PathWeight::Length),
        LinkSelection::Delay => Some(PathWeight::EdgeDelay),
    }
}

/// Computes the forwarding metrics of the outgoing edges of `vertex` towards `target`.
///
/// The DELAY metric reads the edges' current delay metrics.
pub(crate) fn intersection_metrics(
    config: &EngineConfig,
    graph: &RoadGraph,
    vertex: VertexId,
    target: VertexId,
    paths: Option<&ShortestPaths>,
) -> Result<IntersectionMetrics> {
    let edges = graph.vertex(vertex).edges_out();
    let wait = config.communication_range / config.vehicle_speed;
    let target_pos = graph.vertex(target).position();

    let paths = match required_weight(config.link_selection) {
        None => None,
        Some(weight) => match paths {
            Some(paths) if paths.weight() == weight => Some(paths),
            _ => {
                return Err(Error::Configuration(format!(
                    "link selection {} needs shortest paths weighted by {:?}",
                    config.link_selection, weight
                )))
            }
        },
    };

    // Contact probability and sort key of each edge
    let mut metrics = IntersectionMetrics::new();
    for id in edges {
        let edge = graph.edge(*id);
        let rate = arrival_rate(edge)?;
        let cp = 1.0 - f64::exp(-rate * wait);
        let theta = match (config.link_selection, paths) {
            (LinkSelection::Angle, _) => angle_towards(
                graph.vertex(edge.tail()).position(),
                graph.vertex(edge.head()).position(),
                target_pos,
            ),
            (LinkSelection::Distance, Some(paths)) => {
                edge.length() + paths.cost(edge.head(), target)
            }
            (LinkSelection::Delay, Some(paths)) => {
                edge.delay().edge_delay + paths.cost(edge.head(), target)
            }
            _ => unreachable!(),
        };
        metrics.push((
            *id,
            ForwardingMetrics {
                theta,
                cp,
                ..Default::default()
            },
        ));
    }

    // Ties keep the intersection's edge order; there is no secondary key.
    let mut metrics = metrics
        .into_iter()
        .sorted_by(|a, b| a.1.theta.total_cmp(&b.1.theta))
        .collect::<IntersectionMetrics>();

    // Branch probabilities
    let arrivals = graph.intersection_arrivals(vertex);
    for (id, m) in &mut metrics {
        m.q = match arrivals {
            0 => 0.0,
            n => graph.edge(*id).stats().branch_count as f64 / n as f64,
        };
    }

    // Unconditional probabilities, by rank
    let mut miss = 1.0;
    for (rank, (_, m)) in metrics.iter_mut().enumerate() {
        m.rank = rank;
        m.p_prime = m.cp * miss;
        miss *= 1.0 - m.cp;
    }

    // Forwarding probabilities, conditioned on the branch the carrier takes
    let q_after = suffix_sums(metrics.iter().map(|(_, m)| m.q));
    let mut offered = 0.0;
    for (k, (_, m)) in metrics.iter_mut().enumerate() {
        m.p = m.p_prime * q_after[k + 1] + m.q * (1.0 - offered);
        m.p_pure = m.p_prime * q_after[k];
        offered += m.p_prime;
    }

    Ok(metrics)
}

/// Computes `out[k] = sum(values[k..])`, with one extra trailing zero.
fn suffix_sums(values: impl DoubleEndedIterator<Item = f64> + ExactSizeIterator) -> Vec<f64> {
    let mut sums = vec![0.0; values.len() + 1];
    for (k, value) in values.enumerate().rev() {
        sums[k] = sums[k + 1] + value;
    }
    sums
}

/// Computes and stores the forwarding metrics of every edge towards `target`.
pub(crate) fn compute_all(
    config: &EngineConfig,
    graph: &mut RoadGraph,
    target: VertexId,
    paths: Option<&ShortestPaths>,
) -> Result<()> {
    let vertices = graph.iter_vertices().map(|v| v.id()).collect::<Vec<_>>();
    for vertex in vertices {
        let metrics = intersection_metrics(config, graph, vertex, target, paths)?;
        for (id, m) in metrics {
            graph.edge_mut(id).set_forwarding(m);
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Point2d;
    use assert_approx_eq::assert_approx_eq;

    /// A star of three roads of equal length around a centre vertex.
    fn star() -> (RoadGraph, VertexId, [EdgeId; 3]) {
        let mut graph = RoadGraph::new();
        let centre = graph.add_vertex(Point2d::new(0.0, 0.0));
        let mut out = [EdgeId::default(); 3];
        for (i, angle) in [0.0f64, 120.0, 240.0].into_iter().enumerate() {
            let (sin, cos) = angle.to_radians().sin_cos();
            let leaf = graph.add_vertex(Point2d::new(100.0 * cos, 100.0 * sin));
            let e = graph.add_edge_with_length(centre, leaf, 100.0);
            let back = graph.add_edge_with_length(leaf, centre, 100.0);
            out[i] = e;
            graph.stats_mut(e).record_interarrival(10.0);
            graph.stats_mut(back).record_interarrival(10.0);
        }
        (graph, centre, out)
    }

    fn config(link_selection: LinkSelection) -> EngineConfig {
        EngineConfig {
            vehicle_speed: 10.0,
            communication_range: 100.0,
            link_selection,
            ..Default::default()
        }
    }

    #[test]
    fn equal_edges_rank_in_insertion_order() {
        let (graph, centre, out) = star();
        let config = config(LinkSelection::Distance);
        let paths = ShortestPaths::floyd_warshall(&graph, PathWeight::Length);
        let metrics = intersection_metrics(&config, &graph, centre, centre, Some(&paths)).unwrap();

        let c = 1.0 - f64::exp(-0.1 * 10.0);
        for (k, (id, m)) in metrics.iter().enumerate() {
            assert_eq!(*id, out[k]);
            assert_eq!(m.rank, k);
            assert_approx_eq!(m.theta, 200.0);
            assert_approx_eq!(m.cp, c);
            assert_approx_eq!(m.p_prime, c * (1.0 - c).powi(k as i32));
        }
    }

    #[test]
    fn angle_prefers_edges_towards_target() {
        let (mut graph, centre, out) = star();
        let target = graph.add_vertex(Point2d::new(-1000.0, 10.0));
        let config = config(LinkSelection::Angle);
        let metrics = intersection_metrics(&config, &graph, centre, target, None).unwrap();
        let order = metrics.iter().map(|(id, _)| *id).collect::<Vec<_>>();
        assert_eq!(order, vec![out[1], out[2], out[0]]);
        assert!(metrics[0].1.theta < metrics[1].1.theta);
    }

    #[test]
    fn forwarding_probabilities_follow_branches() {
        let (mut graph, centre, out) = star();
        // Vehicles arrive at the centre over each of the three leaf roads
        for e in graph.vertex(centre).edges_in().to_vec() {
            graph.stats_mut(e).arrival_count = 10;
        }
        let branches = [15, 10, 5];
        for (e, n) in out.iter().zip(branches) {
            graph.stats_mut(*e).branch_count = n;
        }

        let config = config(LinkSelection::Distance);
        let paths = ShortestPaths::floyd_warshall(&graph, PathWeight::Length);
        let metrics = intersection_metrics(&config, &graph, centre, centre, Some(&paths)).unwrap();
        let m = metrics.iter().map(|(_, m)| *m).collect::<Vec<_>>();

        assert_approx_eq!(m[0].q, 0.5);
        assert_approx_eq!(m[1].q, 1.0 / 3.0);
        assert_approx_eq!(m[2].q, 1.0 / 6.0);

        // Rank 0: forwarded whenever met, or kept when turning onto it
        assert_approx_eq!(m[0].p, m[0].p_prime * 0.5 + 0.5);
        assert_approx_eq!(m[0].p_pure, m[0].p_prime);
        // Rank 2: only ever reached by keeping the packet
        assert_approx_eq!(m[2].p, m[2].q * (1.0 - m[0].p_prime - m[1].p_prime));
        assert_approx_eq!(m[2].p_pure, m[2].p_prime * m[2].q);

        let total: f64 = m.iter().map(|m| m.p).sum();
        assert_approx_eq!(total, 1.0);
        let offered: f64 = m.iter().map(|m| m.p_prime).sum();
        assert!(offered <= 1.0);
    }

    #[test]
    fn no_arrivals_means_no_branches() {
        let (graph, centre, _) = star();
        let config = config(LinkSelection::Angle);
        let metrics = intersection_metrics(&config, &graph, centre, centre, None).unwrap();
        for (_, m) in metrics {
            assert_eq!(m.q, 0.0);
            assert_eq!(m.p, 0.0);
            assert_eq!(m.p_pure, 0.0);
        }
    }

    #[test]
    fn zero_interarrival_is_an_error() {
        let (mut graph, centre, out) = star();
        graph.stats_mut(out[1]).reset();
        graph.stats_mut(out[1]).record_interarrival(0.0);
        let config = config(LinkSelection::Angle);
        assert_eq!(
            intersection_metrics(&config, &graph, centre, centre, None),
            Err(Error::ZeroInterarrival { edge: out[1] })
        );
    }

    #[test]
    fn missing_paths_is_an_error() {
        let (graph, centre, _) = star();
        let config = config(LinkSelection::Delay);
        let lengths = ShortestPaths::floyd_warshall(&graph, PathWeight::Length);
        assert!(matches!(
            intersection_metrics(&config, &graph, centre, centre, Some(&lengths)),
            Err(Error::Configuration(_))
        ));
    }
}
