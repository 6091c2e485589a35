//! All-pairs shortest paths over the road graph.

use crate::{Error, Result, RoadGraph, RoadSegment, VertexId};
use pathfinding::matrix::Matrix;
use slotmap::SecondaryMap;

/// The quantity minimised by a shortest path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathWeight {
    /// Geographic length in m.
    Length,
    /// Edge delay in s.
    EdgeDelay,
    /// Edge delay variance in s<sup>2</sup>.
    EdgeDelayVariance,
}

impl PathWeight {
    /// The weight of an edge.
    fn of(self, edge: &RoadSegment) -> f64 {
        match self {
            Self::Length => edge.length(),
            Self::EdgeDelay => edge.delay().edge_delay,
            Self::EdgeDelayVariance => edge.delay().edge_delay_variance,
        }
    }
}

/// The all-pairs shortest path costs between the intersections of a graph.
#[derive(Clone, Debug)]
pub struct ShortestPaths {
    /// What the costs measure.
    weight: PathWeight,
    /// Maps vertices to their row/column.
    index: SecondaryMap<VertexId, usize>,
    /// The vertices, by row/column.
    vertices: Vec<VertexId>,
    /// The cost of the shortest path from row to column; infinite if unreachable.
    cost: Matrix<f64>,
    /// The index of the next vertex on the shortest path from row to column.
    next: Option<Matrix<Option<usize>>>,
}

impl ShortestPaths {
    /// Computes all-pairs shortest paths with the Floyd–Warshall algorithm.
    ///
    /// Edge delay weights are read from the graph's most recently computed delay metrics.
    pub fn floyd_warshall(graph: &RoadGraph, weight: PathWeight) -> Self {
        let n = graph.vertex_count();
        let mut cost = Matrix::new(n, n, f64::INFINITY);
        let mut next = Matrix::new(n, n, None);

        for i in 0..n {
            cost[(i, i)] = 0.0;
            next[(i, i)] = Some(i);
        }
        for edge in graph.iter_edges() {
            let i = graph.vertex(edge.tail()).index();
            let j = graph.vertex(edge.head()).index();
            let w = weight.of(edge);
            if w < cost[(i, j)] {
                cost[(i, j)] = w;
                next[(i, j)] = Some(j);
            }
        }

        for k in 0..n {
            for i in 0..n {
                let ik = cost[(i, k)];
                if ik == f64::INFINITY {
                    continue;
                }
                for j in 0..n {
                    let through = ik + cost[(k, j)];
                    if through < cost[(i, j)] {
                        cost[(i, j)] = through;
                        next[(i, j)] = next[(i, k)];
                    }
                }
            }
        }

        let mut paths = Self::with_costs(graph, weight, cost);
        paths.next = Some(next);
        paths
    }

    /// Wraps a cost matrix computed elsewhere, indexed by [crate::Vertex::index].
    pub fn from_matrix(graph: &RoadGraph, weight: PathWeight, cost: Matrix<f64>) -> Result<Self> {
        let n = graph.vertex_count();
        if cost.rows != n || cost.columns != n {
            return Err(Error::Configuration(format!(
                "shortest path matrix is {}x{}, expected {}x{}",
                cost.rows, cost.columns, n, n
            )));
        }
        Ok(Self::with_costs(graph, weight, cost))
    }

    fn with_costs(graph: &RoadGraph, weight: PathWeight, cost: Matrix<f64>) -> Self {
        let vertices = graph.iter_vertices().map(|v| v.id()).collect::<Vec<_>>();
        let mut index = SecondaryMap::new();
        for (i, id) in vertices.iter().enumerate() {
            index.insert(*id, i);
        }
        Self {
            weight,
            index,
            vertices,
            cost,
            next: None,
        }
    }

    /// What the costs measure.
    pub fn weight(&self) -> PathWeight {
        self.weight
    }

    /// The cost of the shortest path between two vertices,
    /// or infinity if there is none.
    pub fn cost(&self, from: VertexId, to: VertexId) -> f64 {
        match (self.index.get(from), self.index.get(to)) {
            (Some(i), Some(j)) => self.cost[(*i, *j)],
            _ => f64::INFINITY,
        }
    }

    /// The vertices along the shortest path between two vertices, including both ends.
    ///
    /// Returns `None` if there is no path, or the matrix was supplied without path information.
    pub fn path(&self, from: VertexId, to: VertexId) -> Option<Vec<VertexId>> {
        let next = self.next.as_ref()?;
        let mut i = *self.index.get(from)?;
        let j = *self.index.get(to)?;
        let mut path = vec![self.vertices[i]];
        while i != j {
            i = next[(i, j)]?;
            path.push(self.vertices[i]);
        }
        Some(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Point2d;

    #[test]
    fn shortest_lengths() {
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(Point2d::new(0.0, 0.0));
        let b = graph.add_vertex(Point2d::new(100.0, 0.0));
        let c = graph.add_vertex(Point2d::new(100.0, 100.0));
        let d = graph.add_vertex(Point2d::new(500.0, 500.0));
        graph.add_road(a, b);
        graph.add_road(b, c);
        graph.add_edge_with_length(a, c, 500.0);

        let paths = ShortestPaths::floyd_warshall(&graph, PathWeight::Length);
        assert_eq!(paths.weight(), PathWeight::Length);
        assert_eq!(paths.cost(a, a), 0.0);
        assert_eq!(paths.cost(a, c), 200.0);
        assert_eq!(paths.cost(c, a), 200.0);
        assert_eq!(paths.cost(a, d), f64::INFINITY);
        assert_eq!(paths.path(a, c), Some(vec![a, b, c]));
        assert_eq!(paths.path(a, d), None);
    }

    #[test]
    fn supplied_matrix() {
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(Point2d::new(0.0, 0.0));
        let b = graph.add_vertex(Point2d::new(100.0, 0.0));
        let mut cost = Matrix::new(2, 2, 0.0);
        cost[(0, 1)] = 7.0;
        cost[(1, 0)] = 9.0;

        let paths = ShortestPaths::from_matrix(&graph, PathWeight::EdgeDelay, cost).unwrap();
        assert_eq!(paths.cost(a, b), 7.0);
        assert_eq!(paths.cost(b, a), 9.0);
        assert_eq!(paths.path(a, b), None);

        let bad = Matrix::new(3, 3, 0.0);
        assert!(matches!(
            ShortestPaths::from_matrix(&graph, PathWeight::EdgeDelay, bad),
            Err(Error::Configuration(_))
        ));
    }
}
