pub use cgmath;
pub use config::{EddPolicy, EngineConfig, LinkSelection, TrajectoryModel};
pub use delay::{EdgeDelayMetrics, EdgeDelayModel};
pub use edd::{EddEngine, EddResult};
pub use error::{Error, Result};
pub use forwarding::ForwardingMetrics;
pub use graph::{RoadGraph, RoadSegment, Vertex};
pub use paths::{PathWeight, ShortestPaths};
pub use slotmap::{Key, KeyData};
pub use stats::TrafficStatistics;
pub use table::{ForwardingTable, ForwardingTableEntry};
pub use trajectory::Trajectory;

mod config;
mod delay;
mod edd;
mod error;
mod forwarding;
mod graph;
pub mod math;
mod paths;
mod stats;
mod table;
mod trajectory;

use slotmap::new_key_type;

new_key_type! {
    /// Unique ID of a [Vertex] (road intersection).
    pub struct VertexId;
    /// Unique ID of a [RoadSegment]. Not contiguous; see [RoadSegment::order].
    pub struct EdgeId;
}
