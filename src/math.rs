//! Mathematical structs and functions.

use cgmath::Point2;
pub use solver::LinearSystem;
pub use util::*;

mod solver;
mod util;

/// A 2D point
pub type Point2d = Point2<f64>;
