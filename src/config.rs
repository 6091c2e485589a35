//! Engine configuration.

use crate::delay::EdgeDelayModel;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// The default zero-equality tolerance used when selecting pivots.
pub const DEFAULT_TOLERANCE: f64 = 1e-7;

/// The parameters shared by every forwarding-metric computation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// The average vehicle speed in m/s.
    pub vehicle_speed: f64,
    /// The radio communication range in m.
    pub communication_range: f64,
    /// The delay of a single wireless transmission hop in s.
    pub hop_delay: f64,
    /// The closed-form model used to compute edge delays.
    pub edge_delay_model: EdgeDelayModel,
    /// The metric used to rank the outgoing edges of an intersection.
    pub link_selection: LinkSelection,
    /// How EDD is computed for a target.
    pub edd_policy: EddPolicy,
    /// How a single vehicle's own EDD is computed along its trajectory.
    pub trajectory_model: TrajectoryModel,
    /// Values with a magnitude below this are treated as zero.
    pub tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vehicle_speed: 20.0,
            communication_range: 200.0,
            hop_delay: 0.001,
            edge_delay_model: EdgeDelayModel::TbdFinite,
            link_selection: LinkSelection::Delay,
            edd_policy: EddPolicy::LinearSystem,
            trajectory_model: TrajectoryModel::Opportunistic,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl EngineConfig {
    /// Checks that the parameters can be used in a computation.
    pub fn validate(&self) -> Result<()> {
        if self.communication_range == 0.0 {
            return Err(Error::ZeroCommunicationRange);
        }
        if !(self.communication_range > 0.0 && self.communication_range.is_finite()) {
            return Err(Error::Configuration(format!(
                "communication range must be positive, got {}",
                self.communication_range
            )));
        }
        if !(self.vehicle_speed > 0.0 && self.vehicle_speed.is_finite()) {
            return Err(Error::Configuration(format!(
                "vehicle speed must be positive, got {}",
                self.vehicle_speed
            )));
        }
        if !(self.hop_delay >= 0.0 && self.hop_delay.is_finite()) {
            return Err(Error::Configuration(format!(
                "hop delay must be non-negative, got {}",
                self.hop_delay
            )));
        }
        if !(self.tolerance > 0.0) {
            return Err(Error::Configuration(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// The metric used to order an intersection's outgoing edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkSelection {
    /// The angle between the edge and the direction towards the target.
    Angle,
    /// The shortest geographic distance to the target through the edge.
    Distance,
    /// The shortest aggregated edge delay to the target through the edge.
    Delay,
}

/// How EDD is derived for a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EddPolicy {
    /// Probabilistic forwarding at every intersection, solved as a linear system.
    LinearSystem,
    /// Deterministic greedy forwarding along the minimum-delay path.
    ShortestPath,
}

/// How a vehicle's own EDD is computed along its planned route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrajectoryModel {
    /// The vehicle carries the packet itself the whole way.
    CarryOnly,
    /// The packet may be handed off at intersections to better-ranked edges.
    Opportunistic,
}

/// Implements `FromStr` and `Display` for a selector enum from a table of names.
macro_rules! selector_names {
    ($ty:ty, $what:literal, { $($variant:path => [$name:literal $(, $alias:literal)*]),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let lower = s.trim().to_ascii_lowercase();
                $(
                    if lower == $name $(|| lower == $alias)* {
                        return Ok($variant);
                    }
                )+
                Err(Error::Configuration(format!(concat!("unsupported ", $what, " '{}'"), s)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $($variant => $name,)+
                };
                f.write_str(name)
            }
        }
    };
}

selector_names!(EdgeDelayModel, "edge delay model", {
    EdgeDelayModel::TbdFinite => ["tbd-finite", "tbd"],
    EdgeDelayModel::TbdInfinite => ["tbd-infinite"],
    EdgeDelayModel::Vadd => ["vadd"],
    EdgeDelayModel::Tsf => ["tsf"],
});

selector_names!(LinkSelection, "link selection metric", {
    LinkSelection::Angle => ["angle"],
    LinkSelection::Distance => ["distance"],
    LinkSelection::Delay => ["delay"],
});

selector_names!(EddPolicy, "EDD policy", {
    EddPolicy::LinearSystem => ["linear-system", "stochastic"],
    EddPolicy::ShortestPath => ["shortest-path"],
});

selector_names!(TrajectoryModel, "trajectory model", {
    TrajectoryModel::CarryOnly => ["carry-only", "carry"],
    TrajectoryModel::Opportunistic => ["opportunistic"],
});

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_range_is_rejected() {
        let config = EngineConfig {
            communication_range: 0.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(Error::ZeroCommunicationRange));
    }

    #[test]
    fn bad_speed_is_rejected() {
        for speed in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let config = EngineConfig {
                vehicle_speed: speed,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(Error::Configuration(_))));
        }
    }

    #[test]
    fn parse_selectors() {
        assert_eq!("VADD".parse::<EdgeDelayModel>(), Ok(EdgeDelayModel::Vadd));
        assert_eq!(" tbd ".parse::<EdgeDelayModel>(), Ok(EdgeDelayModel::TbdFinite));
        assert_eq!("Angle".parse::<LinkSelection>(), Ok(LinkSelection::Angle));
        assert_eq!("shortest-path".parse::<EddPolicy>(), Ok(EddPolicy::ShortestPath));
        assert_eq!("carry".parse::<TrajectoryModel>(), Ok(TrajectoryModel::CarryOnly));
        assert!(matches!(
            "hop-count".parse::<LinkSelection>(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn display_round_trips() {
        for model in [
            EdgeDelayModel::TbdFinite,
            EdgeDelayModel::TbdInfinite,
            EdgeDelayModel::Vadd,
            EdgeDelayModel::Tsf,
        ] {
            assert_eq!(model.to_string().parse::<EdgeDelayModel>(), Ok(model));
        }
    }
}
