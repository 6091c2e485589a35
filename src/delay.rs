//! Closed-form models of the delay a packet experiences along one road segment.

use self::convoy::Convoy;
use crate::math::{clamp_delay, is_zero, INFINITE_DELAY};
use crate::{EngineConfig, Error, Result, RoadSegment};

mod convoy;

/// The closed-form model used to compute an edge's delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeDelayModel {
    /// Convoy forwarding on a road of finite length.
    TbdFinite,
    /// Convoy forwarding, ignoring the truncation at the end of the road.
    TbdInfinite,
    /// Exponential connectivity model based on vehicle density.
    Vadd,
    /// Delivery towards a vehicle, where the last `R` metres are covered by radio.
    Tsf,
}

/// The delay metrics of one road segment.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeDelayMetrics {
    /// The expected time to deliver a packet across the segment, in s.
    pub edge_delay: f64,
    /// The variance of the delivery time, in s<sup>2</sup>.
    pub edge_delay_variance: f64,
    /// The average convoy length in m.
    pub acl: f64,
}

impl EdgeDelayMetrics {
    /// The metrics of a segment which has never seen any traffic.
    pub const fn unreachable() -> Self {
        Self {
            edge_delay: INFINITE_DELAY,
            edge_delay_variance: 0.0,
            acl: 0.0,
        }
    }

    /// The metrics of a segment the packet must be physically carried across.
    fn carry(length: f64, speed: f64) -> Self {
        Self {
            edge_delay: length / speed,
            edge_delay_variance: 0.0,
            acl: 0.0,
        }
    }

    /// The standard deviation of the delivery time, in s.
    pub fn edge_delay_sd(&self) -> f64 {
        self.edge_delay_variance.sqrt()
    }

    /// Clamps the delay and its variance into the finite range.
    fn clamped(self) -> Self {
        Self {
            edge_delay: clamp_delay(self.edge_delay),
            edge_delay_variance: clamp_delay(self.edge_delay_variance),
            acl: self.acl,
        }
    }
}

impl EdgeDelayModel {
    /// Computes the delay metrics of a road (or partial road) of the given `length`
    /// carrying vehicles which arrive at rate `arrival_rate` (vehicles/s).
    ///
    /// An arrival rate of zero means no traffic has been observed,
    /// which yields an infinite delay.
    pub fn evaluate(
        self,
        config: &EngineConfig,
        length: f64,
        arrival_rate: f64,
    ) -> Result<EdgeDelayMetrics> {
        if config.communication_range == 0.0 {
            return Err(Error::ZeroCommunicationRange);
        }
        if !(arrival_rate >= 0.0 && arrival_rate.is_finite()) {
            return Err(Error::Configuration(format!(
                "arrival rate must be finite and non-negative, got {}",
                arrival_rate
            )));
        }
        if arrival_rate == 0.0 {
            return Ok(EdgeDelayMetrics::unreachable());
        }

        let metrics = match self {
            Self::TbdFinite => tbd_finite(config, length, arrival_rate),
            Self::TbdInfinite => tbd_infinite(config, length, arrival_rate),
            Self::Vadd => vadd(config, length, arrival_rate),
            Self::Tsf => tsf(config, length, arrival_rate),
        };
        Ok(metrics.clamped())
    }
}

/// Computes the delay metrics of an edge under the configured model.
pub(crate) fn edge_delay_metrics(config: &EngineConfig, edge: &RoadSegment) -> Result<EdgeDelayMetrics> {
    sub_edge_delay_metrics(config, edge, edge.length())
}

/// Computes the delay metrics of the first `length` metres of an edge,
/// for a vehicle partway along it.
pub(crate) fn sub_edge_delay_metrics(
    config: &EngineConfig,
    edge: &RoadSegment,
    length: f64,
) -> Result<EdgeDelayMetrics> {
    let rate = arrival_rate(edge)?;
    config.edge_delay_model.evaluate(config, length, rate)
}

/// The arrival rate of vehicles on an edge, rejecting a zero mean interarrival time.
pub(crate) fn arrival_rate(edge: &RoadSegment) -> Result<f64> {
    match edge.stats().mean_interarrival() {
        None => Ok(0.0),
        Some(mean) if mean <= 0.0 => Err(Error::ZeroInterarrival { edge: edge.id() }),
        Some(mean) => Ok(1.0 / mean),
    }
}

/// Converts a convoy length and its variance into an edge delay, where the
/// convoy part is covered by radio hops and the rest is carried.
fn convoy_delay(config: &EngineConfig, length: f64, acl: f64, acl_variance: f64) -> EdgeDelayMetrics {
    let range = config.communication_range;
    let speed = config.vehicle_speed;
    let slope = config.hop_delay / range - 1.0 / speed;
    EdgeDelayMetrics {
        edge_delay: acl / range * config.hop_delay + (length - acl) / speed,
        edge_delay_variance: slope * slope * acl_variance,
        acl,
    }
}

fn tbd_finite(config: &EngineConfig, length: f64, rate: f64) -> EdgeDelayMetrics {
    // Falls back to carrying when no convoy forms
    let convoy = Convoy::new(config, rate);
    let (acl, variance) = convoy.finite_length(length, config.tolerance);
    convoy_delay(config, length, acl, variance)
}

fn tbd_infinite(config: &EngineConfig, length: f64, rate: f64) -> EdgeDelayMetrics {
    let convoy = Convoy::new(config, rate);
    let (acl, variance) = convoy.infinite_length(length, config.tolerance);
    convoy_delay(config, length, acl, variance)
}

/// The VADD delay model.
///
/// The variance is not derived for this model; the carry time `l/v` is
/// reported as its standard deviation.
fn vadd(config: &EngineConfig, length: f64, rate: f64) -> EdgeDelayMetrics {
    let range = config.communication_range;
    let speed = config.vehicle_speed;
    let density = rate / speed;
    let disconnected = (-range * density).exp();
    let carry = length / speed;
    EdgeDelayMetrics {
        edge_delay: (1.0 - disconnected) * length / range * config.hop_delay
            + disconnected * carry,
        edge_delay_variance: carry * carry,
        acl: (1.0 - disconnected) * length,
    }
}

/// The TSF delay model, where only the first `l - R` metres need forwarding.
fn tsf(config: &EngineConfig, length: f64, rate: f64) -> EdgeDelayMetrics {
    let range = config.communication_range;
    let speed = config.vehicle_speed;
    if length <= range {
        return EdgeDelayMetrics {
            edge_delay: length / speed,
            edge_delay_variance: 0.0,
            acl: length,
        };
    }

    let reduced = length - range;
    let convoy = Convoy::new(config, rate);
    let beta = convoy.beta;
    if is_zero(beta, config.tolerance) {
        return EdgeDelayMetrics::carry(length, speed);
    }
    let (acl, acl_variance) = convoy.finite_length(reduced, config.tolerance);

    // With probability `beta` a convoy is available on arrival,
    // otherwise the packet waits for the next vehicle.
    let connected = (reduced - acl) / speed;
    let waiting = 1.0 / rate + reduced / speed;
    let edge_delay = connected * beta + waiting * (1.0 - beta);
    let second_moment = beta * (acl_variance / (speed * speed) + connected * connected)
        + (1.0 - beta) * (1.0 / (rate * rate) + waiting * waiting);
    EdgeDelayMetrics {
        edge_delay,
        edge_delay_variance: f64::max(second_moment - edge_delay * edge_delay, 0.0),
        acl,
    }
}
