use crate::EngineConfig;

/// Statistics of the vehicle convoys formed on a road with Poisson arrivals.
///
/// Consecutive vehicles are connected when their spacing is within
/// communication range, which happens with probability `beta`.
#[derive(Clone, Copy, Debug)]
pub(super) struct Convoy {
    /// First moment term of a connected inter-vehicle gap, in m.
    pub alpha: f64,
    /// Probability that two consecutive vehicles are connected.
    pub beta: f64,
    /// Second moment term of a connected inter-vehicle gap, in m<sup>2</sup>.
    pub gamma: f64,
}

impl Convoy {
    /// Derives the convoy statistics for vehicles arriving at `rate` vehicles/s.
    pub fn new(config: &EngineConfig, rate: f64) -> Self {
        let speed = config.vehicle_speed;
        let a = config.communication_range / speed;
        let q = f64::exp(-rate * a);
        let inv = 1.0 / rate;
        Self {
            alpha: speed * q * (inv - (a + inv) * q),
            beta: 1.0 - q,
            gamma: speed * speed * q * (2.0 * inv * inv - (a * a + 2.0 * a * inv + 2.0 * inv * inv) * q),
        }
    }

    /// The mean and variance of the length of one connected gap.
    fn gap_moments(&self) -> (f64, f64) {
        let mean = self.alpha / self.beta;
        let variance = f64::max(self.gamma / self.beta - mean * mean, 0.0);
        (mean, variance)
    }

    /// The average convoy length on a road of `length` m and its variance,
    /// accounting for the convoy being cut off at the end of the road.
    pub fn finite_length(&self, length: f64, tolerance: f64) -> (f64, f64) {
        let Self { alpha, beta, .. } = *self;
        if alpha <= tolerance {
            return (0.0, 0.0);
        }
        if 1.0 - beta <= tolerance {
            return (length, 0.0);
        }

        // The maximum number of gaps that fit on the road
        let n = (beta * (1.0 - beta) / alpha * length).ceil();
        let beta_n = beta.powf(n);
        let beta_n1 = if n >= 1.0 { beta.powf(n - 1.0) } else { 0.0 };
        let b = f64::max((n - 1.0) * beta_n - n * beta_n1 + 1.0, 0.0);
        let acl = (alpha / (1.0 - beta).powi(2) * b + length * beta_n).clamp(0.0, length);

        // Number of connected gaps, truncated at `n`
        let mean_k = beta * (1.0 - beta_n) / (1.0 - beta);
        let sum_k = beta * (1.0 - (n + 1.0) * beta_n + n * beta_n * beta) / (1.0 - beta).powi(2);
        let var_k = f64::max(2.0 * sum_k - mean_k - mean_k * mean_k, 0.0);

        let (gap_mean, gap_var) = self.gap_moments();
        let variance = (mean_k * gap_var + var_k * gap_mean * gap_mean).clamp(0.0, length * length);
        (acl, variance)
    }

    /// The average convoy length and its variance, ignoring the end of the road
    /// except to bound the length by `length`.
    pub fn infinite_length(&self, length: f64, tolerance: f64) -> (f64, f64) {
        let Self { alpha, beta, gamma } = *self;
        if alpha <= tolerance {
            return (0.0, 0.0);
        }
        if 1.0 - beta <= tolerance {
            return (length, 0.0);
        }
        let disconnect = 1.0 - beta;
        let acl = (alpha / (disconnect * disconnect)).clamp(0.0, length);
        let variance = (gamma / disconnect + alpha * alpha / (disconnect * disconnect))
            .clamp(0.0, length * length);
        (acl, variance)
    }
}
