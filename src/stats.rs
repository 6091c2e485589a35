//! Per-edge traffic statistics accumulated by the host simulation.

/// Traffic observed on one road segment.
///
/// The host mobility layer owns and updates these; the engines only read them.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrafficStatistics {
    /// The sum of the observed vehicle interarrival times, in s.
    pub interarrival_sum: f64,
    /// The number of observed interarrival times.
    pub interarrival_count: u64,
    /// The number of vehicles which reached the head intersection via this edge.
    pub arrival_count: u64,
    /// The number of vehicles which turned onto this edge at its tail intersection.
    pub branch_count: u64,
}

impl TrafficStatistics {
    /// Records the time between two consecutive vehicles entering the edge.
    pub fn record_interarrival(&mut self, dt: f64) {
        self.interarrival_sum += dt;
        self.interarrival_count += 1;
    }

    /// Records a vehicle reaching the end of the edge.
    pub fn record_arrival(&mut self) {
        self.arrival_count += 1;
    }

    /// Records a vehicle turning onto the edge.
    pub fn record_branch(&mut self) {
        self.branch_count += 1;
    }

    /// Clears all the statistics.
    pub fn reset(&mut self) {
        *self = Default::default();
    }

    /// The mean vehicle interarrival time in s,
    /// or `None` if no interarrivals have been observed.
    pub fn mean_interarrival(&self) -> Option<f64> {
        match self.interarrival_count {
            0 => None,
            n => Some(self.interarrival_sum / n as f64),
        }
    }
}
