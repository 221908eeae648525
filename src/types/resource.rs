use std::collections::VecDeque;

use serde::Serialize;
use tokio::time::Instant;

/// Number of samples kept per tab; the oldest is evicted first.
pub const HISTORY_CAPACITY: usize = 10;

/// Weights applied to the 1, 5 and 15 minute load averages.
const LOAD_WEIGHTS: [f64; 3] = [1.0, 0.5, 0.25];

/// One usage measurement attributed to a tab.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSample {
    pub tab_id: String,
    pub memory_mb: f64,
    pub cpu_percent: f64,
    pub taken_at: Instant,
}

impl ResourceSample {
    pub fn new(tab_id: &str, memory_mb: f64, cpu_percent: f64) -> Self {
        Self {
            tab_id: tab_id.to_string(),
            memory_mb,
            cpu_percent,
            taken_at: Instant::now(),
        }
    }
}

/// Bounded rolling window of samples for one tab.
#[derive(Debug, Clone)]
pub struct ResourceHistory {
    samples: VecDeque<ResourceSample>,
    last_check: Instant,
}

impl ResourceHistory {
    pub fn new(last_check: Instant) -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY_CAPACITY),
            last_check,
        }
    }

    pub fn push(&mut self, sample: ResourceSample) {
        if self.samples.len() == HISTORY_CAPACITY {
            self.samples.pop_front();
        }
        self.last_check = sample.taken_at;
        self.samples.push_back(sample);
    }

    pub fn samples(&self) -> impl Iterator<Item = &ResourceSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last_check(&self) -> Instant {
        self.last_check
    }

    pub fn avg_memory_mb(&self) -> f64 {
        self.average(|s| s.memory_mb)
    }

    pub fn avg_cpu_percent(&self) -> f64 {
        self.average(|s| s.cpu_percent)
    }

    fn average(&self, field: impl Fn(&ResourceSample) -> f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(field).sum::<f64>() / self.samples.len() as f64
    }
}

/// Process-wide usage reading produced by a resource probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceMeasurement {
    pub resident_memory_mb: f64,
    /// 1, 5 and 15 minute load averages.
    pub load_average: [f64; 3],
    pub cpu_count: usize,
}

impl ResourceMeasurement {
    /// Weighted load average as a percentage of total processing capacity.
    pub fn cpu_percent(&self) -> f64 {
        let weight_sum: f64 = LOAD_WEIGHTS.iter().sum();
        let weighted: f64 = self
            .load_average
            .iter()
            .zip(LOAD_WEIGHTS.iter())
            .map(|(load, weight)| load * weight)
            .sum();
        let cpus = self.cpu_count.max(1) as f64;
        weighted / weight_sum / cpus * 100.0
    }
}

/// Observational counters exposed by the governor.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GovernorStats {
    pub tracked_tabs: usize,
    pub tabs_with_samples: usize,
    pub consecutive_suspensions: u32,
}

/// Operating system power transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    Suspend,
    Resume,
}
