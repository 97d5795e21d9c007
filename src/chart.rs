use serde::Serialize;
use std::collections::VecDeque;

use crate::config::MAX_CHART_POINTS;
use crate::logging::log_chart_evict;

pub const TWAP_SERIES: &str = "TWAP Bot Output";
pub const SMART_SERIES: &str = "Smart Bot Output";

/// Rolling window of chart samples: three parallel sequences kept at
/// equal length, oldest evicted first once the cap is exceeded.
#[derive(Debug, Clone)]
pub struct ChartBuffer {
    labels: VecDeque<String>,
    twap: VecDeque<f64>,
    smart: VecDeque<f64>,
    cap: usize,
}

impl Default for ChartBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_CHART_POINTS)
    }

    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            labels: VecDeque::with_capacity(cap + 1),
            twap: VecDeque::with_capacity(cap + 1),
            smart: VecDeque::with_capacity(cap + 1),
            cap,
        }
    }

    /// Push one point; the cap is enforced after the insert, never before.
    pub fn append(&mut self, label: impl Into<String>, twap: f64, smart: f64) {
        self.labels.push_back(label.into());
        self.twap.push_back(twap);
        self.smart.push_back(smart);

        if self.labels.len() > self.cap {
            let evicted = self.labels.pop_front();
            self.twap.pop_front();
            self.smart.pop_front();
            if let Some(label) = evicted {
                log_chart_evict(&label, self.labels.len());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn twap(&self) -> impl Iterator<Item = f64> + '_ {
        self.twap.iter().copied()
    }

    pub fn smart(&self) -> impl Iterator<Item = f64> + '_ {
        self.smart.iter().copied()
    }

    /// Buffer contents verbatim, in the shape the chart surface draws.
    pub fn data(&self) -> ChartData {
        ChartData {
            labels: self.labels.iter().cloned().collect(),
            datasets: vec![
                Dataset {
                    label: TWAP_SERIES.to_string(),
                    data: self.twap.iter().copied().collect(),
                },
                Dataset {
                    label: SMART_SERIES.to_string(),
                    data: self.smart.iter().copied().collect(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}
