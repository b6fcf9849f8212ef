//! Chart history for sparklines and rate calculations.

use std::collections::{HashMap, VecDeque};

use admon_types::ChartPoint;
use tracing::trace;

use crate::source::Document;

/// Maximum number of points kept per series.
pub const MAX_HISTORY_SIZE: usize = 60;

/// Accumulates chart series across successive documents.
///
/// Daemon chart responses overlap: each one carries the whole requested
/// time span. Recording a series appends only the points newer than the
/// last one already held, so the history grows by what actually changed.
#[derive(Debug, Clone, Default)]
pub struct ChartHistory {
    series: HashMap<String, VecDeque<ChartPoint>>,
}

impl ChartHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a series. Returns the number of points appended.
    ///
    /// If the incoming series ends before the recorded one (the daemon was
    /// restarted or the time span changed), the recorded series is replaced.
    pub fn record(&mut self, name: &str, points: &[ChartPoint]) -> usize {
        let history = self.series.entry(name.to_string()).or_default();

        if let (Some(last), Some(incoming)) = (history.back(), points.last()) {
            if incoming.time < last.time {
                trace!(series = name, "series went back in time, resetting history");
                history.clear();
            }
        }

        let newest = history.back().map(|point| point.time);
        let mut appended = 0;
        for point in points {
            if newest.is_some_and(|newest| point.time <= newest) {
                continue;
            }
            history.push_back(*point);
            appended += 1;
            if history.len() > MAX_HISTORY_SIZE {
                history.pop_front();
            }
        }
        appended
    }

    /// Merge the named series of a document.
    pub fn record_document(&mut self, document: &Document, names: &[&str]) {
        for name in names {
            let points = document.chart_series(name);
            self.record(name, &points);
        }
    }

    /// Recorded points of a series, oldest first.
    pub fn points(&self, name: &str) -> Option<&VecDeque<ChartPoint>> {
        self.series.get(name)
    }

    /// The newest point of a series.
    pub fn latest(&self, name: &str) -> Option<ChartPoint> {
        self.series.get(name)?.back().copied()
    }

    /// Values of a series normalized to 0-7 for 8 bar levels.
    ///
    /// Returns an empty Vec if there's not enough history.
    pub fn sparkline(&self, name: &str) -> Vec<u8> {
        let Some(points) = self.series.get(name) else {
            return Vec::new();
        };
        if points.len() < 2 {
            return Vec::new();
        }

        let max = points.iter().map(|p| p.value).fold(f64::MIN, f64::max).max(1.0);
        let min = points.iter().map(|p| p.value).fold(f64::MAX, f64::min).min(0.0);
        let range = max - min;

        points
            .iter()
            .map(|p| {
                let normalized = ((p.value - min) / range * 7.0) as u8;
                normalized.min(7)
            })
            .collect()
    }

    /// Change of the series value per second between the last two points.
    ///
    /// Returns None if there's not enough history to calculate a rate.
    pub fn rate(&self, name: &str) -> Option<f64> {
        let points = self.series.get(name)?;
        if points.len() < 2 {
            return None;
        }

        let current = points.back()?;
        let previous = points.get(points.len() - 2)?;
        let elapsed = current.time - previous.time;

        if elapsed > 0.0 {
            Some((current.value - previous.value) / elapsed)
        } else {
            None
        }
    }
}
