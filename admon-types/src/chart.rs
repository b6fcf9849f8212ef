//! Chart samples.

/// A single sample of a time series chart.
///
/// `time` is in seconds since the epoch as sent by the daemon; the client
/// never re-sorts points, so a series keeps the order of the source document.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartPoint {
    /// Sample timestamp in seconds.
    pub time: f64,
    /// Sample value.
    pub value: f64,
}

impl ChartPoint {
    /// Create a new chart point.
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

impl From<(f64, f64)> for ChartPoint {
    fn from((time, value): (f64, f64)) -> Self {
        Self::new(time, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tuple() {
        let point: ChartPoint = (2000.0, 7.0).into();
        assert_eq!(point, ChartPoint::new(2000.0, 7.0));
    }
}
