//! Chart time spans such as "10 min" or "1 d".
//!
//! Overview endpoints take the displayed span in minutes
//! (`timeSpanRequests`, `timeSpanPerf`).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn minutes(self) -> u64 {
        match self {
            TimeUnit::Minutes => 1,
            TimeUnit::Hours => 60,
            TimeUnit::Days => 24 * 60,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = TimeSpanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "min" | "mins" | "minute" | "minutes" => Ok(TimeUnit::Minutes),
            "h" | "hour" | "hours" => Ok(TimeUnit::Hours),
            "d" | "day" | "days" => Ok(TimeUnit::Days),
            _ => Err(TimeSpanError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid time span '{0}', expected e.g. \"10 min\", \"6 h\" or \"1 d\"")]
pub struct TimeSpanError(pub String);

/// A value with a time unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    pub value: f64,
    pub unit: TimeUnit,
}

impl TimeSpan {
    pub fn new(value: f64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    /// Whole minutes, truncated.
    pub fn to_minutes(&self) -> u64 {
        (self.value * self.unit.minutes() as f64).max(0.0) as u64
    }
}

impl Default for TimeSpan {
    fn default() -> Self {
        Self::new(10.0, TimeUnit::Minutes)
    }
}

impl FromStr for TimeSpan {
    type Err = TimeSpanError;

    /// Parses "10 min", "6h" or "1.5 days".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| TimeSpanError(s.to_string()))?;
        let (value, unit) = s.split_at(split);

        let value: f64 = value.parse().map_err(|_| TimeSpanError(s.to_string()))?;
        let unit = unit.trim().parse().map_err(|_| TimeSpanError(s.to_string()))?;
        Ok(Self::new(value, unit))
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.symbol())
    }
}
