//! # admon-types
//!
//! Shared data shapes for clients of the admon daemon, the management
//! daemon of a distributed filesystem cluster. The daemon publishes cluster
//! state as XML documents; these types are the fixed-layout projections the
//! console views consume.
//!
//! ## Contents
//!
//! - [`ChartPoint`]: one `(time, value)` sample of a performance chart
//! - [`StatTable`]: per-host operation counters with an aggregate row
//! - [`OpFamily`] / [`StatsKind`]: the operation enumerations that define
//!   stat table columns
//! - [`QuotaRow`] / [`QuotaLimitRow`]: fixed-column quota records
//!
//! ## Features
//!
//! - `serde`: Serialize/deserialize support via serde
//!
//! ## Example
//!
//! ```rust
//! use admon_types::{OpFamily, StatTable, SUM_LABEL};
//!
//! let mut table = StatTable::new(OpFamily::Storage);
//! table.push_row(SUM_LABEL).set_column(1, "42");
//!
//! assert_eq!(table.cell(0, 0), Some(SUM_LABEL));
//! assert_eq!(table.cell(0, 1), Some("42"));
//! ```

mod chart;
mod ops;
mod quota;
mod stats;

pub use chart::*;
pub use ops::*;
pub use quota::*;
pub use stats::*;
