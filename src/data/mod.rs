//! View-side state derived from successive documents.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "2s", "500ms")
//! - [`history`]: Chart history for sparklines and rate calculations
//! - [`stats_session`]: Requestor and sequence tracking for the statistics endpoints
//! - [`timespan`]: Chart time spans and their conversion to minutes
//!
//! ## Data Flow
//!
//! ```text
//! Poller ──▶ Arc<Document>
//!                 │
//!                 ├──▶ ChartHistory::record_document() (for sparklines)
//!                 │
//!                 └──▶ StatsSession::observe() ──▶ StatTable
//! ```

pub mod duration;
pub mod history;
pub mod stats_session;
pub mod timespan;

pub use history::{ChartHistory, MAX_HISTORY_SIZE};
pub use stats_session::{StatsProgress, StatsSession, FIRST_DATA_SEQUENCE_ID, WAITING_LABEL};
pub use timespan::{TimeSpan, TimeSpanError, TimeUnit};
