//! # admon-watch
//!
//! A polling client for the admon daemon, the management daemon of a
//! distributed filesystem cluster. The daemon publishes cluster state (node
//! overviews, operation statistics, quota, chart series) as XML documents
//! over HTTP; this crate fetches them, keeps the latest good copy, and
//! serves typed projections to console views.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                                                              │
//! │  ┌──────────┐   poll()    ┌─────────┐   Arc<Document>        │
//! │  │ Refresh  │───────────▶│ Poller  │──────────────┐         │
//! │  │  Loop    │             │ (source)│              ▼         │
//! │  └────┬─────┘             └─────────┘        ┌──────────┐    │
//! │       │ Updates::next()                      │   app    │    │
//! │       └────────────────────────────────────▶│ (views)  │    │
//! │                                              └──────────┘    │
//! │  ┌──────────┐  nonce + secret                                │
//! │  │ command  │──────────────▶ XML_* endpoints (POST)         │
//! │  └──────────┘                                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: request descriptors, the [`Poller`] and the immutable
//!   [`Document`] with its typed projections
//! - **[`refresh`]**: one-shot and periodic refresh loops with bounded
//!   consumer waits and prompt stop
//! - **[`command`]**: nonce handshake and authenticated command submission
//! - **[`data`]**: view-side state: chart history, statistics sessions,
//!   time spans
//! - **[`app`]**: text and JSON rendering of the views
//! - **[`config`]**: file and environment configuration
//!
//! Every accessor of a [`Poller`] reports a [`CommunicationError`] while the
//! last poll failed, so views can tell an unreachable daemon apart from a
//! valid but empty answer. The previous document stays available through
//! [`Poller::document`] for status displays.
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Print the metadata node overview once
//! admon-watch --host admon.local get XML_MetanodesOverview --view map --name general
//!
//! # Follow client storage statistics
//! admon-watch stats client-storage
//!
//! # Follow the request charts of the last hour
//! admon-watch chart XML_MetanodesOverview -s workRequests -s queuedRequests --time-span "1 h"
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use admon_watch::{DaemonAddress, Poller, RefreshLoop, Update};
//!
//! # tokio_test::block_on(async {
//! let address = DaemonAddress::new("admon.local", 8000);
//! let poller = Arc::new(Poller::new(address.request("XML_MetanodesOverview")));
//! let handle = RefreshLoop::new(poller.clone()).start();
//!
//! let mut updates = handle.updates();
//! if let Update::Data(document) = updates.next().await {
//!     println!("{:?}", document.map(Some("general")));
//! }
//! handle.shutdown().await;
//! # });
//! ```

pub mod app;
pub mod command;
pub mod config;
pub mod data;
pub mod error;
pub mod refresh;
pub mod source;

pub use command::{CommandClient, CommandOutcome, Nonce, SecretSigner, Sha256Signer};
pub use config::ClientConfig;
pub use data::{ChartHistory, StatsProgress, StatsSession, TimeSpan};
pub use error::{CommandError, CommunicationError, PollError};
pub use refresh::{LoopState, RefreshHandle, RefreshLoop, RefreshMode, Update, Updates};
pub use source::{DaemonAddress, Document, Element, Poller, RequestDescriptor};

pub use admon_types::{
    ChartPoint, OpFamily, QuotaIdType, QuotaLimitRow, QuotaRow, StatTable, StatsKind,
};
