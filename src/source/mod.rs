//! Fetching and reading admon XML documents.
//!
//! - [`RequestDescriptor`] / [`DaemonAddress`]: what to fetch
//! - [`Poller`]: fetches one endpoint and holds the latest [`Document`]
//! - [`Document`]: an immutable parsed response with typed projections

mod document;
mod poller;
mod request;

pub use document::{Document, Element, EMPTY_ROOT, VALUE_KEY};
pub use poller::{http_client, Poller, PollerBuilder, DEFAULT_REQUEST_TIMEOUT};
pub use request::{DaemonAddress, RequestDescriptor};
