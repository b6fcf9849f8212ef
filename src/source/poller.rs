//! HTTP poller for admon XML endpoints.
//!
//! A [`Poller`] owns one request descriptor and the most recent successfully
//! parsed [`Document`]. Failed polls never discard that document; they set a
//! sticky error which every guarded accessor reports until the next success.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use admon_types::{ChartPoint, QuotaLimitRow, QuotaRow, StatTable, StatsKind};
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use tokio::sync::watch;
use tracing::{error, trace, warn};

use super::{Document, RequestDescriptor};
use crate::error::{CommunicationError, PollError};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct PollState {
    document: Arc<Document>,
    error: Option<String>,
}

/// Fetches XML documents from one daemon endpoint and serves typed views of
/// the latest one.
///
/// Share it as `Arc<Poller>` between a refresh loop and its consumers.
///
/// # Example
///
/// ```rust,no_run
/// use admon_watch::source::{DaemonAddress, Poller};
///
/// # tokio_test::block_on(async {
/// let address = DaemonAddress::new("localhost", 8000);
/// let poller = Poller::new(address.request("XML_GetQuota").with_param("idType", "user"));
///
/// if poller.poll().await {
///     for row in poller.quota_rows().unwrap_or_default() {
///         println!("{:?}", row);
///     }
/// }
/// # });
/// ```
#[derive(Debug)]
pub struct Poller {
    name: String,
    client: Client,
    request: Mutex<RequestDescriptor>,
    state: RwLock<PollState>,
    arrivals: watch::Sender<u64>,
}

impl Poller {
    /// Create a poller with default settings.
    pub fn new(request: RequestDescriptor) -> Self {
        Self::builder().request(request).build()
    }

    /// Create a new builder for configuring the poller.
    pub fn builder() -> PollerBuilder {
        PollerBuilder::default()
    }

    /// Name used in log output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A copy of the current request descriptor.
    pub fn request(&self) -> RequestDescriptor {
        self.request.lock().clone()
    }

    /// Replace the request descriptor used by the next poll.
    pub fn set_request(&self, request: RequestDescriptor) {
        *self.request.lock() = request;
    }

    /// Replace the target URL used by the next poll. Parameters are kept.
    pub fn set_request_url(&self, url: impl Into<String>) {
        self.request.lock().set_url(url);
    }

    /// Set a request parameter for the next poll.
    pub fn set_param(&self, key: impl Into<String>, value: impl ToString) {
        self.request.lock().set_param(key, value);
    }

    /// Remove a request parameter.
    pub fn remove_param(&self, key: &str) -> Option<String> {
        self.request.lock().remove_param(key)
    }

    /// Fetch and parse the current request.
    ///
    /// Returns true and replaces the document on success. On any failure the
    /// previous document is kept, the error state is set and false is
    /// returned.
    pub async fn poll(&self) -> bool {
        let request = self.request();
        match self.fetch(&request).await {
            Ok(document) => {
                self.publish(document);
                true
            }
            Err(e) => {
                error!(poller = %self.name, request = %request, "Communication error: {}", e);
                self.fail(e);
                false
            }
        }
    }

    async fn fetch(&self, request: &RequestDescriptor) -> Result<Document, PollError> {
        if request.url().is_empty() {
            return Err(PollError::InvalidUrl(String::new()));
        }
        let url = reqwest::Url::parse(request.url())
            .map_err(|e| PollError::InvalidUrl(format!("{}: {}", request.url(), e)))?;

        trace!(poller = %self.name, request = %request, "polling");
        let response = self
            .client
            .get(url)
            .query(request.params())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PollError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        Document::parse(&body)
    }

    /// Treat `body` as a freshly fetched response.
    ///
    /// Used for responses obtained outside [`poll`](Self::poll), such as
    /// command submissions. The request descriptor is not touched.
    pub fn ingest(&self, body: &[u8]) -> bool {
        match Document::parse(body) {
            Ok(document) => {
                self.publish(document);
                true
            }
            Err(e) => {
                error!(poller = %self.name, "Failed to read response: {}", e);
                self.fail(e);
                false
            }
        }
    }

    fn publish(&self, document: Document) {
        {
            let mut state = self.state.write();
            state.document = Arc::new(document);
            state.error = None;
        }
        self.arrivals.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    fn fail(&self, err: PollError) {
        self.state.write().error = Some(err.to_string());
    }

    /// Subscribe to document arrivals.
    ///
    /// The value is a generation counter bumped on every successful poll or
    /// ingest; receivers only care that it changed.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.arrivals.subscribe()
    }

    /// Message of the last failure, if no poll has succeeded since.
    pub fn last_error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn has_error(&self) -> bool {
        self.state.read().error.is_some()
    }

    /// The current document, whether or not the last poll failed.
    pub fn document(&self) -> Arc<Document> {
        self.state.read().document.clone()
    }

    /// The current document, if the last poll succeeded.
    ///
    /// Use this when several projections must come from the same response.
    pub fn snapshot(&self) -> Result<Arc<Document>, CommunicationError> {
        self.read(Arc::clone)
    }

    fn read<T>(&self, project: impl FnOnce(&Arc<Document>) -> T) -> Result<T, CommunicationError> {
        let state = self.state.read();
        if let Some(message) = &state.error {
            return Err(CommunicationError::new(message.clone()));
        }
        Ok(project(&state.document))
    }

    /// Text of a direct child of the root.
    pub fn scalar(&self, name: &str) -> Result<String, CommunicationError> {
        self.read(|doc| doc.scalar(name).to_string())
    }

    /// Text of `name` inside the root's child `parent`.
    pub fn scalar_in(&self, name: &str, parent: &str) -> Result<String, CommunicationError> {
        self.read(|doc| doc.scalar_in(name, parent).to_string())
    }

    pub fn string_list(&self, name: Option<&str>) -> Result<Vec<String>, CommunicationError> {
        self.read(|doc| doc.string_list(name))
    }

    pub fn map(&self, name: Option<&str>) -> Result<BTreeMap<String, String>, CommunicationError> {
        self.read(|doc| doc.map(name))
    }

    pub fn attribute_map(
        &self,
        name: Option<&str>,
        attr: &str,
    ) -> Result<BTreeMap<String, String>, CommunicationError> {
        self.read(|doc| doc.attribute_map(name, attr))
    }

    pub fn chart_series(&self, name: &str) -> Result<Vec<ChartPoint>, CommunicationError> {
        self.read(|doc| doc.chart_series(name))
    }

    pub fn stat_table(&self, kind: StatsKind) -> Result<StatTable, CommunicationError> {
        self.read(|doc| doc.stat_table(kind))
    }

    pub fn quota_rows(&self) -> Result<Vec<QuotaRow>, CommunicationError> {
        self.read(|doc| doc.quota_rows())
    }

    pub fn quota_limit_rows(&self) -> Result<Vec<QuotaLimitRow>, CommunicationError> {
        self.read(|doc| doc.quota_limit_rows())
    }

    pub fn attribute_records(
        &self,
        name: Option<&str>,
    ) -> Result<Vec<BTreeMap<String, String>>, CommunicationError> {
        self.read(|doc| doc.attribute_records(name))
    }

    pub fn descendant_attribute_maps(
        &self,
        tag: &str,
        attr: &str,
    ) -> Result<Vec<BTreeMap<String, String>>, CommunicationError> {
        self.read(|doc| doc.descendant_attribute_maps(tag, attr))
    }
}

/// Builder for [`Poller`].
#[derive(Debug, Default)]
pub struct PollerBuilder {
    name: Option<String>,
    request: Option<RequestDescriptor>,
    timeout: Option<Duration>,
    client: Option<Client>,
}

impl PollerBuilder {
    /// Name used in log output (default: the request URL).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The request to poll.
    pub fn request(mut self, request: RequestDescriptor) -> Self {
        self.request = Some(request);
        self
    }

    /// Set the request timeout (default: 10 seconds). Ignored when a client
    /// is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Share an existing HTTP client and its connection pool.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the poller.
    pub fn build(self) -> Poller {
        let request = self.request.unwrap_or_default();
        let client = self
            .client
            .unwrap_or_else(|| http_client(self.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT)));
        let (arrivals, _) = watch::channel(0);

        Poller {
            name: self.name.unwrap_or_else(|| request.url().to_string()),
            client,
            request: Mutex::new(request),
            state: RwLock::new(PollState {
                document: Arc::new(Document::empty()),
                error: None,
            }),
            arrivals,
        }
    }
}

/// An HTTP client with the given request timeout.
pub fn http_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        warn!("Failed to configure HTTP client, using defaults: {}", e);
        Client::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const GENERAL: &str =
        "<data><general><nodeCount>4</nodeCount><rootNode>meta01</rootNode></general></data>";

    #[test]
    fn test_fresh_poller_is_empty_not_failed() {
        let poller = Poller::new(RequestDescriptor::new("http://localhost:8000/XML_NodeList"));
        assert!(!poller.has_error());
        assert_eq!(poller.scalar("anything").unwrap(), "");
        assert!(poller.map(None).unwrap().is_empty());
        assert_eq!(poller.document().root().name(), "data");
    }

    #[test]
    fn test_builder_defaults_name_to_url() {
        let poller = Poller::builder()
            .request(RequestDescriptor::new("http://h:1/XML_Storagenodes"))
            .build();
        assert_eq!(poller.name(), "http://h:1/XML_Storagenodes");

        let named = Poller::builder().name("storage").build();
        assert_eq!(named.name(), "storage");
        assert_eq!(named.request().url(), "");
    }

    #[tokio::test]
    async fn test_poll_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/XML_MetanodesOverview");
                then.status(200).body(GENERAL);
            })
            .await;

        let poller = Poller::new(RequestDescriptor::new(server.url("/XML_MetanodesOverview")));
        assert!(poller.poll().await);

        mock.assert_async().await;
        let general = poller.map(Some("general")).unwrap();
        assert_eq!(general["nodeCount"], "4");
        assert_eq!(poller.scalar_in("rootNode", "general").unwrap(), "meta01");
    }

    #[tokio::test]
    async fn test_poll_sends_params() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/XML_GetQuota")
                    .query_param("idType", "group")
                    .query_param("showZeros", "false");
                then.status(200).body("<data><quotas/></data>");
            })
            .await;

        let poller = Poller::new(
            RequestDescriptor::new(server.url("/XML_GetQuota"))
                .with_param("idType", "user")
                .with_param("showZeros", false),
        );
        poller.set_param("idType", "group");

        assert!(poller.poll().await);
        mock.assert_async().await;
        assert!(poller.quota_rows().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_round_trip() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/XML_Good");
                then.status(200).body(GENERAL);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/XML_Broken");
                then.status(500);
            })
            .await;

        let poller = Poller::new(RequestDescriptor::new(server.url("/XML_Good")));
        assert!(poller.poll().await);

        poller.set_request_url(server.url("/XML_Broken"));
        assert!(!poller.poll().await);
        let err = poller.map(Some("general")).unwrap_err();
        assert!(err.message.contains("500"));
        assert!(poller.has_error());
        assert!(poller.snapshot().is_err());

        // stale document stays available for status displays
        assert_eq!(poller.document().scalar_in("nodeCount", "general"), "4");

        poller.set_request_url(server.url("/XML_Good"));
        assert!(poller.poll().await);
        assert!(!poller.has_error());
        assert_eq!(poller.map(Some("general")).unwrap()["nodeCount"], "4");
    }

    #[tokio::test]
    async fn test_malformed_body_keeps_previous_document() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/XML_Garbage");
                then.status(200).body("<data><unclosed></data>");
            })
            .await;

        let poller = Poller::new(RequestDescriptor::new(server.url("/XML_Garbage")));
        assert!(poller.ingest(GENERAL.as_bytes()));
        assert!(!poller.poll().await);

        assert!(poller.last_error().unwrap().contains("parse"));
        assert_eq!(poller.document().scalar_in("rootNode", "general"), "meta01");
    }

    #[tokio::test]
    async fn test_invalid_url_fails() {
        let poller = Poller::new(RequestDescriptor::default());
        assert!(!poller.poll().await);
        assert!(poller.scalar("x").is_err());

        poller.set_request_url("not a url");
        assert!(!poller.poll().await);
        assert!(poller.last_error().unwrap().contains("not a url"));
    }

    #[tokio::test]
    async fn test_connection_refused_fails() {
        let poller = Poller::builder()
            .request(RequestDescriptor::new("http://127.0.0.1:1/XML_NodeList"))
            .timeout(Duration::from_secs(2))
            .build();
        assert!(!poller.poll().await);
        assert!(poller.has_error());
    }

    #[test]
    fn test_ingest_keeps_request() {
        let poller = Poller::new(RequestDescriptor::new("http://h:1/XML_GetNonce"));
        assert!(poller.ingest(b"<data><id>3</id><nonce>99</nonce></data>"));
        assert_eq!(poller.request().url(), "http://h:1/XML_GetNonce");
        assert_eq!(poller.scalar("nonce").unwrap(), "99");

        assert!(!poller.ingest(b"not xml"));
        assert!(poller.scalar("nonce").is_err());
        assert!(poller.ingest(b"<data/>"));
        assert_eq!(poller.scalar("nonce").unwrap(), "");
    }

    #[test]
    fn test_arrivals_only_on_success() {
        let poller = Poller::new(RequestDescriptor::default());
        let mut arrivals = poller.subscribe();
        assert!(!arrivals.has_changed().unwrap());

        assert!(!poller.ingest(b"<broken"));
        assert!(!arrivals.has_changed().unwrap());

        assert!(poller.ingest(b"<data/>"));
        assert!(arrivals.has_changed().unwrap());
        assert_eq!(*arrivals.borrow_and_update(), 1);
    }

    #[test]
    fn test_snapshot_swap_is_atomic() {
        let poller = Arc::new(Poller::new(RequestDescriptor::default()));
        assert!(poller.ingest(b"<data><a>0</a><b>0</b></data>"));

        let writer = {
            let poller = poller.clone();
            std::thread::spawn(move || {
                for i in 1..=200 {
                    let body = format!("<data><a>{i}</a><b>{i}</b></data>");
                    assert!(poller.ingest(body.as_bytes()));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let poller = poller.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let doc = poller.snapshot().unwrap();
                        assert_eq!(doc.scalar("a"), doc.scalar("b"));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(poller.scalar("a").unwrap(), "200");
    }
}
