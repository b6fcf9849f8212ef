//! Authenticated command submission.
//!
//! Commands that change daemon state (quota limits, mail settings, service
//! start/stop) use a nonce handshake: fetch a one-time nonce from
//! `XML_GetNonce`, combine it with the admin credential through a
//! [`SecretSigner`], and post the command parameters together with
//! `nonceID` and `secret`. The response is an ordinary XML document read
//! through a [`Poller`].

use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{CommandError, CommunicationError, PollError};
use crate::source::{
    http_client, DaemonAddress, Document, Poller, RequestDescriptor, DEFAULT_REQUEST_TIMEOUT,
};

/// Endpoint handing out nonces.
pub const NONCE_ENDPOINT: &str = "XML_GetNonce";

/// Turns a nonce into the `secret` request parameter.
pub trait SecretSigner: Send + Sync {
    fn sign(&self, nonce: i64) -> String;
}

impl<F> SecretSigner for F
where
    F: Fn(i64) -> String + Send + Sync,
{
    fn sign(&self, nonce: i64) -> String {
        self(nonce)
    }
}

/// Hex-encoded SHA-256 of the password followed by the decimal nonce.
///
/// This is a placeholder scheme, not the daemon's own. The daemon checks
/// the secret against the MD5 digest of the admin password combined with
/// the nonce, and that combination is not reproduced here, so a stock
/// daemon rejects this signer. Deployments talking to such a daemon pass
/// their own [`SecretSigner`] (any `Fn(i64) -> String` works) to
/// [`CommandClient::new`].
#[derive(Clone)]
pub struct Sha256Signer {
    password: String,
}

impl Sha256Signer {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl SecretSigner for Sha256Signer {
    fn sign(&self, nonce: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.password.as_bytes());
        hasher.update(nonce.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for Sha256Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sha256Signer")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A one-time nonce issued by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce {
    pub id: i32,
    pub nonce: i64,
}

impl Nonce {
    fn from_document(document: &Document) -> Result<Self, CommandError> {
        let id = document.scalar("id");
        let nonce = document.scalar("nonce");
        let id = id
            .trim()
            .parse()
            .map_err(|_| CommandError::InvalidNonce(format!("id '{}'", id)))?;
        let nonce = nonce
            .trim()
            .parse()
            .map_err(|_| CommandError::InvalidNonce(format!("nonce '{}'", nonce)))?;
        Ok(Self { id, nonce })
    }
}

/// The daemon's answer to a command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// False if the daemon rejected the secret.
    pub authenticated: bool,
    /// Messages of the `errors` list.
    pub errors: Vec<String>,
    /// The whole response.
    pub document: Arc<Document>,
}

impl CommandOutcome {
    /// Authenticated and without reported errors.
    pub fn is_success(&self) -> bool {
        self.authenticated && self.errors.is_empty()
    }
}

/// Submits authenticated commands to one daemon.
pub struct CommandClient {
    address: DaemonAddress,
    client: Client,
    signer: Arc<dyn SecretSigner>,
}

impl CommandClient {
    pub fn new(address: DaemonAddress, signer: impl SecretSigner + 'static) -> Self {
        Self {
            address,
            client: http_client(DEFAULT_REQUEST_TIMEOUT),
            signer: Arc::new(signer),
        }
    }

    /// Share an existing HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn address(&self) -> &DaemonAddress {
        &self.address
    }

    fn poller(&self, name: &str, request: RequestDescriptor) -> Poller {
        Poller::builder()
            .name(name)
            .request(request)
            .client(self.client.clone())
            .build()
    }

    /// Request a fresh nonce.
    pub async fn fetch_nonce(&self) -> Result<Nonce, CommandError> {
        let poller = self.poller(NONCE_ENDPOINT, self.address.request(NONCE_ENDPOINT));
        if !poller.poll().await {
            return Err(communication_error(&poller).into());
        }
        let nonce = Nonce::from_document(&*poller.snapshot()?)?;
        debug!(id = nonce.id, "received nonce");
        Ok(nonce)
    }

    /// Sign and post a command.
    ///
    /// A rejected secret is reported through
    /// [`CommandOutcome::authenticated`], not as an error.
    pub async fn submit<I, K, V>(&self, endpoint: &str, params: I) -> Result<CommandOutcome, CommandError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let nonce = self.fetch_nonce().await?;

        let mut form: Vec<(String, String)> = params
            .into_iter()
            .map(|(key, value)| (key.into(), value.to_string()))
            .collect();
        form.push(("nonceID".to_string(), nonce.id.to_string()));
        form.push(("secret".to_string(), self.signer.sign(nonce.nonce)));

        let url = self.address.endpoint_url(endpoint);
        info!(endpoint, "submitting command");

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(PollError::from)?;
        if !response.status().is_success() {
            return Err(PollError::Status(response.status().as_u16()).into());
        }
        let body = response.bytes().await.map_err(PollError::from)?;

        let poller = self.poller(endpoint, RequestDescriptor::new(url));
        if !poller.ingest(&body) {
            return Err(communication_error(&poller).into());
        }
        let document = poller.snapshot()?;

        let authenticated = document
            .root()
            .child("authenticated")
            .map_or(true, |element| element.value().trim().eq_ignore_ascii_case("true"));
        if !authenticated {
            warn!(endpoint, "command rejected: authentication failed");
        }
        let errors = document.string_list(Some("errors"));
        for message in &errors {
            warn!(endpoint, "daemon reported: {}", message);
        }

        Ok(CommandOutcome {
            authenticated,
            errors,
            document,
        })
    }
}

impl fmt::Debug for CommandClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandClient")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

fn communication_error(poller: &Poller) -> CommunicationError {
    CommunicationError::new(poller.last_error().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> CommandClient {
        CommandClient::new(
            DaemonAddress::new(server.host(), server.port()),
            |nonce: i64| format!("signed-{nonce}"),
        )
    }

    async fn serve_nonce(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/XML_GetNonce");
                then.status(200)
                    .body("<data><id>7</id><nonce>12345</nonce></data>");
            })
            .await;
    }

    #[test]
    fn test_sha256_signer() {
        let signer = Sha256Signer::new("secret");
        let signed = signer.sign(42);

        assert_eq!(signed.len(), 64);
        assert_eq!(signed, hex::encode(Sha256::digest(b"secret42")));
        assert_ne!(signed, signer.sign(43));
        assert!(format!("{:?}", signer).contains("redacted"));
    }

    #[tokio::test]
    async fn test_fetch_nonce() {
        let server = MockServer::start_async().await;
        serve_nonce(&server).await;

        let nonce = client(&server).fetch_nonce().await.unwrap();
        assert_eq!(nonce, Nonce { id: 7, nonce: 12345 });
    }

    #[tokio::test]
    async fn test_fetch_nonce_rejects_garbage() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/XML_GetNonce");
                then.status(200).body("<data><id>x</id></data>");
            })
            .await;

        let err = client(&server).fetch_nonce().await.unwrap_err();
        assert!(matches!(err, CommandError::InvalidNonce(_)));
    }

    #[tokio::test]
    async fn test_fetch_nonce_unreachable() {
        let client = CommandClient::new(DaemonAddress::new("127.0.0.1", 1), Sha256Signer::new("pw"));
        let err = client.fetch_nonce().await.unwrap_err();
        assert!(matches!(err, CommandError::Communication(_)));
    }

    #[tokio::test]
    async fn test_submit_signs_and_reads_errors() {
        let server = MockServer::start_async().await;
        serve_nonce(&server).await;
        let post = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/XML_MailNotification")
                    .body_contains("sendEmail=true")
                    .body_contains("nonceID=7")
                    .body_contains("secret=signed-12345");
                then.status(200).body(
                    "<data><authenticated>true</authenticated><errors><error>SMTP unreachable</error></errors></data>",
                );
            })
            .await;

        let outcome = client(&server)
            .submit("XML_MailNotification", [("sendEmail", "true")])
            .await
            .unwrap();

        post.assert_async().await;
        assert!(outcome.authenticated);
        assert_eq!(outcome.errors, vec!["SMTP unreachable"]);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_submit_authentication_failure_is_a_value() {
        let server = MockServer::start_async().await;
        serve_nonce(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/XML_SetQuota");
                then.status(200)
                    .body("<data><authenticated>false</authenticated></data>");
            })
            .await;

        let outcome = client(&server)
            .submit("XML_SetQuota", Vec::<(String, String)>::new())
            .await
            .unwrap();
        assert!(!outcome.authenticated);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_submit_without_authenticated_element() {
        let server = MockServer::start_async().await;
        serve_nonce(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/XML_StartStop");
                then.status(200).body("<data/>");
            })
            .await;

        let outcome = client(&server)
            .submit("XML_StartStop", [("service", "storage"), ("action", "restart")])
            .await
            .unwrap();
        assert!(outcome.is_success());
    }
}
