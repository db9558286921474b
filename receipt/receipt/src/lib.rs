#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

//! Receipt delivers push notification acknowledgments to the chat server
//! the client is currently logged into.

use std::time::Duration;

use log::{debug, info, warn};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

pub use ack::{ack_endpoint, AckRequest, Platform};
pub use credential::{
    Credential, CredentialError, CredentialStore, FileCredentialStore, StaticCredentialStore,
};
pub use promise::{PromiseChannel, Rejection, ResolvePromise, REJECTION_TITLE};
pub use response::{AckResult, ACK_RESULT_KEYS};

mod ack;
mod credential;
mod promise;
mod response;

/// Default timeout of the acknowledgment request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Receipt delivery error.
#[derive(Error, Debug)]
pub enum ReceiptError {
    /// Credentials carry no token.
    #[error("Invalid token")]
    InvalidCredentials,
    /// Credentials carry no server URL.
    #[error("Invalid server URL")]
    InvalidServerUrl,
    /// Wrapped [`crate::CredentialError`].
    #[error("credential store error: {0}")]
    CredentialStore(#[from] CredentialError),
    /// Payload could not be serialized.
    #[error("failed to build payload: {0}")]
    PayloadBuildFailure(#[source] serde_json::Error),
    /// Endpoint URL could not be parsed.
    #[error("malformed endpoint URL: {0}")]
    MalformedEndpoint(#[from] url::ParseError),
    /// Non-200 response, transport or response parse error. Holds the raw response body
    /// for non-200 responses.
    #[error("{0}")]
    DeliveryFailure(String),
}

impl ReceiptError {
    /// Converts the error into what the caller's promise is rejected with.
    pub fn rejection(&self) -> Rejection {
        Rejection::new(self.to_string())
    }
}

/// Delivers acknowledgments with credentials from a [`CredentialStore`].
#[derive(Debug)]
pub struct ReceiptDelivery<S> {
    store: S,
    agent: ureq::Agent,
    platform: Platform,
}

/// Builder of [`ReceiptDelivery`].
#[derive(Clone, Copy, Debug)]
pub struct ReceiptDeliveryBuilder {
    platform: Platform,
    timeout: Duration,
}

impl Default for ReceiptDeliveryBuilder {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ReceiptDeliveryBuilder {
    /// Creates a [`ReceiptDeliveryBuilder`] with default settings.
    ///
    /// ```rust
    /// # use std::time::Duration;
    /// # use receipt::{Platform, ReceiptDeliveryBuilder, StaticCredentialStore};
    /// let delivery = ReceiptDeliveryBuilder::new()
    ///     .platform(Platform::Ios)
    ///     .timeout(Duration::from_secs(5))
    ///     .build(StaticCredentialStore::logged_out());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform reported in every acknowledgment.
    pub fn platform(&mut self, platform: Platform) -> &mut Self {
        self.platform = platform;
        self
    }

    /// Timeout of the whole request.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Creates a [`ReceiptDelivery`] reading credentials from `store`.
    pub fn build<S: CredentialStore>(&self, store: S) -> ReceiptDelivery<S> {
        ReceiptDelivery {
            store,
            agent: ureq::AgentBuilder::new().timeout(self.timeout).build(),
            platform: self.platform,
        }
    }
}

/// Shorthand function to deliver one acknowledgment with known credentials.
/// ```no_run
/// # use receipt::{send_receipt, Credential};
/// # async fn run() -> Result<(), receipt::ReceiptError> {
/// let credential = Credential::new("token", "https://chat.example.com");
/// send_receipt(credential, "ack", "post", "received").await?;
/// # Ok(())
/// # }
/// ```
pub async fn send_receipt(
    credential: Credential,
    ack_id: &str,
    post_id: &str,
    kind: &str,
) -> Result<Option<AckResult>, ReceiptError> {
    ReceiptDelivery::new(StaticCredentialStore::new(credential))
        .send_ack(ack_id, post_id, kind)
        .await
}

impl<S: CredentialStore> ReceiptDelivery<S> {
    /// Creates a [`ReceiptDelivery`] with default settings.
    pub fn new(store: S) -> Self {
        ReceiptDeliveryBuilder::new().build(store)
    }

    /// Delivers an acknowledgment of `kind` e.g. `received` for `post_id`.
    ///
    /// Resolves to `None` without any request when no server is logged in.
    pub async fn send_ack(
        &self,
        ack_id: &str,
        post_id: &str,
        kind: &str,
    ) -> Result<Option<AckResult>, ReceiptError> {
        self.deliver(ack_id, post_id, kind).await.map_err(|e| {
            warn!("receipt delivery failed ACK={ack_id}: {e}");
            e
        })
    }

    async fn deliver(
        &self,
        ack_id: &str,
        post_id: &str,
        kind: &str,
    ) -> Result<Option<AckResult>, ReceiptError> {
        let credential = match self.store.credentials_for_current_server().await? {
            Some(c) => c.normalize(),
            None => {
                debug!("no active session, skip receipt delivery ACK={ack_id}");
                return Ok(None);
            }
        };

        let token = credential
            .token
            .filter(|t| !t.is_empty())
            .ok_or(ReceiptError::InvalidCredentials)?;
        let server_url = credential
            .server_url
            .filter(|u| !u.is_empty())
            .ok_or(ReceiptError::InvalidServerUrl)?;

        info!(
            "send receipt delivery ACK={ack_id} TYPE={kind} to URL={} with TOKEN={}",
            redact_url(&server_url),
            redact_token(&token)
        );

        let body = AckRequest::new(ack_id, post_id, kind, self.platform)
            .to_body()
            .map_err(ReceiptError::PayloadBuildFailure)?;
        let url = ack_endpoint(&server_url)?;
        debug!("post receipt to {}", url.path());

        let agent = self.agent.clone();
        let authorization = format!("Bearer {token}");
        let text = tokio::task::spawn_blocking(move || post(&agent, &url, &authorization, &body))
            .await
            .map_err(|e| ReceiptError::DeliveryFailure(e.to_string()))??;

        let response: Map<String, Value> = serde_json::from_str(&text)
            .map_err(|e| ReceiptError::DeliveryFailure(e.to_string()))?;
        Ok(Some(AckResult::from_response(&response)))
    }

    /// Delivers an acknowledgment and settles `promise` with the outcome.
    ///
    /// The promise is dropped unsettled when no server is logged in.
    pub async fn send_to_promise<P: ResolvePromise>(
        &self,
        ack_id: &str,
        post_id: &str,
        kind: &str,
        promise: P,
    ) {
        match self.send_ack(ack_id, post_id, kind).await {
            Ok(Some(result)) => promise.resolve(result),
            Ok(None) => {}
            Err(e) => {
                let rejection = e.rejection();
                promise.reject(&rejection.title, &rejection.detail);
            }
        }
    }
}

fn post(
    agent: &ureq::Agent,
    url: &Url,
    authorization: &str,
    body: &str,
) -> Result<String, ReceiptError> {
    let response = match agent
        .post(url.as_str())
        .set("Authorization", authorization)
        .set("Content-Type", "application/json")
        .send_string(body)
    {
        Ok(r) => r,
        Err(ureq::Error::Status(_, r)) => r,
        Err(e) => return Err(ReceiptError::DeliveryFailure(e.to_string())),
    };

    let status = response.status();
    let text = response
        .into_string()
        .map_err(|e| ReceiptError::DeliveryFailure(e.to_string()))?;
    if status != 200 {
        return Err(ReceiptError::DeliveryFailure(text));
    }
    Ok(text)
}

fn redact_token(token: &str) -> String {
    format!("<{} chars>", token.chars().count())
}

fn redact_url(server_url: &str) -> String {
    Url::parse(server_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| "<unparsable>".to_string())
}
