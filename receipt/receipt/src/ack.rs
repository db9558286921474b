use std::borrow::Cow;

use chrono::Utc;
use serde::Serialize;
use url::Url;

const ACK_PATH: &str = "/api/v4/notifications/ack";

/// Platform reported along with the acknowledgment.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    /// android (default)
    Android,
    /// ios
    Ios,
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Android
    }
}

/// Acknowledgment payload posted to the server.
#[derive(Clone, Debug, Serialize)]
pub struct AckRequest<'a> {
    /// Acknowledgment identifier.
    pub id: Cow<'a, str>,
    /// Epoch milliseconds at which the notification was received.
    pub received_at: i64,
    /// Reporting platform.
    pub platform: Platform,
    /// Acknowledgment category e.g. `received`.
    #[serde(rename = "type")]
    pub kind: Cow<'a, str>,
    /// Post the notification belongs to.
    pub post_id: Cow<'a, str>,
}

impl<'a> AckRequest<'a> {
    /// Creates an [`AckRequest`] received now.
    ///
    /// ```rust
    /// # use receipt::{AckRequest, Platform};
    /// let ack = AckRequest::new("ack", "post", "received", Platform::Android);
    /// assert!(ack.received_at > 0);
    /// ```
    pub fn new<T>(id: T, post_id: T, kind: T, platform: Platform) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        Self {
            id: id.into(),
            received_at: Utc::now().timestamp_millis(),
            platform,
            kind: kind.into(),
            post_id: post_id.into(),
        }
    }

    /// Serializes the payload to a JSON body.
    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Builds the acknowledgment endpoint of `server_url`, stripping one trailing slash.
pub fn ack_endpoint(server_url: &str) -> Result<Url, url::ParseError> {
    let base = server_url.strip_suffix('/').unwrap_or(server_url);
    Url::parse(&format!("{base}{ACK_PATH}"))
}
