use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::future::{self, BoxFuture, FutureExt as _};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Credential store error.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error from [`serde_json`] crate.
    #[error("credentials format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Token and server URL of one server, as kept by the credential store.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Credential {
    /// Session token. Stored as `password`.
    #[serde(rename = "password", default)]
    pub token: Option<String>,
    /// Server URL. Stored as `service`.
    #[serde(rename = "service", default)]
    pub server_url: Option<String>,
}

impl Credential {
    /// Creates a [`Credential`].
    ///
    /// ```rust
    /// # use receipt::Credential;
    /// let credential = Credential::new("token", "https://chat.example.com");
    /// assert_eq!(Some("token"), credential.token.as_deref());
    /// ```
    pub fn new<T, U>(token: T, server_url: U) -> Self
    where
        T: Into<String>,
        U: Into<String>,
    {
        Self {
            token: Some(token.into()),
            server_url: Some(server_url.into()),
        }
    }

    /// Splits a `"<token>, <server URL>"` token when the server URL is empty.
    ///
    /// Only an exact two-part split is applied, anything else is returned unchanged.
    pub fn normalize(mut self) -> Self {
        if !self.server_url.as_deref().map_or(true, str::is_empty) {
            return self;
        }
        let parts: Vec<String> = match self.token.as_deref() {
            Some(t) => split_token(t).into_iter().map(str::to_owned).collect(),
            None => return self,
        };

        match <[String; 2]>::try_from(parts) {
            Ok([token, server_url]) => {
                self.token = Some(token);
                self.server_url = Some(server_url);
            }
            Err(parts) => debug!("token holds {} parts, leave it unchanged", parts.len()),
        }
        self
    }
}

// Comma followed by any number of spaces, trailing empty parts dropped.
fn split_token(token: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = token
        .split(',')
        .enumerate()
        .map(|(i, p)| if i == 0 { p } else { p.trim_start_matches(' ') })
        .collect();
    while parts.last().map_or(false, |p| p.is_empty()) {
        parts.pop();
    }
    parts
}

/// Source of the credentials of the server the client is logged into.
pub trait CredentialStore: Send + Sync {
    /// Resolves to `None` when no server is logged in.
    fn credentials_for_current_server(
        &self,
    ) -> BoxFuture<'_, Result<Option<Credential>, CredentialError>>;
}

/// [`CredentialStore`] holding one fixed credential, or none.
#[derive(Clone, Debug, Default)]
pub struct StaticCredentialStore {
    credential: Option<Credential>,
}

impl StaticCredentialStore {
    /// Creates a store that always returns `credential`.
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
        }
    }

    /// Creates a store with no active session.
    pub fn logged_out() -> Self {
        Self::default()
    }
}

impl CredentialStore for StaticCredentialStore {
    fn credentials_for_current_server(
        &self,
    ) -> BoxFuture<'_, Result<Option<Credential>, CredentialError>> {
        future::ready(Ok(self.credential.clone())).boxed()
    }
}

#[derive(Debug, Default, Deserialize)]
struct CredentialFile {
    current_server: Option<String>,
    #[serde(default)]
    servers: HashMap<String, Credential>,
}

/// [`CredentialStore`] backed by a JSON file of per-server credentials.
///
/// ```json
/// {
///   "current_server": "https://chat.example.com",
///   "servers": {
///     "https://chat.example.com": { "password": "token", "service": "https://chat.example.com" }
///   }
/// }
/// ```
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store reading from `path`. The file is read on every lookup.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read(&self) -> Result<Option<Credential>, CredentialError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no credentials file at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let mut file: CredentialFile = serde_json::from_str(&content)?;
        Ok(file
            .current_server
            .and_then(|server| file.servers.remove(&server)))
    }
}

impl CredentialStore for FileCredentialStore {
    fn credentials_for_current_server(
        &self,
    ) -> BoxFuture<'_, Result<Option<Credential>, CredentialError>> {
        future::ready(self.read()).boxed()
    }
}
