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

//! rd is a command line application to deliver a notification receipt.
//!
//! If the session token is "token" and the server is "https://chat.example.com",
//!
//! ```
//! $ rd -t token -s https://chat.example.com --ack-id ack --post-id post
//! ```
//!
//! Or you can set environment variables instead,
//!
//! ```
//! $ export RECEIPT_TOKEN=token
//! $ export RECEIPT_SERVER_URL=https://chat.example.com
//! $ rd --ack-id ack --post-id post --type read
//! ```
//!
//! A credentials file of every logged in server can be used as well,
//!
//! ```
//! $ rd -c credentials.json --ack-id ack --post-id post
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use log::{debug, Level};
use logging_timer::{finish, stimer};

use receipt::{
    AckResult, Credential, CredentialStore, FileCredentialStore, Platform, ReceiptDelivery,
    ReceiptDeliveryBuilder, StaticCredentialStore,
};

#[doc(hidden)]
#[derive(Parser)]
#[clap(about, author, version)]
struct Opts {
    /// Acknowledgment identifier from the push notification.
    #[clap(long)]
    ack_id: String,
    /// Post identifier from the push notification.
    #[clap(long)]
    post_id: String,
    /// Acknowledgment type e.g. received, read.
    #[clap(long = "type", default_value = "received")]
    kind: String,
    /// Session token. May carry the server URL as "<token>, <url>".
    #[clap(short, long, env = "RECEIPT_TOKEN")]
    token: Option<String>,
    /// Server URL.
    #[clap(short, long, env = "RECEIPT_SERVER_URL")]
    server_url: Option<String>,
    /// JSON file of per-server credentials, takes precedence over token and server URL.
    #[clap(short, long, env = "RECEIPT_CREDENTIALS")]
    credentials: Option<PathBuf>,
    /// Reported platform e.g. android, ios.
    #[clap(long, default_value = "android")]
    platform: String,
    /// Request timeout in seconds.
    #[clap(long, default_value_t = 30)]
    timeout: u64,
    /// Verbose.
    #[clap(short, long)]
    verbose: bool,
}

impl Opts {
    fn builder(&self) -> anyhow::Result<ReceiptDeliveryBuilder> {
        let platform = match Platform::from_str(&self.platform) {
            Ok(p) => p,
            Err(_) => bail!("unknown platform {}", self.platform),
        };
        let mut builder = ReceiptDeliveryBuilder::default();
        builder
            .platform(platform)
            .timeout(Duration::from_secs(self.timeout));
        Ok(builder)
    }

    fn static_store(&self) -> StaticCredentialStore {
        if self.token.is_none() && self.server_url.is_none() {
            return StaticCredentialStore::logged_out();
        }
        StaticCredentialStore::new(Credential {
            token: self.token.clone(),
            server_url: Some(self.server_url.clone().unwrap_or_default()),
        })
    }

    /// Credentials file wins over token and server URL.
    async fn deliver(&self) -> anyhow::Result<Option<AckResult>> {
        let builder = self.builder()?;
        if let Some(ref p) = self.credentials {
            debug!("load credentials from {p:?}");
            deliver(builder.build(FileCredentialStore::new(p)), self).await
        } else {
            deliver(builder.build(self.static_store()), self).await
        }
    }

    fn render(&self, res: Option<&AckResult>) -> anyhow::Result<Option<String>> {
        match res {
            Some(r) if self.verbose => Ok(Some(serde_json::to_string(r)?)),
            Some(_) => Ok(None),
            None => {
                debug!("no active session, nothing delivered");
                Ok(None)
            }
        }
    }
}

async fn deliver<S: CredentialStore>(
    delivery: ReceiptDelivery<S>,
    opts: &Opts,
) -> anyhow::Result<Option<AckResult>> {
    let tmr = stimer!(Level::Debug; "DELIVER");
    let res = delivery
        .send_ack(&opts.ack_id, &opts.post_id, &opts.kind)
        .await;
    finish!(tmr);

    match res {
        Ok(r) => Ok(r),
        Err(e) => bail!(e.rejection()),
    }
}

#[doc(hidden)]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opts: Opts = Opts::parse();
    let res = opts.deliver().await?;
    if let Some(out) = opts.render(res.as_ref())? {
        println!("{out}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use clap::Parser;
    use mockito::mock;
    use receipt::CredentialStore as _;

    use crate::Opts;

    fn parse(args: &[&str]) -> Opts {
        let mut argv = vec!["rd", "--ack-id", "ack", "--post-id", "post"];
        argv.extend_from_slice(args);
        Opts::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let parsed = Opts::try_parse_from(vec![
            "rd",
            "-t",
            "token",
            "-s",
            "https://chat.example.com",
            "--ack-id",
            "ack",
            "--post-id",
            "post",
        ])
        .unwrap();
        assert_eq!("received", parsed.kind);
        assert_eq!("android", parsed.platform);
        assert_eq!(30, parsed.timeout);
        assert!(parsed.builder().is_ok());
    }

    #[test]
    fn test_type_and_platform() {
        let parsed = Opts::try_parse_from(vec![
            "rd",
            "--ack-id",
            "ack",
            "--post-id",
            "post",
            "--type",
            "read",
            "--platform",
            "ios",
        ])
        .unwrap();
        assert_eq!("read", parsed.kind);
        assert!(parsed.builder().is_ok());

        let parsed = Opts::try_parse_from(vec![
            "rd",
            "--ack-id",
            "ack",
            "--post-id",
            "post",
            "--platform",
            "windows",
        ])
        .unwrap();
        assert!(parsed.builder().is_err());
    }

    #[test]
    fn test_missing_ack_id() {
        assert!(Opts::try_parse_from(vec!["rd", "--post-id", "post"]).is_err());
    }

    #[tokio::test]
    async fn test_comma_joined_token() {
        let parsed = Opts::try_parse_from(vec![
            "rd",
            "-t",
            "tok123, https://chat.example.com",
            "--ack-id",
            "ack",
            "--post-id",
            "post",
        ])
        .unwrap();
        let credential = parsed
            .static_store()
            .credentials_for_current_server()
            .await
            .unwrap()
            .unwrap()
            .normalize();
        assert_eq!(Some("tok123"), credential.token.as_deref());
        assert_eq!(
            Some("https://chat.example.com"),
            credential.server_url.as_deref()
        );
    }

    #[tokio::test]
    async fn test_credentials_file_wins() {
        let base = format!("{}/rd-file", mockito::server_url());
        let m = mock("POST", "/rd-file/api/v4/notifications/ack")
            .match_header("authorization", "Bearer file-token")
            .with_status(200)
            .with_body(r#"{"post_id":"post","channel_id":"c1"}"#)
            .create();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"current_server":"{base}","servers":{{"{base}":{{"password":"file-token","service":"{base}"}}}}}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let opts = parse(&[
            "-t",
            "flag-token",
            "-s",
            "http://127.0.0.1:1",
            "-c",
            path.as_str(),
            "-v",
        ]);
        let res = opts.deliver().await.unwrap();
        m.assert();

        let out = opts.render(res.as_ref()).unwrap().unwrap();
        assert_eq!(r#"{"channel_id":"c1","post_id":"post"}"#, out);
    }

    #[tokio::test]
    async fn test_rejection() {
        let opts = parse(&["-s", "https://chat.example.com"]);
        let err = opts.deliver().await.unwrap_err();
        assert_eq!("Receipt delivery failure: Invalid token", err.to_string());
    }

    #[tokio::test]
    async fn test_no_active_session() {
        let opts = parse(&["-v"]);
        let res = opts.deliver().await.unwrap();
        assert!(res.is_none());
        assert_eq!(None, opts.render(res.as_ref()).unwrap());
    }

    #[tokio::test]
    async fn test_quiet_output() {
        let base = format!("{}/rd-quiet", mockito::server_url());
        let _m = mock("POST", "/rd-quiet/api/v4/notifications/ack")
            .with_status(200)
            .with_body(r#"{"post_id":"post"}"#)
            .create();

        let opts = parse(&["-t", "token", "-s", base.as_str()]);
        let res = opts.deliver().await.unwrap();
        assert!(res.is_some());
        assert_eq!(None, opts.render(res.as_ref()).unwrap());
    }
}
