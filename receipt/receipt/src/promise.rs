use tokio::sync::oneshot;

use crate::AckResult;

/// Title of every rejection.
pub const REJECTION_TITLE: &str = "Receipt delivery failure";

/// Resolve/reject contract of the caller. Both methods consume the promise,
/// so it settles at most once.
pub trait ResolvePromise {
    /// Settles with the delivered result.
    fn resolve(self, result: AckResult);
    /// Settles with a failure.
    fn reject(self, title: &str, detail: &str);
}

/// Failure handed to [`ResolvePromise::reject`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rejection {
    /// Always [`REJECTION_TITLE`].
    pub title: String,
    /// Human readable cause.
    pub detail: String,
}

impl Rejection {
    /// Creates a [`Rejection`] with the fixed title.
    pub fn new<T: Into<String>>(detail: T) -> Self {
        Self {
            title: REJECTION_TITLE.to_string(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.detail)
    }
}

impl std::error::Error for Rejection {}

/// [`ResolvePromise`] forwarding the outcome to a [`oneshot`] channel.
///
/// ```rust
/// # use receipt::{AckResult, PromiseChannel, ResolvePromise};
/// # tokio_test_block_on(async {
/// let (promise, outcome) = PromiseChannel::new();
/// promise.resolve(AckResult::default());
/// assert!(outcome.await.unwrap().is_ok());
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
///
/// The receiver errors with [`oneshot::error::RecvError`] when the promise is dropped unsettled,
/// which is how the no-session path looks from the caller side.
#[derive(Debug)]
pub struct PromiseChannel {
    tx: oneshot::Sender<Result<AckResult, Rejection>>,
}

impl PromiseChannel {
    /// Creates the promise and the receiver of its outcome.
    pub fn new() -> (Self, oneshot::Receiver<Result<AckResult, Rejection>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }
}

impl ResolvePromise for PromiseChannel {
    fn resolve(self, result: AckResult) {
        // receiver may be gone already
        let _ = self.tx.send(Ok(result));
    }

    fn reject(self, title: &str, detail: &str) {
        let _ = self.tx.send(Err(Rejection {
            title: title.to_string(),
            detail: detail.to_string(),
        }));
    }
}
