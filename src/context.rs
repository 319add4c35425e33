use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SqlCapError;

/// Cancellation and deadline carried into every operation.
///
/// Contexts form a tree: cancelling a parent cancels every context derived from it, while
/// cancelling a child leaves the parent untouched. A derived deadline is never later than
/// the parent's.
///
/// ```rust
/// use std::time::Duration;
/// use sqlcap::prelude::*;
///
/// let root = QueryContext::background();
/// let ctx = root.with_timeout(Duration::from_secs(5));
/// assert!(ctx.deadline().is_some());
/// ctx.cancel();
/// assert!(ctx.is_done());
/// assert!(!root.is_done());
/// ```
#[derive(Debug, Clone)]
pub struct QueryContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::background()
    }
}

impl QueryContext {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derive a child that can be cancelled on its own.
    #[must_use]
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and everything derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Why the context is done, or `None` while it is still live.
    #[must_use]
    pub fn err(&self) -> Option<SqlCapError> {
        if self.token.is_cancelled() {
            Some(SqlCapError::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(SqlCapError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Fail fast if the context is already done.
    ///
    /// # Errors
    /// Returns `Cancelled` or `DeadlineExceeded`.
    pub fn check(&self) -> Result<(), SqlCapError> {
        self.err().map_or(Ok(()), Err)
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> SqlCapError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.token.cancelled() => SqlCapError::Cancelled,
                () = tokio::time::sleep_until(deadline) => SqlCapError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                SqlCapError::Cancelled
            }
        }
    }

    /// Race `fut` against this context. The future is dropped if the context finishes first.
    ///
    /// # Errors
    /// Returns the context error, or whatever `fut` returns.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, SqlCapError>
    where
        F: Future<Output = Result<T, SqlCapError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            res = fut => res,
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}
