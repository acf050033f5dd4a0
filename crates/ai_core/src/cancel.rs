//! Per-call deadline and cancellation
//!
//! Every dispatcher call races the backend future against a deadline and an
//! optional [`CancellationToken`]. Whichever finishes first wins; the losing
//! backend future is dropped, which aborts in-flight HTTP requests and kills
//! spawned subprocesses.

use std::{future::Future, time::Duration};

use domain::ExecutionContext;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::InferenceError;

/// Options governing a single dispatcher call
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Deadline; the dispatcher default applies when unset
    pub timeout: Option<Duration>,
    /// Token the caller can trigger to abandon the call
    pub cancel: Option<CancellationToken>,
    /// Who is making the call
    pub context: ExecutionContext,
}

impl CallOptions {
    /// Options for a call made by a privileged (site-level) caller
    pub fn privileged() -> Self {
        Self {
            context: ExecutionContext::Privileged,
            ..Default::default()
        }
    }

    /// Set the deadline
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancellation token
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set the execution context
    #[must_use]
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }
}

/// Run `future` until it completes, `timeout` elapses, or `cancel` fires
pub async fn run_with_deadline<F, T>(
    future: F,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<T, InferenceError>
where
    F: Future<Output = Result<T, InferenceError>>,
{
    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        () = cancelled => {
            debug!("Inference call cancelled by caller");
            Err(InferenceError::Cancelled)
        },
        result = tokio::time::timeout(timeout, future) => match result {
            Ok(inner) => inner,
            Err(_) => Err(InferenceError::Timeout(duration_ms(timeout))),
        },
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
