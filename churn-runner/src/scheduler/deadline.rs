//! Run deadline
//!
//! One deadline is created per run. Its cancellation token is handed to
//! every executor call, and the scheduler checks it before each batch.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Wall-clock cutoff for a whole run
pub struct Deadline {
    token: CancellationToken,
    expires_at: Instant,
    timer: JoinHandle<()>,
}

impl Deadline {
    /// Starts a deadline that fires `timeout` from now
    ///
    /// Must be called from within a Tokio runtime.
    pub fn after(timeout: Duration) -> Self {
        let token = CancellationToken::new();
        let expires_at = Instant::now() + timeout;

        let trigger = token.clone();
        let timer = tokio::spawn(async move {
            time::sleep_until(expires_at).await;
            warn!("Run deadline of {:?} reached", timeout);
            trigger.cancel();
        });

        Self {
            token,
            expires_at,
            timer,
        }
    }

    /// Token cancelled when the deadline fires
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[allow(dead_code)]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the deadline has passed, even if the timer has not fired yet
    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.expires_at
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
