//! Bounded retries, per-call timeouts and cancellation for Sheets calls.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::warn;

use super::{SheetsApi, SheetsError, SpreadsheetInfo, ValueInputOption, ValueMatrix};

/// Retry and timeout settings applied to every Sheets call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Limit on a single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), doubling up to `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

/// Observes the provider's stop flag.
///
/// Cloned into every decorated client; `Stop` flips the flag through the
/// matching [`watch::Sender`].
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// A token that never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // A closed channel never reports a stop.
        drop(tx);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is set. Pends forever if the sender is gone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Run `call` under `policy`, retrying transient failures with backoff.
///
/// Each attempt is bounded by `policy.timeout`. Cancellation interrupts both
/// an in-flight attempt and a backoff sleep.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &Cancellation,
    operation: &'static str,
    mut call: F,
) -> Result<T, SheetsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SheetsError>>,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(SheetsError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SheetsError::Cancelled),
            result = tokio::time::timeout(policy.timeout, call()) => {
                result.unwrap_or_else(|_| Err(SheetsError::Timeout(policy.timeout)))
            }
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => err,
            Err(err) => return Err(err),
        };

        let delay = policy.backoff(attempt);
        attempt += 1;
        warn!(
            operation,
            attempt,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient Sheets API failure, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SheetsError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Applies a [`RetryPolicy`] and a [`Cancellation`] to every call of `inner`.
pub struct RetryingSheets<S> {
    inner: S,
    policy: RetryPolicy,
    cancel: Cancellation,
}

impl<S: SheetsApi> RetryingSheets<S> {
    pub fn new(inner: S, policy: RetryPolicy, cancel: Cancellation) -> Self {
        Self {
            inner,
            policy,
            cancel,
        }
    }
}

#[async_trait]
impl<S: SheetsApi> SheetsApi for RetryingSheets<S> {
    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, SheetsError> {
        call_with_retry(&self.policy, &self.cancel, "spreadsheets.get", || {
            self.inner.get_spreadsheet(spreadsheet_id)
        })
        .await
    }

    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<ValueMatrix, SheetsError> {
        call_with_retry(&self.policy, &self.cancel, "spreadsheets.values.get", || {
            self.inner.get_values(spreadsheet_id, range)
        })
        .await
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: ValueMatrix,
        option: ValueInputOption,
    ) -> Result<(), SheetsError> {
        call_with_retry(&self.policy, &self.cancel, "spreadsheets.values.update", || {
            self.inner
                .update_values(spreadsheet_id, range, values.clone(), option)
        })
        .await
    }

    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<(), SheetsError> {
        call_with_retry(&self.policy, &self.cancel, "spreadsheets.values.clear", || {
            self.inner.clear_values(spreadsheet_id, range)
        })
        .await
    }
}
