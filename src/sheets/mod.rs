//! The Google Sheets API surface the provider depends on.
//!
//! Resource and data source code talks to [`SheetsApi`], never to
//! `google-sheets4` directly. The production client lives in [`google`];
//! [`retry::RetryingSheets`] and [`LoggingSheets`] decorate any implementation.

pub mod google;
pub mod retry;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// OAuth scope requested for every Sheets call.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Product user agent attached to every outbound request.
pub const USER_AGENT: &str = concat!("googlespreadsheets-provider/", env!("CARGO_PKG_VERSION"));

/// Cell values as exchanged with the Sheets API, row-major.
pub type ValueMatrix = Vec<Vec<Value>>;

/// Failure of a single Sheets API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetsError {
    /// The API answered with a non-success HTTP status.
    #[error("Sheets API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// No access token could be obtained.
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl SheetsError {
    /// Whether retrying the same request may succeed.
    ///
    /// Rate limiting, server errors, transport failures and timeouts are
    /// transient; every other 4xx is final.
    pub fn is_transient(&self) -> bool {
        match self {
            SheetsError::Api { status, .. } => *status == 429 || *status >= 500,
            SheetsError::Transport(_) | SheetsError::Timeout(_) => true,
            SheetsError::Auth(_) | SheetsError::Cancelled | SheetsError::Other(_) => false,
        }
    }
}

/// Metadata returned when resolving a spreadsheet by ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetInfo {
    pub spreadsheet_id: String,
    pub title: Option<String>,
}

/// How the API interprets written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInputOption {
    /// Stored exactly as given.
    Raw,
    /// Parsed as if typed into the UI (formulas, numbers, dates).
    UserEntered,
}

impl ValueInputOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }
}

/// The subset of the Sheets v4 API used by the provider.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// `spreadsheets.get`: confirm the spreadsheet exists.
    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, SheetsError>;

    /// `spreadsheets.values.get` with formatted values, row-major.
    async fn get_values(&self, spreadsheet_id: &str, range: &str)
        -> Result<ValueMatrix, SheetsError>;

    /// `spreadsheets.values.update`.
    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: ValueMatrix,
        option: ValueInputOption,
    ) -> Result<(), SheetsError>;

    /// `spreadsheets.values.clear`.
    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<(), SheetsError>;
}

#[async_trait]
impl<T: SheetsApi + ?Sized> SheetsApi for std::sync::Arc<T> {
    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, SheetsError> {
        (**self).get_spreadsheet(spreadsheet_id).await
    }

    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<ValueMatrix, SheetsError> {
        (**self).get_values(spreadsheet_id, range).await
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: ValueMatrix,
        option: ValueInputOption,
    ) -> Result<(), SheetsError> {
        (**self)
            .update_values(spreadsheet_id, range, values, option)
            .await
    }

    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<(), SheetsError> {
        (**self).clear_values(spreadsheet_id, range).await
    }
}

/// Logs every outbound request and its outcome at `debug`, failures at `warn`.
pub struct LoggingSheets<S> {
    inner: S,
}

impl<S: SheetsApi> LoggingSheets<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

fn log_outcome<T>(
    method: &'static str,
    spreadsheet_id: &str,
    started: Instant,
    result: &Result<T, SheetsError>,
) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(_) => debug!(method, spreadsheet_id, elapsed_ms, "Sheets API request succeeded"),
        Err(e) => warn!(method, spreadsheet_id, elapsed_ms, error = %e, "Sheets API request failed"),
    }
}

#[async_trait]
impl<S: SheetsApi> SheetsApi for LoggingSheets<S> {
    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, SheetsError> {
        debug!(method = "spreadsheets.get", spreadsheet_id, "Sheets API request");
        let started = Instant::now();
        let result = self.inner.get_spreadsheet(spreadsheet_id).await;
        log_outcome("spreadsheets.get", spreadsheet_id, started, &result);
        result
    }

    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<ValueMatrix, SheetsError> {
        debug!(method = "spreadsheets.values.get", spreadsheet_id, range, "Sheets API request");
        let started = Instant::now();
        let result = self.inner.get_values(spreadsheet_id, range).await;
        if let Ok(values) = &result {
            debug!(rows = values.len(), "values fetched");
        }
        log_outcome("spreadsheets.values.get", spreadsheet_id, started, &result);
        result
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: ValueMatrix,
        option: ValueInputOption,
    ) -> Result<(), SheetsError> {
        debug!(
            method = "spreadsheets.values.update",
            spreadsheet_id,
            range,
            rows = values.len(),
            value_input_option = option.as_str(),
            "Sheets API request"
        );
        let started = Instant::now();
        let result = self
            .inner
            .update_values(spreadsheet_id, range, values, option)
            .await;
        log_outcome("spreadsheets.values.update", spreadsheet_id, started, &result);
        result
    }

    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<(), SheetsError> {
        debug!(method = "spreadsheets.values.clear", spreadsheet_id, range, "Sheets API request");
        let started = Instant::now();
        let result = self.inner.clear_values(spreadsheet_id, range).await;
        log_outcome("spreadsheets.values.clear", spreadsheet_id, started, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemorySheets, SheetsCall};
    use serde_json::json;

    #[test]
    fn test_transient_classification() {
        let api = |status| SheetsError::Api {
            status,
            message: String::new(),
        };
        assert!(api(429).is_transient());
        assert!(api(500).is_transient());
        assert!(api(503).is_transient());
        assert!(!api(400).is_transient());
        assert!(!api(403).is_transient());
        assert!(!api(404).is_transient());

        assert!(SheetsError::Transport("reset".into()).is_transient());
        assert!(SheetsError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!SheetsError::Auth("expired".into()).is_transient());
        assert!(!SheetsError::Cancelled.is_transient());
    }

    #[test]
    fn test_value_input_option_wire_names() {
        assert_eq!(ValueInputOption::UserEntered.as_str(), "USER_ENTERED");
        assert_eq!(ValueInputOption::Raw.as_str(), "RAW");
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("googlespreadsheets-provider/"));
    }

    #[tokio::test]
    async fn test_logging_decorator_passes_through() {
        let fake = InMemorySheets::new().with_values("sheet", "A1:B2", vec![vec![json!("x")]]);
        let logged = LoggingSheets::new(fake);

        let info = logged.get_spreadsheet("sheet").await.unwrap();
        assert_eq!(info.spreadsheet_id, "sheet");

        let values = logged.get_values("sheet", "A1:B2").await.unwrap();
        assert_eq!(values, vec![vec![json!("x")]]);

        let err = logged.get_spreadsheet("missing").await.unwrap_err();
        assert!(matches!(err, SheetsError::Api { status: 404, .. }));

        assert_eq!(logged.inner.calls().len(), 3);
        assert_eq!(
            logged.inner.calls()[0],
            SheetsCall::GetSpreadsheet {
                spreadsheet_id: "sheet".to_string()
            }
        );
    }
}
