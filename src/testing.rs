//! Test support: an in-memory Sheets backend and a harness that drives a
//! [`ProviderService`] without a gRPC server.
//!
//! ```ignore
//! use googlespreadsheets_provider::testing::{InMemorySheets, ProviderTester, StaticConnector};
//! use googlespreadsheets_provider::GoogleSpreadsheetsProvider;
//!
//! let sheets = Arc::new(InMemorySheets::new().with_spreadsheet("abc"));
//! let provider = GoogleSpreadsheetsProvider::with_connector(StaticConnector::new(sheets.clone()));
//! let tester = ProviderTester::new(provider);
//! tester.configure(json!({})).await.unwrap();
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{AccountFile, ConfigError};
use crate::error::ProviderError;
use crate::provider::SheetsConnector;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::sheets::{SheetsApi, SheetsError, SpreadsheetInfo, ValueInputOption, ValueMatrix};
use crate::types::{ImportedResource, PlanResult};

/// A request observed by [`InMemorySheets`].
#[derive(Debug, Clone, PartialEq)]
pub enum SheetsCall {
    GetSpreadsheet {
        spreadsheet_id: String,
    },
    GetValues {
        spreadsheet_id: String,
        range: String,
    },
    UpdateValues {
        spreadsheet_id: String,
        range: String,
        values: ValueMatrix,
        option: ValueInputOption,
    },
    ClearValues {
        spreadsheet_id: String,
        range: String,
    },
}

#[derive(Default)]
struct FakeState {
    spreadsheets: HashSet<String>,
    values: HashMap<(String, String), ValueMatrix>,
    calls: Vec<SheetsCall>,
    failures: VecDeque<SheetsError>,
}

/// Spreadsheets kept in memory, keyed by `(spreadsheet_id, range)`.
///
/// Like the real API, reads omit trailing empty cells and trailing empty
/// rows. Ranges are not interpreted: a read only sees what was written to
/// the identical range string.
#[derive(Default)]
pub struct InMemorySheets {
    state: Mutex<FakeState>,
    latency: Option<Duration>,
}

impl InMemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spreadsheet(self, spreadsheet_id: &str) -> Self {
        self.lock().spreadsheets.insert(spreadsheet_id.to_string());
        self
    }

    /// Seed a range, creating the spreadsheet if needed.
    pub fn with_values(self, spreadsheet_id: &str, range: &str, values: ValueMatrix) -> Self {
        {
            let mut state = self.lock();
            state.spreadsheets.insert(spreadsheet_id.to_string());
            state
                .values
                .insert((spreadsheet_id.to_string(), range.to_string()), values);
        }
        self
    }

    /// Delay every call, to exercise timeouts and cancellation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next call fail with `err`. Queued failures are consumed in order.
    pub fn fail_next(&self, err: SheetsError) {
        self.lock().failures.push_back(err);
    }

    pub fn calls(&self) -> Vec<SheetsCall> {
        self.lock().calls.clone()
    }

    /// The stored values of a range as written, before any trimming.
    pub fn values(&self, spreadsheet_id: &str, range: &str) -> Option<ValueMatrix> {
        self.lock()
            .values
            .get(&(spreadsheet_id.to_string(), range.to_string()))
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn record(&self, call: SheetsCall) -> Result<(), SheetsError> {
        let spreadsheet_id = match &call {
            SheetsCall::GetSpreadsheet { spreadsheet_id }
            | SheetsCall::GetValues { spreadsheet_id, .. }
            | SheetsCall::UpdateValues { spreadsheet_id, .. }
            | SheetsCall::ClearValues { spreadsheet_id, .. } => spreadsheet_id.clone(),
        };

        let failure = {
            let mut state = self.lock();
            state.calls.push(call);
            state.failures.pop_front()
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }
        if !self.lock().spreadsheets.contains(&spreadsheet_id) {
            return Err(SheetsError::Api {
                status: 404,
                message: "Requested entity was not found.".to_string(),
            });
        }
        Ok(())
    }
}

fn is_blank(cell: &Value) -> bool {
    matches!(cell, Value::String(s) if s.is_empty())
}

fn trim_like_api(mut values: ValueMatrix) -> ValueMatrix {
    for row in values.iter_mut() {
        while row.last().is_some_and(is_blank) {
            row.pop();
        }
    }
    while values.last().is_some_and(|row| row.is_empty()) {
        values.pop();
    }
    values
}

#[async_trait]
impl SheetsApi for InMemorySheets {
    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, SheetsError> {
        self.record(SheetsCall::GetSpreadsheet {
            spreadsheet_id: spreadsheet_id.to_string(),
        })
        .await?;
        Ok(SpreadsheetInfo {
            spreadsheet_id: spreadsheet_id.to_string(),
            title: Some(format!("Spreadsheet {}", spreadsheet_id)),
        })
    }

    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<ValueMatrix, SheetsError> {
        self.record(SheetsCall::GetValues {
            spreadsheet_id: spreadsheet_id.to_string(),
            range: range.to_string(),
        })
        .await?;
        Ok(trim_like_api(
            self.values(spreadsheet_id, range).unwrap_or_default(),
        ))
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: ValueMatrix,
        option: ValueInputOption,
    ) -> Result<(), SheetsError> {
        self.record(SheetsCall::UpdateValues {
            spreadsheet_id: spreadsheet_id.to_string(),
            range: range.to_string(),
            values: values.clone(),
            option,
        })
        .await?;
        self.lock()
            .values
            .insert((spreadsheet_id.to_string(), range.to_string()), values);
        Ok(())
    }

    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<(), SheetsError> {
        self.record(SheetsCall::ClearValues {
            spreadsheet_id: spreadsheet_id.to_string(),
            range: range.to_string(),
        })
        .await?;
        self.lock()
            .values
            .remove(&(spreadsheet_id.to_string(), range.to_string()));
        Ok(())
    }
}

/// Hands out a fixed [`SheetsApi`] and records the accounts it was asked for.
pub struct StaticConnector {
    api: Arc<dyn SheetsApi>,
    accounts: Mutex<Vec<Option<AccountFile>>>,
    failure: Mutex<Option<String>>,
}

impl StaticConnector {
    pub fn new(api: Arc<dyn SheetsApi>) -> Arc<Self> {
        Arc::new(Self {
            api,
            accounts: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        })
    }

    /// Make the next connect fail with an authentication error.
    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(message.to_string());
    }

    /// The account passed to each connect, oldest first.
    pub fn accounts(&self) -> Vec<Option<AccountFile>> {
        self.accounts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait]
impl SheetsConnector for StaticConnector {
    async fn connect(
        &self,
        account: Option<AccountFile>,
    ) -> Result<Arc<dyn SheetsApi>, ConfigError> {
        self.accounts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(account);
        if let Some(message) = self.failure.lock().unwrap_or_else(|p| p.into_inner()).take() {
            return Err(ConfigError::Authentication(message));
        }
        Ok(Arc::clone(&self.api))
    }
}

/// Drives a [`ProviderService`] directly.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate provider configuration, failing on any error diagnostic.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider, failing on any error diagnostic.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a create; `proposed_state` doubles as the config.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Plan, create, then read back.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan, update, then read back.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Create, update, then delete; returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.plan_delete(resource_type, updated.clone()).await?;
        self.delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Failure of a tester operation that reports diagnostics.
#[derive(Debug)]
pub enum TestError {
    Diagnostics(Vec<Diagnostic>),
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  {}", diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

impl TestError {
    /// The error diagnostics, or an empty slice for provider errors.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            TestError::Diagnostics(diags) => diags,
            TestError::Provider(_) => &[],
        }
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// # Panics
///
/// Panics if the plan does not change `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// # Panics
///
/// Panics if no error diagnostic has `substring` in its summary.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.is_error() && d.summary.contains(substring)),
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fake_trims_like_the_api() {
        let fake = InMemorySheets::new().with_values(
            "s",
            "A1:C4",
            vec![
                vec![json!("a"), json!("")],
                vec![],
                vec![json!("b")],
                vec![json!(""), json!("")],
            ],
        );
        let values = fake.get_values("s", "A1:C4").await.unwrap();
        assert_eq!(values, vec![vec![json!("a")], vec![], vec![json!("b")]]);
        // stored values are untouched
        assert_eq!(fake.values("s", "A1:C4").unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_fake_failures_are_consumed_in_order() {
        let fake = InMemorySheets::new().with_spreadsheet("s");
        fake.fail_next(SheetsError::Transport("first".into()));
        fake.fail_next(SheetsError::Auth("second".into()));

        assert_eq!(
            fake.get_spreadsheet("s").await.unwrap_err(),
            SheetsError::Transport("first".into())
        );
        assert_eq!(
            fake.get_spreadsheet("s").await.unwrap_err(),
            SheetsError::Auth("second".into())
        );
        assert!(fake.get_spreadsheet("s").await.is_ok());
        assert_eq!(fake.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_static_connector_records_accounts() {
        let connector = StaticConnector::new(Arc::new(InMemorySheets::new()));
        assert!(connector.connect(None).await.is_ok());

        connector.fail_next("invalid_grant");
        let err = connector.connect(None).await.err().unwrap();
        assert!(matches!(err, ConfigError::Authentication(ref m) if m == "invalid_grant"));
        assert_eq!(connector.accounts().len(), 2);
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("credentials are not valid JSON").with_attribute("credentials"),
            Diagnostic::error("Missing required attribute 'range'").with_detail("required"),
        ]);

        let display = err.to_string();
        assert!(display.contains("2 diagnostic(s)"));
        assert!(display.contains("(at credentials)"));
        assert!(display.contains("range': required"));
        assert_eq!(err.diagnostics().len(), 2);
    }

    #[test]
    #[should_panic(expected = "Expected an error containing")]
    fn test_assert_error_contains_fails() {
        assert_error_contains(&[Diagnostic::warning("only a warning")], "warning");
    }
}
