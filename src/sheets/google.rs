//! [`SheetsApi`] backed by `google-sheets4`.

use async_trait::async_trait;
use google_sheets4::api::{ClearValuesRequest, Scope, ValueRange};
use google_sheets4::hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use google_sheets4::hyper_util::client::legacy::{connect::HttpConnector, Client};
use google_sheets4::hyper_util::rt::TokioExecutor;
use google_sheets4::common::GetToken;
use google_sheets4::yup_oauth2::authenticator::ApplicationDefaultCredentialsTypes;
use google_sheets4::yup_oauth2::{
    ApplicationDefaultCredentialsAuthenticator, ApplicationDefaultCredentialsFlowOpts,
    ServiceAccountAuthenticator, ServiceAccountKey,
};
use google_sheets4::Sheets;
use serde_json::json;
use tracing::{debug, info};

use super::{
    SheetsApi, SheetsError, SpreadsheetInfo, ValueInputOption, ValueMatrix, SPREADSHEETS_SCOPE,
    USER_AGENT,
};
use crate::config::{AccountFile, ConfigError, TOKEN_URI};

type Connector = HttpsConnector<HttpConnector>;

/// Authenticated Sheets v4 client.
pub struct GoogleSheetsClient {
    hub: Sheets<Connector>,
}

impl GoogleSheetsClient {
    /// Authenticate with `account`, or with application default credentials
    /// when `None`. A first token is fetched so bad credentials fail here.
    pub async fn connect(account: Option<&AccountFile>) -> Result<Self, ConfigError> {
        match account {
            Some(account) => Self::with_service_account(account).await,
            None => Self::with_default_credentials().await,
        }
    }

    async fn with_service_account(account: &AccountFile) -> Result<Self, ConfigError> {
        info!(
            client_email = %account.client_email,
            private_key_len = account.private_key.len(),
            scope = SPREADSHEETS_SCOPE,
            "authenticating with service account"
        );

        let key: ServiceAccountKey = serde_json::from_value(json!({
            "type": "service_account",
            "private_key_id": account.private_key_id,
            "private_key": account.private_key,
            "client_email": account.client_email,
            "client_id": account.client_id,
            "token_uri": TOKEN_URI,
        }))?;

        let auth = ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|e| ConfigError::Authentication(e.to_string()))?;
        auth.token(&[SPREADSHEETS_SCOPE])
            .await
            .map_err(|e| ConfigError::Authentication(e.to_string()))?;
        debug!("initial access token acquired");

        Self::with_auth(auth)
    }

    async fn with_default_credentials() -> Result<Self, ConfigError> {
        info!(scope = SPREADSHEETS_SCOPE, "authenticating with application default credentials");

        let opts = ApplicationDefaultCredentialsFlowOpts::default();
        let auth = match ApplicationDefaultCredentialsAuthenticator::builder(opts).await {
            ApplicationDefaultCredentialsTypes::InstanceMetadata(builder) => builder.build().await,
            ApplicationDefaultCredentialsTypes::ServiceAccount(builder) => builder.build().await,
        }
        .map_err(|e| ConfigError::Authentication(e.to_string()))?;
        auth.token(&[SPREADSHEETS_SCOPE])
            .await
            .map_err(|e| ConfigError::Authentication(e.to_string()))?;
        debug!("initial access token acquired");

        Self::with_auth(auth)
    }

    fn with_auth<A: GetToken + 'static>(auth: A) -> Result<Self, ConfigError> {
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| ConfigError::Tls(e.to_string()))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);

        let mut hub = Sheets::new(client, auth);
        hub.user_agent(USER_AGENT.to_string());

        Ok(Self { hub })
    }
}

/// Map a `google-sheets4` failure onto [`SheetsError`].
pub fn classify(err: google_sheets4::Error) -> SheetsError {
    use google_sheets4::Error;

    match err {
        Error::BadRequest(body) => {
            let error = &body["error"];
            let status = error["code"].as_u64().unwrap_or(400) as u16;
            let message = error["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            SheetsError::Api { status, message }
        }
        Error::Failure(response) => {
            let status = response.status();
            SheetsError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            }
        }
        Error::HttpError(e) => SheetsError::Transport(e.to_string()),
        Error::Io(e) => SheetsError::Transport(e.to_string()),
        Error::MissingToken(e) => SheetsError::Auth(e.to_string()),
        Error::Cancelled => SheetsError::Cancelled,
        other => SheetsError::Other(other.to_string()),
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, SheetsError> {
        let (_, spreadsheet) = self
            .hub
            .spreadsheets()
            .get(spreadsheet_id)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(classify)?;

        Ok(SpreadsheetInfo {
            spreadsheet_id: spreadsheet
                .spreadsheet_id
                .unwrap_or_else(|| spreadsheet_id.to_string()),
            title: spreadsheet.properties.and_then(|p| p.title),
        })
    }

    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<ValueMatrix, SheetsError> {
        let (_, value_range) = self
            .hub
            .spreadsheets()
            .values_get(spreadsheet_id, range)
            .major_dimension("ROWS")
            .value_render_option("FORMATTED_VALUE")
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(classify)?;

        Ok(value_range.values.unwrap_or_default())
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: ValueMatrix,
        option: ValueInputOption,
    ) -> Result<(), SheetsError> {
        let request = ValueRange {
            major_dimension: Some("ROWS".to_string()),
            range: Some(range.to_string()),
            values: Some(values),
        };

        self.hub
            .spreadsheets()
            .values_update(request, spreadsheet_id, range)
            .value_input_option(option.as_str())
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<(), SheetsError> {
        self.hub
            .spreadsheets()
            .values_clear(ClearValuesRequest::default(), spreadsheet_id, range)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(classify)?;
        Ok(())
    }
}
