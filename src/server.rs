//! The gRPC surface of the provider.
//!
//! [`ProviderService`] is what the provider implements; [`serve`] exposes it
//! over the `hemmer.provider.v1.Provider` service and prints the handshake.
//!
//! # Signal Handling
//!
//! On SIGTERM or SIGINT the server:
//! 1. Calls the provider's `stop()`, cancelling in-flight Sheets calls
//! 2. Stops accepting new connections
//! 3. Waits up to [`ServeOptions::shutdown_timeout`] for requests to drain

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated;
use crate::schema::{Block, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::types::{handshake_line, ImportedResource, PlanResult, ProviderMetadata};

/// Operations a provider exposes to the host.
///
/// Configs and states are plain [`serde_json::Value`]s; the gRPC adapter
/// handles the byte encoding.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Resource and data source names plus capability flags.
    /// By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
            capabilities: Default::default(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider. Failures are reported as error diagnostics.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider, abandoning work in flight.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Upgrade resource state from an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Plan a create (`prior_state` is `None`), update, or destroy
    /// (`proposed_state` is null).
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::InvalidRequest(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}

/// Decode a JSON payload. Empty bytes mean "absent" and decode to null.
///
/// Malformed JSON is rejected with `InvalidArgument` rather than being read
/// as null.
fn decode(bytes: &[u8], field: &'static str) -> Result<Value, tonic::Status> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| {
        warn!(field, error = %e, "rejecting malformed JSON payload");
        tonic::Status::from(ProviderError::Serialization(e))
    })
}

fn encode(value: &Value) -> Vec<u8> {
    if value.is_null() {
        return Vec::new();
    }
    serde_json::to_vec(value).unwrap_or_default()
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<generated::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| generated::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => generated::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => generated::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

/// An operation error as a single error diagnostic; the detail carries the
/// gRPC code the error maps to.
fn error_to_diagnostics(err: ProviderError) -> Vec<generated::Diagnostic> {
    let summary = err.to_string();
    let code = tonic::Status::from(err).code();
    vec![generated::Diagnostic {
        severity: generated::diagnostic::Severity::Error as i32,
        summary,
        detail: format!("{:?}", code),
        attribute: String::new(),
    }]
}

/// Log diagnostics from a validate or configure call.
fn log_diagnostics(operation: &'static str, subject: &str, diagnostics: &[Diagnostic]) {
    if diagnostics.iter().any(Diagnostic::is_error) {
        warn!(
            operation,
            subject,
            diagnostics = diagnostics.len(),
            "completed with errors"
        );
    } else {
        info!(operation, subject, "completed successfully");
    }
}

fn schema_to_proto(schema: &Schema) -> generated::Schema {
    generated::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> generated::Block {
    let mut attributes: Vec<_> = block
        .attributes
        .iter()
        .map(|(name, attr)| generated::Attribute {
            name: name.clone(),
            r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
            required: attr.flags.required,
            optional: attr.flags.optional,
            computed: attr.flags.computed,
            sensitive: attr.flags.sensitive,
            description: attr.description.clone().unwrap_or_default(),
            force_new: false,
            default_value: attr.default.as_ref().map(encode).unwrap_or_default(),
        })
        .collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name));

    let mut block_types: Vec<_> = block
        .blocks
        .iter()
        .map(|(name, nested)| generated::NestedBlock {
            type_name: name.clone(),
            block: Some(block_to_proto(&nested.block)),
            nesting_mode: generated::nested_block::NestingMode::List as i32,
            min_items: nested.min_items as i32,
            max_items: nested.max_items as i32,
        })
        .collect();
    block_types.sort_by(|a, b| a.type_name.cmp(&b.type_name));

    generated::Block {
        attributes,
        block_types,
        description: block.description.clone().unwrap_or_default(),
    }
}

/// Wrapper that implements the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

#[tonic::async_trait]
impl<P: ProviderService> generated::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip(self, _request), name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: tonic::Request<generated::GetMetadataRequest>,
    ) -> Result<tonic::Response<generated::GetMetadataResponse>, tonic::Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata completed"
        );
        Ok(tonic::Response::new(generated::GetMetadataResponse {
            server_capabilities: Some(metadata.capabilities.into()),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<generated::GetSchemaRequest>,
    ) -> Result<tonic::Response<generated::GetSchemaResponse>, tonic::Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema completed"
        );
        Ok(tonic::Response::new(generated::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: tonic::Request<generated::ValidateProviderConfigRequest>,
    ) -> Result<tonic::Response<generated::ValidateProviderConfigResponse>, tonic::Status> {
        let config = decode(&request.into_inner().config, "config")?;

        let diagnostics = match self.provider.validate_provider_config(config).await {
            Ok(diagnostics) => {
                log_diagnostics("ValidateProviderConfig", "provider", &diagnostics);
                diagnostics_to_proto(diagnostics)
            }
            Err(e) => {
                error!(error = %e, "ValidateProviderConfig failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(
            generated::ValidateProviderConfigResponse { diagnostics },
        ))
    }

    #[instrument(skip(self, request), name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<generated::ConfigureRequest>,
    ) -> Result<tonic::Response<generated::ConfigureResponse>, tonic::Status> {
        let config = decode(&request.into_inner().config, "config")?;

        let diagnostics = match self.provider.configure(config).await {
            Ok(diagnostics) => {
                log_diagnostics("Configure", "provider", &diagnostics);
                diagnostics_to_proto(diagnostics)
            }
            Err(e) => {
                error!(error = %e, "Configure failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(generated::ConfigureResponse {
            diagnostics,
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.stop")]
    async fn stop(
        &self,
        _request: tonic::Request<generated::StopRequest>,
    ) -> Result<tonic::Response<generated::StopResponse>, tonic::Status> {
        info!("Stop called");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            }
        };
        Ok(tonic::Response::new(generated::StopResponse { error }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<generated::ValidateResourceConfigRequest>,
    ) -> Result<tonic::Response<generated::ValidateResourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let config = decode(&req.config, "config")?;

        let diagnostics = match self
            .provider
            .validate_resource_config(&req.resource_type, config)
            .await
        {
            Ok(diagnostics) => {
                log_diagnostics("ValidateResourceConfig", &req.resource_type, &diagnostics);
                diagnostics_to_proto(diagnostics)
            }
            Err(e) => {
                error!(error = %e, "ValidateResourceConfig failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(
            generated::ValidateResourceConfigResponse { diagnostics },
        ))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.upgrade_resource_state")]
    async fn upgrade_resource_state(
        &self,
        request: tonic::Request<generated::UpgradeResourceStateRequest>,
    ) -> Result<tonic::Response<generated::UpgradeResourceStateResponse>, tonic::Status> {
        let req = request.into_inner();
        let state = decode(&req.raw_state, "raw_state")?;

        match self
            .provider
            .upgrade_resource_state(&req.resource_type, req.version, state)
            .await
        {
            Ok(upgraded) => {
                debug!(from_version = req.version, "UpgradeResourceState completed");
                Ok(tonic::Response::new(
                    generated::UpgradeResourceStateResponse {
                        upgraded_state: encode(&upgraded),
                        diagnostics: vec![],
                    },
                ))
            }
            Err(e) => {
                error!(version = req.version, error = %e, "UpgradeResourceState failed");
                Ok(tonic::Response::new(
                    generated::UpgradeResourceStateResponse {
                        upgraded_state: vec![],
                        diagnostics: error_to_diagnostics(e),
                    },
                ))
            }
        }
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.plan")]
    async fn plan(
        &self,
        request: tonic::Request<generated::PlanRequest>,
    ) -> Result<tonic::Response<generated::PlanResponse>, tonic::Status> {
        let req = request.into_inner();
        let prior_state = Some(decode(&req.prior_state, "prior_state")?).filter(|v| !v.is_null());
        let proposed_state = decode(&req.proposed_state, "proposed_state")?;
        let config = decode(&req.config, "config")?;
        debug!(is_create = prior_state.is_none(), "Plan called");

        match self
            .provider
            .plan(&req.resource_type, prior_state, proposed_state, config)
            .await
        {
            Ok(result) => {
                info!(
                    changes = result.changes.len(),
                    requires_replace = result.requires_replace,
                    "Plan completed"
                );
                Ok(tonic::Response::new(generated::PlanResponse {
                    planned_state: encode(&result.planned_state),
                    changes: result.changes.into_iter().map(Into::into).collect(),
                    requires_replace: result.requires_replace,
                    diagnostics: vec![],
                }))
            }
            Err(e) => {
                error!(error = %e, "Plan failed");
                Ok(tonic::Response::new(generated::PlanResponse {
                    planned_state: vec![],
                    changes: vec![],
                    requires_replace: false,
                    diagnostics: error_to_diagnostics(e),
                }))
            }
        }
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.create")]
    async fn create(
        &self,
        request: tonic::Request<generated::CreateRequest>,
    ) -> Result<tonic::Response<generated::CreateResponse>, tonic::Status> {
        let req = request.into_inner();
        let planned_state = decode(&req.planned_state, "planned_state")?;

        let (state, diagnostics) = match self.provider.create(&req.resource_type, planned_state).await {
            Ok(state) => {
                info!("Create completed successfully");
                (encode(&state), vec![])
            }
            Err(e) => {
                error!(error = %e, "Create failed");
                (vec![], error_to_diagnostics(e))
            }
        };
        Ok(tonic::Response::new(generated::CreateResponse {
            state,
            diagnostics,
        }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.read")]
    async fn read(
        &self,
        request: tonic::Request<generated::ReadRequest>,
    ) -> Result<tonic::Response<generated::ReadResponse>, tonic::Status> {
        let req = request.into_inner();
        let current_state = decode(&req.current_state, "current_state")?;

        let (state, diagnostics) = match self.provider.read(&req.resource_type, current_state).await {
            Ok(state) => {
                debug!("Read completed successfully");
                (encode(&state), vec![])
            }
            Err(e) => {
                error!(error = %e, "Read failed");
                (vec![], error_to_diagnostics(e))
            }
        };
        Ok(tonic::Response::new(generated::ReadResponse {
            state,
            diagnostics,
        }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.update")]
    async fn update(
        &self,
        request: tonic::Request<generated::UpdateRequest>,
    ) -> Result<tonic::Response<generated::UpdateResponse>, tonic::Status> {
        let req = request.into_inner();
        let prior_state = decode(&req.prior_state, "prior_state")?;
        let planned_state = decode(&req.planned_state, "planned_state")?;

        let (state, diagnostics) = match self
            .provider
            .update(&req.resource_type, prior_state, planned_state)
            .await
        {
            Ok(state) => {
                info!("Update completed successfully");
                (encode(&state), vec![])
            }
            Err(e) => {
                error!(error = %e, "Update failed");
                (vec![], error_to_diagnostics(e))
            }
        };
        Ok(tonic::Response::new(generated::UpdateResponse {
            state,
            diagnostics,
        }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.delete")]
    async fn delete(
        &self,
        request: tonic::Request<generated::DeleteRequest>,
    ) -> Result<tonic::Response<generated::DeleteResponse>, tonic::Status> {
        let req = request.into_inner();
        let current_state = decode(&req.current_state, "current_state")?;

        let diagnostics = match self.provider.delete(&req.resource_type, current_state).await {
            Ok(()) => {
                info!("Delete completed successfully");
                vec![]
            }
            Err(e) => {
                error!(error = %e, "Delete failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(generated::DeleteResponse { diagnostics }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type, id = %request.get_ref().id), name = "grpc.import_resource_state")]
    async fn import_resource_state(
        &self,
        request: tonic::Request<generated::ImportResourceStateRequest>,
    ) -> Result<tonic::Response<generated::ImportResourceStateResponse>, tonic::Status> {
        let req = request.into_inner();

        let (imported, diagnostics) = match self
            .provider
            .import_resource(&req.resource_type, &req.id)
            .await
        {
            Ok(imported) => {
                info!(imported_count = imported.len(), "ImportResourceState completed");
                (imported.into_iter().map(Into::into).collect(), vec![])
            }
            Err(e) => {
                error!(error = %e, "ImportResourceState failed");
                (vec![], error_to_diagnostics(e))
            }
        };
        Ok(tonic::Response::new(
            generated::ImportResourceStateResponse {
                imported,
                diagnostics,
            },
        ))
    }

    #[instrument(skip(self, request), fields(data_source_type = %request.get_ref().data_source_type), name = "grpc.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        request: tonic::Request<generated::ValidateDataSourceConfigRequest>,
    ) -> Result<tonic::Response<generated::ValidateDataSourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let config = decode(&req.config, "config")?;

        let diagnostics = match self
            .provider
            .validate_data_source_config(&req.data_source_type, config)
            .await
        {
            Ok(diagnostics) => {
                log_diagnostics("ValidateDataSourceConfig", &req.data_source_type, &diagnostics);
                diagnostics_to_proto(diagnostics)
            }
            Err(e) => {
                error!(error = %e, "ValidateDataSourceConfig failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(
            generated::ValidateDataSourceConfigResponse { diagnostics },
        ))
    }

    #[instrument(skip(self, request), fields(data_source_type = %request.get_ref().data_source_type), name = "grpc.read_data_source")]
    async fn read_data_source(
        &self,
        request: tonic::Request<generated::ReadDataSourceRequest>,
    ) -> Result<tonic::Response<generated::ReadDataSourceResponse>, tonic::Status> {
        let req = request.into_inner();
        let config = decode(&req.config, "config")?;

        let (state, diagnostics) = match self
            .provider
            .read_data_source(&req.data_source_type, config)
            .await
        {
            Ok(state) => {
                info!("ReadDataSource completed successfully");
                (encode(&state), vec![])
            }
            Err(e) => {
                error!(error = %e, "ReadDataSource failed");
                (vec![], error_to_diagnostics(e))
            }
        };
        Ok(tonic::Response::new(generated::ReadDataSourceResponse {
            state,
            diagnostics,
        }))
    }
}

/// Options for configuring the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may drain after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for SIGTERM or SIGINT (CTRL+C on Windows).
///
/// If the handlers cannot be installed the server keeps running and only
/// stops when the host kills it.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!(error = %e, "failed to install signal handlers");
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
    }

    #[cfg(windows)]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install CTRL+C handler");
            return std::future::pending().await;
        }
        info!("received CTRL+C, shutting down");
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::future::pending::<()>().await;
    }
}

/// Serve a provider on an ephemeral localhost port.
///
/// Prints `HEMMER_PROVIDER|<version>|<address>` on stdout once listening,
/// then runs until SIGTERM or SIGINT.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_with_shutdown(provider, listener, options, wait_for_shutdown_signal()).await
}

/// Serve a provider on a specific address.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_shutdown(provider, listener, options, wait_for_shutdown_signal()).await
}

/// Serve on an already-bound listener until `signal` resolves.
///
/// On `signal` the provider is stopped first, so that Sheets calls in flight
/// are cancelled, and then the server drains for at most
/// `options.shutdown_timeout`.
pub async fn serve_with_shutdown<P, F>(
    provider: P,
    listener: TcpListener,
    options: ServeOptions,
    signal: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    P: ProviderService,
    F: Future<Output = ()>,
{
    let addr = listener.local_addr()?;
    println!("{}", handshake_line(addr));
    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let grpc_service = ProviderGrpcService {
        provider: Arc::clone(&provider),
    };

    let (drain_tx, drain_rx) = oneshot::channel::<()>();
    let server = Server::builder()
        .add_service(generated::provider_server::ProviderServer::new(grpc_service))
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async {
                let _ = drain_rx.await;
            },
        );
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result?;
            info!("Server stopped");
            return Ok(());
        }
        _ = signal => {}
    }

    debug!("Calling provider stop()");
    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop() returned error");
    }
    let _ = drain_tx.send(());

    match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
        Ok(Ok(())) => info!("Server shutdown complete"),
        Ok(Err(e)) => {
            error!(error = %e, "Server error during shutdown");
            return Err(e.into());
        }
        Err(_) => warn!(
            timeout = ?options.shutdown_timeout,
            "Shutdown timeout exceeded, abandoning in-flight requests"
        ),
    }
    Ok(())
}
