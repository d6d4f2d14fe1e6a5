//! API module with deferred startup lifecycle.
//!
//! `new()` loads config-driven resources (operation map, audit log),
//! `start()` binds the TCP listener, and `serve()` starts accepting calls.
//! Handler and schema registration happens between `new()` and `serve()`;
//! the routing table is frozen when the router is built, so the schema
//! store and dispatch table need no synchronization at request time.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::routing::{get, on, MethodFilter};
use axum::Router;
use opsgate_core::{OperationMap, OperationSpec, TransportMethod};
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::handlers::{operation_handler, status_handler};
use super::middleware::build_http_layers;
use crate::audit::{AuditLedger, AuditLog};
use crate::config::{ApiConfig, ConfigError};
use crate::service::{AppState, HandlerRegistry, OperationHandler, SchemaStore};

/// Path reserved for the fixed health check; operation names cannot claim it.
const STATUS_PATH: &str = "status";

/// Owns one server instance: configuration, schema store, handler registry,
/// audit ledger, and the listener lifecycle.
pub struct ApiModule {
    config: Arc<ApiConfig>,
    listener: Option<TcpListener>,
    schemas: SchemaStore,
    handlers: HandlerRegistry,
    ledger: Arc<AuditLedger>,
}

impl ApiModule {
    /// Creates a module, loading the operation map named by the config.
    ///
    /// # Errors
    ///
    /// Configuration errors are fatal: an unreadable or malformed operation
    /// map, or an audit log path that cannot be opened, prevents the module
    /// from being constructed at all.
    pub fn new(config: ApiConfig) -> Result<Self, ConfigError> {
        let operations = config.load_operations()?;
        Self::with_operations(config, operations)
    }

    /// Creates a module from an already-parsed operation map. Used by
    /// embedding applications and tests that build their schemas in code.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AuditLog`] if the configured audit log file
    /// cannot be opened.
    pub fn with_operations(
        config: ApiConfig,
        operations: OperationMap,
    ) -> Result<Self, ConfigError> {
        let log = match &config.audit_log_path {
            Some(path) => AuditLog::open(path).map_err(|source| ConfigError::AuditLog {
                path: path.clone(),
                source,
            })?,
            None => AuditLog::disabled(),
        };
        let ledger = Arc::new(AuditLedger::new(log, config.audit_max_records));
        info!(operations = operations.len(), "operation map loaded");

        Ok(Self {
            config: Arc::new(config),
            listener: None,
            schemas: SchemaStore::from_map(operations),
            handlers: HandlerRegistry::new(),
            ledger,
        })
    }

    /// Shared reference to the audit ledger, for inspection by the
    /// embedding application.
    #[must_use]
    pub fn ledger(&self) -> Arc<AuditLedger> {
        Arc::clone(&self.ledger)
    }

    /// Binds `handler` to an operation name. If no schema is known for the
    /// name, calls to it answer with a `VAL0000` envelope until one is
    /// registered.
    pub fn register_handler<H>(&mut self, name: &str, handler: H)
    where
        H: OperationHandler + 'static,
    {
        self.handlers.insert(name, handler);
    }

    /// Registers a code-time schema together with its handler. The schema
    /// store keeps the first registration for a name; a duplicate spec is
    /// logged and discarded while the handler still binds.
    pub fn register_operation<H>(&mut self, name: &str, spec: OperationSpec, handler: H)
    where
        H: OperationHandler + 'static,
    {
        self.schemas.register(name, spec);
        self.handlers.insert(name, handler);
    }

    /// Assembles the axum router: the fixed `/status` health check plus one
    /// route per operation known to either the schema store or the handler
    /// registry, each bound under its spec's transport method (default POST).
    #[must_use]
    pub fn build_router(&self) -> Router {
        let state = AppState {
            schemas: Arc::new(self.schemas.clone()),
            handlers: Arc::new(self.handlers.clone()),
            ledger: Arc::clone(&self.ledger),
            config: Arc::clone(&self.config),
        };

        let mut router = Router::new().route("/status", get(status_handler).post(status_handler));

        let mut names: BTreeSet<String> = self.schemas.iter().map(|(n, _)| n.clone()).collect();
        names.extend(self.handlers.names());

        for name in names {
            if name == STATUS_PATH {
                warn!("operation name \"status\" collides with the health check, skipped");
                continue;
            }
            let method = self
                .schemas
                .lookup(&name)
                .map_or_else(TransportMethod::default, |spec| spec.method);
            router = bind_operation(router, &name, method, state.clone());
        }

        router.layer(build_http_layers(&self.config))
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves calls until the shutdown future resolves.
    ///
    /// Consumes `self` because the listener is moved into the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let addr = self
            .listener
            .as_ref()
            .expect("start() must be called before serve()")
            .local_addr()?;
        info!(
            %addr,
            operations = self.schemas.len(),
            handlers = self.handlers.len(),
            "serving"
        );

        let router = self.build_router();
        let listener = self
            .listener
            .expect("start() must be called before serve()");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Binds one operation route at `/{name}` under its transport method.
fn bind_operation(
    router: Router,
    name: &str,
    method: TransportMethod,
    state: AppState,
) -> Router {
    let path = format!("/{name}");
    let operation = name.to_string();
    let handler = move |request: Request| {
        let state = state.clone();
        let operation = operation.clone();
        async move { operation_handler(state, operation, request).await }
    };
    router.route(&path, on(method_filter(method), handler))
}

fn method_filter(method: TransportMethod) -> MethodFilter {
    match method {
        TransportMethod::Get => MethodFilter::GET,
        TransportMethod::Post => MethodFilter::POST,
        TransportMethod::Put => MethodFilter::PUT,
        TransportMethod::Delete => MethodFilter::DELETE,
        TransportMethod::Patch => MethodFilter::PATCH,
    }
}
