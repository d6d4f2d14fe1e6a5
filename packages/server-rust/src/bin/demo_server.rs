//! Demo opsgate server.
//!
//! Loads an operation map, registers a `createUser` handler, and serves
//! until ctrl-c. Useful for poking at the dispatch pipeline:
//!
//! ```text
//! demo-server --operations assets/operations.json --port 3000
//! curl -X POST localhost:3000/createUser -H 'content-type: application/json' \
//!     -d '{"email":"ada@example.com"}'
//! ```

use std::path::PathBuf;

use clap::Parser;
use opsgate_server::{handler_fn, ApiConfig, ApiModule, CallContext, HandlerOutcome};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "demo-server", about = "Opsgate demo server")]
struct Args {
    /// Path to a JSON config file; defaults apply for any omitted field.
    #[arg(long, env = "OPSGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the configured operation-map path.
    #[arg(long)]
    operations: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ApiConfig::from_file(path)?,
        None => ApiConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(operations) = args.operations {
        config.operations_path = Some(operations);
    }
    if config.operations_path.is_none() {
        config.operations_path = Some(PathBuf::from("assets/operations.json"));
    }

    let mut module = ApiModule::new(config)?;
    module.register_handler(
        "createUser",
        handler_fn(|call: CallContext| async move {
            let email = call.input["email"].as_str().unwrap_or_default().to_string();
            info!(key = %call.key, %email, "creating user");
            HandlerOutcome::body(json!({ "status": "OK", "email": email }))
        }),
    );
    module.register_handler(
        "listUsers",
        handler_fn(|_call: CallContext| async move {
            HandlerOutcome::body(json!({ "status": "OK", "users": Value::Array(vec![]) }))
        }),
    );

    let port = module.start().await?;
    info!("demo server listening on port {port}");

    module
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
