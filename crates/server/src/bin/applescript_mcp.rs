use std::sync::Arc;

use executors::{ExecutionBridge, InterpreterLauncher};
use rmcp::{ServiceExt, transport::stdio};
use server::{config::ServerConfig, mcp::applescript_server::AppleScriptServer};
use utils::{logging::init_tracing, sentry::dsn_from_env, shell::resolve_executable_path};

fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_args();

    let _guard = dsn_from_env().map(|dsn| {
        let environment = if cfg!(debug_assertions) {
            "dev"
        } else {
            "production"
        };
        let guard = sentry::init(sentry::ClientOptions {
            dsn: Some(dsn),
            release: sentry::release_name!(),
            environment: Some(environment.into()),
            ..Default::default()
        });
        sentry::configure_scope(|scope| {
            scope.set_tag("source", "mcp");
        });
        guard
    });

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    init_tracing(config.log_level);

    if let Some(raw) = &config.unrecognized_log_level {
        tracing::warn!("Unrecognized log level '{}', using {}", raw, config.log_level);
    }
    tracing::info!("Logging configured with level: {}", config.log_level);
    tracing::info!("Server starting");

    let interpreter = config.interpreter.to_string_lossy().into_owned();
    match resolve_executable_path(&interpreter).await {
        Some(path) => tracing::debug!(interpreter = %path.display(), "Resolved interpreter"),
        None => tracing::warn!(
            interpreter = %interpreter,
            "Interpreter not found; script executions will fail until it is available"
        ),
    }

    let launcher = Arc::new(InterpreterLauncher::new(&config.interpreter));
    let bridge = ExecutionBridge::with_launcher(config.bridge_config(), launcher);

    let service = AppleScriptServer::new(bridge)
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
            sentry::capture_error(e);
        })?;

    tracing::info!("Server running with stdio transport");
    service.waiting().await?;

    tracing::info!("Server stopped");
    Ok(())
}
