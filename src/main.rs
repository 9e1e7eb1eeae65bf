use std::sync::Arc;

use followup_engine::api::follow_up_routes;
use followup_engine::config::{EngineConfig, ServerConfig};
use followup_engine::error::Result;
use followup_engine::followup::FollowUpService;
use followup_engine::store::LibSqlBackend;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let engine_config = EngineConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export FOLLOWUP_TENANT_ID=<tenant uuid>");
        std::process::exit(1);
    });
    let server_config = ServerConfig::from_env()?;

    eprintln!("Follow-up engine v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Tenant: {}", engine_config.tenant_id);
    eprintln!(
        "   Interval: {} min, batch {}",
        engine_config.check_interval_minutes, engine_config.batch_size
    );
    eprintln!("   API: http://0.0.0.0:{}/api/follow-up", server_config.http_port);

    // ── Database ─────────────────────────────────────────────────────────
    let db = Arc::new(
        LibSqlBackend::new_local(&server_config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    server_config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", server_config.db_path.display());

    // ── Service ──────────────────────────────────────────────────────────
    let auto_start = engine_config.auto_start;
    let service = FollowUpService::new(engine_config, db.clone(), db.clone(), db);
    if auto_start {
        service.start();
    } else {
        eprintln!("   Timer: stopped (POST /api/follow-up/start to arm)");
    }

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = follow_up_routes(service.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", server_config.http_port)).await?;
    tracing::info!(port = server_config.http_port, "Follow-up API started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    service.stop();
    tracing::info!("Shutting down");
    Ok(())
}
