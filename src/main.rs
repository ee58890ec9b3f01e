use std::sync::Arc;

use inquiry_intake::config::{IntakeConfig, StoreKind};
use inquiry_intake::inquiries::routes::{AppState, cors_layer, intake_routes};
use inquiry_intake::store::{BoundedMemoryStore, LibSqlStore, MessageStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = IntakeConfig::from_env()?;

    let store: Arc<dyn MessageStore> = match config.store {
        StoreKind::Memory => {
            tracing::warn!(
                capacity = config.memory_capacity,
                "Using bounded in-memory store; messages are lost on restart"
            );
            Arc::new(BoundedMemoryStore::new(config.memory_capacity))
        }
        StoreKind::LibSql => Arc::new(LibSqlStore::new_local(&config.db_path).await?),
    };

    let addr = config.socket_addr();
    eprintln!("📥 Inquiry Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Store: {}", store.backend());
    eprintln!("   Form:    http://{addr}/api/contact");
    eprintln!("   Webhook: http://{addr}/api/webhooks/inbound-email");
    eprintln!("   Admin:   http://{addr}/api/messages");

    let app = intake_routes(AppState::new(store)).layer(cors_layer(&config.cors_origins));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Intake server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Intake server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
