use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use subject_registry::config::Config;
use subject_registry::router::{RegistryState, registry_router};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        listen_addr = %cfg.listen_addr,
        loglevel = %cfg.loglevel,
        restrict_account_read = cfg.restrict_account_read,
        "starting subject registry"
    );
    if cfg.access_key.is_empty() {
        warn!("REGISTRY_ACCESS_KEY is empty; every request will be rejected");
    }
    if !cfg.restrict_account_read {
        warn!("account reads are open to every authenticated role");
    }

    let state = RegistryState::from_config(&cfg).await?;

    if let Some((username, email, password)) = cfg.bootstrap_admin() {
        match state
            .reconciliation
            .bootstrap_admin(username, email, password)
            .await
        {
            Ok(Some(id)) => info!(subject_id = %id, "bootstrap admin created"),
            Ok(None) => info!("admin already present; bootstrap skipped"),
            Err(e) => warn!(error = %e, "failed to create bootstrap admin"),
        }
    }

    let app = registry_router(state);

    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
