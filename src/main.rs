use anyhow::Result;
use rigfleet::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    let app_config = config::AppConfig::load()?;

    let store = Arc::new(
        store::Store::connect(&app_config.database.path, app_config.database.max_pool_size)
            .await?,
    );
    store.init().await?;

    let proxy = match app_config.proxy {
        Some(ref p) => Some(Arc::new(proxy_client::ProxyClient::new(
            &p.url,
            &p.access_token,
        )?)),
        None => None,
    };
    if app_config.auth.agent_key().is_none() {
        tracing::warn!("auth.agent_key is empty; agent endpoints accept unauthenticated requests");
    }

    let shutdown = shutdown::token_on_signal();
    let worker_handle = worker::spawn(
        store.clone(),
        worker::PruneWorkerConfig {
            retention_days: app_config.history.retention_days,
            interval_secs: app_config.history.prune_interval_secs,
            schedule: app_config.history.prune_schedule.clone(),
        },
        shutdown.clone(),
    );

    let app = routes::app(store, proxy, app_config.auth.agent_key());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(version = version::VERSION, "Listening on http://{}", addr);

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await?;

    shutdown.cancel();
    let _ = worker_handle.await;
    tracing::info!("Coordinator stopped");
    Ok(())
}
