use std::sync::Arc;

use anyhow::Context;

use featctl_api::app::{self, services::AppServices};
use featctl_infra::config::{self, AppConfig};
use featctl_infra::workers::CoordinatorWorker;

fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    featctl_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    // Backends hold a blocking HTTP client; build them (and drop them) outside
    // the async runtime.
    let services = Arc::new(app::services::build_services(&config).context("failed to wire services")?);
    let worker = CoordinatorWorker::spawn(services.coordinator.clone()).context("failed to spawn coordinator worker")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build the async runtime")?;
    let served = runtime.block_on(serve(&config.bind_addr, services.clone()));
    drop(runtime);

    worker.shutdown();
    served
}

async fn serve(bind_addr: &str, services: Arc<AppServices>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app::build_app(services))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "unable to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
