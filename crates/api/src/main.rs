use std::sync::Arc;

use anyhow::Context;

use bakery_api::app::{build_app, services::AppServices};
use bakery_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bakery_observability::init();

    let config = AppConfig::from_env()?;
    let services = Arc::new(AppServices::from_config(&config).await?);
    let app = build_app(services);

    let address = config.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!(address = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
