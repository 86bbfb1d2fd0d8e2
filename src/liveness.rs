//! Minimal HTTP endpoint for uptime monitors.

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::config::LivenessConfig;

async fn alive() -> &'static str {
    "I'm alive!"
}

pub fn router() -> Router {
    Router::new().route("/", get(alive))
}

pub async fn bind(config: &LivenessConfig) -> Result<TcpListener> {
    let address = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding liveness endpoint on {}", address))
}

pub async fn serve(listener: TcpListener) -> Result<()> {
    if let Ok(address) = listener.local_addr() {
        log::info!("Liveness endpoint listening on http://{}", address);
    }
    axum::serve(listener, router()).await?;
    Ok(())
}
