use anyhow::Context;

use crate::api::state::ApiState;
use crate::config::AppConfig;

pub mod config;
pub mod controllers;
pub mod endpoint;
pub mod models;
pub mod state;

pub async fn http_service(config: AppConfig) -> anyhow::Result<()> {
    config
        .sheets
        .validate()
        .context("invalid sheets config")?;

    let http_client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let credentials = config.sheets.credentials.clone();
    tracing::info!(?credentials, "service account credentials source");

    let state = ApiState::builder()
        .with_config(config.api)
        .with_sheets_config(config.sheets)
        .with_http_client(http_client)
        .with_credentials(credentials)
        .build()?;

    let endpoint = state.bind_endpoint().await?;
    tracing::info!(listen_addr = %endpoint.local_addr()?, "API server started");

    endpoint.serve().await.context("API server failed")?;
    tracing::info!("API server stopped");

    Ok(())
}
