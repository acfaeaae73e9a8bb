use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use api::{client::ApiClient, uploader::HttpChunkTransport, uploads::RestRecordGateway};
use config::Command;
use handlers::{account_handlers, record_handlers, upload_handlers};
use services::session::Uploader;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + command ---
    let (cfg, command) = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        base_url = %cfg.base_url,
        csrf = cfg.csrf_token.is_some(),
        "Starting flow-uploader"
    );
    tracing::debug!(settings = ?cfg.upload, timeout = ?cfg.request_timeout, "upload settings");

    // --- HTTP client shared by every call ---
    let client = ApiClient::new(&cfg.base_url, cfg.csrf_token.clone(), cfg.request_timeout)
        .context("building HTTP client")?;
    let gateway = RestRecordGateway::new(client.clone());

    match command {
        Command::Upload { path, resume } => {
            let uploader = Uploader::new(
                &cfg.upload,
                Arc::new(HttpChunkTransport::new(client)),
                Arc::new(gateway),
            );
            upload_handlers::upload(&uploader, &path, resume).await
        }
        Command::Create { name } => record_handlers::create(&gateway, &name).await.map(|_| ()),
        Command::List => record_handlers::list(&gateway).await,
        Command::Get { id } => record_handlers::get(&gateway, &id).await,
        Command::Delete { id } => record_handlers::delete(&gateway, &id).await,
        Command::Rename { id, name } => record_handlers::rename(&gateway, &id, &name)
            .await
            .map(|_| ()),
        Command::ChangePassword { password } => {
            account_handlers::change_password(&client, &password).await
        }
        Command::ResetPasswordInit { email } => {
            account_handlers::reset_password_init(&client, &email).await
        }
        Command::ResetPasswordFinish { key, password } => {
            account_handlers::reset_password_finish(&client, &key, &password).await
        }
        Command::CloudInfo => account_handlers::cloud_info(&client).await,
    }
}
