//! Account and footer commands.

use anyhow::{Context, Result};

use crate::api::{account, client::ApiClient, cloud};

pub async fn change_password(client: &ApiClient, password: &str) -> Result<()> {
    account::change_password(client, password)
        .await
        .context("changing password")?;
    println!("password changed");
    Ok(())
}

pub async fn reset_password_init(client: &ApiClient, email: &str) -> Result<()> {
    account::reset_password_init(client, email)
        .await
        .context("requesting password reset")?;
    println!("reset mail requested for {email}");
    Ok(())
}

pub async fn reset_password_finish(client: &ApiClient, key: &str, password: &str) -> Result<()> {
    account::reset_password_finish(client, key, password)
        .await
        .context("finishing password reset")?;
    println!("password reset");
    Ok(())
}

pub async fn cloud_info(client: &ApiClient) -> Result<()> {
    let info = cloud::cloud_info(client).await.context("fetching cloud info")?;
    println!(
        "service {}  container {}",
        info.service_name.as_deref().unwrap_or("-"),
        info.container_name.as_deref().unwrap_or("-")
    );
    Ok(())
}
