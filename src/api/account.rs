//! Account calls: password change and the two-step password reset.

use reqwest::{Method, header::CONTENT_TYPE};

use crate::{
    api::client::ApiClient, errors::GatewayError, models::account::KeyAndPassword, routes::routes,
};

pub async fn change_password(client: &ApiClient, new_password: &str) -> Result<(), GatewayError> {
    post_text(client, routes::CHANGE_PASSWORD, new_password).await
}

/// Asks the server to mail a reset key to `email`.
pub async fn reset_password_init(client: &ApiClient, email: &str) -> Result<(), GatewayError> {
    post_text(client, routes::RESET_PASSWORD_INIT, email).await
}

pub async fn reset_password_finish(
    client: &ApiClient,
    key: &str,
    new_password: &str,
) -> Result<(), GatewayError> {
    let body = KeyAndPassword {
        key: key.to_string(),
        new_password: new_password.to_string(),
    };
    let response = client
        .request(Method::POST, routes::RESET_PASSWORD_FINISH)
        .json(&body)
        .send()
        .await?;
    ApiClient::check(response, routes::RESET_PASSWORD_FINISH).await?;
    Ok(())
}

async fn post_text(client: &ApiClient, path: &str, body: &str) -> Result<(), GatewayError> {
    let response = client
        .request(Method::POST, path)
        .header(CONTENT_TYPE, "text/plain")
        .body(body.to_string())
        .send()
        .await?;
    ApiClient::check(response, path).await?;
    Ok(())
}
