use crate::{api::client::ApiClient, errors::GatewayError, models::cloud::CloudInfo, routes::routes};

pub async fn cloud_info(client: &ApiClient) -> Result<CloudInfo, GatewayError> {
    client.get_json(routes::CLOUD_INFO, routes::CLOUD_INFO).await
}
