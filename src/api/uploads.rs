//! `api/uploads` over HTTP.

use async_trait::async_trait;
use reqwest::{Method, StatusCode, header::LOCATION};
use tracing::debug;

use crate::{
    api::client::ApiClient,
    errors::GatewayError,
    models::upload::UploadRecord,
    routes::routes,
    services::gateway::{RecordGateway, validate_id},
};

#[derive(Clone, Debug)]
pub struct RestRecordGateway {
    client: ApiClient,
}

impl RestRecordGateway {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordGateway for RestRecordGateway {
    async fn list(&self) -> Result<Vec<UploadRecord>, GatewayError> {
        self.client.get_json(routes::UPLOADS, routes::UPLOADS).await
    }

    async fn get(&self, id: &str) -> Result<UploadRecord, GatewayError> {
        validate_id(id)?;
        self.client.get_json(&routes::upload(id), id).await
    }

    async fn create(&self, record: &UploadRecord) -> Result<String, GatewayError> {
        let response = self
            .client
            .request(Method::POST, routes::UPLOADS)
            .json(record)
            .send()
            .await?;
        let response = ApiClient::check(response, routes::UPLOADS).await?;
        if response.status() != StatusCode::CREATED {
            debug!(status = %response.status(), "create answered without 201");
        }

        let id = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| location.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or(GatewayError::MissingLocation)?;
        validate_id(&id)?;
        Ok(id)
    }

    /// PUTs the record, then reads it back so the caller sees what the
    /// server stored.
    async fn update(&self, record: &UploadRecord) -> Result<UploadRecord, GatewayError> {
        let id = record.id();
        validate_id(id)?;
        let response = self
            .client
            .request(Method::PUT, routes::UPLOADS)
            .json(record)
            .send()
            .await?;
        ApiClient::check(response, id).await?;
        self.get(id).await
    }

    async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        validate_id(id)?;
        let response = self
            .client
            .request(Method::DELETE, &routes::upload(id))
            .send()
            .await?;
        ApiClient::check(response, id).await?;
        Ok(())
    }
}
