//! `api/uploader`: the flow.js chunk endpoint.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Body, Method, StatusCode,
    multipart::{Form, Part},
};

use crate::{
    api::client::ApiClient,
    errors::ChunkSendError,
    models::chunk::ChunkHeader,
    routes::routes,
    services::transmitter::ChunkTransport,
};

const FILE_PART: &str = "file";

/// Chunk transport that speaks HTTP multipart to the uploader endpoint.
#[derive(Clone, Debug)]
pub struct HttpChunkTransport {
    client: ApiClient,
}

impl HttpChunkTransport {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn form(header: &ChunkHeader, data: Bytes) -> Result<Form, ChunkSendError> {
        let len = data.len() as u64;
        let part = Part::stream_with_length(Body::from(data), len)
            .file_name(header.flow_filename.clone())
            .mime_str("application/octet-stream")
            .map_err(|err| ChunkSendError::Permanent(err.to_string()))?;

        let form = header
            .form_fields()
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));
        Ok(form.part(FILE_PART, part))
    }
}

#[async_trait]
impl ChunkTransport for HttpChunkTransport {
    async fn send(&self, header: &ChunkHeader, data: Bytes) -> Result<(), ChunkSendError> {
        let response = self
            .client
            .request_with_csrf_query(Method::POST, routes::UPLOADER)
            .multipart(Self::form(header, data)?)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ChunkSendError::from_status(status, &body))
    }

    async fn probe(&self, header: &ChunkHeader) -> Result<bool, ChunkSendError> {
        let response = self
            .client
            .request_with_csrf_query(Method::GET, routes::UPLOADER)
            .query(header)
            .send()
            .await?;

        // 200 means stored. The server says "not yet" with 502, so that one
        // is an answer rather than a failure.
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::BAD_GATEWAY => Ok(false),
            status if status.is_server_error() => Err(ChunkSendError::from_status(status, "")),
            _ => Ok(false),
        }
    }
}
