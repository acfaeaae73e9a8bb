//! Shared HTTP plumbing for every API call.

use reqwest::{
    Method, RequestBuilder, Response,
    header::{HeaderMap, HeaderValue},
};
use std::time::Duration;

use crate::{errors::GatewayError, routes::routes};

/// Base URL, CSRF credential and a pooled `reqwest` client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    csrf_token: Option<String>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        csrf_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = csrf_token.as_deref() {
            let value =
                HeaderValue::from_str(token).map_err(|_| GatewayError::InvalidCsrfToken)?;
            headers.insert(routes::CSRF_HEADER, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Like [`request`](Self::request), but with the CSRF token also in the
    /// query string.
    pub fn request_with_csrf_query(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.request(method, path);
        match self.csrf_token.as_deref() {
            Some(token) => builder.query(&[(routes::CSRF_QUERY_PARAM, token)]),
            None => builder,
        }
    }

    /// Pass a success response through; turn anything else into an error.
    pub async fn check(response: Response, what: &str) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::from_status(status, what, body))
    }

    pub async fn get_json<T>(&self, path: &str, what: &str) -> Result<T, GatewayError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.request(Method::GET, path).send().await?;
        Ok(Self::check(response, what).await?.json::<T>().await?)
    }
}
