//! Backend HTTP client with bearer auth and single retry on 401.

use crate::services::token::ServiceTokenCache;
use anyhow::Result;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use service_core::observability::inject_trace_context;
use std::sync::Arc;

/// A backend call captured as replayable parts, so the 401 retry can rebuild
/// the request with a fresh token.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    pub url: String,
    pub content_type: Option<&'static str>,
    pub body: Option<Vec<u8>>,
    pub headers: HeaderMap,
}

impl BackendRequest {
    pub fn new(method: Method, url: String) -> Self {
        Self {
            method,
            url,
            content_type: None,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_json_body(mut self, content_type: &'static str, body: Vec<u8>) -> Self {
        self.content_type = Some(content_type);
        self.body = Some(body);
        self
    }
}

pub struct BackendClient {
    client: Client,
    tokens: Arc<ServiceTokenCache>,
}

impl BackendClient {
    pub fn new(client: Client, tokens: Arc<ServiceTokenCache>) -> Self {
        Self { client, tokens }
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn tokens(&self) -> &ServiceTokenCache {
        &self.tokens
    }

    /// Send a request with the cached service token, re-issuing the token and
    /// retrying exactly once when the backend answers 401. Any other status is
    /// returned from the first attempt; the second response is returned as-is
    /// even when it also fails. Transport errors are never retried.
    pub async fn send_with_retry(&self, request: &BackendRequest) -> Result<Response> {
        let token = self.tokens.current().await?;
        let response = self.execute(request, &token).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!(url = %request.url, "Backend rejected service token, re-issuing once");
        let fresh = self.tokens.refresh().await?;
        let retried = self.execute(request, &fresh).await?;
        Ok(retried)
    }

    async fn execute(&self, request: &BackendRequest, token: &str) -> Result<Response> {
        let mut headers = request.headers.clone();
        inject_trace_context(&mut headers);

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(headers)
            .bearer_auth(token);

        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!("Failed to send {} request to {}: {}", request.method, request.url, e);
            anyhow::anyhow!("HTTP request failed: {}", e)
        })?;

        Ok(response)
    }
}
