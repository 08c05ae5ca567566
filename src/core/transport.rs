use crate::domain::model::{HttpMethod, HttpRequest, HttpResponse, RequestBody};
use crate::domain::ports::Transport;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;

/// Production transport backed by one pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("saas-skills/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        match &request.body {
            Some(RequestBody::Json(value)) => builder = builder.json(value),
            Some(RequestBody::Form(pairs)) => builder = builder.form(pairs),
            None => {}
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!("📡 {} {}", request.method, request.url);
        let response = builder.send().await?;
        let status = response.status().as_u16();
        tracing::debug!("📡 Response status: {}", status);

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
