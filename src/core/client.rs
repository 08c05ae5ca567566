use crate::config::catalog::{BodyKind, OperationDefinition, ServiceDefinition};
use crate::core::auth::AuthScheme;
use crate::core::payload::{self, PreparedCall};
use crate::core::rate_limit::RateLimiter;
use crate::core::retry::RetryPolicy;
use crate::core::status::StatusMap;
use crate::core::webhook::WebhookVerifier;
use crate::domain::model::{ApiResponse, HttpMethod, HttpRequest, Record, RequestBody};
use crate::domain::ports::Transport;
use crate::utils::error::{Result, SkillError};
use crate::utils::validation::{validate_credential, validate_url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Generic client for one catalog service: every operation is a passthrough
/// call built from the service definition.
pub struct ServiceClient {
    definition: ServiceDefinition,
    transport: Arc<dyn Transport>,
    auth: AuthScheme,
    limiter: RateLimiter,
    retry: RetryPolicy,
    status_map: StatusMap,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("service", &self.definition.name)
            .field("auth", &self.auth.name())
            .field("retry", &self.retry)
            .finish()
    }
}

impl ServiceClient {
    pub fn new(definition: ServiceDefinition, transport: Arc<dyn Transport>) -> Result<Self> {
        validate_credential(&definition.name, "base_url", &definition.base_url)?;
        validate_url(&format!("services.{}.base_url", definition.name), &definition.base_url)?;

        let auth = AuthScheme::from_config(&definition.name, definition.auth.as_ref())?;
        let limiter = RateLimiter::from_config(definition.rate_limit.as_ref());
        let retry = RetryPolicy::from_config(definition.retry.as_ref());
        let status_map = StatusMap::from_config(definition.status_map.as_ref());

        tracing::debug!(
            "🔧 {}: client ready (auth: {}, max attempts: {})",
            definition.name,
            auth.name(),
            retry.max_attempts
        );

        Ok(Self {
            definition,
            transport,
            auth,
            limiter,
            retry,
            status_map,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ServiceDefinition {
        &self.definition
    }

    /// Runs a catalog operation and returns the raw successful response.
    pub async fn call(&self, operation: &str, params: &Map<String, Value>) -> Result<ApiResponse> {
        let op = self.definition.operation(operation)?;
        let prepared = payload::prepare(op, params)?;
        let request = self.build_request(op, prepared);

        tracing::info!("📡 {}: {} ({} {})", self.name(), op.name, op.method, op.path);
        self.execute(request).await
    }

    /// Runs an operation and reshapes the body with its `response_key` and `field_mapping`.
    pub async fn call_records(
        &self,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<Vec<Record>> {
        let response = self.call(operation, params).await?;
        let op = self.definition.operation(operation)?;
        let records = response.records(
            op.response_key.as_deref(),
            op.field_mapping.as_ref(),
            op.max_records,
        );
        tracing::info!("📥 {}: {} returned {} records", self.name(), operation, records.len());
        Ok(records)
    }

    /// Runs an operation and decodes the (keyed) body into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<T> {
        let response = self.call(operation, params).await?;
        let op = self.definition.operation(operation)?;
        response.decode(op.response_key.as_deref())
    }

    /// Calls an endpoint the catalog does not describe. The payload goes in
    /// the query for GET/DELETE and as JSON otherwise.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        payload: Option<Map<String, Value>>,
    ) -> Result<ApiResponse> {
        let mut request = HttpRequest::new(method, self.url(path));
        self.apply_service_headers(&mut request);
        if let Some(payload) = payload {
            if method.has_body() {
                request.body = Some(RequestBody::Json(Value::Object(payload)));
            } else {
                request.query = payload::to_pairs(&payload);
            }
        }
        tracing::info!("📡 {}: {} {}", self.name(), method, path);
        self.execute(request).await
    }

    pub fn webhook_verifier(&self) -> Result<WebhookVerifier> {
        let config = self
            .definition
            .webhook
            .as_ref()
            .ok_or_else(|| SkillError::MissingConfigError {
                field: format!("services.{}.webhook", self.name()),
            })?;
        WebhookVerifier::from_config(self.name(), config)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.definition.base_url.trim_end_matches('/'), path)
    }

    fn apply_service_headers(&self, request: &mut HttpRequest) {
        if let Some(headers) = &self.definition.headers {
            for (key, value) in headers {
                request.headers.push((key.clone(), value.clone()));
            }
        }
        if request.header("accept").is_none() {
            request
                .headers
                .push(("Accept".to_string(), "application/json".to_string()));
        }
        request.timeout = Some(self.definition.timeout());
    }

    fn build_request(&self, op: &OperationDefinition, prepared: PreparedCall) -> HttpRequest {
        let PreparedCall { path, payload } = prepared;
        let mut request = HttpRequest::new(op.method, self.url(&path));
        self.apply_service_headers(&mut request);

        match op.body_kind() {
            BodyKind::Query => request.query = payload::to_pairs(&payload),
            BodyKind::Form => request.body = Some(RequestBody::Form(payload::to_pairs(&payload))),
            BodyKind::Json => {
                let body = match &op.wrap_body {
                    Some(key) => {
                        let mut wrapped = Map::new();
                        wrapped.insert(key.clone(), Value::Object(payload));
                        Value::Object(wrapped)
                    }
                    None => Value::Object(payload),
                };
                request.body = Some(RequestBody::Json(body));
            }
        }

        request
    }

    async fn execute(&self, template: HttpRequest) -> Result<ApiResponse> {
        let mut attempt = 0;
        let mut refreshed_auth = false;

        loop {
            attempt += 1;
            // 等待限流器放行
            self.limiter.acquire().await;

            let mut request = template.clone();
            self.auth.apply(&mut request, self.transport.as_ref()).await?;

            let error = match self.transport.send(request).await {
                Ok(response) if response.is_success() => return Ok(response.into()),
                Ok(response) => self.status_map.to_error(&response),
                Err(e) => e,
            };

            // OAuth token 被拒時重新取得一次
            if matches!(error, SkillError::AuthenticationError { status: 401, .. })
                && matches!(self.auth, AuthScheme::OAuth2ClientCredentials(_))
                && !refreshed_auth
            {
                tracing::warn!("🔑 {}: token rejected, refreshing", self.name());
                self.auth.invalidate().await;
                refreshed_auth = true;
                continue;
            }

            // 判斷是否重試
            match self.retry.delay_after(attempt, &error) {
                Some(delay) => {
                    tracing::warn!(
                        "🔁 {}: attempt {}/{} failed ({}), retrying in {:?}",
                        self.name(),
                        attempt,
                        self.retry.max_attempts,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!("❌ {}: {}", self.name(), error);
                    return Err(error);
                }
            }
        }
    }
}
