use crate::config::catalog::AuthConfig;
use crate::core::status::error_message;
use crate::domain::model::{HttpMethod, HttpRequest, RequestBody};
use crate::domain::ports::Transport;
use crate::utils::error::{Result, SkillError};
use crate::utils::logger::redact;
use crate::utils::validation::validate_credential;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

/// Seconds shaved off `expires_in` so a token is refreshed before the vendor rejects it.
const TOKEN_EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now < at).unwrap_or(true)
    }
}

#[derive(Debug)]
pub struct ClientCredentials {
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: Option<String>,
    cached: Mutex<Option<CachedToken>>,
}

/// How a service authenticates outgoing requests.
#[derive(Debug)]
pub enum AuthScheme {
    None,
    Bearer { token: String },
    Basic { username: String, password: String },
    ApiKeyHeader { header: String, key: String, prefix: Option<String> },
    ApiKeyQuery { param: String, key: String },
    OAuth2ClientCredentials(ClientCredentials),
}

impl AuthScheme {
    /// Builds the scheme, failing when a credential is empty or an unresolved `${VAR}`.
    pub fn from_config(service: &str, config: Option<&AuthConfig>) -> Result<Self> {
        let scheme = match config {
            None | Some(AuthConfig::None) => AuthScheme::None,
            Some(AuthConfig::Bearer { token }) => {
                validate_credential(service, "auth.token", token)?;
                AuthScheme::Bearer {
                    token: token.clone(),
                }
            }
            Some(AuthConfig::Basic { username, password }) => {
                validate_credential(service, "auth.username", username)?;
                AuthScheme::Basic {
                    username: username.clone(),
                    password: password.clone(),
                }
            }
            Some(AuthConfig::ApiKeyHeader { header, key, prefix }) => {
                validate_credential(service, "auth.key", key)?;
                AuthScheme::ApiKeyHeader {
                    header: header.clone(),
                    key: key.clone(),
                    prefix: prefix.clone(),
                }
            }
            Some(AuthConfig::ApiKeyQuery { param, key }) => {
                validate_credential(service, "auth.key", key)?;
                AuthScheme::ApiKeyQuery {
                    param: param.clone(),
                    key: key.clone(),
                }
            }
            Some(AuthConfig::OAuth2ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scope,
            }) => {
                validate_credential(service, "auth.client_id", client_id)?;
                validate_credential(service, "auth.client_secret", client_secret)?;
                AuthScheme::OAuth2ClientCredentials(ClientCredentials {
                    token_url: token_url.clone(),
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    scope: scope.clone(),
                    cached: Mutex::new(None),
                })
            }
        };
        Ok(scheme)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthScheme::None => "none",
            AuthScheme::Bearer { .. } => "bearer",
            AuthScheme::Basic { .. } => "basic",
            AuthScheme::ApiKeyHeader { .. } => "api_key_header",
            AuthScheme::ApiKeyQuery { .. } => "api_key_query",
            AuthScheme::OAuth2ClientCredentials(_) => "oauth2_client_credentials",
        }
    }

    /// Attaches credentials to the request, fetching an OAuth token if needed.
    pub async fn apply(&self, request: &mut HttpRequest, transport: &dyn Transport) -> Result<()> {
        match self {
            AuthScheme::None => {}
            AuthScheme::Bearer { token } => {
                request
                    .headers
                    .push(("Authorization".to_string(), format!("Bearer {}", token)));
            }
            AuthScheme::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{}:{}", username, password));
                request
                    .headers
                    .push(("Authorization".to_string(), format!("Basic {}", encoded)));
            }
            AuthScheme::ApiKeyHeader { header, key, prefix } => {
                let value = match prefix {
                    Some(prefix) => format!("{}{}", prefix, key),
                    None => key.clone(),
                };
                request.headers.push((header.clone(), value));
            }
            AuthScheme::ApiKeyQuery { param, key } => {
                request.query.push((param.clone(), key.clone()));
            }
            AuthScheme::OAuth2ClientCredentials(credentials) => {
                let token = credentials.access_token(transport).await?;
                request
                    .headers
                    .push(("Authorization".to_string(), format!("Bearer {}", token)));
            }
        }
        Ok(())
    }

    /// Drops a cached OAuth token so the next request fetches a new one.
    pub async fn invalidate(&self) {
        if let AuthScheme::OAuth2ClientCredentials(credentials) = self {
            *credentials.cached.lock().await = None;
        }
    }
}

impl ClientCredentials {
    async fn access_token(&self, transport: &dyn Transport) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.access_token.clone());
            }
            tracing::debug!("🔑 OAuth token expired, refreshing");
        }

        let token = self.fetch_token(transport).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn fetch_token(&self, transport: &dyn Transport) -> Result<CachedToken> {
        let mut form = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), self.client_id.clone()),
            ("client_secret".to_string(), self.client_secret.clone()),
        ];
        if let Some(scope) = &self.scope {
            form.push(("scope".to_string(), scope.clone()));
        }

        let mut request = HttpRequest::new(HttpMethod::Post, self.token_url.clone());
        request.body = Some(RequestBody::Form(form));

        tracing::debug!(
            "🔑 Requesting client-credentials token from {} (client {})",
            self.token_url,
            redact(&self.client_id)
        );
        let response = transport.send(request).await?;

        if !response.is_success() {
            return Err(SkillError::AuthenticationError {
                status: response.status,
                message: format!("token request failed: {}", error_message(&response.body)),
            });
        }

        let access_token = response
            .body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| SkillError::AuthenticationError {
                status: response.status,
                message: "token response has no access_token".to_string(),
            })?
            .to_string();

        // 部分供應商以字串回傳 expires_in
        let expires_in = response.body.get("expires_in").and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });

        // 超出範圍的 expires_in 視為無到期時間
        let expires_at = expires_in.and_then(|secs| {
            Duration::try_seconds(secs.saturating_sub(TOKEN_EXPIRY_SKEW_SECONDS).max(0))
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        });

        Ok(CachedToken {
            access_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::HttpResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    struct TokenTransport {
        requests: StdMutex<Vec<HttpRequest>>,
        expires_in: Value,
    }

    #[async_trait]
    impl Transport for TokenTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse::json(
                200,
                json!({"access_token": "tok-1", "token_type": "Bearer", "expires_in": self.expires_in}),
            ))
        }
    }

    fn oauth_config() -> AuthConfig {
        AuthConfig::OAuth2ClientCredentials {
            token_url: "https://login.example.com/oauth2/token".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            scope: Some("https://graph.example.com/.default".to_string()),
        }
    }

    #[tokio::test]
    async fn test_header_schemes() {
        let transport = TokenTransport {
            requests: StdMutex::new(Vec::new()),
            expires_in: json!(3600),
        };

        let mut request = HttpRequest::new(HttpMethod::Get, "https://api.example.com");
        AuthScheme::from_config(
            "svc",
            Some(&AuthConfig::Basic {
                username: "user".to_string(),
                password: "pass".to_string(),
            }),
        )
        .unwrap()
        .apply(&mut request, &transport)
        .await
        .unwrap();
        assert_eq!(request.header("authorization"), Some("Basic dXNlcjpwYXNz"));

        let mut request = HttpRequest::new(HttpMethod::Get, "https://api.example.com");
        AuthScheme::from_config(
            "svc",
            Some(&AuthConfig::ApiKeyHeader {
                header: "Authorization".to_string(),
                key: "abc123".to_string(),
                prefix: Some("Token token=".to_string()),
            }),
        )
        .unwrap()
        .apply(&mut request, &transport)
        .await
        .unwrap();
        assert_eq!(request.header("Authorization"), Some("Token token=abc123"));

        let mut request = HttpRequest::new(HttpMethod::Get, "https://api.example.com");
        AuthScheme::from_config(
            "svc",
            Some(&AuthConfig::ApiKeyQuery {
                param: "key".to_string(),
                key: "gem-key".to_string(),
            }),
        )
        .unwrap()
        .apply(&mut request, &transport)
        .await
        .unwrap();
        assert_eq!(request.query, vec![("key".to_string(), "gem-key".to_string())]);
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unresolved_credentials_are_rejected() {
        let result = AuthScheme::from_config(
            "brevo",
            Some(&AuthConfig::ApiKeyHeader {
                header: "api-key".to_string(),
                key: "${BREVO_API_KEY}".to_string(),
                prefix: None,
            }),
        );
        assert!(matches!(
            result,
            Err(SkillError::MissingCredentialError { .. })
        ));
    }

    #[tokio::test]
    async fn test_client_credentials_token_is_cached() {
        let transport = TokenTransport {
            requests: StdMutex::new(Vec::new()),
            expires_in: json!("3600"),
        };
        let scheme = AuthScheme::from_config("entra", Some(&oauth_config())).unwrap();

        for _ in 0..3 {
            let mut request = HttpRequest::new(HttpMethod::Get, "https://graph.example.com/v1.0/users");
            scheme.apply(&mut request, &transport).await.unwrap();
            assert_eq!(request.header("authorization"), Some("Bearer tok-1"));
        }

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        match &requests[0].body {
            Some(RequestBody::Form(form)) => {
                assert!(form.contains(&("grant_type".to_string(), "client_credentials".to_string())));
                assert!(form.iter().any(|(k, _)| k == "scope"));
            }
            other => panic!("expected form body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_short_lived_token_is_refetched() {
        // expires_in below the skew means the token is stale immediately
        let transport = TokenTransport {
            requests: StdMutex::new(Vec::new()),
            expires_in: json!(30),
        };
        let scheme = AuthScheme::from_config("entra", Some(&oauth_config())).unwrap();

        for _ in 0..2 {
            let mut request = HttpRequest::new(HttpMethod::Get, "https://graph.example.com");
            scheme.apply(&mut request, &transport).await.unwrap();
        }
        assert_eq!(transport.requests.lock().unwrap().len(), 2);

        scheme.invalidate().await;
    }

    #[tokio::test]
    async fn test_out_of_range_expiry_keeps_token_without_deadline() {
        for expires_in in [json!(i64::MAX), json!(i64::MAX.to_string())] {
            let transport = TokenTransport {
                requests: StdMutex::new(Vec::new()),
                expires_in,
            };
            let scheme = AuthScheme::from_config("entra", Some(&oauth_config())).unwrap();

            for _ in 0..2 {
                let mut request = HttpRequest::new(HttpMethod::Get, "https://graph.example.com");
                scheme.apply(&mut request, &transport).await.unwrap();
            }
            assert_eq!(transport.requests.lock().unwrap().len(), 1);
        }
    }
}
