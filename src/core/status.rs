use crate::domain::model::HttpResponse;
use crate::utils::error::SkillError;
use serde_json::Value;
use std::collections::HashMap;

/// Error kinds a status code can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    RateLimited,
    NotFound,
    Validation,
    Conflict,
    Server,
    Api,
}

impl ErrorKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "authentication" => Some(ErrorKind::Authentication),
            "rate_limited" => Some(ErrorKind::RateLimited),
            "not_found" => Some(ErrorKind::NotFound),
            "validation" => Some(ErrorKind::Validation),
            "conflict" => Some(ErrorKind::Conflict),
            "server" => Some(ErrorKind::Server),
            "api" => Some(ErrorKind::Api),
            _ => None,
        }
    }

    pub fn for_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorKind::Validation,
            401 | 403 => ErrorKind::Authentication,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Api,
        }
    }
}

/// Status-code → error table with per-service overrides.
#[derive(Debug, Clone, Default)]
pub struct StatusMap {
    overrides: HashMap<u16, ErrorKind>,
}

impl StatusMap {
    /// Entries that fail to parse are skipped; catalog validation reports them.
    pub fn from_config(config: Option<&HashMap<String, String>>) -> Self {
        let overrides = config
            .map(|map| {
                map.iter()
                    .filter_map(|(code, kind)| Some((code.parse().ok()?, ErrorKind::parse(kind)?)))
                    .collect()
            })
            .unwrap_or_default();
        Self { overrides }
    }

    pub fn kind(&self, status: u16) -> ErrorKind {
        self.overrides
            .get(&status)
            .copied()
            .unwrap_or_else(|| ErrorKind::for_status(status))
    }

    pub fn to_error(&self, response: &HttpResponse) -> SkillError {
        let status = response.status;
        let message = error_message(&response.body);

        match self.kind(status) {
            ErrorKind::Authentication => SkillError::AuthenticationError { status, message },
            ErrorKind::RateLimited => SkillError::RateLimitError {
                message,
                retry_after_seconds: response
                    .header("retry-after")
                    .and_then(|v| v.trim().parse().ok()),
            },
            ErrorKind::NotFound => SkillError::ResourceNotFoundError { message },
            ErrorKind::Validation => SkillError::ValidationError { status, message },
            ErrorKind::Conflict => SkillError::ConflictError { message },
            ErrorKind::Server => SkillError::ServerError { status, message },
            ErrorKind::Api => SkillError::ApiError { status, message },
        }
    }
}

/// Pulls a human-readable message out of the error shapes vendors commonly return.
pub fn error_message(body: &Value) -> String {
    let candidates = [
        body.get("message"),
        body.get("error_description"),
        body.get("error").and_then(|e| e.get("message")),
        body.get("error"),
        body.get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("message").or_else(|| e.get("detail")).or(Some(e))),
        body.get("detail"),
        body.get("title"),
    ];

    for candidate in candidates.into_iter().flatten() {
        match candidate {
            Value::String(s) if !s.is_empty() => return s.clone(),
            Value::Null | Value::Object(_) | Value::Array(_) => continue,
            other => return other.to_string(),
        }
    }

    match body {
        Value::Null => "empty response body".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: Value) -> HttpResponse {
        HttpResponse::json(status, body)
    }

    #[test]
    fn test_documented_status_codes_map_to_error_types() {
        let map = StatusMap::default();
        let body = json!({"message": "nope"});

        assert!(matches!(
            map.to_error(&response(401, body.clone())),
            SkillError::AuthenticationError { status: 401, .. }
        ));
        assert!(matches!(
            map.to_error(&response(403, body.clone())),
            SkillError::AuthenticationError { status: 403, .. }
        ));
        assert!(matches!(
            map.to_error(&response(404, body.clone())),
            SkillError::ResourceNotFoundError { .. }
        ));
        assert!(matches!(
            map.to_error(&response(409, body.clone())),
            SkillError::ConflictError { .. }
        ));
        assert!(matches!(
            map.to_error(&response(422, body.clone())),
            SkillError::ValidationError { status: 422, .. }
        ));
        assert!(matches!(
            map.to_error(&response(429, body.clone())),
            SkillError::RateLimitError { .. }
        ));
        assert!(matches!(
            map.to_error(&response(503, body.clone())),
            SkillError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            map.to_error(&response(418, body)),
            SkillError::ApiError { status: 418, .. }
        ));
    }

    #[test]
    fn test_retry_after_header_is_captured() {
        let mut resp = response(429, json!({"error": "Too many requests"}));
        resp.headers.insert("retry-after".to_string(), "12".to_string());

        let err = StatusMap::default().to_error(&resp);
        assert_eq!(err.retry_after(), Some(12));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn test_service_overrides_take_precedence() {
        let mut config = HashMap::new();
        config.insert("400".to_string(), "not_found".to_string());
        config.insert("abc".to_string(), "server".to_string());
        let map = StatusMap::from_config(Some(&config));

        assert_eq!(map.kind(400), ErrorKind::NotFound);
        assert_eq!(map.kind(422), ErrorKind::Validation);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(&json!({"message": "bad email"})), "bad email");
        assert_eq!(
            error_message(&json!({"error": {"message": "invalid token", "code": 190}})),
            "invalid token"
        );
        assert_eq!(
            error_message(&json!({"error": "invalid_client", "error_description": "Bad secret"})),
            "Bad secret"
        );
        assert_eq!(
            error_message(&json!({"errors": [{"message": "email is taken"}]})),
            "email is taken"
        );
        assert_eq!(error_message(&json!({"detail": "Not found."})), "Not found.");
        assert_eq!(error_message(&Value::Null), "empty response body");
        assert_eq!(error_message(&json!("plain text")), "plain text");
    }
}
