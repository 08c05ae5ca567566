use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkillError {
    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Catalog TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Authentication failed ({status}): {message}")]
    AuthenticationError { status: u16, message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Resource not found: {message}")]
    ResourceNotFoundError { message: String },

    #[error("Validation error ({status}): {message}")]
    ValidationError { status: u16, message: String },

    #[error("Conflict: {message}")]
    ConflictError { message: String },

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Missing required parameter '{parameter}' for operation '{operation}'")]
    MissingParameterError { operation: String, parameter: String },

    #[error("Operation '{operation}' does not accept parameter '{parameter}'")]
    UnexpectedParameterError { operation: String, parameter: String },

    #[error("Missing credential '{field}' for service '{service}'")]
    MissingCredentialError { service: String, field: String },

    #[error("Unknown service: {service}")]
    UnknownServiceError { service: String },

    #[error("Unknown operation '{operation}' for service '{service}'")]
    UnknownOperationError { service: String, operation: String },

    #[error("Webhook signature verification failed: {message}")]
    WebhookSignatureError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Remote,
    Request,
    Configuration,
    Security,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SkillError {
    /// HTTP status code carried by the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            SkillError::AuthenticationError { status, .. }
            | SkillError::ValidationError { status, .. }
            | SkillError::ServerError { status, .. }
            | SkillError::ApiError { status, .. } => Some(*status),
            SkillError::RateLimitError { .. } => Some(429),
            SkillError::ResourceNotFoundError { .. } => Some(404),
            SkillError::ConflictError { .. } => Some(409),
            SkillError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SkillError::HttpError(_) => ErrorCategory::Network,
            SkillError::RateLimitError { .. }
            | SkillError::ServerError { .. }
            | SkillError::ApiError { .. }
            | SkillError::ResourceNotFoundError { .. }
            | SkillError::ConflictError { .. } => ErrorCategory::Remote,
            SkillError::ValidationError { .. }
            | SkillError::MissingParameterError { .. }
            | SkillError::UnexpectedParameterError { .. }
            | SkillError::UnknownServiceError { .. }
            | SkillError::UnknownOperationError { .. } => ErrorCategory::Request,
            SkillError::AuthenticationError { .. }
            | SkillError::MissingCredentialError { .. }
            | SkillError::WebhookSignatureError { .. } => ErrorCategory::Security,
            SkillError::ConfigError { .. }
            | SkillError::ConfigValidationError { .. }
            | SkillError::InvalidConfigValueError { .. }
            | SkillError::MissingConfigError { .. }
            | SkillError::TomlError(_) => ErrorCategory::Configuration,
            SkillError::CsvError(_) | SkillError::IoError(_) | SkillError::SerializationError(_) => {
                ErrorCategory::Data
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SkillError::ResourceNotFoundError { .. } | SkillError::ConflictError { .. } => {
                ErrorSeverity::Low
            }
            SkillError::RateLimitError { .. }
            | SkillError::ServerError { .. }
            | SkillError::HttpError(_) => ErrorSeverity::Medium,
            SkillError::ConfigError { .. }
            | SkillError::ConfigValidationError { .. }
            | SkillError::InvalidConfigValueError { .. }
            | SkillError::MissingConfigError { .. }
            | SkillError::TomlError(_)
            | SkillError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SkillError::RateLimitError { .. } | SkillError::ServerError { .. } => true,
            SkillError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            SkillError::RateLimitError {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
            _ => None,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            SkillError::HttpError(_) => {
                "Check network connectivity and the service base_url".to_string()
            }
            SkillError::AuthenticationError { .. } => {
                "Verify the API key or token configured for this service".to_string()
            }
            SkillError::RateLimitError {
                retry_after_seconds: Some(secs),
                ..
            } => format!("Wait {} seconds before retrying", secs),
            SkillError::RateLimitError { .. } => {
                "Slow down requests or configure a rate_limit for this service".to_string()
            }
            SkillError::ResourceNotFoundError { .. } => {
                "Check the resource ID passed to the operation".to_string()
            }
            SkillError::ValidationError { .. } => {
                "Check the parameters against the vendor API documentation".to_string()
            }
            SkillError::ConflictError { .. } => {
                "The resource already exists or was modified concurrently".to_string()
            }
            SkillError::ServerError { .. } => {
                "The remote service is failing; retry later".to_string()
            }
            SkillError::ApiError { .. } => "Inspect the response body for details".to_string(),
            SkillError::MissingParameterError { parameter, .. } => {
                format!("Pass the parameter with -p {}=<value>", parameter)
            }
            SkillError::UnexpectedParameterError { operation, .. } => {
                format!("Check the parameters declared for '{}' in the catalog", operation)
            }
            SkillError::MissingCredentialError { field, .. } => {
                format!("Set '{}' in the catalog or export the referenced environment variable", field)
            }
            SkillError::UnknownServiceError { .. } => {
                "Run `saas-skills services` to list configured services".to_string()
            }
            SkillError::UnknownOperationError { service, .. } => {
                format!("Run `saas-skills operations {}` to list operations", service)
            }
            SkillError::WebhookSignatureError { .. } => {
                "Check the webhook secret and that the raw payload is unmodified".to_string()
            }
            SkillError::ConfigError { .. }
            | SkillError::ConfigValidationError { .. }
            | SkillError::InvalidConfigValueError { .. }
            | SkillError::MissingConfigError { .. }
            | SkillError::TomlError(_) => {
                "Fix the catalog file and run `saas-skills validate`".to_string()
            }
            SkillError::CsvError(_) | SkillError::SerializationError(_) => {
                "The response could not be converted; try --format json".to_string()
            }
            SkillError::IoError(_) => "Check file paths and permissions".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach the service: {}", self),
            ErrorCategory::Remote => format!("The service rejected the request: {}", self),
            ErrorCategory::Request => format!("Invalid request: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Security => format!("Access denied: {}", self),
            ErrorCategory::Data => format!("Data handling failed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, SkillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_for_mapped_errors() {
        let err = SkillError::ResourceNotFoundError {
            message: "no contact".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.severity(), ErrorSeverity::Low);

        let err = SkillError::RateLimitError {
            message: "slow down".to_string(),
            retry_after_seconds: Some(7),
        };
        assert_eq!(err.status(), Some(429));
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(7));
        assert!(err.recovery_suggestion().contains("7 seconds"));
    }

    #[test]
    fn test_client_side_errors_are_not_retryable() {
        let err = SkillError::ValidationError {
            status: 422,
            message: "email invalid".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Request);

        let err = SkillError::MissingCredentialError {
            service: "brevo".to_string(),
            field: "auth.key".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Security);
        assert!(err.user_friendly_message().starts_with("Access denied"));
    }
}
