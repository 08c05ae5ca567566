use crate::utils::error::{Result, SkillError};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(SkillError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(SkillError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(SkillError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(SkillError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SkillError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Fails on the first name that appears twice.
pub fn validate_unique_names<'a, I>(field_name: &str, names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(SkillError::ConfigValidationError {
                field: field_name.to_string(),
                message: format!("Duplicate name '{}'", name),
            });
        }
    }
    Ok(())
}

/// A credential is usable when it is non-empty and no `${VAR}` was left unresolved.
pub fn validate_credential(service: &str, field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() || value.contains("${") {
        return Err(SkillError::MissingCredentialError {
            service: service.to_string(),
            field: field_name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("base_url", "https://api.brevo.com/v3").is_ok());
        assert!(validate_url("base_url", "http://localhost:8080").is_ok());
        assert!(validate_url("base_url", "").is_err());
        assert!(validate_url("base_url", "invalid-url").is_err());
        assert!(validate_url("base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("retry.max_attempts", 3, 1).is_ok());
        assert!(validate_positive_number("retry.max_attempts", 0, 1).is_err());
    }

    #[test]
    fn test_validate_unique_names() {
        assert!(validate_unique_names("services", ["a", "b"]).is_ok());
        assert!(validate_unique_names("services", ["a", "b", "a"]).is_err());
    }

    #[test]
    fn test_validate_credential_rejects_unresolved_env_var() {
        assert!(validate_credential("brevo", "auth.key", "xkeysib-123").is_ok());
        assert!(validate_credential("brevo", "auth.key", "${BREVO_API_KEY}").is_err());
        assert!(validate_credential("brevo", "auth.key", "  ").is_err());
    }
}
