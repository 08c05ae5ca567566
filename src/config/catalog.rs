use crate::domain::model::HttpMethod;
use crate::utils::error::{Result, SkillError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

const BUILTIN_CATALOG: &str = include_str!("../../catalog/default.toml");

/// Declarative description of every service the skills can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub catalog: CatalogInfo,
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogInfo {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    pub description: Option<String>,
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
    pub auth: Option<AuthConfig>,
    pub rate_limit: Option<RateLimitConfig>,
    pub retry: Option<RetryConfig>,
    /// Status code → error kind overrides, e.g. `"400" = "not_found"`.
    pub status_map: Option<HashMap<String, String>>,
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub operations: Vec<OperationDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        #[serde(default)]
        password: String,
    },
    ApiKeyHeader {
        header: String,
        key: String,
        prefix: Option<String>,
    },
    ApiKeyQuery {
        param: String,
        key: String,
    },
    #[serde(rename = "oauth2_client_credentials")]
    OAuth2ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: String,
        scope: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RateLimitConfig {
    MinInterval { interval_ms: u64 },
    SlidingWindow { max_requests: u32, window_seconds: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureEncoding {
    #[default]
    Hex,
    Base64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub secret: String,
    pub signature_header: Option<String>,
    pub encoding: Option<SignatureEncoding>,
    /// Literal prefix in front of the digest, e.g. `sha256=`.
    pub prefix: Option<String>,
    pub timestamp_header: Option<String>,
    pub tolerance_seconds: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    Json,
    Form,
    Query,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDefinition {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    pub body: Option<BodyKind>,
    /// Nest the payload under this key, e.g. `{"contact": {...}}`.
    pub wrap_body: Option<String>,
    pub response_key: Option<String>,
    pub field_mapping: Option<HashMap<String, String>>,
    pub max_records: Option<usize>,
    pub defaults: Option<serde_json::Map<String, serde_json::Value>>,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("static regex"))
}

fn env_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"))
}

impl OperationDefinition {
    /// Names of the `{param}` placeholders in the path template, each listed once.
    pub fn path_params(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        placeholder_regex()
            .captures_iter(&self.path)
            .map(|caps| caps[1].to_string())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    pub fn body_kind(&self) -> BodyKind {
        self.body.unwrap_or(if self.method.has_body() {
            BodyKind::Json
        } else {
            BodyKind::Query
        })
    }

    pub fn accepts(&self, param: &str) -> bool {
        self.required.iter().any(|p| p == param) || self.optional.iter().any(|p| p == param)
    }
}

impl ServiceDefinition {
    pub fn operation(&self, name: &str) -> Result<&OperationDefinition> {
        self.operations
            .iter()
            .find(|op| op.name == name)
            .ok_or_else(|| SkillError::UnknownOperationError {
                service: self.name.clone(),
                operation: name.to_string(),
            })
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds.unwrap_or(30))
    }

    fn validate_service(&self) -> Result<()> {
        validation::validate_non_empty_string("services.name", &self.name)?;
        // 租戶主機 (例如 `https://${KOMMO_SUBDOMAIN}.kommo.com`) 在建立 client 時才檢查
        if !self.base_url.contains("${") {
            validation::validate_url(&format!("services.{}.base_url", self.name), &self.base_url)?;
        }

        if let Some(timeout) = self.timeout_seconds {
            validation::validate_positive_number(
                &format!("services.{}.timeout_seconds", self.name),
                timeout,
                1,
            )?;
        }

        match &self.rate_limit {
            Some(RateLimitConfig::MinInterval { interval_ms }) => {
                validation::validate_positive_number(
                    &format!("services.{}.rate_limit.interval_ms", self.name),
                    *interval_ms,
                    1,
                )?;
            }
            Some(RateLimitConfig::SlidingWindow {
                max_requests,
                window_seconds,
            }) => {
                validation::validate_positive_number(
                    &format!("services.{}.rate_limit.max_requests", self.name),
                    u64::from(*max_requests),
                    1,
                )?;
                validation::validate_positive_number(
                    &format!("services.{}.rate_limit.window_seconds", self.name),
                    *window_seconds,
                    1,
                )?;
            }
            None => {}
        }

        if let Some(retry) = &self.retry {
            if let Some(attempts) = retry.max_attempts {
                validation::validate_positive_number(
                    &format!("services.{}.retry.max_attempts", self.name),
                    u64::from(attempts),
                    1,
                )?;
            }
        }

        if let Some(AuthConfig::OAuth2ClientCredentials { token_url, .. }) = &self.auth {
            validation::validate_url(&format!("services.{}.auth.token_url", self.name), token_url)?;
        }

        if let Some(status_map) = &self.status_map {
            for (code, kind) in status_map {
                let valid_code = code.parse::<u16>().map(|c| (100..600).contains(&c)).unwrap_or(false);
                if !valid_code {
                    return Err(SkillError::InvalidConfigValueError {
                        field: format!("services.{}.status_map", self.name),
                        value: code.clone(),
                        reason: "Status codes must be numbers between 100 and 599".to_string(),
                    });
                }
                crate::core::status::ErrorKind::parse(kind).ok_or_else(|| {
                    SkillError::InvalidConfigValueError {
                        field: format!("services.{}.status_map.{}", self.name, code),
                        value: kind.clone(),
                        reason: "Unknown error kind".to_string(),
                    }
                })?;
            }
        }

        validation::validate_unique_names(
            &format!("services.{}.operations", self.name),
            self.operations.iter().map(|op| op.name.as_str()),
        )?;

        for op in &self.operations {
            self.validate_operation(op)?;
        }

        Ok(())
    }

    fn validate_operation(&self, op: &OperationDefinition) -> Result<()> {
        let field = format!("services.{}.operations.{}", self.name, op.name);
        validation::validate_non_empty_string(&field, &op.name)?;

        if !op.path.starts_with('/') && !op.path.is_empty() {
            return Err(SkillError::InvalidConfigValueError {
                field: format!("{}.path", field),
                value: op.path.clone(),
                reason: "Paths must start with '/'".to_string(),
            });
        }

        let required: HashSet<&str> = op.required.iter().map(String::as_str).collect();
        for param in op.path_params() {
            if !required.contains(param.as_str()) {
                return Err(SkillError::ConfigValidationError {
                    field: format!("{}.path", field),
                    message: format!("Path placeholder '{{{}}}' must be listed in 'required'", param),
                });
            }
        }

        if op.body == Some(BodyKind::Form) && !op.method.has_body() {
            return Err(SkillError::ConfigValidationError {
                field: format!("{}.body", field),
                message: format!("{} requests cannot carry a form body", op.method),
            });
        }

        Ok(())
    }
}

impl Catalog {
    /// 從 TOML 檔案載入服務目錄
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SkillError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 解析 TOML 後再替換字串值中的 `${VAR}`
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(content)?;
        table.iter_mut().for_each(|(_, v)| Self::substitute_env_vars(v));

        Ok(toml::Value::Table(table).try_into()?)
    }

    /// 編譯進執行檔的內建目錄
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    // 未設定的變數保留 `${VAR}`，讓憑證檢查能指出變數名稱
    fn substitute_env_vars(value: &mut toml::Value) {
        match value {
            toml::Value::String(s) if s.contains("${") => {
                *s = env_var_regex()
                    .replace_all(s.as_str(), |caps: &regex::Captures| {
                        let var_name = &caps[1];
                        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
                    })
                    .into_owned();
            }
            toml::Value::Array(items) => items.iter_mut().for_each(Self::substitute_env_vars),
            toml::Value::Table(table) => table.iter_mut().for_each(|(_, v)| Self::substitute_env_vars(v)),
            _ => {}
        }
    }

    pub fn validate_catalog(&self) -> Result<()> {
        validation::validate_non_empty_string("catalog.name", &self.catalog.name)?;
        validation::validate_unique_names(
            "services",
            self.services.iter().map(|s| s.name.as_str()),
        )?;

        for service in &self.services {
            service.validate_service()?;
        }

        Ok(())
    }

    pub fn service(&self, name: &str) -> Result<&ServiceDefinition> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SkillError::UnknownServiceError {
                service: name.to_string(),
            })
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    /// 以 `other` 覆寫目錄，同名服務整個取代
    pub fn merge(mut self, other: Catalog) -> Self {
        for service in other.services {
            match self.services.iter_mut().find(|s| s.name == service.name) {
                Some(existing) => {
                    tracing::debug!("🔧 Catalog override for service '{}'", service.name);
                    *existing = service;
                }
                None => self.services.push(service),
            }
        }
        self.catalog = other.catalog;
        self
    }
}

impl Validate for Catalog {
    fn validate(&self) -> Result<()> {
        self.validate_catalog()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[catalog]
name = "test-catalog"

[[services]]
name = "crm"
base_url = "https://crm.example.com/api/v1"

[services.auth]
type = "bearer"
token = "secret-token"

[services.rate_limit]
strategy = "sliding_window"
max_requests = 10
window_seconds = 1

[[services.operations]]
name = "get_contact"
path = "/contacts/{contact_id}"
required = ["contact_id"]

[[services.operations]]
name = "create_contact"
method = "POST"
path = "/contacts"
required = ["email"]
optional = ["first_name", "last_name"]
wrap_body = "contact"
"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = Catalog::from_toml_str(MINIMAL).unwrap();

        assert_eq!(catalog.catalog.name, "test-catalog");
        let crm = catalog.service("crm").unwrap();
        assert_eq!(
            crm.auth,
            Some(AuthConfig::Bearer {
                token: "secret-token".to_string()
            })
        );
        assert_eq!(
            crm.rate_limit,
            Some(RateLimitConfig::SlidingWindow {
                max_requests: 10,
                window_seconds: 1
            })
        );

        let get = crm.operation("get_contact").unwrap();
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.path_params(), vec!["contact_id".to_string()]);
        assert_eq!(get.body_kind(), BodyKind::Query);

        let create = crm.operation("create_contact").unwrap();
        assert_eq!(create.body_kind(), BodyKind::Json);
        assert!(create.accepts("first_name"));
        assert!(!create.accepts("nickname"));

        assert!(catalog.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CATALOG_TEST_TOKEN", "from-env");

        let content = MINIMAL.replace("secret-token", "${CATALOG_TEST_TOKEN}");
        let catalog = Catalog::from_toml_str(&content).unwrap();
        assert_eq!(
            catalog.service("crm").unwrap().auth,
            Some(AuthConfig::Bearer {
                token: "from-env".to_string()
            })
        );

        std::env::remove_var("CATALOG_TEST_TOKEN");
    }

    #[test]
    fn test_env_values_are_taken_literally() {
        std::env::set_var("CATALOG_TEST_QUOTED", r#"pa"ss"#);
        std::env::set_var("CATALOG_TEST_BACKSLASH", r"ab\tcd");

        let content = MINIMAL.replace("secret-token", "${CATALOG_TEST_QUOTED}");
        let content = format!(
            "{}\n[[services]]\nname = \"other\"\nbase_url = \"https://other.example.com\"\nheaders = {{ X-Key = \"${{CATALOG_TEST_BACKSLASH}}\" }}\n",
            content
        );
        let catalog = Catalog::from_toml_str(&content).unwrap();

        assert_eq!(
            catalog.service("crm").unwrap().auth,
            Some(AuthConfig::Bearer {
                token: r#"pa"ss"#.to_string()
            })
        );
        let headers = catalog.service("other").unwrap().headers.clone().unwrap();
        assert_eq!(headers["X-Key"], r"ab\tcd");

        std::env::remove_var("CATALOG_TEST_QUOTED");
        std::env::remove_var("CATALOG_TEST_BACKSLASH");
    }

    #[test]
    fn test_unset_env_var_is_left_verbatim() {
        let content = MINIMAL.replace("secret-token", "${CATALOG_TEST_UNSET_VAR}");
        let catalog = Catalog::from_toml_str(&content).unwrap();
        assert_eq!(
            catalog.service("crm").unwrap().auth,
            Some(AuthConfig::Bearer {
                token: "${CATALOG_TEST_UNSET_VAR}".to_string()
            })
        );
    }

    #[test]
    fn test_undeclared_path_placeholder_fails_validation() {
        let content = MINIMAL.replace(
            "required = [\"contact_id\"]",
            "required = []\noptional = [\"contact_id\"]",
        );
        let catalog = Catalog::from_toml_str(&content).unwrap();
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_invalid_base_url_fails_validation() {
        let content = MINIMAL.replace("https://crm.example.com/api/v1", "crm.example.com");
        let catalog = Catalog::from_toml_str(&content).unwrap();
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_duplicate_operation_fails_validation() {
        let content = MINIMAL.replace("name = \"create_contact\"", "name = \"get_contact\"");
        let catalog = Catalog::from_toml_str(&content).unwrap();
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_unknown_status_map_kind_fails_validation() {
        let content = format!(
            "{}\n",
            MINIMAL.replace(
                "[services.rate_limit]",
                "[services.status_map]\n\"400\" = \"teapot\"\n\n[services.rate_limit]"
            )
        );
        let catalog = Catalog::from_toml_str(&content).unwrap();
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_unknown_lookups() {
        let catalog = Catalog::from_toml_str(MINIMAL).unwrap();
        assert!(matches!(
            catalog.service("nope"),
            Err(SkillError::UnknownServiceError { .. })
        ));
        assert!(matches!(
            catalog.service("crm").unwrap().operation("nope"),
            Err(SkillError::UnknownOperationError { .. })
        ));
    }

    #[test]
    fn test_merge_overrides_by_name() {
        let base = Catalog::from_toml_str(MINIMAL).unwrap();
        let overlay = Catalog::from_toml_str(
            r#"
[catalog]
name = "overlay"

[[services]]
name = "crm"
base_url = "http://localhost:9000"

[[services]]
name = "chat"
base_url = "https://chat.example.com"
"#,
        )
        .unwrap();

        let merged = base.merge(overlay);
        assert_eq!(merged.services.len(), 2);
        assert_eq!(merged.service("crm").unwrap().base_url, "http://localhost:9000");
        assert!(merged.service("chat").is_ok());
    }

    #[test]
    fn test_catalog_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();

        let catalog = Catalog::from_file(temp_file.path()).unwrap();
        assert_eq!(catalog.service_names(), vec!["crm"]);
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.services.len() >= 20);
        catalog.validate().unwrap();
    }
}
