use crate::utils::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Flat key/value view of one JSON resource returned by a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, Value>,
}

impl Record {
    fn from_object(obj: serde_json::Map<String, Value>, field_mapping: Option<&HashMap<String, String>>) -> Self {
        let mut data = HashMap::new();
        for (original_key, value) in obj {
            let key = field_mapping
                .and_then(|mapping| mapping.get(&original_key))
                .cloned()
                .unwrap_or(original_key);
            data.insert(key, value);
        }
        Record { data }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// Transport-level request, fully resolved (URL, auth headers, body).
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value),
            _ => None,
        }
    }
}

/// Transport-level response. Header names are lower-case.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl HttpResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }
}

/// Successful response of a passthrough call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    #[serde(skip)]
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl From<HttpResponse> for ApiResponse {
    fn from(response: HttpResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

impl ApiResponse {
    /// Resolves a dot path (`data.items`) inside the body.
    pub fn select(&self, response_key: Option<&str>) -> &Value {
        match response_key {
            Some(path) if !path.is_empty() => path
                .split('.')
                .try_fold(&self.body, |value, segment| value.get(segment))
                .unwrap_or(&Value::Null),
            _ => &self.body,
        }
    }

    /// Reshapes the body into flat records.
    pub fn records(
        &self,
        response_key: Option<&str>,
        field_mapping: Option<&HashMap<String, String>>,
        max_records: Option<usize>,
    ) -> Vec<Record> {
        let selected = self.select(response_key).clone();
        let mut records = Vec::new();

        match selected {
            Value::Array(items) => {
                let limit = max_records.unwrap_or(items.len());
                for item in items.into_iter().take(limit) {
                    match item {
                        Value::Object(obj) => records.push(Record::from_object(obj, field_mapping)),
                        other => {
                            let mut data = HashMap::new();
                            data.insert("value".to_string(), other);
                            records.push(Record { data });
                        }
                    }
                }
            }
            Value::Object(obj) => records.push(Record::from_object(obj, field_mapping)),
            Value::Null => {}
            other => {
                let mut data = HashMap::new();
                data.insert("response".to_string(), other);
                records.push(Record { data });
            }
        }

        records
    }

    pub fn decode<T: DeserializeOwned>(&self, response_key: Option<&str>) -> Result<T> {
        Ok(serde_json::from_value(self.select(response_key).clone())?)
    }
}
