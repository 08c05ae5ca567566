use crate::config::catalog::{SignatureEncoding, WebhookConfig};
use crate::utils::error::{Result, SkillError};
use crate::utils::validation::validate_credential;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_SIGNATURE_HEADER: &str = "x-signature";

/// Inbound event after its signature has been checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookEvent {
    pub event_type: String,
    pub resource_id: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub data: Value,
}

impl WebhookEvent {
    /// Reads the common envelope fields vendors use; the full payload is kept in `data`.
    pub fn from_payload(payload: &Value) -> Self {
        let first_str = |keys: &[&str]| {
            keys.iter().find_map(|key| {
                let value = key
                    .split('.')
                    .try_fold(payload, |v, segment| v.get(segment))?;
                match value {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }
            })
        };

        let event_type = first_str(&["event", "type", "event_type", "eventType", "topic"])
            .unwrap_or_else(|| "unknown".to_string());
        let resource_id = first_str(&["resource_id", "data.id", "id", "object_id"]);
        let occurred_at = ["timestamp", "created_at", "occurred_at", "time"]
            .iter()
            .filter_map(|key| payload.get(*key))
            .find_map(parse_timestamp);

        Self {
            event_type,
            resource_id,
            occurred_at,
            data: payload.clone(),
        }
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let secs = n.as_i64()?;
            // 毫秒時間戳為 13 位數
            if secs > 100_000_000_000 {
                Utc.timestamp_millis_opt(secs).single()
            } else {
                Utc.timestamp_opt(secs, 0).single()
            }
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| parse_timestamp(&Value::Number(s.parse::<i64>().ok()?.into()))),
        _ => None,
    }
}

/// HMAC-SHA256 signer/verifier for inbound webhook callbacks.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    encoding: SignatureEncoding,
    prefix: Option<String>,
    signature_header: String,
    timestamp_header: Option<String>,
    tolerance_seconds: Option<i64>,
}

impl WebhookVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            encoding: SignatureEncoding::Hex,
            prefix: None,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            timestamp_header: None,
            tolerance_seconds: None,
        }
    }

    pub fn from_config(service: &str, config: &WebhookConfig) -> Result<Self> {
        validate_credential(service, "webhook.secret", &config.secret)?;
        let mut verifier = Self::new(config.secret.as_bytes())
            .with_encoding(config.encoding.unwrap_or_default());
        verifier.prefix = config.prefix.clone();
        if let Some(header) = &config.signature_header {
            verifier.signature_header = header.to_ascii_lowercase();
        }
        verifier.timestamp_header = config.timestamp_header.as_ref().map(|h| h.to_ascii_lowercase());
        verifier.tolerance_seconds = config.tolerance_seconds;
        Ok(verifier)
    }

    pub fn with_encoding(mut self, encoding: SignatureEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_tolerance(mut self, seconds: i64) -> Self {
        self.tolerance_seconds = Some(seconds);
        self
    }

    fn mac(&self, payload: &[u8], timestamp: Option<&str>) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|e| {
            SkillError::WebhookSignatureError {
                message: format!("invalid secret: {}", e),
            }
        })?;
        if let Some(ts) = timestamp {
            mac.update(ts.as_bytes());
            mac.update(b".");
        }
        mac.update(payload);
        Ok(mac)
    }

    /// Signature a vendor would send for `payload`, including the prefix.
    pub fn sign(&self, payload: &[u8], timestamp: Option<&str>) -> Result<String> {
        let digest = self.mac(payload, timestamp)?.finalize().into_bytes();
        let encoded = match self.encoding {
            SignatureEncoding::Hex => hex::encode(digest),
            SignatureEncoding::Base64 => STANDARD.encode(digest),
        };
        Ok(format!("{}{}", self.prefix.as_deref().unwrap_or(""), encoded))
    }

    pub fn verify(&self, payload: &[u8], signature: &str, timestamp: Option<&str>) -> Result<()> {
        self.verify_at(payload, signature, timestamp, Utc::now())
    }

    pub fn verify_at(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(tolerance) = self.tolerance_seconds {
            let ts = timestamp.ok_or_else(|| SkillError::WebhookSignatureError {
                message: "timestamp required".to_string(),
            })?;
            let sent_at: i64 = ts.trim().parse().map_err(|_| SkillError::WebhookSignatureError {
                message: format!("invalid timestamp '{}'", ts),
            })?;
            let skew = now.timestamp().checked_sub(sent_at).map(i64::unsigned_abs);
            if skew.map_or(true, |skew| skew > tolerance.unsigned_abs()) {
                return Err(SkillError::WebhookSignatureError {
                    message: format!("timestamp outside the {}s tolerance window", tolerance),
                });
            }
        }

        let signature = signature.trim();
        let encoded = match &self.prefix {
            Some(prefix) => signature.strip_prefix(prefix.as_str()).ok_or_else(|| {
                SkillError::WebhookSignatureError {
                    message: format!("signature must start with '{}'", prefix),
                }
            })?,
            None => signature,
        };

        let provided = match self.encoding {
            SignatureEncoding::Hex => hex::decode(encoded).ok(),
            SignatureEncoding::Base64 => STANDARD.decode(encoded).ok(),
        }
        .ok_or_else(|| SkillError::WebhookSignatureError {
            message: "signature is not validly encoded".to_string(),
        })?;

        self.mac(payload, timestamp)?
            .verify_slice(&provided)
            .map_err(|_| SkillError::WebhookSignatureError {
                message: "signature mismatch".to_string(),
            })
    }

    /// Verifies `payload` and reshapes it into a [`WebhookEvent`].
    pub fn handle(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: Option<&str>,
    ) -> Result<WebhookEvent> {
        self.verify(payload, signature, timestamp)?;
        let value: Value = serde_json::from_slice(payload)?;
        let event = WebhookEvent::from_payload(&value);
        tracing::info!(
            "📨 Webhook verified: {} ({})",
            event.event_type,
            event.resource_id.as_deref().unwrap_or("-")
        );
        Ok(event)
    }

    /// Same as [`handle`](Self::handle), reading signature and timestamp from request headers.
    pub fn handle_request(
        &self,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<WebhookEvent> {
        let lookup = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        };
        let signature = lookup(&self.signature_header).ok_or_else(|| {
            SkillError::WebhookSignatureError {
                message: format!("missing '{}' header", self.signature_header),
            }
        })?;
        let timestamp = self.timestamp_header.as_deref().and_then(lookup);
        self.handle(payload, signature, timestamp)
    }
}
