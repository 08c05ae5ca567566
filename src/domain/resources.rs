//! Plain records for the resources most skills exchange. Every field except the
//! identifier is optional and unknown fields are ignored, so one shape serves
//! several vendors; aliases cover the common spellings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(alias = "firstName", alias = "firstname")]
    pub first_name: Option<String>,
    #[serde(alias = "lastName", alias = "lastname")]
    pub last_name: Option<String>,
    #[serde(alias = "email_address")]
    pub email: Option<String>,
    #[serde(alias = "phone_number", alias = "mobile_number")]
    pub phone: Option<String>,
    #[serde(alias = "company_name")]
    pub company: Option<String>,
    #[serde(alias = "createdAt")]
    pub created_at: Option<String>,
    pub tags: Vec<String>,
    #[serde(alias = "customFields", alias = "attributes")]
    pub custom_fields: HashMap<String, Value>,
}

impl Contact {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone().unwrap_or_else(|| self.id.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lead {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "lead_source")]
    pub source: Option<String>,
    #[serde(alias = "responsible_user_id", deserialize_with = "opt_id_string")]
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deal {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(alias = "title")]
    pub name: Option<String>,
    #[serde(alias = "price", alias = "value")]
    pub amount: Option<f64>,
    pub currency: Option<String>,
    #[serde(alias = "stage_id", alias = "status_id", deserialize_with = "opt_id_string")]
    pub stage: Option<String>,
    #[serde(alias = "contactId", deserialize_with = "opt_id_string")]
    pub contact_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(alias = "conversation_id")]
    pub channel_id: Option<String>,
    #[serde(alias = "text", alias = "body")]
    pub content: Option<String>,
    #[serde(alias = "sender")]
    pub author: Option<Value>,
    #[serde(alias = "created_at", alias = "sent_at")]
    pub timestamp: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscriber {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub email: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "utm_source")]
    pub source: Option<String>,
    #[serde(alias = "created")]
    pub created_at: Option<Value>,
}

/// Vendors disagree on whether IDs are numbers or strings.
fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn opt_id_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
