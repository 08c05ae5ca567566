use crate::config::catalog::OperationDefinition;
use crate::utils::error::{Result, SkillError};
use serde_json::{Map, Value};

/// Parameters of one passthrough call after validation and path substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    pub path: String,
    pub payload: Map<String, Value>,
}

/// Builds the path and payload for `op` from caller parameters.
///
/// Operation defaults sit underneath the caller's values. Required parameters
/// must be present and non-null; `null` optionals are dropped; parameters the
/// operation does not declare are rejected. Path placeholders are filled
/// (percent-encoded) and removed from the payload.
pub fn prepare(op: &OperationDefinition, params: &Map<String, Value>) -> Result<PreparedCall> {
    for key in params.keys() {
        if !op.accepts(key) {
            return Err(SkillError::UnexpectedParameterError {
                operation: op.name.clone(),
                parameter: key.clone(),
            });
        }
    }

    let mut payload = op.defaults.clone().unwrap_or_default();
    for (key, value) in params {
        if value.is_null() {
            payload.remove(key);
        } else {
            payload.insert(key.clone(), value.clone());
        }
    }

    for required in &op.required {
        if payload.get(required).map_or(true, Value::is_null) {
            return Err(SkillError::MissingParameterError {
                operation: op.name.clone(),
                parameter: required.clone(),
            });
        }
    }

    let mut path = op.path.clone();
    for param in op.path_params() {
        let value = payload
            .remove(&param)
            .ok_or_else(|| SkillError::MissingParameterError {
                operation: op.name.clone(),
                parameter: param.clone(),
            })?;
        let encoded = url::form_urlencoded::byte_serialize(scalar_to_string(&value).as_bytes())
            .collect::<String>()
            .replace('+', "%20");
        path = path.replace(&format!("{{{}}}", param), &encoded);
    }

    Ok(PreparedCall { path, payload })
}

/// Query/form values are flat strings; nested values are sent as JSON text.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

pub fn to_pairs(payload: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in payload {
        match value {
            // 純量陣列重複使用同一個鍵 (`ids=1&ids=2`)
            Value::Array(items) if items.iter().all(|v| !v.is_object() && !v.is_array()) => {
                for item in items {
                    pairs.push((key.clone(), scalar_to_string(item)));
                }
            }
            other => pairs.push((key.clone(), scalar_to_string(other))),
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::catalog::OperationDefinition;
    use crate::domain::model::HttpMethod;
    use serde_json::json;

    fn operation() -> OperationDefinition {
        OperationDefinition {
            name: "update_contact".to_string(),
            description: None,
            method: HttpMethod::Patch,
            path: "/contacts/{contact_id}".to_string(),
            required: vec!["contact_id".to_string(), "email".to_string()],
            optional: vec!["first_name".to_string(), "tags".to_string()],
            body: None,
            wrap_body: None,
            response_key: None,
            field_mapping: None,
            max_records: None,
            defaults: None,
        }
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_path_substitution_and_payload() {
        let call = prepare(
            &operation(),
            &params(json!({"contact_id": 17, "email": "a@example.com", "first_name": "Ada"})),
        )
        .unwrap();

        assert_eq!(call.path, "/contacts/17");
        assert_eq!(
            Value::Object(call.payload),
            json!({"email": "a@example.com", "first_name": "Ada"})
        );
    }

    #[test]
    fn test_repeated_placeholder_is_filled_everywhere() {
        let mut op = operation();
        op.path = "/accounts/{contact_id}/contacts/{contact_id}".to_string();

        let call = prepare(&op, &params(json!({"contact_id": "c 1", "email": "a@example.com"}))).unwrap();

        assert_eq!(call.path, "/accounts/c%201/contacts/c%201");
        assert_eq!(Value::Object(call.payload), json!({"email": "a@example.com"}));
    }

    #[test]
    fn test_null_optionals_are_dropped() {
        let call = prepare(
            &operation(),
            &params(json!({"contact_id": "c1", "email": "a@example.com", "first_name": null})),
        )
        .unwrap();
        assert!(!call.payload.contains_key("first_name"));
    }

    #[test]
    fn test_missing_or_null_required_parameter() {
        let err = prepare(&operation(), &params(json!({"contact_id": "c1"}))).unwrap_err();
        assert!(matches!(
            err,
            SkillError::MissingParameterError { ref parameter, .. } if parameter == "email"
        ));

        let err = prepare(
            &operation(),
            &params(json!({"contact_id": "c1", "email": null})),
        )
        .unwrap_err();
        assert!(matches!(err, SkillError::MissingParameterError { .. }));
    }

    #[test]
    fn test_undeclared_parameter_is_rejected() {
        let err = prepare(
            &operation(),
            &params(json!({"contact_id": "c1", "email": "e", "nickname": "x"})),
        )
        .unwrap_err();
        assert!(matches!(err, SkillError::UnexpectedParameterError { .. }));
    }

    #[test]
    fn test_path_values_are_percent_encoded() {
        let call = prepare(
            &operation(),
            &params(json!({"contact_id": "a b/c", "email": "e"})),
        )
        .unwrap();
        assert_eq!(call.path, "/contacts/a%20b%2Fc");
    }

    #[test]
    fn test_defaults_are_overridden_by_caller() {
        let mut op = operation();
        op.defaults = Some(params(json!({"first_name": "Default", "tags": ["vip"]})));

        let call = prepare(
            &op,
            &params(json!({"contact_id": 1, "email": "e", "first_name": "Ada"})),
        )
        .unwrap();
        assert_eq!(call.payload["first_name"], json!("Ada"));
        assert_eq!(call.payload["tags"], json!(["vip"]));

        let call = prepare(
            &op,
            &params(json!({"contact_id": 1, "email": "e", "tags": null})),
        )
        .unwrap();
        assert!(!call.payload.contains_key("tags"));
    }

    #[test]
    fn test_to_pairs_repeats_array_keys() {
        let pairs = to_pairs(&params(json!({"ids": [1, 2], "q": "x", "active": true})));
        assert!(pairs.contains(&("ids".to_string(), "1".to_string())));
        assert!(pairs.contains(&("ids".to_string(), "2".to_string())));
        assert!(pairs.contains(&("q".to_string(), "x".to_string())));
        assert!(pairs.contains(&("active".to_string(), "true".to_string())));
    }
}
