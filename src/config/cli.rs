use crate::core::output::OutputFormat;
use crate::utils::error::{Result, SkillError};
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "saas-skills")]
#[command(about = "Call third-party SaaS APIs through a declarative service catalog")]
pub struct CliConfig {
    /// Catalog file layered over the built-in catalog
    #[arg(long, global = true, env = "SAAS_SKILLS_CATALOG")]
    pub catalog: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List configured services
    Services,

    /// List the operations of a service
    Operations { service: String },

    /// Run one operation
    Call {
        service: String,
        operation: String,

        /// Parameter as key=value; values that parse as JSON are sent as JSON
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,

        /// Parameters as a JSON object; -p values take precedence
        #[arg(long)]
        json: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Print the response body instead of records
        #[arg(long)]
        raw: bool,
    },

    /// Check a webhook signature and print the parsed event
    VerifyWebhook {
        service: String,

        #[arg(long)]
        payload_file: PathBuf,

        #[arg(long)]
        signature: String,

        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Validate the catalog
    Validate,
}

/// `key=value`; the value is JSON when it parses as JSON, a string otherwise.
pub fn parse_param(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

impl Command {
    /// Parameters for `call`: the `--json` object overlaid with `-p` pairs.
    pub fn call_params(&self) -> Result<Map<String, Value>> {
        let Command::Call { params, json, .. } = self else {
            return Ok(Map::new());
        };

        let mut merged = match json {
            Some(text) => match serde_json::from_str::<Value>(text)? {
                Value::Object(map) => map,
                _ => {
                    return Err(SkillError::InvalidConfigValueError {
                        field: "--json".to_string(),
                        value: text.clone(),
                        reason: "Parameters must be a JSON object".to_string(),
                    })
                }
            },
            None => Map::new(),
        };
        for (key, value) in params {
            merged.insert(key.clone(), value.clone());
        }
        Ok(merged)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.catalog {
            if !path.is_file() {
                return Err(SkillError::InvalidConfigValueError {
                    field: "--catalog".to_string(),
                    value: path.display().to_string(),
                    reason: "Catalog file does not exist".to_string(),
                });
            }
        }
        if let Command::VerifyWebhook { payload_file, .. } = &self.command {
            if !payload_file.is_file() {
                return Err(SkillError::InvalidConfigValueError {
                    field: "--payload-file".to_string(),
                    value: payload_file.display().to_string(),
                    reason: "Payload file does not exist".to_string(),
                });
            }
        }
        self.command.call_params().map(|_| ())
    }
}
