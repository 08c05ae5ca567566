use crate::domain::model::Record;
use crate::utils::error::{Result, SkillError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Tsv,
}

impl FromStr for OutputFormat {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            other => Err(SkillError::InvalidConfigValueError {
                field: "format".to_string(),
                value: other.to_string(),
                reason: "Expected one of: json, csv, tsv".to_string(),
            }),
        }
    }
}

/// Renders records for display. Tabular formats use the sorted union of all
/// record keys as the header; nested values are written as JSON text.
pub fn render(records: &[Record], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<&std::collections::HashMap<String, Value>> =
                records.iter().map(|r| &r.data).collect();
            Ok(serde_json::to_string_pretty(&rows)?)
        }
        OutputFormat::Csv => render_delimited(records, b','),
        OutputFormat::Tsv => render_delimited(records, b'\t'),
    }
}

fn render_delimited(records: &[Record], delimiter: u8) -> Result<String> {
    let columns: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.data.keys().map(String::as_str))
        .collect();
    if columns.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(&columns)?;

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| cell(record.data.get(*column)))
            .collect();
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SkillError::IoError(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
