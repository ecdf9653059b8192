//! Dataset Inspection
//!
//! `validate_dataset` summarizes CSV and JSON files; `create_config_template`
//! builds a training config, guessing the label column when a dataset is
//! given.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::models::{ConfigTemplateRequest, ValidateDatasetRequest};

/// Number of data rows echoed back in a CSV report
const SAMPLE_ROWS: usize = 5;

/// Longest rendering of a JSON document echoed back in full
const JSON_SAMPLE_CHARS: usize = 500;

/// Column names treated as a likely prediction target, compared lowercased
const LABEL_CANDIDATES: [&str; 5] = ["target", "label", "y", "class", "output"];

// == Reports ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvReport {
    pub file_type: &'static str,
    pub headers: Vec<String>,
    pub columns: Vec<String>,
    pub row_count: usize,
    /// `[rows, columns]`
    pub shape: [usize; 2],
    pub missing_values: BTreeMap<String, usize>,
    pub sample_rows: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonReport {
    pub file_type: &'static str,
    pub data_type: &'static str,
    pub length: Option<usize>,
    pub keys: Option<Vec<String>>,
    pub sample: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtherReport {
    pub file_type: String,
    pub size: u64,
    pub message: &'static str,
}

/// Result of `validate_dataset`, serialized without a variant tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DatasetReport {
    Csv(CsvReport),
    Json(JsonReport),
    Other(OtherReport),
}

impl DatasetReport {
    /// Column names, when the format has them.
    pub fn columns(&self) -> Option<&[String]> {
        match self {
            DatasetReport::Csv(report) => Some(&report.columns),
            _ => None,
        }
    }
}

// == CSV ==
/// Splits one CSV record, honouring double-quoted fields and `""` escapes.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

fn csv_report(text: &str) -> CsvReport {
    let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));
    let headers: Vec<String> = match lines.next() {
        Some(header) if !header.trim().is_empty() => {
            split_record(header).into_iter().map(|h| h.trim().to_string()).collect()
        }
        _ => Vec::new(),
    };

    let mut missing = vec![0usize; headers.len()];
    let mut sample_rows = Vec::new();
    let mut row_count = 0;

    for line in lines.filter(|l| !l.trim().is_empty()) {
        let fields = split_record(line);
        for (i, slot) in missing.iter_mut().enumerate() {
            if fields.get(i).map_or(true, |f| f.trim().is_empty()) {
                *slot += 1;
            }
        }
        if sample_rows.len() < SAMPLE_ROWS {
            sample_rows.push(line.trim().to_string());
        }
        row_count += 1;
    }

    CsvReport {
        file_type: "csv",
        shape: [row_count, headers.len()],
        missing_values: headers.iter().cloned().zip(missing).collect(),
        columns: headers.clone(),
        headers,
        row_count,
        sample_rows,
    }
}

// == JSON ==
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn json_report(data: Value) -> JsonReport {
    let (length, keys) = match &data {
        Value::Array(items) => (Some(items.len()), None),
        Value::Object(map) => (Some(map.len()), Some(map.keys().cloned().collect())),
        _ => (None, None),
    };

    let rendered = data.to_string();
    let sample = if rendered.chars().count() > JSON_SAMPLE_CHARS {
        let head: String = rendered.chars().take(JSON_SAMPLE_CHARS).collect();
        Value::String(format!("{}...", head))
    } else {
        data.clone()
    };

    JsonReport {
        file_type: "json",
        data_type: json_type_name(&data),
        length,
        keys,
        sample,
    }
}

// == Tools ==
/// `validate_dataset`: format-specific summary of a data file.
pub async fn validate_dataset(req: ValidateDatasetRequest) -> Result<DatasetReport> {
    let path = PathBuf::from(&req.file_path);
    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|e| ToolError::from_io(e, &req.file_path))?;
    if !meta.is_file() {
        return Err(ToolError::NotAFile(req.file_path));
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ToolError::from_io(e, &req.file_path))?;
            Ok(DatasetReport::Csv(csv_report(&text)))
        }
        "json" => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| ToolError::from_io(e, &req.file_path))?;
            let data: Value = serde_json::from_slice(&bytes).map_err(|e| {
                ToolError::DecodeError(format!("{} is not valid JSON: {}", req.file_path, e))
            })?;
            Ok(DatasetReport::Json(json_report(data)))
        }
        other => Ok(DatasetReport::Other(OtherReport {
            file_type: if other.is_empty() {
                String::new()
            } else {
                format!(".{}", other)
            },
            size: meta.len(),
            message: "File type not specifically validated",
        })),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingConfig {
    pub task: String,
    pub label: String,
    pub time_limit: u64,
    pub presets: String,
    pub eval_metric: String,
    pub holdout_frac: f64,
    pub num_trials: u32,
}

impl TrainingConfig {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            label: "target".to_string(),
            time_limit: 300,
            presets: "best_quality".to_string(),
            eval_metric: "auto".to_string(),
            holdout_frac: 0.2,
            num_trials: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigTemplateResponse {
    pub config: TrainingConfig,
    /// Pretty-printed config; JSON is a subset of YAML
    pub yaml_content: String,
}

/// First column whose lowercased name is a known label name.
fn infer_label(columns: &[String]) -> Option<&String> {
    columns
        .iter()
        .find(|col| LABEL_CANDIDATES.contains(&col.to_lowercase().as_str()))
}

/// `create_config_template`: default config, label inferred when possible.
///
/// A dataset that cannot be inspected leaves the default label in place.
pub async fn create_config_template(req: ConfigTemplateRequest) -> Result<ConfigTemplateResponse> {
    let mut config = TrainingConfig::new(req.task_type);

    if let Some(dataset_path) = req.dataset_path {
        match validate_dataset(ValidateDatasetRequest {
            file_path: dataset_path.clone(),
        })
        .await
        {
            Ok(report) => {
                if let Some(label) = report.columns().and_then(infer_label) {
                    config.label = label.clone();
                }
            }
            Err(err) => debug!("Label inference skipped for {}: {}", dataset_path, err),
        }
    }

    let yaml_content = serde_json::to_string_pretty(&config)?;
    Ok(ConfigTemplateResponse {
        config,
        yaml_content,
    })
}
