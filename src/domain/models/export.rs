use bon::Builder;
use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::errors::ValidationError;

/// One row of a result set
pub type Record = Map<String, Value>;

static NULL: Value = Value::Null;

/// Named subset of result-set fields used to scope an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSectionDescriptor {
    pub key: String,
    pub label: String,
    /// Column order of every serialized artifact
    pub included_fields: Vec<String>,
}

impl ExportSectionDescriptor {
    pub fn new(key: &str, label: &str, fields: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            included_fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// A result set projected down to one section. Every record carries exactly the
/// section's fields, in declared order; absent source values become `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportPayload {
    pub subject_id: String,
    pub section_key: String,
    pub section_label: String,
    pub fields: Vec<String>,
    pub records: Vec<Record>,
}

impl ExportPayload {
    pub fn project(subject_id: &str, section: &ExportSectionDescriptor, source: &[Record]) -> Self {
        let records = source
            .iter()
            .map(|record| {
                section
                    .included_fields
                    .iter()
                    .map(|field| {
                        let value = record.get(field).cloned().unwrap_or(Value::Null);
                        (field.clone(), value)
                    })
                    .collect::<Record>()
            })
            .collect();

        Self {
            subject_id: subject_id.to_string(),
            section_key: section.key.clone(),
            section_label: section.label.clone(),
            fields: section.included_fields.clone(),
            records,
        }
    }

    /// Values of one record in field order
    pub fn row<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = &'a Value> + 'a {
        self.fields
            .iter()
            .map(move |field| record.get(field).unwrap_or(&NULL))
    }
}

/// Render a JSON scalar for text-based formats; `null` becomes an empty string
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// An export request against a structured result set
#[derive(Debug, Clone, Builder)]
pub struct ExportRequest {
    #[builder(into)]
    pub subject_id: String,
    #[builder(into)]
    pub section_key: String,
    #[builder(into)]
    pub format_key: String,
    #[builder(default)]
    pub records: Vec<Record>,
    /// Date stamped into the filename; today (UTC) when absent
    pub date: Option<NaiveDate>,
}

impl ExportRequest {
    /// The subject id ends up in a filename and a `Content-Disposition` header
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_subject_id(&self.subject_id)
    }
}

const MAX_SUBJECT_ID_LEN: usize = 128;

/// Subject ids are ASCII letters, digits, `-`, `_` and `.`, and never start with a dot
pub fn validate_subject_id(subject_id: &str) -> Result<(), ValidationError> {
    let valid = !subject_id.is_empty()
        && subject_id.len() <= MAX_SUBJECT_ID_LEN
        && !subject_id.starts_with('.')
        && subject_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidField {
            field: "subject_id".to_string(),
            value: subject_id.to_string(),
            expected: "ASCII letters, digits, '-', '_' or '.', not starting with '.'".to_string(),
        })
    }
}

/// Which path produced the artifact bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportRoute {
    Remote,
    Local,
}

/// A complete, downloadable export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
    pub route: ExportRoute,
}

/// `{subject}_{section label, lowercased, spaces as underscores}_{YYYY-MM-DD}.{extension}`
pub fn artifact_filename(
    subject_id: &str,
    section_label: &str,
    date: NaiveDate,
    extension: &str,
) -> String {
    let label = section_label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();
    format!(
        "{}_{}_{}.{}",
        subject_id,
        label,
        date.format("%Y-%m-%d"),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_artifact_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            artifact_filename("P-1001", "Variants Only", date, "csv"),
            "P-1001_variants_only_2024-03-09.csv"
        );
    }

    #[test]
    fn test_subject_id_validation() {
        for good in ["P-1001", "subject_7", "S.2024.01"] {
            assert!(validate_subject_id(good).is_ok(), "{}", good);
        }
        for bad in ["", "../etc/passwd", "a/b", "..", ".hidden", "P\"1", "P 1", "x\r\ny"] {
            assert!(validate_subject_id(bad).is_err(), "{:?}", bad);
        }
        assert!(validate_subject_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_projection_keeps_declared_order_and_fills_gaps() {
        let section = ExportSectionDescriptor::new("s", "S", &["b", "a", "missing"]);
        let source = vec![json!({"a": 1, "b": "two", "c": true})
            .as_object()
            .cloned()
            .unwrap()];

        let payload = ExportPayload::project("P-1", &section, &source);
        let keys: Vec<_> = payload.records[0].keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "missing"]);
        assert_eq!(payload.records[0]["missing"], Value::Null);
        assert!(!payload.records[0].contains_key("c"));

        let row: Vec<String> = payload.row(&payload.records[0]).map(display_value).collect();
        assert_eq!(row, vec!["two", "1", ""]);
    }
}
