use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::errors::ValidationError;
use crate::domain::value_objects::{FolderPath, ObjectId, TypeFamilyId};

const KIB: f64 = 1024.0;
const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// A file stored in exactly one bucket folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: ObjectId,
    pub name: String,
    pub size_bytes: u64,
    pub type_family: TypeFamilyId,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl FileObject {
    /// Lowercase extension without the dot
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }

    pub fn display_size(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// Aggregate view of a folder, recomputed from its members on every listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderDescriptor {
    pub name: String,
    pub path: FolderPath,
    /// Files anywhere below this folder
    pub file_count: usize,
    pub total_size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Lowercase extension of a file name, if it has one
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Validate a plain object name (no folder separators)
pub fn validate_object_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyObjectName);
    }
    if let Some(c) = name.chars().find(|c| *c == '/' || *c == '\\' || c.is_control()) {
        return Err(ValidationError::InvalidObjectNameCharacter(c));
    }
    if name == "." || name == ".." {
        return Err(ValidationError::ReservedObjectName(name.to_string()));
    }
    Ok(())
}

/// Parse a human readable size such as `"500 KB"` or `"2.5GB"` into bytes (base 1024)
pub fn parse_size_label(label: &str) -> Result<u64, ValidationError> {
    let invalid = || ValidationError::InvalidSizeLabel(label.to_string());
    let trimmed = label.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number.parse().map_err(|_| invalid())?;
    let exponent = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" | "BYTE" | "BYTES" => 0,
        "KB" | "K" | "KIB" => 1,
        "MB" | "M" | "MIB" => 2,
        "GB" | "G" | "GIB" => 3,
        "TB" | "T" | "TIB" => 4,
        _ => return Err(invalid()),
    };

    Ok((value * KIB.powi(exponent)).round() as u64)
}

/// Render bytes with the largest whole unit, e.g. `10.5 MB`
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= KIB && unit < UNITS.len() - 1 {
        value /= KIB;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else if (value.fract() * 10.0).round() == 0.0 || (value.fract() * 10.0).round() == 10.0 {
        format!("{:.0} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_label_units() {
        assert_eq!(parse_size_label("500 KB").unwrap(), 500 * 1024);
        assert_eq!(parse_size_label("10 MB").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size_label("2 GB").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_size_label("2.5gb").unwrap(), 2_684_354_560);
        assert_eq!(parse_size_label("42 bytes").unwrap(), 42);
        assert_eq!(parse_size_label("42").unwrap(), 42);
    }

    #[test]
    fn test_parse_size_label_rejects_garbage() {
        assert!(parse_size_label("").is_err());
        assert!(parse_size_label("ten MB").is_err());
        assert!(parse_size_label("10 parsecs").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(500 * 1024), "500 KB");
        assert_eq!(format_size(10 * 1024 * 1024 + 512 * 1024), "10.5 MB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2 GB");
    }

    #[test]
    fn test_extension_and_name_rules() {
        assert_eq!(extension_of("scan.DCM"), Some("dcm".to_string()));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(extension_of(".bashrc"), None);
        assert_eq!(extension_of("README"), None);
        assert!(validate_object_name("report.pdf").is_ok());
        assert!(validate_object_name("a/b.pdf").is_err());
        assert!(validate_object_name("  ").is_err());
        assert!(validate_object_name("..").is_err());
        assert!(validate_object_name("x\n.vcf").is_err());
        assert!(validate_object_name("..hidden.vcf").is_ok());
    }
}
