//! Export formats and their local serializers.
//!
//! Every serializer is a pure function of the projected payload: the same
//! payload always produces the same bytes.

use csv::{QuoteStyle, WriterBuilder};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Cursor;

use crate::domain::{
    errors::{BrowserError, BrowserResult},
    models::{display_value, ExportPayload},
};

/// Errors raised by local serializers
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML serialization failed: {0}")]
    Xml(String),

    #[error("Failed to flush output: {0}")]
    Flush(String),
}

pub type SerializeFn = fn(&ExportPayload) -> Result<Vec<u8>, SerializeError>;

/// MIME type and extension of one rendition of a format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendition {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// A registered export format
#[derive(Clone)]
pub struct ExportFormatDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    /// Rendition produced by the remote service
    pub remote: Rendition,
    /// Rendition produced by `serialize` when it differs from the remote one
    pub local: Option<Rendition>,
    pub serialize: SerializeFn,
}

impl ExportFormatDescriptor {
    pub fn mime_type(&self) -> &'static str {
        self.remote.mime_type
    }

    pub fn extension(&self) -> &'static str {
        self.remote.extension
    }

    pub fn local_rendition(&self) -> Rendition {
        self.local.unwrap_or(self.remote)
    }
}

impl std::fmt::Debug for ExportFormatDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportFormatDescriptor")
            .field("key", &self.key)
            .field("remote", &self.remote)
            .field("local", &self.local)
            .finish()
    }
}

/// Static table of export formats keyed by format key
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<ExportFormatDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl FormatRegistry {
    pub fn new(formats: Vec<ExportFormatDescriptor>) -> Self {
        let index = formats
            .iter()
            .enumerate()
            .map(|(idx, format)| (format.key, idx))
            .collect();
        Self { formats, index }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            ExportFormatDescriptor {
                key: "json",
                label: "JSON",
                remote: Rendition {
                    mime_type: "application/json",
                    extension: "json",
                },
                local: None,
                serialize: serialize_json,
            },
            ExportFormatDescriptor {
                key: "csv",
                label: "CSV",
                remote: Rendition {
                    mime_type: "text/csv",
                    extension: "csv",
                },
                local: None,
                serialize: serialize_csv,
            },
            ExportFormatDescriptor {
                key: "tsv",
                label: "Tab-separated",
                remote: Rendition {
                    mime_type: "text/tab-separated-values",
                    extension: "tsv",
                },
                local: None,
                serialize: serialize_tsv,
            },
            ExportFormatDescriptor {
                key: "vcf",
                label: "VCF",
                remote: Rendition {
                    mime_type: "text/x-vcf",
                    extension: "vcf",
                },
                local: None,
                serialize: serialize_vcf,
            },
            ExportFormatDescriptor {
                key: "pdf-text",
                label: "PDF",
                remote: Rendition {
                    mime_type: "application/pdf",
                    extension: "pdf",
                },
                local: Some(Rendition {
                    mime_type: "text/plain",
                    extension: "txt",
                }),
                serialize: serialize_text_summary,
            },
            ExportFormatDescriptor {
                key: "spreadsheet",
                label: "Spreadsheet",
                remote: Rendition {
                    mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                    extension: "xlsx",
                },
                local: Some(Rendition {
                    mime_type: "application/vnd.ms-excel",
                    extension: "xml",
                }),
                serialize: serialize_spreadsheet_xml,
            },
        ])
    }

    pub fn get(&self, key: &str) -> BrowserResult<&ExportFormatDescriptor> {
        self.index
            .get(key)
            .map(|&idx| &self.formats[idx])
            .ok_or_else(|| BrowserError::UnknownFormat {
                key: key.to_string(),
            })
    }

    pub fn formats(&self) -> &[ExportFormatDescriptor] {
        &self.formats
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn serialize_json(payload: &ExportPayload) -> Result<Vec<u8>, SerializeError> {
    Ok(serde_json::to_vec_pretty(payload)?)
}

fn serialize_delimited(payload: &ExportPayload, delimiter: u8) -> Result<Vec<u8>, SerializeError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(&payload.fields)?;
    for record in &payload.records {
        writer.write_record(payload.row(record).map(display_value))?;
    }

    writer
        .into_inner()
        .map_err(|e| SerializeError::Flush(e.to_string()))
}

fn serialize_csv(payload: &ExportPayload) -> Result<Vec<u8>, SerializeError> {
    serialize_delimited(payload, b',')
}

fn serialize_tsv(payload: &ExportPayload) -> Result<Vec<u8>, SerializeError> {
    serialize_delimited(payload, b'\t')
}

/// Tabs and line breaks would break the line format
fn vcf_cell(value: &Value) -> String {
    let text = display_value(value);
    if text.is_empty() {
        ".".to_string()
    } else {
        text.replace(['\t', '\n', '\r'], " ")
    }
}

fn serialize_vcf(payload: &ExportPayload) -> Result<Vec<u8>, SerializeError> {
    let mut out = String::new();
    let _ = writeln!(out, "##fileformat=VCFv4.2");
    let _ = writeln!(out, "##source=object-browser");
    let _ = writeln!(out, "##subject={}", payload.subject_id);
    let _ = writeln!(out, "##section={}", payload.section_key);
    let _ = writeln!(out, "#{}", payload.fields.join("\t"));

    for record in &payload.records {
        let cells: Vec<String> = payload.row(record).map(vcf_cell).collect();
        let _ = writeln!(out, "{}", cells.join("\t"));
    }

    Ok(out.into_bytes())
}

/// Plain-text stand-in for PDF output
fn serialize_text_summary(payload: &ExportPayload) -> Result<Vec<u8>, SerializeError> {
    let mut out = String::new();
    let _ = writeln!(out, "{}", payload.section_label);
    let _ = writeln!(out, "{}", "=".repeat(payload.section_label.chars().count().max(1)));
    let _ = writeln!(out, "Subject: {}", payload.subject_id);
    let _ = writeln!(out, "Records: {}", payload.records.len());

    let width = payload
        .fields
        .iter()
        .map(|f| f.chars().count())
        .max()
        .unwrap_or(0);

    for (idx, record) in payload.records.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "[{}]", idx + 1);
        for (field, value) in payload.fields.iter().zip(payload.row(record)) {
            let _ = writeln!(out, "  {:<width$}  {}", field, display_value(value), width = width);
        }
    }

    Ok(out.into_bytes())
}

fn xml_event(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), SerializeError> {
    writer
        .write_event(event)
        .map(|_| ())
        .map_err(|e| SerializeError::Xml(e.to_string()))
}

fn xml_cell(writer: &mut Writer<Cursor<Vec<u8>>>, value: &Value) -> Result<(), SerializeError> {
    let kind = if value.is_number() { "Number" } else { "String" };
    xml_event(writer, Event::Start(BytesStart::new("Cell")))?;
    xml_event(
        writer,
        Event::Start(BytesStart::new("Data").with_attributes([("ss:Type", kind)])),
    )?;
    xml_event(writer, Event::Text(BytesText::new(&display_value(value))))?;
    xml_event(writer, Event::End(BytesEnd::new("Data")))?;
    xml_event(writer, Event::End(BytesEnd::new("Cell")))
}

/// SpreadsheetML 2003: a single-file XML workbook spreadsheet applications open directly
fn serialize_spreadsheet_xml(payload: &ExportPayload) -> Result<Vec<u8>, SerializeError> {
    const NS: &str = "urn:schemas-microsoft-com:office:spreadsheet";
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    xml_event(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    xml_event(
        &mut writer,
        Event::Start(BytesStart::new("Workbook").with_attributes([("xmlns", NS), ("xmlns:ss", NS)])),
    )?;

    // Worksheet names are limited to 31 characters
    let sheet_name: String = payload.section_label.chars().take(31).collect();
    xml_event(
        &mut writer,
        Event::Start(
            BytesStart::new("Worksheet").with_attributes([("ss:Name", sheet_name.as_str())]),
        ),
    )?;
    xml_event(&mut writer, Event::Start(BytesStart::new("Table")))?;

    xml_event(&mut writer, Event::Start(BytesStart::new("Row")))?;
    for field in &payload.fields {
        xml_cell(&mut writer, &Value::String(field.clone()))?;
    }
    xml_event(&mut writer, Event::End(BytesEnd::new("Row")))?;

    for record in &payload.records {
        xml_event(&mut writer, Event::Start(BytesStart::new("Row")))?;
        for value in payload.row(record) {
            xml_cell(&mut writer, value)?;
        }
        xml_event(&mut writer, Event::End(BytesEnd::new("Row")))?;
    }

    xml_event(&mut writer, Event::End(BytesEnd::new("Table")))?;
    xml_event(&mut writer, Event::End(BytesEnd::new("Worksheet")))?;
    xml_event(&mut writer, Event::End(BytesEnd::new("Workbook")))?;

    Ok(writer.into_inner().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ExportSectionDescriptor, Record};
    use serde_json::json;

    fn payload() -> ExportPayload {
        let section = ExportSectionDescriptor::new("variants", "Variants", &["gene", "position", "note"]);
        let records: Vec<Record> = vec![
            json!({"gene": "BRCA1", "position": 43044295, "note": "pathogenic, confirmed"}),
            json!({"gene": "TP53", "position": 7675088}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
        ExportPayload::project("P-7", &section, &records)
    }

    fn render(key: &str) -> String {
        let registry = FormatRegistry::builtin();
        let format = registry.get(key).unwrap();
        String::from_utf8((format.serialize)(&payload()).unwrap()).unwrap()
    }

    #[test]
    fn test_unknown_format() {
        let err = FormatRegistry::builtin().get("docx").unwrap_err();
        assert!(matches!(err, BrowserError::UnknownFormat { .. }));
    }

    #[test]
    fn test_csv_quotes_and_orders_columns() {
        let csv = render("csv");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "gene,position,note");
        assert_eq!(lines[1], "BRCA1,43044295,\"pathogenic, confirmed\"");
        assert_eq!(lines[2], "TP53,7675088,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_tsv_is_tab_separated() {
        let tsv = render("tsv");
        assert_eq!(tsv.lines().next().unwrap(), "gene\tposition\tnote");
        assert_eq!(tsv.lines().nth(2).unwrap(), "TP53\t7675088\t");
    }

    #[test]
    fn test_vcf_layout() {
        let vcf = render("vcf");
        let lines: Vec<&str> = vcf.lines().collect();
        assert_eq!(lines[0], "##fileformat=VCFv4.2");
        assert!(lines.contains(&"#gene\tposition\tnote"));
        assert_eq!(*lines.last().unwrap(), "TP53\t7675088\t.");
    }

    #[test]
    fn test_json_keeps_field_order() {
        let json: Value = serde_json::from_str(&render("json")).unwrap();
        let first = json["records"][0].as_object().unwrap();
        let keys: Vec<_> = first.keys().cloned().collect();
        assert_eq!(keys, vec!["gene", "position", "note"]);
        assert_eq!(json["subject_id"], "P-7");
    }

    #[test]
    fn test_binary_formats_have_non_empty_local_fallbacks() {
        let text = render("pdf-text");
        assert!(text.starts_with("Variants\n"));
        assert!(text.contains("Records: 2"));

        let xml = render("spreadsheet");
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<Data ss:Type=\"Number\">43044295</Data>"));
        assert!(xml.contains("pathogenic, confirmed"));

        let registry = FormatRegistry::builtin();
        assert_eq!(registry.get("pdf-text").unwrap().local_rendition().extension, "txt");
        assert_eq!(registry.get("csv").unwrap().local_rendition().extension, "csv");
    }
}
