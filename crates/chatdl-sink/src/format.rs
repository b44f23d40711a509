//! Per-format renderers (spec.md §4.8): JSON whole-buffer dump, CSV
//! with a union-of-keys sorted header, and the plain-text
//! `message_to_string` form.

use chatdl_core::record::ChatRecord;
use chatdl_core::Error;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

pub const BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
    PlainText,
}

/// Selects a format from an output path's extension (§4.8): `.json`,
/// `.csv`, anything else falls back to plain text.
pub fn detect_format(path: &Path) -> OutputFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => OutputFormat::Json,
        Some("csv") => OutputFormat::Csv,
        _ => OutputFormat::PlainText,
    }
}

pub fn host_native_newline() -> &'static str {
    if cfg!(windows) {
        "\r\n"
    } else {
        "\n"
    }
}

/// Whole-buffer JSON dump, keys sorted recursively, with a leading
/// UTF-8 BOM.
pub fn render_json(records: &[ChatRecord]) -> Result<Vec<u8>, Error> {
    let values: Vec<Value> = records.iter().map(ChatRecord::to_sorted_value).collect();
    let body = serde_json::to_string_pretty(&values)?;
    let mut out = Vec::with_capacity(BOM.len() + body.len());
    out.extend_from_slice(BOM);
    out.extend_from_slice(body.as_bytes());
    Ok(out)
}

/// CSV dump: header is the sorted union of keys across every record;
/// line terminator is the operator's `--newline` (host-native if
/// unset); UTF-8 BOM prefix.
pub fn render_csv(records: &[ChatRecord], newline: &str) -> Result<Vec<u8>, Error> {
    let values: Vec<Value> = records.iter().map(ChatRecord::to_sorted_value).collect();

    let mut keys = BTreeSet::new();
    for value in &values {
        if let Some(obj) = value.as_object() {
            keys.extend(obj.keys().cloned());
        }
    }
    let header: Vec<String> = keys.into_iter().collect();

    let mut out = Vec::new();
    out.extend_from_slice(BOM);
    out.extend_from_slice(render_csv_row(&header)?.as_bytes());
    out.extend_from_slice(newline.as_bytes());

    for value in &values {
        let row: Vec<String> = header
            .iter()
            .map(|key| {
                value
                    .get(key)
                    .map(value_to_csv_cell)
                    .unwrap_or_default()
            })
            .collect();
        out.extend_from_slice(render_csv_row(&row)?.as_bytes());
        out.extend_from_slice(newline.as_bytes());
    }
    Ok(out)
}

fn render_csv_row(fields: &[String]) -> Result<String, Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields).map_err(|e| Error::Parsing {
        what: "csv row".to_string(),
        detail: e.to_string(),
    })?;
    let bytes = writer.into_inner().map_err(|e| Error::Parsing {
        what: "csv row".to_string(),
        detail: e.to_string(),
    })?;
    let mut text = String::from_utf8(bytes).map_err(|e| Error::Parsing {
        what: "csv row".to_string(),
        detail: e.to_string(),
    })?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

fn value_to_csv_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
