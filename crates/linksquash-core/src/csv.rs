//! CSV import/export of the alias mapping.
//!
//! Export writes a `alias,url` header and one row per alias. Only fields that
//! contain a comma are quoted (inner quotes doubled); a field holding a bare
//! `"` is written as-is.
//!
//! Import accepts any header that mentions both `alias` and `url`
//! (case-insensitive, any order), splits rows with a quote-aware splitter and
//! keeps rows whose first two fields are non-empty. Extra columns are ignored.

use crate::aliases::AliasMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

/// Header row written on export
pub const CSV_HEADER: &str = "alias,url";

/// MIME type of exported files
pub const CSV_MIME_TYPE: &str = "text/csv;charset=utf-8";

/// Default file-name prefix for exports
pub const DEFAULT_EXPORT_PREFIX: &str = "linksquash-aliases";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("Could not read file content")]
    Unreadable,

    #[error("CSV file is empty or has no data rows")]
    NoDataRows,

    #[error("CSV file must have 'alias' and 'url' columns")]
    MissingColumns,

    #[error("No valid aliases found in CSV")]
    NoValidRows,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("No aliases to export")]
    NothingToExport,
}

/// How imported aliases combine with existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportMode {
    /// Imported aliases overwrite same-named existing ones; the rest stay
    Merge,
    /// Existing aliases are discarded
    Replace,
}

/// Outcome of a successful import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Aliases read from the file
    pub imported: usize,
    /// Aliases stored after the import
    pub total: usize,
    pub mode: ImportMode,
}

/// A rendered export, ready to be offered as a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvExport {
    pub file_name: String,
    pub content: String,
    pub mime_type: &'static str,
}

/// Render the mapping as CSV text.
pub fn export_csv(aliases: &AliasMap) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + aliases.len() * 32);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for (alias, url) in aliases {
        out.push_str(&escape_field(alias));
        out.push(',');
        out.push_str(&escape_field(url));
        out.push('\n');
    }
    out
}

/// Quote a field if it contains a comma.
pub fn escape_field(field: &str) -> String {
    if field.contains(',') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// `<prefix>-YYYY-MM-DD.csv`
pub fn export_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}.csv", prefix, date.format("%Y-%m-%d"))
}

/// Today's UTC date from the platform clock (works on wasm32).
pub fn today_utc() -> NaiveDate {
    let millis = web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .date_naive()
}

/// Build the downloadable export for a non-empty mapping.
pub fn render_export(aliases: &AliasMap, prefix: &str, date: NaiveDate) -> Result<CsvExport, ExportError> {
    if aliases.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    Ok(CsvExport {
        file_name: export_file_name(prefix, date),
        content: export_csv(aliases),
        mime_type: CSV_MIME_TYPE,
    })
}

/// Parse CSV text into a mapping. Later rows win on duplicate aliases.
pub fn parse_csv(content: &str) -> Result<AliasMap, ImportError> {
    if content.is_empty() {
        return Err(ImportError::Unreadable);
    }

    let lines: Vec<&str> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    if lines.len() < 2 {
        return Err(ImportError::NoDataRows);
    }

    let header = lines[0].to_lowercase();
    if !header.contains("alias") || !header.contains("url") {
        return Err(ImportError::MissingColumns);
    }

    let mut aliases = AliasMap::new();
    for line in &lines[1..] {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields = split_row(line);
        if let [alias, url, ..] = fields.as_slice() {
            if !alias.is_empty() && !url.is_empty() {
                aliases.insert(alias.clone(), url.clone());
            }
        }
    }

    if aliases.is_empty() {
        return Err(ImportError::NoValidRows);
    }
    Ok(aliases)
}

/// Split one row on unquoted commas. `"` toggles quoting and `""` is a
/// literal quote.
pub fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Combine an imported mapping with the existing one.
pub fn combine(existing: &AliasMap, imported: AliasMap, mode: ImportMode) -> AliasMap {
    match mode {
        ImportMode::Replace => imported,
        ImportMode::Merge => {
            let mut merged = existing.clone();
            merged.extend(imported);
            merged
        }
    }
}
