//! A JSON-file sheet: an array of row objects keyed by header name.

use super::{apply_result, extract_ready_leads, LeadStore, SheetRow};
use crate::core::config::SheetLayout;
use crate::core::error::{AppError, Result};
use crate::core::models::{EnrichmentResult, LeadRecord, RowId};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub struct JsonSheetStore {
    rows: Vec<SheetRow>,
    layout: SheetLayout,
    output_path: PathBuf,
}

impl JsonSheetStore {
    /// Loads `path`; results are written back to the same file.
    pub fn open(path: impl AsRef<Path>, layout: SheetLayout) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Store(format!("Failed to read sheet {}: {}", path.display(), e))
        })?;
        let rows = parse_rows(&content)?;
        tracing::info!("Loaded {} row(s) from {}", rows.len(), path.display());
        Ok(Self {
            rows,
            layout,
            output_path: path.to_path_buf(),
        })
    }

    /// Sends writes to `path` instead of the input file.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn rows(&self) -> &[SheetRow] {
        &self.rows
    }

    /// Writes all rows to a sibling temp file, then renames it over the output.
    pub fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.rows)?;
        let mut tmp_name = self
            .output_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "sheet.json".into());
        tmp_name.push(".tmp");
        let tmp_path = self.output_path.with_file_name(tmp_name);

        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.output_path)?;
        tracing::trace!("Persisted sheet to {}", self.output_path.display());
        Ok(())
    }
}

/// Accepts any scalar cell; non-string values are stored as their JSON text.
fn parse_rows(content: &str) -> Result<Vec<SheetRow>> {
    let raw: Vec<serde_json::Map<String, Value>> = serde_json::from_str(content)?;
    Ok(raw
        .into_iter()
        .map(|object| {
            object
                .into_iter()
                .map(|(header, value)| {
                    let cell = match value {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (header, cell)
                })
                .collect()
        })
        .collect())
}

impl LeadStore for JsonSheetStore {
    fn ready_leads(&self) -> Result<Vec<LeadRecord>> {
        Ok(extract_ready_leads(&self.rows, &self.layout))
    }

    fn write_result(&mut self, row: RowId, result: &EnrichmentResult) -> Result<()> {
        apply_result(&mut self.rows, &self.layout, row, result)?;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::EmailStatus;

    const SHEET: &str = r#"[
        {"Status": "SCRAPED", "First Name": "Jane", "Last Name": "Doe", "Website": "acme.io", "Employees": 40},
        {"Status": "DONE", "First Name": "Old", "Last Name": "Row", "Website": "old.io", "Email": null}
    ]"#;

    #[test]
    fn test_open_reads_ready_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");
        fs::write(&path, SHEET).unwrap();

        let store = JsonSheetStore::open(&path, SheetLayout::default()).unwrap();
        assert_eq!(store.rows().len(), 2);
        assert_eq!(store.rows()[0].get("Employees").map(String::as_str), Some("40"));

        let leads = store.ready_leads().unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].display_name(), "Jane Doe");
        assert_eq!(leads[0].website_candidates, vec!["acme.io".to_string()]);
    }

    #[test]
    fn test_write_result_persists_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");
        fs::write(&path, SHEET).unwrap();

        let mut store = JsonSheetStore::open(&path, SheetLayout::default()).unwrap();
        store
            .write_result(
                RowId(0),
                &EnrichmentResult::new("jane@acme.io", EmailStatus::Deliverable),
            )
            .unwrap();

        assert!(!dir.path().join("sheet.json.tmp").exists());
        let reopened = JsonSheetStore::open(&path, SheetLayout::default()).unwrap();
        let row = &reopened.rows()[0];
        assert_eq!(row.get("Email").map(String::as_str), Some("jane@acme.io"));
        assert_eq!(row.get("Email Status").map(String::as_str), Some("DELIVERABLE"));
        // the written row now has an email and is no longer ready
        assert!(reopened.ready_leads().unwrap().is_empty());
    }

    #[test]
    fn test_with_output_leaves_input_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.json");
        fs::write(&input, SHEET).unwrap();

        let mut store = JsonSheetStore::open(&input, SheetLayout::default())
            .unwrap()
            .with_output(&output);
        store
            .write_result(RowId(0), &EnrichmentResult::new("", EmailStatus::Undeliverable))
            .unwrap();

        assert_eq!(fs::read_to_string(&input).unwrap(), SHEET);
        let written = JsonSheetStore::open(&output, SheetLayout::default()).unwrap();
        assert_eq!(
            written.rows()[0].get("Email Status").map(String::as_str),
            Some("UNDELIVERABLE")
        );
    }

    #[test]
    fn test_malformed_sheet_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        assert!(matches!(
            JsonSheetStore::open(&path, SheetLayout::default()),
            Err(AppError::Json(_))
        ));
        assert!(matches!(
            JsonSheetStore::open(dir.path().join("missing.json"), SheetLayout::default()),
            Err(AppError::Store(_))
        ));
    }
}
