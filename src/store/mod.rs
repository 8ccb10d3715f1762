//! Row stores: where leads come from and where results go back to.
//!
//! Rows are header → cell maps, like a spreadsheet with a header row. Lead fields
//! are located through the alias lists in [`SheetLayout`], compared
//! case-insensitively.

pub mod json;
pub mod memory;

pub use json::JsonSheetStore;
pub use memory::MemoryStore;

use crate::core::config::SheetLayout;
use crate::core::error::{AppError, Result};
use crate::core::models::{EnrichmentResult, LeadRecord, RowId};
use std::collections::BTreeMap;

/// One sheet row: header name → cell text.
pub type SheetRow = BTreeMap<String, String>;

/// External tabular store consumed by the engine.
pub trait LeadStore {
    /// Rows whose status equals the ready value, as lead records.
    fn ready_leads(&self) -> Result<Vec<LeadRecord>>;

    /// Writes the email and email status cells of `row`. Nothing else is touched.
    fn write_result(&mut self, row: RowId, result: &EnrichmentResult) -> Result<()>;
}

/// Header in `row` matching `name` case-insensitively.
fn find_header<'a>(row: &'a SheetRow, name: &str) -> Option<&'a String> {
    let wanted = name.trim();
    row.keys().find(|k| k.trim().eq_ignore_ascii_case(wanted))
}

/// First non-empty cell among `aliases`, in alias order.
fn first_field<'a>(row: &'a SheetRow, aliases: &[String]) -> Option<&'a str> {
    aliases
        .iter()
        .filter_map(|alias| find_header(row, alias).and_then(|h| row.get(h)))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

/// Extracts the leads a run should process, in row order.
pub(crate) fn extract_ready_leads(rows: &[SheetRow], layout: &SheetLayout) -> Vec<LeadRecord> {
    let ready = layout.ready_status.trim();
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let status = first_field(row, std::slice::from_ref(&layout.status_field))?;
            if !status.eq_ignore_ascii_case(ready) {
                return None;
            }
            let row_id = RowId(index);
            if layout.skip_existing_email
                && first_field(row, std::slice::from_ref(&layout.email_field)).is_some()
            {
                tracing::debug!("Skipping {}: email already present.", row_id);
                return None;
            }
            let website_candidates = layout
                .website_fields
                .iter()
                .filter_map(|alias| first_field(row, std::slice::from_ref(alias)))
                .map(str::to_string)
                .collect();
            Some(LeadRecord {
                row: row_id,
                first_name: first_field(row, &layout.first_name_fields)
                    .unwrap_or_default()
                    .to_string(),
                last_name: first_field(row, &layout.last_name_fields)
                    .unwrap_or_default()
                    .to_string(),
                website_candidates,
            })
        })
        .collect()
}

/// Sets the two output cells of `row`, reusing existing headers where present.
pub(crate) fn apply_result(
    rows: &mut [SheetRow],
    layout: &SheetLayout,
    row: RowId,
    result: &EnrichmentResult,
) -> Result<()> {
    let cells = rows
        .get_mut(row.0)
        .ok_or_else(|| AppError::Store(format!("{} does not exist", row)))?;

    for (field, value) in [
        (&layout.email_field, result.email.clone()),
        (&layout.email_status_field, result.status.as_str().to_string()),
    ] {
        let header = find_header(cells, field)
            .cloned()
            .unwrap_or_else(|| field.clone());
        cells.insert(header, value);
    }
    Ok(())
}
