use super::{apply_result, extract_ready_leads, LeadStore, SheetRow};
use crate::core::config::SheetLayout;
use crate::core::error::Result;
use crate::core::models::{EnrichmentResult, LeadRecord, RowId};

/// In-memory sheet. Records every write in order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Vec<SheetRow>,
    layout: SheetLayout,
    writes: Vec<(RowId, EnrichmentResult)>,
}

impl MemoryStore {
    pub fn new(rows: Vec<SheetRow>, layout: SheetLayout) -> Self {
        Self {
            rows,
            layout,
            writes: Vec::new(),
        }
    }

    /// Ready rows built from `(first, last, websites)` triples under the given layout.
    pub fn from_leads(layout: SheetLayout, leads: &[(&str, &str, &[&str])]) -> Self {
        let rows = leads
            .iter()
            .map(|(first, last, websites)| {
                let mut row = SheetRow::new();
                row.insert(layout.status_field.clone(), layout.ready_status.clone());
                if let Some(header) = layout.first_name_fields.first() {
                    row.insert(header.clone(), first.to_string());
                }
                if let Some(header) = layout.last_name_fields.first() {
                    row.insert(header.clone(), last.to_string());
                }
                for (header, value) in layout.website_fields.iter().zip(websites.iter()) {
                    row.insert(header.clone(), value.to_string());
                }
                row
            })
            .collect();
        Self::new(rows, layout)
    }

    pub fn rows(&self) -> &[SheetRow] {
        &self.rows
    }

    pub fn writes(&self) -> &[(RowId, EnrichmentResult)] {
        &self.writes
    }
}

impl LeadStore for MemoryStore {
    fn ready_leads(&self) -> Result<Vec<LeadRecord>> {
        Ok(extract_ready_leads(&self.rows, &self.layout))
    }

    fn write_result(&mut self, row: RowId, result: &EnrichmentResult) -> Result<()> {
        apply_result(&mut self.rows, &self.layout, row, result)?;
        self.writes.push((row, result.clone()));
        Ok(())
    }
}
