//! Session record log and bulk export to an `.xlsx` workbook.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;

use crate::record::Record;

pub const SHEET_NAME: &str = "TrackFittingsQR";
pub const DEFAULT_EXPORT_FILE: &str = "TrackFittingsQR.xlsx";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no records to export")]
    Empty,

    #[error("workbook could not be written: {0}")]
    Xlsx(#[from] XlsxError),
}

/// Append-only log of the records submitted in this session.
///
/// Clones share the same log, so the session appends to the instance the
/// exporter reads from.
#[derive(Debug, Clone, Default)]
pub struct RecordLog {
    records: Arc<RwLock<Vec<Record>>>,
}

impl RecordLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: Record) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all records in submission order.
    pub fn snapshot(&self) -> Vec<Record> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn build_workbook(records: &[Record]) -> Result<Workbook, ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in Record::FIELDS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }
    for (row, record) in records.iter().enumerate() {
        for (col, value) in record.values().iter().enumerate() {
            worksheet.write_string(row as u32 + 1, col as u16, value)?;
        }
    }
    worksheet.autofit();

    Ok(workbook)
}

/// Workbook bytes for `records`, one row per record under a header row.
pub fn workbook_bytes(records: &[Record]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = build_workbook(records)?;
    Ok(workbook.save_to_buffer()?)
}

/// Writes the workbook to `path`.
pub fn export_workbook(records: &[Record], path: &Path) -> Result<(), ExportError> {
    let mut workbook = build_workbook(records)?;
    workbook.save(path)?;
    tracing::info!(path = %path.display(), records = records.len(), "workbook exported");
    Ok(())
}
