use crate::error::Result;
use crate::mapper::resolve_column_mapping;
use crate::normalizer::normalize_rows;
use crate::reader::read_table;
use crate::schema::{ColumnMapping, InvoiceRecord, RowIssue};
use chrono::{Local, NaiveDate};
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How many normalized records the mapping-confirmation preview carries.
pub const PREVIEW_ROWS: usize = 10;

/// Caller-tunable knobs for one ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    /// Applied when no currency column is mapped or a cell is empty.
    pub default_currency: String,
    /// A mapping the caller already confirmed; skips inference entirely.
    pub mapping: Option<ColumnMapping>,
    /// Analysis date override for reproducible runs; defaults to the
    /// local calendar date, captured once per ingestion.
    pub today: Option<NaiveDate>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_currency: "USD".to_string(),
            mapping: None,
            today: None,
        }
    }
}

/// The full normalized dataset plus everything a mapping-confirmation UI
/// needs before committing to analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedInvoiceData {
    pub records: Vec<InvoiceRecord>,
    pub mapping: ColumnMapping,
    pub unmapped_columns: Vec<String>,
    pub errors: Vec<RowIssue>,
    pub warnings: Vec<RowIssue>,
    pub dataset_warnings: Vec<String>,
    /// First few records for visual confirmation of the mapping.
    pub preview: Vec<InvoiceRecord>,
}

/// Parse raw uploaded bytes into normalized invoice records.
///
/// The reader is picked from the filename extension; the column mapping
/// is inferred unless the caller supplied a confirmed one.
pub fn parse_invoice_file(
    content: &[u8],
    filename: &str,
    options: &ParseOptions,
) -> Result<ParsedInvoiceData> {
    let today = options
        .today
        .unwrap_or_else(|| Local::now().date_naive());

    let table = read_table(content, filename)?;
    info!(
        "Read {} rows under {} headers from {}",
        table.rows.len(),
        table.headers.len(),
        filename
    );

    let (mapping, unmapped_columns) = match &options.mapping {
        Some(confirmed) => {
            let mapped = confirmed.mapped_headers();
            let unmapped = table
                .headers
                .iter()
                .filter(|h| !mapped.contains(&h.as_str()) && !h.trim().is_empty())
                .cloned()
                .collect();
            (confirmed.clone(), unmapped)
        }
        None => {
            let resolution = resolve_column_mapping(&table.headers);
            (resolution.mapping, resolution.unmapped_columns)
        }
    };

    let batch = normalize_rows(&table.rows, &mapping, &options.default_currency, today);
    let preview = batch.records.iter().take(PREVIEW_ROWS).cloned().collect();

    Ok(ParsedInvoiceData {
        preview,
        records: batch.records,
        mapping,
        unmapped_columns,
        errors: batch.errors,
        warnings: batch.warnings,
        dataset_warnings: batch.dataset_warnings,
    })
}
