use crate::error::{InvoiceAnalyticsError, Result};
use crate::schema::{CellValue, RawRow};
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use csv::ReaderBuilder;
use log::debug;
use std::io::Cursor;

/// Headers plus raw rows, the common output of both source readers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

const DELIMITER_CANDIDATES: [char; 4] = [',', ';', '\t', '|'];

/// Dispatch to a reader based on the uploaded filename's extension.
pub fn read_table(content: &[u8], filename: &str) -> Result<TableData> {
    let extension = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        "csv" | "tsv" | "txt" => read_delimited(content),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(content),
        _ => Err(InvoiceAnalyticsError::UnsupportedFile(filename.to_string())),
    }
}

/// Decode bytes as UTF-8 (BOM-aware), falling back to windows-1252 when
/// the content contains sequences that are not valid UTF-8.
fn decode_text(content: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::UTF_8.decode(content);
    if !had_errors {
        return text.into_owned();
    }
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(content);
    text.into_owned()
}

/// Pick the delimiter by counting candidate occurrences on the header
/// line; the most frequent wins, comma on a tie.
fn detect_delimiter(text: &str) -> u8 {
    let header_line = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();

    let mut best = DELIMITER_CANDIDATES[0];
    let mut best_count = 0usize;
    for candidate in DELIMITER_CANDIDATES {
        let count = header_line.matches(candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best as u8
}

/// Parse delimited text content into headers and raw rows.
///
/// Quoted fields may contain the delimiter, embedded newlines, and doubled
/// quotes; blank lines are skipped. Source row numbers are the 1-based
/// line each record starts on.
pub fn read_delimited(content: &[u8]) -> Result<TableData> {
    let text = decode_text(content);
    if text.trim().is_empty() {
        return Ok(TableData::default());
    }

    let delimiter = detect_delimiter(&text);
    debug!(
        "Delimited reader using {:?} as delimiter",
        delimiter as char
    );

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut headers: Vec<String> = Vec::new();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(rows.len() + 2);

        if headers.is_empty() {
            headers = record.iter().map(|h| h.trim().to_string()).collect();
            continue;
        }

        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let raw = record.get(i).unwrap_or_default().trim();
                let value = if raw.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(raw.to_string())
                };
                (header.clone(), value)
            })
            .collect();

        rows.push(RawRow {
            source_row: line,
            cells,
        });
    }

    Ok(TableData { headers, rows })
}

/// Read the first sheet of a workbook binary. Row 1 becomes the headers,
/// rows with every cell empty are dropped, and native date cells are
/// converted to ISO text here so downstream code only sees strings and
/// numbers.
pub fn read_workbook(content: &[u8]) -> Result<TableData> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(content))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(TableData::default()),
    };

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = match sheet_rows.next() {
        Some(row) => row.iter().map(header_string).collect(),
        None => return Ok(TableData::default()),
    };

    let mut rows = Vec::new();
    for (index, row) in sheet_rows.enumerate() {
        let cells: Vec<(String, CellValue)> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = row.get(i).map(convert_cell).unwrap_or(CellValue::Empty);
                (header.clone(), value)
            })
            .collect();

        let raw = RawRow {
            source_row: index + 2,
            cells,
        };
        if raw.is_blank() {
            continue;
        }
        rows.push(raw);
    }

    debug!(
        "Workbook reader produced {} rows under {} headers",
        rows.len(),
        headers.len()
    );
    Ok(TableData { headers, rows })
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(trimmed.to_string())
            }
        }
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(_) => match cell.as_date() {
            Some(date) => CellValue::Text(date.format("%Y-%m-%d").to_string()),
            None => CellValue::Empty,
        },
        Data::DateTimeIso(s) => {
            let date_part = s.split('T').next().unwrap_or(s);
            CellValue::Text(date_part.to_string())
        }
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn header_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        other => other.to_string().trim().to_string(),
    }
}
