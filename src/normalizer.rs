use crate::schema::{
    CanonicalField, CellValue, ColumnMapping, InvoiceRecord, InvoiceStatus, RawRow, RowIssue,
};
use crate::utils::slugify;
use chrono::NaiveDate;
use log::debug;

/// Everything normalization produced for one batch of raw rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<InvoiceRecord>,
    /// Fatal to their row only; the row is dropped.
    pub errors: Vec<RowIssue>,
    /// Non-fatal; the row is kept with a substituted default.
    pub warnings: Vec<RowIssue>,
    /// Whole-dataset diagnostics, e.g. a missing due-date column.
    pub dataset_warnings: Vec<String>,
}

/// Parse a currency-formatted amount string.
///
/// Currency symbols, thousands separators and whitespace are stripped;
/// a parenthesized value is negative per accounting notation. Returns the
/// signed value; callers decide whether sign matters.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let negative = trimmed.starts_with('(') && trimmed.ends_with(')') && trimmed.len() > 2;
    let inner = if negative {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    let cleaned: String = inner
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

const NATURAL_DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d %Y",
];

/// Parse the date formats billing exports actually contain.
///
/// Known formats are tried first; failing that, the string is split on
/// `/`, `-` or `.` and the three numeric parts are disambiguated by value
/// range: month/day/year, then day/month/year, then year/month/day.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in NATURAL_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    let parts: Vec<i32> = trimmed
        .split(['/', '-', '.'])
        .map(|p| p.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .ok()?;
    if parts.len() != 3 {
        return None;
    }
    let (a, b, c) = (parts[0], parts[1], parts[2]);

    if (1..=12).contains(&a) && (1..=31).contains(&b) && c >= 1900 {
        NaiveDate::from_ymd_opt(c, a as u32, b as u32)
    } else if (1..=12).contains(&b) && (1..=31).contains(&a) {
        let year = if (0..100).contains(&c) { 2000 + c } else { c };
        NaiveDate::from_ymd_opt(year, b as u32, a as u32)
    } else if a >= 1900 {
        NaiveDate::from_ymd_opt(a, b as u32, c as u32)
    } else {
        None
    }
}

/// Resolve an invoice's status from explicit text, falling back to what
/// the payment figures imply. Free-text status columns are unreliable
/// across billing systems; the numeric fallback is the record of truth.
pub fn resolve_status(
    status_text: &str,
    paid_date: Option<NaiveDate>,
    amount: f64,
    amount_paid: f64,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> InvoiceStatus {
    let text = status_text.trim().to_lowercase();
    if !text.is_empty() {
        if text.contains("paid") || text.contains("settled") || text.contains("closed") {
            return InvoiceStatus::Paid;
        }
        if text.contains("disput") || text.contains("contest") {
            return InvoiceStatus::Disputed;
        }
        if text.contains("void") || text.contains("cancel") {
            return InvoiceStatus::Voided;
        }
        if text.contains("partial") {
            return InvoiceStatus::Partial;
        }
        if text.contains("overdue") || text.contains("past due") {
            return InvoiceStatus::Overdue;
        }
    }

    if paid_date.is_some() || amount_paid >= amount {
        InvoiceStatus::Paid
    } else if amount_paid > 0.0 {
        InvoiceStatus::Partial
    } else if due_date.is_some_and(|due| due < today) {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Pending
    }
}

fn mapped_raw(row: &RawRow, mapping: &ColumnMapping, field: CanonicalField) -> String {
    mapping
        .get(field)
        .and_then(|header| row.get(header))
        .map(CellValue::to_raw_string)
        .unwrap_or_default()
}

fn dataset_warnings(mapping: &ColumnMapping) -> Vec<String> {
    let mut warnings = Vec::new();
    if mapping.customer_id.is_none() && mapping.customer_name.is_none() {
        warnings
            .push("No customer column detected; rows cannot be attributed to customers".to_string());
    }
    if mapping.amount.is_none() {
        warnings.push("No amount column detected; every row will fail validation".to_string());
    }
    if mapping.due_date.is_none() {
        warnings.push(
            "No due date column detected; overdue and on-time analytics will be unreliable"
                .to_string(),
        );
    }
    if mapping.paid_date.is_none() {
        warnings.push(
            "No paid date column detected; days-to-pay and DSO analytics will be unreliable"
                .to_string(),
        );
    }
    warnings
}

/// Convert raw rows into canonical invoice records.
///
/// A row is dropped (with an error) when it has no customer identity or
/// its amount does not parse; an unparseable invoice date keeps the row
/// but substitutes `today` and records a warning.
pub fn normalize_rows(
    rows: &[RawRow],
    mapping: &ColumnMapping,
    default_currency: &str,
    today: NaiveDate,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        dataset_warnings: dataset_warnings(mapping),
        ..Default::default()
    };

    for row in rows {
        let customer_id_raw = mapped_raw(row, mapping, CanonicalField::CustomerId);
        let customer_name_raw = mapped_raw(row, mapping, CanonicalField::CustomerName);
        if customer_id_raw.is_empty() && customer_name_raw.is_empty() {
            batch.errors.push(RowIssue {
                source_row: row.source_row,
                field: CanonicalField::CustomerId,
                message: "Missing customer identifier: no customer ID or name".to_string(),
            });
            continue;
        }

        let amount_raw = mapped_raw(row, mapping, CanonicalField::Amount);
        let amount = match parse_amount(&amount_raw) {
            Some(value) => value.abs(),
            None => {
                batch.errors.push(RowIssue {
                    source_row: row.source_row,
                    field: CanonicalField::Amount,
                    message: format!("Unparseable amount '{amount_raw}'"),
                });
                continue;
            }
        };

        let invoice_date_raw = mapped_raw(row, mapping, CanonicalField::InvoiceDate);
        let (invoice_date, invoice_date_parsed) = match parse_flexible_date(&invoice_date_raw) {
            Some(date) => (date, true),
            None => {
                batch.warnings.push(RowIssue {
                    source_row: row.source_row,
                    field: CanonicalField::InvoiceDate,
                    message: format!(
                        "Unparseable invoice date '{invoice_date_raw}'; defaulting to the analysis date"
                    ),
                });
                (today, false)
            }
        };

        let due_date = parse_flexible_date(&mapped_raw(row, mapping, CanonicalField::DueDate));
        let paid_date = parse_flexible_date(&mapped_raw(row, mapping, CanonicalField::PaidDate));

        // Many exports have no paid-amount column and only record payment
        // through a paid date; a mapped column stays the record of truth
        // even when its cell is empty.
        let amount_paid = if mapping.amount_paid.is_some() {
            parse_amount(&mapped_raw(row, mapping, CanonicalField::AmountPaid))
                .map(f64::abs)
                .unwrap_or(0.0)
        } else if paid_date.is_some() {
            amount
        } else {
            0.0
        };

        let currency_raw = mapped_raw(row, mapping, CanonicalField::Currency);
        let currency = if currency_raw.is_empty() {
            default_currency.to_string()
        } else {
            currency_raw.to_uppercase()
        };

        let status_text = mapped_raw(row, mapping, CanonicalField::Status);
        let status = resolve_status(&status_text, paid_date, amount, amount_paid, due_date, today);

        let days_to_pay = match (status, paid_date, invoice_date_parsed) {
            (InvoiceStatus::Paid, Some(paid), true) => Some((paid - invoice_date).num_days()),
            _ => None,
        };

        let days_overdue = match (status, due_date) {
            (InvoiceStatus::Paid | InvoiceStatus::Voided, _) => None,
            (_, Some(due)) if due < today => Some((today - due).num_days()),
            _ => None,
        };

        let invoice_number_raw = mapped_raw(row, mapping, CanonicalField::InvoiceId);
        let invoice_number = if invoice_number_raw.is_empty() {
            format!("INV-{}", row.source_row)
        } else {
            invoice_number_raw
        };

        let customer_id = if customer_id_raw.is_empty() {
            slugify(&customer_name_raw)
        } else {
            customer_id_raw.clone()
        };
        let customer_name = if customer_name_raw.is_empty() {
            customer_id_raw
        } else {
            customer_name_raw
        };

        batch.records.push(InvoiceRecord {
            id: format!("inv-{}", row.source_row),
            customer_id,
            customer_name,
            invoice_number,
            amount,
            amount_paid,
            currency,
            invoice_date,
            due_date,
            paid_date,
            status,
            days_to_pay,
            days_overdue,
            source_row: row.source_row,
        });
    }

    debug!(
        "Normalized {} rows into {} records ({} errors, {} warnings)",
        rows.len(),
        batch.records.len(),
        batch.errors.len(),
        batch.warnings.len()
    );
    batch
}
