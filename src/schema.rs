use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The canonical invoice fields a raw spreadsheet column can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    #[schemars(description = "The invoice's own identifier or number as issued by the billing system")]
    InvoiceId,

    #[schemars(description = "Stable customer identifier (account number, client code)")]
    CustomerId,

    #[schemars(description = "Customer display name; used as the identity fallback when no ID column exists")]
    CustomerName,

    #[schemars(description = "Invoice face value. Currency symbols, thousands separators and accounting-style parentheses are tolerated")]
    Amount,

    #[schemars(description = "Amount collected so far against the invoice")]
    AmountPaid,

    #[schemars(description = "Date the invoice was issued")]
    InvoiceDate,

    #[schemars(description = "Date payment falls due")]
    DueDate,

    #[schemars(description = "Date payment was received, when the export records one")]
    PaidDate,

    #[schemars(description = "Free-text payment status as exported (paid, overdue, disputed...)")]
    Status,

    #[schemars(description = "ISO currency code column")]
    Currency,

    #[schemars(description = "Line description or memo text")]
    Description,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 11] = [
        CanonicalField::InvoiceId,
        CanonicalField::CustomerId,
        CanonicalField::CustomerName,
        CanonicalField::Amount,
        CanonicalField::AmountPaid,
        CanonicalField::InvoiceDate,
        CanonicalField::DueDate,
        CanonicalField::PaidDate,
        CanonicalField::Status,
        CanonicalField::Currency,
        CanonicalField::Description,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::InvoiceId => "invoiceId",
            CanonicalField::CustomerId => "customerId",
            CanonicalField::CustomerName => "customerName",
            CanonicalField::Amount => "amount",
            CanonicalField::AmountPaid => "amountPaid",
            CanonicalField::InvoiceDate => "invoiceDate",
            CanonicalField::DueDate => "dueDate",
            CanonicalField::PaidDate => "paidDate",
            CanonicalField::Status => "status",
            CanonicalField::Currency => "currency",
            CanonicalField::Description => "description",
        }
    }
}

/// Which source header feeds each canonical field. At most one header per
/// field; a `None` means the field was not found in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMapping {
    pub invoice_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub amount: Option<String>,
    pub amount_paid: Option<String>,
    pub invoice_date: Option<String>,
    pub due_date: Option<String>,
    pub paid_date: Option<String>,
    pub status: Option<String>,
    pub currency: Option<String>,
    pub description: Option<String>,
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        match field {
            CanonicalField::InvoiceId => self.invoice_id.as_deref(),
            CanonicalField::CustomerId => self.customer_id.as_deref(),
            CanonicalField::CustomerName => self.customer_name.as_deref(),
            CanonicalField::Amount => self.amount.as_deref(),
            CanonicalField::AmountPaid => self.amount_paid.as_deref(),
            CanonicalField::InvoiceDate => self.invoice_date.as_deref(),
            CanonicalField::DueDate => self.due_date.as_deref(),
            CanonicalField::PaidDate => self.paid_date.as_deref(),
            CanonicalField::Status => self.status.as_deref(),
            CanonicalField::Currency => self.currency.as_deref(),
            CanonicalField::Description => self.description.as_deref(),
        }
    }

    pub fn set(&mut self, field: CanonicalField, header: String) {
        let slot = match field {
            CanonicalField::InvoiceId => &mut self.invoice_id,
            CanonicalField::CustomerId => &mut self.customer_id,
            CanonicalField::CustomerName => &mut self.customer_name,
            CanonicalField::Amount => &mut self.amount,
            CanonicalField::AmountPaid => &mut self.amount_paid,
            CanonicalField::InvoiceDate => &mut self.invoice_date,
            CanonicalField::DueDate => &mut self.due_date,
            CanonicalField::PaidDate => &mut self.paid_date,
            CanonicalField::Status => &mut self.status,
            CanonicalField::Currency => &mut self.currency,
            CanonicalField::Description => &mut self.description,
        };
        *slot = Some(header);
    }

    /// Headers claimed by any field, in canonical field order.
    pub fn mapped_headers(&self) -> Vec<&str> {
        CanonicalField::ALL
            .iter()
            .filter_map(|f| self.get(*f))
            .collect()
    }
}

/// A single raw cell as produced by a source reader. Workbook readers
/// convert native date cells to ISO text at read time, so downstream code
/// only ever sees text or numbers in practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(t) => t.trim().is_empty(),
            _ => false,
        }
    }

    /// The cell as the string the normalizer parses. Whole numbers drop
    /// their fractional part so "1042.0" round-trips as an invoice number.
    pub fn to_raw_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(t) => t.trim().to_string(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// One source row: ordered (header, cell) pairs plus its 1-based position
/// in the original file for error reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub source_row: usize,
    pub cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Paid,
    Pending,
    Overdue,
    Partial,
    Disputed,
    Voided,
}

impl InvoiceStatus {
    /// Pending, overdue and partial invoices carry open exposure.
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Pending | InvoiceStatus::Overdue | InvoiceStatus::Partial
        )
    }
}

/// Canonical invoice produced by normalization. Immutable once created;
/// every downstream component treats it as read-only input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvoiceRecord {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub invoice_number: String,
    pub amount: f64,
    pub amount_paid: f64,
    pub currency: String,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    /// Whole days from issue to payment. Only set when the invoice is paid
    /// and both dates parsed from the source.
    pub days_to_pay: Option<i64>,
    /// Whole days past due as of the analysis date. Only set on unpaid,
    /// unvoided invoices whose due date is in the past.
    pub days_overdue: Option<i64>,
    pub source_row: usize,
}

/// A row- or field-level problem found during normalization, tied back to
/// the 1-based source row it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RowIssue {
    pub source_row: usize,
    pub field: CanonicalField,
    pub message: String,
}

/// ARR and segment for one customer, supplied by the persistence
/// collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CustomerProfile {
    pub arr: f64,
    pub segment: Option<String>,
}
