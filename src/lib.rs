//! # Invoice Analytics
//!
//! A library for ingesting messy invoice spreadsheets and computing
//! customer payment-risk analytics.
//!
//! ## Core Concepts
//!
//! - **Ingestion**: raw CSV/workbook bytes are read into `(headers, rows)`,
//!   a column mapping is inferred (or confirmed by the caller), and rows are
//!   normalized into canonical [`InvoiceRecord`]s with row-level errors and
//!   warnings instead of hard failures.
//! - **Metrics**: records are aggregated into per-customer and portfolio
//!   metrics (on-time rate, DSO, outstanding balance, dispute rate).
//! - **Trend & Risk**: each customer's invoices are bucketed into calendar
//!   quarters, the trajectory is classified, and a weighted risk score with
//!   explanatory signals is computed from policy constants.
//! - **Early Warnings**: customers that are not yet high risk are scanned
//!   for pattern changes (first late payment, rising days-to-pay, a good
//!   payer suddenly dropping) the current-state score would miss.
//!
//! ## Example
//!
//! ```rust,ignore
//! use invoice_analytics::*;
//!
//! let parsed = parse_invoice_file(&bytes, "invoices.csv", &ParseOptions::default())?;
//! let analyzer = PaymentAnalyzer::new(NoProfiles);
//! let analysis = analyzer.analyze(&parsed.records);
//!
//! for account in &analysis.high_risk_accounts {
//!     println!("{}: {} ({})", account.customer_name, account.risk_score, account.risk_level);
//! }
//! ```

pub mod error;
pub mod ingestion;
pub mod mapper;
pub mod metrics;
pub mod normalizer;
pub mod reader;
pub mod report;
pub mod risk;
pub mod schema;
pub mod trend;
pub mod utils;
pub mod warning;

pub use error::{InvoiceAnalyticsError, Result};
pub use ingestion::{parse_invoice_file, ParseOptions, ParsedInvoiceData, PREVIEW_ROWS};
pub use mapper::{
    resolve_column_mapping, suggest_column_mappings, ColumnSuggestion, MappingResolution,
};
pub use metrics::{
    CustomerPaymentMetrics, CustomerProfileSource, MetricsEngine, NoProfiles, PortfolioOverview,
    SegmentBreakdown,
};
pub use normalizer::{normalize_rows, parse_amount, parse_flexible_date, NormalizedBatch};
pub use reader::{read_delimited, read_table, read_workbook, TableData};
pub use report::{assemble_analysis, HighRiskAccount, PaymentImprover, PaymentPatternAnalysis};
pub use risk::{score_customer_risk, RiskAssessment, RiskInput, RiskLevel};
pub use schema::*;
pub use trend::{classify_trend, quarterly_trends, PaymentTrend, QuarterlyPaymentTrend};
pub use warning::{
    detect_early_warnings, EarlyWarningKind, EarlyWarningSignal, WarningSeverity,
};

use chrono::{Local, NaiveDate};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Runs the full payment-pattern analysis over a normalized record set.
///
/// The analysis date is captured once per run so date-diff computations
/// across many customers see a single consistent "today", and the profile
/// collaborator is consulted exactly once before any scoring starts.
pub struct PaymentAnalyzer<S> {
    profile_source: S,
    today: Option<NaiveDate>,
}

impl<S: CustomerProfileSource> PaymentAnalyzer<S> {
    pub fn new(profile_source: S) -> Self {
        Self {
            profile_source,
            today: None,
        }
    }

    /// Pin the analysis date, for reproducible runs and tests.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Analyze a batch of records into the full payment-pattern report.
    ///
    /// Never fails: a profile lookup error degrades to invoice-derived
    /// ARR estimates, and every metric has a defined default for missing
    /// inputs.
    pub fn analyze(&self, records: &[InvoiceRecord]) -> PaymentPatternAnalysis {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());

        info!(
            "Analyzing payment patterns for {} invoice records (as of {})",
            records.len(),
            today
        );

        let mut customer_ids: Vec<String> =
            records.iter().map(|r| r.customer_id.clone()).collect();
        customer_ids.sort();
        customer_ids.dedup();

        let profiles = match self.profile_source.profiles(&customer_ids) {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!("Profile lookup failed, falling back to ARR estimates: {e}");
                HashMap::new()
            }
        };
        debug!(
            "Resolved {} profiles for {} customers",
            profiles.len(),
            customer_ids.len()
        );

        let engine = MetricsEngine::new(today);
        let customers = engine.customer_metrics(records, &profiles);
        let portfolio = engine.portfolio_overview(records, &customers);
        let early_warnings = detect_early_warnings(&customers, records);

        assemble_analysis(portfolio, customers, early_warnings)
    }
}

/// Convenience wrapper over [`PaymentAnalyzer`] for one-off runs.
pub fn analyze_payment_patterns<S: CustomerProfileSource>(
    records: &[InvoiceRecord],
    profile_source: S,
) -> PaymentPatternAnalysis {
    PaymentAnalyzer::new(profile_source).analyze(records)
}
