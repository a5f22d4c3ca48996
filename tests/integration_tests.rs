use anyhow::Result;
use chrono::NaiveDate;
use invoice_analytics::*;
use std::collections::HashMap;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn analysis_date() -> NaiveDate {
    date(2024, 7, 1)
}

fn options() -> ParseOptions {
    ParseOptions {
        today: Some(analysis_date()),
        ..Default::default()
    }
}

fn profile(arr: f64, segment: &str) -> CustomerProfile {
    CustomerProfile {
        arr,
        segment: Some(segment.to_string()),
    }
}

/// One CSV line for a paid invoice with `paid_days` between issue and
/// payment, against net-30 terms.
fn paid_line(customer: &str, amount: f64, issued: NaiveDate, paid_days: i64) -> String {
    let due = issued + chrono::Duration::days(30);
    let paid = issued + chrono::Duration::days(paid_days);
    format!(
        "{customer},{amount},{issued},{due},{paid},paid\n",
        issued = issued.format("%Y-%m-%d"),
        due = due.format("%Y-%m-%d"),
        paid = paid.format("%Y-%m-%d"),
    )
}

fn open_line(customer: &str, amount: f64, issued: NaiveDate) -> String {
    let due = issued + chrono::Duration::days(30);
    format!(
        "{customer},{amount},{issued},{due},,\n",
        issued = issued.format("%Y-%m-%d"),
        due = due.format("%Y-%m-%d"),
    )
}

const CSV_HEADER: &str = "Customer Name,Amount,Invoice Date,Due Date,Paid Date,Status\n";

#[test]
fn test_messy_csv_ingestion() -> Result<()> {
    let csv = "\
Invoice Number,Customer Name,Amount,Invoice Date,Due Date,Paid Date,Status,Currency
INV-001,\"Acme, Inc.\",\"$12,500.00\",01/15/2024,02/14/2024,02/10/2024,Paid,usd
INV-002,Acme Inc,(750),15/02/2024,16/03/2024,,,eur
INV-003,Globex,not-a-number,2024-03-01,2024-03-31,,,
INV-004,,500,2024-03-05,2024-04-04,,,
INV-005,Initech,2000,sometime,2024-05-10,,pending,
";
    let parsed = parse_invoice_file(csv.as_bytes(), "upload.csv", &options())?;

    // Two rows rejected: bad amount, missing customer.
    assert_eq!(parsed.errors.len(), 2);
    assert_eq!(parsed.records.len(), 3);

    let first = &parsed.records[0];
    assert_eq!(first.customer_name, "Acme, Inc.");
    assert_eq!(first.amount, 12_500.0);
    assert_eq!(first.currency, "USD");
    assert_eq!(first.invoice_date, date(2024, 1, 15));
    assert_eq!(first.status, InvoiceStatus::Paid);
    assert_eq!(first.days_to_pay, Some(26));

    // Parenthesized amount comes back as its face value, day-first date
    // disambiguated by range.
    let second = &parsed.records[1];
    assert_eq!(second.amount, 750.0);
    assert_eq!(second.invoice_date, date(2024, 2, 15));
    assert_eq!(second.status, InvoiceStatus::Overdue);
    assert_eq!(second.currency, "EUR");

    // Unparseable invoice date keeps the row with a warning and the
    // analysis date substituted.
    let third = &parsed.records[2];
    assert_eq!(third.customer_name, "Initech");
    assert_eq!(third.invoice_date, analysis_date());
    assert_eq!(parsed.warnings.len(), 1);
    assert_eq!(parsed.warnings[0].field, CanonicalField::InvoiceDate);

    Ok(())
}

#[test]
fn test_semicolon_export_with_bom() -> Result<()> {
    let csv = "\u{feff}Customer;Amount;Invoice Date\nAcme;1000;2024-01-05\nGlobex;2500;2024-01-10\n";
    let parsed = parse_invoice_file(csv.as_bytes(), "export.csv", &options())?;

    assert_eq!(parsed.records.len(), 2);
    assert_eq!(parsed.mapping.customer_name.as_deref(), Some("Customer"));
    assert_eq!(parsed.records[1].amount, 2500.0);
    Ok(())
}

#[test]
fn test_reference_scenario_single_customer() -> Result<()> {
    // Eight invoices: six paid on time, one 10 days late, one 40 days
    // late, no disputes, nothing outstanding.
    let mut csv = String::from(CSV_HEADER);
    for month in 1..=3 {
        csv.push_str(&paid_line("Acme", 1_000.0, date(2024, month, 1), 25));
    }
    csv.push_str(&paid_line("Acme", 1_000.0, date(2024, 3, 15), 70));
    for month in 4..=6 {
        csv.push_str(&paid_line("Acme", 1_000.0, date(2024, month, 1), 25));
    }
    csv.push_str(&paid_line("Acme", 1_000.0, date(2024, 6, 15), 40));

    let parsed = parse_invoice_file(csv.as_bytes(), "acme.csv", &options())?;
    assert_eq!(parsed.records.len(), 8);

    let profiles: HashMap<String, CustomerProfile> =
        [("acme".to_string(), profile(50_000.0, "mid-market"))].into();
    let analyzer = PaymentAnalyzer::new(profiles).with_today(analysis_date());
    let analysis = analyzer.analyze(&parsed.records);

    assert_eq!(analysis.customers.len(), 1);
    let customer = &analysis.customers[0];

    assert_eq!(customer.on_time_rate, 75.0);
    // (6 * 25 + 70 + 40) / 8
    assert!((customer.average_days_to_pay - 32.5).abs() < 1e-9);
    assert_eq!(customer.dispute_rate, 0.0);
    assert_eq!(customer.outstanding_balance, 0.0);
    assert_eq!(customer.arr, 50_000.0);

    // Only the on-time band contributes: 75% sits in the 65..80 band.
    assert_eq!(customer.risk_score, 10);
    assert_eq!(customer.risk_level, RiskLevel::Low);
    assert_eq!(customer.risk_signals.len(), 1);
    assert!(customer.risk_signals[0].contains("75.0%"));

    Ok(())
}

#[test]
fn test_portfolio_dso_and_totals() -> Result<()> {
    let mut csv = String::from(CSV_HEADER);
    // 90,000 invoiced and paid, 10,000 still open.
    for month in 1..=6 {
        csv.push_str(&paid_line("Acme", 15_000.0, date(2024, month, 1), 20));
    }
    csv.push_str(&open_line("Acme", 10_000.0, date(2024, 6, 20)));

    let parsed = parse_invoice_file(csv.as_bytes(), "acme.csv", &options())?;
    let analysis = analyze_payment_patterns(&parsed.records, NoProfiles);

    let customer = &analysis.customers[0];
    assert_eq!(customer.total_invoiced, 100_000.0);
    assert_eq!(customer.outstanding_balance, 10_000.0);
    // round(10000 / 100000 * 365)
    assert_eq!(customer.dso, 37);

    assert_eq!(analysis.portfolio.total_outstanding, 10_000.0);
    assert_eq!(analysis.portfolio.period_start, Some(date(2024, 1, 1)));
    assert_eq!(analysis.portfolio.period_end, Some(date(2024, 6, 20)));
    Ok(())
}

#[test]
fn test_on_time_default_for_unpaid_history() -> Result<()> {
    let mut csv = String::from(CSV_HEADER);
    csv.push_str(&open_line("Fresh Co", 5_000.0, date(2024, 6, 10)));
    csv.push_str(&open_line("Fresh Co", 5_000.0, date(2024, 6, 20)));

    let parsed = parse_invoice_file(csv.as_bytes(), "fresh.csv", &options())?;
    let analysis = analyze_payment_patterns(&parsed.records, NoProfiles);

    let customer = &analysis.customers[0];
    // Absence of late evidence is not evidence of lateness.
    assert_eq!(customer.on_time_rate, 100.0);
    assert!(customer
        .risk_signals
        .iter()
        .all(|s| !s.contains("On-time")));
    Ok(())
}

#[test]
fn test_critical_risk_account_surfaced() -> Result<()> {
    let mut csv = String::from(CSV_HEADER);
    // Every invoice paid very late, plus heavy open exposure.
    for month in 1..=4 {
        csv.push_str(&paid_line("Slowpay", 2_000.0, date(2024, month, 1), 90));
    }
    csv.push_str(&open_line("Slowpay", 9_000.0, date(2024, 5, 1)));

    let parsed = parse_invoice_file(csv.as_bytes(), "slow.csv", &options())?;
    let profiles: HashMap<String, CustomerProfile> =
        [("slowpay".to_string(), profile(20_000.0, "smb"))].into();
    let analysis = PaymentAnalyzer::new(profiles)
        .with_today(analysis_date())
        .analyze(&parsed.records);

    let customer = &analysis.customers[0];
    // 0% on-time (+40), 90 days to pay (+30), 45% of ARR outstanding (+25).
    assert_eq!(customer.risk_score, 95);
    assert_eq!(customer.risk_level, RiskLevel::Critical);

    assert_eq!(analysis.high_risk_accounts.len(), 1);
    assert_eq!(analysis.high_risk_accounts[0].customer_id, "slowpay");
    assert!(analysis
        .action_items
        .iter()
        .any(|item| item.contains("Slowpay")));
    Ok(())
}

#[test]
fn test_trend_worsening_classification() -> Result<()> {
    let mut csv = String::from(CSV_HEADER);
    // Q1: all on time. Q2: all late.
    for month in 1..=3 {
        csv.push_str(&paid_line("Fading", 1_000.0, date(2024, month, 1), 20));
        csv.push_str(&paid_line("Fading", 1_000.0, date(2024, month, 15), 22));
    }
    for month in 4..=6 {
        csv.push_str(&paid_line("Fading", 1_000.0, date(2024, month, 1), 55));
    }

    let parsed = parse_invoice_file(csv.as_bytes(), "fading.csv", &options())?;
    let analysis = analyze_payment_patterns(&parsed.records, NoProfiles);

    let customer = &analysis.customers[0];
    assert_eq!(customer.trend, PaymentTrend::Worsening);
    assert_eq!(customer.trend_data.len(), 2);
    assert_eq!(customer.trend_data[0].quarter, "2024-Q1");
    assert_eq!(customer.trend_data[1].quarter, "2024-Q2");
    assert_eq!(customer.trend_data[0].on_time_rate, 100.0);
    assert_eq!(customer.trend_data[1].on_time_rate, 0.0);
    Ok(())
}

#[test]
fn test_early_warning_trend_reversal() -> Result<()> {
    let mut csv = String::from(CSV_HEADER);
    // A good payer (Q1 fully on time) dropping below 70% in Q2, but not
    // enough overall damage to reach high risk.
    for month in 1..=3 {
        csv.push_str(&paid_line("Watchful", 1_000.0, date(2024, month, 1), 20));
    }
    csv.push_str(&paid_line("Watchful", 1_000.0, date(2024, 4, 1), 20));
    csv.push_str(&paid_line("Watchful", 1_000.0, date(2024, 5, 1), 40));
    csv.push_str(&paid_line("Watchful", 1_000.0, date(2024, 6, 1), 42));

    let parsed = parse_invoice_file(csv.as_bytes(), "watchful.csv", &options())?;
    let analysis = analyze_payment_patterns(&parsed.records, NoProfiles);

    let customer = &analysis.customers[0];
    assert!(!customer.risk_level.is_high_risk());

    let reversal: Vec<_> = analysis
        .early_warnings
        .iter()
        .filter(|w| w.kind == EarlyWarningKind::TrendReversal)
        .collect();
    assert_eq!(reversal.len(), 1);
    assert_eq!(reversal[0].severity, WarningSeverity::High);
    assert_eq!(reversal[0].customer_id, "watchful");
    Ok(())
}

#[test]
fn test_early_warning_first_late_payment() -> Result<()> {
    let mut csv = String::from(CSV_HEADER);
    for month in 1..=5 {
        csv.push_str(&paid_line("Steady", 1_000.0, date(2024, month, 1), 25));
    }
    csv.push_str(&paid_line("Steady", 1_000.0, date(2024, 6, 1), 38));

    let parsed = parse_invoice_file(csv.as_bytes(), "steady.csv", &options())?;
    let analysis = analyze_payment_patterns(&parsed.records, NoProfiles);

    let streak: Vec<_> = analysis
        .early_warnings
        .iter()
        .filter(|w| w.kind == EarlyWarningKind::FirstLatePayment)
        .collect();
    assert_eq!(streak.len(), 1);
    assert_eq!(streak[0].severity, WarningSeverity::Medium);
    Ok(())
}

#[test]
fn test_high_risk_and_early_warnings_never_overlap() -> Result<()> {
    let mut csv = String::from(CSV_HEADER);
    // Chronically late, high risk.
    for month in 1..=4 {
        csv.push_str(&paid_line("Chronic", 3_000.0, date(2024, month, 1), 95));
    }
    // Slipping but still low/medium risk.
    for month in 1..=5 {
        csv.push_str(&paid_line("Slipping", 1_000.0, date(2024, month, 1), 20));
    }
    csv.push_str(&paid_line("Slipping", 1_000.0, date(2024, 6, 1), 45));

    let parsed = parse_invoice_file(csv.as_bytes(), "mixed.csv", &options())?;
    let analysis = analyze_payment_patterns(&parsed.records, NoProfiles);

    assert!(!analysis.high_risk_accounts.is_empty());
    assert!(!analysis.early_warnings.is_empty());
    for warning in &analysis.early_warnings {
        assert!(analysis
            .high_risk_accounts
            .iter()
            .all(|account| account.customer_id != warning.customer_id));
    }
    Ok(())
}

#[test]
fn test_customers_ranked_by_risk() -> Result<()> {
    let mut csv = String::from(CSV_HEADER);
    for month in 1..=3 {
        csv.push_str(&paid_line("Healthy", 1_000.0, date(2024, month, 1), 15));
        csv.push_str(&paid_line("Sluggish", 1_000.0, date(2024, month, 1), 50));
        csv.push_str(&paid_line("Delinquent", 1_000.0, date(2024, month, 1), 95));
    }

    let parsed = parse_invoice_file(csv.as_bytes(), "ranked.csv", &options())?;
    let analysis = analyze_payment_patterns(&parsed.records, NoProfiles);

    let order: Vec<&str> = analysis
        .customers
        .iter()
        .map(|c| c.customer_id.as_str())
        .collect();
    assert_eq!(order, vec!["delinquent", "sluggish", "healthy"]);

    let scores: Vec<u32> = analysis.customers.iter().map(|c| c.risk_score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    Ok(())
}

#[test]
fn test_segment_rollup_with_arr_at_risk() -> Result<()> {
    let mut csv = String::from(CSV_HEADER);
    for month in 1..=4 {
        csv.push_str(&paid_line("Solid", 2_000.0, date(2024, month, 1), 20));
    }
    // One on-time payment out of four: 25% on-time, below the 70% bar.
    csv.push_str(&paid_line("Shaky", 2_000.0, date(2024, 1, 1), 20));
    for month in 2..=4 {
        csv.push_str(&paid_line("Shaky", 2_000.0, date(2024, month, 1), 60));
    }

    let parsed = parse_invoice_file(csv.as_bytes(), "segments.csv", &options())?;
    let profiles: HashMap<String, CustomerProfile> = [
        ("solid".to_string(), profile(80_000.0, "enterprise")),
        ("shaky".to_string(), profile(30_000.0, "enterprise")),
    ]
    .into();
    let analysis = PaymentAnalyzer::new(profiles)
        .with_today(analysis_date())
        .analyze(&parsed.records);

    assert_eq!(analysis.portfolio.segments.len(), 1);
    let segment = &analysis.portfolio.segments[0];
    assert_eq!(segment.segment, "enterprise");
    assert_eq!(segment.customer_count, 2);
    assert_eq!(segment.total_arr, 110_000.0);
    assert_eq!(segment.arr_at_risk, 30_000.0);
    Ok(())
}

#[test]
fn test_disputed_and_voided_partitions() -> Result<()> {
    let csv = "\
Customer Name,Amount,Invoice Date,Due Date,Paid Date,Status
Acme,1000,2024-01-05,2024-02-04,2024-02-01,paid
Acme,2000,2024-02-05,2024-03-06,,disputed
Acme,3000,2024-03-05,2024-04-04,,void
Acme,4000,2024-04-05,2024-05-05,,
";
    let parsed = parse_invoice_file(csv.as_bytes(), "parts.csv", &options())?;
    let analysis = analyze_payment_patterns(&parsed.records, NoProfiles);

    let customer = &analysis.customers[0];
    assert_eq!(customer.total_invoices, 4);
    assert_eq!(customer.paid_invoices, 1);
    assert_eq!(customer.disputed_invoices, 1);
    assert_eq!(customer.outstanding_invoices, 1);
    // Voided invoices are excluded from revenue and quarterly buckets.
    assert_eq!(customer.total_invoiced, 7_000.0);
    assert_eq!(customer.dispute_rate, 25.0);
    assert_eq!(
        customer
            .trend_data
            .iter()
            .map(|q| q.invoice_count)
            .sum::<usize>(),
        3
    );
    Ok(())
}

#[test]
fn test_full_run_is_idempotent() -> Result<()> {
    let mut csv = String::from(CSV_HEADER);
    for month in 1..=6 {
        csv.push_str(&paid_line("Acme", 1_500.0, date(2024, month, 1), 28));
        csv.push_str(&paid_line("Globex", 900.0, date(2024, month, 3), 45));
    }
    csv.push_str(&open_line("Globex", 4_000.0, date(2024, 6, 10)));

    let parsed = parse_invoice_file(csv.as_bytes(), "batch.csv", &options())?;
    let analyzer = PaymentAnalyzer::new(NoProfiles).with_today(analysis_date());

    let first = serde_json::to_string(&analyzer.analyze(&parsed.records))?;
    let second = serde_json::to_string(&analyzer.analyze(&parsed.records))?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_unsupported_file_type_is_an_error() {
    let result = parse_invoice_file(b"whatever", "notes.pdf", &options());
    assert!(matches!(
        result,
        Err(InvoiceAnalyticsError::UnsupportedFile(_))
    ));
}
