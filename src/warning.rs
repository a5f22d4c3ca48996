use crate::metrics::CustomerPaymentMetrics;
use crate::schema::{InvoiceRecord, InvoiceStatus};
use crate::trend::PaymentTrend;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prior-quarter on-time rate that qualifies a customer as a "good payer".
pub const GOOD_PAYER_PRIOR_RATE: f64 = 80.0;
/// Current-quarter on-time rate below which a good payer's drop fires.
pub const REVERSAL_CURRENT_RATE: f64 = 70.0;
/// Minimum invoice history for the clean-streak check.
pub const MIN_INVOICES_FOR_STREAK: usize = 6;
/// How many most-recent invoices count as "recent" in the streak check.
pub const RECENT_WINDOW: usize = 3;
/// Minimum quarters of history for the slowdown check.
pub const MIN_QUARTERS_FOR_SLOWDOWN: usize = 3;
/// Days-to-pay must rise by more than this across three quarters to fire.
pub const SLOWDOWN_TOTAL_DAYS: f64 = 10.0;
/// Above this total rise the slowdown signal escalates to high severity.
pub const SLOWDOWN_SEVERE_DAYS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    High,
    Medium,
    Low,
}

impl WarningSeverity {
    fn rank(&self) -> u8 {
        match self {
            WarningSeverity::High => 0,
            WarningSeverity::Medium => 1,
            WarningSeverity::Low => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EarlyWarningKind {
    TrendReversal,
    FirstLatePayment,
    IncreasingDaysToPay,
}

/// A behavioral pattern change flagged before the customer crosses the
/// high-risk threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EarlyWarningSignal {
    pub customer_id: String,
    pub customer_name: String,
    pub kind: EarlyWarningKind,
    pub severity: WarningSeverity,
    pub message: String,
}

/// Scan low/medium-risk customers for pattern changes the current-state
/// risk score misses. Already-high-risk customers are surfaced through
/// the risk path instead, so no customer shows up in both lists.
pub fn detect_early_warnings(
    customers: &[CustomerPaymentMetrics],
    records: &[InvoiceRecord],
) -> Vec<EarlyWarningSignal> {
    let mut by_customer: BTreeMap<&str, Vec<&InvoiceRecord>> = BTreeMap::new();
    for record in records {
        by_customer
            .entry(record.customer_id.as_str())
            .or_default()
            .push(record);
    }

    let mut signals = Vec::new();
    for customer in customers {
        if customer.risk_level.is_high_risk() {
            continue;
        }

        if let Some(signal) = trend_reversal(customer) {
            signals.push(signal);
        }

        if let Some(invoices) = by_customer.get(customer.customer_id.as_str()) {
            if let Some(signal) = first_late_payment(customer, invoices) {
                signals.push(signal);
            }
        }

        if let Some(signal) = increasing_days_to_pay(customer) {
            signals.push(signal);
        }
    }

    signals.sort_by_key(|s| s.severity.rank());
    debug!("Detected {} early-warning signals", signals.len());
    signals
}

/// A previously good payer (>=80% on time last quarter) dropping below
/// 70% this quarter. Sharper and state-specific compared to the generic
/// worsening classification, and kept independent of it.
fn trend_reversal(customer: &CustomerPaymentMetrics) -> Option<EarlyWarningSignal> {
    if customer.trend != PaymentTrend::Worsening || customer.trend_data.len() < 2 {
        return None;
    }

    let previous = &customer.trend_data[customer.trend_data.len() - 2];
    let current = &customer.trend_data[customer.trend_data.len() - 1];
    if previous.on_time_rate < GOOD_PAYER_PRIOR_RATE
        || current.on_time_rate >= REVERSAL_CURRENT_RATE
    {
        return None;
    }

    Some(EarlyWarningSignal {
        customer_id: customer.customer_id.clone(),
        customer_name: customer.customer_name.clone(),
        kind: EarlyWarningKind::TrendReversal,
        severity: WarningSeverity::High,
        message: format!(
            "Reliable payer dropped from {:.1}% to {:.1}% on-time quarter over quarter",
            previous.on_time_rate, current.on_time_rate
        ),
    })
}

fn is_late_paid(invoice: &InvoiceRecord) -> bool {
    invoice.status == InvoiceStatus::Paid
        && matches!(
            (invoice.paid_date, invoice.due_date),
            (Some(paid), Some(due)) if paid > due
        )
}

/// First late payment after a spotless history: needs six invoices, a
/// clean historical set, and at least one late payment among the most
/// recent three.
fn first_late_payment(
    customer: &CustomerPaymentMetrics,
    invoices: &[&InvoiceRecord],
) -> Option<EarlyWarningSignal> {
    if invoices.len() < MIN_INVOICES_FOR_STREAK {
        return None;
    }

    let mut ordered: Vec<&InvoiceRecord> = invoices.to_vec();
    ordered.sort_by_key(|i| (i.invoice_date, i.source_row));

    let split = ordered.len() - RECENT_WINDOW;
    let historical_clean = ordered[..split].iter().all(|i| !is_late_paid(i));
    let recent_late = ordered[split..].iter().any(|i| is_late_paid(i));
    if !historical_clean || !recent_late {
        return None;
    }

    Some(EarlyWarningSignal {
        customer_id: customer.customer_id.clone(),
        customer_name: customer.customer_name.clone(),
        kind: EarlyWarningKind::FirstLatePayment,
        severity: WarningSeverity::Medium,
        message: format!(
            "First late payment after {} consecutively clean invoices",
            split
        ),
    })
}

/// Average days-to-pay strictly increasing across the three most recent
/// quarters with a material total rise.
fn increasing_days_to_pay(customer: &CustomerPaymentMetrics) -> Option<EarlyWarningSignal> {
    if customer.trend_data.len() < MIN_QUARTERS_FOR_SLOWDOWN {
        return None;
    }

    let recent = &customer.trend_data[customer.trend_data.len() - 3..];
    let (first, middle, last) = (
        recent[0].average_days_to_pay,
        recent[1].average_days_to_pay,
        recent[2].average_days_to_pay,
    );
    if !(first < middle && middle < last) {
        return None;
    }

    let total_increase = last - first;
    if total_increase <= SLOWDOWN_TOTAL_DAYS {
        return None;
    }

    let severity = if total_increase > SLOWDOWN_SEVERE_DAYS {
        WarningSeverity::High
    } else {
        WarningSeverity::Medium
    };

    Some(EarlyWarningSignal {
        customer_id: customer.customer_id.clone(),
        customer_name: customer.customer_name.clone(),
        kind: EarlyWarningKind::IncreasingDaysToPay,
        severity,
        message: format!(
            "Average days to pay climbed from {:.0} to {:.0} over three quarters",
            first, last
        ),
    })
}
