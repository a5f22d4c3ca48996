use crate::schema::{InvoiceRecord, InvoiceStatus};
use crate::utils::quarter_key;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An on-time-rate move bigger than this many points flips the trend.
pub const TREND_RATE_DELTA: f64 = 10.0;
/// A days-to-pay move bigger than this many days flips the trend.
pub const TREND_DAYS_DELTA: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentTrend {
    Improving,
    Stable,
    Worsening,
}

/// Payment behavior summary for one (customer, calendar quarter) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuarterlyPaymentTrend {
    /// `YYYY-Qn` key derived from the invoice date.
    pub quarter: String,
    pub on_time_rate: f64,
    pub average_days_to_pay: f64,
    pub outstanding_total: f64,
    pub invoice_count: usize,
}

#[derive(Default)]
struct QuarterBucket {
    on_time: usize,
    dated_paid: usize,
    days_sum: i64,
    days_count: usize,
    outstanding: f64,
    invoices: usize,
}

/// Bucket one customer's invoices into calendar quarters, ascending by
/// quarter key. Voided invoices never represented real exposure and are
/// excluded from quarterly aggregation entirely.
pub fn quarterly_trends(invoices: &[&InvoiceRecord]) -> Vec<QuarterlyPaymentTrend> {
    let mut buckets: BTreeMap<String, QuarterBucket> = BTreeMap::new();

    for invoice in invoices {
        if invoice.status == InvoiceStatus::Voided {
            continue;
        }

        let bucket = buckets.entry(quarter_key(invoice.invoice_date)).or_default();
        bucket.invoices += 1;

        if invoice.status == InvoiceStatus::Paid {
            if let (Some(paid), Some(due)) = (invoice.paid_date, invoice.due_date) {
                bucket.dated_paid += 1;
                if paid <= due {
                    bucket.on_time += 1;
                }
            }
            if let Some(days) = invoice.days_to_pay {
                bucket.days_sum += days;
                bucket.days_count += 1;
            }
        } else {
            bucket.outstanding += invoice.amount - invoice.amount_paid;
        }
    }

    buckets
        .into_iter()
        .map(|(quarter, bucket)| QuarterlyPaymentTrend {
            quarter,
            on_time_rate: if bucket.dated_paid > 0 {
                bucket.on_time as f64 / bucket.dated_paid as f64 * 100.0
            } else {
                100.0
            },
            average_days_to_pay: if bucket.days_count > 0 {
                bucket.days_sum as f64 / bucket.days_count as f64
            } else {
                0.0
            },
            outstanding_total: bucket.outstanding,
            invoice_count: bucket.invoices,
        })
        .collect()
}

/// Classify a trajectory by comparing the two most recent quarters.
/// Fewer than two quarters of history is insufficient evidence either
/// way and reads as stable.
pub fn classify_trend(trends: &[QuarterlyPaymentTrend]) -> PaymentTrend {
    if trends.len() < 2 {
        return PaymentTrend::Stable;
    }

    let previous = &trends[trends.len() - 2];
    let current = &trends[trends.len() - 1];
    let rate_delta = current.on_time_rate - previous.on_time_rate;
    let days_delta = current.average_days_to_pay - previous.average_days_to_pay;

    if rate_delta > TREND_RATE_DELTA || days_delta < -TREND_DAYS_DELTA {
        PaymentTrend::Improving
    } else if rate_delta < -TREND_RATE_DELTA || days_delta > TREND_DAYS_DELTA {
        PaymentTrend::Worsening
    } else {
        PaymentTrend::Stable
    }
}
