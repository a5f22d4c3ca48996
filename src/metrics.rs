use crate::error::Result;
use crate::risk::{score_customer_risk, RiskInput, RiskLevel};
use crate::schema::{CustomerProfile, InvoiceRecord, InvoiceStatus};
use crate::trend::{classify_trend, quarterly_trends, PaymentTrend, QuarterlyPaymentTrend};
use crate::utils::month_span;
use chrono::NaiveDate;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-customer DSO always annualizes over a full year; the portfolio
/// figure uses the observed invoice date range instead.
pub const DSO_ANNUALIZATION_DAYS: f64 = 365.0;
/// A customer whose historical on-time rate sits below this contributes
/// their ARR to the segment's "ARR at risk".
pub const AT_RISK_ON_TIME_RATE: f64 = 70.0;

/// Persistence collaborator supplying ARR/segment per customer. A failed
/// lookup degrades to ARR estimation rather than aborting the run.
pub trait CustomerProfileSource {
    fn profiles(&self, customer_ids: &[String]) -> Result<HashMap<String, CustomerProfile>>;
}

/// A plain map works as a static profile source.
impl CustomerProfileSource for HashMap<String, CustomerProfile> {
    fn profiles(&self, customer_ids: &[String]) -> Result<HashMap<String, CustomerProfile>> {
        Ok(customer_ids
            .iter()
            .filter_map(|id| self.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}

/// Source for runs with no persistence layer attached; every customer
/// falls back to the invoice-derived ARR estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProfiles;

impl CustomerProfileSource for NoProfiles {
    fn profiles(&self, _customer_ids: &[String]) -> Result<HashMap<String, CustomerProfile>> {
        Ok(HashMap::new())
    }
}

/// Full derived picture for one customer, recomputed from scratch on
/// every analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CustomerPaymentMetrics {
    pub customer_id: String,
    pub customer_name: String,
    pub total_invoices: usize,
    pub paid_invoices: usize,
    pub outstanding_invoices: usize,
    pub disputed_invoices: usize,
    pub on_time_rate: f64,
    pub average_days_to_pay: f64,
    pub dso: i64,
    pub outstanding_balance: f64,
    pub total_invoiced: f64,
    pub dispute_rate: f64,
    pub arr: f64,
    /// True when no profile was available and ARR was estimated from the
    /// invoice data itself.
    pub arr_estimated: bool,
    pub segment: Option<String>,
    pub trend: PaymentTrend,
    pub trend_data: Vec<QuarterlyPaymentTrend>,
    pub risk_level: RiskLevel,
    pub risk_score: u32,
    pub risk_signals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentBreakdown {
    pub segment: String,
    pub customer_count: usize,
    pub total_arr: f64,
    /// Sum of ARR across customers in the segment whose historical
    /// on-time rate is below `AT_RISK_ON_TIME_RATE`.
    pub arr_at_risk: f64,
    pub outstanding_balance: f64,
    pub average_on_time_rate: f64,
    pub dso: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PortfolioOverview {
    pub customers_analyzed: usize,
    pub total_invoices: usize,
    pub total_invoiced: f64,
    pub total_outstanding: f64,
    pub overall_on_time_rate: f64,
    pub portfolio_dso: i64,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub segments: Vec<SegmentBreakdown>,
}

/// Aggregates normalized records into customer and portfolio metrics.
/// Holds the analysis date so one run sees a single consistent "today".
pub struct MetricsEngine {
    today: NaiveDate,
}

struct OnTimeTally {
    on_time: usize,
    dated_paid: usize,
}

fn on_time_tally<'a, I>(records: I) -> OnTimeTally
where
    I: IntoIterator<Item = &'a InvoiceRecord>,
{
    let mut tally = OnTimeTally {
        on_time: 0,
        dated_paid: 0,
    };
    for record in records {
        if record.status != InvoiceStatus::Paid {
            continue;
        }
        if let (Some(paid), Some(due)) = (record.paid_date, record.due_date) {
            tally.dated_paid += 1;
            if paid <= due {
                tally.on_time += 1;
            }
        }
    }
    tally
}

impl OnTimeTally {
    /// No dated paid invoices means no evidence of lateness, which reads
    /// as fully on time rather than 0%.
    fn rate(&self) -> f64 {
        if self.dated_paid > 0 {
            self.on_time as f64 / self.dated_paid as f64 * 100.0
        } else {
            100.0
        }
    }
}

impl MetricsEngine {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Compute metrics for every customer in the batch, ordered by risk
    /// score descending (ties keep customer-id order).
    pub fn customer_metrics(
        &self,
        records: &[InvoiceRecord],
        profiles: &HashMap<String, CustomerProfile>,
    ) -> Vec<CustomerPaymentMetrics> {
        let mut by_customer: BTreeMap<&str, Vec<&InvoiceRecord>> = BTreeMap::new();
        for record in records {
            by_customer
                .entry(record.customer_id.as_str())
                .or_default()
                .push(record);
        }

        let mut customers: Vec<CustomerPaymentMetrics> = by_customer
            .into_iter()
            .map(|(customer_id, invoices)| {
                self.single_customer(customer_id, &invoices, profiles.get(customer_id))
            })
            .collect();

        customers.sort_by(|a, b| b.risk_score.cmp(&a.risk_score));
        debug!("Computed metrics for {} customers", customers.len());
        customers
    }

    fn single_customer(
        &self,
        customer_id: &str,
        invoices: &[&InvoiceRecord],
        profile: Option<&CustomerProfile>,
    ) -> CustomerPaymentMetrics {
        let total_invoices = invoices.len();
        let paid_invoices = invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Paid)
            .count();
        let disputed_invoices = invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Disputed)
            .count();
        let outstanding: Vec<&&InvoiceRecord> = invoices
            .iter()
            .filter(|i| i.status.is_outstanding())
            .collect();

        let tally = on_time_tally(invoices.iter().copied());
        let on_time_rate = tally.rate();

        let pay_days: Vec<i64> = invoices.iter().filter_map(|i| i.days_to_pay).collect();
        let average_days_to_pay = if pay_days.is_empty() {
            0.0
        } else {
            pay_days.iter().sum::<i64>() as f64 / pay_days.len() as f64
        };

        let outstanding_balance: f64 = outstanding
            .iter()
            .map(|i| i.amount - i.amount_paid)
            .sum();
        let total_invoiced: f64 = invoices
            .iter()
            .filter(|i| i.status != InvoiceStatus::Voided)
            .map(|i| i.amount)
            .sum();

        let dso = if total_invoiced > 0.0 {
            (outstanding_balance / total_invoiced * DSO_ANNUALIZATION_DAYS).round() as i64
        } else {
            0
        };

        let dispute_rate = if total_invoices > 0 {
            disputed_invoices as f64 / total_invoices as f64 * 100.0
        } else {
            0.0
        };

        let (arr, arr_estimated) = match profile {
            Some(p) if p.arr > 0.0 => (p.arr, false),
            _ => (estimate_arr(invoices, total_invoiced), true),
        };
        let segment = profile.and_then(|p| p.segment.clone());

        let trend_data = quarterly_trends(invoices);
        let trend = classify_trend(&trend_data);

        let assessment = score_customer_risk(&RiskInput {
            on_time_rate,
            average_days_to_pay,
            outstanding_balance,
            arr,
            trend,
            dispute_rate,
        });

        CustomerPaymentMetrics {
            customer_id: customer_id.to_string(),
            customer_name: invoices
                .first()
                .map(|i| i.customer_name.clone())
                .unwrap_or_default(),
            total_invoices,
            paid_invoices,
            outstanding_invoices: outstanding.len(),
            disputed_invoices,
            on_time_rate,
            average_days_to_pay,
            dso,
            outstanding_balance,
            total_invoiced,
            dispute_rate,
            arr,
            arr_estimated,
            segment,
            trend,
            trend_data,
            risk_level: assessment.level,
            risk_score: assessment.score,
            risk_signals: assessment.signals,
        }
    }

    /// Portfolio-wide rollup. DSO here uses the observed invoice date
    /// range as the period, not a fixed year.
    pub fn portfolio_overview(
        &self,
        records: &[InvoiceRecord],
        customers: &[CustomerPaymentMetrics],
    ) -> PortfolioOverview {
        let total_invoiced: f64 = records
            .iter()
            .filter(|r| r.status != InvoiceStatus::Voided)
            .map(|r| r.amount)
            .sum();
        let total_outstanding: f64 = records
            .iter()
            .filter(|r| r.status.is_outstanding())
            .map(|r| r.amount - r.amount_paid)
            .sum();

        let period_start = records.iter().map(|r| r.invoice_date).min();
        let period_end = records.iter().map(|r| r.invoice_date).max();
        let period_days = match (period_start, period_end) {
            (Some(start), Some(end)) => (end - start).num_days().max(1),
            _ => 1,
        };

        let portfolio_dso = if total_invoiced > 0.0 {
            (total_outstanding / total_invoiced * period_days as f64).round() as i64
        } else {
            0
        };

        PortfolioOverview {
            customers_analyzed: customers.len(),
            total_invoices: records.len(),
            total_invoiced,
            total_outstanding,
            overall_on_time_rate: on_time_tally(records).rate(),
            portfolio_dso,
            period_start,
            period_end,
            segments: segment_breakdown(customers),
        }
    }
}

fn estimate_arr(invoices: &[&InvoiceRecord], total_invoiced: f64) -> f64 {
    let start = invoices.iter().map(|i| i.invoice_date).min();
    let end = invoices.iter().map(|i| i.invoice_date).max();
    let months = match (start, end) {
        (Some(start), Some(end)) => month_span(start, end),
        _ => 1,
    };
    total_invoiced / months as f64 * 12.0
}

fn segment_breakdown(customers: &[CustomerPaymentMetrics]) -> Vec<SegmentBreakdown> {
    let mut by_segment: BTreeMap<String, Vec<&CustomerPaymentMetrics>> = BTreeMap::new();
    for customer in customers {
        by_segment
            .entry(
                customer
                    .segment
                    .clone()
                    .unwrap_or_else(|| "unsegmented".to_string()),
            )
            .or_default()
            .push(customer);
    }

    by_segment
        .into_iter()
        .map(|(segment, members)| {
            let total_arr: f64 = members.iter().map(|c| c.arr).sum();
            let arr_at_risk: f64 = members
                .iter()
                .filter(|c| c.on_time_rate < AT_RISK_ON_TIME_RATE)
                .map(|c| c.arr)
                .sum();
            let outstanding_balance: f64 = members.iter().map(|c| c.outstanding_balance).sum();
            let invoiced: f64 = members.iter().map(|c| c.total_invoiced).sum();
            let average_on_time_rate =
                members.iter().map(|c| c.on_time_rate).sum::<f64>() / members.len() as f64;
            let dso = if invoiced > 0.0 {
                (outstanding_balance / invoiced * DSO_ANNUALIZATION_DAYS).round() as i64
            } else {
                0
            };

            SegmentBreakdown {
                segment,
                customer_count: members.len(),
                total_arr,
                arr_at_risk,
                outstanding_balance,
                average_on_time_rate,
                dso,
            }
        })
        .collect()
}
