use crate::metrics::{CustomerPaymentMetrics, PortfolioOverview};
use crate::risk::RiskLevel;
use crate::trend::PaymentTrend;
use crate::warning::{EarlyWarningSignal, WarningSeverity};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Compact view of one high-risk account for reporting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HighRiskAccount {
    pub customer_id: String,
    pub customer_name: String,
    pub risk_level: RiskLevel,
    pub risk_score: u32,
    pub outstanding_balance: f64,
    pub risk_signals: Vec<String>,
}

/// A customer whose payment trajectory is improving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PaymentImprover {
    pub customer_id: String,
    pub customer_name: String,
    pub on_time_rate: f64,
}

/// The complete analysis handed to reporting and alerting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PaymentPatternAnalysis {
    pub portfolio: PortfolioOverview,
    pub customers: Vec<CustomerPaymentMetrics>,
    pub high_risk_accounts: Vec<HighRiskAccount>,
    pub early_warnings: Vec<EarlyWarningSignal>,
    pub payment_improvers: Vec<PaymentImprover>,
    pub insights: Vec<String>,
    pub action_items: Vec<String>,
}

/// Compose the final analysis from the engine outputs. Customers arrive
/// risk-descending from the metrics engine; the high-risk list keeps
/// that order.
pub fn assemble_analysis(
    portfolio: PortfolioOverview,
    customers: Vec<CustomerPaymentMetrics>,
    early_warnings: Vec<EarlyWarningSignal>,
) -> PaymentPatternAnalysis {
    let high_risk_accounts: Vec<HighRiskAccount> = customers
        .iter()
        .filter(|c| c.risk_level.is_high_risk())
        .map(|c| HighRiskAccount {
            customer_id: c.customer_id.clone(),
            customer_name: c.customer_name.clone(),
            risk_level: c.risk_level,
            risk_score: c.risk_score,
            outstanding_balance: c.outstanding_balance,
            risk_signals: c.risk_signals.clone(),
        })
        .collect();

    let payment_improvers: Vec<PaymentImprover> = customers
        .iter()
        .filter(|c| c.trend == PaymentTrend::Improving)
        .map(|c| PaymentImprover {
            customer_id: c.customer_id.clone(),
            customer_name: c.customer_name.clone(),
            on_time_rate: c.on_time_rate,
        })
        .collect();

    let insights = build_insights(&portfolio, &high_risk_accounts, &payment_improvers, &early_warnings);
    let action_items = build_action_items(&high_risk_accounts, &early_warnings);

    PaymentPatternAnalysis {
        portfolio,
        customers,
        high_risk_accounts,
        early_warnings,
        payment_improvers,
        insights,
        action_items,
    }
}

fn build_insights(
    portfolio: &PortfolioOverview,
    high_risk: &[HighRiskAccount],
    improvers: &[PaymentImprover],
    early_warnings: &[EarlyWarningSignal],
) -> Vec<String> {
    let mut insights = vec![
        format!(
            "Analyzed {} invoices across {} customers totaling {:.2}",
            portfolio.total_invoices, portfolio.customers_analyzed, portfolio.total_invoiced
        ),
        format!(
            "Portfolio on-time rate is {:.1}% with {:.2} outstanding (DSO {} days)",
            portfolio.overall_on_time_rate, portfolio.total_outstanding, portfolio.portfolio_dso
        ),
    ];

    if !high_risk.is_empty() {
        let exposure: f64 = high_risk.iter().map(|a| a.outstanding_balance).sum();
        insights.push(format!(
            "{} account(s) are high or critical risk, representing {:.2} outstanding",
            high_risk.len(),
            exposure
        ));
    }
    if !early_warnings.is_empty() {
        insights.push(format!(
            "{} early-warning signal(s) detected before accounts reached high risk",
            early_warnings.len()
        ));
    }
    if !improvers.is_empty() {
        insights.push(format!(
            "{} customer(s) show improving payment behavior",
            improvers.len()
        ));
    }

    insights
}

fn build_action_items(
    high_risk: &[HighRiskAccount],
    early_warnings: &[EarlyWarningSignal],
) -> Vec<String> {
    let mut items = Vec::new();

    for account in high_risk {
        let reason = account
            .risk_signals
            .first()
            .map(String::as_str)
            .unwrap_or("elevated risk score");
        items.push(format!(
            "Review {} (risk score {}): {}",
            account.customer_name, account.risk_score, reason
        ));
    }

    for signal in early_warnings {
        if signal.severity == WarningSeverity::High {
            items.push(format!(
                "Check in with {}: {}",
                signal.customer_name, signal.message
            ));
        }
    }

    if items.is_empty() {
        items.push("No immediate collection actions required".to_string());
    }
    items
}
