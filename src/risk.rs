use crate::trend::PaymentTrend;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Scoring policy. These are tunable business constants, kept apart from
// the scoring algorithm itself.
pub const ON_TIME_SEVERE_RATE: f64 = 50.0;
pub const ON_TIME_SEVERE_POINTS: u32 = 40;
pub const ON_TIME_LOW_RATE: f64 = 65.0;
pub const ON_TIME_LOW_POINTS: u32 = 25;
pub const ON_TIME_MODERATE_RATE: f64 = 80.0;
pub const ON_TIME_MODERATE_POINTS: u32 = 10;

pub const DAYS_TO_PAY_SEVERE: f64 = 60.0;
pub const DAYS_TO_PAY_SEVERE_POINTS: u32 = 30;
pub const DAYS_TO_PAY_ELEVATED: f64 = 45.0;
pub const DAYS_TO_PAY_ELEVATED_POINTS: u32 = 15;

pub const EXPOSURE_SEVERE_PCT: f64 = 30.0;
pub const EXPOSURE_SEVERE_POINTS: u32 = 25;
pub const EXPOSURE_ELEVATED_PCT: f64 = 20.0;
pub const EXPOSURE_ELEVATED_POINTS: u32 = 15;

pub const WORSENING_TREND_POINTS: u32 = 20;

pub const DISPUTE_RATE_PCT: f64 = 10.0;
pub const DISPUTE_RATE_POINTS: u32 = 15;

pub const CRITICAL_SCORE: u32 = 60;
pub const HIGH_SCORE: u32 = 40;
pub const MEDIUM_SCORE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn is_high_risk(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

/// The current-state metrics the scorer weighs for one customer.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskInput {
    pub on_time_rate: f64,
    pub average_days_to_pay: f64,
    pub outstanding_balance: f64,
    pub arr: f64,
    pub trend: PaymentTrend,
    pub dispute_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: u32,
    pub signals: Vec<String>,
}

/// Additive risk score over independent factors. Within each factor the
/// bands are mutually exclusive; only the matched band contributes.
/// Deterministic and side-effect free.
pub fn score_customer_risk(input: &RiskInput) -> RiskAssessment {
    let mut score = 0u32;
    let mut signals = Vec::new();

    if input.on_time_rate < ON_TIME_SEVERE_RATE {
        score += ON_TIME_SEVERE_POINTS;
        signals.push(format!(
            "On-time payment rate of {:.1}% is critically low",
            input.on_time_rate
        ));
    } else if input.on_time_rate < ON_TIME_LOW_RATE {
        score += ON_TIME_LOW_POINTS;
        signals.push(format!(
            "On-time payment rate of {:.1}% is well below healthy levels",
            input.on_time_rate
        ));
    } else if input.on_time_rate < ON_TIME_MODERATE_RATE {
        score += ON_TIME_MODERATE_POINTS;
        signals.push(format!(
            "On-time payment rate of {:.1}% is slipping",
            input.on_time_rate
        ));
    }

    if input.average_days_to_pay > DAYS_TO_PAY_SEVERE {
        score += DAYS_TO_PAY_SEVERE_POINTS;
        signals.push(format!(
            "Average {:.0} days to pay far exceeds typical net terms",
            input.average_days_to_pay
        ));
    } else if input.average_days_to_pay > DAYS_TO_PAY_ELEVATED {
        score += DAYS_TO_PAY_ELEVATED_POINTS;
        signals.push(format!(
            "Average {:.0} days to pay is elevated",
            input.average_days_to_pay
        ));
    }

    if input.arr > 0.0 {
        let exposure_pct = input.outstanding_balance / input.arr * 100.0;
        if exposure_pct > EXPOSURE_SEVERE_PCT {
            score += EXPOSURE_SEVERE_POINTS;
            signals.push(format!(
                "Outstanding balance is {:.1}% of ARR",
                exposure_pct
            ));
        } else if exposure_pct > EXPOSURE_ELEVATED_PCT {
            score += EXPOSURE_ELEVATED_POINTS;
            signals.push(format!(
                "Outstanding balance is {:.1}% of ARR",
                exposure_pct
            ));
        }
    }

    if input.trend == PaymentTrend::Worsening {
        score += WORSENING_TREND_POINTS;
        signals.push("Payment behavior is worsening quarter over quarter".to_string());
    }

    if input.dispute_rate > DISPUTE_RATE_PCT {
        score += DISPUTE_RATE_POINTS;
        signals.push(format!(
            "Dispute rate of {:.1}% exceeds tolerance",
            input.dispute_rate
        ));
    }

    let level = if score >= CRITICAL_SCORE {
        RiskLevel::Critical
    } else if score >= HIGH_SCORE {
        RiskLevel::High
    } else if score >= MEDIUM_SCORE {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskAssessment {
        level,
        score,
        signals,
    }
}
