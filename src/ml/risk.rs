//! Additive cardiovascular risk score

use crate::structs::{RiskBand, RiskScore};

pub const MAX_RISK_SCORE: u8 = 6;

impl RiskBand {
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            0 | 1 => Self::Low,
            2 | 3 => Self::Moderate,
            _ => Self::High,
        }
    }
}

/// Score a patient from age, systolic pressure and cholesterol grade
///
/// Age and pressure each add a point per threshold crossed (55/65 years,
/// 140/160 mmHg). Cholesterol grade 2 adds one point and grade 3 adds two.
#[must_use]
pub fn risk_score(age_years: f64, ap_hi: f64, cholesterol: u8) -> RiskScore {
    let mut score = 0u8;

    if age_years > 55.0 {
        score += 1;
    }
    if age_years > 65.0 {
        score += 1;
    }
    if ap_hi > 140.0 {
        score += 1;
    }
    if ap_hi > 160.0 {
        score += 1;
    }
    score += match cholesterol {
        2 => 1,
        3 => 2,
        _ => 0,
    };

    RiskScore {
        risk_score: score,
        max_score: MAX_RISK_SCORE,
        band: RiskBand::from_score(score),
    }
}
