//! Sanity notes about an application, shown before the model runs.

use super::ApplicantProfile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Loans below this amount (INR) get a small-loan note.
pub const SMALL_LOAN_INR: f64 = 10_000.0;

/// DTI (percent) above which lenders typically hesitate.
pub const HIGH_DTI_PERCENT: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    UnrealisticInterestRate,
    SmallLoanAmount,
    HighDebtToIncome { dti_ratio: f64 },
}

impl Advisory {
    pub fn severity(&self) -> Severity {
        match self {
            Self::SmallLoanAmount => Severity::Info,
            Self::UnrealisticInterestRate | Self::HighDebtToIncome { .. } => Severity::Warning,
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrealisticInterestRate => write!(
                f,
                "A 0% interest rate is unrealistic for personal loans; typical rates are 8-25% depending on credit score and terms."
            ),
            Self::SmallLoanAmount => write!(
                f,
                "The requested amount is small, which lenders may see as lower risk."
            ),
            Self::HighDebtToIncome { dti_ratio } => write!(
                f,
                "Your debt-to-income ratio of {dti_ratio:.1}% is above the recommended {HIGH_DTI_PERCENT:.0}%; consider reducing existing debt before applying."
            ),
        }
    }
}

/// Notes for `profile`, warnings first in a fixed order.
pub fn advisories(profile: &ApplicantProfile) -> Vec<Advisory> {
    let mut notes = Vec::new();
    if profile.interest_rate == 0.0 {
        notes.push(Advisory::UnrealisticInterestRate);
    }
    if profile.loan_amount_inr < SMALL_LOAN_INR {
        notes.push(Advisory::SmallLoanAmount);
    }
    if profile.dti_ratio > HIGH_DTI_PERCENT {
        notes.push(Advisory::HighDebtToIncome {
            dti_ratio: profile.dti_ratio,
        });
    }
    notes
}
