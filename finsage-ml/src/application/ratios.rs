//! Credit ratios and the CIBIL-derived loan grade.

use super::HomeOwnership;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Loan grade bucketed from a CIBIL score. The model was trained on the
/// A–G scale; C and E are never produced from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LoanGrade {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl LoanGrade {
    pub fn from_cibil(score: u32) -> Self {
        match score {
            s if s < 580 => Self::G,
            s if s < 670 => Self::F,
            s if s < 740 => Self::D,
            s if s < 800 => Self::B,
            _ => Self::A,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
            Self::G => "G",
        }
    }
}

impl fmt::Display for LoanGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loan-to-value ratio in percent. Zero for renters and when there is no
/// property value to secure the loan against.
pub fn loan_to_value(loan_amount: f64, property_value: f64, ownership: HomeOwnership) -> f64 {
    if ownership == HomeOwnership::Rent || property_value <= 0.0 {
        return 0.0;
    }
    loan_amount / property_value * 100.0
}

/// Debt-to-income ratio in percent. Zero when there is no income.
pub fn debt_to_income(total_debt: f64, annual_income: f64) -> f64 {
    if annual_income <= 0.0 {
        return 0.0;
    }
    total_debt / annual_income * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_boundaries() {
        for (score, grade) in [
            (300, LoanGrade::G),
            (579, LoanGrade::G),
            (580, LoanGrade::F),
            (669, LoanGrade::F),
            (670, LoanGrade::D),
            (739, LoanGrade::D),
            (740, LoanGrade::B),
            (799, LoanGrade::B),
            (800, LoanGrade::A),
            (900, LoanGrade::A),
        ] {
            assert_eq!(LoanGrade::from_cibil(score), grade, "score {score}");
        }
    }

    #[test]
    fn test_ltv() {
        assert_eq!(loan_to_value(1_000_000.0, 5_000_000.0, HomeOwnership::Own), 20.0);
        assert_eq!(loan_to_value(1_000_000.0, 5_000_000.0, HomeOwnership::Rent), 0.0);
        assert_eq!(loan_to_value(1_000_000.0, 0.0, HomeOwnership::Mortgage), 0.0);
        assert_eq!(loan_to_value(1_000_000.0, -1.0, HomeOwnership::Other), 0.0);
    }

    #[test]
    fn test_dti() {
        assert_eq!(debt_to_income(500_000.0, 1_000_000.0), 50.0);
        assert_eq!(debt_to_income(500_000.0, 0.0), 0.0);
        assert_eq!(debt_to_income(0.0, 1_000_000.0), 0.0);
    }

    #[test]
    fn test_grade_serde() {
        assert_eq!(serde_json::to_string(&LoanGrade::B).unwrap(), r#""B""#);
        assert_eq!(LoanGrade::G.to_string(), "G");
    }
}
