//! Loan applications and their normalization into model feature rows.
//!
//! Applicants enter amounts in rupees; the model was fitted on USD figures,
//! so currency columns are converted with the current exchange rate while
//! the ratios are computed on the original INR amounts.

pub mod advisories;
pub mod ratios;

pub use advisories::{Advisory, Severity, advisories};
pub use ratios::{LoanGrade, debt_to_income, loan_to_value};

use crate::error::MlError;
use crate::features::FeatureRow;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HomeOwnership {
    Rent,
    Mortgage,
    Own,
    Other,
}

impl HomeOwnership {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rent => "RENT",
            Self::Mortgage => "MORTGAGE",
            Self::Own => "OWN",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for HomeOwnership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loan purpose, using the category labels the model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanIntent {
    Medical,
    #[serde(alias = "DEBT CONSOLIDATION")]
    DebtConsolidation,
    #[serde(alias = "HOME IMPROVEMENT")]
    HomeImprovement,
    Venture,
    Personal,
    Education,
}

impl LoanIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medical => "MEDICAL",
            Self::DebtConsolidation => "DEBTCONSOLIDATION",
            Self::HomeImprovement => "HOMEIMPROVEMENT",
            Self::Venture => "VENTURE",
            Self::Personal => "PERSONAL",
            Self::Education => "EDUCATION",
        }
    }
}

impl fmt::Display for LoanIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw applicant input. Amounts are in INR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    #[serde(default)]
    pub borrower_name: String,
    pub person_age: u32,
    pub home_ownership: HomeOwnership,
    pub loan_amount_inr: f64,
    pub loan_intent: LoanIntent,
    pub credit_history_years: u32,
    #[serde(default)]
    pub property_value_inr: f64,
    pub annual_income_inr: f64,
    pub employment_years: u32,
    pub interest_rate: f64,
    pub cibil_score: u32,
    #[serde(default)]
    pub total_debt_inr: f64,
}

impl LoanApplication {
    /// Range checks matching the limits of the application form.
    pub fn validate(&self) -> Result<(), MlError> {
        let mut problems = Vec::new();
        if !(18..=100).contains(&self.person_age) {
            problems.push(format!("age {} is outside 18-100", self.person_age));
        }
        if !(300..=900).contains(&self.cibil_score) {
            problems.push(format!("CIBIL score {} is outside 300-900", self.cibil_score));
        }
        if self.credit_history_years > 60 {
            problems.push(format!(
                "credit history of {} years exceeds 60",
                self.credit_history_years
            ));
        }
        if self.employment_years > 50 {
            problems.push(format!(
                "employment length of {} years exceeds 50",
                self.employment_years
            ));
        }
        if !(0.0..=30.0).contains(&self.interest_rate) {
            problems.push(format!(
                "interest rate {}% is outside 0-30%",
                self.interest_rate
            ));
        }
        for (field, value) in [
            ("loan amount", self.loan_amount_inr),
            ("property value", self.property_value_inr),
            ("annual income", self.annual_income_inr),
            ("total debt", self.total_debt_inr),
        ] {
            if !value.is_finite() || value < 0.0 {
                problems.push(format!("{field} must be a non-negative amount, got {value}"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(MlError::invalid_input(problems.join("; ")))
        }
    }

    #[cfg(test)]
    pub(crate) fn sample() -> Self {
        Self {
            borrower_name: "Asha Rao".into(),
            person_age: 32,
            home_ownership: HomeOwnership::Own,
            loan_amount_inr: 1_000_000.0,
            loan_intent: LoanIntent::Education,
            credit_history_years: 8,
            property_value_inr: 5_000_000.0,
            annual_income_inr: 1_000_000.0,
            employment_years: 6,
            interest_rate: 11.5,
            cibil_score: 745,
            total_debt_inr: 200_000.0,
        }
    }
}

/// The applicant as presented to the advisor and persisted with an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub borrower_name: String,
    pub person_age: u32,
    pub home_ownership: HomeOwnership,
    pub loan_intent: LoanIntent,
    pub loan_amount_inr: f64,
    pub annual_income_inr: f64,
    /// Always zero for renters.
    pub property_value_inr: f64,
    pub total_debt_inr: f64,
    pub employment_years: u32,
    pub credit_history_years: u32,
    pub interest_rate: f64,
    pub cibil_score: u32,
    pub loan_grade: LoanGrade,
    pub ltv_ratio: f64,
    pub dti_ratio: f64,
}

impl ApplicantProfile {
    /// Requested amount as a percentage of annual income.
    pub fn loan_to_income_ratio(&self) -> f64 {
        if self.annual_income_inr > 0.0 {
            self.loan_amount_inr / self.annual_income_inr * 100.0
        } else {
            0.0
        }
    }

    pub fn is_renting(&self) -> bool {
        self.home_ownership == HomeOwnership::Rent
    }
}

/// Output of [`prepare`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedApplication {
    /// Model input, in training column order.
    pub row: FeatureRow,
    pub profile: ApplicantProfile,
    pub grade: LoanGrade,
    pub ltv_ratio: f64,
    pub dti_ratio: f64,
}

/// Previous defaults are not collected by the form; every applicant is
/// treated as having none on file.
const DEFAULT_ON_FILE: &str = "N";

/// Normalize an application into the model's feature row.
///
/// `inr_to_usd` converts the currency columns, each rounded to cents. The
/// borrower's name never becomes a feature.
pub fn prepare(app: &LoanApplication, inr_to_usd: f64) -> Result<PreparedApplication, MlError> {
    app.validate()?;
    if !inr_to_usd.is_finite() || inr_to_usd <= 0.0 {
        return Err(MlError::invalid_input(format!(
            "exchange rate must be positive, got {inr_to_usd}"
        )));
    }
    let usd = |inr: f64| (inr * inr_to_usd * 100.0).round() / 100.0;

    let grade = LoanGrade::from_cibil(app.cibil_score);
    let ltv_ratio = loan_to_value(app.loan_amount_inr, app.property_value_inr, app.home_ownership);
    let dti_ratio = debt_to_income(app.total_debt_inr, app.annual_income_inr);

    let row = FeatureRow::new()
        .with("person_age", f64::from(app.person_age))
        .with("person_income", usd(app.annual_income_inr))
        .with("person_home_ownership", app.home_ownership.as_str())
        .with("person_emp_length", f64::from(app.employment_years))
        .with("loan_intent", app.loan_intent.as_str())
        .with("loan_grade", grade.as_str())
        .with("loan_amnt", usd(app.loan_amount_inr))
        .with("loan_int_rate", app.interest_rate)
        .with("cb_person_default_on_file", DEFAULT_ON_FILE)
        .with(
            "cb_person_cred_hist_length",
            f64::from(app.credit_history_years),
        )
        .with("dti_ratio", dti_ratio)
        .with("ltv_ratio", ltv_ratio)
        .with("cibil_score", f64::from(app.cibil_score))
        .with("total_debt", usd(app.total_debt_inr));

    let profile = ApplicantProfile {
        borrower_name: app.borrower_name.clone(),
        person_age: app.person_age,
        home_ownership: app.home_ownership,
        loan_intent: app.loan_intent,
        loan_amount_inr: app.loan_amount_inr,
        annual_income_inr: app.annual_income_inr,
        property_value_inr: if app.home_ownership == HomeOwnership::Rent {
            0.0
        } else {
            app.property_value_inr
        },
        total_debt_inr: app.total_debt_inr,
        employment_years: app.employment_years,
        credit_history_years: app.credit_history_years,
        interest_rate: app.interest_rate,
        cibil_score: app.cibil_score,
        loan_grade: grade,
        ltv_ratio,
        dti_ratio,
    };

    Ok(PreparedApplication {
        row,
        profile,
        grade,
        ltv_ratio,
        dti_ratio,
    })
}

/// The model's verdict for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    LikelyApproved,
    AtRisk,
}

impl Decision {
    /// Class 0 is approval; any other class is treated as risk.
    pub fn from_class(class: usize) -> Self {
        if class == 0 {
            Self::LikelyApproved
        } else {
            Self::AtRisk
        }
    }

    pub fn class(&self) -> i64 {
        match self {
            Self::LikelyApproved => 0,
            Self::AtRisk => 1,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LikelyApproved => write!(f, "LIKELY TO BE APPROVED"),
            Self::AtRisk => write!(f, "AT RISK OF REJECTION"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_row_columns_in_training_order() {
        let prepared = prepare(&LoanApplication::sample(), 0.012).unwrap();
        let names: Vec<_> = prepared.row.names().collect();
        assert_eq!(
            names,
            vec![
                "person_age",
                "person_income",
                "person_home_ownership",
                "person_emp_length",
                "loan_intent",
                "loan_grade",
                "loan_amnt",
                "loan_int_rate",
                "cb_person_default_on_file",
                "cb_person_cred_hist_length",
                "dti_ratio",
                "ltv_ratio",
                "cibil_score",
                "total_debt",
            ]
        );
    }

    #[test]
    fn test_currency_conversion_and_ratios() {
        let prepared = prepare(&LoanApplication::sample(), 0.012).unwrap();
        let row = &prepared.row;
        assert_eq!(row.get("person_income"), Some(&FeatureValue::Numeric(12_000.0)));
        assert_eq!(row.get("loan_amnt"), Some(&FeatureValue::Numeric(12_000.0)));
        assert_eq!(row.get("total_debt"), Some(&FeatureValue::Numeric(2_400.0)));
        assert_eq!(row.get("loan_grade"), Some(&FeatureValue::from("B")));
        assert_eq!(row.get("cb_person_default_on_file"), Some(&FeatureValue::from("N")));
        assert_eq!(prepared.ltv_ratio, 20.0);
        assert_eq!(prepared.dti_ratio, 20.0);
        assert_eq!(prepared.grade, LoanGrade::B);
        assert!(row.get("borrower_name").is_none());
    }

    #[test]
    fn test_rounding_to_cents() {
        let mut app = LoanApplication::sample();
        app.loan_amount_inr = 123_457.0;
        let prepared = prepare(&app, 0.0119876).unwrap();
        assert_eq!(
            prepared.row.get("loan_amnt"),
            Some(&FeatureValue::Numeric(1479.95))
        );
    }

    #[test]
    fn test_renters_have_no_property() {
        let mut app = LoanApplication::sample();
        app.home_ownership = HomeOwnership::Rent;
        let prepared = prepare(&app, 0.012).unwrap();
        assert_eq!(prepared.profile.property_value_inr, 0.0);
        assert_eq!(prepared.ltv_ratio, 0.0);
        assert!(prepared.profile.is_renting());
    }

    #[test]
    fn test_validation() {
        let mut app = LoanApplication::sample();
        app.person_age = 17;
        app.cibil_score = 950;
        let err = prepare(&app, 0.012).unwrap_err().to_string();
        assert!(err.contains("age 17"));
        assert!(err.contains("CIBIL score 950"));

        assert!(prepare(&LoanApplication::sample(), 0.0).is_err());
    }

    #[test]
    fn test_intent_accepts_form_labels() {
        let intent: LoanIntent = serde_json::from_str(r#""HOME IMPROVEMENT""#).unwrap();
        assert_eq!(intent, LoanIntent::HomeImprovement);
        assert_eq!(intent.as_str(), "HOMEIMPROVEMENT");
        let ownership: HomeOwnership = serde_json::from_str(r#""MORTGAGE""#).unwrap();
        assert_eq!(ownership, HomeOwnership::Mortgage);
    }

    #[test]
    fn test_decision_from_class() {
        assert_eq!(Decision::from_class(0), Decision::LikelyApproved);
        assert_eq!(Decision::from_class(1), Decision::AtRisk);
        assert_eq!(Decision::AtRisk.class(), 1);
    }

    #[test]
    fn test_loan_to_income() {
        let prepared = prepare(&LoanApplication::sample(), 0.012).unwrap();
        assert_eq!(prepared.profile.loan_to_income_ratio(), 100.0);
    }
}
