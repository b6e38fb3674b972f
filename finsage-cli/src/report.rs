//! Plain-text rendering of analyses for the terminal.

use chrono::{DateTime, Utc};
use finsage_core::{ExchangeRate, RateSource};
use finsage_ml::advisor::prompts::format_inr;
use finsage_ml::application::Severity;
use finsage_ml::{Advisory, ApplicantProfile, Decision, FeatureImportance};

const BAR_WIDTH: usize = 30;

/// Factors listed per entry in `history`.
pub const HISTORY_FACTORS: usize = 3;

/// Ranked attributions as a bar chart scaled to the largest magnitude.
pub fn importance_table(importance: &FeatureImportance, top: Option<usize>) -> String {
    if importance.is_empty() {
        return "  (no feature attributions available)\n".to_string();
    }
    let rows = importance.top(top.unwrap_or(importance.len()));
    let name_width = rows.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    let max = rows.first().map(|(_, v)| *v).unwrap_or(0.0);

    let mut out = String::new();
    for (rank, (name, value)) in rows.iter().enumerate() {
        let len = if max > 0.0 {
            ((value / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        out.push_str(&format!(
            "  {:>2}. {name:<name_width$}  {value:>8.4}  {}\n",
            rank + 1,
            "█".repeat(len)
        ));
    }
    out
}

pub fn decision_banner(decision: Decision, at_risk_probability: f64) -> String {
    format!(
        "Prediction: {decision} (risk probability {:.1}%)",
        at_risk_probability * 100.0
    )
}

/// Applicant ratios and the exchange rate used for the model's USD columns.
pub fn profile_summary(profile: &ApplicantProfile, rate: &ExchangeRate) -> String {
    let mut out = String::new();
    let name = if profile.borrower_name.is_empty() {
        "(unnamed applicant)"
    } else {
        profile.borrower_name.as_str()
    };
    out.push_str(&format!("Applicant: {name}\n"));
    out.push_str(&format!(
        "  CIBIL score {} -> loan grade {}\n",
        profile.cibil_score, profile.loan_grade
    ));
    out.push_str(&format!(
        "  Requested {} for {} against income {}\n",
        format_inr(profile.loan_amount_inr),
        profile.loan_intent,
        format_inr(profile.annual_income_inr)
    ));
    let ltv = if profile.is_renting() {
        "N/A (renting)".to_string()
    } else {
        format!("{:.2}%", profile.ltv_ratio)
    };
    out.push_str(&format!("  Loan-to-value: {ltv}\n"));
    out.push_str(&format!("  Debt-to-income: {:.2}%\n", profile.dti_ratio));
    let source = match rate.source {
        RateSource::Live => "live",
        RateSource::Fallback => "fallback",
    };
    out.push_str(&format!("  1 INR = {:.5} USD ({source})\n", rate.inr_to_usd));
    out
}

pub fn advisory_lines(notes: &[Advisory]) -> String {
    let mut out = String::new();
    for note in notes {
        let marker = match note.severity() {
            Severity::Warning => "warning",
            Severity::Info => "note",
        };
        out.push_str(&format!("  [{marker}] {note}\n"));
    }
    out
}

/// One line per analysis: id, date, verdict, applicant and top factors.
pub fn history_line(
    id: i64,
    created_at: DateTime<Utc>,
    decision: Decision,
    borrower_name: &str,
    importance: &FeatureImportance,
) -> String {
    let factors = if importance.is_empty() {
        "-".to_string()
    } else {
        importance
            .top(HISTORY_FACTORS)
            .iter()
            .map(|(name, value)| format!("{name} ({value:.3})"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let name = if borrower_name.is_empty() {
        "-"
    } else {
        borrower_name
    };
    format!(
        "#{id:<4} {}  {:<21}  {name:<20}  {factors}",
        created_at.format("%Y-%m-%d %H:%M"),
        decision.to_string()
    )
}
