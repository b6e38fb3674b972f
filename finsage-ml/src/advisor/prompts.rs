//! Prompt text for the loan advisor.

use crate::application::{ApplicantProfile, Decision, LoanIntent};
use crate::interpretability::FeatureImportance;

/// Attributions forwarded to the language model.
pub const TOP_FACTORS: usize = 5;

pub const CHAT_SYSTEM_PROMPT: &str = "You are a supportive loan advisor working for the borrower, not the lender. \
Explain financial terms plainly, give specific and actionable steps, and frame weaknesses as things that can be improved. \
If you are unsure about a lender-specific requirement, say so and suggest the borrower confirm it with their lender.";

pub const CHAT_FALLBACK_SYSTEM_PROMPT: &str = "You are a helpful loan advisor for borrowers.";

pub const STATIC_INSIGHTS: &str = "\
Loan Application Analysis

The advisory service is unavailable right now, so here are general recommendations.

Key factors lenders look at:
- Your credit score is one of the most important factors in approval.
- Your debt-to-income ratio limits how much you can borrow.
- The loan purpose affects risk assessment and the rate you are offered.
- A steady employment history signals stability.

What you can do:
1. Pay down existing debt before applying.
2. Check your credit report for errors.
3. Keep your employment history consistent.
4. Save for a larger down payment if you can.

Use the chat command to ask about your specific application.";

/// Role description for the initial analysis, which depends on the verdict.
pub fn insights_system_prompt(decision: Decision) -> String {
    let focus = match decision {
        Decision::LikelyApproved => {
            "The model predicts this application is LIKELY TO BE APPROVED. \
Congratulate the borrower, explain which factors work in their favour, \
and suggest how to keep their financial position strong for future applications."
        }
        Decision::AtRisk => {
            "The model predicts this application is AT RISK OF REJECTION. \
Acknowledge the challenges without discouraging the borrower, name the factors that need attention, \
give specific steps to improve the application, and suggest alternative loan options."
        }
    };
    format!(
        "You are a senior loan consultant helping borrowers strengthen their loan applications. {focus} \
Base your advice on the feature attributions provided, address the borrower as \"you\", \
and structure the answer with short sections and bullet points."
    )
}

/// Full analysis request: applicant details, ratios and the top attributions.
pub fn insights_prompt(
    decision: Decision,
    profile: &ApplicantProfile,
    importance: &FeatureImportance,
) -> String {
    let mut prompt = String::from("## Loan application\n");
    push_details(&mut prompt, decision, profile);

    prompt.push_str("\n## Most influential factors (feature attribution)\n");
    push_factors(&mut prompt, importance);

    prompt.push_str("\n## Notes\n");
    prompt.push_str(&format!("{}\n", loan_to_income_comment(profile)));
    if let Some(note) = home_improvement_note(profile) {
        prompt.push_str(&format!("{note}\n"));
    }

    prompt.push_str(match decision {
        Decision::LikelyApproved => {
            "\nExplain why this application looks promising, highlight the strengths behind the top factors, \
and give tips for the rest of the loan process."
        }
        Decision::AtRisk => {
            "\nExplain how each of the top factors affects this application, prioritise the highest-impact \
improvements, and describe realistic options given the borrower's current finances."
        }
    });
    prompt
}

/// Short request used when the full prompt fails.
pub fn simplified_insights_prompt(profile: &ApplicantProfile) -> String {
    format!(
        "As a loan consultant, advise a borrower with:\n\
- CIBIL score: {}\n\
- Annual income: {}\n\
- Loan amount: {}\n\
- Purpose: {}\n\
- Debt-to-income: {:.2}%\n\n\
How can they improve their application?",
        profile.cibil_score,
        format_inr(profile.annual_income_inr),
        format_inr(profile.loan_amount_inr),
        profile.loan_intent,
        profile.dti_ratio,
    )
}

/// Analysis summary carried into follow-up chat.
pub fn analysis_context(
    decision: Decision,
    profile: &ApplicantProfile,
    importance: &FeatureImportance,
    insights: Option<&str>,
) -> String {
    let mut context = String::from("LOAN APPLICATION ANALYSIS\n\n");
    push_details(&mut context, decision, profile);
    context.push_str("\nTop factors (feature attribution):\n");
    push_factors(&mut context, importance);
    if let Some(insights) = insights {
        context.push_str(&format!("\nInitial analysis:\n{insights}\n"));
    }
    context
}

pub fn chat_prompt(context: &str, question: &str) -> String {
    format!(
        "{context}\n\
You are helping THE BORROWER improve this application. Use the attributions to prioritise your advice \
and refer to the actual figures above.\n\n\
Borrower's question: {question}"
    )
}

pub fn simplified_chat_prompt(question: &str) -> String {
    format!("As a loan advisor helping a borrower: {question}")
}

pub fn static_chat_reply(question: &str) -> String {
    format!(
        "Sorry, the advisory service is unavailable right now.\n\n\
A general answer to \"{question}\": keep your credit score healthy, keep your debt-to-income ratio low, \
and show a stable employment history. A financial advisor can help with your specific situation.\n\n\
Please try again in a moment."
    )
}

pub fn interest_rate_note(rate: f64) -> Option<&'static str> {
    if rate == 0.0 {
        Some("(this rate is unrealistic for personal loans)")
    } else if rate < 8.0 {
        Some("(unusually low for unsecured loans in India, where 8-25% is typical)")
    } else {
        None
    }
}

pub fn loan_to_income_comment(profile: &ApplicantProfile) -> String {
    let lti = profile.loan_to_income_ratio();
    if lti < 30.0 {
        format!(
            "The requested {} is only {lti:.1}% of annual income, well within what most lenders accept (typically up to 30-40%).",
            format_inr(profile.loan_amount_inr)
        )
    } else {
        format!(
            "The loan-to-income ratio is {lti:.1}%. Most lenders prefer it below 30-40%; a smaller loan or higher income would help."
        )
    }
}

pub fn home_improvement_note(profile: &ApplicantProfile) -> Option<&'static str> {
    (profile.is_renting() && profile.loan_intent == LoanIntent::HomeImprovement).then_some(
        "The borrower rents: lenders may ask whether the improvements are for a property they own or have landlord approval.",
    )
}

/// Rupee amount with thousands separators, rounded to whole rupees.
pub fn format_inr(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0.0 {
        format!("-₹{grouped}")
    } else {
        format!("₹{grouped}")
    }
}

fn push_details(out: &mut String, decision: Decision, profile: &ApplicantProfile) {
    let name = if profile.borrower_name.is_empty() {
        "N/A"
    } else {
        profile.borrower_name.as_str()
    };
    let (property, ltv) = if profile.is_renting() {
        ("N/A".to_string(), "N/A".to_string())
    } else {
        (
            format_inr(profile.property_value_inr),
            format!("{:.2}%", profile.ltv_ratio),
        )
    };
    let rate_note = interest_rate_note(profile.interest_rate)
        .map(|n| format!(" {n}"))
        .unwrap_or_default();

    out.push_str(&format!("- Name: {name}\n"));
    out.push_str(&format!(
        "- CIBIL score: {} (grade {})\n",
        profile.cibil_score, profile.loan_grade
    ));
    out.push_str(&format!("- Annual income: {}\n", format_inr(profile.annual_income_inr)));
    out.push_str(&format!("- Requested amount: {}\n", format_inr(profile.loan_amount_inr)));
    out.push_str(&format!("- Loan-to-income ratio: {:.2}%\n", profile.loan_to_income_ratio()));
    out.push_str(&format!("- Purpose: {}\n", profile.loan_intent));
    out.push_str(&format!("- Property value: {property}\n"));
    out.push_str(&format!("- Existing debt: {}\n", format_inr(profile.total_debt_inr)));
    out.push_str(&format!("- Loan-to-value ratio: {ltv}\n"));
    out.push_str(&format!("- Debt-to-income ratio: {:.2}%\n", profile.dti_ratio));
    out.push_str(&format!("- Home ownership: {}\n", profile.home_ownership));
    out.push_str(&format!("- Age: {}\n", profile.person_age));
    out.push_str(&format!("- Employment length: {} years\n", profile.employment_years));
    out.push_str(&format!("- Credit history length: {} years\n", profile.credit_history_years));
    out.push_str(&format!("- Interest rate: {}%{rate_note}\n", profile.interest_rate));
    out.push_str(&format!("- Model prediction: {decision}\n"));
}

fn push_factors(out: &mut String, importance: &FeatureImportance) {
    if importance.is_empty() {
        out.push_str("- (attribution unavailable)\n");
        return;
    }
    for (name, value) in importance.top(TOP_FACTORS) {
        out.push_str(&format!("- {name}: {value:.4}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{HomeOwnership, LoanApplication, prepare};

    fn profile() -> ApplicantProfile {
        prepare(&LoanApplication::sample(), 0.012).unwrap().profile
    }

    #[test]
    fn test_format_inr() {
        assert_eq!(format_inr(1_000_000.0), "₹1,000,000");
        assert_eq!(format_inr(999.4), "₹999");
        assert_eq!(format_inr(1_234.5), "₹1,235");
        assert_eq!(format_inr(0.0), "₹0");
        assert_eq!(format_inr(-12_500.0), "-₹12,500");
    }

    #[test]
    fn test_insights_prompt_lists_top_factors_only() {
        let importance = FeatureImportance::from_attributions(
            (0..7).map(|i| (format!("f{i}"), i as f64)),
        );
        let prompt = insights_prompt(Decision::AtRisk, &profile(), &importance);
        assert!(prompt.contains("- f6: 6.0000"));
        assert!(prompt.contains("- f2: 2.0000"));
        assert!(!prompt.contains("- f1:"));
        assert!(prompt.contains("AT RISK OF REJECTION"));
        assert!(prompt.contains("grade B"));
    }

    #[test]
    fn test_renter_details_hide_property() {
        let mut p = profile();
        p.home_ownership = HomeOwnership::Rent;
        p.loan_intent = LoanIntent::HomeImprovement;
        let prompt = insights_prompt(
            Decision::LikelyApproved,
            &p,
            &FeatureImportance::default(),
        );
        assert!(prompt.contains("- Property value: N/A"));
        assert!(prompt.contains("- Loan-to-value ratio: N/A"));
        assert!(prompt.contains("landlord approval"));
        assert!(prompt.contains("(attribution unavailable)"));
    }

    #[test]
    fn test_analysis_context_is_line_per_field() {
        let importance = FeatureImportance::from_attributions([("dti_ratio", -0.5)]);
        let context = analysis_context(
            Decision::LikelyApproved,
            &profile(),
            &importance,
            Some("Keep DTI low."),
        );
        let (details, rest) = context
            .strip_prefix("LOAN APPLICATION ANALYSIS\n\n")
            .unwrap()
            .split_once("\nTop factors (feature attribution):\n")
            .unwrap();
        assert_eq!(details.lines().count(), 16);
        assert!(details.lines().all(|l| l.starts_with("- ")));
        assert!(details.ends_with("- Model prediction: LIKELY TO BE APPROVED\n"));
        assert_eq!(rest, "- dti_ratio: 0.5000\n\nInitial analysis:\nKeep DTI low.\n");
    }

    #[test]
    fn test_interest_rate_notes() {
        assert!(interest_rate_note(0.0).unwrap().contains("unrealistic"));
        assert!(interest_rate_note(5.0).unwrap().contains("unusually low"));
        assert!(interest_rate_note(12.0).is_none());
    }

    #[test]
    fn test_loan_to_income_comment() {
        let mut p = profile();
        assert!(loan_to_income_comment(&p).contains("100.0%"));
        p.loan_amount_inr = 200_000.0;
        assert!(loan_to_income_comment(&p).contains("only 20.0%"));
    }

    #[test]
    fn test_static_chat_reply_quotes_question() {
        assert!(static_chat_reply("Should I refinance?").contains("\"Should I refinance?\""));
    }
}
