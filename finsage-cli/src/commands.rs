//! CLI subcommand handlers.

use crate::report;
use crate::{Commands, ConfigAction};
use anyhow::Context;
use finsage_core::config::{FinsageConfig, load_config, render_config};
use finsage_core::{
    AnalysisStore, ConfigOverrides, ExchangeRate, ExchangeRateClient, LlmProvider, Message,
    OpenAiCompatibleProvider,
};
use finsage_ml::advisor::prompts;
use finsage_ml::application::advisories;
use finsage_ml::{
    AT_RISK_CLASS, Advice, AdviceSource, AdvisorSettings, ApplicantProfile, Decision,
    FeatureImportance, LoanAdvisor, LoanApplication, Model, PreparedApplication, extract_or_empty,
    load_model, prepare,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Earlier messages of a chat session replayed to the advisor.
const CHAT_HISTORY_MESSAGES: usize = 20;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    overrides: &ConfigOverrides,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, overrides),
        Commands::Analyze {
            application,
            no_advice,
            no_save,
        } => {
            let config = resolve_config(workspace, overrides)?;
            let outcome = analyze(&application, &config, overrides.offline, !no_advice).await?;
            print_analysis(&outcome);
            if !no_save {
                save_analysis(&outcome, &config);
            }
            Ok(())
        }
        Commands::Explain {
            application,
            top,
            json,
        } => {
            let config = resolve_config(workspace, overrides)?;
            explain(&application, &config, top, json).await
        }
        Commands::Chat {
            analysis_id,
            session,
            question,
        } => {
            let config = resolve_config(workspace, overrides)?;
            chat(analysis_id, session, &question, &config, overrides.offline).await
        }
        Commands::History { limit } => {
            let config = resolve_config(workspace, overrides)?;
            history(limit, &config)
        }
    }
}

fn resolve_config(workspace: &Path, overrides: &ConfigOverrides) -> anyhow::Result<FinsageConfig> {
    load_config(Some(workspace), Some(overrides))
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    overrides: &ConfigOverrides,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => init_config(workspace),
        ConfigAction::Show => {
            let config = resolve_config(workspace, overrides)?;
            println!("{}", render_config(&config)?);
            Ok(())
        }
    }
}

fn init_config(workspace: &Path) -> anyhow::Result<()> {
    let config_dir = workspace.join(".finsage");
    std::fs::create_dir_all(&config_dir)?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        println!(
            "Configuration file already exists at: {}",
            config_path.display()
        );
        return Ok(());
    }

    let rendered = render_config(&FinsageConfig::default())?;
    std::fs::write(&config_path, rendered)?;
    println!(
        "Created default configuration at: {}",
        config_path.display()
    );
    Ok(())
}

/// Everything `analyze` produces for one application.
struct AnalysisOutcome {
    prepared: PreparedApplication,
    rate: ExchangeRate,
    decision: Decision,
    at_risk_probability: f64,
    importance: FeatureImportance,
    attribution_error: Option<String>,
    advice: Option<Advice>,
}

fn read_application(path: &Path) -> anyhow::Result<LoanApplication> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read application {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid application JSON in {}", path.display()))
}

async fn exchange_rate(config: &FinsageConfig) -> anyhow::Result<ExchangeRate> {
    let client = ExchangeRateClient::new(config.currency.clone())?;
    Ok(client.current_rate().await)
}

fn load_configured_model(config: &FinsageConfig) -> anyhow::Result<Model> {
    load_model(&config.model.path)
        .with_context(|| format!("Failed to load model {}", config.model.path.display()))
}

/// An advisor over the configured provider, or `None` when offline or the
/// provider cannot be built (for example a missing API key).
fn build_advisor(config: &FinsageConfig, offline: bool) -> Option<LoanAdvisor> {
    if offline {
        return None;
    }
    match OpenAiCompatibleProvider::new(&config.llm) {
        Ok(provider) => {
            let provider: Arc<dyn LlmProvider> = Arc::new(provider);
            Some(LoanAdvisor::new(
                provider,
                AdvisorSettings::from(&config.llm),
            ))
        }
        Err(e) => {
            warn!(error = %e, "LLM provider unavailable; advice will be static");
            None
        }
    }
}

async fn analyze(
    path: &Path,
    config: &FinsageConfig,
    offline: bool,
    with_advice: bool,
) -> anyhow::Result<AnalysisOutcome> {
    let application = read_application(path)?;
    let rate = exchange_rate(config).await?;
    let prepared = prepare(&application, rate.inr_to_usd)?;
    let model = load_configured_model(config)?;

    let proba = model.predict_proba(&prepared.row)?;
    let decision = Decision::from_class(model.predict(&prepared.row)?);
    let at_risk_probability = proba.get(AT_RISK_CLASS).copied().unwrap_or(0.0);
    info!(%decision, at_risk_probability, "Prediction complete");

    let (importance, attribution_error) = extract_or_empty(Some(&model), Some(&prepared.row));

    let advice = if with_advice {
        Some(match build_advisor(config, offline) {
            Some(advisor) => {
                advisor
                    .initial_insights(decision, &prepared.profile, &importance)
                    .await
            }
            None => Advice {
                text: prompts::STATIC_INSIGHTS.to_string(),
                source: AdviceSource::Static,
            },
        })
    } else {
        None
    };

    Ok(AnalysisOutcome {
        prepared,
        rate,
        decision,
        at_risk_probability,
        importance,
        attribution_error: attribution_error.map(|e| e.to_string()),
        advice,
    })
}

fn print_analysis(outcome: &AnalysisOutcome) {
    print!(
        "{}",
        report::profile_summary(&outcome.prepared.profile, &outcome.rate)
    );
    let notes = advisories(&outcome.prepared.profile);
    if !notes.is_empty() {
        println!();
        print!("{}", report::advisory_lines(&notes));
    }

    println!();
    println!(
        "{}",
        report::decision_banner(outcome.decision, outcome.at_risk_probability)
    );
    println!();
    println!("Feature importance:");
    print!("{}", report::importance_table(&outcome.importance, None));
    if let Some(error) = &outcome.attribution_error {
        println!("  Attribution unavailable: {error}");
    }

    if let Some(advice) = &outcome.advice {
        println!();
        println!("Advisor insights:");
        println!("{}", advice.text);
    }
}

/// Persist an analysis. Failures are reported but never abort the command.
fn save_analysis(outcome: &AnalysisOutcome, config: &FinsageConfig) {
    let db_path = config.store.resolved_path();
    let importance = (!outcome.importance.is_empty()).then_some(&outcome.importance);
    let saved = AnalysisStore::open(&db_path).and_then(|store| {
        store.save_analysis(
            &outcome.prepared.profile,
            outcome.decision.class(),
            importance,
            outcome.advice.as_ref().map(|a| a.text.as_str()),
        )
    });
    match saved {
        Ok(id) => {
            info!(analysis_id = id, db = %db_path.display(), "Analysis saved");
            println!();
            println!("Saved as analysis #{id}. Ask follow-up questions with:");
            println!("  finsage chat --analysis-id {id} \"<your question>\"");
        }
        Err(e) => {
            warn!(error = %e, "Failed to save analysis");
            eprintln!("Warning: analysis was not saved: {e}");
        }
    }
}

async fn explain(
    path: &Path,
    config: &FinsageConfig,
    top: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let application = read_application(path)?;
    let rate = exchange_rate(config).await?;
    let prepared = prepare(&application, rate.inr_to_usd)?;
    let model = load_configured_model(config)?;

    let (importance, error) = extract_or_empty(Some(&model), Some(&prepared.row));
    if let Some(error) = error {
        eprintln!("Attribution unavailable: {error}");
    }

    if json {
        let shown = FeatureImportance::from_attributions(
            importance
                .top(top.unwrap_or(importance.len()))
                .iter()
                .cloned(),
        );
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else {
        print!("{}", report::importance_table(&importance, top));
    }
    Ok(())
}

fn decision_of(prediction: i64) -> Decision {
    if prediction == Decision::LikelyApproved.class() {
        Decision::LikelyApproved
    } else {
        Decision::AtRisk
    }
}

async fn chat(
    analysis_id: i64,
    session: Option<Uuid>,
    question: &str,
    config: &FinsageConfig,
    offline: bool,
) -> anyhow::Result<()> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("Question must not be empty");
    }

    let store = AnalysisStore::open(&config.store.resolved_path())?;
    let analysis = store.get_analysis(analysis_id)?;
    let profile: ApplicantProfile = analysis.applicant()?;
    let importance: FeatureImportance = analysis.feature_importance()?.unwrap_or_default();
    let context = prompts::analysis_context(
        decision_of(analysis.prediction),
        &profile,
        &importance,
        analysis.insights.as_deref(),
    );

    let session = session.unwrap_or_else(Uuid::new_v4);
    let history: Vec<Message> = store
        .chat_history(session, CHAT_HISTORY_MESSAGES)?
        .into_iter()
        .map(|record| Message::new(record.role, record.content))
        .collect();

    let advice = match build_advisor(config, offline) {
        Some(advisor) => advisor.chat(&context, &history, question).await,
        None => Advice {
            text: prompts::static_chat_reply(question),
            source: AdviceSource::Static,
        },
    };

    store.save_chat_turn(session, Some(analysis_id), question, &advice.text)?;

    println!("{}", advice.text);
    println!();
    println!("Session {session} (continue with --session {session})");
    Ok(())
}

fn history(limit: usize, config: &FinsageConfig) -> anyhow::Result<()> {
    let store = AnalysisStore::open(&config.store.resolved_path())?;
    let analyses = store.recent_analyses(limit)?;
    if analyses.is_empty() {
        println!("No analyses saved yet.");
        return Ok(());
    }
    for analysis in analyses {
        let profile: ApplicantProfile = analysis.applicant()?;
        let importance: FeatureImportance = analysis.feature_importance()?.unwrap_or_default();
        println!(
            "{}",
            report::history_line(
                analysis.id,
                analysis.created_at,
                decision_of(analysis.prediction),
                &profile.borrower_name,
                &importance,
            )
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsage_core::Role;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn demo_model() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("models")
            .join("loan_pipeline.json")
    }

    fn overrides(dir: &TempDir) -> ConfigOverrides {
        ConfigOverrides {
            model_path: Some(demo_model()),
            store_path: Some(dir.path().join("finsage.db")),
            offline: true,
            ..Default::default()
        }
    }

    fn write_application(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("application.json");
        std::fs::write(
            &path,
            r#"{
                "borrower_name": "Meera Iyer",
                "person_age": 27,
                "home_ownership": "RENT",
                "loan_amount_inr": 500000,
                "loan_intent": "DEBT CONSOLIDATION",
                "credit_history_years": 3,
                "annual_income_inr": 480000,
                "employment_years": 2,
                "interest_rate": 15.5,
                "cibil_score": 590,
                "total_debt_inr": 260000
            }"#,
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, dir.path(), &ConfigOverrides::default())
            .await
            .unwrap();

        let config_path = dir.path().join(".finsage").join("config.toml");
        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: FinsageConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.llm.max_tokens, 750);
    }

    #[tokio::test]
    async fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(
            handle_command(command, dir.path(), &overrides(&dir))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_offline_analysis_is_explained() {
        let dir = TempDir::new().unwrap();
        let app = write_application(&dir);
        let config = load_config(Some(dir.path()), Some(&overrides(&dir))).unwrap();

        let outcome = analyze(&app, &config, true, true).await.unwrap();
        assert!(outcome.attribution_error.is_none());
        assert_eq!(outcome.importance.len(), 28);
        assert!(outcome.importance.get("person_home_ownership_RENT").is_some());
        assert!((outcome.rate.inr_to_usd - 0.012).abs() < 1e-12);
        assert!(outcome.at_risk_probability >= 0.0 && outcome.at_risk_probability <= 1.0);
        let advice = outcome.advice.unwrap();
        assert_eq!(advice.source, AdviceSource::Static);
    }

    #[tokio::test]
    async fn test_saved_analysis_supports_chat_and_history() {
        let dir = TempDir::new().unwrap();
        let app = write_application(&dir);
        let overrides = overrides(&dir);
        handle_command(
            Commands::Analyze {
                application: app,
                no_advice: true,
                no_save: false,
            },
            dir.path(),
            &overrides,
        )
        .await
        .unwrap();

        let session = Uuid::new_v4();
        handle_command(
            Commands::Chat {
                analysis_id: 1,
                session: Some(session),
                question: "How can I improve my CIBIL score?".to_string(),
            },
            dir.path(),
            &overrides,
        )
        .await
        .unwrap();

        let store = AnalysisStore::open(&dir.path().join("finsage.db")).unwrap();
        let transcript = store.chat_history(session, 10).unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[1].role, Role::Assistant);
        assert!(transcript[1].content.contains("How can I improve my CIBIL score?"));

        let analysis = store.get_analysis(1).unwrap();
        let profile: ApplicantProfile = analysis.applicant().unwrap();
        assert_eq!(profile.borrower_name, "Meera Iyer");
        let importance: Option<FeatureImportance> = analysis.feature_importance().unwrap();
        assert_eq!(importance.unwrap().len(), 28);

        assert!(
            handle_command(Commands::History { limit: 5 }, dir.path(), &overrides)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_chat_about_missing_analysis_fails() {
        let dir = TempDir::new().unwrap();
        let result = handle_command(
            Commands::Chat {
                analysis_id: 42,
                session: None,
                question: "Anything?".to_string(),
            },
            dir.path(),
            &overrides(&dir),
        )
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_decision_of_prediction() {
        assert_eq!(decision_of(0), Decision::LikelyApproved);
        assert_eq!(decision_of(1), Decision::AtRisk);
    }
}
