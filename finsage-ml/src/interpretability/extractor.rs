//! Attribution extraction: which features pushed one prediction towards
//! the at-risk class.
//!
//! Extraction is advisory. It never aborts a prediction: every failure comes
//! back as an [`AttributionError`], including panics raised by the numeric
//! code, and [`extract_or_empty`] turns failures into an empty ranking for
//! callers that only want something to display.

use crate::error::AttributionError;
use crate::features::FeatureRow;
use crate::interpretability::features::FeatureImportance;
use crate::interpretability::tensor::normalize_attributions;
use crate::interpretability::tree_shap::TreeExplainer;
use crate::pipeline::Model;
use std::any::Any;
use std::cell::Cell;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use tracing::{debug, warn};

/// Index of the class whose attributions are reported (loan at risk).
pub const AT_RISK_CLASS: usize = 1;

/// Rank the features of `row` by the magnitude of their TreeSHAP
/// attribution towards [`AT_RISK_CLASS`].
///
/// Keys are the column names the classifier actually sees: when the model
/// has a transform stage these are its output names (one-hot columns appear
/// as `{column}_{category}`), otherwise the row's own names.
pub fn extract(
    model: Option<&Model>,
    row: Option<&FeatureRow>,
) -> Result<FeatureImportance, AttributionError> {
    let model = model.ok_or_else(|| AttributionError::InvalidInput("no model supplied".into()))?;
    let row = row.ok_or_else(|| AttributionError::InvalidInput("no feature row supplied".into()))?;
    if row.is_empty() {
        return Err(AttributionError::InvalidInput("feature row is empty".into()));
    }
    guarded(|| extract_ranking(model, row))
}

/// [`extract`], substituting an empty ranking on failure.
///
/// The error is logged here and handed back so the caller can decide
/// whether to surface it.
pub fn extract_or_empty(
    model: Option<&Model>,
    row: Option<&FeatureRow>,
) -> (FeatureImportance, Option<AttributionError>) {
    match extract(model, row) {
        Ok(importance) => (importance, None),
        Err(e) => {
            warn!(error_kind = e.kind(), error = %e, "Feature attribution unavailable");
            (FeatureImportance::default(), Some(e))
        }
    }
}

fn extract_ranking(model: &Model, row: &FeatureRow) -> Result<FeatureImportance, AttributionError> {
    let classifier = model
        .classifier()
        .ok_or(AttributionError::NoClassifierFound)?;
    let input = model.prepare_input(row)?;
    debug!(
        classifier = classifier.name(),
        transformed = model.transformer().is_some(),
        input_width = input.len(),
        "Explaining prediction"
    );

    let explainer = TreeExplainer::new(classifier)?;
    if input.len() != explainer.n_features() {
        return Err(AttributionError::ShapeMismatch(format!(
            "transformed row has {} columns, classifier expects {}",
            input.len(),
            explainer.n_features()
        )));
    }

    let tensor = explainer.shap_values(std::slice::from_ref(&input.values))?;
    debug!(layout = tensor.layout(), "Normalizing attributions");
    let attributions = normalize_attributions(tensor, AT_RISK_CLASS)?
        .into_iter()
        .next()
        .ok_or_else(|| AttributionError::ShapeMismatch("no attribution row".into()))?;
    if attributions.len() != input.names.len() {
        return Err(AttributionError::ShapeMismatch(format!(
            "{} attributions for {} columns",
            attributions.len(),
            input.names.len()
        )));
    }
    let mut seen = HashSet::with_capacity(input.names.len());
    if let Some(name) = input.names.iter().find(|name| !seen.insert(name.as_str())) {
        return Err(AttributionError::ShapeMismatch(format!(
            "duplicate column name '{name}' in classifier input"
        )));
    }

    Ok(FeatureImportance::from_attributions(
        input.names.into_iter().zip(attributions),
    ))
}

thread_local! {
    static QUIET_PANICS: Cell<bool> = const { Cell::new(false) };
}

static CHAIN_PANIC_HOOK: Once = Once::new();

/// Wrap the process panic hook once so it stays silent on a thread that is
/// inside [`guarded`]. Every other panic reaches the previous hook.
fn install_panic_hook() {
    CHAIN_PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !QUIET_PANICS.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

/// Run `f`, converting a panic into [`AttributionError::Unexpected`].
fn guarded<T>(
    f: impl FnOnce() -> Result<T, AttributionError>,
) -> Result<T, AttributionError> {
    install_panic_hook();
    let was_quiet = QUIET_PANICS.with(|q| q.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    QUIET_PANICS.with(|q| q.set(was_quiet));
    outcome.unwrap_or_else(|payload| {
        let message = panic_message(&*payload);
        debug!(panic = %message, "Attribution panicked");
        Err(AttributionError::Unexpected(message))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
