//! Per-export outcomes and the reporting channel

use kiln_core::Diagnostics;
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Result of importing one export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub name: String,
    pub type_tag: String,
    /// Store path of the committed object; `None` for graph members and failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub success: bool,
    /// Kept off the reporting channel by `suppress_reporting`
    pub suppressed: bool,
    pub diagnostics: Diagnostics,
}

impl Outcome {
    /// Success is derived from the diagnostics: only a fatal one fails
    pub fn new(name: &str, type_tag: &str, path: Option<String>, diagnostics: Diagnostics) -> Self {
        Self {
            name: name.to_string(),
            type_tag: type_tag.to_string(),
            path,
            success: !diagnostics.has_fatal(),
            suppressed: false,
            diagnostics,
        }
    }

    pub fn failed(name: &str, type_tag: &str, diagnostics: Diagnostics) -> Self {
        Self {
            success: false,
            ..Self::new(name, type_tag, None, diagnostics)
        }
    }
}

/// The caller's reporting channel
pub trait OutcomeReporter: Send {
    fn report(&mut self, outcome: &Outcome);
}

/// Reports each outcome as a log line
#[derive(Debug, Default)]
pub struct TracingReporter;

impl OutcomeReporter for TracingReporter {
    fn report(&mut self, outcome: &Outcome) {
        if outcome.success {
            tracing::info!(
                export = %outcome.name,
                type_tag = %outcome.type_tag,
                diagnostics = outcome.diagnostics.len(),
                "imported"
            );
        } else {
            tracing::warn!(
                export = %outcome.name,
                type_tag = %outcome.type_tag,
                diagnostics = outcome.diagnostics.len(),
                "import failed"
            );
        }
    }
}

/// Collects reported outcomes into a shared list
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter(Arc<Mutex<Vec<Outcome>>>);

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.0.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl OutcomeReporter for CollectingReporter {
    fn report(&mut self, outcome: &Outcome) {
        if let Ok(mut outcomes) = self.0.lock() {
            outcomes.push(outcome.clone());
        }
    }
}
