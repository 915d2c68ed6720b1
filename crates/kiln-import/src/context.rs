//! Per-batch import state

use crate::config::ImportOptions;
use crate::outcome::Outcome;
use kiln_core::{Diagnostic, DiagnosticKind, ObjectHandle};
use kiln_export::SourceLocator;

/// Where one export is in its reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Pending,
    /// Reconstruction has started and holds a reserved store slot
    InProgress(ObjectHandle),
    /// Finished; `None` if nothing was committed
    Done(Option<ObjectHandle>),
}

/// Mutable state of one batch import, owned by the dispatcher for the
/// duration of `import_batch` and passed explicitly to every component.
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub locator: SourceLocator,
    pub options: ImportOptions,
    /// Nesting level; 0 for a batch the caller asked for
    pub depth: usize,
    states: Vec<ExportState>,
    /// Graph asset index owning each member or editor-data export
    owners: Vec<Option<usize>>,
    outcomes: Vec<Option<Outcome>>,
}

impl ImportContext {
    pub fn new(locator: SourceLocator, options: ImportOptions, depth: usize, export_count: usize) -> Self {
        Self {
            locator,
            options,
            depth,
            states: vec![ExportState::Pending; export_count],
            owners: vec![None; export_count],
            outcomes: vec![None; export_count],
        }
    }

    pub fn export_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, index: usize) -> ExportState {
        self.states.get(index).copied().unwrap_or(ExportState::Done(None))
    }

    pub fn set_state(&mut self, index: usize, state: ExportState) {
        if let Some(slot) = self.states.get_mut(index) {
            *slot = state;
        }
    }

    /// Claim `member` for the graph at `owner`. The first claim wins.
    pub fn claim(&mut self, member: usize, owner: usize) -> bool {
        match self.owners.get_mut(member) {
            Some(slot @ None) if member != owner => {
                *slot = Some(owner);
                true
            }
            _ => false,
        }
    }

    pub fn owner_of(&self, index: usize) -> Option<usize> {
        self.owners.get(index).copied().flatten()
    }

    /// Exports claimed by the graph at `owner`
    pub fn members_of(&self, owner: usize) -> Vec<usize> {
        self.owners
            .iter()
            .enumerate()
            .filter(|(_, o)| **o == Some(owner))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn set_outcome(&mut self, index: usize, outcome: Outcome) {
        if let Some(slot) = self.outcomes.get_mut(index) {
            *slot = Some(outcome);
        }
    }

    pub fn outcome(&self, index: usize) -> Option<&Outcome> {
        self.outcomes.get(index).and_then(|o| o.as_ref())
    }

    /// Every MissingType diagnostic recorded so far, in export order
    pub fn missing_types(&self) -> Vec<&Diagnostic> {
        self.outcomes
            .iter()
            .flatten()
            .flat_map(|o| o.diagnostics.iter())
            .filter(|d| d.kind == DiagnosticKind::MissingType)
            .collect()
    }

    pub(crate) fn take_outcomes(&mut self) -> Vec<Option<Outcome>> {
        std::mem::take(&mut self.outcomes)
    }
}
