//! Non-fatal import diagnostics
//!
//! Source data comes from an external extraction tool and is occasionally
//! inconsistent. Recoverable problems are recorded here and the import
//! carries on with the next field, node or export.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a recorded problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Type tag could not be resolved to a descriptor
    MissingType,
    /// A reference resolved to no object after every tier
    MissingReference,
    /// A field was absent or had the wrong shape
    MalformedPayload,
    /// An enum payload named a value the enum does not declare
    EnumValueUnknown,
    /// A required substructure was missing; fatal to the one export
    StructuralFailure,
}

impl DiagnosticKind {
    /// Whether this kind fails the export it was recorded against
    pub fn is_fatal(self) -> bool {
        matches!(self, DiagnosticKind::StructuralFailure)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::MissingType => "MissingType",
            DiagnosticKind::MissingReference => "MissingReference",
            DiagnosticKind::MalformedPayload => "MalformedPayload",
            DiagnosticKind::EnumValueUnknown => "EnumValueUnknown",
            DiagnosticKind::StructuralFailure => "StructuralFailure",
        };
        write!(f, "{}", s)
    }
}

/// A single recorded problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// What the problem is about: a type tag, a reference path, a field name
    pub subject: String,
    /// Where it happened: usually the export or node name
    pub context: String,
    #[serde(default)]
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            context: context.into(),
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn missing_type(type_tag: &str, context: &str) -> Self {
        Self::new(DiagnosticKind::MissingType, type_tag, context)
    }

    pub fn missing_reference(path: &str, context: &str) -> Self {
        Self::new(DiagnosticKind::MissingReference, path, context)
    }

    pub fn malformed(field: &str, context: &str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::MalformedPayload, field, context).with_message(message)
    }

    pub fn structural(subject: &str, context: &str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::StructuralFailure, subject, context).with_message(message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' in '{}'", self.kind, self.subject, self.context)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// An append-only list of diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of diagnostics of the given kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.0.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has_fatal(&self) -> bool {
        self.0.iter().any(|d| d.kind.is_fatal())
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(v: Vec<Diagnostic>) -> Self {
        Self(v)
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_structural_is_fatal() {
        assert!(DiagnosticKind::StructuralFailure.is_fatal());
        assert!(!DiagnosticKind::MissingType.is_fatal());
        assert!(!DiagnosticKind::MissingReference.is_fatal());
        assert!(!DiagnosticKind::MalformedPayload.is_fatal());
        assert!(!DiagnosticKind::EnumValueUnknown.is_fatal());
    }

    #[test]
    fn test_count_and_fatal() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::missing_type("UnknownNode", "M_Rock"));
        diags.push(Diagnostic::missing_type("OtherNode", "M_Rock"));
        assert_eq!(diags.count(DiagnosticKind::MissingType), 2);
        assert!(!diags.has_fatal());

        diags.push(Diagnostic::structural("EditorOnlyData", "M_Rock", "absent"));
        assert!(diags.has_fatal());
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::malformed("Roughness", "M_Rock", "expected number");
        assert_eq!(d.to_string(), "MalformedPayload 'Roughness' in 'M_Rock': expected number");
    }
}
