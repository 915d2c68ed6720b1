//! Kiln Core - Foundational types for the Kiln importer
//!
//! This crate provides the types that all other Kiln crates depend on:
//! - `KilnError` and the `Result` alias for hard failures
//! - `Diagnostic` / `DiagnosticKind` for the non-fatal failure taxonomy
//! - `ObjectHandle`, `NodeId`, `GraphId` - arena identifiers
//! - `ContentHash` - SHA-256 based hashing used for cache keys

mod diagnostic;
mod error;
mod hash;
mod id;

pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{KilnError, Result};
pub use hash::ContentHash;
pub use id::{GraphId, NodeId, ObjectHandle};
