//! Kiln Import - Turning export batches into live objects
//!
//! The [`ImportDispatcher`] walks an export batch in order and materializes
//! each export into the content store. Property payloads are applied through
//! the [`PropertyDeserializer`] against the type registry; references are
//! chased through the [`ReferenceResolver`] (batch, store, local files,
//! remote service); graph-shaped assets are rebuilt in two phases by the
//! [`GraphReconstructor`]. Every problem is recorded as a diagnostic on the
//! [`Outcome`] of the export it concerns.

mod config;
mod context;
mod deserializer;
mod dispatcher;
mod family;
mod graph;
mod outcome;
mod resolver;

pub use config::{
    AliasConfig, GraphFamily, ImportConfig, ImportOptions, KilnConfigFile, LocalConfig, Membership,
    PathsConfig, RemoteConfig, SubstitutionConfig, TypesConfig,
};
pub use context::{ExportState, ImportContext};
pub use deserializer::{Linker, PropertyDeserializer};
pub use dispatcher::ImportDispatcher;
pub use family::FamilyImporter;
pub use graph::{GraphBuild, GraphLinker, GraphPlan, GraphReconstructor};
pub use outcome::{CollectingReporter, Outcome, OutcomeReporter, TracingReporter};
pub use resolver::{Materializer, ObjectLinker, ReferenceResolver, SessionState};
