//! Kiln Export - Reading extraction-tool output
//!
//! An export batch is one JSON document describing every object of one
//! package. This crate parses it into an [`ExportTable`], parses the
//! reference descriptors found inside property payloads, and maps package
//! paths to files on disk and back.

mod paths;
mod reference;
mod table;

pub use paths::{Mount, PathRedirect, PathRules, SourceLocator};
pub use reference::ObjectRef;
pub use table::{ExportRecord, ExportTable, PropertyPayload};
