//! Asset-family specialization

use kiln_asset::Object;
use kiln_core::{Diagnostics, Result};
use kiln_export::{ExportRecord, ExportTable};

/// A type-specific importer consulted before the generic path.
///
/// The dispatcher constructs the object (a default instance when the type
/// resolves, a bare object otherwise) and hands it over for mutation.
/// Returning `Err` fails only this export.
pub trait FamilyImporter: Send {
    /// Importer name for logs
    fn name(&self) -> &str;

    fn accepts(&self, type_tag: &str) -> bool;

    fn import(
        &self,
        record: &ExportRecord,
        table: &ExportTable,
        object: &mut Object,
        diagnostics: &mut Diagnostics,
    ) -> Result<()>;
}
