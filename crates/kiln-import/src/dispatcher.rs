//! Batch orchestration

use crate::config::{ImportConfig, ImportOptions};
use crate::context::{ExportState, ImportContext};
use crate::deserializer::PropertyDeserializer;
use crate::family::FamilyImporter;
use crate::graph::GraphReconstructor;
use crate::outcome::{Outcome, OutcomeReporter, TracingReporter};
use crate::resolver::{Materializer, ObjectLinker, ReferenceResolver, SessionState};
use kiln_asset::{read_export_file, ContentStore, Object};
use kiln_core::{Diagnostic, Diagnostics, ObjectHandle, Result};
use kiln_export::{ExportRecord, ExportTable, Mount, SourceLocator};
use kiln_schema::{Fields, TypeRegistry};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

/// Imports export batches into a content store.
///
/// Each export is processed in batch order inside its own failure
/// boundary. Graph assets consume their member exports in one go when the
/// first of them is reached.
pub struct ImportDispatcher {
    registry: Arc<TypeRegistry>,
    deserializer: PropertyDeserializer,
    resolver: Arc<ReferenceResolver>,
    graph: Arc<GraphReconstructor>,
    importers: Vec<Box<dyn FamilyImporter>>,
    reporter: Box<dyn OutcomeReporter>,
    store: ContentStore,
    session: SessionState,
    mounts: Vec<Mount>,
    options: ImportOptions,
}

impl ImportDispatcher {
    pub fn new(registry: Arc<TypeRegistry>, config: &ImportConfig) -> Self {
        let deserializer = PropertyDeserializer::new(registry.clone(), Arc::new(config.path_rules()));
        let graph = GraphReconstructor::new(deserializer.clone(), config.graph.clone());
        Self {
            registry,
            deserializer,
            resolver: Arc::new(ReferenceResolver::from_config(config)),
            graph: Arc::new(graph),
            importers: Vec::new(),
            reporter: Box::new(TracingReporter),
            store: ContentStore::new(),
            session: SessionState::default(),
            mounts: config.mounts(),
            options: config.import.clone(),
        }
    }

    pub fn with_resolver(mut self, resolver: ReferenceResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_reporter(mut self, reporter: Box<dyn OutcomeReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_family_importer(mut self, importer: Box<dyn FamilyImporter>) -> Self {
        self.importers.push(importer);
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Options used by `import_file`
    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn into_store(self) -> ContentStore {
        self.store
    }

    /// Import one batch, returning one outcome per export in batch order.
    ///
    /// Only a batch that is not an export array is an error; every other
    /// problem is recorded on the outcome of the export it concerns.
    pub fn import_batch(
        &mut self,
        batch: &Value,
        locator: SourceLocator,
        options: &ImportOptions,
    ) -> Result<Vec<Outcome>> {
        let table = ExportTable::parse(batch)?;
        self.session = SessionState::default();
        if let Some(file) = &locator.file {
            self.session.attempted_files.insert(file.clone());
        }
        tracing::info!(package = %locator.package_path, exports = table.len(), "importing batch");

        let mut cx = ImportContext::new(locator, options.clone(), 0, table.len());
        let outcomes = self.run(&table, &mut cx);
        self.publish(&outcomes);
        Ok(outcomes)
    }

    /// Read an export file and import it under the package its path maps to
    pub fn import_file(&mut self, path: &Path) -> Result<Vec<Outcome>> {
        let batch = read_export_file(path)?;
        let locator = SourceLocator::from_file(path, &self.mounts);
        let options = self.options.clone();
        self.import_batch(&batch, locator, &options)
    }

    fn run(&mut self, table: &ExportTable, cx: &mut ImportContext) -> Vec<Outcome> {
        self.claim_graph_members(table, cx);
        for index in 0..table.len() {
            self.materialize_export(table, cx, index);
        }

        let suppressed = cx.options.suppress_reporting;
        cx.take_outcomes()
            .into_iter()
            .zip(table.iter())
            .map(|(outcome, record)| {
                let mut outcome = outcome.unwrap_or_else(|| {
                    let mut diagnostics = Diagnostics::new();
                    diagnostics.push(Diagnostic::structural(&record.name, &record.name, "export was not processed"));
                    Outcome::failed(&record.name, &record.type_tag, diagnostics)
                });
                outcome.suppressed = suppressed;
                outcome
            })
            .collect()
    }

    /// Mark the members and editor data of every graph asset in the batch
    fn claim_graph_members(&self, table: &ExportTable, cx: &mut ImportContext) {
        for record in table {
            if cx.owner_of(record.index).is_some() || self.importers.iter().any(|i| i.accepts(&record.type_tag)) {
                continue;
            }
            if let Some(family) = self.graph.family_for(&record.type_tag) {
                let plan = self.graph.plan(family, table, record.index);
                for member in plan.claimed() {
                    cx.claim(member, record.index);
                }
            }
        }
    }

    fn publish(&mut self, outcomes: &[Outcome]) {
        for outcome in outcomes {
            for diagnostic in outcome.diagnostics.iter() {
                tracing::warn!(
                    export = %outcome.name,
                    kind = %diagnostic.kind,
                    subject = %diagnostic.subject,
                    message = %diagnostic.message,
                    "import diagnostic"
                );
            }
            if !outcome.suppressed {
                self.reporter.report(outcome);
            }
        }
    }

    fn build_export(
        &mut self,
        table: &ExportTable,
        cx: &mut ImportContext,
        record: &ExportRecord,
        path: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Object>> {
        if let Some(importer) = self.importers.iter().find(|i| i.accepts(&record.type_tag)) {
            let mut object = match self.registry.resolve(&record.type_tag) {
                Some(descriptor) => Object::construct(&descriptor, &record.name, path),
                None => Object {
                    type_tag: record.type_tag.clone(),
                    name: record.name.clone(),
                    path: path.to_string(),
                    fields: Fields::new(),
                    graph: None,
                },
            };
            tracing::debug!(export = %record.name, importer = importer.name(), "family importer");
            importer.import(record, table, &mut object, diagnostics)?;
            return Ok(Some(object));
        }

        let Some(descriptor) = self
            .registry
            .resolve_for(&record.type_tag, &record.name, diagnostics)
        else {
            return Ok(None);
        };
        let mut object = Object::construct(&descriptor, &record.name, path);
        let resolver = Arc::clone(&self.resolver);

        let graph = Arc::clone(&self.graph);
        if let Some(family) = graph.family_for(&record.type_tag) {
            let mut plan = graph.plan(family, table, record.index);
            plan.members.retain(|m| cx.owner_of(*m) == Some(record.index));
            plan.editor_data = plan.editor_data.filter(|e| cx.owner_of(*e) == Some(record.index));

            let build = graph.reconstruct(family, &plan, &mut object, &descriptor, &resolver, table, cx, self);
            diagnostics.extend(build.asset_diagnostics);
            for (member, member_diagnostics) in build.member_diagnostics {
                if let Some(member_record) = table.get(member) {
                    cx.set_outcome(
                        member,
                        Outcome::new(&member_record.name, &member_record.type_tag, None, member_diagnostics),
                    );
                }
            }
            return Ok((!build.failed).then_some(object));
        }

        let deserializer = self.deserializer.clone();
        let payload = record.merged_properties();
        let mut linker = ObjectLinker {
            resolver: &resolver,
            table,
            cx,
            host: self,
        };
        diagnostics.extend(deserializer.apply(
            &payload,
            &mut object.fields,
            &descriptor,
            &mut linker,
            &record.name,
        ));
        Ok(Some(object))
    }
}

impl Materializer for ImportDispatcher {
    fn store(&self) -> &ContentStore {
        &self.store
    }

    fn materialize_export(&mut self, table: &ExportTable, cx: &mut ImportContext, index: usize) -> Option<ObjectHandle> {
        match cx.state(index) {
            ExportState::Done(handle) => return handle,
            ExportState::InProgress(handle) => return Some(handle),
            ExportState::Pending => {}
        }
        // Graph members are nodes, not store objects
        if let Some(owner) = cx.owner_of(index) {
            self.materialize_export(table, cx, owner);
            return None;
        }

        let record = table.get(index)?;
        let path = cx.locator.object_path(record.outer.as_deref(), &record.name);
        let handle = self.store.reserve(&path, &record.type_tag);
        cx.set_state(index, ExportState::InProgress(handle));

        let mut diagnostics = Diagnostics::new();
        let built = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.build_export(table, cx, record, &path, &mut diagnostics)
        })) {
            Ok(Ok(built)) => built,
            Ok(Err(e)) => {
                diagnostics.push(Diagnostic::structural(&record.name, &record.name, e.to_string()));
                None
            }
            Err(payload) => {
                let message = if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                tracing::error!(export = %record.name, panic = %message, "export reconstruction panicked");
                diagnostics.push(Diagnostic::structural(
                    &record.name,
                    &record.name,
                    format!("internal error: {}", message),
                ));
                None
            }
        };

        let committed = match built {
            Some(object) if !diagnostics.has_fatal() => {
                self.store.commit(handle, object);
                Some(handle)
            }
            _ => {
                self.store.release(handle);
                None
            }
        };
        cx.set_state(index, ExportState::Done(committed));

        for member in cx.members_of(index) {
            cx.set_state(member, ExportState::Done(None));
            let recorded = cx.outcome(member).is_some();
            if committed.is_none() || !recorded {
                let Some(member_record) = table.get(member) else {
                    continue;
                };
                let mut member_diagnostics = cx
                    .outcome(member)
                    .map(|o| o.diagnostics.clone())
                    .unwrap_or_default();
                member_diagnostics.push(Diagnostic::structural(
                    &member_record.name,
                    &member_record.name,
                    format!("graph '{}' could not be built", record.name),
                ));
                cx.set_outcome(
                    member,
                    Outcome::failed(&member_record.name, &member_record.type_tag, member_diagnostics),
                );
            }
        }

        if committed.is_some() {
            tracing::debug!(export = %record.name, path = %path, "export committed");
        }
        let mut outcome = Outcome::new(&record.name, &record.type_tag, committed.map(|_| path), diagnostics);
        outcome.success = committed.is_some();
        cx.set_outcome(index, outcome);
        committed
    }

    fn import_nested(&mut self, batch: &Value, locator: SourceLocator, parent: &ImportContext) -> Result<()> {
        let table = ExportTable::parse(batch)?;
        if let Some(file) = &locator.file {
            self.session.attempted_files.insert(file.clone());
        }
        tracing::debug!(
            package = %locator.package_path,
            exports = table.len(),
            depth = parent.depth + 1,
            "importing nested batch"
        );
        let mut cx = ImportContext::new(locator, parent.options.clone(), parent.depth + 1, table.len());
        let outcomes = self.run(&table, &mut cx);
        self.publish(&outcomes);
        Ok(())
    }

    fn session(&mut self) -> &mut SessionState {
        &mut self.session
    }
}
