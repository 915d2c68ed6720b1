//! Tiered reference resolution
//!
//! A reference is tried against, in order: the current batch, the content
//! store, a sibling export file on disk and finally the remote export
//! service. The first tier that yields a handle wins.

use crate::config::ImportConfig;
use crate::context::ImportContext;
use crate::deserializer::Linker;
use kiln_asset::{read_export_file, ContentStore, FetchCache, FetchResponse, HttpFetcher, LocalExportSource, RemoteFetcher};
use kiln_core::{NodeId, ObjectHandle, Result};
use kiln_export::{ExportTable, ObjectRef, SourceLocator};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

/// Bookkeeping for one top-level batch and the imports nested under it.
/// Reset at the start of every top-level batch, so a remote miss or a
/// timeout is retried by the next one.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Object paths already requested from the remote service
    pub attempted_remote: HashSet<String>,
    /// Export files already imported or being imported
    pub attempted_files: HashSet<PathBuf>,
}

/// What the resolver needs from whoever owns the store and runs imports
pub trait Materializer {
    fn store(&self) -> &ContentStore;

    /// Reconstruct export `index` of the current batch if it has not been
    /// already, returning its store handle. A reserved handle is returned
    /// for an export whose reconstruction is still in progress.
    fn materialize_export(&mut self, table: &ExportTable, cx: &mut ImportContext, index: usize) -> Option<ObjectHandle>;

    /// Import another batch one level below `parent`
    fn import_nested(&mut self, batch: &Value, locator: SourceLocator, parent: &ImportContext) -> Result<()>;

    fn session(&mut self) -> &mut SessionState;
}

/// Resolves object references through the four tiers
pub struct ReferenceResolver {
    local: Option<LocalExportSource>,
    fetcher: Option<Box<dyn RemoteFetcher>>,
}

impl Default for ReferenceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceResolver {
    /// A resolver with only the batch and store tiers
    pub fn new() -> Self {
        Self {
            local: None,
            fetcher: None,
        }
    }

    /// Tiers as configured: a local source when an export directory is set,
    /// an HTTP fetcher when the remote service is enabled
    pub fn from_config(config: &ImportConfig) -> Self {
        let mut resolver = Self::new();
        if let Some(dir) = &config.local.export_directory {
            resolver = resolver.with_local(LocalExportSource::new(dir, config.mounts()));
        }
        if config.remote.enabled {
            let mut fetcher = HttpFetcher::new(&config.remote.url, config.remote_timeout());
            if let Some(cache_dir) = &config.remote.cache_directory {
                fetcher = fetcher.with_cache(FetchCache::new(cache_dir));
            }
            resolver = resolver.with_fetcher(Box::new(fetcher));
        }
        resolver
    }

    pub fn with_local(mut self, local: LocalExportSource) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn RemoteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn local(&self) -> Option<&LocalExportSource> {
        self.local.as_ref()
    }

    /// Resolve `reference`. `None` is a missing reference, never an error.
    pub fn resolve(
        &self,
        reference: &ObjectRef,
        table: &ExportTable,
        cx: &mut ImportContext,
        host: &mut dyn Materializer,
    ) -> Option<ObjectHandle> {
        if let Some(handle) = self.from_batch(reference, table, cx, host) {
            tracing::debug!(reference = %reference, tier = "batch", "resolved reference");
            return Some(handle);
        }

        let store_path = reference.store_path();
        if let Some(handle) = host.store().find_live(&store_path) {
            tracing::debug!(reference = %reference, tier = "store", "resolved reference");
            return Some(handle);
        }

        if let Some(handle) = self.from_local_file(reference, &store_path, cx, host) {
            tracing::debug!(reference = %reference, tier = "local", "resolved reference");
            return Some(handle);
        }

        if let Some(handle) = self.from_remote(reference, &store_path, cx, host) {
            tracing::debug!(reference = %reference, tier = "remote", "resolved reference");
            return Some(handle);
        }
        None
    }

    /// Index of the export `reference` names in the current batch
    pub fn batch_index(&self, reference: &ObjectRef, table: &ExportTable, cx: &ImportContext) -> Option<usize> {
        let package = reference.package_path();
        if !cx.locator.package_path.is_empty() && package != cx.locator.package_path {
            return None;
        }
        if let Some(index) = reference.export_index.filter(|i| *i < table.len()) {
            return Some(index);
        }
        let record = match &reference.sub_object {
            Some(sub) => table.find_by_qualified_name(Some(reference.object_name()), sub),
            None => table.find_by_qualified_name(None, reference.object_name()),
        };
        record.map(|r| r.index)
    }

    fn from_batch(
        &self,
        reference: &ObjectRef,
        table: &ExportTable,
        cx: &mut ImportContext,
        host: &mut dyn Materializer,
    ) -> Option<ObjectHandle> {
        let index = self.batch_index(reference, table, cx)?;
        host.materialize_export(table, cx, index)
    }

    fn from_local_file(
        &self,
        reference: &ObjectRef,
        store_path: &str,
        cx: &ImportContext,
        host: &mut dyn Materializer,
    ) -> Option<ObjectHandle> {
        let local = self.local.as_ref()?;
        if cx.depth >= cx.options.max_depth {
            tracing::debug!(reference = %reference, depth = cx.depth, "nesting limit reached, skipping local tier");
            return None;
        }
        let package = reference.package_path();
        let file = local.locate(package)?;
        if !host.session().attempted_files.insert(file.clone()) {
            return None;
        }

        let batch = match read_export_file(&file) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "failed to read export file");
                return None;
            }
        };
        let locator = SourceLocator {
            package_path: package.to_string(),
            file: Some(file.clone()),
        };
        if let Err(e) = host.import_nested(&batch, locator, cx) {
            tracing::warn!(file = %file.display(), error = %e, "nested import failed");
            return None;
        }
        host.store().find_live(store_path)
    }

    fn from_remote(
        &self,
        reference: &ObjectRef,
        store_path: &str,
        cx: &ImportContext,
        host: &mut dyn Materializer,
    ) -> Option<ObjectHandle> {
        let fetcher = self.fetcher.as_ref()?;
        if cx.depth >= cx.options.max_depth {
            return None;
        }
        if !host.session().attempted_remote.insert(reference.path.clone()) {
            return None;
        }

        match fetcher.fetch(&reference.path) {
            Ok(FetchResponse::Exports(batch)) => {
                let locator = SourceLocator::new(reference.package_path());
                if let Err(e) = host.import_nested(&batch, locator, cx) {
                    tracing::warn!(path = %reference.path, error = %e, "remote batch could not be imported");
                    return None;
                }
                host.store().find_live(store_path)
            }
            Ok(FetchResponse::Binary(bytes)) => {
                tracing::debug!(path = %reference.path, bytes = bytes.len(), fetcher = fetcher.name(), "remote returned a binary payload");
                None
            }
            Ok(FetchResponse::NotFound) => None,
            Err(e) => {
                tracing::warn!(path = %reference.path, fetcher = fetcher.name(), error = %e, "remote fetch failed");
                None
            }
        }
    }
}

/// Linker for exports outside any graph: nodes never link, objects go
/// through the tiers
pub struct ObjectLinker<'a> {
    pub resolver: &'a ReferenceResolver,
    pub table: &'a ExportTable,
    pub cx: &'a mut ImportContext,
    pub host: &'a mut dyn Materializer,
}

impl Linker for ObjectLinker<'_> {
    fn node_by_name(&self, _name: &str) -> Option<NodeId> {
        None
    }

    fn node_for(&self, _reference: &ObjectRef) -> Option<NodeId> {
        None
    }

    fn object_for(&mut self, reference: &ObjectRef) -> Option<ObjectHandle> {
        self.resolver.resolve(reference, self.table, self.cx, self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportOptions;
    use kiln_asset::{MockFetcher, Object};
    use kiln_schema::Fields;
    use serde_json::json;

    /// Materializes batch exports as empty objects and records nested imports
    #[derive(Default)]
    struct FakeHost {
        store: ContentStore,
        session: SessionState,
        nested: Vec<String>,
    }

    impl Materializer for FakeHost {
        fn store(&self) -> &ContentStore {
            &self.store
        }

        fn materialize_export(&mut self, table: &ExportTable, cx: &mut ImportContext, index: usize) -> Option<ObjectHandle> {
            let record = table.get(index)?;
            let path = cx.locator.object_path(record.outer.as_deref(), &record.name);
            Some(self.store.insert(Object {
                type_tag: record.type_tag.clone(),
                name: record.name.clone(),
                path,
                fields: Fields::new(),
                graph: None,
            }))
        }

        fn import_nested(&mut self, batch: &Value, locator: SourceLocator, parent: &ImportContext) -> Result<()> {
            let table = ExportTable::parse(batch)?;
            let mut cx = ImportContext::new(locator.clone(), parent.options.clone(), parent.depth + 1, table.len());
            for index in 0..table.len() {
                self.materialize_export(&table, &mut cx, index);
            }
            self.nested.push(locator.package_path);
            Ok(())
        }

        fn session(&mut self) -> &mut SessionState {
            &mut self.session
        }
    }

    fn batch() -> ExportTable {
        ExportTable::parse(&json!([
            { "Type": "Texture2D", "Name": "T_Rock" },
            { "Type": "MaterialExpressionAdd", "Name": "Add_0", "Outer": "M_Rock" }
        ]))
        .unwrap()
    }

    fn context(package: &str) -> ImportContext {
        ImportContext::new(SourceLocator::new(package), ImportOptions::default(), 0, 2)
    }

    fn reference(text: &str) -> ObjectRef {
        ObjectRef::parse(text).unwrap()
    }

    #[test]
    fn test_batch_tier_wins_over_remote() {
        let fetcher = MockFetcher::new().with_exports("/Game/T_Rock.T_Rock", json!([{ "Type": "Texture2D", "Name": "T_Rock" }]));
        let log = fetcher.log();
        let resolver = ReferenceResolver::new().with_fetcher(Box::new(fetcher));
        let table = batch();
        let mut cx = context("/Game/T_Rock");
        let mut host = FakeHost::default();

        let handle = resolver.resolve(&reference("Texture2D'/Game/T_Rock.T_Rock'"), &table, &mut cx, &mut host);
        assert!(handle.is_some());
        assert_eq!(host.store.path_of(handle.unwrap()), Some("/Game/T_Rock.T_Rock"));
        assert_eq!(log.count(), 0);
    }

    #[test]
    fn test_batch_index_forms() {
        let resolver = ReferenceResolver::new();
        let table = batch();
        let cx = context("/Game/M_Rock");

        assert_eq!(resolver.batch_index(&reference("/Game/M_Rock.1"), &table, &cx), Some(1));
        assert_eq!(resolver.batch_index(&reference("/Game/M_Rock.M_Rock:Add_0"), &table, &cx), Some(1));
        assert_eq!(resolver.batch_index(&reference("/Game/M_Rock.7"), &table, &cx), None);
        // Other packages never match the current batch
        assert_eq!(resolver.batch_index(&reference("/Game/Other.T_Rock"), &table, &cx), None);
    }

    #[test]
    fn test_store_tier() {
        let resolver = ReferenceResolver::new();
        let table = ExportTable::default();
        let mut cx = context("/Game/M_Rock");
        let mut host = FakeHost::default();
        let existing = host.store.reserve("/Engine/T_Default.T_Default", "Texture2D");

        let handle = resolver.resolve(&reference("/Engine/T_Default.T_Default"), &table, &mut cx, &mut host);
        assert_eq!(handle, Some(existing));
    }

    #[test]
    fn test_remote_tier_imports_once_per_path() {
        let fetcher = MockFetcher::new().with_exports(
            "/Game/T_Far.T_Far",
            json!({ "jsonOutput": [{ "Type": "Texture2D", "Name": "T_Far" }] }),
        );
        let log = fetcher.log();
        let resolver = ReferenceResolver::new().with_fetcher(Box::new(fetcher));
        let table = ExportTable::default();
        let mut cx = context("/Game/M_Rock");
        let mut host = FakeHost::default();

        let far = reference("/Game/T_Far.T_Far");
        assert!(resolver.resolve(&far, &table, &mut cx, &mut host).is_some());
        assert_eq!(host.nested, vec!["/Game/T_Far".to_string()]);

        let missing = reference("/Game/T_Nowhere.T_Nowhere");
        assert!(resolver.resolve(&missing, &table, &mut cx, &mut host).is_none());
        assert!(resolver.resolve(&missing, &table, &mut cx, &mut host).is_none());
        assert_eq!(log.requests(), vec!["/Game/T_Far.T_Far", "/Game/T_Nowhere.T_Nowhere"]);
    }

    #[test]
    fn test_binary_remote_payload_is_a_miss() {
        let fetcher = MockFetcher::new().with_binary("/Game/T_Raw.T_Raw", vec![0, 1, 2]);
        let resolver = ReferenceResolver::new().with_fetcher(Box::new(fetcher));
        let mut cx = context("/Game/M_Rock");
        let mut host = FakeHost::default();
        let handle = resolver.resolve(&reference("/Game/T_Raw.T_Raw"), &ExportTable::default(), &mut cx, &mut host);
        assert!(handle.is_none());
        assert!(host.nested.is_empty());
    }

    #[test]
    fn test_local_file_tier() {
        let dir = std::env::temp_dir().join(format!("kiln_resolver_test_{}", uuid::Uuid::new_v4()));
        let content = dir.join("MyGame/Content/Textures");
        std::fs::create_dir_all(&content).unwrap();
        std::fs::write(
            content.join("T_Local.json"),
            json!([{ "Type": "Texture2D", "Name": "T_Local" }]).to_string(),
        )
        .unwrap();

        let local = LocalExportSource::new(&dir, vec![kiln_export::Mount::new("/Game/", "MyGame/Content/")]);
        let resolver = ReferenceResolver::new().with_local(local);
        let mut cx = context("/Game/M_Rock");
        let mut host = FakeHost::default();

        let target = reference("/Game/Textures/T_Local.T_Local");
        let handle = resolver.resolve(&target, &ExportTable::default(), &mut cx, &mut host);
        assert!(handle.is_some());
        assert_eq!(host.nested, vec!["/Game/Textures/T_Local".to_string()]);

        // Depth bound stops the tier
        let mut deep = ImportContext::new(SourceLocator::new("/Game/M"), ImportOptions::default(), 16, 0);
        let mut fresh = FakeHost::default();
        assert!(resolver.resolve(&target, &ExportTable::default(), &mut deep, &mut fresh).is_none());

        std::fs::remove_dir_all(&dir).ok();
    }
}
