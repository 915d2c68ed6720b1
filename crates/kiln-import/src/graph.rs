//! Two-phase reconstruction of graph-shaped assets
//!
//! Phase 1 creates a node for every member export, placeholders included,
//! so that every name in scope is addressable. Phase 2 applies payloads and
//! turns pin and reference fields that name siblings into edges. Because
//! edges are only resolved once every node exists, the order of exports in
//! the batch does not matter.

use crate::config::{GraphFamily, Membership};
use crate::context::ImportContext;
use crate::deserializer::{Linker, PropertyDeserializer};
use crate::resolver::{Materializer, ObjectLinker, ReferenceResolver};
use kiln_asset::{Edge, NodeGraph, Object};
use kiln_core::{Diagnostic, Diagnostics, GraphId, NodeId, ObjectHandle};
use kiln_export::{ExportTable, ObjectRef};
use kiln_schema::{TypeDescriptor, TypeRegistry, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Which exports make up one graph asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphPlan {
    pub asset: usize,
    /// The `<Type>EditorOnlyData` sibling, when the family has one
    pub editor_data: Option<usize>,
    /// Node exports in batch order
    pub members: Vec<usize>,
}

impl GraphPlan {
    /// Every export the graph consumes besides the asset itself
    pub fn claimed(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().copied().chain(self.editor_data)
    }
}

/// Diagnostics of one reconstruction. The graph itself is stored on the asset.
#[derive(Debug, Default)]
pub struct GraphBuild {
    pub asset_diagnostics: Diagnostics,
    /// Per member export, including the editor-data export
    pub member_diagnostics: Vec<(usize, Diagnostics)>,
    pub failed: bool,
}

/// Links pin and reference fields to sibling nodes before falling back to
/// the resolver tiers
pub struct GraphLinker<'a> {
    pub graph: &'a NodeGraph,
    pub objects: ObjectLinker<'a>,
}

impl Linker for GraphLinker<'_> {
    fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.graph.node_by_name(name)
    }

    fn node_for(&self, reference: &ObjectRef) -> Option<NodeId> {
        let package = self.objects.cx.locator.package_path.as_str();
        if !package.is_empty() && reference.package_path() != package {
            return None;
        }
        if let Some(record) = reference.export_index.and_then(|i| self.objects.table.get(i)) {
            return self.graph.node_by_name(&record.name);
        }
        self.graph.node_by_name(reference.export_name())
    }

    fn object_for(&mut self, reference: &ObjectRef) -> Option<ObjectHandle> {
        self.objects.object_for(reference)
    }
}

struct NodeEntry {
    index: usize,
    node: NodeId,
    descriptor: Arc<TypeDescriptor>,
}

/// Node ids of one scope and the sub-scopes opened inside it
struct ScopeTree {
    interior: Vec<NodeEntry>,
    boundary: Vec<NodeEntry>,
    children: Vec<ScopeTree>,
}

/// Rebuilds graph assets for the configured families
pub struct GraphReconstructor {
    deserializer: PropertyDeserializer,
    families: Vec<GraphFamily>,
}

impl GraphReconstructor {
    pub fn new(deserializer: PropertyDeserializer, families: Vec<GraphFamily>) -> Self {
        Self { deserializer, families }
    }

    pub fn families(&self) -> &[GraphFamily] {
        &self.families
    }

    fn registry(&self) -> &TypeRegistry {
        self.deserializer.registry()
    }

    /// The family an asset type belongs to, by tag or by ancestry
    pub fn family_for(&self, type_tag: &str) -> Option<&GraphFamily> {
        if let Some(family) = self.families.iter().find(|f| f.asset_type == type_tag) {
            return Some(family);
        }
        let descriptor = self.registry().resolve(type_tag)?;
        self.families.iter().find(|f| descriptor.is_a(&f.asset_type))
    }

    /// Find the member and editor-data exports of the asset at `asset`
    pub fn plan(&self, family: &GraphFamily, table: &ExportTable, asset: usize) -> GraphPlan {
        let Some(record) = table.get(asset) else {
            return GraphPlan {
                asset,
                editor_data: None,
                members: Vec::new(),
            };
        };

        let editor_data = if family.editor_data {
            let by_type = [
                format!("{}EditorOnlyData", record.type_tag),
                format!("{}EditorOnlyData", family.asset_type),
            ];
            let by_name = format!("{}EditorOnlyData", record.name);
            table
                .iter()
                .find(|r| r.index != asset && (by_type.contains(&r.type_tag) || r.name == by_name))
                .map(|r| r.index)
        } else {
            None
        };

        let candidates = match &family.membership {
            Membership::Outer => table.filter_by_outer(&record.name),
            Membership::TypePrefix(prefix) => table.filter_by_type_prefix(prefix),
        };
        let members = candidates
            .into_iter()
            .map(|r| r.index)
            .filter(|i| *i != asset && Some(*i) != editor_data)
            .collect();

        GraphPlan {
            asset,
            editor_data,
            members,
        }
    }

    /// Build the asset's node graph onto `asset` and apply the asset's own
    /// and editor-data payloads with sibling lookup.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        &self,
        family: &GraphFamily,
        plan: &GraphPlan,
        asset: &mut Object,
        asset_descriptor: &TypeDescriptor,
        resolver: &ReferenceResolver,
        table: &ExportTable,
        cx: &mut ImportContext,
        host: &mut dyn Materializer,
    ) -> GraphBuild {
        let mut build = GraphBuild::default();
        let Some(record) = table.get(plan.asset) else {
            build.failed = true;
            return build;
        };

        let editor_payload = match plan.editor_data.and_then(|i| table.get(i)) {
            Some(editor) => Some(editor.merged_properties()),
            None => {
                // Older exports keep the graph on the primary export
                let primary_carries_graph = family
                    .node_list_fields
                    .iter()
                    .any(|f| record.property(f).is_some());
                if family.editor_data && !primary_carries_graph {
                    build.asset_diagnostics.push(Diagnostic::structural(
                        &format!("{}EditorOnlyData", record.type_tag),
                        &record.name,
                        "editor-only graph data missing",
                    ));
                    build.failed = true;
                    return build;
                }
                None
            }
        };
        if plan.members.is_empty() {
            build
                .asset_diagnostics
                .push(Diagnostic::structural(&record.name, &record.name, "graph has no nodes"));
            build.failed = true;
            return build;
        }

        let mut diagnostics: HashMap<usize, Diagnostics> = HashMap::new();
        let mut graph = NodeGraph::new();
        let (owners, cyclic) = self.composite_owners(family, plan, table);
        for member in cyclic {
            if let Some(r) = table.get(member) {
                diagnostics.entry(member).or_default().push(Diagnostic::malformed(
                    &family.owner_field,
                    &r.name,
                    "composite owner cycle; node kept in the enclosing scope",
                ));
            }
        }

        // Phase 1 over every scope
        let roots: Vec<usize> = plan
            .members
            .iter()
            .copied()
            .filter(|m| !owners.contains_key(m))
            .collect();
        let tree = self.create_scope(family, GraphId::ROOT, &roots, &owners, table, &mut graph, &mut diagnostics);
        tracing::debug!(
            asset = %record.name,
            nodes = graph.len(),
            placeholders = graph.placeholder_count(),
            "graph nodes created"
        );

        // Phase 2
        self.wire_scope(family, &tree, resolver, table, cx, host, &mut graph, &mut diagnostics);

        let mut linker = GraphLinker {
            graph: &graph,
            objects: ObjectLinker {
                resolver,
                table,
                cx,
                host,
            },
        };
        let payload = record.merged_properties();
        build.asset_diagnostics.extend(self.deserializer.apply(
            &payload,
            &mut asset.fields,
            asset_descriptor,
            &mut linker,
            &record.name,
        ));
        if let Some(editor_payload) = editor_payload {
            let excluded: Vec<&str> = family.excluded_fields.iter().map(String::as_str).collect();
            build.asset_diagnostics.extend(self.deserializer.apply_except(
                &editor_payload,
                &mut asset.fields,
                asset_descriptor,
                &mut linker,
                &record.name,
                &excluded,
            ));
        }

        tracing::debug!(
            asset = %record.name,
            nodes = graph.len(),
            edges = graph.edge_count(),
            "graph reconstructed"
        );
        asset.graph = Some(graph);

        build.member_diagnostics = plan
            .claimed()
            .map(|m| (m, diagnostics.remove(&m).unwrap_or_default()))
            .collect();
        build
    }

    /// Member -> composite member owning it, read from the owner field.
    /// Members on an owner cycle lose their owner and are returned separately.
    fn composite_owners(
        &self,
        family: &GraphFamily,
        plan: &GraphPlan,
        table: &ExportTable,
    ) -> (HashMap<usize, usize>, Vec<usize>) {
        let composites: Vec<usize> = plan
            .members
            .iter()
            .copied()
            .filter(|m| {
                table
                    .get(*m)
                    .map(|r| self.is_kind(&r.type_tag, &family.composite_types))
                    .unwrap_or(false)
            })
            .collect();
        if composites.is_empty() {
            return (HashMap::new(), Vec::new());
        }

        let mut owners = HashMap::new();
        for &member in &plan.members {
            let Some(raw) = table.get(member).and_then(|r| r.property(&family.owner_field)) else {
                continue;
            };
            let Ok(Some(reference)) = ObjectRef::from_json(raw, self.deserializer.rules()) else {
                continue;
            };
            let owner = composites.iter().copied().find(|c| {
                reference.export_index == Some(*c)
                    || table.get(*c).map(|r| r.name == reference.export_name()).unwrap_or(false)
            });
            if let Some(owner) = owner.filter(|o| *o != member) {
                owners.insert(member, owner);
            }
        }

        let mut cyclic: Vec<usize> = owners
            .keys()
            .copied()
            .filter(|&member| {
                let mut current = owners.get(&member).copied();
                for _ in 0..owners.len() {
                    match current {
                        Some(c) if c == member => return true,
                        Some(c) => current = owners.get(&c).copied(),
                        None => return false,
                    }
                }
                false
            })
            .collect();
        cyclic.sort_unstable();
        for member in &cyclic {
            owners.remove(member);
        }
        (owners, cyclic)
    }

    fn is_kind(&self, type_tag: &str, kinds: &[String]) -> bool {
        if kinds.iter().any(|k| k == type_tag) {
            return true;
        }
        self.registry()
            .resolve(type_tag)
            .map(|d| kinds.iter().any(|k| d.is_a(k)))
            .unwrap_or(false)
    }

    #[allow(clippy::too_many_arguments)]
    fn create_scope(
        &self,
        family: &GraphFamily,
        scope: GraphId,
        members: &[usize],
        owners: &HashMap<usize, usize>,
        table: &ExportTable,
        graph: &mut NodeGraph,
        diagnostics: &mut HashMap<usize, Diagnostics>,
    ) -> ScopeTree {
        let mut tree = ScopeTree {
            interior: Vec::new(),
            boundary: Vec::new(),
            children: Vec::new(),
        };
        let mut composites = Vec::new();

        for &member in members {
            let Some(record) = table.get(member) else {
                continue;
            };
            let member_diagnostics = diagnostics.entry(member).or_default();
            let resolved = self
                .registry()
                .resolve_for(&record.type_tag, &record.name, member_diagnostics);
            let missing = resolved.is_none();
            let descriptor = resolved.unwrap_or_else(|| {
                let stand_in = self
                    .registry()
                    .fallback(&record.type_tag)
                    .map(|factory| factory(&record.type_tag))
                    .unwrap_or_else(|| TypeDescriptor::placeholder(&record.type_tag));
                Arc::new(stand_in)
            });

            let Some(node) = graph.add_node(scope, &record.name, &record.type_tag, descriptor.construct()) else {
                member_diagnostics.push(Diagnostic::structural(
                    &record.name,
                    &record.name,
                    "duplicate node name in graph",
                ));
                continue;
            };
            if missing {
                if let Some(n) = graph.node_mut(node) {
                    n.missing_type = Some(record.type_tag.clone());
                }
            }

            let entry = NodeEntry {
                index: member,
                node,
                descriptor,
            };
            // A placeholder composite still hosts the members it owns
            if self.is_kind(&record.type_tag, &family.composite_types) || owners.values().any(|o| *o == member) {
                composites.push(node);
            }
            if self.is_kind(&record.type_tag, &family.boundary_types) {
                tree.boundary.push(entry);
            } else {
                tree.interior.push(entry);
            }
        }

        for composite in composites {
            let Some(owner_index) = tree
                .interior
                .iter()
                .chain(tree.boundary.iter())
                .find(|e| e.node == composite)
                .map(|e| e.index)
            else {
                continue;
            };
            let mut children: Vec<usize> = owners
                .iter()
                .filter(|(_, o)| **o == owner_index)
                .map(|(m, _)| *m)
                .collect();
            children.sort_unstable();
            let sub = graph.add_scope(composite);
            let subtree = self.create_scope(family, sub, &children, owners, table, graph, diagnostics);
            tree.children.push(subtree);
        }
        tree
    }

    #[allow(clippy::too_many_arguments)]
    fn wire_scope(
        &self,
        family: &GraphFamily,
        tree: &ScopeTree,
        resolver: &ReferenceResolver,
        table: &ExportTable,
        cx: &mut ImportContext,
        host: &mut dyn Materializer,
        graph: &mut NodeGraph,
        diagnostics: &mut HashMap<usize, Diagnostics>,
    ) {
        for entry in &tree.interior {
            self.wire_node(family, entry, resolver, table, cx, host, graph, diagnostics);
        }
        for child in &tree.children {
            self.wire_scope(family, child, resolver, table, cx, host, graph, diagnostics);
        }
        for entry in &tree.boundary {
            self.wire_node(family, entry, resolver, table, cx, host, graph, diagnostics);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn wire_node(
        &self,
        family: &GraphFamily,
        entry: &NodeEntry,
        resolver: &ReferenceResolver,
        table: &ExportTable,
        cx: &mut ImportContext,
        host: &mut dyn Materializer,
        graph: &mut NodeGraph,
        diagnostics: &mut HashMap<usize, Diagnostics>,
    ) {
        let Some(record) = table.get(entry.index) else {
            return;
        };
        let Some(mut fields) = graph.node_mut(entry.node).map(|n| std::mem::take(&mut n.fields)) else {
            return;
        };
        let payload = record.merged_properties();
        let mut skip = vec![family.owner_field.as_str()];
        if let Some(positional) = entry.descriptor.positional_inputs.as_deref() {
            skip.push(positional);
        }

        let mut node_diagnostics = {
            let mut linker = GraphLinker {
                graph: &*graph,
                objects: ObjectLinker {
                    resolver,
                    table,
                    cx: &mut *cx,
                    host: &mut *host,
                },
            };
            let mut found = self.deserializer.apply_except(
                &payload,
                &mut fields,
                &entry.descriptor,
                &mut linker,
                &record.name,
                &skip,
            );
            found.extend(self.deserializer.assign_positional(
                &payload,
                &mut fields,
                &entry.descriptor,
                &mut linker,
                &record.name,
            ));
            found
        };

        let mut edges = Vec::new();
        for (name, value) in fields.iter() {
            value.visit_links(name, &mut |path, from, link| {
                let output_index = match link {
                    Value::Pin(pin) => pin.output_index,
                    _ => 0,
                };
                edges.push(Edge {
                    from,
                    to: entry.node,
                    input: path.to_string(),
                    output_index,
                });
            });
        }
        if let Some(node) = graph.node_mut(entry.node) {
            node.fields = fields;
        }
        for edge in edges {
            if !graph.connect(edge) {
                node_diagnostics.push(Diagnostic::malformed(&record.name, &record.name, "edge to an unknown node"));
            }
        }
        diagnostics.entry(entry.index).or_default().extend(node_diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_export::PathRules;
    use serde_json::json;

    fn reconstructor() -> GraphReconstructor {
        let mut registry = TypeRegistry::new();
        registry
            .load_string(
                r#"
[type.Material]
[type.MaterialInstanceConstant]
[type.DecalMaterial]
parent = "Material"
[type.SoundCue]
"#,
            )
            .unwrap();
        let deserializer = PropertyDeserializer::new(Arc::new(registry), Arc::new(PathRules::default()));
        GraphReconstructor::new(deserializer, GraphFamily::defaults())
    }

    fn material_batch() -> ExportTable {
        ExportTable::parse(&json!([
            { "Type": "MaterialExpressionAdd", "Name": "Add_0", "Outer": "M_Rock" },
            { "Type": "Material", "Name": "M_Rock" },
            { "Type": "MaterialEditorOnlyData", "Name": "M_RockEditorOnlyData", "Outer": "M_Rock" },
            { "Type": "Texture2D", "Name": "T_Rock" },
            { "Type": "MaterialExpressionConstant", "Name": "Const_0", "Outer": "M_Rock" }
        ]))
        .unwrap()
    }

    #[test]
    fn test_family_for() {
        let graph = reconstructor();
        assert_eq!(graph.family_for("Material").unwrap().asset_type, "Material");
        assert_eq!(graph.family_for("DecalMaterial").unwrap().asset_type, "Material");
        assert!(graph.family_for("MaterialInstanceConstant").is_none());
        assert!(graph.family_for("Unknown").is_none());
    }

    #[test]
    fn test_plan_by_outer() {
        let graph = reconstructor();
        let table = material_batch();
        let family = graph.family_for("Material").unwrap().clone();
        let plan = graph.plan(&family, &table, 1);
        assert_eq!(plan.editor_data, Some(2));
        assert_eq!(plan.members, vec![0, 4]);
        assert_eq!(plan.claimed().collect::<Vec<_>>(), vec![0, 4, 2]);
    }

    #[test]
    fn test_plan_by_type_prefix() {
        let graph = reconstructor();
        let table = ExportTable::parse(&json!([
            { "Type": "SoundCue", "Name": "SC_Door" },
            { "Type": "SoundNodeWavePlayer", "Name": "SoundNodeWavePlayer_0", "Outer": "SC_Door" },
            { "Type": "SoundWave", "Name": "Door" },
            { "Type": "SoundNodeRandom", "Name": "SoundNodeRandom_0" }
        ]))
        .unwrap();
        let family = graph.family_for("SoundCue").unwrap().clone();
        let plan = graph.plan(&family, &table, 0);
        assert_eq!(plan.editor_data, None);
        assert_eq!(plan.members, vec![1, 3]);
    }
}
