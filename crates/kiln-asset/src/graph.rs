//! Node graph arena for graph-shaped assets

use kiln_core::{GraphId, NodeId};
use kiln_schema::Fields;
use serde::Serialize;
use std::collections::HashMap;

/// A typed edge: `from` feeds the input named `input` on `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    /// Field path on the consuming node, e.g. `A` or `Inputs[2].Input`
    pub input: String,
    pub output_index: i32,
}

/// One node of a reconstructed graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub name: String,
    pub type_tag: String,
    pub scope: GraphId,
    pub fields: Fields,
    pub inputs: Vec<Edge>,
    pub outputs: Vec<Edge>,
    /// Original tag when this node is a placeholder for a missing type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_type: Option<String>,
    /// Sub-scope owned by a composite node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<GraphId>,
}

impl GraphNode {
    pub fn is_placeholder(&self) -> bool {
        self.missing_type.is_some()
    }
}

/// A set of nodes sharing one owner: the graph itself or a composite node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphScope {
    pub id: GraphId,
    pub owner: Option<NodeId>,
    pub nodes: Vec<NodeId>,
}

/// Arena of nodes addressed by id and by name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeGraph {
    nodes: Vec<GraphNode>,
    scopes: Vec<GraphScope>,
    #[serde(skip)]
    by_name: HashMap<String, NodeId>,
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeGraph {
    /// Create a graph with an empty root scope
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            scopes: vec![GraphScope {
                id: GraphId::ROOT,
                owner: None,
                nodes: Vec::new(),
            }],
            by_name: HashMap::new(),
        }
    }

    /// Open a sub-scope owned by `owner`
    pub fn add_scope(&mut self, owner: NodeId) -> GraphId {
        let id = GraphId::from_index(self.scopes.len());
        self.scopes.push(GraphScope {
            id,
            owner: Some(owner),
            nodes: Vec::new(),
        });
        if let Some(node) = self.nodes.get_mut(owner.index()) {
            node.subgraph = Some(id);
        }
        id
    }

    /// Add a node. Returns `None` if the name is already taken or the scope
    /// does not exist.
    pub fn add_node(&mut self, scope: GraphId, name: &str, type_tag: &str, fields: Fields) -> Option<NodeId> {
        if self.by_name.contains_key(name) || scope.index() >= self.scopes.len() {
            return None;
        }
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(GraphNode {
            id,
            name: name.to_string(),
            type_tag: type_tag.to_string(),
            scope,
            fields,
            inputs: Vec::new(),
            outputs: Vec::new(),
            missing_type: None,
            subgraph: None,
        });
        self.scopes[scope.index()].nodes.push(id);
        self.by_name.insert(name.to_string(), id);
        Some(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id.index())
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    pub fn scope(&self, id: GraphId) -> Option<&GraphScope> {
        self.scopes.get(id.index())
    }

    pub fn scopes(&self) -> &[GraphScope] {
        &self.scopes
    }

    /// Record an edge on both endpoints
    pub fn connect(&mut self, edge: Edge) -> bool {
        if edge.from.index() >= self.nodes.len() || edge.to.index() >= self.nodes.len() {
            return false;
        }
        self.nodes[edge.from.index()].outputs.push(edge.clone());
        self.nodes[edge.to.index()].inputs.push(edge);
        true
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.nodes.iter().flat_map(|n| n.inputs.iter())
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.inputs.len()).sum()
    }

    pub fn placeholder_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_placeholder()).count()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup_nodes() {
        let mut graph = NodeGraph::new();
        let add = graph
            .add_node(GraphId::ROOT, "Add_0", "MaterialExpressionAdd", Fields::new())
            .unwrap();
        let constant = graph
            .add_node(GraphId::ROOT, "Const_0", "MaterialExpressionConstant", Fields::new())
            .unwrap();

        assert_eq!(graph.node_by_name("Const_0"), Some(constant));
        assert_eq!(graph.node(add).unwrap().type_tag, "MaterialExpressionAdd");
        assert_eq!(graph.scope(GraphId::ROOT).unwrap().nodes, vec![add, constant]);
        assert!(graph.add_node(GraphId::ROOT, "Add_0", "Other", Fields::new()).is_none());
    }

    #[test]
    fn test_connect_records_both_ends() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node(GraphId::ROOT, "A", "T", Fields::new()).unwrap();
        let b = graph.add_node(GraphId::ROOT, "B", "T", Fields::new()).unwrap();

        assert!(graph.connect(Edge { from: b, to: a, input: "A".into(), output_index: 0 }));
        assert_eq!(graph.node(a).unwrap().inputs.len(), 1);
        assert_eq!(graph.node(b).unwrap().outputs[0].to, a);
        assert_eq!(graph.edge_count(), 1);
        assert!(!graph.connect(Edge { from: NodeId(9), to: a, input: "B".into(), output_index: 0 }));
    }

    #[test]
    fn test_sub_scope_ownership() {
        let mut graph = NodeGraph::new();
        let composite = graph
            .add_node(GraphId::ROOT, "Composite_0", "MaterialExpressionComposite", Fields::new())
            .unwrap();
        let scope = graph.add_scope(composite);
        let inner = graph.add_node(scope, "Inner_0", "MaterialExpressionAdd", Fields::new()).unwrap();

        assert_eq!(graph.node(composite).unwrap().subgraph, Some(scope));
        assert_eq!(graph.scope(scope).unwrap().owner, Some(composite));
        assert_eq!(graph.node(inner).unwrap().scope, scope);
        assert!(graph.add_node(GraphId(7), "Lost", "T", Fields::new()).is_none());
    }
}
