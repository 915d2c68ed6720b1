//! Runtime objects

use crate::graph::NodeGraph;
use kiln_schema::{Fields, TypeDescriptor, Value};
use serde::Serialize;

/// A live object owned by the content store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Object {
    pub type_tag: String,
    pub name: String,
    /// Content-store path, `/Pkg/Path.Name` or `/Pkg/Path.Outer:Name`
    pub path: String,
    pub fields: Fields,
    /// Present on graph-shaped assets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<NodeGraph>,
}

impl Object {
    /// Construct a default instance of `descriptor`
    pub fn construct(descriptor: &TypeDescriptor, name: &str, path: &str) -> Self {
        Self {
            type_tag: descriptor.type_tag.clone(),
            name: name.to_string(),
            path: path.to_string(),
            fields: descriptor.construct(),
            graph: None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}
