//! Runtime values held by constructed objects

use kiln_core::{NodeId, ObjectHandle};
use serde::{Deserialize, Serialize};

/// A field value on a runtime object.
///
/// References come in two flavours: `Object` points at an asset in the
/// content store, `Node` and `Pin` point at a sibling node inside the same
/// graph scope. Any of them may be unresolved (`None`), which is a valid state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Enum(String),
    Struct(Fields),
    Array(Vec<Value>),
    Object(Option<ObjectHandle>),
    Node(Option<NodeId>),
    Pin(PinLink),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Name(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Fields> {
        match self {
            Value::Struct(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Value::Object(h) => *h,
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(n) => *n,
            Value::Pin(pin) => pin.node,
            _ => None,
        }
    }

    /// Visit every node link reachable from this value, depth first.
    /// The callback receives the field path (`Inputs[2]`, `Color.R`) and the link.
    pub fn visit_links(&self, path: &str, visit: &mut dyn FnMut(&str, NodeId, &Value)) {
        match self {
            Value::Node(Some(id)) => visit(path, *id, self),
            Value::Pin(PinLink { node: Some(id), .. }) => visit(path, *id, self),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.visit_links(&format!("{}[{}]", path, i), visit);
                }
            }
            Value::Struct(fields) => {
                for (name, item) in fields.iter() {
                    item.visit_links(&format!("{}.{}", path, name), visit);
                }
            }
            _ => {}
        }
    }
}

/// Channel mask carried by an expression input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMask {
    pub mask: i32,
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub a: i32,
}

/// An expression input: which sibling node feeds it and through which output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinLink {
    pub node: Option<NodeId>,
    pub output_index: i32,
    #[serde(default)]
    pub input_name: Option<String>,
    #[serde(default)]
    pub mask: Option<ChannelMask>,
}

/// Ordered named values. Order follows the declaring type's field list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.0.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Replace an existing value in place or append a new one
    pub fn set(&mut self, name: &str, value: Value) {
        match self.get_mut(name) {
            Some(slot) => *slot = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (name, value) in iter {
            fields.set(&name, value);
        }
        fields
    }
}
