//! Type and field descriptors

use crate::value::{Fields, PinLink, Value};
use serde::{Deserialize, Serialize};

/// Integer storage width of a primitive field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntWidth {
    /// Inclusive range representable by this width
    pub fn range(self) -> (i128, i128) {
        match self {
            IntWidth::I8 => (i8::MIN as i128, i8::MAX as i128),
            IntWidth::I16 => (i16::MIN as i128, i16::MAX as i128),
            IntWidth::I32 => (i32::MIN as i128, i32::MAX as i128),
            IntWidth::I64 => (i64::MIN as i128, i64::MAX as i128),
            IntWidth::U8 => (0, u8::MAX as i128),
            IntWidth::U16 => (0, u16::MAX as i128),
            IntWidth::U32 => (0, u32::MAX as i128),
            // Stored as i64, so the upper half of u64 is out of reach
            IntWidth::U64 => (0, i64::MAX as i128),
        }
    }
}

/// Float storage width of a primitive field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatWidth {
    F32,
    F64,
}

/// The declared kind of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    Bool,
    Int(IntWidth),
    Float(FloatWidth),
    String,
    Name,
    Enum { enum_name: String },
    Struct { struct_name: String },
    Array { element: Box<FieldKind> },
    Reference { class: Option<String> },
    /// An expression input edge to a sibling graph node
    Pin,
}

/// The closed set of assignment strategies the deserializer dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCategory {
    Primitive,
    Enum,
    Struct,
    Array,
    Reference,
}

impl FieldKind {
    pub fn category(&self) -> ValueCategory {
        match self {
            FieldKind::Bool
            | FieldKind::Int(_)
            | FieldKind::Float(_)
            | FieldKind::String
            | FieldKind::Name => ValueCategory::Primitive,
            FieldKind::Enum { .. } => ValueCategory::Enum,
            FieldKind::Struct { .. } => ValueCategory::Struct,
            FieldKind::Array { .. } => ValueCategory::Array,
            FieldKind::Reference { .. } | FieldKind::Pin => ValueCategory::Reference,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            FieldKind::Bool => "bool".to_string(),
            FieldKind::Int(w) => format!("{:?}", w).to_lowercase(),
            FieldKind::Float(w) => format!("{:?}", w).to_lowercase(),
            FieldKind::String => "string".to_string(),
            FieldKind::Name => "name".to_string(),
            FieldKind::Enum { enum_name } => format!("enum {}", enum_name),
            FieldKind::Struct { struct_name } => format!("struct {}", struct_name),
            FieldKind::Array { element } => format!("array<{}>", element.type_name()),
            FieldKind::Reference { class: Some(c) } => format!("reference<{}>", c),
            FieldKind::Reference { class: None } => "reference".to_string(),
            FieldKind::Pin => "pin".to_string(),
        }
    }

    /// Zero value used when a field declares no default. Enum and struct
    /// defaults need the catalog and are filled in by the registry.
    pub fn zero_value(&self) -> Value {
        match self {
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Int(_) => Value::Int(0),
            FieldKind::Float(_) => Value::Float(0.0),
            FieldKind::String => Value::Str(String::new()),
            FieldKind::Name => Value::Name("None".to_string()),
            FieldKind::Enum { .. } => Value::Enum(String::new()),
            FieldKind::Struct { .. } => Value::Struct(Fields::new()),
            FieldKind::Array { .. } => Value::Array(Vec::new()),
            FieldKind::Reference { .. } => Value::Object(None),
            FieldKind::Pin => Value::Pin(PinLink::default()),
        }
    }
}

/// One reflected field of a type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub default: Value,
    /// Whether the host allows this field to be assigned
    pub settable: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// A constructible runtime type with its flattened field list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub type_tag: String,
    /// Own tag first, then each ancestor up the parent chain
    pub lineage: Vec<String>,
    pub fields: Vec<FieldDescriptor>,
    /// Structs are value types nested inside objects, never constructed alone
    pub is_struct: bool,
    /// Name of an array-of-pins field assigned by position
    #[serde(default)]
    pub positional_inputs: Option<String>,
    /// Inert stand-in for a type that could not be resolved
    #[serde(default)]
    pub placeholder: bool,
}

impl TypeDescriptor {
    /// An empty type. Mostly useful for tests and fallback factories.
    pub fn new(type_tag: impl Into<String>) -> Self {
        let type_tag = type_tag.into();
        Self {
            lineage: vec![type_tag.clone()],
            type_tag,
            fields: Vec::new(),
            is_struct: false,
            positional_inputs: None,
            placeholder: false,
        }
    }

    /// A field-less, inert node type standing in for `missing_tag`
    pub fn placeholder(missing_tag: &str) -> Self {
        let mut desc = Self::new(missing_tag);
        desc.placeholder = true;
        desc
    }

    pub fn with_field(mut self, name: &str, kind: FieldKind) -> Self {
        let default = kind.zero_value();
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            kind,
            default,
            settable: true,
            description: None,
        });
        self
    }

    pub fn with_default(mut self, name: &str, default: Value) -> Self {
        if let Some(field) = self.fields.iter_mut().find(|f| f.name == name) {
            field.default = default;
        }
        self
    }

    pub fn with_positional_inputs(mut self, field: &str) -> Self {
        self.positional_inputs = Some(field.to_string());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// True when `tag` is this type or one of its ancestors
    pub fn is_a(&self, tag: &str) -> bool {
        self.lineage.iter().any(|t| t == tag)
    }

    /// Build a default instance's field values
    pub fn construct(&self) -> Fields {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.default.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_uses_defaults_in_declared_order() {
        let desc = TypeDescriptor::new("CurveFloat")
            .with_field("Bias", FieldKind::Float(FloatWidth::F32))
            .with_field("Enabled", FieldKind::Bool)
            .with_default("Bias", Value::Float(0.5));

        let fields = desc.construct();
        assert_eq!(fields.names(), vec!["Bias", "Enabled"]);
        assert_eq!(fields.get("Bias"), Some(&Value::Float(0.5)));
        assert_eq!(fields.get("Enabled"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_categories() {
        assert_eq!(FieldKind::Pin.category(), ValueCategory::Reference);
        assert_eq!(FieldKind::Name.category(), ValueCategory::Primitive);
        assert_eq!(
            FieldKind::Array { element: Box::new(FieldKind::Pin) }.category(),
            ValueCategory::Array
        );
    }

    #[test]
    fn test_int_width_ranges() {
        assert_eq!(IntWidth::U8.range(), (0, 255));
        assert_eq!(IntWidth::I16.range(), (-32768, 32767));
    }

    #[test]
    fn test_placeholder_is_inert() {
        let desc = TypeDescriptor::placeholder("UnknownNode");
        assert!(desc.placeholder);
        assert!(desc.fields.is_empty());
        assert!(desc.is_a("UnknownNode"));
    }
}
