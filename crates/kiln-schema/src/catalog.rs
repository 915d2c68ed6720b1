//! TOML file format for type catalogs

use serde::Deserialize;
use std::collections::HashMap;

/// One catalog file. Every section is optional so types, structs and enums
/// can be split across files however the host likes.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default, rename = "type")]
    pub types: HashMap<String, TypeDefinition>,
    #[serde(default, rename = "struct")]
    pub structs: HashMap<String, TypeDefinition>,
    #[serde(default, rename = "enum")]
    pub enums: HashMap<String, EnumDefinition>,
    #[serde(default)]
    pub alias: Vec<AliasRule>,
    #[serde(default)]
    pub substitution: Vec<SubstitutionRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeDefinition {
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub positional_inputs: Option<String>,
    /// Kept as a raw table so declaration order survives
    #[serde(default)]
    pub fields: toml::Table,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumDefinition {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AliasRule {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubstitutionRule {
    pub pattern: String,
    pub replacement: String,
}

/// Field definition as it appears in TOML files
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldDefinition {
    Simple(String),
    Detailed(DetailedField),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetailedField {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub default: Option<toml::Value>,
    #[serde(default)]
    pub settable: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "enum")]
    pub enum_name: Option<String>,
    #[serde(default, rename = "struct")]
    pub struct_name: Option<String>,
    #[serde(default)]
    pub element: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
}

impl FieldDefinition {
    pub fn field_type(&self) -> &str {
        match self {
            FieldDefinition::Simple(t) => t,
            FieldDefinition::Detailed(d) => &d.field_type,
        }
    }

    pub fn detail(&self) -> Option<&DetailedField> {
        match self {
            FieldDefinition::Simple(_) => None,
            FieldDefinition::Detailed(d) => Some(d),
        }
    }
}

/// A field kind before named enums and structs have been told apart
#[derive(Debug, Clone, PartialEq)]
pub enum RawKind {
    Bool,
    Int(crate::IntWidth),
    Float(crate::FloatWidth),
    String,
    Name,
    Enum(String),
    Struct(String),
    /// A bare type name, either an enum or a struct
    Named(String),
    Array(Box<RawKind>),
    Reference(Option<String>),
    Pin,
}

pub fn parse_field_kind(def: &FieldDefinition) -> RawKind {
    let detail = def.detail();
    match def.field_type() {
        "enum" => match detail.and_then(|d| d.enum_name.clone()) {
            Some(name) => RawKind::Enum(name),
            None => RawKind::Name,
        },
        "struct" => RawKind::Struct(detail.and_then(|d| d.struct_name.clone()).unwrap_or_default()),
        "array" => {
            let element = detail
                .and_then(|d| d.element.as_deref())
                .map(parse_type_name)
                .unwrap_or(RawKind::String);
            RawKind::Array(Box::new(element))
        }
        "reference" => RawKind::Reference(detail.and_then(|d| d.class.clone())),
        other => parse_type_name(other),
    }
}

/// Parse a bare type name such as `f32`, `pin`, `array<pin>` or `LinearColor`
pub fn parse_type_name(type_str: &str) -> RawKind {
    use crate::{FloatWidth, IntWidth};

    if let Some(inner) = type_str.strip_prefix("array<").and_then(|s| s.strip_suffix('>')) {
        return RawKind::Array(Box::new(parse_type_name(inner)));
    }
    match type_str {
        "bool" => RawKind::Bool,
        "i8" => RawKind::Int(IntWidth::I8),
        "i16" => RawKind::Int(IntWidth::I16),
        "i32" => RawKind::Int(IntWidth::I32),
        "i64" => RawKind::Int(IntWidth::I64),
        "u8" => RawKind::Int(IntWidth::U8),
        "u16" => RawKind::Int(IntWidth::U16),
        "u32" => RawKind::Int(IntWidth::U32),
        "u64" => RawKind::Int(IntWidth::U64),
        "f32" => RawKind::Float(FloatWidth::F32),
        "f64" => RawKind::Float(FloatWidth::F64),
        "string" => RawKind::String,
        "name" => RawKind::Name,
        "reference" => RawKind::Reference(None),
        "pin" => RawKind::Pin,
        named => RawKind::Named(named.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FloatWidth, IntWidth};

    #[test]
    fn test_parse_catalog_file() {
        let toml_str = r#"
[type.MaterialExpressionAdd]
parent = "MaterialExpression"
fields = { B = "pin", A = "pin", ConstA = { type = "f32", default = 0.0 } }

[enum.EBlendMode]
values = ["BLEND_Opaque", "BLEND_Masked"]

[[alias]]
from = "Old"
to = "New"
"#;
        let file: CatalogFile = toml::from_str(toml_str).unwrap();
        let add = &file.types["MaterialExpressionAdd"];
        assert_eq!(add.parent.as_deref(), Some("MaterialExpression"));
        let names: Vec<&str> = add.fields.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "ConstA"]);
        assert_eq!(file.enums["EBlendMode"].values.len(), 2);
        assert_eq!(file.alias[0].to, "New");
    }

    #[test]
    fn test_parse_type_names() {
        assert_eq!(parse_type_name("u8"), RawKind::Int(IntWidth::U8));
        assert_eq!(parse_type_name("f64"), RawKind::Float(FloatWidth::F64));
        assert_eq!(
            parse_type_name("array<pin>"),
            RawKind::Array(Box::new(RawKind::Pin))
        );
        assert_eq!(parse_type_name("LinearColor"), RawKind::Named("LinearColor".into()));
    }

    #[test]
    fn test_detailed_field_kinds() {
        let def: FieldDefinition = toml::from_str("type = \"reference\"\nclass = \"Texture\"").unwrap();
        assert_eq!(parse_field_kind(&def), RawKind::Reference(Some("Texture".into())));

        let def: FieldDefinition = toml::from_str("type = \"array\"\nelement = \"LinearColor\"").unwrap();
        assert_eq!(
            parse_field_kind(&def),
            RawKind::Array(Box::new(RawKind::Named("LinearColor".into())))
        );
    }
}
