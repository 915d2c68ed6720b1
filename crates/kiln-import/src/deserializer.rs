//! Descriptor-driven property assignment
//!
//! A payload is applied field by field against a type's descriptor. Each
//! field is dispatched on its declared kind to one of a small set of
//! strategies (primitive, enum, struct, array, reference). A failing field
//! keeps its previous value and records a diagnostic; the rest of the
//! payload is still applied.

use kiln_core::{Diagnostic, DiagnosticKind, Diagnostics, NodeId, ObjectHandle};
use kiln_export::{ObjectRef, PathRules, PropertyPayload};
use kiln_schema::{
    ChannelMask, FieldKind, FloatWidth, Fields, IntWidth, PinLink, TypeDescriptor, TypeRegistry, Value,
};
use serde_json::Value as Json;
use std::sync::Arc;

/// How reference-typed fields find their targets
pub trait Linker {
    /// A sibling node of the graph being built, by export name
    fn node_by_name(&self, name: &str) -> Option<NodeId>;

    /// A sibling node the reference points at
    fn node_for(&self, reference: &ObjectRef) -> Option<NodeId>;

    /// Resolve an object reference to a store handle
    fn object_for(&mut self, reference: &ObjectRef) -> Option<ObjectHandle>;
}

/// Applies property payloads onto field sets
#[derive(Debug, Clone)]
pub struct PropertyDeserializer {
    registry: Arc<TypeRegistry>,
    rules: Arc<PathRules>,
}

impl PropertyDeserializer {
    pub fn new(registry: Arc<TypeRegistry>, rules: Arc<PathRules>) -> Self {
        Self { registry, rules }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn rules(&self) -> &PathRules {
        &self.rules
    }

    /// Apply every field present in both `payload` and `descriptor`.
    ///
    /// Payload fields the type does not declare are ignored. Declared fields
    /// absent from the payload keep their current value. Never fails.
    pub fn apply(
        &self,
        payload: &PropertyPayload,
        target: &mut Fields,
        descriptor: &TypeDescriptor,
        linker: &mut dyn Linker,
        context: &str,
    ) -> Diagnostics {
        self.apply_except(payload, target, descriptor, linker, context, &[])
    }

    /// Like `apply`, leaving the named fields alone
    pub fn apply_except(
        &self,
        payload: &PropertyPayload,
        target: &mut Fields,
        descriptor: &TypeDescriptor,
        linker: &mut dyn Linker,
        context: &str,
        skip: &[&str],
    ) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        self.apply_fields(payload, target, descriptor, linker, context, "", skip, &mut diagnostics);
        diagnostics
    }

    /// Assign the descriptor's array-of-pins field by position.
    ///
    /// Slot `i` of the payload array goes to slot `i` of the field. Slots the
    /// payload does not mention, or mentions as `null`, keep their value.
    pub fn assign_positional(
        &self,
        payload: &PropertyPayload,
        target: &mut Fields,
        descriptor: &TypeDescriptor,
        linker: &mut dyn Linker,
        context: &str,
    ) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        let Some(field_name) = descriptor.positional_inputs.as_deref() else {
            return diagnostics;
        };
        let Some(raw) = payload.get(field_name) else {
            return diagnostics;
        };
        let element = match descriptor.field(field_name).map(|f| &f.kind) {
            Some(FieldKind::Array { element }) => element.as_ref(),
            _ => {
                diagnostics.push(Diagnostic::malformed(
                    field_name,
                    context,
                    "positional inputs must be a declared array field",
                ));
                return diagnostics;
            }
        };
        let Json::Array(items) = raw else {
            diagnostics.push(Diagnostic::malformed(
                field_name,
                context,
                format!("expected an array, found {}", json_kind(raw)),
            ));
            return diagnostics;
        };

        let mut slots: Vec<Value> = target
            .get(field_name)
            .and_then(Value::as_array)
            .map(|a| a.to_vec())
            .unwrap_or_default();
        for (i, item) in items.iter().enumerate() {
            if slots.len() <= i {
                slots.push(self.element_default(element));
            }
            if item.is_null() {
                continue;
            }
            let path = format!("{}[{}]", field_name, i);
            if let Some(value) = self.convert(element, item, &slots[i], &path, linker, context, &mut diagnostics) {
                slots[i] = value;
            }
        }
        target.set(field_name, Value::Array(slots));
        diagnostics
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_fields(
        &self,
        payload: &PropertyPayload,
        target: &mut Fields,
        descriptor: &TypeDescriptor,
        linker: &mut dyn Linker,
        context: &str,
        prefix: &str,
        skip: &[&str],
        diagnostics: &mut Diagnostics,
    ) {
        for field in &descriptor.fields {
            if skip.contains(&field.name.as_str()) {
                continue;
            }
            let Some(raw) = payload.get(&field.name) else {
                continue;
            };
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{}.{}", prefix, field.name)
            };
            if !field.settable {
                diagnostics.push(Diagnostic::malformed(&path, context, "field is not settable"));
                continue;
            }
            let current = target
                .get(&field.name)
                .cloned()
                .unwrap_or_else(|| field.default.clone());
            if let Some(value) = self.convert(&field.kind, raw, &current, &path, linker, context, diagnostics) {
                target.set(&field.name, value);
            }
        }
    }

    /// Convert one raw value. `None` leaves the destination untouched.
    #[allow(clippy::too_many_arguments)]
    fn convert(
        &self,
        kind: &FieldKind,
        raw: &Json,
        current: &Value,
        path: &str,
        linker: &mut dyn Linker,
        context: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Value> {
        let primitive = match kind {
            FieldKind::Bool => raw.as_bool().map(Value::Bool),
            FieldKind::Int(width) => int_from_json(raw, *width).map(Value::Int),
            FieldKind::Float(width) => float_from_json(raw, *width).map(Value::Float),
            FieldKind::String => text_from_json(raw).map(Value::Str),
            FieldKind::Name => raw.as_str().map(|s| Value::Name(s.to_string())),
            FieldKind::Enum { enum_name } => return self.convert_enum(enum_name, raw, path, context, diagnostics),
            FieldKind::Struct { struct_name } => {
                return self.convert_struct(struct_name, raw, current, path, linker, context, diagnostics)
            }
            FieldKind::Array { element } => {
                return self.convert_array(element, raw, current, path, linker, context, diagnostics)
            }
            FieldKind::Reference { .. } => return self.convert_reference(raw, path, linker, context, diagnostics),
            FieldKind::Pin => return self.convert_pin(raw, path, linker, context, diagnostics),
        };
        if primitive.is_none() {
            diagnostics.push(Diagnostic::malformed(
                path,
                context,
                format!("expected {}, found {}", kind.type_name(), json_kind(raw)),
            ));
        }
        primitive
    }

    fn convert_enum(
        &self,
        enum_name: &str,
        raw: &Json,
        path: &str,
        context: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Value> {
        let Some(text) = raw.as_str() else {
            diagnostics.push(Diagnostic::malformed(
                path,
                context,
                format!("expected enum {}, found {}", enum_name, json_kind(raw)),
            ));
            return None;
        };
        // Exports sometimes qualify the value: `EBlendMode::BLEND_Masked`
        let symbol = match text.split_once("::") {
            Some((prefix, value)) if prefix == enum_name => value,
            _ => text,
        };
        let known = self
            .registry
            .enum_values(enum_name)
            .map(|values| values.iter().any(|v| v == symbol))
            .unwrap_or(false);
        if known {
            Some(Value::Enum(symbol.to_string()))
        } else {
            diagnostics.push(
                Diagnostic::new(DiagnosticKind::EnumValueUnknown, path, context)
                    .with_message(format!("'{}' is not a value of {}", text, enum_name)),
            );
            None
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn convert_struct(
        &self,
        struct_name: &str,
        raw: &Json,
        current: &Value,
        path: &str,
        linker: &mut dyn Linker,
        context: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Value> {
        let Some(descriptor) = self.registry.resolve_struct(struct_name) else {
            diagnostics.push(Diagnostic::malformed(
                path,
                context,
                format!("struct {} is not in the catalog", struct_name),
            ));
            return None;
        };
        let Json::Object(map) = raw else {
            diagnostics.push(Diagnostic::malformed(
                path,
                context,
                format!("expected struct {}, found {}", struct_name, json_kind(raw)),
            ));
            return None;
        };
        let mut fields = match current {
            Value::Struct(fields) => fields.clone(),
            _ => descriptor.construct(),
        };
        self.apply_fields(map, &mut fields, &descriptor, linker, context, path, &[], diagnostics);
        Some(Value::Struct(fields))
    }

    #[allow(clippy::too_many_arguments)]
    fn convert_array(
        &self,
        element: &FieldKind,
        raw: &Json,
        current: &Value,
        path: &str,
        linker: &mut dyn Linker,
        context: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Value> {
        let Json::Array(items) = raw else {
            diagnostics.push(Diagnostic::malformed(
                path,
                context,
                format!("expected an array, found {}", json_kind(raw)),
            ));
            return None;
        };
        let existing = current.as_array().unwrap_or(&[]);
        let mut values = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let previous = existing
                .get(i)
                .cloned()
                .unwrap_or_else(|| self.element_default(element));
            let item_path = format!("{}[{}]", path, i);
            let value = self
                .convert(element, item, &previous, &item_path, linker, context, diagnostics)
                .unwrap_or(previous);
            values.push(value);
        }
        Some(Value::Array(values))
    }

    fn convert_reference(
        &self,
        raw: &Json,
        path: &str,
        linker: &mut dyn Linker,
        context: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Value> {
        let reference = match ObjectRef::from_json(raw, &self.rules) {
            Ok(Some(reference)) => reference,
            Ok(None) => return Some(Value::Object(None)),
            Err(reason) => {
                diagnostics.push(Diagnostic::malformed(path, context, reason));
                return None;
            }
        };
        if let Some(node) = linker.node_for(&reference) {
            return Some(Value::Node(Some(node)));
        }
        match linker.object_for(&reference) {
            Some(handle) => Some(Value::Object(Some(handle))),
            None => {
                diagnostics.push(
                    Diagnostic::missing_reference(&reference.store_path(), context)
                        .with_message(format!("field {}", path)),
                );
                Some(Value::Object(None))
            }
        }
    }

    /// Expression inputs: `{ Expression, OutputIndex, InputName, Mask.. }`,
    /// the older `{ ExpressionName }`, or a bare reference.
    fn convert_pin(
        &self,
        raw: &Json,
        path: &str,
        linker: &mut dyn Linker,
        context: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Value> {
        let map = match raw {
            Json::Null => return Some(Value::Pin(PinLink::default())),
            Json::Object(map) if !map.contains_key("ObjectPath") && !map.contains_key("AssetPathName") => map,
            _ => {
                return match ObjectRef::from_json(raw, &self.rules) {
                    Ok(Some(reference)) => {
                        let node = self.link_pin(&reference, path, linker, context, diagnostics);
                        Some(Value::Pin(PinLink { node, ..PinLink::default() }))
                    }
                    Ok(None) => Some(Value::Pin(PinLink::default())),
                    Err(reason) => {
                        diagnostics.push(Diagnostic::malformed(path, context, reason));
                        None
                    }
                };
            }
        };

        let node = if let Some(expression) = map.get("Expression") {
            match ObjectRef::from_json(expression, &self.rules) {
                Ok(Some(reference)) => self.link_pin(&reference, path, linker, context, diagnostics),
                Ok(None) => None,
                Err(reason) => {
                    diagnostics.push(Diagnostic::malformed(path, context, reason));
                    return None;
                }
            }
        } else {
            match map.get("ExpressionName").and_then(Json::as_str) {
                Some(name) if !name.is_empty() && name != "None" => {
                    let node = linker.node_by_name(name);
                    if node.is_none() {
                        diagnostics.push(
                            Diagnostic::missing_reference(name, context).with_message(format!("input {}", path)),
                        );
                    }
                    node
                }
                _ => None,
            }
        };

        let int = |key: &str| map.get(key).and_then(Json::as_i64).unwrap_or(0) as i32;
        let input_name = map
            .get("InputName")
            .and_then(Json::as_str)
            .filter(|s| !s.is_empty() && *s != "None")
            .map(str::to_string);
        let mask = map.contains_key("Mask").then(|| ChannelMask {
            mask: int("Mask"),
            r: int("MaskR"),
            g: int("MaskG"),
            b: int("MaskB"),
            a: int("MaskA"),
        });
        Some(Value::Pin(PinLink {
            node,
            output_index: int("OutputIndex"),
            input_name,
            mask,
        }))
    }

    fn link_pin(
        &self,
        reference: &ObjectRef,
        path: &str,
        linker: &mut dyn Linker,
        context: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<NodeId> {
        let node = linker.node_for(reference);
        if node.is_none() {
            diagnostics.push(
                Diagnostic::missing_reference(&reference.store_path(), context)
                    .with_message(format!("input {}", path)),
            );
        }
        node
    }

    /// Default for a new array slot. Structs start from their catalog defaults.
    fn element_default(&self, kind: &FieldKind) -> Value {
        match kind {
            FieldKind::Struct { struct_name } => self
                .registry
                .resolve_struct(struct_name)
                .map(|desc| Value::Struct(desc.construct()))
                .unwrap_or_else(|| kind.zero_value()),
            _ => kind.zero_value(),
        }
    }
}

/// Integer with saturation to the field's width. Floats truncate toward zero.
fn int_from_json(raw: &Json, width: IntWidth) -> Option<i64> {
    let wide = if let Some(n) = raw.as_i64() {
        n as i128
    } else if let Some(n) = raw.as_u64() {
        n as i128
    } else {
        raw.as_f64()? as i128
    };
    let (min, max) = width.range();
    Some(wide.clamp(min, max) as i64)
}

fn float_from_json(raw: &Json, width: FloatWidth) -> Option<f64> {
    let n = raw.as_f64()?;
    Some(match width {
        FloatWidth::F32 => n as f32 as f64,
        FloatWidth::F64 => n,
    })
}

/// Plain strings, or localized text objects carrying their source string
fn text_from_json(raw: &Json) -> Option<String> {
    match raw {
        Json::String(s) => Some(s.clone()),
        Json::Object(map) => ["SourceString", "CultureInvariantString", "LocalizedString"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Json::as_str))
            .map(str::to_string),
        _ => None,
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a bool",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    /// Resolves nodes and objects from fixed maps and counts object lookups
    #[derive(Default)]
    struct MapLinker {
        nodes: HashMap<String, NodeId>,
        objects: HashMap<String, ObjectHandle>,
        object_lookups: usize,
    }

    impl Linker for MapLinker {
        fn node_by_name(&self, name: &str) -> Option<NodeId> {
            self.nodes.get(name).copied()
        }

        fn node_for(&self, reference: &ObjectRef) -> Option<NodeId> {
            self.nodes.get(reference.export_name()).copied()
        }

        fn object_for(&mut self, reference: &ObjectRef) -> Option<ObjectHandle> {
            self.object_lookups += 1;
            self.objects.get(&reference.store_path()).copied()
        }
    }

    fn registry() -> Arc<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        registry
            .load_string(
                r#"
[type.Widget.fields]
Count = "i32"
Small = "i8"
Scale = "f32"
Label = "string"
Tag = "name"
Color = { type = "struct", struct = "LinearColor" }
Blend = { type = "enum", enum = "EBlendMode" }
Points = { type = "array", element = "i32" }
Tints = { type = "array", element = "LinearColor" }
Texture = { type = "reference" }
Locked = { type = "bool", settable = false }

[type.Add]
fields = { A = "pin", B = "pin", ConstB = "f32" }

[type.Switch]
positional_inputs = "Inputs"
fields = { Inputs = { type = "array", element = "pin" } }

[struct.LinearColor]
fields = { R = "f32", G = "f32", B = "f32", A = { type = "f32", default = 1.0 } }

[enum.EBlendMode]
values = ["BLEND_Opaque", "BLEND_Masked"]
"#,
            )
            .unwrap();
        Arc::new(registry)
    }

    fn deserializer() -> PropertyDeserializer {
        PropertyDeserializer::new(registry(), Arc::new(PathRules::default()))
    }

    fn payload(value: Json) -> PropertyPayload {
        value.as_object().cloned().unwrap()
    }

    fn apply(type_tag: &str, body: Json, linker: &mut MapLinker) -> (Fields, Diagnostics) {
        let de = deserializer();
        let desc = de.registry().resolve(type_tag).unwrap();
        let mut fields = desc.construct();
        let diagnostics = de.apply(&payload(body), &mut fields, &desc, linker, "Widget_0");
        (fields, diagnostics)
    }

    #[test]
    fn test_partial_payload() {
        let (fields, diagnostics) = apply(
            "Widget",
            json!({ "Count": 5, "UnknownField": "x" }),
            &mut MapLinker::default(),
        );
        assert!(diagnostics.is_empty());
        assert_eq!(fields.get("Count"), Some(&Value::Int(5)));
        assert_eq!(fields.get("Label"), Some(&Value::Str(String::new())));
        assert!(!fields.contains("UnknownField"));
    }

    #[test]
    fn test_numeric_conversions() {
        let (fields, diagnostics) = apply(
            "Widget",
            json!({ "Count": 7.9, "Small": 300, "Scale": 0.1 }),
            &mut MapLinker::default(),
        );
        assert!(diagnostics.is_empty());
        assert_eq!(fields.get("Count"), Some(&Value::Int(7)));
        assert_eq!(fields.get("Small"), Some(&Value::Int(127)));
        assert_eq!(fields.get("Scale"), Some(&Value::Float(0.1f32 as f64)));
    }

    #[test]
    fn test_wrong_shape_keeps_previous_value() {
        let (fields, diagnostics) = apply(
            "Widget",
            json!({ "Count": "many", "Label": "kept" }),
            &mut MapLinker::default(),
        );
        assert_eq!(diagnostics.count(DiagnosticKind::MalformedPayload), 1);
        assert_eq!(fields.get("Count"), Some(&Value::Int(0)));
        assert_eq!(fields.get("Label"), Some(&Value::Str("kept".to_string())));
    }

    #[test]
    fn test_text_object_and_name() {
        let (fields, _) = apply(
            "Widget",
            json!({ "Label": { "Namespace": "", "Key": "k", "SourceString": "Hello" }, "Tag": "Rock" }),
            &mut MapLinker::default(),
        );
        assert_eq!(fields.get("Label"), Some(&Value::Str("Hello".to_string())));
        assert_eq!(fields.get("Tag"), Some(&Value::Name("Rock".to_string())));
    }

    #[test]
    fn test_enum_values() {
        let (fields, diagnostics) = apply(
            "Widget",
            json!({ "Blend": "EBlendMode::BLEND_Masked" }),
            &mut MapLinker::default(),
        );
        assert!(diagnostics.is_empty());
        assert_eq!(fields.get("Blend"), Some(&Value::Enum("BLEND_Masked".to_string())));

        let (fields, diagnostics) = apply("Widget", json!({ "Blend": "BLEND_Glow" }), &mut MapLinker::default());
        assert_eq!(diagnostics.count(DiagnosticKind::EnumValueUnknown), 1);
        assert_eq!(diagnostics.iter().next().unwrap().subject, "Blend");
        assert_eq!(fields.get("Blend"), Some(&Value::Enum("BLEND_Opaque".to_string())));
    }

    #[test]
    fn test_struct_recursion_keeps_defaults() {
        let (fields, diagnostics) = apply(
            "Widget",
            json!({ "Color": { "R": 0.5, "Alpha": 3 } }),
            &mut MapLinker::default(),
        );
        assert!(diagnostics.is_empty());
        let color = fields.get("Color").and_then(Value::as_struct).unwrap();
        assert_eq!(color.get("R"), Some(&Value::Float(0.5)));
        assert_eq!(color.get("G"), Some(&Value::Float(0.0)));
        assert_eq!(color.get("A"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn test_nested_diagnostics_carry_field_path() {
        let (_, diagnostics) = apply(
            "Widget",
            json!({ "Tints": [{ "R": 1.0 }, { "G": "green" }] }),
            &mut MapLinker::default(),
        );
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::MalformedPayload);
        assert_eq!(diagnostic.subject, "Tints[1].G");
        assert_eq!(diagnostic.context, "Widget_0");
    }

    #[test]
    fn test_arrays_resize_to_payload() {
        let (fields, _) = apply("Widget", json!({ "Points": [1, 2, 3] }), &mut MapLinker::default());
        assert_eq!(
            fields.get("Points"),
            Some(&Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );

        let (fields, _) = apply("Widget", json!({ "Tints": [{ "B": 0.25 }] }), &mut MapLinker::default());
        let tints = fields.get("Tints").and_then(Value::as_array).unwrap();
        let tint = tints[0].as_struct().unwrap();
        assert_eq!(tint.get("B"), Some(&Value::Float(0.25)));
        assert_eq!(tint.get("A"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn test_reference_fields() {
        let mut linker = MapLinker::default();
        linker.objects.insert("/Game/T_Rock.T_Rock".to_string(), ObjectHandle(4));

        let (fields, diagnostics) = apply(
            "Widget",
            json!({ "Texture": "Texture2D'/Game/T_Rock.T_Rock'" }),
            &mut linker,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(fields.get("Texture"), Some(&Value::Object(Some(ObjectHandle(4)))));

        let (fields, diagnostics) = apply("Widget", json!({ "Texture": null }), &mut linker);
        assert!(diagnostics.is_empty());
        assert_eq!(fields.get("Texture"), Some(&Value::Object(None)));

        let (fields, diagnostics) = apply(
            "Widget",
            json!({ "Texture": { "ObjectName": "Texture2D'T_Gone'", "ObjectPath": "/Game/T_Gone.0" } }),
            &mut linker,
        );
        assert_eq!(diagnostics.count(DiagnosticKind::MissingReference), 1);
        assert_eq!(fields.get("Texture"), Some(&Value::Object(None)));
    }

    #[test]
    fn test_sibling_reference_becomes_node_link() {
        let mut linker = MapLinker::default();
        linker.nodes.insert("Widget_1".to_string(), NodeId(1));
        let (fields, _) = apply("Widget", json!({ "Texture": "/Game/M.M:Widget_1" }), &mut linker);
        assert_eq!(fields.get("Texture"), Some(&Value::Node(Some(NodeId(1)))));
        assert_eq!(linker.object_lookups, 0);
    }

    #[test]
    fn test_not_settable() {
        let (fields, diagnostics) = apply("Widget", json!({ "Locked": true }), &mut MapLinker::default());
        assert_eq!(diagnostics.count(DiagnosticKind::MalformedPayload), 1);
        assert_eq!(fields.get("Locked"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_pin_forms() {
        let mut linker = MapLinker::default();
        linker.nodes.insert("Const_0".to_string(), NodeId(0));
        linker.nodes.insert("Const_1".to_string(), NodeId(1));

        let (fields, diagnostics) = apply(
            "Add",
            json!({
                "A": {
                    "Expression": { "ObjectName": "MaterialExpressionConstant'M:Const_0'", "ObjectPath": "/Game/M.0" },
                    "OutputIndex": 1,
                    "InputName": "None",
                    "Mask": 1, "MaskR": 1, "MaskG": 0, "MaskB": 0, "MaskA": 0
                },
                "B": { "ExpressionName": "Const_1" }
            }),
            &mut linker,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(
            fields.get("A"),
            Some(&Value::Pin(PinLink {
                node: Some(NodeId(0)),
                output_index: 1,
                input_name: None,
                mask: Some(ChannelMask { mask: 1, r: 1, g: 0, b: 0, a: 0 }),
            }))
        );
        assert_eq!(fields.get("B").and_then(Value::as_node), Some(NodeId(1)));
    }

    #[test]
    fn test_unconnected_and_dangling_pins() {
        let mut linker = MapLinker::default();
        let (fields, diagnostics) = apply(
            "Add",
            json!({ "A": { "Expression": null }, "B": { "ExpressionName": "Gone_3" } }),
            &mut linker,
        );
        assert_eq!(diagnostics.count(DiagnosticKind::MissingReference), 1);
        assert_eq!(fields.get("A"), Some(&Value::Pin(PinLink::default())));
        assert_eq!(fields.get("B").and_then(Value::as_node), None);
    }

    #[test]
    fn test_positional_inputs() {
        let de = deserializer();
        let desc = de.registry().resolve("Switch").unwrap();
        let mut linker = MapLinker::default();
        linker.nodes.insert("High".to_string(), NodeId(2));
        linker.nodes.insert("Low".to_string(), NodeId(3));

        let mut fields = desc.construct();
        let body = payload(json!({
            "Inputs": [{ "ExpressionName": "Low" }, null, { "ExpressionName": "High" }]
        }));
        let skipped = de.apply_except(&body, &mut fields, &desc, &mut linker, "Switch_0", &["Inputs"]);
        assert!(skipped.is_empty());
        assert_eq!(fields.get("Inputs"), Some(&Value::Array(Vec::new())));

        let diagnostics = de.assign_positional(&body, &mut fields, &desc, &mut linker, "Switch_0");
        assert!(diagnostics.is_empty());
        let inputs = fields.get("Inputs").and_then(Value::as_array).unwrap();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[0].as_node(), Some(NodeId(3)));
        assert_eq!(inputs[1].as_node(), None);
        assert_eq!(inputs[2].as_node(), Some(NodeId(2)));
    }
}
