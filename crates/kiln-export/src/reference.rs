//! Object reference descriptors

use crate::paths::PathRules;
use serde_json::Value;
use std::fmt;

/// A parsed pointer-like field target.
///
/// Redirects and quote stripping happen once, at parse time. `path` is
/// always in `/Package/Path.ObjectName` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub type_tag: Option<String>,
    pub path: String,
    pub sub_object: Option<String>,
    /// Set by the `Package.N` form: an index into the referring batch
    pub export_index: Option<usize>,
}

impl ObjectRef {
    /// Parse the textual form `Type'/Package/Path.Name:Sub'` with no redirects
    pub fn parse(text: &str) -> Option<Self> {
        Self::parse_with(text, &PathRules::default())
    }

    /// Parse the textual form. `None` and empty strings are null references.
    pub fn parse_with(text: &str, rules: &PathRules) -> Option<Self> {
        let text = text.trim().trim_matches('"');
        if text.is_empty() || text == "None" {
            return None;
        }
        let (type_tag, inner) = match text.find('\'') {
            Some(quote) => {
                let tag = text[..quote].trim();
                let tag = (!tag.is_empty()).then(|| tag.to_string());
                (tag, &text[quote + 1..])
            }
            None => (None, text),
        };
        let inner = inner.trim_matches(|c| c == '\'' || c == '"');
        if inner.is_empty() || inner == "None" {
            return None;
        }
        let (path, sub_object) = match inner.split_once(':') {
            Some((path, sub)) => (path, (!sub.is_empty()).then(|| sub.to_string())),
            None => (inner, None),
        };
        Some(Self::from_parts(type_tag, &rules.apply(path), sub_object))
    }

    /// Parse any reference payload found in export JSON.
    ///
    /// `Ok(None)` is an explicit null. `Err` carries a reason for a payload
    /// that is not a recognisable reference.
    pub fn from_json(value: &Value, rules: &PathRules) -> Result<Option<Self>, String> {
        match value {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Self::parse_with(text, rules)),
            Value::Object(map) => {
                if let Some(object_path) = map.get("ObjectPath") {
                    let object_path = object_path
                        .as_str()
                        .ok_or_else(|| "ObjectPath is not a string".to_string())?;
                    let object_name = map.get("ObjectName").and_then(Value::as_str).unwrap_or("");
                    return Ok(Self::from_package_index(object_name, object_path, rules));
                }
                if let Some(asset_path) = map.get("AssetPathName") {
                    let asset_path = match asset_path {
                        Value::Null => return Ok(None),
                        Value::String(s) => s,
                        _ => return Err("AssetPathName is not a string".to_string()),
                    };
                    let sub_path = map
                        .get("SubPathString")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty());
                    return Ok(Self::parse_with(asset_path, rules).map(|mut r| {
                        if let Some(sub) = sub_path {
                            r.sub_object = Some(sub.to_string());
                        }
                        r
                    }));
                }
                Err("object is not a reference (no ObjectPath or AssetPathName)".to_string())
            }
            other => Err(format!("expected a reference, found {}", json_kind(other))),
        }
    }

    /// The extractor's package-index form:
    /// `{ "ObjectName": "Type'Outer:Name'", "ObjectPath": "/Pkg/Path.N" }`
    fn from_package_index(object_name: &str, object_path: &str, rules: &PathRules) -> Option<Self> {
        let (type_tag, inner) = match object_name.split_once('\'') {
            Some((tag, rest)) => ((!tag.is_empty()).then(|| tag.to_string()), rest),
            None => (None, object_name),
        };
        let inner = inner.trim_matches('\'');

        let object_path = rules.apply(object_path.trim());
        let (package, index) = split_leaf(&object_path);
        if package.is_empty() {
            return None;
        }
        let export_index = index.and_then(|i| i.parse::<usize>().ok());

        let (asset, sub_object) = match inner.split_once(':') {
            Some((outer, name)) => (outer.to_string(), Some(name.to_string())),
            None if !inner.is_empty() => (inner.to_string(), None),
            None => (asset_name(package).to_string(), None),
        };
        Some(Self {
            type_tag,
            path: format!("{}.{}", package, asset),
            sub_object,
            export_index,
        })
    }

    fn from_parts(type_tag: Option<String>, path: &str, sub_object: Option<String>) -> Self {
        let (package, leaf) = split_leaf(path);
        let mut export_index = None;
        let leaf = match leaf {
            Some(leaf) if !leaf.is_empty() && leaf.bytes().all(|b| b.is_ascii_digit()) => {
                export_index = leaf.parse::<usize>().ok();
                asset_name(package)
            }
            Some(leaf) if !leaf.is_empty() => leaf,
            _ => asset_name(package),
        };
        Self {
            type_tag,
            path: format!("{}.{}", package, leaf),
            sub_object,
            export_index,
        }
    }

    /// `/Game/Tex` for `/Game/Tex.Tex`
    pub fn package_path(&self) -> &str {
        split_leaf(&self.path).0
    }

    /// `Tex` for `/Game/Tex.Tex`
    pub fn object_name(&self) -> &str {
        split_leaf(&self.path).1.unwrap_or("")
    }

    /// The name the referenced export carries in its own batch
    pub fn export_name(&self) -> &str {
        self.sub_object.as_deref().unwrap_or_else(|| self.object_name())
    }

    /// Content-store key: `/Pkg.Name` or `/Pkg.Name:Sub`
    pub fn store_path(&self) -> String {
        match &self.sub_object {
            Some(sub) => format!("{}:{}", self.path, sub),
            None => self.path.clone(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_tag {
            Some(tag) => write!(f, "{}'{}'", tag, self.store_path()),
            None => write!(f, "{}", self.store_path()),
        }
    }
}

/// Split `/Pkg/Path.Leaf` at the last dot of the final segment
fn split_leaf(path: &str) -> (&str, Option<&str>) {
    let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[segment_start..].rfind('.') {
        Some(dot) => {
            let dot = segment_start + dot;
            (&path[..dot], Some(&path[dot + 1..]))
        }
        None => (path, None),
    }
}

fn asset_name(package: &str) -> &str {
    package.rsplit('/').next().unwrap_or(package)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
