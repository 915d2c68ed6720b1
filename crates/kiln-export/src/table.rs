//! Export table parsing and queries

use kiln_core::{KilnError, Result};
use serde_json::{Map, Value};

/// Ordered mapping of field name to raw JSON value
pub type PropertyPayload = Map<String, Value>;

/// Keys of an export object that are not payload
const RESERVED_KEYS: &[&str] = &["Type", "Name", "Outer", "Class", "Flags", "Properties"];

/// One serialized object description in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRecord {
    /// Position in the batch array
    pub index: usize,
    pub type_tag: String,
    pub name: String,
    pub outer: Option<String>,
    pub class: Option<String>,
    pub properties: PropertyPayload,
    /// Top-level keys outside the reserved set, e.g. `Inputs` on some nodes
    pub extras: PropertyPayload,
}

impl ExportRecord {
    /// The payload with top-level extras merged in where the payload lacks them
    pub fn merged_properties(&self) -> PropertyPayload {
        let mut merged = self.properties.clone();
        for (key, value) in &self.extras {
            if !merged.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// A property if present, falling back to a top-level extra
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key).or_else(|| self.extras.get(key))
    }

    fn from_json(index: usize, value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            KilnError::MalformedBatch(format!("export {} is not an object", index))
        })?;
        let type_tag = required_string(object, "Type", index)?;
        let name = required_string(object, "Name", index)?;
        let outer = optional_string(object, "Outer", index)?;
        let class = optional_string(object, "Class", index)?;

        let properties = match object.get("Properties") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(KilnError::MalformedBatch(format!(
                    "export {} ('{}') has non-object Properties",
                    index, name
                )))
            }
        };
        let extras = object
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            index,
            type_tag,
            name,
            outer,
            class,
            properties,
            extras,
        })
    }
}

fn required_string(object: &Map<String, Value>, key: &str, index: usize) -> Result<String> {
    match object.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(KilnError::MalformedBatch(format!(
            "export {} has a non-string '{}'",
            index, key
        ))),
        None => Err(KilnError::MalformedBatch(format!(
            "export {} is missing '{}'",
            index, key
        ))),
    }
}

fn optional_string(object: &Map<String, Value>, key: &str, index: usize) -> Result<Option<String>> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(KilnError::MalformedBatch(format!(
            "export {} has a non-string '{}'",
            index, key
        ))),
    }
}

/// Indexed, read-only collection of the exports of one batch
#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    records: Vec<ExportRecord>,
}

impl ExportTable {
    /// Parse either the `{ "data": [...] }` envelope, the remote
    /// `{ "jsonOutput": [...] }` envelope, or a bare export array.
    pub fn parse(json: &Value) -> Result<Self> {
        let array = match json {
            Value::Array(items) => items,
            Value::Object(map) => match map.get("data").or_else(|| map.get("jsonOutput")) {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(KilnError::MalformedBatch(
                        "envelope 'data' is not an array".to_string(),
                    ))
                }
                None => {
                    return Err(KilnError::MalformedBatch(
                        "expected an export array or a 'data' envelope".to_string(),
                    ))
                }
            },
            _ => {
                return Err(KilnError::MalformedBatch(
                    "expected an export array".to_string(),
                ))
            }
        };

        let records = array
            .iter()
            .enumerate()
            .map(|(index, value)| ExportRecord::from_json(index, value))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(exports = records.len(), "parsed export table");
        Ok(Self { records })
    }

    pub fn parse_str(content: &str) -> Result<Self> {
        let json: Value = serde_json::from_str(content)?;
        Self::parse(&json)
    }

    /// Wrap a bare export array in the `{ "data": [...] }` envelope
    pub fn envelope(exports: Value) -> Value {
        serde_json::json!({ "data": exports })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ExportRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExportRecord> {
        self.records.iter()
    }

    /// Records whose outer equals `outer`, in batch order
    pub fn filter_by_outer(&self, outer: &str) -> Vec<&ExportRecord> {
        self.records
            .iter()
            .filter(|r| r.outer.as_deref() == Some(outer))
            .collect()
    }

    /// Records whose type tag starts with `prefix`, in batch order
    pub fn filter_by_type_prefix(&self, prefix: &str) -> Vec<&ExportRecord> {
        self.records
            .iter()
            .filter(|r| r.type_tag.starts_with(prefix))
            .collect()
    }

    /// Find a record by name. With `outer = None` any outer matches.
    pub fn find_by_qualified_name(&self, outer: Option<&str>, name: &str) -> Option<&ExportRecord> {
        self.records.iter().find(|r| {
            r.name == name && outer.map(|o| r.outer.as_deref() == Some(o)).unwrap_or(true)
        })
    }

    pub fn find_by_type(&self, type_tag: &str) -> Option<&ExportRecord> {
        self.records.iter().find(|r| r.type_tag == type_tag)
    }
}

impl<'a> IntoIterator for &'a ExportTable {
    type Item = &'a ExportRecord;
    type IntoIter = std::slice::Iter<'a, ExportRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
