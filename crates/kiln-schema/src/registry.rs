//! Type registry for resolving export type tags

use crate::catalog::{parse_field_kind, CatalogFile, FieldDefinition, RawKind, TypeDefinition};
use crate::descriptor::{FieldDescriptor, FieldKind, TypeDescriptor};
use crate::value::{Fields, Value};
use kiln_core::{Diagnostic, Diagnostics, KilnError, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds a stand-in descriptor for a tag that could not be resolved
pub type FallbackFactory = Arc<dyn Fn(&str) -> TypeDescriptor + Send + Sync>;

/// Registry holding every known type, struct and enum.
///
/// Catalog definitions are kept in raw form and flattened into descriptors
/// by `rebuild` after each load, so a child type may be declared in a
/// different file than its parent.
#[derive(Default)]
pub struct TypeRegistry {
    type_defs: HashMap<String, TypeDefinition>,
    struct_defs: HashMap<String, TypeDefinition>,
    enums: HashMap<String, Vec<String>>,
    types: HashMap<String, Arc<TypeDescriptor>>,
    structs: HashMap<String, Arc<TypeDescriptor>>,
    registered: HashMap<String, Arc<TypeDescriptor>>,
    aliases: Vec<(String, String)>,
    substitutions: Vec<(String, String)>,
    fallbacks: Vec<(String, FallbackFactory)>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load catalogs from multiple directories, merging them in order.
    /// Later directories override earlier ones.
    pub fn load_from_directories(paths: &[impl AsRef<Path>]) -> Result<Self> {
        let mut registry = Self::new();
        for path in paths {
            registry.merge_directory(path.as_ref())?;
        }
        registry.rebuild()?;
        Ok(registry)
    }

    pub fn load_from_directory<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_from_directories(&[path])
    }

    /// Load every `*.toml` catalog in a directory into this registry
    pub fn load_directory<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.merge_directory(path.as_ref())?;
        self.rebuild()
    }

    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let content = fs::read_to_string(path)?;
        self.load_string(&content)
    }

    pub fn load_string(&mut self, content: &str) -> Result<()> {
        self.merge_string(content)?;
        self.rebuild()
    }

    fn merge_directory(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|e| e == "toml").unwrap_or(false))
            .collect();
        files.sort();

        for file in files {
            tracing::debug!(file = %file.display(), "loading type catalog");
            let content = fs::read_to_string(&file)?;
            self.merge_string(&content)?;
        }
        Ok(())
    }

    fn merge_string(&mut self, content: &str) -> Result<()> {
        let file: CatalogFile = toml::from_str(content)?;
        self.type_defs.extend(file.types);
        self.struct_defs.extend(file.structs);
        for (name, def) in file.enums {
            self.enums.insert(name, def.values);
        }
        for rule in file.alias {
            self.aliases.push((rule.from, rule.to));
        }
        for rule in file.substitution {
            self.substitutions.push((rule.pattern, rule.replacement));
        }
        Ok(())
    }

    /// Flatten parent chains and compute field defaults
    fn rebuild(&mut self) -> Result<()> {
        let mut builder = Builder {
            type_defs: &self.type_defs,
            struct_defs: &self.struct_defs,
            enums: &self.enums,
            types: HashMap::new(),
            structs: HashMap::new(),
            visiting: Vec::new(),
        };
        for name in self.struct_defs.keys() {
            builder.build(name, true)?;
        }
        for name in self.type_defs.keys() {
            builder.build(name, false)?;
        }
        let (types, structs) = (builder.types, builder.structs);
        self.types = types;
        self.structs = structs;
        Ok(())
    }

    /// Register a ready-made descriptor. It takes precedence over catalog types.
    pub fn register_type(&mut self, descriptor: TypeDescriptor) {
        self.registered
            .insert(descriptor.type_tag.clone(), Arc::new(descriptor));
    }

    pub fn register_enum(&mut self, name: &str, values: &[&str]) {
        self.enums
            .insert(name.to_string(), values.iter().map(|v| v.to_string()).collect());
    }

    pub fn register_alias(&mut self, from: &str, to: &str) {
        self.aliases.push((from.to_string(), to.to_string()));
    }

    pub fn register_substitution(&mut self, pattern: &str, replacement: &str) {
        self.substitutions
            .push((pattern.to_string(), replacement.to_string()));
    }

    /// Register a factory for tags equal to or starting with `tag_prefix`
    pub fn register_fallback_factory(&mut self, tag_prefix: &str, factory: FallbackFactory) {
        self.fallbacks.push((tag_prefix.to_string(), factory));
    }

    /// Resolve a type tag: exact match, then aliases, then class-path
    /// stripping, then substitutions. `None` means the type is missing.
    pub fn resolve(&self, type_tag: &str) -> Option<Arc<TypeDescriptor>> {
        if let Some(desc) = self.resolve_name(type_tag) {
            return Some(desc);
        }
        if let Some(short) = strip_class_path(type_tag) {
            if let Some(desc) = self.resolve_name(short) {
                return Some(desc);
            }
        }
        for (pattern, replacement) in &self.substitutions {
            if type_tag.contains(pattern.as_str()) {
                let candidate = type_tag.replace(pattern.as_str(), replacement);
                if let Some(desc) = self.lookup(&candidate) {
                    tracing::debug!(from = type_tag, to = %candidate, "type resolved by substitution");
                    return Some(desc);
                }
            }
        }
        None
    }

    /// Like `resolve`, appending a MissingType diagnostic on failure
    pub fn resolve_for(
        &self,
        type_tag: &str,
        context: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Arc<TypeDescriptor>> {
        let resolved = self.resolve(type_tag);
        if resolved.is_none() {
            tracing::debug!(type_tag, context, "missing type");
            diagnostics.push(Diagnostic::missing_type(type_tag, context));
        }
        resolved
    }

    /// Resolve, or build a stand-in from the longest matching fallback factory
    pub fn resolve_or_fallback(&self, type_tag: &str) -> Option<Arc<TypeDescriptor>> {
        self.resolve(type_tag)
            .or_else(|| self.fallback(type_tag).map(|factory| Arc::new(factory(type_tag))))
    }

    pub fn fallback(&self, type_tag: &str) -> Option<&FallbackFactory> {
        self.fallbacks
            .iter()
            .filter(|(prefix, _)| type_tag.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, factory)| factory)
    }

    pub fn resolve_struct(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.structs
            .get(name)
            .or_else(|| self.registered.get(name).filter(|d| d.is_struct))
            .cloned()
    }

    pub fn enum_values(&self, name: &str) -> Option<&[String]> {
        self.enums.get(name).map(|v| v.as_slice())
    }

    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .types
            .keys()
            .chain(self.registered.keys())
            .map(|s| s.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn struct_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.structs.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn enum_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.enums.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }

    fn resolve_name(&self, type_tag: &str) -> Option<Arc<TypeDescriptor>> {
        if let Some(desc) = self.lookup(type_tag) {
            return Some(desc);
        }
        for (from, to) in &self.aliases {
            if from == type_tag {
                if let Some(desc) = self.lookup(to) {
                    tracing::debug!(from = type_tag, to = %to, "type resolved by alias");
                    return Some(desc);
                }
            }
        }
        None
    }

    fn lookup(&self, type_tag: &str) -> Option<Arc<TypeDescriptor>> {
        self.registered
            .get(type_tag)
            .or_else(|| self.types.get(type_tag))
            .cloned()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.len())
            .field("structs", &self.structs.len())
            .field("enums", &self.enums.len())
            .field("registered", &self.registered.len())
            .field("aliases", &self.aliases)
            .field("substitutions", &self.substitutions)
            .field("fallbacks", &self.fallbacks.iter().map(|(p, _)| p).collect::<Vec<_>>())
            .finish()
    }
}

/// `/Script/Engine.Texture2D` -> `Texture2D`
fn strip_class_path(type_tag: &str) -> Option<&str> {
    type_tag
        .strip_prefix("/Script/")
        .and_then(|rest| rest.rsplit_once('.'))
        .map(|(_, name)| name)
}

struct Builder<'a> {
    type_defs: &'a HashMap<String, TypeDefinition>,
    struct_defs: &'a HashMap<String, TypeDefinition>,
    enums: &'a HashMap<String, Vec<String>>,
    types: HashMap<String, Arc<TypeDescriptor>>,
    structs: HashMap<String, Arc<TypeDescriptor>>,
    visiting: Vec<(String, bool)>,
}

impl Builder<'_> {
    fn build(&mut self, name: &str, is_struct: bool) -> Result<Arc<TypeDescriptor>> {
        let built = if is_struct { &self.structs } else { &self.types };
        if let Some(desc) = built.get(name) {
            return Ok(desc.clone());
        }
        if self.is_visiting(name, is_struct) {
            return Err(KilnError::SchemaError(format!(
                "inheritance cycle through '{}'",
                name
            )));
        }
        let defs = if is_struct { self.struct_defs } else { self.type_defs };
        let def = defs
            .get(name)
            .ok_or_else(|| KilnError::SchemaError(format!("unknown type '{}'", name)))?;

        self.visiting.push((name.to_string(), is_struct));
        let mut desc = match &def.parent {
            Some(parent) => {
                if !defs.contains_key(parent) {
                    return Err(KilnError::SchemaError(format!(
                        "'{}' has unknown parent '{}'",
                        name, parent
                    )));
                }
                let mut desc = (*self.build(parent, is_struct)?).clone();
                desc.type_tag = name.to_string();
                desc.lineage.insert(0, name.to_string());
                desc
            }
            None => TypeDescriptor::new(name),
        };
        desc.is_struct = is_struct;
        if def.positional_inputs.is_some() {
            desc.positional_inputs = def.positional_inputs.clone();
        }

        for (field_name, raw) in &def.fields {
            let field_def: FieldDefinition = raw.clone().try_into().map_err(|e| {
                KilnError::SchemaError(format!("field '{}.{}': {}", name, field_name, e))
            })?;
            let field = self.build_field(name, field_name, &field_def)?;
            match desc.fields.iter_mut().find(|f| f.name == *field_name) {
                Some(existing) => *existing = field,
                None => desc.fields.push(field),
            }
        }
        self.visiting.pop();

        let desc = Arc::new(desc);
        let built = if is_struct { &mut self.structs } else { &mut self.types };
        built.insert(name.to_string(), desc.clone());
        Ok(desc)
    }

    fn is_visiting(&self, name: &str, is_struct: bool) -> bool {
        self.visiting
            .iter()
            .any(|(n, s)| n == name && *s == is_struct)
    }

    fn build_field(
        &mut self,
        owner: &str,
        name: &str,
        def: &FieldDefinition,
    ) -> Result<FieldDescriptor> {
        let kind = self.resolve_kind(parse_field_kind(def));
        let detail = def.detail();
        let default = match detail.and_then(|d| d.default.as_ref()) {
            Some(raw) => self.convert_default(&kind, raw)?.ok_or_else(|| {
                KilnError::SchemaError(format!(
                    "default for '{}.{}' does not match {}",
                    owner,
                    name,
                    kind.type_name()
                ))
            })?,
            None => self.zero(&kind)?,
        };
        Ok(FieldDescriptor {
            name: name.to_string(),
            kind,
            default,
            settable: detail.and_then(|d| d.settable).unwrap_or(true),
            description: detail.and_then(|d| d.description.clone()),
        })
    }

    fn resolve_kind(&self, raw: RawKind) -> FieldKind {
        match raw {
            RawKind::Bool => FieldKind::Bool,
            RawKind::Int(w) => FieldKind::Int(w),
            RawKind::Float(w) => FieldKind::Float(w),
            RawKind::String => FieldKind::String,
            RawKind::Name => FieldKind::Name,
            RawKind::Enum(enum_name) => FieldKind::Enum { enum_name },
            RawKind::Struct(struct_name) => FieldKind::Struct { struct_name },
            RawKind::Named(name) => {
                if self.enums.contains_key(&name) {
                    FieldKind::Enum { enum_name: name }
                } else {
                    FieldKind::Struct { struct_name: name }
                }
            }
            RawKind::Array(element) => FieldKind::Array {
                element: Box::new(self.resolve_kind(*element)),
            },
            RawKind::Reference(class) => FieldKind::Reference { class },
            RawKind::Pin => FieldKind::Pin,
        }
    }

    fn zero(&mut self, kind: &FieldKind) -> Result<Value> {
        Ok(match kind {
            FieldKind::Enum { enum_name } => Value::Enum(
                self.enums
                    .get(enum_name)
                    .and_then(|values| values.first())
                    .cloned()
                    .unwrap_or_default(),
            ),
            FieldKind::Struct { struct_name } => Value::Struct(self.struct_default(struct_name)?),
            other => other.zero_value(),
        })
    }

    fn struct_default(&mut self, struct_name: &str) -> Result<Fields> {
        // Unknown structs are tolerated here and reported when a payload hits them
        if !self.struct_defs.contains_key(struct_name) || self.is_visiting(struct_name, true) {
            return Ok(Fields::new());
        }
        Ok(self.build(struct_name, true)?.construct())
    }

    fn convert_default(&mut self, kind: &FieldKind, raw: &toml::Value) -> Result<Option<Value>> {
        let value = match (kind, raw) {
            (FieldKind::Bool, toml::Value::Boolean(b)) => Value::Bool(*b),
            (FieldKind::Int(_), toml::Value::Integer(n)) => Value::Int(*n),
            (FieldKind::Float(_), toml::Value::Float(n)) => Value::Float(*n),
            (FieldKind::Float(_), toml::Value::Integer(n)) => Value::Float(*n as f64),
            (FieldKind::String, toml::Value::String(s)) => Value::Str(s.clone()),
            (FieldKind::Name, toml::Value::String(s)) => Value::Name(s.clone()),
            (FieldKind::Enum { enum_name }, toml::Value::String(s)) => {
                let known = self
                    .enums
                    .get(enum_name)
                    .map(|values| values.contains(s))
                    .unwrap_or(true);
                if !known {
                    return Ok(None);
                }
                Value::Enum(s.clone())
            }
            (FieldKind::Array { element }, toml::Value::Array(items)) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match self.convert_default(element, item)? {
                        Some(v) => values.push(v),
                        None => return Ok(None),
                    }
                }
                Value::Array(values)
            }
            (FieldKind::Struct { struct_name }, toml::Value::Table(table)) => {
                let mut fields = self.struct_default(struct_name)?;
                let desc = self.structs.get(struct_name).cloned();
                for (key, item) in table {
                    let Some(field) = desc.as_ref().and_then(|d| d.field(key)) else {
                        return Ok(None);
                    };
                    match self.convert_default(&field.kind, item)? {
                        Some(v) => fields.set(key, v),
                        None => return Ok(None),
                    }
                }
                Value::Struct(fields)
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}
