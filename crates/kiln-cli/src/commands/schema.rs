//! Type catalog introspection command

use anyhow::{Context, Result};
use kiln_schema::{TypeRegistry, Value};
use std::path::Path;

pub fn run(name: &str, schemas_path: &str) -> Result<()> {
    if !Path::new(schemas_path).exists() {
        anyhow::bail!("Type catalog directory not found: {}", schemas_path);
    }

    let registry =
        TypeRegistry::load_from_directory(schemas_path).context("Failed to load type catalogs")?;

    if let Some(values) = registry.enum_values(name) {
        println!("Enum: {}", name);
        println!();
        for value in values {
            println!("  - {}", value);
        }
        return Ok(());
    }

    // Types first, then structs
    if let Some(desc) = registry.resolve(name).or_else(|| registry.resolve_struct(name)) {
        let kind = if desc.is_struct { "Struct" } else { "Type" };
        println!("{}: {}", kind, desc.type_tag);
        if desc.type_tag != name {
            println!("Resolved from: {}", name);
        }
        if desc.lineage.len() > 1 {
            println!("Lineage: {}", desc.lineage.join(" -> "));
        }
        if let Some(positional) = &desc.positional_inputs {
            println!("Positional inputs: {}", positional);
        }
        println!();
        println!("Fields:");
        for field in &desc.fields {
            let settable = if field.settable { "" } else { " (not settable)" };
            print!("  {} : {}{}", field.name, field.kind.type_name(), settable);
            if field.default != field.kind.zero_value() {
                print!(" = {}", format_value(&field.default));
            }
            println!();
            if let Some(description) = &field.description {
                println!("    # {}", description);
            }
        }
        return Ok(());
    }

    println!("Type '{}' not found.", name);
    println!();

    let types = registry.type_names();
    let structs = registry.struct_names();
    let enums = registry.enum_names();

    if !types.is_empty() {
        println!("Available types:");
        for t in types {
            println!("  - {}", t);
        }
    }
    if !structs.is_empty() {
        println!();
        println!("Available structs:");
        for s in structs {
            println!("  - {}", s);
        }
    }
    if !enums.is_empty() {
        println!();
        println!("Available enums:");
        for e in enums {
            println!("  - {}", e);
        }
    }

    Ok(())
}

fn format_value(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) | Value::Name(s) => format!("\"{}\"", s),
        Value::Enum(e) => e.clone(),
        Value::Struct(fields) => {
            let items: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{} = {}", k, format_value(v)))
                .collect();
            format!("{{ {} }}", items.join(", "))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(_) | Value::Node(_) | Value::Pin(_) => "None".to_string(),
    }
}
