//! Batch import command

use anyhow::{Context, Result};
use kiln_import::{ImportConfig, ImportDispatcher, Outcome};
use kiln_schema::TypeRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ImportArgs {
    pub paths: Vec<String>,
    pub schemas: Vec<String>,
    pub config: Option<String>,
    pub suppress: bool,
    pub remote: Option<String>,
    pub format: String,
}

pub fn run(args: ImportArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ImportConfig::load_from_file(Path::new(path))
            .with_context(|| format!("Failed to load config {}", path))?,
        None => ImportConfig::load().context("Failed to load config")?,
    };
    if let Some(url) = &args.remote {
        config.remote.url = url.clone();
        config.remote.enabled = true;
    }
    if args.suppress {
        config.import.suppress_reporting = true;
    }

    let registry = load_registry(&config, &args.schemas)?;
    let mut dispatcher = ImportDispatcher::new(Arc::new(registry), &config);

    let files = collect_export_files(&args.paths)?;
    if files.is_empty() {
        anyhow::bail!("No export files found");
    }

    let mut total = 0;
    let mut failed = 0;
    let mut report = Vec::new();
    for file in &files {
        let outcomes = match dispatcher.import_file(file) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                eprintln!("{}: {}", file.display(), e);
                failed += 1;
                continue;
            }
        };
        total += outcomes.len();
        failed += outcomes.iter().filter(|o| !o.success).count();

        if args.format == "json" {
            report.push(serde_json::json!({
                "file": file.display().to_string(),
                "outcomes": outcomes,
            }));
        } else {
            print_outcomes(file, &outcomes);
        }
    }

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!(
            "Imported {} export(s) from {} file(s): {} failed, {} object(s) in store",
            total,
            files.len(),
            failed,
            dispatcher.store().len()
        );
    }

    if failed > 0 {
        anyhow::bail!("{} export(s) failed to import", failed);
    }
    Ok(())
}

fn load_registry(config: &ImportConfig, extra: &[String]) -> Result<TypeRegistry> {
    let mut directories: Vec<PathBuf> = config.import.schema_directories.clone();
    directories.extend(extra.iter().map(PathBuf::from));

    let mut registry = if directories.is_empty() {
        tracing::warn!("no type catalog directories given; every type will be missing");
        TypeRegistry::new()
    } else {
        for dir in &directories {
            if !dir.exists() {
                anyhow::bail!("Type catalog directory not found: {}", dir.display());
            }
        }
        TypeRegistry::load_from_directories(&directories).context("Failed to load type catalogs")?
    };
    config.apply_to_registry(&mut registry);
    Ok(registry)
}

/// Files given directly, plus every `.json` file below given directories
fn collect_export_files(paths: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let path = PathBuf::from(path);
        if path.is_dir() {
            walk_directory(&path, &mut files)
                .with_context(|| format!("Failed to read directory {}", path.display()))?;
        } else if path.is_file() {
            files.push(path);
        } else {
            anyhow::bail!("Path not found: {}", path.display());
        }
    }
    Ok(files)
}

fn walk_directory(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            walk_directory(&path, files)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    Ok(())
}

fn print_outcomes(file: &Path, outcomes: &[Outcome]) {
    println!("{}", file.display());
    for outcome in outcomes {
        let status = if outcome.success { "ok  " } else { "FAIL" };
        match &outcome.path {
            Some(path) => println!("  {} {} ({}) -> {}", status, outcome.name, outcome.type_tag, path),
            None => println!("  {} {} ({})", status, outcome.name, outcome.type_tag),
        }
        for diagnostic in outcome.diagnostics.iter() {
            println!("       {}", diagnostic);
        }
    }
}
