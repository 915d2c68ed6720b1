//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `KILN_REMOTE_URL`, `KILN_EXPORT_DIR`
//! 2. Project-local: `.kiln/config.toml`
//! 3. Global: `~/.kiln/config.toml`

use kiln_core::{KilnError, Result};
use kiln_export::{Mount, PathRedirect, PathRules};
use kiln_schema::TypeRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where local export files live
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub export_directory: Option<PathBuf>,
    /// Project name whose `<game_name>/Content` directory mounts at `/Game`
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub mounts: Vec<Mount>,
}

/// Remote export service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_remote_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub cache_directory: Option<PathBuf>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_remote_url(),
            timeout_secs: default_timeout_secs(),
            cache_directory: None,
        }
    }
}

fn default_remote_url() -> String {
    "http://localhost:1500".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub redirects: Vec<PathRedirect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasConfig {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionConfig {
    pub pattern: String,
    pub replacement: String,
}

/// Extra type resolution rules layered on top of the catalog's own
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypesConfig {
    #[serde(default)]
    pub aliases: Vec<AliasConfig>,
    #[serde(default)]
    pub substitutions: Vec<SubstitutionConfig>,
}

/// How the member nodes of a graph asset are found in its batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    /// Exports whose outer is the asset
    #[default]
    Outer,
    /// Exports whose type tag starts with the prefix
    TypePrefix(String),
}

/// A graph-shaped asset type and how to rebuild it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphFamily {
    pub asset_type: String,
    #[serde(default)]
    pub membership: Membership,
    /// Node edges live in a `<Type>EditorOnlyData` sibling export
    #[serde(default)]
    pub editor_data: bool,
    /// Payload fields that mark the primary export as carrying the graph itself
    #[serde(default = "default_node_list_fields")]
    pub node_list_fields: Vec<String>,
    /// Declared-owner field placing a node inside a composite's sub-scope
    #[serde(default = "default_owner_field")]
    pub owner_field: String,
    #[serde(default = "default_composite_types")]
    pub composite_types: Vec<String>,
    #[serde(default = "default_boundary_types")]
    pub boundary_types: Vec<String>,
    /// Editor-data fields never applied onto the asset
    #[serde(default = "default_excluded_fields")]
    pub excluded_fields: Vec<String>,
}

fn default_node_list_fields() -> Vec<String> {
    vec![
        "ExpressionCollection".to_string(),
        "Expressions".to_string(),
        "FunctionExpressions".to_string(),
    ]
}
fn default_owner_field() -> String {
    "SubgraphExpression".to_string()
}
fn default_composite_types() -> Vec<String> {
    vec!["MaterialExpressionComposite".to_string()]
}
fn default_boundary_types() -> Vec<String> {
    vec!["MaterialExpressionPinBase".to_string()]
}
fn default_excluded_fields() -> Vec<String> {
    vec![
        "ExpressionCollection".to_string(),
        "ParameterGroupData".to_string(),
    ]
}

impl GraphFamily {
    pub fn new(asset_type: &str, membership: Membership, editor_data: bool) -> Self {
        Self {
            asset_type: asset_type.to_string(),
            membership,
            editor_data,
            node_list_fields: default_node_list_fields(),
            owner_field: default_owner_field(),
            composite_types: default_composite_types(),
            boundary_types: default_boundary_types(),
            excluded_fields: default_excluded_fields(),
        }
    }

    /// Material, MaterialFunction and SoundCue
    pub fn defaults() -> Vec<GraphFamily> {
        vec![
            GraphFamily::new("Material", Membership::Outer, true),
            GraphFamily::new("MaterialFunction", Membership::Outer, true),
            GraphFamily::new(
                "SoundCue",
                Membership::TypePrefix("SoundNode".to_string()),
                false,
            ),
        ]
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.excluded_fields.iter().any(|f| f == field)
    }
}

/// Batch-level switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Keep outcomes away from the reporting channel. Never changes
    /// resolution, construction or success/failure.
    #[serde(default)]
    pub suppress_reporting: bool,
    #[serde(default)]
    pub schema_directories: Vec<PathBuf>,
    /// Nesting bound for imports triggered by reference resolution
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            suppress_reporting: false,
            schema_directories: Vec::new(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    16
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KilnConfigFile {
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub types: TypesConfig,
    #[serde(default)]
    pub graph: Vec<GraphFamily>,
    #[serde(default)]
    pub import: Option<ImportOptions>,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    pub local: LocalConfig,
    pub remote: RemoteConfig,
    pub paths: PathsConfig,
    pub types: TypesConfig,
    pub graph: Vec<GraphFamily>,
    pub import: ImportOptions,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            local: LocalConfig::default(),
            remote: RemoteConfig::default(),
            paths: PathsConfig::default(),
            types: TypesConfig::default(),
            graph: GraphFamily::defaults(),
            import: ImportOptions::default(),
        }
    }
}

impl ImportConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = ImportConfig::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        let local_path = PathBuf::from(".kiln/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load config from a specific file path only
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = ImportConfig::default();
        Self::merge_into(&mut config, Self::load_file(path)?);
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: KilnConfigFile = toml::from_str(content)
            .map_err(|e| KilnError::ConfigError(format!("Failed to parse config: {}", e)))?;
        let mut config = ImportConfig::default();
        Self::merge_into(&mut config, file);
        Ok(config)
    }

    /// Redirects applied to every reference path. Configured redirects come
    /// first, then the game and engine content roots.
    pub fn path_rules(&self) -> PathRules {
        let mut rules = PathRules::new(self.paths.redirects.clone());
        if let Some(game) = &self.local.game_name {
            rules = rules.with_redirect(&format!("{}/Content", game), "/Game");
        }
        rules.with_redirect("Engine/Content", "/Engine")
    }

    /// Configured mounts followed by the game and engine content roots
    pub fn mounts(&self) -> Vec<Mount> {
        let mut mounts = self.local.mounts.clone();
        if let Some(game) = &self.local.game_name {
            mounts.push(Mount::new("/Game/", &format!("{}/Content/", game)));
        }
        mounts.push(Mount::new("/Engine/", "Engine/Content/"));
        mounts
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    pub fn graph_family(&self, asset_type: &str) -> Option<&GraphFamily> {
        self.graph.iter().find(|f| f.asset_type == asset_type)
    }

    /// Register the configured aliases and substitutions
    pub fn apply_to_registry(&self, registry: &mut TypeRegistry) {
        for alias in &self.types.aliases {
            registry.register_alias(&alias.from, &alias.to);
        }
        for rule in &self.types.substitutions {
            registry.register_substitution(&rule.pattern, &rule.replacement);
        }
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".kiln").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<KilnConfigFile> {
        let content = std::fs::read_to_string(path)?;
        let config: KilnConfigFile = toml::from_str(&content).map_err(|e| {
            KilnError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    fn merge_into(base: &mut ImportConfig, overlay: KilnConfigFile) {
        if overlay.local.export_directory.is_some() {
            base.local.export_directory = overlay.local.export_directory;
        }
        if overlay.local.game_name.is_some() {
            base.local.game_name = overlay.local.game_name;
        }
        base.local.mounts.extend(overlay.local.mounts);

        if let Some(remote) = overlay.remote {
            base.remote = remote;
        }

        base.paths.redirects.extend(overlay.paths.redirects);
        base.types.aliases.extend(overlay.types.aliases);
        base.types.substitutions.extend(overlay.types.substitutions);

        for family in overlay.graph {
            match base.graph.iter_mut().find(|f| f.asset_type == family.asset_type) {
                Some(existing) => *existing = family,
                None => base.graph.push(family),
            }
        }

        if let Some(import) = overlay.import {
            base.import = import;
        }
    }

    fn apply_env_overrides(config: &mut ImportConfig, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("KILN_REMOTE_URL") {
            config.remote.url = url;
            config.remote.enabled = true;
        }
        if let Some(dir) = var("KILN_EXPORT_DIR") {
            config.local.export_directory = Some(PathBuf::from(dir));
        }
    }
}
