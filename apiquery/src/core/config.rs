use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_IMPLICIT_SELECT, DEFAULT_MAX_FILTERS, DEFAULT_ORDER,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Query compiler section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueryFileConfig {
    pub verified_seal_ids: Option<Vec<u64>>,
    pub default_order: Option<String>,
    pub implicit_select: Option<Vec<String>>,
    pub max_limit: Option<u64>,
    pub max_filters: Option<usize>,
}

/// Root of the JSON config file
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileConfig {
    pub query: Option<QueryFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Overlay `other` on top of `self`, field by field
    fn merge(&mut self, other: FileConfig) {
        if let Some(query) = other.query {
            let current = self.query.get_or_insert_with(QueryFileConfig::default);
            if query.verified_seal_ids.is_some() {
                tracing::trace!(ids = ?query.verified_seal_ids, "Merging query.verified_seal_ids");
                current.verified_seal_ids = query.verified_seal_ids;
            }
            if query.default_order.is_some() {
                tracing::trace!(order = ?query.default_order, "Merging query.default_order");
                current.default_order = query.default_order;
            }
            if query.implicit_select.is_some() {
                tracing::trace!(select = ?query.implicit_select, "Merging query.implicit_select");
                current.implicit_select = query.implicit_select;
            }
            if query.max_limit.is_some() {
                tracing::trace!(max_limit = ?query.max_limit, "Merging query.max_limit");
                current.max_limit = query.max_limit;
            }
            if query.max_filters.is_some() {
                tracing::trace!(max_filters = ?query.max_filters, "Merging query.max_filters");
                current.max_filters = query.max_filters;
            }
        }
    }
}

// =============================================================================
// Runtime Config
// =============================================================================

/// Runtime settings of the query compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Seal ids `@verified` expands to
    pub verified_seal_ids: Vec<u64>,
    /// Order applied when the request has no `@order`
    pub default_order: String,
    /// Properties always selected when the entity has them
    pub implicit_select: Vec<String>,
    /// Largest accepted `@limit`, unbounded when unset
    pub max_limit: Option<u64>,
    pub max_filters: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            verified_seal_ids: Vec::new(),
            default_order: DEFAULT_ORDER.to_string(),
            implicit_select: DEFAULT_IMPLICIT_SELECT
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_limit: None,
            max_filters: DEFAULT_MAX_FILTERS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub query: QueryConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.apiquery/apiquery.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Profile dir, skipped if missing
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_home(path);
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::layer(file_config, cli);
        config.validate()?;

        tracing::debug!(config = ?config, "Configuration loaded");
        Ok(config)
    }

    /// Defaults -> file config -> CLI/env overrides
    fn layer(file_config: FileConfig, cli: &CliConfig) -> Self {
        let file_query = file_config.query.unwrap_or_default();
        let defaults = QueryConfig::default();

        let query = QueryConfig {
            verified_seal_ids: cli
                .verified_seals
                .clone()
                .or(file_query.verified_seal_ids)
                .unwrap_or(defaults.verified_seal_ids),
            default_order: cli
                .default_order
                .clone()
                .or(file_query.default_order)
                .unwrap_or(defaults.default_order),
            implicit_select: file_query
                .implicit_select
                .unwrap_or(defaults.implicit_select),
            max_limit: cli.max_limit.or(file_query.max_limit),
            max_filters: file_query.max_filters.unwrap_or(defaults.max_filters),
        };

        Self { query }
    }

    fn validate(&self) -> Result<()> {
        if self.query.default_order.trim().is_empty() {
            anyhow::bail!("Configuration error: query.default_order must not be empty");
        }
        if self.query.max_filters == 0 {
            anyhow::bail!("Configuration error: query.max_filters must be greater than 0");
        }
        if self.query.max_limit == Some(0) {
            anyhow::bail!("Configuration error: query.max_limit must be greater than 0");
        }
        Ok(())
    }
}

/// Get the profile config path (~/.apiquery/apiquery.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
