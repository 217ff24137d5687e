//! Server configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! default_assets_dir = "assets"   # Default theme/templates/static tree
//! # assets_dir = "custom"         # Site-specific overrides (same layout)
//! theme = "default"               # Subdirectory of <root>/themes/
//! spec_dir = "specs"              # Specification documents (*.json)
//! site_url = "http://127.0.0.1:5000"
//! spec_rewrite_url = []           # "from=to" or bare "from" (→ site_url)
//! document_rewrite_url = []
//! bind_addr = "127.0.0.1:5000"
//! log_level = "info"
//! force_root_page = false
//! ```
//!
//! ## Asset Tree Layout
//!
//! Both `default_assets_dir` and `assets_dir` follow the same layout:
//!
//! ```text
//! assets/
//! ├── templates/          # *.tmpl and *.md (→ .tmpl) page templates
//! ├── static/             # Served under /static/
//! └── themes/
//!     └── default/        # Merged over the asset root itself
//!         ├── templates/
//!         └── static/
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Invalid rewrite directive '{0}': expected 'from=to' or a bare 'from'")]
    Rewrite(String),
}

/// Server configuration loaded from `config.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Optional override tree. Anything here shadows the default tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_dir: Option<PathBuf>,
    /// Mandatory default tree holding the stock theme and templates.
    pub default_assets_dir: PathBuf,
    /// Theme name, resolved as `<tree>/themes/<theme>` for both trees.
    pub theme: String,
    /// Root of the specification documents published verbatim.
    pub spec_dir: PathBuf,
    /// Public base URL of this deployment; target of bare rewrite directives.
    pub site_url: String,
    /// Rewrites applied to specification documents.
    pub spec_rewrite_url: Vec<String>,
    /// Rewrites applied to compiled templates, guides and static files.
    pub document_rewrite_url: Vec<String>,
    /// Address the HTTP server listens on.
    pub bind_addr: String,
    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_level: String,
    /// Keep the top-level index page even when only one API is loaded.
    pub force_root_page: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            assets_dir: None,
            default_assets_dir: PathBuf::from("assets"),
            theme: "default".to_string(),
            spec_dir: PathBuf::from("specs"),
            site_url: "http://127.0.0.1:5000".to_string(),
            spec_rewrite_url: Vec::new(),
            document_rewrite_url: Vec::new(),
            bind_addr: "127.0.0.1:5000".to_string(),
            log_level: "info".to_string(),
            force_root_page: false,
        }
    }
}

impl SiteConfig {
    /// Validate config values are usable before anything is compiled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_assets_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "default_assets_dir must not be empty".into(),
            ));
        }
        if self.theme.is_empty() || self.theme.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "theme must be a single directory name".into(),
            ));
        }
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "bind_addr '{}' is not a socket address",
                self.bind_addr
            )));
        }
        if tracing_subscriber::EnvFilter::try_new(&self.log_level).is_err() {
            return Err(ConfigError::Validation(format!(
                "log_level '{}' is not a valid filter",
                self.log_level
            )));
        }
        Ok(())
    }

    /// The theme directory inside an asset tree.
    pub fn theme_dir(&self, root: &Path) -> PathBuf {
        root.join("themes").join(&self.theme)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SiteConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so rewrite
///   lists are replaced, never concatenated.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, falling back to stock defaults when it
/// does not exist.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# docsite configuration
# =====================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Asset trees
# ---------------------------------------------------------------------------
# Default tree: the stock theme, templates and static files.
default_assets_dir = "assets"

# Override tree with the same layout. Files here win over the default tree;
# the default tree only fills the gaps.
# assets_dir = "custom"

# Theme name. Resolved as <tree>/themes/<theme> in both trees.
theme = "default"

# ---------------------------------------------------------------------------
# Specifications
# ---------------------------------------------------------------------------
# Directory of specification documents (*.json), served at /<relative path>.
spec_dir = "specs"

# ---------------------------------------------------------------------------
# URL rewriting
# ---------------------------------------------------------------------------
# Public URL of this deployment. Bare rewrite directives map here.
site_url = "http://127.0.0.1:5000"

# Each entry is "from=to", or a bare "from" which maps to site_url.
spec_rewrite_url = []
document_rewrite_url = []

# ---------------------------------------------------------------------------
# Server
# ---------------------------------------------------------------------------
bind_addr = "127.0.0.1:5000"

# Tracing filter used when RUST_LOG is not set.
log_level = "info"

# With a single API loaded, "/" redirects to that API's page unless this is set.
force_root_page = false
"##
}
