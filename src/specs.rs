//! Specification documents.
//!
//! Every `*.json` file below `spec_dir` is published verbatim at a route equal
//! to its path relative to `spec_dir` (`specs/petstore/swagger.json` →
//! `/petstore/swagger.json`), after the specification [`RewriteTable`] has
//! retargeted any hard-coded URLs. Unlike the asset trees there is only one
//! layer, so nothing is shadowed.
//!
//! The same documents feed the [`ApiCatalog`], the `APIs` binding seen by
//! templates. An API's identifier is the first directory of its route, or the
//! file stem for documents at the top level:
//!
//! ```text
//! /petstore/swagger.json  → petstore
//! /billing.json           → billing
//! ```

use crate::config::{ConfigError, SiteConfig};
use crate::render::ApiModels;
use crate::rewrite::RewriteTable;
use minijinja::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to walk specification tree: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Specification {route} is not valid JSON: {source}")]
    Json {
        route: String,
        source: serde_json::Error,
    },
}

const SPEC_EXTENSION: &str = "json";
pub const SPEC_CONTENT_TYPE: &str = "application/json";
pub const SPEC_CACHE_CONTROL: &str = "public, max-age=259200";

/// A published specification document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDocument {
    pub content: Vec<u8>,
    /// Quoted strong validator derived from `content`.
    pub etag: String,
}

impl SpecDocument {
    fn new(content: Vec<u8>) -> Self {
        let etag = format!("\"{:x}\"", Sha256::digest(&content));
        Self { content, etag }
    }

    pub fn content_type(&self) -> &'static str {
        SPEC_CONTENT_TYPE
    }

    pub fn cache_control(&self) -> &'static str {
        SPEC_CACHE_CONTROL
    }
}

/// Route → rewritten specification document.
#[derive(Debug, Clone, Default)]
pub struct SpecRouteMap {
    documents: BTreeMap<String, SpecDocument>,
}

impl SpecRouteMap {
    /// Publish every specification document under `spec_dir`.
    ///
    /// A missing directory yields an empty map.
    pub fn build(spec_dir: &Path, rewrite: &RewriteTable) -> Result<Self, SpecError> {
        let mut documents = BTreeMap::new();
        if !spec_dir.is_dir() {
            warn!(spec_dir = %spec_dir.display(), "specification directory not found");
            return Ok(Self { documents });
        }
        let root = std::path::absolute(spec_dir).map_err(|source| SpecError::Io {
            path: spec_dir.to_path_buf(),
            source,
        })?;

        for entry in WalkDir::new(&root).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().is_none_or(|e| e != SPEC_EXTENSION)
            {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&root) else {
                continue;
            };
            let route = route_for(relative);
            let raw = fs::read(path).map_err(|source| SpecError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            trace!(path = %path.display(), route = %route, "publish specification");
            documents.insert(route, SpecDocument::new(rewrite.apply_owned(raw)));
        }

        debug!(count = documents.len(), "specification routes built");
        Ok(Self { documents })
    }

    /// Build from configuration with its own rewrite table.
    pub fn from_config(config: &SiteConfig) -> Result<Self, SpecError> {
        let rewrite = RewriteTable::from_directives(&config.spec_rewrite_url, &config.site_url)?;
        Self::build(&config.spec_dir, &rewrite)
    }

    /// The stored document for `route`, unchanged since start-up.
    pub fn serve_spec(&self, route: &str) -> Option<&SpecDocument> {
        self.documents.get(route)
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// `/` joined route for a path relative to the specification root.
fn route_for(relative: &Path) -> String {
    let mut route = String::new();
    for component in relative.components() {
        route.push('/');
        route.push_str(&component.as_os_str().to_string_lossy());
    }
    route
}

/// Identifier of the API published at `route`.
pub fn api_id(route: &str) -> &str {
    let trimmed = route.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((dir, _)) => dir,
        None => trimmed.strip_suffix(".json").unwrap_or(trimmed),
    }
}

/// Parsed specification documents keyed by API identifier.
#[derive(Debug, Clone, Default)]
pub struct ApiCatalog {
    apis: BTreeMap<String, serde_json::Value>,
}

impl ApiCatalog {
    /// Parse every published document. Invalid JSON fails start-up.
    pub fn from_routes(routes: &SpecRouteMap) -> Result<Self, SpecError> {
        let mut apis = BTreeMap::new();
        for (route, document) in &routes.documents {
            let id = api_id(route);
            if apis.contains_key(id) {
                warn!(route = %route, id, "duplicate API identifier, keeping first document");
                continue;
            }
            let model: serde_json::Value =
                serde_json::from_slice(&document.content).map_err(|source| SpecError::Json {
                    route: route.clone(),
                    source,
                })?;
            apis.insert(id.to_string(), model);
        }
        info!(count = apis.len(), "specifications loaded");
        Ok(Self { apis })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.apis.keys().map(String::as_str)
    }

    pub fn get(&self, id: &str) -> Option<&serde_json::Value> {
        self.apis.get(id)
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}

impl ApiModels for ApiCatalog {
    fn models(&self) -> Value {
        Value::from_serialize(&self.apis)
    }
}
