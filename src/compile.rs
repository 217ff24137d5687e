//! Layered content compilation.
//!
//! Walks asset trees and merges them into one [`AssetStore`]. Override trees
//! are compiled before default trees, and because the store never overwrites
//! a path, the override copy of a file survives while the default tree only
//! fills gaps.
//!
//! ## Layer Order
//!
//! ```text
//! 1. <assets_dir>/themes/<theme>          → assets            (if assets_dir set)
//! 2. <assets_dir>/templates               → assets/templates  (if assets_dir set)
//! 3. <assets_dir>/static                  → assets/static     (if assets_dir set)
//! 4. <default_assets_dir>/themes/<theme>  → assets
//! 5. <default_assets_dir>/templates       → assets/templates
//! 6. <default_assets_dir>/static          → assets/static
//! ```
//!
//! ## Per-File Rules
//!
//! - Hidden directories (`.git`, `.cache`, ...) are pruned with their contents.
//! - `*.md` files are converted to HTML and stored as `*.tmpl`, keeping any
//!   metadata header alongside.
//! - Every payload goes through the document [`RewriteTable`].
//! - A source tree that does not exist is skipped; an unreadable file fails
//!   the whole compilation.

use crate::asset::{AssetStore, VirtualAsset};
use crate::config::{ConfigError, SiteConfig};
use crate::markdown;
use crate::rewrite::RewriteTable;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, trace};
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to walk asset tree: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{path} is outside the tree {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// Destination prefixes used by the layered trees.
pub const THEME_PREFIX: &str = "assets";
pub const TEMPLATES_PREFIX: &str = "assets/templates";
pub const STATIC_PREFIX: &str = "assets/static";

/// Template extension given to compiled markdown documents.
pub const TEMPLATE_EXTENSION: &str = "tmpl";
const MARKDOWN_EXTENSION: &str = "md";

/// Outcome of compiling one tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileReport {
    /// Files that claimed a new logical path.
    pub inserted: usize,
    /// Files whose logical path was already owned by an earlier layer.
    pub shadowed: usize,
    /// The source tree did not exist.
    pub missing: bool,
}

/// One source tree and the prefix it compiles under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub source: PathBuf,
    pub prefix: &'static str,
}

#[derive(Debug, Clone)]
pub struct LayerReport {
    pub layer: Layer,
    pub report: CompileReport,
}

/// Accumulates layered trees into a store.
#[derive(Debug)]
pub struct Compiler {
    rewrite: RewriteTable,
    store: AssetStore,
}

impl Compiler {
    pub fn new(rewrite: RewriteTable) -> Self {
        Self {
            rewrite,
            store: AssetStore::new(),
        }
    }

    /// Compile every file under `source_dir` into `<prefix>/<relative path>`.
    pub fn compile(
        &mut self,
        source_dir: &Path,
        prefix: &str,
    ) -> Result<CompileReport, CompileError> {
        let mut report = CompileReport::default();

        if !source_dir.is_dir() {
            debug!(source = %source_dir.display(), "asset tree not present, skipping");
            report.missing = true;
            return Ok(report);
        }
        let root = std::path::absolute(source_dir).map_err(|source| CompileError::Io {
            path: source_dir.to_path_buf(),
            source,
        })?;

        let walker = WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden_dir(e));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let asset = self.compile_file(entry.path(), &root, prefix)?;
            trace!(path = %asset.logical_path, "import file");
            if self.store.insert(asset) {
                report.inserted += 1;
            } else {
                report.shadowed += 1;
            }
        }

        debug!(
            source = %root.display(),
            prefix,
            inserted = report.inserted,
            shadowed = report.shadowed,
            "compiled asset tree"
        );
        Ok(report)
    }

    fn compile_file(
        &self,
        path: &Path,
        root: &Path,
        prefix: &str,
    ) -> Result<VirtualAsset, CompileError> {
        let raw = fs::read(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut relative = path
            .strip_prefix(root)
            .map_err(|_| CompileError::OutsideRoot {
                path: path.to_path_buf(),
                root: root.to_path_buf(),
            })?
            .to_path_buf();

        let (content, metadata) = if relative.extension().is_some_and(|e| e == MARKDOWN_EXTENSION)
        {
            let (html, metadata) = markdown::render_document(&raw);
            relative.set_extension(TEMPLATE_EXTENSION);
            (html, Some(metadata).filter(|m| !m.is_empty()))
        } else {
            (raw, None)
        };

        if let Some(metadata) = &metadata {
            debug!(path = %relative.display(), keys = metadata.len(), "document metadata");
        }

        Ok(VirtualAsset {
            logical_path: logical_path(prefix, &relative),
            content: self.rewrite.apply_owned(content),
            metadata,
        })
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn finish(self) -> AssetStore {
        self.store
    }
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.')
}

/// `prefix/relative` with `/` separators regardless of platform.
fn logical_path(prefix: &str, relative: &Path) -> String {
    let mut logical = prefix.to_string();
    for component in relative.components() {
        logical.push('/');
        logical.push_str(&component.as_os_str().to_string_lossy());
    }
    logical
}

/// The six layers for a configuration, in precedence order.
pub fn layers(config: &SiteConfig) -> Vec<Layer> {
    let mut roots = Vec::with_capacity(2);
    if let Some(custom) = &config.assets_dir {
        roots.push(custom.as_path());
    }
    roots.push(config.default_assets_dir.as_path());

    roots
        .into_iter()
        .flat_map(|root| {
            [
                Layer {
                    source: config.theme_dir(root),
                    prefix: THEME_PREFIX,
                },
                Layer {
                    source: root.join("templates"),
                    prefix: TEMPLATES_PREFIX,
                },
                Layer {
                    source: root.join("static"),
                    prefix: STATIC_PREFIX,
                },
            ]
        })
        .collect()
}

/// Compile every configured layer into a frozen store.
pub fn compile_layers(
    config: &SiteConfig,
) -> Result<(AssetStore, Vec<LayerReport>), CompileError> {
    let rewrite = RewriteTable::from_directives(&config.document_rewrite_url, &config.site_url)?;
    let mut compiler = Compiler::new(rewrite);
    let mut reports = Vec::new();

    for layer in layers(config) {
        let report = compiler.compile(&layer.source, layer.prefix)?;
        reports.push(LayerReport { layer, report });
    }

    let store = compiler.finish();
    info!(assets = store.len(), "asset store ready");
    Ok((store, reports))
}
