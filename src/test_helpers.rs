//! Shared test utilities for the docsite test suite.
//!
//! Provides tree builders for layered fixtures plus lookup helpers over the
//! compiled [`AssetStore`].
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_tree(tmp.path(), &[
//!     ("templates/index.tmpl", "hello"),
//!     ("static/site.css", "body {}"),
//! ]);
//! ```

use std::path::Path;

use crate::asset::{AssetStore, VirtualAsset};
use crate::render::ResponseSink;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `(relative path, contents)` pairs under `root`, creating directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
    }
}

/// Build a store directly from `(logical path, contents)` pairs.
pub fn store_from(files: &[(&str, &str)]) -> AssetStore {
    let mut store = AssetStore::new();
    for (path, contents) in files {
        store.insert(VirtualAsset {
            logical_path: path.to_string(),
            content: contents.as_bytes().to_vec(),
            metadata: None,
        });
    }
    store
}

// =========================================================================
// Response capture
// =========================================================================

/// A [`ResponseSink`] that keeps the last response in memory.
#[derive(Debug, Default)]
pub struct CapturedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl CapturedResponse {
    pub fn body_text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

impl ResponseSink for CapturedResponse {
    fn send(&mut self, status: u16, content_type: &str, body: Vec<u8>) -> std::io::Result<()> {
        self.status = status;
        self.content_type = content_type.to_string();
        self.body = body;
        Ok(())
    }
}

// =========================================================================
// Store lookups (panic with a clear message on miss)
// =========================================================================

/// All logical paths in store order.
pub fn asset_names(store: &AssetStore) -> Vec<&str> {
    store.names().collect()
}

/// Asset content as UTF-8. Panics if missing or not text.
pub fn asset_text<'a>(store: &'a AssetStore, path: &str) -> &'a str {
    let bytes = store.get(path).unwrap_or_else(|| {
        let names = asset_names(store);
        panic!("asset '{path}' not found. Available: {names:?}")
    });
    std::str::from_utf8(bytes).unwrap_or_else(|e| panic!("asset '{path}' is not UTF-8: {e}"))
}
