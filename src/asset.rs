//! The virtual asset store.
//!
//! Every layered tree compiles into one [`AssetStore`] keyed by logical path
//! (`assets/templates/index.tmpl`, `assets/static/style.css`, ...). The first
//! layer to claim a path owns it; later layers only fill gaps.
//!
//! The store is populated during start-up and then frozen: callers receive
//! it behind an `Arc` and only ever read from it.

use std::collections::BTreeMap;

/// One compiled file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualAsset {
    pub logical_path: String,
    pub content: Vec<u8>,
    /// Present only for markdown documents that carried a metadata header.
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Logical path → compiled asset. Keys are unique and never overwritten.
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    assets: BTreeMap<String, VirtualAsset>,
}

/// Normalise Windows separators so lookups match the stored `/` keys.
fn canonical(path: &str) -> std::borrow::Cow<'_, str> {
    if path.contains('\\') {
        std::borrow::Cow::Owned(path.replace('\\', "/"))
    } else {
        std::borrow::Cow::Borrowed(path)
    }
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an asset unless its path is already taken.
    ///
    /// Returns `false` (and drops `asset`) when an earlier layer owns the path.
    pub(crate) fn insert(&mut self, asset: VirtualAsset) -> bool {
        use std::collections::btree_map::Entry;
        match self.assets.entry(asset.logical_path.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(asset);
                true
            }
        }
    }

    /// Content of an asset.
    pub fn get(&self, logical_path: &str) -> Option<&[u8]> {
        self.asset(logical_path).map(|a| a.content.as_slice())
    }

    pub fn asset(&self, logical_path: &str) -> Option<&VirtualAsset> {
        self.assets.get(canonical(logical_path).as_ref())
    }

    pub fn contains(&self, logical_path: &str) -> bool {
        self.asset(logical_path).is_some()
    }

    /// A metadata value for an asset, or `""` when either is missing.
    ///
    /// Keys are matched case-insensitively.
    pub fn metadata(&self, logical_path: &str, key: &str) -> &str {
        self.asset(logical_path)
            .and_then(|a| a.metadata.as_ref())
            .and_then(|m| m.get(&key.to_lowercase()))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// All logical paths, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    /// Logical paths of assets that carry metadata, sorted.
    pub fn metadata_paths(&self) -> impl Iterator<Item = &str> {
        self.assets
            .values()
            .filter(|a| a.metadata.is_some())
            .map(|a| a.logical_path.as_str())
    }

    /// Assets under `prefix/` as `(path relative to prefix, asset)`.
    pub fn under<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a VirtualAsset)> + 'a {
        self.assets.iter().filter_map(move |(path, asset)| {
            path.strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('/'))
                .map(|rest| (rest, asset))
        })
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
