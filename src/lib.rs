//! # Docsite
//!
//! A documentation server for JSON API specifications. Themes, templates,
//! static files and markdown guides live on disk in layered trees; at start-up
//! they are compiled into a single in-memory asset store and the server never
//! reads them again.
//!
//! # Architecture: Build Once, Serve Read-Only
//!
//! ```text
//! 1. Compile   assets/ + override/  →  AssetStore      (layered, first writer wins)
//! 2. Publish   specs/               →  SpecRouteMap    (rewritten JSON per route)
//! 3. Load      SpecRouteMap         →  ApiCatalog      (parsed models for templates)
//! 4. Prepare   AssetStore           →  Renderer        (compiled templates)
//! 5. Serve     Site                 →  HTTP            (immutable, shared by workers)
//! ```
//!
//! Everything mutable happens in steps 1 to 4 on a single thread. The finished
//! [`site::Site`] is moved into an `Arc` before the first worker starts, so
//! request handling only ever reads.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation, `gen-config` |
//! | [`rewrite`] | Literal multi-pattern URL replacement for documents and specifications |
//! | [`markdown`] | Front-matter header parsing and GitHub-flavoured markdown to HTML |
//! | [`asset`] | The virtual asset store: logical path → bytes plus optional metadata |
//! | [`compile`] | Walks the layered source trees into the asset store |
//! | [`render`] | Template environment, layout wrapping, default bindings, index resolution |
//! | [`specs`] | Specification routes and the parsed API catalogue |
//! | [`site`] | Start-up assembly and request routing |
//! | [`serve`] | `tiny_http` listener and worker threads |
//! | [`output`] | CLI output formatting for the `check` command |
//!
//! # Design Decisions
//!
//! ## Layers Instead of Merging
//!
//! An operator customises the look of the site by pointing `assets_dir` at a
//! tree that mirrors the default one. Files are never merged: the first layer
//! to claim a logical path owns it, and the override tree is compiled first.
//!
//! ```text
//! override/themes/<theme>/   ┐
//! override/templates/        ├─ compiled first
//! override/static/           ┘
//! assets/themes/<theme>/     ┐
//! assets/templates/          ├─ fill the gaps
//! assets/static/             ┘
//! ```
//!
//! ## Bracket Delimiters
//!
//! Templates use `[: … :]` for expressions and `[% … %]` for blocks so that
//! they can embed client-side code using `{{ }}` untouched.
//!
//! ## Fail Fast at Start-up
//!
//! An unreadable file, a malformed rewrite directive, a broken template or an
//! invalid specification document all stop the server before it binds. There
//! is no partially built site.

pub mod asset;
pub mod compile;
pub mod config;
pub mod markdown;
pub mod output;
pub mod render;
pub mod rewrite;
pub mod serve;
pub mod site;
pub mod specs;

#[cfg(test)]
pub(crate) mod test_helpers;
