//! Start-up assembly and request routing.
//!
//! [`Site::build`] runs the whole construction phase in order: compile the
//! layered asset trees, publish the specification documents, load the API
//! catalogue, and compile the templates. Only the finished, immutable
//! [`Site`] is handed to request threads.
//!
//! ## Routes
//!
//! Resolved in this order for `GET`/`HEAD`:
//!
//! | Path | Response |
//! |------|----------|
//! | any published specification route | the document, `application/json` |
//! | `/` | redirect to the only API, or the `index` template |
//! | `/static/<path>` | `assets/static/<path>` from the store |
//! | `/<api id>/` | `<id>/index` if present, else `specindex` |
//! | `/<template>` for guides with metadata | that template |
//! | anything else | `error` template, 404 |

use crate::asset::AssetStore;
use crate::compile::{
    self, CompileError, LayerReport, STATIC_PREFIX, TEMPLATE_EXTENSION, TEMPLATES_PREFIX,
};
use crate::config::{ConfigError, SiteConfig};
use crate::render::{RenderError, Renderer, ResponseSink, Vars};
use crate::specs::{ApiCatalog, SpecError, SpecRouteMap};
use maud::{DOCTYPE, Markup, html};
use minijinja::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SiteError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

const DEFAULT_TITLE: &str = "API documentation";
const STATIC_ROUTE: &str = "/static/";

/// A response produced by [`Site::handle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    fn new(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", content_type.to_string())],
            body,
        }
    }

    fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl ResponseSink for Reply {
    fn send(&mut self, status: u16, content_type: &str, body: Vec<u8>) -> std::io::Result<()> {
        *self = Reply::new(status, content_type, body);
        Ok(())
    }
}

/// Everything a request handler reads. Immutable once built.
#[derive(Debug)]
pub struct Site {
    config: Arc<SiteConfig>,
    store: Arc<AssetStore>,
    renderer: Renderer,
    specs: SpecRouteMap,
    catalog: Arc<ApiCatalog>,
    layers: Vec<LayerReport>,
    /// Route → template name for guides carrying metadata.
    guides: BTreeMap<String, String>,
}

impl Site {
    pub fn build(config: SiteConfig) -> Result<Self, SiteError> {
        config.validate()?;
        let (store, reports) = compile::compile_layers(&config)?;
        for layer in &reports {
            if !layer.report.missing {
                info!(
                    source = %layer.layer.source.display(),
                    prefix = layer.layer.prefix,
                    inserted = layer.report.inserted,
                    shadowed = layer.report.shadowed,
                    "layer compiled"
                );
            }
        }

        let specs = SpecRouteMap::from_config(&config)?;
        let catalog = Arc::new(ApiCatalog::from_routes(&specs)?);
        let renderer = Renderer::new(&store, &config, catalog.clone())?;
        let guides = guide_routes(&store);

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            renderer,
            specs,
            catalog,
            layers: reports,
            guides,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn specs(&self) -> &SpecRouteMap {
        &self.specs
    }

    pub fn catalog(&self) -> &ApiCatalog {
        &self.catalog
    }

    /// Per-layer compile outcome, in precedence order.
    pub fn layers(&self) -> &[LayerReport] {
        &self.layers
    }

    pub fn guide_routes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.guides.iter().map(|(r, t)| (r.as_str(), t.as_str()))
    }

    /// Route one request. `if_none_match` is the request's validator header.
    pub fn handle(&self, method: &str, url: &str, if_none_match: Option<&str>) -> Reply {
        if method != "GET" && method != "HEAD" {
            return Reply::new(405, "text/plain; charset=utf-8", b"Method Not Allowed".to_vec())
                .with_header("Allow", "GET, HEAD");
        }
        let raw_path = url.split(['?', '#']).next().unwrap_or(url);
        let Ok(decoded) = urlencoding::decode(raw_path) else {
            return self.not_found();
        };
        let path: &str = &decoded;

        if let Some(doc) = self.specs.serve_spec(path) {
            if if_none_match.is_some_and(|header| etag_matches(header, &doc.etag)) {
                return Reply {
                    status: 304,
                    headers: vec![("ETag", doc.etag.clone())],
                    body: Vec::new(),
                };
            }
            return Reply::new(200, doc.content_type(), doc.content.clone())
                .with_header("Cache-Control", doc.cache_control())
                .with_header("ETag", doc.etag.clone());
        }

        if path == "/" {
            return self.root_page();
        }
        if let Some(rest) = path.strip_prefix(STATIC_ROUTE) {
            return self.static_asset(rest);
        }
        if let Some(id) = path
            .strip_prefix('/')
            .and_then(|p| p.strip_suffix('/'))
            .filter(|id| self.catalog.get(id).is_some())
        {
            return self.spec_home(id);
        }
        if let Some(template) = self.guides.get(path) {
            let title = self.store.metadata(
                &format!("{TEMPLATES_PREFIX}/{template}.{TEMPLATE_EXTENSION}"),
                "title",
            );
            let title = if title.is_empty() { DEFAULT_TITLE } else { title };
            return self.page(200, template, title_vars(title));
        }
        self.not_found()
    }

    fn root_page(&self) -> Reply {
        if self.catalog.len() == 1 && !self.config.force_root_page {
            if let Some(id) = self.catalog.ids().next() {
                return Reply::new(302, "text/plain; charset=utf-8", Vec::new())
                    .with_header("Location", format!("/{id}/"));
            }
        }
        self.page(200, "index", title_vars(DEFAULT_TITLE))
    }

    fn spec_home(&self, id: &str) -> Reply {
        let template = self.renderer.resolve_spec_index(id);
        let mut data = title_vars(DEFAULT_TITLE);
        data.insert("ApiID".into(), Value::from(id));
        if let Some(model) = self.catalog.get(id) {
            data.insert("API".into(), Value::from_serialize(model));
        }
        self.page(200, template.name(), data)
    }

    fn static_asset(&self, rest: &str) -> Reply {
        if rest.split('/').any(|segment| segment == "..") {
            return self.not_found();
        }
        let logical = format!("{STATIC_PREFIX}/{rest}");
        match self.store.get(&logical) {
            Some(bytes) => Reply::new(200, guess_content_type(rest), bytes.to_vec()),
            None => self.not_found(),
        }
    }

    fn not_found(&self) -> Reply {
        let mut data = Vars::new();
        data.insert("error".into(), Value::from("Page not found"));
        self.page(404, "error", data)
    }

    /// Render with the default bindings; a failed render becomes a 500.
    fn page(&self, status: u16, template: &str, data: Vars) -> Reply {
        let data = self.renderer.default_vars(data);
        let mut reply = Reply::default();
        match self.renderer.render(&mut reply, status, template, &data) {
            Ok(()) => reply,
            Err(err) => {
                warn!(template, error = %err, "render failed");
                let page = fallback_page(500, "The page could not be rendered.");
                Reply::new(500, crate::render::HTML_CONTENT_TYPE, page.into_string().into_bytes())
            }
        }
    }
}

/// `If-None-Match` check: a comma-separated list of tags, weak or strong,
/// or `*`.
fn etag_matches(header: &str, etag: &str) -> bool {
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}

fn title_vars(title: &str) -> Vars {
    let mut data = Vars::new();
    data.insert("Title".into(), Value::from(title));
    data
}

/// Templates that came from markdown documents with a metadata header.
fn guide_routes(store: &AssetStore) -> BTreeMap<String, String> {
    let suffix = format!(".{TEMPLATE_EXTENSION}");
    store
        .metadata_paths()
        .filter_map(|path| {
            path.strip_prefix(TEMPLATES_PREFIX)?
                .strip_prefix('/')?
                .strip_suffix(&suffix)
        })
        .map(|name| (format!("/{name}"), name.to_string()))
        .collect()
}

/// Minimal page used when the theme cannot render its own.
pub fn fallback_page(status: u16, message: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Error " (status) }
            }
            body {
                h1 { "Error " (status) }
                p { (message) }
            }
        }
    }
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
pub fn guess_content_type(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const LAYOUT: &str = "<main>[: content :]</main>";

    fn site_with(root: &Path, files: &[(&str, &str)], config: SiteConfig) -> Site {
        write_tree(root, files);
        Site::build(SiteConfig {
            default_assets_dir: root.join("assets"),
            spec_dir: root.join("specs"),
            ..config
        })
        .unwrap()
    }

    fn body(reply: &Reply) -> &str {
        std::str::from_utf8(&reply.body).unwrap()
    }

    fn stock_files() -> Vec<(&'static str, &'static str)> {
        vec![
            ("assets/templates/layout.tmpl", LAYOUT),
            ("assets/templates/index.tmpl", "index [: Title :]"),
            ("assets/templates/specindex.tmpl", "generic [: ApiID :]"),
            ("assets/templates/error.tmpl", "error [: error :]"),
            ("assets/static/site.css", "body{}"),
        ]
    }

    #[test]
    fn single_api_redirects_root() {
        let tmp = TempDir::new().unwrap();
        let mut files = stock_files();
        files.push(("specs/petstore/swagger.json", "{}"));
        let site = site_with(tmp.path(), &files, SiteConfig::default());

        let reply = site.handle("GET", "/", None);
        assert_eq!(reply.status, 302);
        assert_eq!(reply.header("location"), Some("/petstore/"));
    }

    #[test]
    fn forced_root_page_renders_index() {
        let tmp = TempDir::new().unwrap();
        let mut files = stock_files();
        files.push(("specs/petstore.json", "{}"));
        let config = SiteConfig {
            force_root_page: true,
            ..SiteConfig::default()
        };
        let site = site_with(tmp.path(), &files, config);

        let reply = site.handle("GET", "/", None);
        assert_eq!(reply.status, 200);
        assert_eq!(body(&reply), "<main>index API documentation</main>");
    }

    #[test]
    fn spec_home_uses_specific_then_generic() {
        let tmp = TempDir::new().unwrap();
        let mut files = stock_files();
        files.push(("assets/templates/petstore/index.tmpl", "pets page"));
        files.push(("specs/petstore.json", "{}"));
        files.push(("specs/other.json", "{}"));
        let site = site_with(tmp.path(), &files, SiteConfig::default());

        assert_eq!(body(&site.handle("GET", "/petstore/", None)), "<main>pets page</main>");
        assert_eq!(body(&site.handle("GET", "/other/", None)), "<main>generic other</main>");
    }

    #[test]
    fn spec_document_served_with_cache_headers() {
        let tmp = TempDir::new().unwrap();
        let mut files = stock_files();
        files.push(("specs/petstore.json", r#"{"a": 1}"#));
        let site = site_with(tmp.path(), &files, SiteConfig::default());

        let reply = site.handle("GET", "/petstore.json?x=1", None);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.header("Content-Type"), Some("application/json"));
        assert_eq!(reply.header("Cache-Control"), Some("public, max-age=259200"));
        assert_eq!(body(&reply), r#"{"a": 1}"#);

        let etag = reply.header("ETag").unwrap().to_string();
        let revalidated = site.handle("GET", "/petstore.json", Some(&etag));
        assert_eq!(revalidated.status, 304);
        assert!(revalidated.body.is_empty());
    }

    #[test]
    fn static_assets_served_from_store() {
        let tmp = TempDir::new().unwrap();
        let site = site_with(tmp.path(), &stock_files(), SiteConfig::default());

        let reply = site.handle("GET", "/static/site.css", None);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.header("Content-Type"), Some("text/css; charset=utf-8"));
        assert_eq!(body(&reply), "body{}");
    }

    #[test]
    fn unknown_path_renders_error_template() {
        let tmp = TempDir::new().unwrap();
        let site = site_with(tmp.path(), &stock_files(), SiteConfig::default());

        let reply = site.handle("GET", "/nowhere", None);
        assert_eq!(reply.status, 404);
        assert_eq!(body(&reply), "<main>error Page not found</main>");
        assert_eq!(site.handle("GET", "/static/../config.toml", None).status, 404);
    }

    #[test]
    fn missing_error_template_falls_back() {
        let tmp = TempDir::new().unwrap();
        let site = site_with(
            tmp.path(),
            &[("assets/templates/layout.tmpl", LAYOUT)],
            SiteConfig::default(),
        );

        let reply = site.handle("GET", "/nowhere", None);
        assert_eq!(reply.status, 500);
        assert!(body(&reply).contains("<h1>Error 500</h1>"));
    }

    #[test]
    fn guides_routed_by_metadata() {
        let tmp = TempDir::new().unwrap();
        let mut files = stock_files();
        files.push(("assets/templates/guides/start.md", "Title: Getting started\n\nHello"));
        files.push(("assets/templates/guides/plain.md", "No header here"));
        let site = site_with(tmp.path(), &files, SiteConfig::default());

        let routes: Vec<(&str, &str)> = site.guide_routes().collect();
        assert_eq!(routes, vec![("/guides/start", "guides/start")]);
        let reply = site.handle("GET", "/guides/start", None);
        assert_eq!(reply.status, 200);
        assert_eq!(body(&reply), "<main><p>Hello</p>\n</main>");
        assert_eq!(site.handle("GET", "/guides/plain", None).status, 404);
    }

    #[test]
    fn non_get_rejected() {
        let tmp = TempDir::new().unwrap();
        let site = site_with(tmp.path(), &stock_files(), SiteConfig::default());
        let reply = site.handle("POST", "/", None);
        assert_eq!(reply.status, 405);
        assert_eq!(reply.header("Allow"), Some("GET, HEAD"));
    }

    #[test]
    fn build_fails_on_bad_rewrite() {
        let config = SiteConfig {
            default_assets_dir: PathBuf::from("does-not-exist"),
            document_rewrite_url: vec!["a=b=c".into()],
            ..SiteConfig::default()
        };
        assert!(matches!(Site::build(config), Err(SiteError::Compile(_))));
    }

    #[test]
    fn percent_encoded_paths_are_decoded() {
        let tmp = TempDir::new().unwrap();
        let mut files = stock_files();
        files.push(("specs/my api.json", r#"{"a": 1}"#));
        files.push(("assets/static/dark mode.css", "body{}"));
        let site = site_with(tmp.path(), &files, SiteConfig::default());

        let reply = site.handle("GET", "/my%20api.json", None);
        assert_eq!(reply.status, 200);
        assert_eq!(body(&reply), r#"{"a": 1}"#);
        assert_eq!(site.handle("GET", "/static/dark%20mode.css", None).status, 200);
        assert_eq!(site.handle("GET", "/static/%2e%2e/x.css", None).status, 404);
        assert_eq!(site.handle("GET", "/%FF.json", None).status, 404);
    }

    #[test]
    fn validator_lists_weak_tags_and_wildcard() {
        let tmp = TempDir::new().unwrap();
        let mut files = stock_files();
        files.push(("specs/petstore.json", "{}"));
        let site = site_with(tmp.path(), &files, SiteConfig::default());
        let etag = site.specs().serve_spec("/petstore.json").unwrap().etag.clone();

        for header in [
            format!("\"other\", {etag}"),
            format!("W/{etag}"),
            "*".to_string(),
        ] {
            let reply = site.handle("GET", "/petstore.json", Some(&header));
            assert_eq!(reply.status, 304, "header {header}");
        }
        let mismatch = site.handle("GET", "/petstore.json", Some("\"other\""));
        assert_eq!(mismatch.status, 200);
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(guess_content_type("a/b.css"), "text/css; charset=utf-8");
        assert_eq!(guess_content_type("logo.svg"), "image/svg+xml");
        assert_eq!(guess_content_type("blob"), "application/octet-stream");
    }
}
