//! Template resolution and rendering.
//!
//! The [`Renderer`] wraps a minijinja environment whose templates come from
//! the compiled asset store: every `assets/templates/**/*.tmpl` asset becomes
//! a template named by its path below `assets/templates`, minus the
//! extension (`petstore/index.tmpl` → `petstore/index`).
//!
//! ## Syntax
//!
//! Templates use bracket delimiters so they never collide with `{{ }}` in
//! embedded HTML or converted markdown:
//!
//! ```text
//! [: Title :]                        variable
//! [% for id in APIs %]...[% endfor %] block
//! [# note #]                         comment
//! ```
//!
//! ## Layout
//!
//! Pages are rendered first, then wrapped by the `layout` template, which
//! sees the same data plus `content` (the page HTML, already safe).
//!
//! ## Helpers
//!
//! | Function | Effect |
//! |----------|--------|
//! | `lc(s)` / `uc(s)` | lower / upper case |
//! | `join(list, sep)` | join strings |
//! | `fnn(a, b, ...)` | first argument that is not none/undefined |
//! | `safehtml(s)` | mark a string as HTML, bypassing escaping |
//! | `map(k, v, ...)` | build a map from key/value pairs |
//! | `ext(m, k, v, ...)` | copy of `m` with extra key/value pairs |
//! | `arr(a, b, ...)` | build a list |

use crate::asset::AssetStore;
use crate::compile::{TEMPLATE_EXTENSION, TEMPLATES_PREFIX};
use crate::config::SiteConfig;
use minijinja::syntax::SyntaxConfig;
use minijinja::value::Rest;
use minijinja::{AutoEscape, Environment, ErrorKind, Template, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),
    #[error("Template {name} failed to compile: {source}")]
    Compile {
        name: String,
        source: minijinja::Error,
    },
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error("Failed to write response: {0}")]
    Sink(#[from] std::io::Error),
}

/// Data handed to a template.
pub type Vars = BTreeMap<String, Value>;

/// Name of the template that wraps every page.
pub const LAYOUT_TEMPLATE: &str = "layout";
/// Fallback home page for a specification without its own `<id>/index`.
pub const GENERIC_SPEC_INDEX: &str = "specindex";
/// Variable holding the rendered page inside the layout.
pub const CONTENT_VAR: &str = "content";
/// Injected by [`Renderer::default_vars`].
pub const CONFIG_VAR: &str = "Config";
pub const APIS_VAR: &str = "APIs";

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Source of the currently loaded API models, keyed by identifier.
pub trait ApiModels: Send + Sync {
    fn models(&self) -> Value;
}

/// Where a rendered page goes. Implemented by the HTTP layer.
pub trait ResponseSink {
    fn send(&mut self, status: u16, content_type: &str, body: Vec<u8>) -> std::io::Result<()>;
}

/// Which home page template a specification uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTemplate {
    /// The specification ships its own `<id>/index`.
    Specific(String),
    /// Shared [`GENERIC_SPEC_INDEX`].
    Generic,
}

impl IndexTemplate {
    pub fn name(&self) -> &str {
        match self {
            IndexTemplate::Specific(name) => name,
            IndexTemplate::Generic => GENERIC_SPEC_INDEX,
        }
    }
}

/// Pick `<spec_id>/index` if it exists, else the generic index.
pub fn resolve_index(spec_id: &str, exists: impl Fn(&str) -> bool) -> IndexTemplate {
    let specific = format!("{spec_id}/index");
    if exists(&specific) {
        IndexTemplate::Specific(specific)
    } else {
        IndexTemplate::Generic
    }
}

pub struct Renderer {
    env: Environment<'static>,
    config: Value,
    apis: Arc<dyn ApiModels>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("templates", &self.template_names())
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Compile every template in the store. Syntax errors fail here, not
    /// on first request.
    pub fn new(
        store: &AssetStore,
        config: &SiteConfig,
        apis: Arc<dyn ApiModels>,
    ) -> Result<Self, RenderError> {
        let mut env = Environment::new();
        env.set_syntax(syntax()?);
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_keep_trailing_newline(true);
        register_helpers(&mut env);

        let suffix = format!(".{TEMPLATE_EXTENSION}");
        for (rel, asset) in store.under(TEMPLATES_PREFIX) {
            let Some(name) = rel.strip_suffix(&suffix) else {
                continue;
            };
            let source = String::from_utf8_lossy(&asset.content).into_owned();
            trace!(template = name, "register template");
            env.add_template_owned(name.to_string(), source)
                .map_err(|source| RenderError::Compile {
                    name: name.to_string(),
                    source,
                })?;
        }

        Ok(Self {
            env,
            config: Value::from_serialize(config),
            apis,
        })
    }

    /// A template by name, if one was compiled.
    pub fn lookup(&self, name: &str) -> Option<Template<'_, '_>> {
        self.env.get_template(name).ok()
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.env.templates().map(|(name, _)| name).collect();
        names.sort_unstable();
        names
    }

    /// Choose the home page template for a specification.
    pub fn resolve_spec_index(&self, spec_id: &str) -> IndexTemplate {
        trace!(spec_id, "test for specification index template");
        resolve_index(spec_id, |name| self.has_template(name))
    }

    /// Caller data plus the `Config` and `APIs` bindings.
    ///
    /// The injected keys replace any caller value of the same name.
    pub fn default_vars(&self, mut data: Vars) -> Vars {
        data.insert(CONFIG_VAR.to_string(), self.config.clone());
        data.insert(APIS_VAR.to_string(), self.apis.models());
        data
    }

    /// Render `name` inside the layout.
    pub fn render_to_string(&self, name: &str, data: &Vars) -> Result<String, RenderError> {
        let page = self.template(name)?.render(data)?;
        let layout = self.template(LAYOUT_TEMPLATE)?;
        let mut wrapped = data.clone();
        wrapped.insert(CONTENT_VAR.to_string(), Value::from_safe_string(page));
        Ok(layout.render(&wrapped)?)
    }

    /// Render a page and send it with `status`.
    ///
    /// Nothing reaches the sink unless rendering succeeds.
    pub fn render(
        &self,
        sink: &mut dyn ResponseSink,
        status: u16,
        name: &str,
        data: &Vars,
    ) -> Result<(), RenderError> {
        let html = self.render_to_string(name, data)?;
        sink.send(status, HTML_CONTENT_TYPE, html.into_bytes())?;
        Ok(())
    }

    fn template(&self, name: &str) -> Result<Template<'_, '_>, RenderError> {
        self.env.get_template(name).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => RenderError::TemplateNotFound(name.to_string()),
            _ => RenderError::Template(e),
        })
    }
}

fn syntax() -> Result<SyntaxConfig, RenderError> {
    Ok(SyntaxConfig::builder()
        .block_delimiters("[%", "%]")
        .variable_delimiters("[:", ":]")
        .comment_delimiters("[#", "#]")
        .build()?)
}

fn register_helpers(env: &mut Environment<'static>) {
    env.add_function("lc", |s: String| s.to_lowercase());
    env.add_function("uc", |s: String| s.to_uppercase());
    env.add_function("join", |items: Vec<String>, sep: String| items.join(&sep));
    env.add_function("fnn", first_not_none);
    env.add_function("safehtml", |s: String| Value::from_safe_string(s));
    env.add_function("map", |pairs: Rest<Value>| build_map(Vars::new(), &pairs));
    env.add_function("ext", extend_map);
    env.add_function("arr", |items: Rest<Value>| Value::from(items.0));
}

fn first_not_none(args: Rest<Value>) -> Value {
    args.iter()
        .find(|v| !v.is_none() && !v.is_undefined())
        .cloned()
        .unwrap_or(Value::UNDEFINED)
}

fn build_map(mut map: Vars, pairs: &[Value]) -> Result<Value, minijinja::Error> {
    if pairs.len() % 2 != 0 {
        return Err(minijinja::Error::new(
            ErrorKind::InvalidOperation,
            "expected an even number of key/value arguments",
        ));
    }
    for pair in pairs.chunks(2) {
        map.insert(pair[0].to_string(), pair[1].clone());
    }
    Ok(Value::from_serialize(&map))
}

fn extend_map(base: Value, pairs: Rest<Value>) -> Result<Value, minijinja::Error> {
    let mut map = Vars::new();
    if !base.is_none() && !base.is_undefined() {
        for key in base.try_iter()? {
            let value = base.get_item(&key)?;
            map.insert(key.to_string(), value);
        }
    }
    build_map(map, &pairs)
}
