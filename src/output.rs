//! CLI output formatting for the `check` command.
//!
//! # Information-First Display
//!
//! Every section leads with what the server will actually publish (logical
//! paths, routes, template names) and shows the source on disk as secondary
//! context. The output reads as an inventory of the running site.
//!
//! # Output Format
//!
//! ```text
//! Layers
//! 001 assets ← custom/themes/default (missing)
//! 002 assets/templates ← custom/templates
//!     2 inserted, 0 shadowed
//! 003 assets/templates ← assets/templates
//!     4 inserted, 2 shadowed
//!
//! Assets (6)
//!     assets/static/style.css
//!     assets/templates/guides/intro.tmpl
//!         title: Introduction
//!
//! Specifications
//! 001 petstore
//!     Route: /petstore/swagger.json
//!
//! Templates
//!     error, guides/intro, index, layout, specindex
//!
//! Guides
//!     /guides/intro → guides/intro
//! ```
//!
//! # Architecture
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability; [`print_check_output`] writes the assembled lines to stdout.
//! Format functions are pure: no I/O, no side effects.

use crate::asset::AssetStore;
use crate::compile::LayerReport;
use crate::site::Site;
use crate::specs::{SpecRouteMap, api_id};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Layers
// ============================================================================

/// One entry per layer in precedence order. Missing trees get no counts.
pub fn format_layer_output(reports: &[LayerReport]) -> Vec<String> {
    let mut lines = vec!["Layers".to_string()];
    for (i, layer) in reports.iter().enumerate() {
        let header = format!(
            "{} {} ← {}",
            format_index(i + 1),
            layer.layer.prefix,
            layer.layer.source.display()
        );
        if layer.report.missing {
            lines.push(format!("{header} (missing)"));
            continue;
        }
        lines.push(header);
        lines.push(format!(
            "{}{} inserted, {} shadowed",
            indent(1),
            layer.report.inserted,
            layer.report.shadowed
        ));
    }
    lines
}

// ============================================================================
// Assets
// ============================================================================

/// Every logical path, with metadata keys of converted documents beneath.
pub fn format_asset_output(store: &AssetStore) -> Vec<String> {
    let mut lines = vec![format!("Assets ({})", store.len())];
    for name in store.names() {
        lines.push(format!("{}{}", indent(1), name));
        if let Some(metadata) = store.asset(name).and_then(|a| a.metadata.as_ref()) {
            for (key, value) in metadata {
                lines.push(format!("{}{}: {}", indent(2), key, value));
            }
        }
    }
    lines
}

// ============================================================================
// Specifications
// ============================================================================

/// Routes grouped under their API identifier.
pub fn format_spec_output(specs: &SpecRouteMap) -> Vec<String> {
    let mut lines = vec!["Specifications".to_string()];
    if specs.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
        return lines;
    }
    let mut current: Option<&str> = None;
    let mut position = 0;
    for route in specs.routes() {
        let id = api_id(route);
        if current != Some(id) {
            position += 1;
            current = Some(id);
            lines.push(format!("{} {}", format_index(position), id));
        }
        lines.push(format!("{}Route: {}", indent(1), route));
    }
    lines
}

// ============================================================================
// Templates and guides
// ============================================================================

pub fn format_template_output(names: &[&str]) -> Vec<String> {
    let mut lines = vec!["Templates".to_string()];
    if names.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    } else {
        lines.push(format!("{}{}", indent(1), names.join(", ")));
    }
    lines
}

pub fn format_guide_output<'a>(guides: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<String> {
    let mut lines = vec!["Guides".to_string()];
    let before = lines.len();
    for (route, template) in guides {
        lines.push(format!("{}{} → {}", indent(1), route, template));
    }
    if lines.len() == before {
        lines.push(format!("{}(none)", indent(1)));
    }
    lines
}

// ============================================================================
// Check
// ============================================================================

/// All sections, separated by blank lines.
pub fn format_check_output(site: &Site) -> Vec<String> {
    let sections = [
        format_layer_output(site.layers()),
        format_asset_output(site.store()),
        format_spec_output(site.specs()),
        format_template_output(&site.renderer().template_names()),
        format_guide_output(site.guide_routes()),
    ];
    let mut lines = Vec::new();
    for section in sections {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.extend(section);
    }
    lines
}

pub fn print_check_output(site: &Site) {
    for line in format_check_output(site) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::VirtualAsset;
    use crate::compile::{CompileReport, Layer};
    use crate::config::SiteConfig;
    use crate::rewrite::RewriteTable;
    use crate::test_helpers::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn layer(source: &str, prefix: &'static str, report: CompileReport) -> LayerReport {
        LayerReport {
            layer: Layer {
                source: PathBuf::from(source),
                prefix,
            },
            report,
        }
    }

    #[test]
    fn layers_show_counts_or_missing() {
        let reports = vec![
            layer(
                "custom/templates",
                "assets/templates",
                CompileReport {
                    inserted: 2,
                    shadowed: 0,
                    missing: false,
                },
            ),
            layer(
                "custom/static",
                "assets/static",
                CompileReport {
                    missing: true,
                    ..CompileReport::default()
                },
            ),
        ];
        assert_eq!(
            format_layer_output(&reports),
            vec![
                "Layers",
                "001 assets/templates ← custom/templates",
                "    2 inserted, 0 shadowed",
                "002 assets/static ← custom/static (missing)",
            ]
        );
    }

    #[test]
    fn assets_list_metadata_under_path() {
        let mut store = store_from(&[("assets/static/site.css", "body {}")]);
        store.insert(VirtualAsset {
            logical_path: "assets/templates/guide.tmpl".into(),
            content: b"<p>x</p>".to_vec(),
            metadata: Some(BTreeMap::from([("title".into(), "Guide".into())])),
        });
        assert_eq!(
            format_asset_output(&store),
            vec![
                "Assets (2)",
                "    assets/static/site.css",
                "    assets/templates/guide.tmpl",
                "        title: Guide",
            ]
        );
    }

    #[test]
    fn specs_grouped_by_api() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[
                ("petstore/swagger.json", "{}"),
                ("petstore/v2.json", "{}"),
                ("billing.json", "{}"),
            ],
        );
        let specs = SpecRouteMap::build(tmp.path(), &RewriteTable::default()).unwrap();
        assert_eq!(
            format_spec_output(&specs),
            vec![
                "Specifications",
                "001 billing",
                "    Route: /billing.json",
                "002 petstore",
                "    Route: /petstore/swagger.json",
                "    Route: /petstore/v2.json",
            ]
        );
    }

    #[test]
    fn empty_sections_say_none() {
        assert_eq!(
            format_spec_output(&SpecRouteMap::default()),
            vec!["Specifications", "    (none)"]
        );
        assert_eq!(format_template_output(&[]), vec!["Templates", "    (none)"]);
        assert_eq!(
            format_guide_output(std::iter::empty()),
            vec!["Guides", "    (none)"]
        );
    }

    #[test]
    fn check_output_has_every_section() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[
                ("assets/templates/layout.tmpl", "[: content :]"),
                ("assets/templates/intro.md", "Title: Intro\n\n# Hi\n"),
                ("specs/petstore.json", "{}"),
            ],
        );
        let site = Site::build(SiteConfig {
            default_assets_dir: tmp.path().join("assets"),
            spec_dir: tmp.path().join("specs"),
            ..SiteConfig::default()
        })
        .unwrap();

        let lines = format_check_output(&site);
        for header in ["Layers", "Specifications", "Templates", "Guides"] {
            assert!(lines.iter().any(|l| l == header), "missing {header}");
        }
        assert!(lines.contains(&"    intro, layout".to_string()));
        assert!(lines.contains(&"    /intro → intro".to_string()));
        assert!(lines.contains(&"        title: Intro".to_string()));
        assert_eq!(lines.iter().filter(|l| l.is_empty()).count(), 4);
    }
}
