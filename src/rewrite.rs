//! URL rewrite tables.
//!
//! Specification documents and guides hard-code the URL of the site they were
//! written for. A [`RewriteTable`] retargets those URLs to the deployment's
//! own address with a single pass of literal substitutions.
//!
//! ## Directives
//!
//! Each configured directive is one of:
//!
//! ```text
//! http://api.example.com=https://docs.internal   # literal from=to
//! http://api.example.com                         # bare: maps to site_url
//! ```
//!
//! A directive with more than one `=` is a configuration error.
//!
//! ## Matching
//!
//! The input is scanned left to right once. At each position the pattern
//! declared first wins among those that match there, and replaced text is
//! never rescanned. Patterns are compiled into one alternation so overlapping
//! patterns resolve by declaration order.

use crate::config::ConfigError;
use regex::bytes::{Captures, Regex};
use std::borrow::Cow;

/// An immutable, ordered set of literal `from → to` substitutions.
#[derive(Debug, Clone, Default)]
pub struct RewriteTable {
    pairs: Vec<(String, String)>,
    matcher: Option<Regex>,
}

impl RewriteTable {
    /// Build a table from configured directives.
    ///
    /// Bare directives map to `site_url`.
    pub fn from_directives<S: AsRef<str>>(
        directives: &[S],
        site_url: &str,
    ) -> Result<Self, ConfigError> {
        let mut pairs = Vec::with_capacity(directives.len());
        for directive in directives {
            let directive = directive.as_ref();
            let parts: Vec<&str> = directive.split('=').collect();
            let (from, to) = match parts.as_slice() {
                [from] => (*from, site_url),
                [from, to] => (*from, *to),
                _ => return Err(ConfigError::Rewrite(directive.to_string())),
            };
            if from.is_empty() {
                return Err(ConfigError::Rewrite(directive.to_string()));
            }
            pairs.push((from.to_string(), to.to_string()));
        }
        Self::from_pairs(pairs)
    }

    /// Build a table from explicit pairs, in precedence order.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ConfigError> {
        if pairs.is_empty() {
            return Ok(Self::default());
        }
        let pattern = pairs
            .iter()
            .map(|(from, _)| format!("({})", regex::escape(from)))
            .collect::<Vec<_>>()
            .join("|");
        let matcher = Regex::new(&pattern)
            .map_err(|e| ConfigError::Validation(format!("rewrite table: {e}")))?;
        Ok(Self {
            pairs,
            matcher: Some(matcher),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Apply every substitution in one pass.
    ///
    /// Input without any matching pattern comes back byte-identical.
    pub fn apply<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
        let Some(matcher) = &self.matcher else {
            return Cow::Borrowed(input);
        };
        matcher.replace_all(input, |caps: &Captures<'_>| {
            // Group i+1 belongs to pair i; exactly one group takes part.
            let index = (1..caps.len())
                .find(|&group| caps.get(group).is_some())
                .map(|group| group - 1)
                .unwrap_or_default();
            self.pairs[index].1.as_bytes().to_vec()
        })
    }

    /// Convenience wrapper over [`apply`](Self::apply) returning owned bytes.
    pub fn apply_owned(&self, input: Vec<u8>) -> Vec<u8> {
        match self.apply(&input) {
            Cow::Borrowed(_) => input,
            Cow::Owned(rewritten) => rewritten,
        }
    }
}
