//! Ordered route template index.
//!
//! # Responsibilities
//! - Convert description templates (`{id}`) to token form (`:id`)
//! - Keep templates in descending lexicographic order of their text
//! - Resolve a runtime path to the first structurally matching template
//!
//! # Design Decisions
//! - Sorted once at construction, immutable afterwards
//! - `:` sorts above digits and below letters: a literal segment starting
//!   with a letter is tried before a parameter token at the same position,
//!   one starting with a digit after it
//! - The request path is lowercased; templates are taken as written

use serde::Serialize;

use crate::routing::matcher::{split_path, PathParams, RouteTemplate};

/// Rewrite brace placeholders into parameter tokens: `/user/{id}` → `/user/:id`.
pub fn to_route_template(template: &str) -> String {
    template.replace('{', ":").replace('}', "")
}

/// A resolved route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    /// Token-form template that won.
    pub template: &'a str,
    pub params: PathParams,
}

/// Route templates in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PathIndex {
    templates: Vec<RouteTemplate>,
}

impl PathIndex {
    /// Build from token-form templates; duplicates are dropped.
    pub fn new<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut texts: Vec<String> = templates.into_iter().map(Into::into).collect();
        texts.sort_unstable_by(|a, b| b.cmp(a));
        texts.dedup();

        Self {
            templates: texts.into_iter().map(RouteTemplate::new).collect(),
        }
    }

    /// First template, in index order, matching `path`.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_>> {
        let lowered = path.to_lowercase();
        let lowered_segments = split_path(&lowered);
        let original_segments = split_path(path);

        self.templates.iter().find_map(|template| {
            template
                .capture(&lowered_segments, &original_segments)
                .map(|params| RouteMatch {
                    template: template.as_str(),
                    params,
                })
        })
    }

    pub fn templates(&self) -> impl Iterator<Item = &RouteTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
