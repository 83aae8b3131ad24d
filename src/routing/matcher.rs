//! Route template matching logic.
//!
//! # Responsibilities
//! - Parse token-form templates (`/users/:id`) into segments
//! - Match one template against one concrete path
//! - Capture parameter values from the matched path
//!
//! # Design Decisions
//! - Literal segments compare byte-for-byte (callers lowercase the path)
//! - A parameter token matches exactly one non-empty segment
//! - A single trailing slash on the path is ignored
//! - No regex to guarantee O(n) matching

use std::fmt;

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use serde::{Serialize, Serializer};

/// Captured parameter name → percent-decoded value.
pub type PathParams = IndexMap<String, String>;

/// One segment of a route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// A route template in parameter-token syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    text: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    /// Parse a token-form template such as `/users/:id/posts`.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let segments = split_path(&text)
            .into_iter()
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(segment.to_string()),
            })
            .collect();

        Self { text, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Literal segments containing uppercase characters never match a lowercased path.
    pub fn has_uppercase_literal(&self) -> bool {
        self.segments.iter().any(|segment| match segment {
            Segment::Literal(text) => text.chars().any(char::is_uppercase),
            Segment::Param(_) => false,
        })
    }

    /// Returns true if `path` has this template's segment structure.
    pub fn matches(&self, path: &str) -> bool {
        let segments = split_path(path);
        self.structure_matches(&segments)
    }

    /// Match pre-split path segments and capture parameters.
    ///
    /// `lowered` is compared against the template; values are captured from
    /// `original`, which must be the same path before lowercasing.
    pub fn capture(&self, lowered: &[&str], original: &[&str]) -> Option<PathParams> {
        if !self.structure_matches(lowered) || lowered.len() != original.len() {
            return None;
        }

        let params = self
            .segments
            .iter()
            .zip(original)
            .filter_map(|(segment, value)| match segment {
                Segment::Param(name) => Some((
                    name.clone(),
                    percent_decode_str(value).decode_utf8_lossy().into_owned(),
                )),
                Segment::Literal(_) => None,
            })
            .collect();

        Some(params)
    }

    fn structure_matches(&self, path: &[&str]) -> bool {
        self.segments.len() == path.len()
            && self
                .segments
                .iter()
                .zip(path)
                .all(|(segment, value)| match segment {
                    Segment::Literal(text) => text == value,
                    Segment::Param(_) => !value.is_empty(),
                })
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for RouteTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// Split a path into segments, dropping the leading slash and one trailing slash.
///
/// The root path yields a single empty segment.
pub fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.split('/').collect()
}
