//! Compiled rule types.
//!
//! A [`Rule`] is a fixed core (`type`, `required`) plus an open bag of
//! constraint keys copied from `x-format-options`. Rules are grouped per
//! [`Location`] into [`LocationRules`], and those are keyed by route template
//! and method in the [`RuleTable`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::description::HttpMethod;

/// Category of request data validated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Location {
    #[serde(rename = "query")]
    Query,
    #[serde(rename = "header")]
    Header,
    #[serde(rename = "path")]
    Path,
    #[serde(rename = "formData")]
    FormData,
    #[serde(rename = "body")]
    Body,
}

impl Location {
    /// Order in which locations are checked for a request.
    pub const ORDER: [Location; 5] = [
        Location::Query,
        Location::Header,
        Location::Path,
        Location::FormData,
        Location::Body,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Query => "query",
            Location::Header => "header",
            Location::Path => "path",
            Location::FormData => "formData",
            Location::Body => "body",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = String;

    /// Exact, case-sensitive match on the description's `in` values.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::ORDER
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Per-field validation contract.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Rule {
    /// Rule type name; `None` means only presence is checked.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    pub required: bool,

    /// Extension constraints, copied verbatim.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl Rule {
    pub fn new(kind: Option<String>, required: bool) -> Self {
        Self {
            kind,
            required,
            options: Map::new(),
        }
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }
}

/// Field name → rule, in declaration order.
pub type FieldRules = IndexMap<String, Rule>;

/// Rules for every location of one route + method.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRules {
    pub query: FieldRules,
    pub header: FieldRules,
    pub path: FieldRules,
    pub form_data: FieldRules,
    pub body: FieldRules,
}

impl LocationRules {
    pub fn get(&self, location: Location) -> &FieldRules {
        match location {
            Location::Query => &self.query,
            Location::Header => &self.header,
            Location::Path => &self.path,
            Location::FormData => &self.form_data,
            Location::Body => &self.body,
        }
    }

    pub fn get_mut(&mut self, location: Location) -> &mut FieldRules {
        match location {
            Location::Query => &mut self.query,
            Location::Header => &mut self.header,
            Location::Path => &mut self.path,
            Location::FormData => &mut self.form_data,
            Location::Body => &mut self.body,
        }
    }

    /// True when no location carries a rule.
    pub fn is_empty(&self) -> bool {
        Location::ORDER.iter().all(|l| self.get(*l).is_empty())
    }

    /// Non-empty locations in check order.
    pub fn iter(&self) -> impl Iterator<Item = (Location, &FieldRules)> {
        Location::ORDER
            .into_iter()
            .map(move |l| (l, self.get(l)))
            .filter(|(_, rules)| !rules.is_empty())
    }

    /// Whether validating these rules needs the request body.
    pub fn needs_body(&self) -> bool {
        !self.form_data.is_empty() || !self.body.is_empty()
    }
}

/// Route template → method → rules.
///
/// A `None` entry records an operation that declares no parameters at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RuleTable {
    routes: BTreeMap<String, BTreeMap<HttpMethod, Option<LocationRules>>>,
}

impl RuleTable {
    pub fn insert(&mut self, template: impl Into<String>, method: HttpMethod, rules: Option<LocationRules>) {
        self.routes
            .entry(template.into())
            .or_default()
            .insert(method, rules);
    }

    /// Raw entry, distinguishing "not declared" from "declared without parameters".
    pub fn entry(&self, template: &str, method: HttpMethod) -> Option<&Option<LocationRules>> {
        self.routes.get(template)?.get(&method)
    }

    /// Rules to apply, or `None` when validation is skipped.
    pub fn lookup(&self, template: &str, method: HttpMethod) -> Option<&LocationRules> {
        self.entry(template, method)?
            .as_ref()
            .filter(|rules| !rules.is_empty())
    }

    /// Number of route templates with at least one operation.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Every compiled (template, method, rules) entry.
    pub fn iter(&self) -> impl Iterator<Item = (&str, HttpMethod, Option<&LocationRules>)> {
        self.routes.iter().flat_map(|(template, methods)| {
            methods
                .iter()
                .map(move |(method, rules)| (template.as_str(), *method, rules.as_ref()))
        })
    }
}
