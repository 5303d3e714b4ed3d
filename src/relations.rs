//! Relation-graph extraction from page text.
//!
//! For every page the builder records three kinds of outgoing edges, keyed by
//! normalized page name:
//!
//! - *templates*: `{{Name}}` / `{{Name|...}}` transclusions, scoped to the
//!   template namespace
//! - *inclusions*: `{{:Page}}` page inclusions plus the two pseudo-templates
//!   `{{PAGESINCATEGORY:X}}` and `{{PAGESINCAT:X}}`, which mark the page as
//!   depending on the membership of `Category:X`
//! - *references*: `[[Category:X]]` links; for redirects the redirect target
//!   is the single reference (and an inclusion, so redirect resolution rides
//!   the same closure logic as template and category membership)
//!
//! Only the newest retained revision's text is inspected. A page with no
//! outgoing edges still gets an entry in every graph, so "no edges" and
//! "page absent from the dump" stay distinguishable at lookup time.

use crate::config::{
    CATEGORY_NAMESPACE, MAGIC_PAGES_IN_CAT, MAGIC_PAGES_IN_CATEGORY, TEMPLATE_NAMESPACE,
};
use crate::models::Page;
use crate::titles;
use memchr::memmem;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

static CATEGORY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[[Cc]ategory:([^|\]]+?)(?:\|[^\]]*)?\]\]").unwrap());

static REDIRECT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)#redirect\s*:?\s*\[\[([^|\]]+?)(?:\|[^\]]*)?\]\]").unwrap());

// Matches the name of a template call up to its first `|` or closing braces.
// `{{:Page}}` inclusions and `{{#if:...}}` parser functions are excluded by
// the first character class and handled separately.
static TEMPLATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}|#:\s][^{}|]*?)\s*(?:\||\}\})").unwrap());

static PAGE_INCLUSION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*:\s*([^{}|]+?)\s*(?:\||\}\})").unwrap());

/// A directed graph of normalized page names. Cycles are expected (category
/// A may transclude B which transcludes A); nothing here assumes acyclicity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationGraph {
    edges: FxHashMap<String, FxHashSet<String>>,
}

impl RelationGraph {
    /// Ensures `name` has an entry, creating an empty edge set if absent.
    pub fn touch(&mut self, name: &str) {
        if !self.edges.contains_key(name) {
            self.edges.insert(name.to_string(), FxHashSet::default());
        }
    }

    pub fn add_edge(&mut self, from: &str, to: String) {
        self.edges.entry(from.to_string()).or_default().insert(to);
    }

    /// Outgoing edges of `name`. `None` means the page never appeared in the
    /// dump; callers treat that as "unknown page, no edges", not an error.
    pub fn neighbours(&self, name: &str) -> Option<&FxHashSet<String>> {
        self.edges.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(FxHashSet::len).sum()
    }

    /// Folds the reversed edges of this graph into `index`.
    pub fn reverse_into(&self, index: &mut FxHashMap<String, FxHashSet<String>>) {
        for (from, tos) in &self.edges {
            for to in tos {
                index.entry(to.clone()).or_default().insert(from.clone());
            }
        }
    }
}

/// The three relation graphs of one dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationTrees {
    pub templates: RelationGraph,
    pub includes: RelationGraph,
    pub references: RelationGraph,
}

/// Accumulates relation edges over a single pass of the page stream. The
/// graphs are owned by the builder and handed out by [`finish`]; there is no
/// shared state to reset between runs.
///
/// [`finish`]: RelationGraphBuilder::finish
#[derive(Debug, Default)]
pub struct RelationGraphBuilder {
    trees: RelationTrees,
}

impl RelationGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outgoing edges of one page, given its newest revision's
    /// text. Pages whose revisions were all dropped by the window pass `""`.
    pub fn observe(&mut self, page: &Page, text: &str) {
        let name = page.title.as_str();
        self.trees.templates.touch(name);
        self.trees.includes.touch(name);
        self.trees.references.touch(name);

        if page.redirect {
            if let Some(target) = redirect_target(page, text) {
                self.trees.references.add_edge(name, target.clone());
                self.trees.includes.add_edge(name, target);
            }
            return;
        }

        if memmem::find(text.as_bytes(), b"[[").is_some() {
            for caps in CATEGORY_REGEX.captures_iter(text) {
                let target = titles::with_namespace(CATEGORY_NAMESPACE, caps[1].trim());
                self.trees.references.add_edge(name, target);
            }
        }

        if memmem::find(text.as_bytes(), b"{{").is_none() {
            return;
        }

        for caps in TEMPLATE_REGEX.captures_iter(text) {
            let raw = caps[1].trim();
            // Template parameters ({{{1}}}) are not template calls.
            if raw.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            match raw.split_once(':') {
                Some((word, parameter)) => {
                    let word = word.trim();
                    if word == MAGIC_PAGES_IN_CATEGORY || word == MAGIC_PAGES_IN_CAT {
                        let target = titles::with_namespace(CATEGORY_NAMESPACE, parameter.trim());
                        self.trees.includes.add_edge(name, target);
                    } else if word == TEMPLATE_NAMESPACE {
                        let target = titles::with_namespace(TEMPLATE_NAMESPACE, parameter.trim());
                        self.trees.templates.add_edge(name, target);
                    }
                    // anything else with a colon is a parser function, magic
                    // word or interwiki call and carries no page edge
                }
                None => {
                    let target = titles::with_namespace(TEMPLATE_NAMESPACE, raw);
                    self.trees.templates.add_edge(name, target);
                }
            }
        }

        for caps in PAGE_INCLUSION_REGEX.captures_iter(text) {
            let target = titles::normalize(caps[1].trim());
            if !target.is_empty() {
                self.trees.includes.add_edge(name, target);
            }
        }
    }

    pub fn finish(self) -> RelationTrees {
        self.trees
    }
}

/// The `<redirect title="..."/>` attribute wins; older dumps only carry the
/// `#REDIRECT [[...]]` directive in the text.
fn redirect_target(page: &Page, text: &str) -> Option<String> {
    if let Some(target) = &page.redirect_target {
        return Some(target.clone());
    }
    REDIRECT_REGEX
        .captures(text)
        .map(|caps| titles::normalize(caps[1].trim()))
}
