//! Category closure over the relation graphs.
//!
//! Membership is recorded in the dump as "page P references category C", so
//! discovering the members of C means walking the reference and inclusion
//! graphs backwards. Only stepping from one category into a subcategory
//! consumes recursion depth; ordinary member pages are collected for free.
//! A visited set makes the walk safe on cyclic graphs: first discovery wins,
//! and BFS order makes first discovery the shortest path.
//!
//! After membership discovery the engine pulls in rendering dependencies:
//! the templates a selected page transcludes and the pages it includes
//! (redirect targets ride the inclusion graph), followed transitively with
//! no depth bound.

use crate::relations::RelationTrees;
use crate::titles;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// One closure computation: roots, allow-list, depth limit and the
/// root-inclusion policy. Produced by the caller, consumed once.
#[derive(Debug, Clone, Default)]
pub struct ClosureRequest {
    /// Normalized root category names (`Category:...`).
    pub root_categories: Vec<String>,
    /// Normalized page names unioned into the result unconditionally.
    pub allowed_pages: FxHashSet<String>,
    /// How many category-to-subcategory steps the walk may take; `0` means
    /// just the roots' direct members.
    pub recursion_depth: u32,
    /// Whether the root categories themselves appear in the output.
    pub include_roots: bool,
}

pub struct ClosureEngine<'a> {
    trees: &'a RelationTrees,
}

impl<'a> ClosureEngine<'a> {
    pub fn new(trees: &'a RelationTrees) -> Self {
        Self { trees }
    }

    /// Computes the page-name set for `request`. The result is an unordered,
    /// deduplicated set; callers wanting deterministic output sort it.
    pub fn run(&self, request: &ClosureRequest) -> FxHashSet<String> {
        let mut members: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
        self.trees.references.reverse_into(&mut members);
        self.trees.includes.reverse_into(&mut members);

        let mut result = FxHashSet::default();
        let mut visited: FxHashSet<String> =
            request.root_categories.iter().cloned().collect();
        if request.include_roots {
            result.extend(request.root_categories.iter().cloned());
        }

        let mut frontier: Vec<String> = request.root_categories.clone();
        let mut remaining = request.recursion_depth;
        loop {
            let mut subcategories = Vec::new();
            for category in frontier.drain(..) {
                let Some(pages) = members.get(&category) else {
                    continue;
                };
                for page in pages {
                    if visited.insert(page.clone()) {
                        result.insert(page.clone());
                        if titles::is_category(page) {
                            subcategories.push(page.clone());
                        }
                    }
                }
            }
            if subcategories.is_empty() || remaining == 0 {
                break;
            }
            remaining -= 1;
            frontier = subcategories;
        }
        debug!(members = result.len(), "category membership discovered");

        result.extend(request.allowed_pages.iter().cloned());
        self.pull_dependencies(&mut result);
        result
    }

    /// Adds the transitive template/inclusion dependencies of every page in
    /// `result`. Cycle-safe: a page already present is never re-expanded.
    fn pull_dependencies(&self, result: &mut FxHashSet<String>) {
        let mut queue: Vec<String> = result.iter().cloned().collect();
        while let Some(page) = queue.pop() {
            for graph in [&self.trees.templates, &self.trees.includes] {
                let Some(dependencies) = graph.neighbours(&page) else {
                    continue;
                };
                for dependency in dependencies {
                    if result.insert(dependency.clone()) {
                        queue.push(dependency.clone());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Page;
    use crate::relations::RelationGraphBuilder;
    use std::collections::BTreeMap;

    fn page(title: &str) -> Page {
        Page {
            title: title.to_string(),
            id: 1,
            redirect: false,
            redirect_target: None,
            restrictions: BTreeMap::new(),
        }
    }

    fn redirect(title: &str, target: &str) -> Page {
        Page {
            title: title.to_string(),
            id: 1,
            redirect: true,
            redirect_target: Some(target.to_string()),
            restrictions: BTreeMap::new(),
        }
    }

    fn trees(pages: &[(&str, &str)]) -> RelationTrees {
        let mut builder = RelationGraphBuilder::new();
        for (title, text) in pages {
            builder.observe(&page(title), text);
        }
        builder.finish()
    }

    fn request(roots: &[&str], depth: u32) -> ClosureRequest {
        ClosureRequest {
            root_categories: roots.iter().map(|r| r.to_string()).collect(),
            allowed_pages: FxHashSet::default(),
            recursion_depth: depth,
            include_roots: false,
        }
    }

    fn sorted(result: FxHashSet<String>) -> Vec<String> {
        let mut names: Vec<String> = result.into_iter().collect();
        names.sort();
        names
    }

    #[test]
    fn direct_members_at_depth_zero() {
        let trees = trees(&[
            ("A", "[[Category:Root]]"),
            ("B", "[[Category:Root]]"),
            ("C", "[[Category:Other]]"),
        ]);
        let engine = ClosureEngine::new(&trees);
        let result = engine.run(&request(&["Category:Root"], 0));
        assert_eq!(sorted(result), vec!["A", "B"]);
    }

    #[test]
    fn depth_boundary_excludes_then_includes_subcategory_members() {
        // Root contains Category:Sub (depth 1); Sub contains P.
        let pages = [
            ("Category:Sub", "[[Category:Root]]"),
            ("P", "[[Category:Sub]]"),
        ];
        let trees = trees(&pages);
        let engine = ClosureEngine::new(&trees);

        let at_zero = engine.run(&request(&["Category:Root"], 0));
        assert!(at_zero.contains("Category:Sub"));
        assert!(!at_zero.contains("P"));

        let at_one = engine.run(&request(&["Category:Root"], 1));
        assert!(at_one.contains("Category:Sub"));
        assert!(at_one.contains("P"));
    }

    #[test]
    fn terminates_on_category_cycles() {
        // A and B are categories, each a member of the other.
        let pages = [
            ("Category:A", "[[Category:B]]"),
            ("Category:B", "[[Category:A]]"),
            ("Member of A", "[[Category:A]]"),
            ("Member of B", "[[Category:B]]"),
        ];
        let trees = trees(&pages);
        let engine = ClosureEngine::new(&trees);
        let result = engine.run(&request(&["Category:A"], 5));
        assert_eq!(
            sorted(result),
            vec!["Category:B", "Member of A", "Member of B"]
        );
    }

    #[test]
    fn allow_list_is_unioned_regardless_of_reachability() {
        let trees = trees(&[("A", "[[Category:Root]]"), ("B", "unrelated")]);
        let engine = ClosureEngine::new(&trees);
        let mut req = request(&["Category:Root"], 0);
        req.allowed_pages.insert("B".to_string());
        let result = engine.run(&req);
        assert_eq!(sorted(result), vec!["A", "B"]);
    }

    #[test]
    fn include_roots_policy() {
        let trees = trees(&[("A", "[[Category:Root]]")]);
        let engine = ClosureEngine::new(&trees);

        let without = engine.run(&request(&["Category:Root"], 1));
        assert_eq!(sorted(without), vec!["A"]);

        let mut req = request(&["Category:Root"], 1);
        req.include_roots = true;
        let with = engine.run(&req);
        assert_eq!(sorted(with), vec!["A", "Category:Root"]);
    }

    #[test]
    fn templates_of_selected_pages_are_pulled_in() {
        let trees = trees(&[
            ("A", "[[Category:Root]] {{Infobox thing}}"),
            ("Template:Infobox thing", "{{Infobox base}}"),
        ]);
        let engine = ClosureEngine::new(&trees);
        let result = engine.run(&request(&["Category:Root"], 0));
        assert_eq!(
            sorted(result),
            vec!["A", "Template:Infobox base", "Template:Infobox thing"]
        );
    }

    #[test]
    fn redirect_targets_of_selected_pages_are_pulled_in() {
        let mut builder = RelationGraphBuilder::new();
        builder.observe(&page("Target"), "plain");
        builder.observe(&redirect("R", "Target"), "#REDIRECT [[Target]]");
        let trees = builder.finish();
        let engine = ClosureEngine::new(&trees);

        let mut req = request(&[], 0);
        req.allowed_pages.insert("R".to_string());
        let result = engine.run(&req);
        assert_eq!(sorted(result), vec!["R", "Target"]);
    }

    #[test]
    fn pages_in_category_dependents_are_members() {
        // A page embedding {{PAGESINCAT:Root}} depends on the membership of
        // Category:Root and is discovered alongside ordinary members.
        let trees = trees(&[
            ("A", "[[Category:Root]]"),
            ("Counter", "{{PAGESINCAT:Root}}"),
        ]);
        let engine = ClosureEngine::new(&trees);
        let result = engine.run(&request(&["Category:Root"], 0));
        assert_eq!(sorted(result), vec!["A", "Counter"]);
    }

    #[test]
    fn dependency_cycles_terminate() {
        let trees = trees(&[
            ("A", "[[Category:Root]] {{:B}}"),
            ("B", "{{:A}}"),
        ]);
        let engine = ClosureEngine::new(&trees);
        let result = engine.run(&request(&["Category:Root"], 0));
        assert_eq!(sorted(result), vec!["A", "B"]);
    }

    #[test]
    fn empty_roots_and_allow_list_yield_empty_set() {
        let trees = trees(&[("A", "[[Category:Root]]")]);
        let engine = ClosureEngine::new(&trees);
        let result = engine.run(&request(&[], 3));
        assert!(result.is_empty());
    }

    #[test]
    fn unknown_root_category_is_not_an_error() {
        let trees = trees(&[("A", "[[Category:Root]]")]);
        let engine = ClosureEngine::new(&trees);
        let result = engine.run(&request(&["Category:Nonexistent"], 3));
        assert!(result.is_empty());
    }
}
