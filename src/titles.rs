//! MediaWiki title normalization.
//!
//! Graph keys, root categories, allow-list entries and parsed page titles all
//! go through [`normalize`] so that `rust_(language)`, `Rust (language)` and
//! ` rust (language) ` compare equal the way the wiki itself treats them.

/// Normalizes a page title: underscores become spaces, whitespace is
/// collapsed, a single leading `:` (main-namespace escape) is stripped, and
/// the first letter of both the namespace and the page name is upper-cased.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix(':').unwrap_or(trimmed);
    let collapsed = collapse(trimmed);

    match collapsed.split_once(':') {
        Some((ns, rest)) if !ns.is_empty() && !rest.is_empty() => {
            format!("{}:{}", capitalize(ns.trim_end()), capitalize(rest.trim_start()))
        }
        _ => capitalize(&collapsed),
    }
}

/// Normalizes `name` under the given namespace, e.g. `("Category", "physics")`
/// becomes `Category:Physics`. A name already carrying the namespace prefix is
/// not double-prefixed.
pub fn with_namespace(namespace: &str, name: &str) -> String {
    let normalized = normalize(name);
    if normalized
        .strip_prefix(namespace)
        .is_some_and(|rest| rest.starts_with(':'))
    {
        normalized
    } else {
        normalize(&format!("{}:{}", namespace, name))
    }
}

pub fn is_category(name: &str) -> bool {
    name.strip_prefix(crate::config::CATEGORY_NAMESPACE)
        .is_some_and(|rest| rest.starts_with(':'))
}

fn collapse(s: &str) -> String {
    s.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_plain_title() {
        assert_eq!(normalize("Main Page"), "Main Page");
    }

    #[test]
    fn normalize_underscores() {
        assert_eq!(normalize("Main_Page"), "Main Page");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  Main   Page "), "Main Page");
        assert_eq!(normalize("Main _ Page"), "Main Page");
    }

    #[test]
    fn normalize_capitalizes_first_letter() {
        assert_eq!(normalize("rust (programming language)"), "Rust (programming language)");
    }

    #[test]
    fn normalize_preserves_inner_case() {
        assert_eq!(normalize("eBay"), "EBay");
        assert_eq!(normalize("macOS"), "MacOS");
    }

    #[test]
    fn normalize_namespace_parts() {
        assert_eq!(normalize("category:physics"), "Category:Physics");
        assert_eq!(normalize("Template:cite_web"), "Template:Cite web");
    }

    #[test]
    fn normalize_strips_leading_colon() {
        assert_eq!(normalize(":Main Page/Introduction"), "Main Page/Introduction");
    }

    #[test]
    fn normalize_keeps_extra_colons_in_name() {
        assert_eq!(normalize("Template:foo:bar"), "Template:Foo:bar");
    }

    #[test]
    fn normalize_unicode_first_letter() {
        assert_eq!(normalize("über alles"), "Über alles");
    }

    #[test]
    fn normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn with_namespace_prefixes() {
        assert_eq!(with_namespace("Category", "physics"), "Category:Physics");
    }

    #[test]
    fn with_namespace_does_not_double_prefix() {
        assert_eq!(with_namespace("Category", "Category:Physics"), "Category:Physics");
        assert_eq!(with_namespace("Category", "category:physics"), "Category:Physics");
    }

    #[test]
    fn is_category_checks_prefix() {
        assert!(is_category("Category:Physics"));
        assert!(!is_category("Physics"));
        assert!(!is_category("Template:Physics"));
        assert!(!is_category("Categories:Physics"));
    }
}
