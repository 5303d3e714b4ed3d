/// Version stamp for the persisted relation-tree file format
pub const TREE_VERSION: u32 = 1;

/// Suffix appended to the dump filename to locate the persisted relation trees
pub const TREE_SUFFIX: &str = "-trees.db";

/// Progress update interval (tick every N pages)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Default recursion depth for the category closure
pub const DEFAULT_RECURSION_DEPTH: u32 = 1;

/// Pages that are always part of the filtered page list
pub const DEFAULT_ALLOW_PAGES: [&str; 2] = ["Main Page", "MediaWiki:Noarticletext"];

/// Pseudo-template recording a dependency on the membership of a category,
/// e.g. `{{PAGESINCATEGORY:Physics}}`
pub const MAGIC_PAGES_IN_CATEGORY: &str = "PAGESINCATEGORY";

/// Short form of [`MAGIC_PAGES_IN_CATEGORY`], e.g. `{{PAGESINCAT:Physics}}`
pub const MAGIC_PAGES_IN_CAT: &str = "PAGESINCAT";

/// Namespace prefix of category pages
pub const CATEGORY_NAMESPACE: &str = "Category";

/// Namespace prefix of template pages
pub const TEMPLATE_NAMESPACE: &str = "Template";
