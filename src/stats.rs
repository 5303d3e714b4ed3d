use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics collected while parsing the dump and building the trees
#[derive(Default)]
pub struct FilterStats {
    pub pages_seen: AtomicU64,
    pub redirects_seen: AtomicU64,
    /// Revisions accepted by the window (before any later eviction)
    pub revisions_kept: AtomicU64,
    /// Revisions discarded by the timestamp cutoff
    pub revisions_dropped: AtomicU64,
    pub malformed_restrictions: AtomicU64,
    pub template_edges: AtomicU64,
    pub include_edges: AtomicU64,
    pub reference_edges: AtomicU64,
}

impl FilterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pages(&self) {
        self.pages_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirects(&self) {
        self.redirects_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_revisions_kept(&self) {
        self.revisions_kept.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_revisions_dropped(&self) {
        self.revisions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed_restrictions(&self) {
        self.malformed_restrictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_template_edges(&self, count: u64) {
        self.template_edges.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_include_edges(&self, count: u64) {
        self.include_edges.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_reference_edges(&self, count: u64) {
        self.reference_edges.fetch_add(count, Ordering::Relaxed);
    }

    pub fn pages(&self) -> u64 {
        self.pages_seen.load(Ordering::Relaxed)
    }

    pub fn redirects(&self) -> u64 {
        self.redirects_seen.load(Ordering::Relaxed)
    }

    pub fn revisions_kept(&self) -> u64 {
        self.revisions_kept.load(Ordering::Relaxed)
    }

    pub fn revisions_dropped(&self) -> u64 {
        self.revisions_dropped.load(Ordering::Relaxed)
    }

    pub fn malformed_restrictions(&self) -> u64 {
        self.malformed_restrictions.load(Ordering::Relaxed)
    }

    pub fn template_edges(&self) -> u64 {
        self.template_edges.load(Ordering::Relaxed)
    }

    pub fn include_edges(&self) -> u64 {
        self.include_edges.load(Ordering::Relaxed)
    }

    pub fn reference_edges(&self) -> u64 {
        self.reference_edges.load(Ordering::Relaxed)
    }
}
