use crate::models::Revision;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Retention limits applied to every page's revision history.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowLimits {
    /// Keep at most this many revisions (the newest ones); `None` keeps all.
    pub max_revisions: Option<usize>,
    /// Drop revisions strictly newer than this; `None` keeps all.
    pub max_time: Option<DateTime<Utc>>,
}

impl WindowLimits {
    /// Maps the CLI convention (`-1` = unbounded) onto the internal limit.
    pub fn from_args(max_revisions: i64, max_time: Option<DateTime<Utc>>) -> Self {
        Self {
            max_revisions: usize::try_from(max_revisions).ok(),
            max_time,
        }
    }
}

/// Bounded per-page revision retention, keyed by revision id.
///
/// Revisions past the timestamp cutoff are discarded outright and do not
/// count against the window; once the retained count exceeds the maximum,
/// the lowest-id revision is evicted. State is per page: the parser builds
/// a fresh window for each `<page>` element.
#[derive(Debug)]
pub struct RevisionWindow {
    limits: WindowLimits,
    revisions: BTreeMap<u64, Revision>,
}

impl RevisionWindow {
    pub fn new(limits: WindowLimits) -> Self {
        Self {
            limits,
            revisions: BTreeMap::new(),
        }
    }

    /// Offers a revision to the window. Returns `false` if the revision was
    /// dropped by the timestamp cutoff.
    pub fn insert(&mut self, revision: Revision) -> bool {
        if let Some(cutoff) = self.limits.max_time {
            if revision.timestamp > cutoff {
                return false;
            }
        }
        self.revisions.insert(revision.id, revision);
        if let Some(max) = self.limits.max_revisions {
            while self.revisions.len() > max {
                self.revisions.pop_first();
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Retained revisions in ascending id order.
    pub fn into_revisions(self) -> Vec<Revision> {
        self.revisions.into_values().collect()
    }
}
