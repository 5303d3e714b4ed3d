use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Author of a revision: either a registered user (username and, when the
/// dump carries it, a numeric id) or an anonymous IP editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub username: Option<String>,
    pub id: Option<u64>,
    pub ip: Option<String>,
}

/// A single page revision, created once from parsed XML and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub contributor: Contributor,
    pub comment: String,
    pub text: String,
    pub minor: bool,
}

/// A page header: normalized title, numeric id, redirect flag (with the
/// target from the `<redirect title="..."/>` attribute when present) and the
/// parsed restriction map (action name -> required group, `"all"` when the
/// restriction token carries no action).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    pub id: u32,
    pub redirect: bool,
    pub redirect_target: Option<String>,
    pub restrictions: BTreeMap<String, String>,
}

/// One fully assembled page together with its retained revisions, sorted
/// ascending by revision id.
#[derive(Debug, Clone)]
pub struct PageBundle {
    pub page: Page,
    pub revisions: Vec<Revision>,
}

impl PageBundle {
    /// The newest retained revision, used as the page's representative
    /// "current" state.
    pub fn current_revision(&self) -> Option<&Revision> {
        self.revisions.last()
    }
}
