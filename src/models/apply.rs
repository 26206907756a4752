use serde::{Deserialize, Serialize};

/// Options controlling how a suggestion is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOptions {
    /// Apply every item. When false, only items named in `selected_items` are applied.
    #[serde(default = "default_true")]
    pub apply_all: bool,
    /// Item titles or ids to apply when `apply_all` is false.
    #[serde(default)]
    pub selected_items: Option<Vec<String>>,
    /// Report what would be written without touching the store.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            apply_all: true,
            selected_items: None,
            dry_run: false,
        }
    }
}

impl ApplyOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn selected(items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            apply_all: false,
            selected_items: Some(items.into_iter().map(Into::into).collect()),
            dry_run: false,
        }
    }

    /// Whether an item identified by any of `keys` should be applied.
    pub fn includes(&self, keys: &[&str]) -> bool {
        if self.apply_all {
            return true;
        }
        match &self.selected_items {
            Some(selected) => selected
                .iter()
                .any(|s| keys.iter().any(|k| !k.is_empty() && s == k)),
            None => false,
        }
    }
}

/// Outcome of applying a suggestion.
///
/// Application is not transactional: `applied_items`, `skipped_items` and
/// `errors` are the authoritative record of what was written, so a caller can
/// retry only the skipped subset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApplyResult {
    /// True iff `errors` is empty.
    pub success: bool,
    pub message: String,
    pub applied_items: Vec<String>,
    pub skipped_items: Vec<String>,
    pub errors: Vec<String>,
    pub created_goals: u32,
    pub created_tasks: u32,
    pub updated_tasks: u32,
    pub updated_events: u32,
}
