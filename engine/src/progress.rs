//! Per-category progress reconciliation.
//!
//! Two render paths feed the progress indicators:
//!
//! - a server report (REST `user_progress` or a progress push) is merged with
//!   local progress using [`merge_progress`], so a stale server zero never
//!   hides progress the user just made;
//! - a local mutation (marking a video watched, a catalog replace) renders
//!   local progress directly.
//!
//! The reconciler remembers what it last displayed per category and flags an
//! update as changed only when the new value differs.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use lectern_types::{Category, Percent, ProgressMap, merge_progress};

use crate::view::View;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub category: Category,
    pub percent: Percent,
    pub changed: bool,
}

#[derive(Debug)]
pub struct ProgressReconciler {
    categories: Vec<Category>,
    displayed: Mutex<BTreeMap<Category, Percent>>,
}

impl ProgressReconciler {
    #[must_use]
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            displayed: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Last value rendered for `category` (0 before the first render).
    #[must_use]
    pub fn displayed(&self, category: &Category) -> Percent {
        self.displayed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category)
            .copied()
            .unwrap_or_default()
    }

    /// Merge a server report with local progress. A category missing from
    /// the report counts as a server zero.
    #[must_use]
    pub fn merged(&self, server: &ProgressMap, local: &ProgressMap) -> ProgressMap {
        self.categories
            .iter()
            .map(|category| {
                let server = server.get(category).copied().unwrap_or_default();
                let local = local.get(category).copied().unwrap_or_default();
                (category.clone(), merge_progress(server, local))
            })
            .collect()
    }

    /// Record `values` as displayed and return one update per known
    /// category.
    pub fn apply(&self, values: &ProgressMap) -> Vec<ProgressUpdate> {
        let mut displayed = self
            .displayed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.categories
            .iter()
            .map(|category| {
                let percent = values.get(category).copied().unwrap_or_default();
                let previous = displayed.insert(category.clone(), percent).unwrap_or_default();
                ProgressUpdate {
                    category: category.clone(),
                    percent,
                    changed: previous != percent,
                }
            })
            .collect()
    }

    /// Render a server report merged with local progress.
    pub fn render_server(&self, server: &ProgressMap, local: &ProgressMap, view: &dyn View) {
        let merged = self.merged(server, local);
        tracing::debug!(?server, ?local, ?merged, "Reconciled server progress");
        Self::render(&self.apply(&merged), view);
    }

    /// Render local progress only.
    pub fn render_local(&self, local: &ProgressMap, view: &dyn View) {
        Self::render(&self.apply(local), view);
    }

    fn render(updates: &[ProgressUpdate], view: &dyn View) {
        for update in updates {
            view.render_progress(&update.category, update.percent, update.changed);
        }
    }
}
