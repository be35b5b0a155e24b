//! Category filter view-model.
//!
//! The output is recomputed eagerly whenever the source list or the
//! selection changes, and always preserves source order.

use crate::model::{ALL_CATEGORIES, Inspiration};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    /// `"all"` (or an empty label) selects everything.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == ALL_CATEGORIES {
            Self::All
        } else {
            Self::Only(raw.to_owned())
        }
    }

    #[must_use]
    pub fn matches(&self, item: &Inspiration) -> bool {
        match self {
            Self::All => true,
            Self::Only(category) => item.category == *category,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::All => ALL_CATEGORIES,
            Self::Only(category) => category,
        }
    }
}

/// Items whose category matches `filter`, in source order.
#[must_use]
pub fn filter_by_category(items: &[Inspiration], filter: &CategoryFilter) -> Vec<Inspiration> {
    match filter {
        CategoryFilter::All => items.to_vec(),
        CategoryFilter::Only(_) => items.iter().filter(|item| filter.matches(item)).cloned().collect(),
    }
}

/// Distinct non-empty categories in order of first appearance.
#[must_use]
pub fn available_categories(items: &[Inspiration]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for item in items {
        if !item.category.is_empty() && !seen.contains(&item.category) {
            seen.push(item.category.clone());
        }
    }
    seen
}

#[derive(Debug, Clone, Default)]
pub struct FilterViewModel {
    source: Vec<Inspiration>,
    selected: CategoryFilter,
    output: Vec<Inspiration>,
}

impl FilterViewModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_source(&mut self, items: Vec<Inspiration>) {
        self.source = items;
        self.recompute();
    }

    pub fn select(&mut self, filter: CategoryFilter) {
        self.selected = filter;
        self.recompute();
    }

    #[must_use]
    pub fn selected(&self) -> &CategoryFilter {
        &self.selected
    }

    #[must_use]
    pub fn visible(&self) -> &[Inspiration] {
        &self.output
    }

    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        available_categories(&self.source)
    }

    fn recompute(&mut self) {
        self.output = filter_by_category(&self.source, &self.selected);
    }
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;
