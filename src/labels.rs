//! Picking a categorical label column to colour projected samples by.
//!
//! This sits outside the numeric core: the chosen column only ever travels
//! with a [`crate::PcaAnalysis`] as an opaque label vector.

use std::collections::HashSet;

/// Columns with more distinct values than this are not treated as labels.
pub const MAX_LABEL_CATEGORIES: usize = 20;

/// A named column of non-numeric cell values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextColumn {
    pub name: String,
    pub values: Vec<String>,
}

impl TextColumn {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self { name: name.into(), values }
    }

    pub fn distinct_values(&self) -> usize {
        self.values.iter().collect::<HashSet<_>>().len()
    }
}

/// Index of the first column with at most [`MAX_LABEL_CATEGORIES`] distinct values.
pub fn identify_label_column(columns: &[TextColumn]) -> Option<usize> {
    columns
        .iter()
        .position(|column| column.distinct_values() <= MAX_LABEL_CATEGORIES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, values: impl Iterator<Item = String>) -> TextColumn {
        TextColumn::new(name, values.collect())
    }

    #[test]
    fn picks_first_low_cardinality_column() {
        let ids = column("id", (0..50).map(|i| format!("sample-{}", i)));
        let species = column("species", (0..50).map(|i| ["a", "b", "c"][i % 3].to_string()));
        let site = column("site", (0..50).map(|i| ["x", "y"][i % 2].to_string()));
        assert_eq!(identify_label_column(&[ids, species, site]), Some(1));
    }

    #[test]
    fn none_when_every_column_is_high_cardinality() {
        let ids = column("id", (0..21).map(|i| i.to_string()));
        assert_eq!(identify_label_column(&[ids]), None);
        assert_eq!(identify_label_column(&[]), None);
    }

    #[test]
    fn exactly_twenty_categories_still_qualifies() {
        let c = column("group", (0..40).map(|i| (i % 20).to_string()));
        assert_eq!(c.distinct_values(), 20);
        assert_eq!(identify_label_column(&[c]), Some(0));
    }
}
