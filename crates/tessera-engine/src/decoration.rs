//! Render-only annotations over document ranges.
//!
//! Decorations are never persisted. Each overlay owns its own set and either
//! rebuilds it or maps it through a transaction.

use std::ops::Range;

use crate::transform::{Bias, Mapping};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub from: usize,
    pub to: usize,
    /// Style class, e.g. `note-comment` or `hl-keyword`.
    pub class: String,
    /// Identifies what produced the decoration, e.g. a draft comment id.
    pub key: Option<String>,
}

impl Decoration {
    pub fn inline(from: usize, to: usize, class: impl Into<String>) -> Self {
        Self {
            from,
            to,
            class: class.into(),
            key: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn range(&self) -> Range<usize> {
        self.from..self.to
    }
}

/// Decorations sorted by start, then end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationSet {
    decorations: Vec<Decoration>,
}

impl DecorationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a set, dropping empty ranges.
    pub fn new(decorations: Vec<Decoration>) -> Self {
        let mut decorations: Vec<_> = decorations.into_iter().filter(|d| d.from < d.to).collect();
        decorations.sort_by_key(|d| (d.from, d.to));
        Self { decorations }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decorations.iter()
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    /// Follows every decoration through `mapping`. Content inserted at an
    /// edge stays outside; decorations whose content is gone are dropped.
    pub fn map(&self, mapping: &Mapping) -> DecorationSet {
        if mapping.is_identity() {
            return self.clone();
        }
        let mapped = self
            .decorations
            .iter()
            .map(|d| Decoration {
                from: mapping.map(d.from, Bias::Right),
                to: mapping.map(d.to, Bias::Left),
                ..d.clone()
            })
            .collect();
        DecorationSet::new(mapped)
    }

    /// Decorations touching `[from, to]`, edges included.
    pub fn find(&self, from: usize, to: usize) -> Vec<&Decoration> {
        self.decorations
            .iter()
            .take_while(|d| d.from <= to)
            .filter(|d| d.to >= from)
            .collect()
    }

    #[must_use]
    pub fn add(&self, more: Vec<Decoration>) -> DecorationSet {
        let mut all = self.decorations.clone();
        all.extend(more);
        DecorationSet::new(all)
    }

    #[must_use]
    pub fn remove_where(&self, pred: impl Fn(&Decoration) -> bool) -> DecorationSet {
        Self {
            decorations: self
                .decorations
                .iter()
                .filter(|d| !pred(d))
                .cloned()
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DecorationSet {
    type Item = &'a Decoration;
    type IntoIter = std::slice::Iter<'a, Decoration>;

    fn into_iter(self) -> Self::IntoIter {
        self.decorations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::StepMap;
    use pretty_assertions::assert_eq;

    fn mapping(start: usize, old: usize, new: usize) -> Mapping {
        let mut m = Mapping::new();
        m.push(StepMap::replaced(start, old, new));
        m
    }

    #[test]
    fn insertion_at_edges_stays_outside() {
        let set = DecorationSet::new(vec![Decoration::inline(5, 10, "x")]);
        let at_start = set.map(&mapping(5, 0, 3));
        assert_eq!(at_start.iter().next().map(Decoration::range), Some(8..13));
        let at_end = set.map(&mapping(10, 0, 3));
        assert_eq!(at_end.iter().next().map(Decoration::range), Some(5..10));
    }

    #[test]
    fn deleted_decorations_are_dropped() {
        let set = DecorationSet::new(vec![Decoration::inline(5, 10, "x")]);
        assert!(set.map(&mapping(4, 8, 0)).is_empty());
    }

    #[test]
    fn find_includes_edges() {
        let set = DecorationSet::new(vec![
            Decoration::inline(1, 3, "a"),
            Decoration::inline(3, 6, "b"),
            Decoration::inline(8, 9, "c"),
        ]);
        let found: Vec<_> = set.find(3, 3).iter().map(|d| d.class.as_str()).collect();
        assert_eq!(found, vec!["a", "b"]);
    }
}
