use std::borrow::Cow;

use super::Attrs;

/// Name of a node or mark type. Built-in types use static names.
pub type TypeName = Cow<'static, str>;

/// Per-type mark behaviour, filled in by the schema when the mark is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkSpec {
    /// Registration order. Lower ranks wrap higher ranks when serialized.
    pub rank: u16,
    /// Whether a mark of this type replaces other marks of the same type.
    /// Comment marks are not exclusive: overlapping comments coexist.
    pub exclusive: bool,
}

/// An inline formatting span attached to text and inline leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    kind: TypeName,
    attrs: Attrs,
    spec: MarkSpec,
}

impl Mark {
    pub fn new(kind: impl Into<TypeName>, attrs: Attrs, spec: MarkSpec) -> Self {
        Self {
            kind: kind.into(),
            attrs,
            spec,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn spec(&self) -> MarkSpec {
        self.spec
    }

    pub fn is_in_set(&self, set: &[Mark]) -> bool {
        set.contains(self)
    }

    /// Returns `set` with this mark added, keeping the canonical order.
    pub fn add_to_set(&self, set: &[Mark]) -> Vec<Mark> {
        if self.is_in_set(set) {
            return set.to_vec();
        }
        let mut out: Vec<Mark> = set
            .iter()
            .filter(|m| !(self.spec.exclusive && m.kind == self.kind))
            .cloned()
            .collect();
        let key = self.sort_key();
        let at = out
            .iter()
            .position(|m| m.sort_key() > key)
            .unwrap_or(out.len());
        out.insert(at, self.clone());
        out
    }

    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|m| *m != self).cloned().collect()
    }

    fn sort_key(&self) -> (u16, &str, String) {
        (self.spec.rank, &self.kind, self.attrs.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(kind: &'static str, rank: u16, exclusive: bool, attrs: Attrs) -> Mark {
        Mark::new(kind, attrs, MarkSpec { rank, exclusive })
    }

    #[test]
    fn add_keeps_rank_order() {
        let bold = mark("bold", 1, true, Attrs::new());
        let code = mark("code", 5, true, Attrs::new());
        let link = mark("link", 0, true, Attrs::new().with("href", "a"));

        let set = code.add_to_set(&[]);
        let set = bold.add_to_set(&set);
        let set = link.add_to_set(&set);

        let kinds: Vec<_> = set.iter().map(Mark::kind).collect();
        assert_eq!(kinds, vec!["link", "bold", "code"]);
    }

    #[test]
    fn exclusive_marks_replace_same_kind() {
        let a = mark("link", 0, true, Attrs::new().with("href", "a"));
        let b = mark("link", 0, true, Attrs::new().with("href", "b"));
        let set = b.add_to_set(&a.add_to_set(&[]));
        assert_eq!(set, vec![b]);
    }

    #[test]
    fn stacking_marks_coexist_in_canonical_order() {
        let one = mark("comment", 4, false, Attrs::new().with("comment_id", "1"));
        let two = mark("comment", 4, false, Attrs::new().with("comment_id", "2"));
        let forward = two.add_to_set(&one.add_to_set(&[]));
        let backward = one.add_to_set(&two.add_to_set(&[]));
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 2);
    }
}
