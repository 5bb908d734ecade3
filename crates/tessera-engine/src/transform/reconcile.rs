//! Position mapping for remote snapshots.
//!
//! A remote change arrives as a whole new document. Both documents are
//! flattened into their position tokens and diffed so that untouched regions
//! map exactly and everything else becomes a replaced range.

use super::map::{ChangedRange, StepMap};
use crate::model::{Node, NodeBody};

/// Diff budget used when no explicit one is configured.
pub const DEFAULT_MAX_DIFF_CELLS: usize = 4_000_000;

/// A region of the old document whose new location could not be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationAmbiguity {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub map: StepMap,
    pub ambiguities: Vec<ReconciliationAmbiguity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit<'a> {
    Open(&'a str),
    Close,
    Char(char),
    Leaf(&'a str),
}

fn flatten(node: &Node) -> Vec<Unit<'_>> {
    let mut out = Vec::with_capacity(node.content_size());
    for child in node.children() {
        flatten_into(child, &mut out);
    }
    out
}

fn flatten_into<'a>(node: &'a Node, out: &mut Vec<Unit<'a>>) {
    match node.body() {
        NodeBody::Text(t) => out.extend(t.chars().map(Unit::Char)),
        NodeBody::Leaf { .. } => out.push(Unit::Leaf(node.kind())),
        NodeBody::Children(children) => {
            out.push(Unit::Open(node.kind()));
            for child in children {
                flatten_into(child, out);
            }
            out.push(Unit::Close);
        }
    }
}

/// Computes a position map from `old` to `new`. `max_cells` bounds the
/// size of the diff table; larger differing regions are reported as a
/// single ambiguous replacement.
pub fn reconcile(old: &Node, new: &Node, max_cells: usize) -> Reconciliation {
    let a = flatten(old);
    let b = flatten(new);

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let max_suffix = a.len().min(b.len()) - prefix;
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take(max_suffix)
        .take_while(|(x, y)| x == y)
        .count();

    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];

    if mid_a.is_empty() || mid_b.is_empty() {
        return Reconciliation {
            map: StepMap::replaced(prefix, mid_a.len(), mid_b.len()),
            ambiguities: Vec::new(),
        };
    }

    if mid_a.len().saturating_mul(mid_b.len()) > max_cells {
        log::warn!(
            "remote change too large to diff ({} x {} units); treating {}..{} as replaced",
            mid_a.len(),
            mid_b.len(),
            prefix,
            prefix + mid_a.len()
        );
        return Reconciliation {
            map: StepMap::replaced(prefix, mid_a.len(), mid_b.len()),
            ambiguities: vec![ReconciliationAmbiguity {
                from: prefix,
                to: prefix + mid_a.len(),
            }],
        };
    }

    Reconciliation {
        map: StepMap::from_ranges(lcs_ranges(mid_a, mid_b, prefix)),
        ambiguities: Vec::new(),
    }
}

/// Changed ranges between `a` and `b` from a longest common subsequence.
fn lcs_ranges(a: &[Unit<'_>], b: &[Unit<'_>], base: usize) -> Vec<ChangedRange> {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    // table[i][j]: LCS length of a[i..] and b[j..]
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut ranges = Vec::new();
    let mut pending: Option<ChangedRange> = None;
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        if i < n && j < m && a[i] == b[j] && table[i * width + j] == table[(i + 1) * width + j + 1] + 1
        {
            if let Some(range) = pending.take() {
                ranges.push(range);
            }
            i += 1;
            j += 1;
            continue;
        }
        let range = pending.get_or_insert(ChangedRange {
            start: base + i,
            old_size: 0,
            new_size: 0,
        });
        if j >= m || (i < n && table[(i + 1) * width + j] >= table[i * width + j + 1]) {
            range.old_size += 1;
            i += 1;
        } else {
            range.new_size += 1;
            j += 1;
        }
    }
    if let Some(range) = pending {
        ranges.push(range);
    }
    ranges
}
