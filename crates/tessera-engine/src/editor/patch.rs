use std::ops::Range;

use crate::comments::OverlayEvent;
use crate::transform::Selection;

/// Result of dispatching a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Ranges of the new document that changed, including any auto-join.
    pub changed: Vec<Range<usize>>,
    pub selection: Selection,
    pub version: u64,
    /// Comment overlay notifications, in the order they happened.
    pub events: Vec<OverlayEvent>,
    /// Whether adjacent lists were joined after the transaction.
    pub joined: bool,
}
