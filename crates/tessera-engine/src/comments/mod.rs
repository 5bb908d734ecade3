//! Comment anchors: tracked ranges behind inline comments, their lifecycle
//! and the decorations that show them.

mod anchor;
mod overlay;

pub use anchor::{Anchor, AnchorId, AnchorState};
pub use overlay::{
    ACTIVE_CLASS, CommentAction, CommentError, CommentOverlay, DRAFT_CLASS, HOVER_CLASS, Handled,
    OverlayEvent, comment_ranges,
};
