//! Moving blocks by drag and drop, and merging the sibling lists that edits
//! leave behind.

mod drag;
mod join;

pub use drag::{DragSource, DropTarget, ReorderError, drag_source, drop_target, move_block};
pub use join::auto_join;
