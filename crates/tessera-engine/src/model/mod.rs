//! Immutable document tree: nodes, marks, attributes and position resolution.

mod attrs;
mod mark;
mod node;
mod resolve;

pub use attrs::{AttrValue, Attrs};
pub use mark::{Mark, MarkSpec, TypeName};
pub use node::{Node, NodeBody, TEXT};
pub use resolve::{PositionOutOfRange, ResolvedPos};

pub(crate) use node::{cut_children, normalize};
