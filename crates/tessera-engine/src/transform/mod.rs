//! Document changes: steps, transactions and position mapping.

mod map;
mod reconcile;
mod step;
mod transaction;

pub use map::{Bias, ChangedRange, MapResult, Mapping, StepMap};
pub use reconcile::{
    DEFAULT_MAX_DIFF_CELLS, Reconciliation, ReconciliationAmbiguity, reconcile,
};
pub use step::{Step, StepError, Wrapper};
pub use transaction::{Applied, Origin, Selection, Transaction};
