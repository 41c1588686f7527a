//! Core functionality for the gridded data visualization engine
//!
//! This crate provides the dimensional data model and the shared-state
//! snapshot machinery that visual consumers diff against to decide what
//! they must recompute.

pub mod model;
pub mod state;
pub mod sync;

// Re-export commonly used types
pub use model::{
    Coordinate, Dimension, DimensionId, DimensionIdAndValueDict, DimensionValueDict,
    Location, LocationId, LocationPin, LocationSelection, Value, Variable, VariableId,
    VariableWithDimensions,
};
pub use state::{
    diff, keys, AvailableVariablesDict, ChangedKeys, Recompute, RecomputeRegistry,
    RecomputeSet, SharedState, StateTracker, StateValue,
};
pub use sync::StateStore;
