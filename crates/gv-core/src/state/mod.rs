//! Shared-state snapshots
//!
//! Visual consumers communicate through a flat, string-keyed state bag. Each
//! update publishes a new [`SharedState`]; nothing mutates a published
//! snapshot. Scalars compare by value and objects compare by identity, so a
//! change to nested data is only visible if the top-level value is replaced.

mod diff;
mod registry;

pub use diff::{diff, ChangedKeys, StateTracker};
pub use registry::{Recompute, RecomputeRegistry, RecomputeSet};

use ahash::AHashMap;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::model::{
    DimensionValueDict, LocationPin, LocationSelection, VariableId, VariableWithDimensions,
};

/// Keys this engine reads from and writes to the shared state
pub mod keys {
    pub const CURRENT_DATA_SOURCE: &str = "currentDataSource";
    pub const CURRENT_VARIABLE_ID: &str = "currentVariableId";
    pub const DIMENSION_VALUE_DICT: &str = "dimensionValueDict";
    pub const LOCATION_SELECTION: &str = "locationSelection";
    pub const LOCATION_PINS: &str = "locationPins";
    pub const AVAILABLE_VARIABLES_DICT: &str = "cache.availableVariablesDict";
}

/// Resolved variables per data source, as published by the metadata cache
pub type AvailableVariablesDict = HashMap<String, Arc<Vec<VariableWithDimensions>>>;

/// A value stored under one shared-state key
#[derive(Clone)]
pub enum StateValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Arc<str>),
    /// Structured value, compared by identity
    Object(Arc<dyn Any + Send + Sync>),
}

impl StateValue {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::Object(value)
    }

    /// Strict equality: scalars by value, objects by reference
    pub fn is_same(&self, other: &StateValue) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => *a as f64 == *b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Shared handle to an object value of type `T`
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Object(object) => object.clone().downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(value) => write!(f, "Bool({value})"),
            Self::Int(value) => write!(f, "Int({value})"),
            Self::Float(value) => write!(f, "Float({value})"),
            Self::Text(value) => write!(f, "Text({value:?})"),
            Self::Object(object) => write!(f, "Object({:p})", Arc::as_ptr(object)),
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl<T: Into<StateValue>> From<Option<T>> for StateValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// An immutable snapshot of the shared state.
///
/// Cloning is cheap; [`SharedState::with`] and [`SharedState::without`]
/// return new snapshots that share every untouched value.
#[derive(Clone, Default)]
pub struct SharedState {
    entries: Arc<AHashMap<String, StateValue>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot with `key` set to `value`
    pub fn with(&self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(key.into(), value.into());
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Snapshot with `key` set to a freshly allocated object
    pub fn with_object<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> Self {
        self.with(key, StateValue::object(value))
    }

    /// Snapshot with `key` removed
    pub fn without(&self, key: &str) -> Self {
        if !self.entries.contains_key(key) {
            return self.clone();
        }
        let mut entries = (*self.entries).clone();
        entries.remove(key);
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_object<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key)?.downcast::<T>()
    }

    pub fn current_data_source(&self) -> Option<&str> {
        self.get(keys::CURRENT_DATA_SOURCE)?.as_str()
    }

    pub fn current_variable_id(&self) -> Option<VariableId> {
        self.get(keys::CURRENT_VARIABLE_ID)?.as_i64()
    }

    pub fn dimension_value_dict(&self) -> Option<Arc<DimensionValueDict>> {
        self.get_object(keys::DIMENSION_VALUE_DICT)
    }

    pub fn location_selection(&self) -> Option<Arc<LocationSelection>> {
        self.get_object(keys::LOCATION_SELECTION)
    }

    pub fn location_pins(&self) -> Option<Arc<Vec<LocationPin>>> {
        self.get_object(keys::LOCATION_PINS)
    }

    pub fn available_variables_dict(&self) -> Option<Arc<AvailableVariablesDict>> {
        self.get_object(keys::AVAILABLE_VARIABLES_DICT)
    }
}

impl fmt::Debug for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<StateValue>> FromIterator<(K, V)> for SharedState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<AHashMap<_, _>>();
        Self {
            entries: Arc::new(entries),
        }
    }
}
