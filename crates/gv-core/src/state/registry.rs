use ahash::AHashMap;
use std::collections::BTreeSet;

use super::{keys, ChangedKeys};

/// Work a visual consumer may have to redo after a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Recompute {
    /// Geometry / feature set of the current data source
    Shape,
    /// Values for the current variable and coordinates
    Values,
    /// Value domain and color scale
    ColorScale,
    /// Selection and pin styling
    Highlights,
}

impl Recompute {
    pub const ALL: [Recompute; 4] = [
        Recompute::Shape,
        Recompute::Values,
        Recompute::ColorScale,
        Recompute::Highlights,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecomputeSet(BTreeSet<Recompute>);

impl RecomputeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Recompute::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, recompute: Recompute) {
        self.0.insert(recompute);
    }

    pub fn contains(&self, recompute: Recompute) -> bool {
        self.0.contains(&recompute)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Recompute> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Recompute> for RecomputeSet {
    fn from_iter<I: IntoIterator<Item = Recompute>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Recompute> for RecomputeSet {
    fn extend<I: IntoIterator<Item = Recompute>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Declares which recomputations each shared-state key triggers.
///
/// Every consumer kind owns one registry; keys it does not declare are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct RecomputeRegistry {
    rules: AHashMap<String, RecomputeSet>,
}

impl RecomputeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule; rules for the same key accumulate
    pub fn on(mut self, key: &str, recomputes: impl IntoIterator<Item = Recompute>) -> Self {
        self.rules.entry(key.to_string()).or_default().extend(recomputes);
        self
    }

    /// Union of the recomputations triggered by `changed`
    pub fn resolve(&self, changed: &ChangedKeys) -> RecomputeSet {
        let mut result = RecomputeSet::new();
        for key in changed.iter() {
            if let Some(recomputes) = self.rules.get(key) {
                result.extend(recomputes.iter());
            }
        }
        result
    }

    pub fn watches(&self, key: &str) -> bool {
        self.rules.contains_key(key)
    }

    /// Rules of a map layer coloring locations by value
    pub fn value_layer() -> Self {
        use Recompute::*;
        Self::new()
            .on(keys::CURRENT_DATA_SOURCE, [Shape, Values, ColorScale, Highlights])
            .on(keys::CURRENT_VARIABLE_ID, [Values, ColorScale])
            .on(keys::DIMENSION_VALUE_DICT, [Values, ColorScale])
            .on(keys::LOCATION_SELECTION, [Highlights])
            .on(keys::LOCATION_PINS, [Highlights])
    }

    /// Rules of a legend, which only depends on the variable-wide domain
    pub fn legend() -> Self {
        use Recompute::*;
        Self::new()
            .on(keys::CURRENT_DATA_SOURCE, [ColorScale])
            .on(keys::CURRENT_VARIABLE_ID, [ColorScale])
    }

    /// Rules of a line chart plotting values along one dimension
    pub fn line_chart() -> Self {
        use Recompute::*;
        Self::new()
            .on(keys::CURRENT_DATA_SOURCE, [Shape, Values])
            .on(keys::CURRENT_VARIABLE_ID, [Values])
            .on(keys::DIMENSION_VALUE_DICT, [Values])
            .on(keys::LOCATION_SELECTION, [Values])
            .on(keys::LOCATION_PINS, [Values])
    }
}
