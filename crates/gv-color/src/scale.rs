//! Value to color scales
//!
//! Four flavours, matching the d3 scales the configuration names:
//! a continuous sequential scale and three discrete ones that split their
//! domain into bins.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::palette::Interpolator;
use crate::{Color, ColorError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScaleType {
    #[default]
    Sequential,
    Quantize,
    Quantile,
    Threshold,
}

impl fmt::Display for ColorScaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColorScaleType::Sequential => "sequential",
            ColorScaleType::Quantize => "quantize",
            ColorScaleType::Quantile => "quantile",
            ColorScaleType::Threshold => "threshold",
        })
    }
}

/// What a scale needs before it can map values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainRequirement {
    /// `(min, max)` of the data
    Extent,
    /// Every data value
    Population,
    /// Nothing; the thresholds come with the definition
    Explicit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleDomain<'a> {
    Extent(f64, f64),
    Population(&'a [f64]),
    Explicit,
}

impl ScaleDomain<'_> {
    fn requirement(&self) -> DomainRequirement {
        match self {
            ScaleDomain::Extent(..) => DomainRequirement::Extent,
            ScaleDomain::Population(_) => DomainRequirement::Population,
            ScaleDomain::Explicit => DomainRequirement::Explicit,
        }
    }
}

/// Index of the first element greater than `value`
fn bisect_right(sorted: &[f64], value: f64) -> usize {
    sorted.partition_point(|x| *x <= value)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequentialScale {
    pub interpolator: Interpolator,
    pub domain: (f64, f64),
    pub reverse: bool,
}

impl SequentialScale {
    pub fn new(interpolator: Interpolator) -> Self {
        Self {
            interpolator,
            domain: (0.0, 1.0),
            reverse: false,
        }
    }

    pub fn color(&self, value: f64) -> Option<Color> {
        let (x0, x1) = self.domain;
        if value.is_nan() || !x0.is_finite() || !x1.is_finite() {
            return None;
        }
        let t = if x0 == x1 {
            0.5
        } else {
            ((value - x0) / (x1 - x0)).clamp(0.0, 1.0)
        };
        let t = if self.reverse { 1.0 - t } else { t };
        Some(self.interpolator.eval(t))
    }
}

/// Splits `[min, max]` into equally wide bins, one per color
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizeScale {
    pub colors: Vec<Color>,
    pub domain: (f64, f64),
    thresholds: Vec<f64>,
}

impl QuantizeScale {
    pub fn new(colors: Vec<Color>) -> Self {
        let mut scale = Self {
            colors,
            domain: (0.0, 1.0),
            thresholds: Vec::new(),
        };
        scale.rescale();
        scale
    }

    pub fn with_extent(mut self, min: f64, max: f64) -> Self {
        self.domain = (min, max);
        self.rescale();
        self
    }

    fn rescale(&mut self) {
        let (x0, x1) = self.domain;
        let n = self.colors.len().saturating_sub(1);
        self.thresholds = (0..n)
            .map(|i| ((i as f64 + 1.0) * x1 - (i as f64 - n as f64) * x0) / (n as f64 + 1.0))
            .collect();
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn color(&self, value: f64) -> Option<Color> {
        if value.is_nan() {
            return None;
        }
        self.colors.get(bisect_right(&self.thresholds, value)).copied()
    }

    pub fn invert_extent(&self, index: usize) -> Option<(f64, f64)> {
        if index >= self.colors.len() {
            return None;
        }
        let (x0, x1) = self.domain;
        let lower = if index == 0 { x0 } else { self.thresholds[index - 1] };
        let upper = self.thresholds.get(index).copied().unwrap_or(x1);
        Some((lower, upper))
    }
}

/// Bins holding an equal share of the observed values
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileScale {
    pub colors: Vec<Color>,
    population: Vec<f64>,
    thresholds: Vec<f64>,
}

/// R-7 quantile of an ascending slice
fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    let first = *sorted.first()?;
    let last = sorted[n - 1];
    if p <= 0.0 || n < 2 {
        return Some(first);
    }
    if p >= 1.0 {
        return Some(last);
    }
    let i = (n - 1) as f64 * p;
    let i0 = i.floor() as usize;
    let v0 = sorted[i0];
    let v1 = sorted[i0 + 1];
    Some(v0 + (v1 - v0) * (i - i0 as f64))
}

impl QuantileScale {
    pub fn new(colors: Vec<Color>) -> Self {
        Self {
            colors,
            population: Vec::new(),
            thresholds: Vec::new(),
        }
    }

    /// Set the observed values; `NaN`s are dropped
    pub fn with_population(mut self, values: &[f64]) -> Self {
        let mut population: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        population.sort_by(f64::total_cmp);
        let n = self.colors.len();
        self.thresholds = if population.is_empty() {
            Vec::new()
        } else {
            (1..n)
                .filter_map(|i| quantile_sorted(&population, i as f64 / n as f64))
                .collect()
        };
        self.population = population;
        self
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn color(&self, value: f64) -> Option<Color> {
        if value.is_nan() || self.population.is_empty() {
            return None;
        }
        self.colors.get(bisect_right(&self.thresholds, value)).copied()
    }

    pub fn invert_extent(&self, index: usize) -> Option<(f64, f64)> {
        if index >= self.colors.len() {
            return None;
        }
        let first = *self.population.first()?;
        let last = *self.population.last()?;
        let lower = if index == 0 { first } else { self.thresholds[index - 1] };
        let upper = self.thresholds.get(index).copied().unwrap_or(last);
        Some((lower, upper))
    }
}

/// Fixed boundaries from the definition.
///
/// The first threshold is the floor of the lowest bin; the remaining ones
/// separate the bins, so `n` thresholds give `n` bins and the last bin is
/// open above.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdScale {
    pub colors: Vec<Color>,
    floor: f64,
    boundaries: Vec<f64>,
}

impl ThresholdScale {
    pub fn new(thresholds: &[f64], colors: Vec<Color>) -> Self {
        let floor = thresholds.first().copied().unwrap_or(f64::NEG_INFINITY);
        let boundaries = thresholds.get(1..).unwrap_or_default().to_vec();
        let mut colors = colors;
        colors.truncate(boundaries.len() + 1);
        Self {
            colors,
            floor,
            boundaries,
        }
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn color(&self, value: f64) -> Option<Color> {
        if value.is_nan() || self.colors.is_empty() {
            return None;
        }
        let n = self.boundaries.len().min(self.colors.len() - 1);
        self.colors.get(bisect_right(&self.boundaries[..n], value)).copied()
    }

    pub fn invert_extent(&self, index: usize) -> Option<(f64, f64)> {
        if index >= self.colors.len() {
            return None;
        }
        let lower = if index == 0 { self.floor } else { self.boundaries[index - 1] };
        let upper = self.boundaries.get(index).copied().unwrap_or(f64::INFINITY);
        Some((lower, upper))
    }
}

/// A generated color scale
#[derive(Debug, Clone, PartialEq)]
pub enum ColorScale {
    Sequential(SequentialScale),
    Quantize(QuantizeScale),
    Quantile(QuantileScale),
    Threshold(ThresholdScale),
}

impl ColorScale {
    pub fn kind(&self) -> ColorScaleType {
        match self {
            ColorScale::Sequential(_) => ColorScaleType::Sequential,
            ColorScale::Quantize(_) => ColorScaleType::Quantize,
            ColorScale::Quantile(_) => ColorScaleType::Quantile,
            ColorScale::Threshold(_) => ColorScaleType::Threshold,
        }
    }

    pub fn is_discrete(&self) -> bool {
        !matches!(self, ColorScale::Sequential(_))
    }

    pub fn domain_requirement(&self) -> DomainRequirement {
        match self {
            ColorScale::Sequential(_) | ColorScale::Quantize(_) => DomainRequirement::Extent,
            ColorScale::Quantile(_) => DomainRequirement::Population,
            ColorScale::Threshold(_) => DomainRequirement::Explicit,
        }
    }

    /// Bind the scale to data. The domain must match [`Self::domain_requirement`].
    pub fn with_domain(self, domain: ScaleDomain<'_>) -> Result<Self, ColorError> {
        let expected = self.domain_requirement();
        if domain.requirement() != expected {
            return Err(ColorError::MissingDomain {
                kind: self.kind(),
                expected,
            });
        }
        Ok(match (self, domain) {
            (ColorScale::Sequential(mut scale), ScaleDomain::Extent(min, max)) => {
                scale.domain = (min, max);
                ColorScale::Sequential(scale)
            }
            (ColorScale::Quantize(scale), ScaleDomain::Extent(min, max)) => {
                ColorScale::Quantize(scale.with_extent(min, max))
            }
            (ColorScale::Quantile(scale), ScaleDomain::Population(values)) => {
                ColorScale::Quantile(scale.with_population(values))
            }
            (scale, _) => scale,
        })
    }

    /// Color for `value`; `None` for `NaN` or when the scale has no bins
    pub fn color(&self, value: f64) -> Option<Color> {
        match self {
            ColorScale::Sequential(scale) => scale.color(value),
            ColorScale::Quantize(scale) => scale.color(value),
            ColorScale::Quantile(scale) => scale.color(value),
            ColorScale::Threshold(scale) => scale.color(value),
        }
    }

    /// The discrete colors, empty for a sequential scale
    pub fn range(&self) -> &[Color] {
        match self {
            ColorScale::Sequential(_) => &[],
            ColorScale::Quantize(scale) => &scale.colors,
            ColorScale::Quantile(scale) => &scale.colors,
            ColorScale::Threshold(scale) => &scale.colors,
        }
    }

    /// `[lower, upper)` of the bin painted with `color`
    pub fn invert_extent(&self, color: Color) -> Option<(f64, f64)> {
        let index = self.range().iter().position(|c| *c == color)?;
        match self {
            ColorScale::Sequential(_) => None,
            ColorScale::Quantize(scale) => scale.invert_extent(index),
            ColorScale::Quantile(scale) => scale.invert_extent(index),
            ColorScale::Threshold(scale) => scale.invert_extent(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grey(v: u8) -> Color {
        Color::rgb(v, v, v)
    }

    fn greys(n: u8) -> Vec<Color> {
        (0..n).map(|i| grey(i * 10)).collect()
    }

    #[test]
    fn test_sequential() {
        let scale = SequentialScale {
            domain: (0.0, 10.0),
            ..SequentialScale::new(Interpolator::Piecewise(vec![grey(0), grey(200)]))
        };
        assert_eq!(scale.color(5.0), Some(grey(100)));
        assert_eq!(scale.color(-5.0), Some(grey(0)));
        assert_eq!(scale.color(50.0), Some(grey(200)));
        assert_eq!(scale.color(f64::NAN), None);

        let reversed = SequentialScale {
            reverse: true,
            ..scale.clone()
        };
        assert_eq!(reversed.color(0.0), Some(grey(200)));

        let flat = SequentialScale {
            domain: (3.0, 3.0),
            ..scale
        };
        assert_eq!(flat.color(3.0), Some(grey(100)));
    }

    #[test]
    fn test_quantize() {
        let scale = QuantizeScale::new(greys(4)).with_extent(0.0, 100.0);
        assert_eq!(scale.thresholds(), &[25.0, 50.0, 75.0]);
        assert_eq!(scale.color(-1.0), Some(grey(0)));
        assert_eq!(scale.color(25.0), Some(grey(10)));
        assert_eq!(scale.color(99.0), Some(grey(30)));
        assert_eq!(scale.invert_extent(0), Some((0.0, 25.0)));
        assert_eq!(scale.invert_extent(3), Some((75.0, 100.0)));
        assert_eq!(scale.invert_extent(4), None);
    }

    #[test]
    fn test_quantile() {
        let values = [1.0, 2.0, 3.0, 4.0, f64::NAN, 5.0];
        let scale = QuantileScale::new(greys(2)).with_population(&values);
        assert_eq!(scale.thresholds(), &[3.0]);
        assert_eq!(scale.color(2.9), Some(grey(0)));
        assert_eq!(scale.color(3.0), Some(grey(10)));
        assert_eq!(scale.invert_extent(0), Some((1.0, 3.0)));
        assert_eq!(scale.invert_extent(1), Some((3.0, 5.0)));

        let empty = QuantileScale::new(greys(2)).with_population(&[]);
        assert_eq!(empty.color(1.0), None);
        assert_eq!(empty.invert_extent(0), None);
    }

    #[test]
    fn test_threshold_bins() {
        let scale = ThresholdScale::new(&[0.0, 10.0, 20.0], greys(5));
        assert_eq!(scale.colors.len(), 3);
        assert_eq!(scale.color(-5.0), Some(grey(0)));
        assert_eq!(scale.color(10.0), Some(grey(10)));
        assert_eq!(scale.color(1e9), Some(grey(20)));

        let extents: Vec<_> = (0..3).filter_map(|i| scale.invert_extent(i)).collect();
        assert_eq!(extents, vec![(0.0, 10.0), (10.0, 20.0), (20.0, f64::INFINITY)]);

        let open = ThresholdScale::new(&[], greys(2));
        assert_eq!(open.floor(), f64::NEG_INFINITY);
        assert_eq!(open.color(7.0), Some(grey(0)));
    }

    #[test]
    fn test_with_domain_checks_requirement() {
        let scale = ColorScale::Quantile(QuantileScale::new(greys(3)));
        let err = scale.clone().with_domain(ScaleDomain::Extent(0.0, 1.0)).unwrap_err();
        assert!(matches!(
            err,
            ColorError::MissingDomain {
                kind: ColorScaleType::Quantile,
                expected: DomainRequirement::Population
            }
        ));

        let bound = scale.with_domain(ScaleDomain::Population(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(bound.color(3.0), Some(grey(20)));
        assert_eq!(bound.invert_extent(grey(0)).map(|(lo, _)| lo), Some(1.0));
        assert_eq!(bound.invert_extent(grey(99)), None);
    }
}
