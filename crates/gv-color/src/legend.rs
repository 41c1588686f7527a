//! Legend helpers: tick values and CSS gradients

use crate::ColorScale;

/// Bin edges of a discrete scale: the lower bound of the first bin followed
/// by the upper bound of every bin. `None` for a sequential scale.
///
/// A lower bound that cannot be determined becomes `-inf`.
pub fn legend_ticks(scale: &ColorScale) -> Option<Vec<f64>> {
    if !scale.is_discrete() {
        return None;
    }
    let extents: Vec<(f64, f64)> = scale
        .range()
        .iter()
        .filter_map(|color| scale.invert_extent(*color))
        .collect();
    let (first, _) = extents.first()?;
    let first = if first.is_nan() { f64::NEG_INFINITY } else { *first };
    Some(
        std::iter::once(first)
            .chain(extents.iter().map(|(_, upper)| *upper))
            .collect(),
    )
}

/// Fixed-point tick label; unbounded edges render as `~`
pub fn format_tick(value: f64, fraction_digits: usize) -> String {
    if value.is_finite() {
        format!("{value:.fraction_digits$}")
    } else {
        "~".to_string()
    }
}

/// `linear-gradient(to right, ...)` sampling the scale at `steps + 1`
/// evenly spaced values from `min` to `max`
pub fn generate_gradient_css(scale: &ColorScale, min: f64, max: f64, steps: usize) -> Option<String> {
    let steps = steps.max(1);
    let mut css = String::from("linear-gradient(to right");
    for i in 0..=steps {
        let value = min + (max - min) * i as f64 / steps as f64;
        let color = scale.color(value)?;
        let position = (i * 100) as f64 / steps as f64;
        css.push_str(&format!(", {color} {position}%"));
    }
    css.push(')');
    Some(css)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::{QuantizeScale, SequentialScale, ThresholdScale};
    use crate::{Color, Interpolator};

    fn two_greys() -> Vec<Color> {
        vec![Color::rgb(0, 0, 0), Color::rgb(200, 200, 200)]
    }

    #[test]
    fn test_threshold_ticks_render_open_edge() {
        let scale = ColorScale::Threshold(ThresholdScale::new(
            &[0.0, 10.0, 20.0],
            vec![Color::rgb(1, 1, 1), Color::rgb(2, 2, 2), Color::rgb(3, 3, 3)],
        ));
        let ticks = legend_ticks(&scale).unwrap();
        assert_eq!(ticks, vec![0.0, 10.0, 20.0, f64::INFINITY]);
        let labels: Vec<_> = ticks.iter().map(|t| format_tick(*t, 1)).collect();
        assert_eq!(labels, vec!["0.0", "10.0", "20.0", "~"]);
    }

    #[test]
    fn test_quantize_ticks() {
        let scale = ColorScale::Quantize(QuantizeScale::new(two_greys()).with_extent(0.0, 4.0));
        assert_eq!(legend_ticks(&scale), Some(vec![0.0, 2.0, 4.0]));
        assert_eq!(format_tick(f64::NEG_INFINITY, 2), "~");
        assert_eq!(format_tick(1.0 / 3.0, 2), "0.33");
    }

    #[test]
    fn test_gradient_css() {
        let scale = ColorScale::Sequential(SequentialScale {
            domain: (0.0, 10.0),
            ..SequentialScale::new(Interpolator::Piecewise(two_greys()))
        });
        assert_eq!(legend_ticks(&scale), None);
        assert_eq!(
            generate_gradient_css(&scale, 0.0, 10.0, 2).unwrap(),
            "linear-gradient(to right, #000000 0%, #646464 50%, #c8c8c8 100%)"
        );
    }
}
