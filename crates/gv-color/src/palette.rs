//! Named palettes in d3 naming
//!
//! Continuous palettes are looked up as `interpolateViridis` or `Viridis`,
//! discrete ones as `schemeRdBu[11]` or, for categorical palettes,
//! `schemeCategory10`. Every palette is backed by `colorous`.

use colorous::Gradient;
use tracing::trace;

use crate::Color;

/// How many discrete colors a palette family offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Diverging,
    Sequential,
    /// Continuous only; no `scheme*[k]` form
    Continuous,
}

impl Family {
    fn counts(self) -> Option<std::ops::RangeInclusive<usize>> {
        match self {
            Family::Diverging => Some(3..=11),
            Family::Sequential => Some(3..=9),
            Family::Continuous => None,
        }
    }
}

const GRADIENT_NAMES: &[(&str, Family)] = &[
    ("BrBG", Family::Diverging),
    ("PRGn", Family::Diverging),
    ("PiYG", Family::Diverging),
    ("PuOr", Family::Diverging),
    ("RdBu", Family::Diverging),
    ("RdGy", Family::Diverging),
    ("RdYlBu", Family::Diverging),
    ("RdYlGn", Family::Diverging),
    ("Spectral", Family::Diverging),
    ("Blues", Family::Sequential),
    ("Greens", Family::Sequential),
    ("Greys", Family::Sequential),
    ("Oranges", Family::Sequential),
    ("Purples", Family::Sequential),
    ("Reds", Family::Sequential),
    ("BuGn", Family::Sequential),
    ("BuPu", Family::Sequential),
    ("GnBu", Family::Sequential),
    ("OrRd", Family::Sequential),
    ("PuBuGn", Family::Sequential),
    ("PuBu", Family::Sequential),
    ("PuRd", Family::Sequential),
    ("RdPu", Family::Sequential),
    ("YlGnBu", Family::Sequential),
    ("YlGn", Family::Sequential),
    ("YlOrBr", Family::Sequential),
    ("YlOrRd", Family::Sequential),
    ("Viridis", Family::Continuous),
    ("Inferno", Family::Continuous),
    ("Magma", Family::Continuous),
    ("Plasma", Family::Continuous),
    ("Cividis", Family::Continuous),
    ("Turbo", Family::Continuous),
    ("Warm", Family::Continuous),
    ("Cool", Family::Continuous),
    ("CubehelixDefault", Family::Continuous),
    ("Rainbow", Family::Continuous),
    ("Sinebow", Family::Continuous),
];

fn gradient(name: &str) -> Option<Gradient> {
    Some(match name {
        "BrBG" => colorous::BROWN_GREEN,
        "PRGn" => colorous::PURPLE_GREEN,
        "PiYG" => colorous::PINK_GREEN,
        "PuOr" => colorous::PURPLE_ORANGE,
        "RdBu" => colorous::RED_BLUE,
        "RdGy" => colorous::RED_GREY,
        "RdYlBu" => colorous::RED_YELLOW_BLUE,
        "RdYlGn" => colorous::RED_YELLOW_GREEN,
        "Spectral" => colorous::SPECTRAL,
        "Blues" => colorous::BLUES,
        "Greens" => colorous::GREENS,
        "Greys" => colorous::GREYS,
        "Oranges" => colorous::ORANGES,
        "Purples" => colorous::PURPLES,
        "Reds" => colorous::REDS,
        "BuGn" => colorous::BLUE_GREEN,
        "BuPu" => colorous::BLUE_PURPLE,
        "GnBu" => colorous::GREEN_BLUE,
        "OrRd" => colorous::ORANGE_RED,
        "PuBuGn" => colorous::PURPLE_BLUE_GREEN,
        "PuBu" => colorous::PURPLE_BLUE,
        "PuRd" => colorous::PURPLE_RED,
        "RdPu" => colorous::RED_PURPLE,
        "YlGnBu" => colorous::YELLOW_GREEN_BLUE,
        "YlGn" => colorous::YELLOW_GREEN,
        "YlOrBr" => colorous::YELLOW_ORANGE_BROWN,
        "YlOrRd" => colorous::YELLOW_ORANGE_RED,
        "Viridis" => colorous::VIRIDIS,
        "Inferno" => colorous::INFERNO,
        "Magma" => colorous::MAGMA,
        "Plasma" => colorous::PLASMA,
        "Cividis" => colorous::CIVIDIS,
        "Turbo" => colorous::TURBO,
        "Warm" => colorous::WARM,
        "Cool" => colorous::COOL,
        "CubehelixDefault" => colorous::CUBEHELIX,
        "Rainbow" => colorous::RAINBOW,
        "Sinebow" => colorous::SINEBOW,
        _ => return None,
    })
}

fn categorical(name: &str) -> Option<Vec<Color>> {
    let colors: &[colorous::Color] = match name {
        "Category10" => &colorous::CATEGORY10,
        "Accent" => &colorous::ACCENT,
        "Dark2" => &colorous::DARK2,
        "Paired" => &colorous::PAIRED,
        "Pastel1" => &colorous::PASTEL1,
        "Pastel2" => &colorous::PASTEL2,
        "Set1" => &colorous::SET1,
        "Set2" => &colorous::SET2,
        "Set3" => &colorous::SET3,
        "Tableau10" => &colorous::TABLEAU10,
        _ => return None,
    };
    Some(colors.iter().map(|c| Color::rgb(c.r, c.g, c.b)).collect())
}

fn family(name: &str) -> Option<Family> {
    GRADIENT_NAMES
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, family)| *family)
}

/// A continuous `t -> color` mapping over `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub enum Interpolator {
    /// A named gradient, optionally read back to front
    Named { name: &'static str, flipped: bool },
    /// Evenly spaced stops, interpolated linearly in RGB
    Piecewise(Vec<Color>),
}

impl Interpolator {
    /// Color at `t`, clamped to `[0, 1]`
    pub fn eval(&self, t: f64) -> Color {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Interpolator::Named { name, flipped } => {
                let t = if *flipped { 1.0 - t } else { t };
                match gradient(name) {
                    Some(gradient) => gradient.eval_continuous(t).into(),
                    None => Color::rgb(0, 0, 0),
                }
            }
            Interpolator::Piecewise(stops) => piecewise(stops, t),
        }
    }
}

fn piecewise(stops: &[Color], t: f64) -> Color {
    match stops {
        [] => Color::rgb(0, 0, 0),
        [only] => *only,
        _ => {
            let n = stops.len() - 1;
            let scaled = t * n as f64;
            let i = (scaled.floor() as usize).min(n - 1);
            stops[i].lerp(stops[i + 1], scaled - i as f64)
        }
    }
}

/// Continuous palette for `interpolate<Name>` or `<Name>`
pub fn interpolator(name: &str) -> Option<Interpolator> {
    let base = name.strip_prefix("interpolate").unwrap_or(name);
    let (known, _) = GRADIENT_NAMES.iter().find(|(known, _)| *known == base)?;
    Some(Interpolator::Named {
        name: known,
        flipped: false,
    })
}

/// Discrete palette for `scheme<Name>[k]`, or a categorical `scheme<Name>`.
///
/// Only the counts d3 offers resolve: 3 to 11 for diverging palettes and
/// 3 to 9 for sequential ones. Colors are the ColorBrewer k-class tables,
/// not samples of the continuous gradient.
pub fn scheme(name: &str) -> Option<Vec<Color>> {
    let name = name.trim();
    let Some((base, count)) = split_count(name) else {
        let base = name.strip_prefix("scheme").unwrap_or(name);
        return categorical(base);
    };
    let base = base.strip_prefix("scheme").unwrap_or(base);
    let counts = family(base)?.counts()?;
    if !counts.contains(&count) {
        trace!(name, count, "palette has no scheme of this size");
        return None;
    }
    let gradient = gradient(base)?;
    Some((0..count).map(|i| gradient.eval_rational(i, count).into()).collect())
}

fn split_count(name: &str) -> Option<(&str, usize)> {
    let (base, rest) = name.split_once('[')?;
    let count = rest.strip_suffix(']')?.parse().ok()?;
    Some((base, count))
}

/// `schemeRdBu[11]` reversed, running blue to red
pub fn fallback_scheme() -> Vec<Color> {
    let mut colors = scheme("schemeRdBu[11]").unwrap_or_default();
    colors.reverse();
    colors
}

/// `interpolateRdBu` read back to front, running blue to red
pub fn fallback_interpolator() -> Interpolator {
    Interpolator::Named {
        name: "RdBu",
        flipped: true,
    }
}
