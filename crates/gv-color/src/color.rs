//! RGB colors and CSS color parsing

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ColorError;

/// An opaque RGB color, written as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// CSS basic color keywords plus a few common extended ones
static NAMED_COLORS: Lazy<HashMap<&'static str, Color>> = Lazy::new(|| {
    [
        ("black", Color::rgb(0, 0, 0)),
        ("silver", Color::rgb(192, 192, 192)),
        ("gray", Color::rgb(128, 128, 128)),
        ("grey", Color::rgb(128, 128, 128)),
        ("white", Color::rgb(255, 255, 255)),
        ("maroon", Color::rgb(128, 0, 0)),
        ("red", Color::rgb(255, 0, 0)),
        ("purple", Color::rgb(128, 0, 128)),
        ("fuchsia", Color::rgb(255, 0, 255)),
        ("magenta", Color::rgb(255, 0, 255)),
        ("green", Color::rgb(0, 128, 0)),
        ("lime", Color::rgb(0, 255, 0)),
        ("olive", Color::rgb(128, 128, 0)),
        ("yellow", Color::rgb(255, 255, 0)),
        ("navy", Color::rgb(0, 0, 128)),
        ("blue", Color::rgb(0, 0, 255)),
        ("teal", Color::rgb(0, 128, 128)),
        ("aqua", Color::rgb(0, 255, 255)),
        ("cyan", Color::rgb(0, 255, 255)),
        ("orange", Color::rgb(255, 165, 0)),
        ("brown", Color::rgb(165, 42, 42)),
        ("pink", Color::rgb(255, 192, 203)),
        ("gold", Color::rgb(255, 215, 0)),
        ("steelblue", Color::rgb(70, 130, 180)),
    ]
    .into_iter()
    .collect()
});

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear RGB interpolation; `t` is clamped to `[0, 1]`
    pub fn lerp(self, other: Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Color::rgb(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Parse `#rgb`, `#rrggbb`, `rgb(r, g, b)`, `hsl(h, s%, l%)` or a keyword
    pub fn parse(input: &str) -> Result<Self, ColorError> {
        let s = input.trim().to_ascii_lowercase();
        let invalid = || ColorError::InvalidColor(input.to_string());

        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(invalid);
        }
        if let Some(args) = function_args(&s, "rgb") {
            let [r, g, b] = parse_three(args).ok_or_else(invalid)?;
            let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
            return Ok(Color::rgb(channel(r), channel(g), channel(b)));
        }
        if let Some(args) = function_args(&s, "hsl") {
            let [h, sat, light] = parse_three(args).ok_or_else(invalid)?;
            return Ok(from_hsl(h, sat / 100.0, light / 100.0));
        }
        NAMED_COLORS.get(s.as_str()).copied().ok_or_else(invalid)
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.is_ascii() {
        return None;
    }
    let digit = |i: usize, len: usize| u8::from_str_radix(hex.get(i..i + len)?, 16).ok();
    match hex.len() {
        3 => Some(Color::rgb(
            digit(0, 1)? * 17,
            digit(1, 1)? * 17,
            digit(2, 1)? * 17,
        )),
        6 => Some(Color::rgb(digit(0, 2)?, digit(2, 2)?, digit(4, 2)?)),
        _ => None,
    }
}

/// Contents of `name(...)`, also accepting the `rgba`/`hsla` spellings
fn function_args<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(name)?;
    let rest = rest.strip_prefix('a').unwrap_or(rest);
    rest.strip_prefix('(')?.strip_suffix(')')
}

/// First three numeric components; `%` suffixes are dropped and an alpha
/// component is ignored
fn parse_three(args: &str) -> Option<[f64; 3]> {
    let mut parts = args
        .split([',', ' ', '/'])
        .filter(|p| !p.is_empty())
        .map(|p| p.trim_end_matches('%').trim_end_matches("deg").parse::<f64>());
    let mut next = || parts.next()?.ok();
    Some([next()?, next()?, next()?])
}

fn from_hsl(h: f64, s: f64, l: f64) -> Color {
    let h = h.rem_euclid(360.0) / 360.0;
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);
    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return Color::rgb(v, v, v);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue = |t: f64| {
        let t = t.rem_euclid(1.0);
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round() as u8
    };
    Color::rgb(hue(h + 1.0 / 3.0), hue(h), hue(h - 1.0 / 3.0))
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s)
    }
}

impl From<colorous::Color> for Color {
    fn from(c: colorous::Color) -> Self {
        Color::rgb(c.r, c.g, c.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Color::parse(&raw).map_err(serde::de::Error::custom)
    }
}
