//! Value-to-visual mappings: marker radius, region fill, bar height.

use crate::model::StationStat;
use ratatui::style::Color;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// 24-bit color, independent of the terminal backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channel-wise interpolation, rounded to the nearest integer
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    pub fn to_color(self) -> Color {
        Color::Rgb(self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected #rrggbb, got {s:?}"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("{s:?}: {e}"))
        };
        Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Min and max of the present values. NaN and missing values are ignored.
pub fn extent<I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Linear map from a numeric domain to a numeric range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    /// Normalized position of `x` in the domain; 0 when the domain is empty.
    pub fn normalize(&self, x: f64) -> f64 {
        let span = self.domain.1 - self.domain.0;
        if span == 0.0 || !span.is_finite() {
            0.0
        } else {
            (x - self.domain.0) / span
        }
    }

    pub fn apply(&self, x: f64) -> f64 {
        let t = self.normalize(x);
        self.range.0 + (self.range.1 - self.range.0) * t
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }
}

/// Square-root marker sizing with a fixed fallback for stations without data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadiusScale {
    pub divisor: f64,
    pub default_radius: f64,
}

impl Default for RadiusScale {
    fn default() -> Self {
        Self {
            divisor: 2000.0,
            default_radius: 2.0,
        }
    }
}

impl RadiusScale {
    pub fn radius(&self, stat: Option<&StationStat>) -> f64 {
        match stat {
            Some(s) => {
                let r = s.sum.sqrt() / self.divisor;
                if r.is_finite() {
                    r
                } else {
                    self.default_radius
                }
            }
            None => self.default_radius,
        }
    }
}

/// Two-color linear fill scale with a neutral color for missing values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorScale {
    scale: LinearScale,
    low: Rgb,
    high: Rgb,
    neutral: Rgb,
}

impl ColorScale {
    pub fn new(domain: (f64, f64), low: Rgb, high: Rgb, neutral: Rgb) -> Self {
        Self {
            scale: LinearScale::new(domain, (0.0, 1.0)),
            low,
            high,
            neutral,
        }
    }

    /// Build over the extent of `values`; `None` when nothing is present.
    pub fn over<I>(values: I, low: Rgb, high: Rgb, neutral: Rgb) -> Option<Self>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        extent(values).map(|domain| Self::new(domain, low, high, neutral))
    }

    pub fn color(&self, value: Option<f64>) -> Rgb {
        match value {
            Some(v) if v.is_finite() => self.low.lerp(self.high, self.scale.normalize(v)),
            _ => self.neutral,
        }
    }

    pub fn domain(&self) -> (f64, f64) {
        self.scale.domain()
    }

    pub fn low(&self) -> Rgb {
        self.low
    }

    pub fn high(&self) -> Rgb {
        self.high
    }
}

/// Round to an integer and group thousands with commas, e.g. `-1,234,568`.
pub fn format_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const GREEN_LOW: Rgb = Rgb::new(0xe5, 0xf5, 0xe0);
    const GREEN_HIGH: Rgb = Rgb::new(0x31, 0xa3, 0x54);
    const GRAY: Rgb = Rgb::new(0xd3, 0xd3, 0xd3);

    fn stat(sum: f64) -> StationStat {
        StationStat {
            sum,
            hourly: BTreeMap::new(),
        }
    }

    #[test]
    fn test_radius_from_sum() {
        let r = RadiusScale::default().radius(Some(&stat(8000.0)));
        assert!((r - 8000f64.sqrt() / 2000.0).abs() < 1e-12);
        assert!((r - 0.0447).abs() < 1e-4);
    }

    #[test]
    fn test_radius_default_without_stats() {
        let scale = RadiusScale::default();
        assert_eq!(scale.radius(None), 2.0);
        // A negative sum would be NaN under sqrt
        assert_eq!(scale.radius(Some(&stat(-1.0))), 2.0);
    }

    #[test]
    fn test_color_endpoints_and_neutral() {
        let scale = ColorScale::new((50.0, 100.0), GREEN_LOW, GREEN_HIGH, GRAY);
        assert_eq!(scale.color(Some(100.0)), GREEN_HIGH);
        assert_eq!(scale.color(Some(50.0)), GREEN_LOW);
        assert_eq!(scale.color(None), GRAY);
        assert_eq!(scale.color(Some(f64::NAN)), GRAY);
    }

    #[test]
    fn test_color_defined_across_extent() {
        let scale = ColorScale::new((-20.0, 80.0), GREEN_LOW, GREEN_HIGH, GRAY);
        for step in 0..=100 {
            let c = scale.color(Some(-20.0 + step as f64));
            assert_ne!(c, GRAY);
        }
        let mid = scale.color(Some(30.0));
        assert_eq!(mid, GREEN_LOW.lerp(GREEN_HIGH, 0.5));
    }

    #[test]
    fn test_zero_is_a_value() {
        let scale = ColorScale::over([Some(0.0), Some(10.0), None], GREEN_LOW, GREEN_HIGH, GRAY)
            .unwrap();
        assert_eq!(scale.color(Some(0.0)), GREEN_LOW);
    }

    #[test]
    fn test_degenerate_domain_maps_low() {
        let scale = ColorScale::new((7.0, 7.0), GREEN_LOW, GREEN_HIGH, GRAY);
        assert_eq!(scale.color(Some(7.0)), GREEN_LOW);
    }

    #[test]
    fn test_extent_skips_missing() {
        assert_eq!(extent([None, Some(3.0), Some(f64::NAN), Some(-1.0)]), Some((-1.0, 3.0)));
        assert_eq!(extent([None, None]), None);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!("#31a354".parse::<Rgb>().unwrap(), GREEN_HIGH);
        assert_eq!(GREEN_HIGH.to_string(), "#31a354");
        assert!("31a35".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0.4), "0");
        assert_eq!(format_thousands(999.5), "1,000");
        assert_eq!(format_thousands(1234567.0), "1,234,567");
        assert_eq!(format_thousands(-45210.2), "-45,210");
    }

    #[test]
    fn test_linear_bar_height() {
        let scale = LinearScale::new((0.0, 400.0), (0.0, 1.0));
        assert_eq!(scale.apply(100.0), 0.25);
        assert_eq!(scale.apply(400.0), 1.0);
    }
}
