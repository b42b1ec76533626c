//! Value-to-color lookups for hexagon fills.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type Rgb = [u8; 3];
pub type Rgba = [u8; 4];

pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

const GLOBAL_WARMING: [Rgb; 6] = [
    [76, 0, 53],
    [136, 0, 48],
    [183, 47, 21],
    [214, 97, 10],
    [239, 145, 0],
    [255, 195, 0],
];

const BLUES: [Rgb; 6] = [
    [8, 48, 107],
    [8, 81, 156],
    [33, 113, 181],
    [66, 146, 198],
    [107, 174, 214],
    [158, 202, 225],
];

const GREENS: [Rgb; 6] = [
    [0, 68, 27],
    [0, 109, 44],
    [35, 139, 69],
    [65, 171, 93],
    [116, 196, 118],
    [161, 217, 155],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScale {
    #[default]
    GlobalWarming,
    Blues,
    Greens,
}

impl ColorScale {
    pub fn stops(self) -> &'static [Rgb] {
        match self {
            Self::GlobalWarming => &GLOBAL_WARMING,
            Self::Blues => &BLUES,
            Self::Greens => &GREENS,
        }
    }
}

impl FromStr for ColorScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "globalWarming" | "global_warming" => Ok(Self::GlobalWarming),
            "blues" => Ok(Self::Blues),
            "greens" => Ok(Self::Greens),
            other => Err(format!("unknown color scale: {other}")),
        }
    }
}

fn with_alpha(rgb: Rgb, alpha: u8) -> Rgba {
    [rgb[0], rgb[1], rgb[2], alpha]
}

/// Stop of `scale` for `value` within `[min, max]`.
///
/// Missing, zero or non-finite values and a degenerate range map to the
/// first stop. Out-of-range values clamp.
pub fn color_for(value: Option<f64>, min: f64, max: f64, scale: ColorScale, alpha: u8) -> Rgba {
    let stops = scale.stops();
    let first = with_alpha(stops[0], alpha);
    let Some(value) = value.filter(|v| *v != 0.0 && v.is_finite()) else {
        return first;
    };
    let span = max - min;
    if !span.is_finite() || span <= 0.0 {
        return first;
    }
    let normalized = ((value - min) / span).clamp(0.0, 1.0);
    let index = ((normalized * stops.len() as f64).floor() as usize).min(stops.len() - 1);
    with_alpha(stops[index], alpha)
}

/// `(value - lo) / (hi - lo)` clamped to `[0, 1]`; zero for a degenerate range.
pub fn normalize(value: f64, lo: f64, hi: f64) -> f64 {
    let span = hi - lo;
    if !span.is_finite() || span <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    ((value - lo) / span).clamp(0.0, 1.0)
}

/// `value / max * scale`, zero when `max` is not positive.
pub fn relative_to_max(value: f64, max: f64, scale: f64) -> f64 {
    if max <= 0.0 || !max.is_finite() || !value.is_finite() {
        return 0.0;
    }
    value / max * scale
}

/// Bin index of `value` when `[min, max]` is split into `bins` equal steps.
/// The maximum falls in the last bin.
pub fn normalized_bin(value: f64, min: f64, max: f64, bins: usize) -> usize {
    if bins == 0 {
        return 0;
    }
    let n = normalize(value, min, max);
    ((n * bins as f64).floor() as usize).min(bins - 1)
}

/// Fixed-threshold ramp: the first bin whose upper bound exceeds the value wins.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRamp {
    bins: Vec<(f64, Rgba)>,
    overflow: Rgba,
}

impl ThresholdRamp {
    /// `bins` must be sorted by ascending upper bound.
    pub fn new(bins: Vec<(f64, Rgba)>, overflow: Rgba) -> Self {
        Self { bins, overflow }
    }

    /// Ground height in metres, light green to blue.
    pub fn ground_height() -> Self {
        Self::new(
            vec![
                (0.0, [240, 249, 232, 200]),
                (10.0, [204, 235, 197, 220]),
                (20.0, [168, 221, 181, 240]),
                (30.0, [123, 204, 196, 255]),
            ],
            [67, 162, 202, 255],
        )
    }

    pub fn color(&self, value: f64) -> Rgba {
        if value.is_nan() {
            return TRANSPARENT;
        }
        self.bins
            .iter()
            .find(|(upper, _)| value < *upper)
            .map(|(_, color)| *color)
            .unwrap_or(self.overflow)
    }
}

/// Equal-width binned ramp with a separate color for missing or zero values.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedRamp {
    colors: Vec<Rgba>,
    missing: Rgba,
}

impl BinnedRamp {
    pub fn new(colors: Vec<Rgba>, missing: Rgba) -> Self {
        Self { colors, missing }
    }

    /// Blue-purple explorer ramp, five bins, translucent gray when missing.
    pub fn blue_purple() -> Self {
        Self::new(
            vec![
                [237, 248, 251, 180],
                [179, 205, 227, 200],
                [140, 150, 198, 220],
                [136, 86, 167, 240],
                [129, 15, 124, 255],
            ],
            [200, 200, 200, 100],
        )
    }

    pub fn color(&self, value: Option<f64>, min: f64, max: f64) -> Rgba {
        match value {
            Some(v) if v != 0.0 && v.is_finite() && !self.colors.is_empty() => {
                self.colors[normalized_bin(v, min, max, self.colors.len())]
            }
            _ => self.missing,
        }
    }
}
