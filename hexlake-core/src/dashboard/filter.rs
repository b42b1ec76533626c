//! Slider definitions and row predicates.

use serde::{Deserialize, Serialize};

use crate::types::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slider {
    pub key: String,
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

impl Slider {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        min: f64,
        max: f64,
        step: f64,
        default: f64,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            min,
            max,
            step,
            default,
        }
    }

    /// Year slider over the range covered by the dataset.
    pub fn year(min: i64, max: i64, default: i64) -> Self {
        Self::new("year", "Year", min as f64, max as f64, 1.0, default as f64)
    }

    /// Lower and upper bound, in order even when `min > max`.
    fn bounds(&self) -> (f64, f64) {
        if self.max < self.min {
            (self.max, self.min)
        } else {
            (self.min, self.max)
        }
    }

    /// Clamp into the slider's range. NaN falls back to the default; a NaN
    /// bound leaves that side open.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.default;
        }
        let (lo, hi) = self.bounds();
        value.max(lo).min(hi)
    }

    /// Clamp, then round to the nearest step counted from the lower bound.
    pub fn snap(&self, value: f64) -> f64 {
        let value = self.clamp(value);
        let (lo, hi) = self.bounds();
        if self.step <= 0.0 || !self.step.is_finite() || !lo.is_finite() {
            return value;
        }
        let steps = ((value - lo) / self.step).round();
        (lo + steps * self.step).min(hi)
    }
}

/// True when `column` holds a number `>= threshold`.
pub fn at_least(row: &Row, column: &str, threshold: f64) -> bool {
    row.f64(column)
        .is_some_and(|value| !value.is_nan() && value >= threshold)
}

/// True when `column` holds `year`, after rounding.
pub fn matches_year(row: &Row, column: &str, year: i64) -> bool {
    row.f64(column)
        .is_some_and(|value| value.is_finite() && value.round() as i64 == year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scalar;

    #[test]
    fn clamp_and_snap() {
        let slider = Slider::new("min_height", "Min Height", -10.0, 40.0, 0.5, -10.0);
        assert_eq!(slider.clamp(-50.0), -10.0);
        assert_eq!(slider.clamp(100.0), 40.0);
        assert_eq!(slider.clamp(f64::NAN), -10.0);
        assert_eq!(slider.snap(3.3), 3.5);
        assert_eq!(slider.snap(3.2), 3.0);
        assert_eq!(slider.snap(99.0), 40.0);
    }

    #[test]
    fn inverted_bounds_are_reordered() {
        let slider = Slider::new("w_verzilting", "Verzilting Weight", 10.0, 0.0, 1.0, 5.0);
        assert_eq!(slider.clamp(3.0), 3.0);
        assert_eq!(slider.clamp(-2.0), 0.0);
        assert_eq!(slider.clamp(12.0), 10.0);
        assert_eq!(slider.snap(3.4), 3.0);
        assert_eq!(slider.snap(99.0), 10.0);
    }

    #[test]
    fn nan_bounds_do_not_panic() {
        let slider = Slider::new("w", "Weight", f64::NAN, 10.0, 1.0, 5.0);
        assert_eq!(slider.clamp(12.0), 10.0);
        assert_eq!(slider.clamp(-3.0), -3.0);
        assert_eq!(slider.snap(-3.0), -3.0);
    }

    #[test]
    fn year_slider_snaps_to_whole_years() {
        let slider = Slider::year(2015, 2023, 2021);
        assert_eq!(slider.default, 2021.0);
        assert_eq!(slider.snap(2018.6), 2019.0);
        assert_eq!(slider.snap(1990.0), 2015.0);
    }

    #[test]
    fn at_least_ignores_missing_and_text() {
        let row = Row::from_pairs([
            ("maaiveldhoogte", Scalar::Float(12.5)),
            ("label", Scalar::from("high")),
            ("empty", Scalar::Null),
        ]);
        assert!(at_least(&row, "maaiveldhoogte", 12.5));
        assert!(!at_least(&row, "maaiveldhoogte", 13.0));
        assert!(!at_least(&row, "label", 0.0));
        assert!(!at_least(&row, "empty", -100.0));
        assert!(!at_least(&row, "absent", -100.0));
    }

    #[test]
    fn matches_year_rounds_numeric_cells() {
        let row = Row::from_pairs([
            ("year_int", Scalar::Int(2021)),
            ("year_float", Scalar::Float(2021.0)),
            ("year_text", Scalar::from("2022")),
        ]);
        assert!(matches_year(&row, "year_int", 2021));
        assert!(matches_year(&row, "year_float", 2021));
        assert!(matches_year(&row, "year_text", 2022));
        assert!(!matches_year(&row, "year_int", 2022));
    }
}
