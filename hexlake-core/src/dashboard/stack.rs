//! Multi-criteria stacking.
//!
//! Each criterion contributes `value * weight` to a hexagon; a stacked column
//! draws one segment per criterion, in order, each starting where the previous
//! one ended. Renderers that draw one extruded layer per criterion need the
//! cumulative top of every layer and usually draw the tallest first, so both
//! the bottom-up and top-down orders are exposed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dashboard::color::Rgb;
use crate::dashboard::filter::Slider;
use crate::types::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    /// Column holding the criterion's value.
    pub key: String,
    pub label: String,
    pub color: Rgb,
    /// Key of the weight applied to this criterion.
    pub weight_key: String,
}

impl Criterion {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        color: Rgb,
        weight_key: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            color,
            weight_key: weight_key.into(),
        }
    }
}

/// User-adjustable weights. A missing weight counts as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Weights(HashMap<String, f64>);

impl Weights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weights initialized from slider defaults.
    pub fn from_sliders(sliders: &[Slider]) -> Self {
        Self(
            sliders
                .iter()
                .map(|slider| (slider.key.clone(), slider.default))
                .collect(),
        )
    }

    pub fn set(&mut self, key: impl Into<String>, weight: f64) {
        self.0.insert(key.into(), weight);
    }

    pub fn get(&self, key: &str) -> f64 {
        self.0
            .get(key)
            .copied()
            .filter(|w| w.is_finite())
            .unwrap_or(0.0)
    }
}

/// One criterion's slice of a stacked column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackSegment {
    /// Position of the criterion in the stack, bottom first.
    pub index: usize,
    /// Cumulative height below this segment.
    pub base: f64,
    /// Cumulative height including this segment.
    pub top: f64,
}

impl StackSegment {
    pub fn height(&self) -> f64 {
        self.top - self.base
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaStack {
    criteria: Vec<Criterion>,
}

impl CriteriaStack {
    pub fn new(criteria: Vec<Criterion>) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// Weighted contribution of one criterion; non-numeric cells count as zero.
    fn contribution(criterion: &Criterion, row: &Row, weights: &Weights) -> f64 {
        let value = row
            .f64(&criterion.key)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0);
        value * weights.get(&criterion.weight_key)
    }

    /// Running sums bottom-up: entry `i` is the sum of contributions `0..=i`.
    pub fn cumulative(&self, row: &Row, weights: &Weights) -> Vec<f64> {
        let mut sum = 0.0;
        self.criteria
            .iter()
            .map(|criterion| {
                sum += Self::contribution(criterion, row, weights);
                sum
            })
            .collect()
    }

    /// Top of the layer at `index`; zero past the end of the stack.
    pub fn elevation(&self, row: &Row, weights: &Weights, index: usize) -> f64 {
        match self.criteria.get(..=index) {
            Some(layers) => layers
                .iter()
                .map(|criterion| Self::contribution(criterion, row, weights))
                .sum(),
            None => 0.0,
        }
    }

    /// Total stacked height.
    pub fn total(&self, row: &Row, weights: &Weights) -> f64 {
        self.cumulative(row, weights).last().copied().unwrap_or(0.0)
    }

    /// Segments bottom-up with their base offsets.
    pub fn segments(&self, row: &Row, weights: &Weights) -> Vec<StackSegment> {
        let mut base = 0.0;
        self.cumulative(row, weights)
            .into_iter()
            .enumerate()
            .map(|(index, top)| {
                let segment = StackSegment { index, base, top };
                base = top;
                segment
            })
            .collect()
    }

    /// Criteria top-down, the order layers are emitted in for rendering.
    pub fn layers_top_down(&self) -> impl Iterator<Item = (usize, &Criterion)> {
        self.criteria.iter().enumerate().rev()
    }

    /// Bit patterns of the effective weights, in stack order. The signature
    /// differs whenever any weight this stack reads differs, so callers can
    /// tell when elevations need recomputing.
    pub fn weights_signature(&self, weights: &Weights) -> Vec<u64> {
        self.criteria
            .iter()
            .map(|criterion| weights.get(&criterion.weight_key).to_bits())
            .collect()
    }
}
