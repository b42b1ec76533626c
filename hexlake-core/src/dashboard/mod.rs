//! Row-level helpers for the map dashboards: color ramps, stacked
//! multi-criteria elevations, tooltips, sliders and summary statistics.

pub mod color;
pub mod filter;
pub mod format;
pub mod stack;
pub mod stats;
pub mod tooltip;

pub use color::{color_for, BinnedRamp, ColorScale, Rgb, Rgba, ThresholdRamp};
pub use filter::{at_least, matches_year, Slider};
pub use format::{format_fixed, format_number};
pub use stack::{CriteriaStack, Criterion, StackSegment, Weights};
pub use stats::{mean_of, min_max_positive};
pub use tooltip::{build_tooltip, Tooltip, TooltipField};
