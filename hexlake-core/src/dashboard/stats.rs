//! Summary statistics over query rows.

use crate::types::Row;

pub fn count(rows: &[Row]) -> usize {
    rows.len()
}

fn numeric<'a>(rows: &'a [Row], column: &'a str) -> impl Iterator<Item = f64> + 'a {
    rows.iter()
        .filter_map(move |row| row.f64(column))
        .filter(|value| value.is_finite())
}

/// Mean over cells that parse as numbers; `None` when there are none.
pub fn mean_of(rows: &[Row], column: &str) -> Option<f64> {
    let (sum, n) = numeric(rows, column).fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Min and max over strictly positive numeric cells.
pub fn min_max_positive(rows: &[Row], column: &str) -> Option<(f64, f64)> {
    numeric(rows, column)
        .filter(|value| *value > 0.0)
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
