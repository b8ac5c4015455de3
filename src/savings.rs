//! Byte-savings accounting and human-readable size formatting.
//!
//! Every processed image yields a [`TransformResult`]. Its delta is added to the
//! running accumulator unchanged: a file that grew produces a negative delta and
//! lowers the total.

use anyhow::{anyhow, Result};
use serde::Serialize;

/// Binary unit ladder, scaled by 1024 per step
pub const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

const TWO_TO_TEN: f64 = 1024.0;

/// Sizes observed for one processed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransformResult {
    pub original_size: u64,
    pub new_size: u64,
}

impl TransformResult {
    pub fn new(original_size: u64, new_size: u64) -> Self {
        Self {
            original_size,
            new_size,
        }
    }

    /// `original - new`, negative when the output grew
    pub fn delta(&self) -> i64 {
        self.original_size as i64 - self.new_size as i64
    }

    /// Integer percent of the original size that was saved, rounded half away from zero.
    /// An empty original reports 0.
    pub fn percent_saved(&self) -> i64 {
        if self.original_size == 0 {
            return 0;
        }
        (self.delta() as f64 / self.original_size as f64 * 100.0).round() as i64
    }

    /// Notice shown after each processed file, e.g. `50000 bytes (25%)`
    pub fn notice_text(&self) -> String {
        format!("{} bytes ({}%)", self.delta(), self.percent_saved())
    }
}

/// Add one file's delta to the accumulator. No clamping; a sum that does not
/// fit in an `i64` is an error and the caller keeps its previous total.
pub fn apply_delta(accumulator: i64, result: &TransformResult) -> Result<i64> {
    accumulator.checked_add(result.delta()).ok_or_else(|| {
        anyhow!(
            "Saved-bytes total {} cannot absorb a delta of {} bytes",
            accumulator,
            result.delta()
        )
    })
}

/// Status line for the running total
pub fn status_text(bytes_saved: i64) -> String {
    format!("Dull: Saved {} total", format_bytes(bytes_saved as f64))
}

/// Format a byte count as `<value> <unit>` with two decimals.
///
/// Scaling stops at YB. Negative values never satisfy `size >= 1024` and are
/// therefore shown in bytes.
pub fn format_bytes(bytes: f64) -> String {
    let mut size = bytes;
    let mut unit_index = 0;

    while size >= TWO_TO_TEN && unit_index < UNITS.len() - 1 {
        size /= TWO_TO_TEN;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}
