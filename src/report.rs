//! Savings report for a processed batch
//!
//! Prints one row per written attachment plus a totals row, using the same
//! unit ladder as the status line.

use prettytable::{format, Cell, Row, Table};

use crate::interceptor::ProcessedImage;
use crate::savings::format_bytes;

/// Single row of the report
#[derive(Debug, Clone)]
pub struct SavingsEntry {
    pub input_filename: String,
    pub output_filename: String,
    pub original_size: u64,
    pub new_size: u64,
    pub delta: i64,
    pub percent: i64,
}

impl From<&ProcessedImage> for SavingsEntry {
    fn from(image: &ProcessedImage) -> Self {
        Self {
            input_filename: image.input_name.clone(),
            output_filename: image.file.vault_path.clone(),
            original_size: image.result.original_size,
            new_size: image.result.new_size,
            delta: image.result.delta(),
            percent: image.result.percent_saved(),
        }
    }
}

/// Complete batch report
#[derive(Debug, Default)]
pub struct SavingsReport {
    pub entries: Vec<SavingsEntry>,
}

impl SavingsReport {
    pub fn from_images(images: &[ProcessedImage]) -> Self {
        Self {
            entries: images.iter().map(SavingsEntry::from).collect(),
        }
    }

    pub fn total_original(&self) -> u64 {
        self.entries.iter().map(|e| e.original_size).sum()
    }

    pub fn total_new(&self) -> u64 {
        self.entries.iter().map(|e| e.new_size).sum()
    }

    pub fn total_delta(&self) -> i64 {
        self.entries.iter().map(|e| e.delta).sum()
    }

    /// Build the table without printing it
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);

        table.add_row(Row::new(vec![
            Cell::new("Input"),
            Cell::new("Output"),
            Cell::new("Original"),
            Cell::new("New"),
            Cell::new("Saved"),
            Cell::new("%"),
        ]));

        for entry in &self.entries {
            table.add_row(Row::new(vec![
                Cell::new(&truncate(&entry.input_filename, 25)),
                Cell::new(&truncate(&entry.output_filename, 30)),
                Cell::new(&format_bytes(entry.original_size as f64)),
                Cell::new(&format_bytes(entry.new_size as f64)),
                Cell::new(&format_bytes(entry.delta as f64)),
                Cell::new(&format!("{}%", entry.percent)),
            ]));
        }

        let total_original = self.total_original();
        let total_percent = if total_original == 0 {
            0
        } else {
            (self.total_delta() as f64 / total_original as f64 * 100.0).round() as i64
        };

        table.add_row(Row::new(vec![
            Cell::new("Total"),
            Cell::new(&format!("{} file(s)", self.entries.len())),
            Cell::new(&format_bytes(total_original as f64)),
            Cell::new(&format_bytes(self.total_new() as f64)),
            Cell::new(&format_bytes(self.total_delta() as f64)),
            Cell::new(&format!("{}%", total_percent)),
        ]));

        table
    }

    /// Print the report as a formatted table
    pub fn print(&self) {
        if self.entries.is_empty() {
            return;
        }
        println!();
        self.table().printstd();
        println!();
    }
}

/// Truncate string to fit in column
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{}…", kept)
    }
}
