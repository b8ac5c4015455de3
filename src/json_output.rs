//! JSON output for editor integration
//!
//! When --json is enabled, notices, per-file results and the final summary are
//! emitted as JSON lines to stdout, suppressing all styled output.

use serde::Serialize;

use crate::settings::Settings;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonMessage {
    /// Transient per-file message
    Notice { message: String },
    /// Running total status line
    Status { text: String },
    /// One image written to the vault
    Processed {
        input: String,
        output: String,
        link: String,
        original_size: u64,
        new_size: u64,
        delta: i64,
        percent: i64,
    },
    /// Event left to default handling
    Passthrough { event: String, reason: String },
    /// Current settings
    Settings { settings: Settings },
    /// End of an event
    Summary {
        processed: usize,
        batch_bytes_saved: i64,
        total_bytes_saved: i64,
        total_human: String,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }
}
