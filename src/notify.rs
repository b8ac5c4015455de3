//! User-visible notices and the status line.

use console::style;
use indicatif::ProgressBar;

use crate::json_output::JsonMessage;
use crate::utils::create_progress_bar;

/// Receives the messages a host would show as toasts and in its status bar
pub trait Notifier {
    /// Transient message after each processed file
    fn notice(&mut self, message: &str);

    /// Persistent status text (running total)
    fn status(&mut self, text: &str);

    /// A batch of `total` supported images is about to be processed
    fn begin_batch(&mut self, _total: usize) {}

    /// One file of the batch finished
    fn advance(&mut self, _name: &str) {}

    fn finish_batch(&mut self) {}
}

/// Styled console output with a progress bar for multi-file batches
#[derive(Default)]
pub struct ConsoleNotifier {
    progress: Option<ProgressBar>,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn print(&self, line: String) {
        match &self.progress {
            Some(pb) => pb.println(line),
            None => eprintln!("{}", line),
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn notice(&mut self, message: &str) {
        self.print(format!("{} {}", style("✓").green().bold(), message));
    }

    fn status(&mut self, text: &str) {
        self.print(format!("{}", style(text).bold().cyan()));
    }

    fn begin_batch(&mut self, total: usize) {
        if total > 1 {
            let pb = create_progress_bar(total as u64);
            pb.set_message("Recompressing");
            self.progress = Some(pb);
        }
    }

    fn advance(&mut self, name: &str) {
        if let Some(pb) = &self.progress {
            pb.inc(1);
            pb.set_message(name.to_string());
        }
    }

    fn finish_batch(&mut self) {
        if let Some(pb) = self.progress.take() {
            pb.finish_and_clear();
        }
    }
}

/// JSON-lines output for scripts and editor integrations
#[derive(Debug, Default)]
pub struct JsonNotifier;

impl Notifier for JsonNotifier {
    fn notice(&mut self, message: &str) {
        JsonMessage::Notice {
            message: message.to_string(),
        }
        .emit();
    }

    fn status(&mut self, text: &str) {
        JsonMessage::Status {
            text: text.to_string(),
        }
        .emit();
    }
}

/// Collects everything, used by tests and library callers that render later
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    pub notices: Vec<String>,
    pub statuses: Vec<String>,
    pub batches: Vec<usize>,
}

impl Notifier for RecordingNotifier {
    fn notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn status(&mut self, text: &str) {
        self.statuses.push(text.to_string());
    }

    fn begin_batch(&mut self, total: usize) {
        self.batches.push(total);
    }
}
