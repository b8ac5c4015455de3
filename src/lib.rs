// Library exports for reuse by the CLI and editor integrations
pub mod cli;
pub mod events;
pub mod image_processing;
pub mod interceptor;
pub mod json_output;
pub mod notify;
pub mod report;
pub mod savings;
pub mod settings;
pub mod utils;
pub mod vault;

// Re-export commonly used types
pub use cli::{Algorithm, LinkStyle};
pub use events::{ImageEvent, IncomingFile};
pub use image_processing::{run_transform, transform_for, TransformFn};
pub use interceptor::{EventOutcome, Interceptor, PassReason, ProcessedImage};
pub use json_output::JsonMessage;
pub use notify::{ConsoleNotifier, JsonNotifier, Notifier};
pub use savings::{apply_delta, format_bytes, TransformResult};
pub use settings::{JsonSettingsStore, Settings, SettingsStore};
pub use vault::{FsVault, Vault, VaultFile};
