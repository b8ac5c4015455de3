use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumIter, EnumString};

/// Image transform applied to every intercepted image
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    ValueEnum,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Algorithm {
    /// Luminance-only JPEG (single channel)
    #[value(name = "greyscale")]
    Greyscale,
    /// Two-colour palette reduction, then JPEG
    #[value(name = "quantize")]
    Quantize,
    /// Plain JPEG re-encode at the configured quality
    #[value(name = "compress")]
    Compress,
    /// RGB565 ordered dither, then JPEG
    #[value(name = "dither")]
    Dither,
}

/// How links to written attachments are rendered into notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LinkStyle {
    /// Wiki embed: ![[image.jpg]]
    #[value(name = "wiki")]
    Wiki,
    /// Markdown embed: ![image.jpg](path/to/image.jpg)
    #[value(name = "markdown")]
    Markdown,
}

#[derive(Parser, Debug)]
#[command(
    name = "dull",
    version,
    about = "Recompress images dropped or pasted into a markdown vault",
    long_about = "
Dull - vault image recompressor

Intercepts images on their way into a markdown vault, runs them through a
filter (greyscale, quantize, compress or dither), writes the JPEG result
into the vault's attachment folder, links it into a note and keeps a
running total of the bytes saved.

Example Usage:
  # Drop two screenshots into the vault and link them into today's note
  dull --vault ~/Notes drop shot1.png shot2.png --note ~/Notes/daily/today.md

  # Drop a whole folder and print a savings table
  dull --vault ~/Notes drop ~/Pictures/export --report

  # Paste clipboard bytes (e.g. from wl-paste or pbpaste)
  wl-paste -t image/png | dull --vault ~/Notes paste --note ~/Notes/inbox.md

  # Switch to greyscale at quality 30
  dull --vault ~/Notes settings --algorithm greyscale --quality 30

  # Show the running total
  dull --vault ~/Notes status"
)]
pub struct Args {
    /// Root directory of the vault
    #[arg(long = "vault", global = true, default_value = ".", value_name = "DIR")]
    pub vault: PathBuf,

    /// Settings file (defaults to <vault>/.dull/data.json)
    #[arg(long = "settings", global = true, value_name = "FILE")]
    pub settings_path: Option<PathBuf>,

    /// Folder inside the vault where attachments are written (vault root if omitted)
    #[arg(long = "attachment-folder", global = true, value_name = "DIR")]
    pub attachment_folder: Option<PathBuf>,

    /// Link style used when embedding written images into notes
    #[arg(long = "link-style", global = true, default_value = "wiki")]
    pub link_style: LinkStyle,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Emit JSON lines instead of styled console output
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drop image files (or directories of images) into the vault
    Drop(DropArgs),
    /// Paste image bytes read from stdin into the vault
    Paste(PasteArgs),
    /// Show or change the algorithm and quality
    Settings(SettingsArgs),
    /// Enable or disable interception
    Toggle,
    /// Reset the bytes-saved counter to zero
    Reset,
    /// Print the running bytes-saved total
    Status,
}

#[derive(ClapArgs, Debug, Default)]
pub struct DropArgs {
    /// Files or directories to drop
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Note that receives the generated links
    #[arg(long = "note", value_name = "FILE")]
    pub note: Option<PathBuf>,

    /// Display a table of per-file savings at the end
    #[arg(long = "report")]
    pub report: bool,
}

#[derive(ClapArgs, Debug, Default)]
pub struct PasteArgs {
    /// Name of the pasted file (a timestamped name is generated otherwise)
    #[arg(long = "name", value_name = "NAME")]
    pub name: Option<String>,

    /// MIME type of the pasted bytes (sniffed from the content otherwise)
    #[arg(long = "mime", value_name = "TYPE")]
    pub mime: Option<String>,

    /// Note that receives the generated link
    #[arg(long = "note", value_name = "FILE")]
    pub note: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Default)]
pub struct SettingsArgs {
    /// Algorithm used on intercepted images
    #[arg(short = 'a', long = "algorithm")]
    pub algorithm: Option<Algorithm>,

    /// JPEG quality (1-100)
    #[arg(short = 'q', long = "quality", value_name = "1-100")]
    pub quality: Option<u8>,
}

impl Args {
    /// Settings file location, falling back to the per-vault default
    pub fn settings_file(&self) -> PathBuf {
        match &self.settings_path {
            Some(path) => path.clone(),
            None => default_settings_path(&self.vault),
        }
    }
}

/// `<vault>/.dull/data.json`
pub fn default_settings_path(vault: &Path) -> PathBuf {
    vault.join(".dull").join("data.json")
}
