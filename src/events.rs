//! Drop and paste payloads handed to the interceptor.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::utils::{has_valid_extension, mime_from_extension, verbose_println, IMAGE_EXTENSIONS};

/// MIME prefixes the interceptor recompresses
pub const SUPPORTED_MIME_PREFIXES: [&str; 2] = ["image/jpeg", "image/png"];

/// Where the bytes of an incoming file live
#[derive(Debug, Clone)]
enum FileSource {
    Memory(Vec<u8>),
    Path(PathBuf),
}

/// A file-like item carried by a drop or paste event
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Empty for anonymous clipboard data
    pub name: String,
    pub mime: String,
    pub size: u64,
    source: FileSource,
}

impl IncomingFile {
    pub fn from_bytes(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Describe a file on disk. The MIME type is sniffed from the first bytes
    /// and falls back to the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to stat dropped file: {}", path.display()))?;

        let mime = sniff_mime_from_file(path)
            .or_else(|| mime_from_extension(path).map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            name,
            mime,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Whether this item is an image the interceptor handles
    pub fn is_supported_image(&self) -> bool {
        SUPPORTED_MIME_PREFIXES
            .iter()
            .any(|prefix| self.mime.starts_with(prefix))
    }

    /// Load the full contents
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => fs::read(path)
                .with_context(|| format!("Failed to read dropped file: {}", path.display())),
        }
    }
}

/// Sniff an image MIME type from raw bytes
pub fn sniff_mime(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}

fn sniff_mime_from_file(path: &Path) -> Option<String> {
    use std::io::Read;

    let mut header = [0u8; 32];
    let mut file = fs::File::open(path).ok()?;
    let read = file.read(&mut header).ok()?;
    sniff_mime(&header[..read])
}

/// An intercepted host event
#[derive(Debug, Clone)]
pub enum ImageEvent {
    Drop(Vec<IncomingFile>),
    Paste(Vec<IncomingFile>),
}

impl ImageEvent {
    pub fn files(&self) -> &[IncomingFile] {
        match self {
            ImageEvent::Drop(files) | ImageEvent::Paste(files) => files,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImageEvent::Drop(_) => "drop",
            ImageEvent::Paste(_) => "paste",
        }
    }
}

/// Build the files of a drop event from paths on disk. Directories are walked
/// and only image extensions are picked up inside them; explicitly named
/// files are passed through as-is.
pub fn collect_dropped_files(paths: &[PathBuf], verbose: bool) -> Result<Vec<IncomingFile>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            verbose_println(verbose, &format!("Scanning directory: {}", path.display()));

            let mut found = Vec::new();
            for entry in WalkDir::new(path).follow_links(false).max_depth(10) {
                let entry = entry.context("Failed to read directory entry")?;
                let entry_path = entry.path();
                if entry_path.is_file() && has_valid_extension(entry_path, &IMAGE_EXTENSIONS) {
                    found.push(entry_path.to_path_buf());
                }
            }

            // Sort for consistent processing order
            found.sort();
            for image_path in found {
                files.push(IncomingFile::from_path(&image_path)?);
            }
        } else {
            files.push(IncomingFile::from_path(path)?);
        }
    }

    verbose_println(verbose, &format!("Collected {} dropped files", files.len()));
    Ok(files)
}
