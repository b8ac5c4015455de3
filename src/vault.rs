//! Writing attachments into a vault directory and linking them from notes.

use anyhow::{Context, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::cli::LinkStyle;

/// Characters that break a markdown link target or change its meaning
const LINK_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'(')
    .add(b')')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'`');

/// A file written into the vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultFile {
    /// Absolute (or vault-rooted) location on disk
    pub path: PathBuf,
    /// Path relative to the vault root, `/`-separated
    pub vault_path: String,
    /// Final on-disk size in bytes
    pub size: u64,
}

impl VaultFile {
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// File-system operations the interceptor needs from its host
pub trait Vault {
    /// Collision-free destination for a new attachment called `filename`
    fn available_path_for_attachment(&self, filename: &str) -> Result<PathBuf>;

    /// Write `bytes` to `path` and report the final on-disk size
    fn create_binary(&mut self, path: &Path, bytes: &[u8]) -> Result<VaultFile>;

    /// Embed link for `file`, as it should appear inside `source_note`
    fn markdown_link(&self, file: &VaultFile, source_note: Option<&Path>) -> String;

    /// Insert `link` into `note` at the cursor (the end of the note)
    fn insert_link(&mut self, note: &Path, link: &str) -> Result<()>;
}

/// Vault backed by a directory on disk
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
    attachment_folder: PathBuf,
    link_style: LinkStyle,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            attachment_folder: PathBuf::new(),
            link_style: LinkStyle::Wiki,
        }
    }

    /// Attachment folder, relative to the vault root
    pub fn with_attachment_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.attachment_folder = folder.into();
        self
    }

    pub fn with_link_style(mut self, link_style: LinkStyle) -> Self {
        self.link_style = link_style;
        self
    }

    fn attachment_dir(&self) -> PathBuf {
        if self.attachment_folder.as_os_str().is_empty() {
            self.root.clone()
        } else {
            self.root.join(&self.attachment_folder)
        }
    }

    fn relative_to_root(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl Vault for FsVault {
    fn available_path_for_attachment(&self, filename: &str) -> Result<PathBuf> {
        let dir = self.attachment_dir();
        let candidate = dir.join(filename);
        if !candidate.exists() {
            return Ok(candidate);
        }

        let as_path = Path::new(filename);
        let stem = as_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        let extension = as_path.extension().and_then(|e| e.to_str());

        for index in 1..=u32::MAX {
            let name = match extension {
                Some(ext) => format!("{} {}.{}", stem, index, ext),
                None => format!("{} {}", stem, index),
            };
            let candidate = dir.join(name);
            if !candidate.exists() {
                return Ok(candidate);
            }
        }

        Err(anyhow::anyhow!(
            "No free attachment name left for '{}' in {}",
            filename,
            dir.display()
        ))
    }

    fn create_binary(&mut self, path: &Path, bytes: &[u8]) -> Result<VaultFile> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create attachment folder: {}", parent.display()))?;
        }

        // create_new: never clobber a file that appeared after the path was resolved
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("Failed to create attachment: {}", path.display()))?;

        if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(path);
            return Err(e).with_context(|| format!("Failed to write attachment: {}", path.display()));
        }

        let size = fs::metadata(path)
            .with_context(|| format!("Failed to stat attachment: {}", path.display()))?
            .len();

        Ok(VaultFile {
            path: path.to_path_buf(),
            vault_path: self.relative_to_root(path),
            size,
        })
    }

    fn markdown_link(&self, file: &VaultFile, source_note: Option<&Path>) -> String {
        match self.link_style {
            LinkStyle::Wiki => format!("![[{}]]", file.vault_path),
            LinkStyle::Markdown => {
                let target = source_note
                    .and_then(|note| note_relative_target(note, &file.path))
                    .unwrap_or_else(|| file.vault_path.split('/').map(String::from).collect());
                format!("![{}]({})", file.name(), encode_link_target(&target))
            }
        }
    }

    fn insert_link(&mut self, note: &Path, link: &str) -> Result<()> {
        if let Some(parent) = note.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create note folder: {}", parent.display()))?;
            }
        }

        let needs_newline = match fs::read(note) {
            Ok(contents) => !contents.is_empty() && !contents.ends_with(b"\n"),
            Err(_) => false,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(note)
            .with_context(|| format!("Failed to open note: {}", note.display()))?;

        if needs_newline {
            file.write_all(b"\n")?;
        }
        writeln!(file, "{}", link)
            .with_context(|| format!("Failed to insert link into note: {}", note.display()))?;

        Ok(())
    }
}

/// Path segments leading from the folder of `note` to `target`
fn note_relative_target(note: &Path, target: &Path) -> Option<Vec<String>> {
    let from = normalize(note.parent()?)?;
    let to = normalize(target)?;

    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut segments: Vec<String> = vec!["..".to_string(); from.len() - common];
    segments.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    Some(segments)
}

/// Absolute form of `path` with `.` and `..` resolved lexically
fn normalize(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Some(normalized)
}

fn encode_link_target(segments: &[String]) -> String {
    segments
        .iter()
        .map(|segment| utf8_percent_encode(segment, LINK_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}
