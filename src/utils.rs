use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::settings::{MAX_QUALITY, MIN_QUALITY};

/// Image extensions picked up when a directory is dropped
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(progress_style) = ProgressStyle::with_template(
        "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
    ) {
        pb.set_style(progress_style.progress_chars("#>-"));
    }
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate paths handed to `drop`
pub fn validate_inputs(paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        return Err(anyhow::anyhow!("Nothing to drop: no paths given"));
    }

    for input_path in paths {
        if !input_path.exists() {
            return Err(anyhow::anyhow!(
                "Input path does not exist: {}",
                input_path.display()
            ));
        }
        if !input_path.is_dir() && !input_path.is_file() {
            return Err(anyhow::anyhow!(
                "Input path is neither a file nor a directory: {}",
                input_path.display()
            ));
        }
    }

    Ok(())
}

/// Validate a user-supplied JPEG quality
pub fn validate_quality(quality: u8) -> Result<u8> {
    if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
        return Err(anyhow::anyhow!(
            "Quality must be between {} and {}, got: {}",
            MIN_QUALITY,
            MAX_QUALITY,
            quality
        ));
    }
    Ok(quality)
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[&str]) -> bool {
    match get_file_extension(path) {
        Some(ext) => extensions.contains(&ext.as_str()),
        None => false,
    }
}

/// MIME type implied by a file extension
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    match get_file_extension(path)?.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "md" => Some("text/markdown"),
        "txt" => Some("text/plain"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Replace characters that are invalid in vault file names.
/// Consecutive replacements collapse into one underscore.
pub fn sanitize_filename(filename: &str) -> String {
    let mut result = String::with_capacity(filename.len());
    let mut prev_was_underscore = false;

    for ch in filename.chars() {
        let replacement = match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '#' | '^' | '[' | ']' => '_',
            c if c.is_control() => '_',
            c => c,
        };

        if replacement == '_' {
            if !prev_was_underscore {
                result.push('_');
            }
            prev_was_underscore = true;
        } else {
            result.push(replacement);
            prev_was_underscore = false;
        }
    }

    result.trim().trim_matches('_').to_string()
}

/// Milliseconds since the Unix epoch
pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// File name for a written attachment.
///
/// Unnamed pastes become `pasted-image-<millis>`. The extension is always
/// replaced with `jpg` since every transform emits JPEG.
pub fn attachment_filename(name: Option<&str>, millis: u128) -> String {
    let stem = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => sanitize_filename(strip_extension(name)),
        None => format!("pasted-image-{}", millis),
    };

    if stem.is_empty() {
        "image.jpg".to_string()
    } else {
        format!("{}.jpg", stem)
    }
}

/// Drop the last `.ext` of a file name. A leading dot counts too, so `.png`
/// leaves an empty stem.
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(index) => &name[..index],
        None => name,
    }
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        eprintln!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    eprintln!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(1)), "1.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_validate_quality() {
        assert!(validate_quality(0).is_err());
        assert_eq!(validate_quality(1).unwrap(), 1);
        assert_eq!(validate_quality(100).unwrap(), 100);
        assert!(validate_quality(101).is_err());
    }

    #[test]
    fn test_validate_inputs() {
        assert!(validate_inputs(&[]).is_err());
        assert!(validate_inputs(&[PathBuf::from("/definitely/not/here.png")]).is_err());
        assert!(validate_inputs(&[std::env::temp_dir()]).is_ok());
    }

    #[test]
    fn test_extensions_and_mime() {
        assert!(has_valid_extension(Path::new("a/B.JPG"), &IMAGE_EXTENSIONS));
        assert!(!has_valid_extension(Path::new("notes.md"), &IMAGE_EXTENSIONS));
        assert!(!has_valid_extension(Path::new("README"), &IMAGE_EXTENSIONS));

        assert_eq!(mime_from_extension(Path::new("x.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_from_extension(Path::new("x.PNG")), Some("image/png"));
        assert_eq!(mime_from_extension(Path::new("x.zip")), None);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("normal name"), "normal name");
        assert_eq!(sanitize_filename("file/with\\bad:chars"), "file_with_bad_chars");
        assert_eq!(sanitize_filename("[[link]]#frag"), "link_frag");
        assert_eq!(sanitize_filename("a\tb"), "a_b");
        assert_eq!(sanitize_filename("日本語"), "日本語");
    }

    #[test]
    fn test_attachment_filename() {
        assert_eq!(attachment_filename(Some("Screenshot 1.png"), 0), "Screenshot 1.jpg");
        assert_eq!(attachment_filename(Some("photo.jpeg"), 0), "photo.jpg");
        assert_eq!(
            attachment_filename(None, 1700000000000),
            "pasted-image-1700000000000.jpg"
        );
        assert_eq!(attachment_filename(Some("   "), 7), "pasted-image-7.jpg");
        assert_eq!(attachment_filename(Some("???.png"), 0), "image.jpg");
    }

    #[test]
    fn test_attachment_filename_extension_only_names() {
        assert_eq!(attachment_filename(Some(".png"), 0), "image.jpg");
        assert_eq!(attachment_filename(Some("archive.tar.png"), 0), "archive.tar.jpg");
        assert_eq!(attachment_filename(Some("no-extension"), 0), "no-extension.jpg");
    }
}
