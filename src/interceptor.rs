//! The interceptor owns the settings and turns drop/paste events into
//! recompressed vault attachments.
//!
//! Each supported image goes through the same steps: read, transform,
//! write, link, account, persist, notify. Any error aborts the rest of the
//! event and leaves the accumulator exactly as it was after the last file
//! that completed. Files finished before the error are still reported through
//! [`EventOutcome::Interrupted`].

use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::Algorithm;
use crate::events::{ImageEvent, IncomingFile};
use crate::image_processing::{transform_for, TransformFn};
use crate::notify::Notifier;
use crate::savings::{apply_delta, status_text, TransformResult};
use crate::settings::{Settings, SettingsStore};
use crate::utils::{attachment_filename, unix_millis, validate_quality, verbose_println};
use crate::vault::{Vault, VaultFile};

/// One image written to the vault
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub input_name: String,
    pub file: VaultFile,
    pub link: String,
    pub result: TransformResult,
}

/// Why an event was left to default handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    Disabled,
    NoFiles,
    NoSupportedImages,
}

impl PassReason {
    pub fn describe(&self) -> &'static str {
        match self {
            PassReason::Disabled => "interception is disabled",
            PassReason::NoFiles => "no files in the payload",
            PassReason::NoSupportedImages => "no JPEG or PNG images in the payload",
        }
    }
}

/// Result of handling one event
#[derive(Debug)]
pub enum EventOutcome {
    /// Default handling stays in place
    PassThrough(PassReason),
    /// Default handling was prevented; these images were written
    Handled(Vec<ProcessedImage>),
    /// Default handling was prevented, then a later file failed. `images` were
    /// written and accounted before `error` stopped the event.
    Interrupted {
        images: Vec<ProcessedImage>,
        error: anyhow::Error,
    },
}

impl EventOutcome {
    pub fn is_handled(&self) -> bool {
        !matches!(self, EventOutcome::PassThrough(_))
    }
}

pub struct Interceptor<S: SettingsStore, V: Vault> {
    settings: Settings,
    store: S,
    vault: V,
    transforms: fn(Algorithm) -> TransformFn,
    verbose: bool,
}

impl<S: SettingsStore, V: Vault> Interceptor<S, V> {
    /// Load the persisted settings over the defaults and take ownership of them
    pub fn activate(store: S, vault: V) -> Result<Self> {
        let persisted = store.load().context("Failed to load settings")?;
        Ok(Self {
            settings: Settings::merged(persisted),
            store,
            vault,
            transforms: transform_for,
            verbose: false,
        })
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Replace the algorithm-to-transform mapping
    pub fn with_transforms(mut self, transforms: fn(Algorithm) -> TransformFn) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status_text(&self) -> String {
        status_text(self.settings.bytes_saved)
    }

    pub fn handle_drop(
        &mut self,
        files: Vec<IncomingFile>,
        note: Option<&Path>,
        notifier: &mut dyn Notifier,
    ) -> Result<EventOutcome> {
        self.handle_event(&ImageEvent::Drop(files), note, notifier)
    }

    pub fn handle_paste(
        &mut self,
        files: Vec<IncomingFile>,
        note: Option<&Path>,
        notifier: &mut dyn Notifier,
    ) -> Result<EventOutcome> {
        self.handle_event(&ImageEvent::Paste(files), note, notifier)
    }

    /// Process every supported image of the event in order.
    ///
    /// The event passes through untouched when interception is disabled or
    /// when it carries no supported image. Unsupported files inside a handled
    /// event are skipped. A failure on the first image is returned as `Err`;
    /// a failure after some images were written yields `Interrupted`.
    pub fn handle_event(
        &mut self,
        event: &ImageEvent,
        note: Option<&Path>,
        notifier: &mut dyn Notifier,
    ) -> Result<EventOutcome> {
        if !self.settings.enabled {
            verbose_println(self.verbose, &format!("Ignoring {}: disabled", event.kind()));
            return Ok(EventOutcome::PassThrough(PassReason::Disabled));
        }

        let files = event.files();
        if files.is_empty() {
            return Ok(EventOutcome::PassThrough(PassReason::NoFiles));
        }

        let supported = files.iter().filter(|f| f.is_supported_image()).count();
        if supported == 0 {
            verbose_println(
                self.verbose,
                &format!("Ignoring {}: {} file(s), none supported", event.kind(), files.len()),
            );
            return Ok(EventOutcome::PassThrough(PassReason::NoSupportedImages));
        }

        notifier.begin_batch(supported);
        let mut processed = Vec::with_capacity(supported);
        for file in files {
            match self.process_image(file, note, notifier) {
                Ok(Some(image)) => {
                    notifier.advance(&image.input_name);
                    processed.push(image);
                }
                Ok(None) => {}
                Err(error) => {
                    notifier.finish_batch();
                    if processed.is_empty() {
                        return Err(error);
                    }
                    return Ok(EventOutcome::Interrupted {
                        images: processed,
                        error,
                    });
                }
            }
        }
        notifier.finish_batch();

        Ok(EventOutcome::Handled(processed))
    }

    /// Recompress a single file. `None` when the file is not a supported image.
    pub fn process_image(
        &mut self,
        file: &IncomingFile,
        note: Option<&Path>,
        notifier: &mut dyn Notifier,
    ) -> Result<Option<ProcessedImage>> {
        if !file.is_supported_image() {
            verbose_println(
                self.verbose,
                &format!("Skipping {} ({})", display_name(file), file.mime),
            );
            return Ok(None);
        }

        verbose_println(
            self.verbose,
            &format!(
                "Processing {} with {} at quality {}",
                display_name(file),
                self.settings.algorithm,
                self.settings.quality
            ),
        );

        let old_bytes = file.read_bytes()?;

        let transform = (self.transforms)(self.settings.algorithm);
        let new_bytes = transform(&old_bytes, self.settings.quality)
            .with_context(|| format!("{} failed on {}", self.settings.algorithm, display_name(file)))?;

        let filename = attachment_filename(Some(&file.name), unix_millis());
        let path = self.vault.available_path_for_attachment(&filename)?;
        let written = self.vault.create_binary(&path, &new_bytes)?;

        let link = self.vault.markdown_link(&written, note);
        if let Some(note) = note {
            self.vault.insert_link(note, &link)?;
        }

        let result = TransformResult::new(file.size, written.size);
        self.settings.bytes_saved = apply_delta(self.settings.bytes_saved, &result)
            .with_context(|| format!("Failed to account for {}", display_name(file)))?;
        self.save()?;

        notifier.notice(&result.notice_text());
        notifier.status(&self.status_text());

        verbose_println(
            self.verbose,
            &format!("Wrote {} ({} -> {} bytes)", written.vault_path, result.original_size, result.new_size),
        );

        Ok(Some(ProcessedImage {
            input_name: display_name(file).to_string(),
            file: written,
            link,
            result,
        }))
    }

    /// Flip the enabled flag and persist it. Returns the new state.
    pub fn toggle_enabled(&mut self) -> Result<bool> {
        self.settings.enabled = !self.settings.enabled;
        self.save()?;
        Ok(self.settings.enabled)
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) -> Result<()> {
        self.settings.algorithm = algorithm;
        self.save()
    }

    pub fn set_quality(&mut self, quality: u8) -> Result<()> {
        self.settings.quality = validate_quality(quality)?;
        self.save()
    }

    pub fn reset_bytes_saved(&mut self) -> Result<()> {
        self.settings.bytes_saved = 0;
        self.save()
    }

    fn save(&mut self) -> Result<()> {
        self.store
            .save(&self.settings)
            .context("Failed to save settings")
    }
}

fn display_name(file: &IncomingFile) -> &str {
    if file.name.is_empty() {
        "pasted image"
    } else {
        &file.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::settings::PersistedSettings;
    use crate::vault::FsVault;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::cell::RefCell;
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// In-memory store that keeps every saved snapshot
    #[derive(Clone, Default)]
    struct MemoryStore {
        initial: Option<String>,
        saved: Rc<RefCell<Vec<Settings>>>,
    }

    impl SettingsStore for MemoryStore {
        fn load(&self) -> Result<Option<PersistedSettings>> {
            match &self.initial {
                Some(json) => Ok(Some(serde_json::from_str(json)?)),
                None => Ok(None),
            }
        }

        fn save(&mut self, settings: &Settings) -> Result<()> {
            self.saved.borrow_mut().push(settings.clone());
            Ok(())
        }
    }

    /// Vault whose writes always fail
    struct ReadOnlyVault;

    impl Vault for ReadOnlyVault {
        fn available_path_for_attachment(&self, filename: &str) -> Result<PathBuf> {
            Ok(PathBuf::from(filename))
        }

        fn create_binary(&mut self, path: &Path, _bytes: &[u8]) -> Result<VaultFile> {
            Err(anyhow::anyhow!("read-only vault: {}", path.display()))
        }

        fn markdown_link(&self, file: &VaultFile, _source_note: Option<&Path>) -> String {
            file.vault_path.clone()
        }

        fn insert_link(&mut self, _note: &Path, _link: &str) -> Result<()> {
            Ok(())
        }
    }

    fn fixed_150k(_bytes: &[u8], _quality: u8) -> Result<Vec<u8>> {
        Ok(vec![0u8; 150_000])
    }

    fn grows_to_300k(_bytes: &[u8], _quality: u8) -> Result<Vec<u8>> {
        Ok(vec![0u8; 300_000])
    }

    fn always_fails(_bytes: &[u8], _quality: u8) -> Result<Vec<u8>> {
        Err(anyhow::anyhow!("decoder exploded"))
    }

    fn fails_on_tiny_input(bytes: &[u8], _quality: u8) -> Result<Vec<u8>> {
        if bytes.len() < 100 {
            return Err(anyhow::anyhow!("truncated image"));
        }
        Ok(vec![0u8; bytes.len() / 2])
    }

    fn fake_transforms(_algorithm: Algorithm) -> TransformFn {
        fixed_150k
    }

    fn growing_transforms(_algorithm: Algorithm) -> TransformFn {
        grows_to_300k
    }

    fn failing_transforms(_algorithm: Algorithm) -> TransformFn {
        always_fails
    }

    fn picky_transforms(_algorithm: Algorithm) -> TransformFn {
        fails_on_tiny_input
    }

    fn jpeg_file(name: &str, size: usize) -> IncomingFile {
        IncomingFile::from_bytes(name, "image/jpeg", vec![0u8; size])
    }

    fn real_png(name: &str) -> IncomingFile {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 90]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        IncomingFile::from_bytes(name, "image/png", bytes)
    }

    fn setup(
        initial: Option<&str>,
    ) -> (TempDir, MemoryStore, Interceptor<MemoryStore, FsVault>) {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore {
            initial: initial.map(str::to_string),
            ..Default::default()
        };
        let interceptor = Interceptor::activate(store.clone(), FsVault::new(dir.path())).unwrap();
        (dir, store, interceptor)
    }

    #[test]
    fn test_end_to_end_compress_scenario() {
        let (dir, store, interceptor) = setup(None);
        let mut interceptor = interceptor.with_transforms(fake_transforms);
        let mut notifier = RecordingNotifier::default();
        let note = dir.path().join("note.md");

        assert_eq!(interceptor.settings().algorithm, Algorithm::Compress);
        assert_eq!(interceptor.settings().quality, 50);

        let outcome = interceptor
            .handle_drop(vec![jpeg_file("photo.jpg", 200_000)], Some(&note), &mut notifier)
            .unwrap();

        let EventOutcome::Handled(images) = outcome else {
            panic!("drop should be handled");
        };
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].result, TransformResult::new(200_000, 150_000));
        assert_eq!(images[0].link, "![[photo.jpg]]");

        assert_eq!(interceptor.settings().bytes_saved, 50_000);
        assert_eq!(notifier.notices, vec!["50000 bytes (25%)"]);
        assert_eq!(notifier.statuses, vec!["Dull: Saved 48.83 KB total"]);

        assert_eq!(fs::read(dir.path().join("photo.jpg")).unwrap().len(), 150_000);
        assert_eq!(fs::read_to_string(&note).unwrap(), "![[photo.jpg]]\n");

        let saved = store.saved.borrow();
        assert_eq!(saved.last().unwrap().bytes_saved, 50_000);
    }

    #[test]
    fn test_negative_delta_is_accumulated() {
        let (_dir, _store, interceptor) = setup(Some(r#"{"bytesSaved": 1000}"#));
        let mut interceptor = interceptor.with_transforms(growing_transforms);
        let mut notifier = RecordingNotifier::default();

        interceptor
            .handle_paste(vec![jpeg_file("", 200_000)], None, &mut notifier)
            .unwrap();

        assert_eq!(interceptor.settings().bytes_saved, 1000 - 100_000);
        assert_eq!(notifier.notices, vec!["-100000 bytes (-50%)"]);
        assert_eq!(notifier.statuses, vec!["Dull: Saved -99000.00 B total"]);
    }

    #[test]
    fn test_batch_is_processed_in_order_and_summed() {
        let (dir, _store, interceptor) = setup(None);
        let mut interceptor = interceptor.with_transforms(fake_transforms);
        let mut notifier = RecordingNotifier::default();

        let files = vec![
            jpeg_file("a.jpg", 200_000),
            IncomingFile::from_bytes("readme.txt", "text/plain", b"hi".to_vec()),
            jpeg_file("a.jpg", 160_000),
        ];
        let outcome = interceptor.handle_drop(files, None, &mut notifier).unwrap();

        let EventOutcome::Handled(images) = outcome else {
            panic!("drop should be handled");
        };
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].file.vault_path, "a.jpg");
        assert_eq!(images[1].file.vault_path, "a 1.jpg");
        assert_eq!(notifier.batches, vec![2]);
        assert_eq!(interceptor.settings().bytes_saved, 50_000 + 10_000);
        assert!(!dir.path().join("readme.txt").exists());
    }

    #[test]
    fn test_non_image_payload_passes_through() {
        let (_dir, store, mut interceptor) = setup(None);
        let mut notifier = RecordingNotifier::default();

        let outcome = interceptor
            .handle_drop(
                vec![IncomingFile::from_bytes("doc.pdf", "application/pdf", vec![1, 2])],
                None,
                &mut notifier,
            )
            .unwrap();
        assert!(matches!(
            outcome,
            EventOutcome::PassThrough(PassReason::NoSupportedImages)
        ));

        let outcome = interceptor.handle_paste(vec![], None, &mut notifier).unwrap();
        assert!(matches!(outcome, EventOutcome::PassThrough(PassReason::NoFiles)));

        assert!(store.saved.borrow().is_empty());
        assert!(notifier.notices.is_empty());
    }

    #[test]
    fn test_disabled_passes_everything_through() {
        let (dir, _store, interceptor) = setup(Some(r#"{"enabled": false}"#));
        let mut interceptor = interceptor.with_transforms(fake_transforms);
        let mut notifier = RecordingNotifier::default();

        let outcome = interceptor
            .handle_drop(vec![jpeg_file("a.jpg", 10)], None, &mut notifier)
            .unwrap();
        assert!(matches!(outcome, EventOutcome::PassThrough(PassReason::Disabled)));
        assert!(!outcome.is_handled());
        assert!(!dir.path().join("a.jpg").exists());
        assert_eq!(interceptor.settings().bytes_saved, 0);
    }

    #[test]
    fn test_transform_failure_leaves_accumulator_untouched() {
        let (dir, store, interceptor) = setup(Some(r#"{"bytesSaved": 77}"#));
        let mut interceptor = interceptor.with_transforms(failing_transforms);
        let mut notifier = RecordingNotifier::default();
        let note = dir.path().join("note.md");

        let err = interceptor
            .handle_drop(vec![jpeg_file("a.jpg", 10)], Some(&note), &mut notifier)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("decoder exploded"));

        assert_eq!(interceptor.settings().bytes_saved, 77);
        assert!(store.saved.borrow().is_empty());
        assert!(!dir.path().join("a.jpg").exists());
        assert!(!note.exists());
    }

    #[test]
    fn test_failure_mid_batch_keeps_earlier_images() {
        let (dir, store, interceptor) = setup(None);
        let mut interceptor = interceptor.with_transforms(picky_transforms);
        let mut notifier = RecordingNotifier::default();

        let files = vec![
            jpeg_file("a.jpg", 10_000),
            jpeg_file("b.jpg", 10),
            jpeg_file("c.jpg", 10_000),
        ];
        let outcome = interceptor.handle_drop(files, None, &mut notifier).unwrap();
        assert!(outcome.is_handled());

        let EventOutcome::Interrupted { images, error } = outcome else {
            panic!("drop should be interrupted after the first image");
        };
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].link, "![[a.jpg]]");
        assert!(format!("{:#}", error).contains("truncated image"));

        assert!(dir.path().join("a.jpg").exists());
        assert!(!dir.path().join("b.jpg").exists());
        assert!(!dir.path().join("c.jpg").exists());
        assert_eq!(interceptor.settings().bytes_saved, 5_000);
        assert_eq!(store.saved.borrow().last().unwrap().bytes_saved, 5_000);
        assert_eq!(notifier.notices, vec!["5000 bytes (50%)"]);
    }

    #[test]
    fn test_overflowing_total_is_an_error() {
        let (_dir, store, interceptor) = setup(Some(r#"{"bytesSaved": 9223372036854775800}"#));
        let mut interceptor = interceptor.with_transforms(fake_transforms);
        let mut notifier = RecordingNotifier::default();

        let err = interceptor
            .handle_drop(vec![jpeg_file("a.jpg", 200_000)], None, &mut notifier)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to account for a.jpg"));

        assert_eq!(interceptor.settings().bytes_saved, 9_223_372_036_854_775_800);
        assert!(store.saved.borrow().is_empty());
        assert!(notifier.notices.is_empty());
    }

    #[test]
    fn test_write_failure_leaves_accumulator_untouched() {
        let store = MemoryStore::default();
        let mut interceptor = Interceptor::activate(store.clone(), ReadOnlyVault)
            .unwrap()
            .with_transforms(fake_transforms);
        let mut notifier = RecordingNotifier::default();

        assert!(interceptor
            .handle_paste(vec![jpeg_file("a.jpg", 200_000)], None, &mut notifier)
            .is_err());
        assert_eq!(interceptor.settings().bytes_saved, 0);
        assert!(store.saved.borrow().is_empty());
        assert!(notifier.notices.is_empty());
    }

    #[test]
    fn test_real_transform_writes_jpeg() {
        let (dir, _store, mut interceptor) = setup(Some(r#"{"algorithm": "greyscale"}"#));
        let mut notifier = RecordingNotifier::default();

        let input = real_png("Screenshot.png");
        let original_size = input.size;
        let outcome = interceptor
            .handle_paste(vec![input], None, &mut notifier)
            .unwrap();

        let EventOutcome::Handled(images) = outcome else {
            panic!("paste should be handled");
        };
        let written = fs::read(dir.path().join("Screenshot.jpg")).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
        assert_eq!(images[0].result.new_size, written.len() as u64);
        assert_eq!(
            interceptor.settings().bytes_saved,
            original_size as i64 - written.len() as i64
        );
    }

    #[test]
    fn test_settings_mutations_are_persisted() {
        let (_dir, store, mut interceptor) = setup(Some(r#"{"bytesSaved": 4096}"#));

        assert_eq!(interceptor.status_text(), "Dull: Saved 4.00 KB total");

        interceptor.set_algorithm(Algorithm::Quantize).unwrap();
        interceptor.set_quality(90).unwrap();
        assert!(interceptor.set_quality(0).is_err());
        assert!(!interceptor.toggle_enabled().unwrap());
        interceptor.reset_bytes_saved().unwrap();

        assert_eq!(interceptor.status_text(), "Dull: Saved 0.00 B total");

        let saved = store.saved.borrow();
        assert_eq!(saved.len(), 4);
        let last = saved.last().unwrap();
        assert_eq!(last.algorithm, Algorithm::Quantize);
        assert_eq!(last.quality, 90);
        assert!(!last.enabled);
        assert_eq!(last.bytes_saved, 0);
    }
}
