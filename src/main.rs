use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use dull::cli::{Args, Command, DropArgs, PasteArgs, SettingsArgs};
use dull::events::{collect_dropped_files, sniff_mime, IncomingFile};
use dull::interceptor::{EventOutcome, Interceptor, ProcessedImage};
use dull::json_output::JsonMessage;
use dull::notify::{ConsoleNotifier, JsonNotifier, Notifier};
use dull::report::SavingsReport;
use dull::savings::format_bytes;
use dull::settings::JsonSettingsStore;
use dull::utils::{error_println, format_duration, validate_inputs, verbose_println, warn_println};
use dull::vault::FsVault;

type Plugin = Interceptor<JsonSettingsStore, FsVault>;

fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args) {
        if args.json {
            JsonMessage::Notice {
                message: format!("error: {:#}", e),
            }
            .emit();
        } else {
            error_println(&format!("{:#}", e));
        }
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let settings_file = args.settings_file();
    verbose_println(args.verbose, &format!("Vault: {}", args.vault.display()));
    verbose_println(args.verbose, &format!("Settings: {}", settings_file.display()));

    let mut vault = FsVault::new(&args.vault).with_link_style(args.link_style);
    if let Some(folder) = &args.attachment_folder {
        vault = vault.with_attachment_folder(folder);
    }

    let mut plugin = Interceptor::activate(JsonSettingsStore::new(settings_file), vault)?
        .with_verbose(args.verbose);

    let mut notifier: Box<dyn Notifier> = if args.json {
        Box::new(JsonNotifier)
    } else {
        Box::new(ConsoleNotifier::new())
    };

    match &args.command {
        Command::Drop(drop_args) => handle_drop(args, drop_args, &mut plugin, notifier.as_mut()),
        Command::Paste(paste_args) => {
            handle_paste(args, paste_args, &mut plugin, notifier.as_mut())
        }
        Command::Settings(settings_args) => handle_settings(args, settings_args, &mut plugin),
        Command::Toggle => {
            let enabled = plugin.toggle_enabled()?;
            notifier.notice(&format!("Dull {}", if enabled { "enabled" } else { "disabled" }));
            Ok(())
        }
        Command::Reset => {
            plugin.reset_bytes_saved()?;
            notifier.status(&plugin.status_text());
            Ok(())
        }
        Command::Status => {
            if args.json {
                notifier.status(&plugin.status_text());
            } else {
                println!("{}", plugin.status_text());
                if !plugin.settings().enabled {
                    println!("{}", style("(interception disabled)").dim());
                }
            }
            Ok(())
        }
    }
}

fn handle_drop(
    args: &Args,
    drop_args: &DropArgs,
    plugin: &mut Plugin,
    notifier: &mut dyn Notifier,
) -> Result<()> {
    let start_time = Instant::now();
    validate_inputs(&drop_args.paths)?;

    let files = collect_dropped_files(&drop_args.paths, args.verbose)?;
    let before = plugin.settings().bytes_saved;
    let outcome = plugin.handle_drop(files, drop_args.note.as_deref(), notifier)?;

    finish_event(
        args,
        "drop",
        outcome,
        before,
        start_time,
        drop_args.note.as_deref(),
        plugin,
        drop_args.report,
    )
}

fn handle_paste(
    args: &Args,
    paste_args: &PasteArgs,
    plugin: &mut Plugin,
    notifier: &mut dyn Notifier,
) -> Result<()> {
    let start_time = Instant::now();

    let mut bytes = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut bytes)
        .context("Failed to read pasted data from stdin")?;

    let files = if bytes.is_empty() {
        Vec::new()
    } else {
        let mime = match &paste_args.mime {
            Some(mime) => mime.clone(),
            None => sniff_mime(&bytes).unwrap_or_else(|| "application/octet-stream".to_string()),
        };
        let name = paste_args.name.clone().unwrap_or_default();
        vec![IncomingFile::from_bytes(name, mime, bytes)]
    };

    let before = plugin.settings().bytes_saved;
    let outcome = plugin.handle_paste(files, paste_args.note.as_deref(), notifier)?;

    finish_event(
        args,
        "paste",
        outcome,
        before,
        start_time,
        paste_args.note.as_deref(),
        plugin,
        false,
    )
}

#[allow(clippy::too_many_arguments)]
fn finish_event(
    args: &Args,
    kind: &str,
    outcome: EventOutcome,
    before: i64,
    start_time: Instant,
    note: Option<&Path>,
    plugin: &Plugin,
    report: bool,
) -> Result<()> {
    // Images written before a failure are still reported, then the failure is returned
    let (images, failure) = match outcome {
        EventOutcome::PassThrough(reason) => {
            if args.json {
                JsonMessage::Passthrough {
                    event: kind.to_string(),
                    reason: reason.describe().to_string(),
                }
                .emit();
            } else {
                warn_println(&format!("Nothing intercepted: {}", reason.describe()));
            }
            return Ok(());
        }
        EventOutcome::Handled(images) => (images, None),
        EventOutcome::Interrupted { images, error } => (images, Some(error)),
    };

    let batch_saved = plugin.settings().bytes_saved.saturating_sub(before);

    if args.json {
        for image in &images {
            emit_processed(image);
        }
        JsonMessage::Summary {
            processed: images.len(),
            batch_bytes_saved: batch_saved,
            total_bytes_saved: plugin.settings().bytes_saved,
            total_human: format_bytes(plugin.settings().bytes_saved as f64),
            duration_secs: start_time.elapsed().as_secs_f64(),
        }
        .emit();
        return failure.map_or(Ok(()), Err);
    }

    // Without a note the links go to stdout so they can be piped into an editor
    if note.is_none() {
        for image in &images {
            println!("{}", image.link);
        }
    }

    if report {
        SavingsReport::from_images(&images).print();
    }

    eprintln!();
    eprintln!(
        "{} {} image(s) in {}, saved {} this time",
        style("Processed").bold().green(),
        images.len(),
        format_duration(start_time.elapsed()),
        style(format_bytes(batch_saved as f64)).bold()
    );
    if let Some(note) = note {
        eprintln!("  Links added to {}", style(note.display()).dim());
    }

    failure.map_or(Ok(()), Err)
}

fn emit_processed(image: &ProcessedImage) {
    JsonMessage::Processed {
        input: image.input_name.clone(),
        output: image.file.vault_path.clone(),
        link: image.link.clone(),
        original_size: image.result.original_size,
        new_size: image.result.new_size,
        delta: image.result.delta(),
        percent: image.result.percent_saved(),
    }
    .emit();
}

fn handle_settings(args: &Args, settings_args: &SettingsArgs, plugin: &mut Plugin) -> Result<()> {
    if let Some(algorithm) = settings_args.algorithm {
        plugin.set_algorithm(algorithm)?;
        verbose_println(args.verbose, &format!("Algorithm set to {}", algorithm));
    }

    if let Some(quality) = settings_args.quality {
        plugin.set_quality(quality)?;
        verbose_println(args.verbose, &format!("Quality set to {}", quality));
    }

    let settings = plugin.settings();
    if args.json {
        JsonMessage::Settings {
            settings: settings.clone(),
        }
        .emit();
        return Ok(());
    }

    println!("{}", style("Settings:").bold());
    println!("  Algorithm: {}", style(settings.algorithm).cyan());
    println!("  Quality: {}", style(settings.quality).cyan());
    println!(
        "  Enabled: {}",
        if settings.enabled {
            style("yes").green()
        } else {
            style("no").red()
        }
    );
    println!(
        "  Bytes saved: {} ({})",
        settings.bytes_saved,
        format_bytes(settings.bytes_saved as f64)
    );

    Ok(())
}
