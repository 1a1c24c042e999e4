//! Slidecast - caption-synchronized video assembly.
//!
//! Turns a folder of narration audio and still images into a single
//! captioned video using whisper and ffmpeg.

use anyhow::Result;
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use slidecast::cli::{Args, Commands};
use slidecast::config::Config;
use slidecast::project;
use slidecast::render::{JobState, ProgressEvent};
use slidecast::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    let workflow = Workflow::new(config)?;

    match args.command {
        Commands::Render { folder } => {
            info!("Rendering project folder: {}", folder.display());
            let bar = ProgressBar::new(100).with_style(progress_style()?);
            bar.set_prefix(folder_label(&folder));

            let output = workflow
                .render_folder(&folder, |state, progress, status| {
                    bar.set_position(progress as u64);
                    bar.set_message(format!("[{}] {}", state.label(), status));
                })
                .await?;
            bar.finish_with_message("complete");
            println!("Rendered: {}", output.display());
        }
        Commands::Batch { input_dir, workers } => {
            info!("Rendering batch from: {}", input_dir.display());

            let multi = MultiProgress::new();
            let style = progress_style()?;
            let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

            let ui = tokio::spawn(async move {
                let mut bars: HashMap<PathBuf, ProgressBar> = HashMap::new();
                while let Some(event) = rx.recv().await {
                    let bar = bars.entry(event.folder.clone()).or_insert_with(|| {
                        let bar = multi.add(ProgressBar::new(100).with_style(style.clone()));
                        bar.set_prefix(folder_label(&event.folder));
                        bar
                    });
                    match event.state {
                        JobState::Complete => {
                            bar.set_position(100);
                            bar.finish_with_message("complete");
                        }
                        JobState::Failed => {
                            bar.abandon_with_message(format!("failed: {}", event.status));
                        }
                        _ => {
                            bar.set_position(event.progress as u64);
                            bar.set_message(format!("[{}] {}", event.state.label(), event.status));
                        }
                    }
                }
            });

            let results = workflow.render_batch(&input_dir, workers, tx).await?;
            ui.await?;

            let succeeded = results.iter().filter(|r| r.success).count();
            let failed = results.len() - succeeded;
            println!("\nBatch finished: {} succeeded, {} failed", succeeded, failed);
            for result in results.iter().filter(|r| !r.success) {
                println!(
                    "  {}: {}",
                    result.folder.display(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            if failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Validate { folder } => {
            let summary = project::validate_folder(&folder)?;
            println!("{}: {}", folder.display(), summary);
        }
        Commands::Transcribe { input, output } => {
            info!("Transcribing audio: {}", input.display());
            let count = workflow.transcribe_audio(&input, &output).await?;
            println!("Wrote {} captions to {}", count, output.display());
        }
    }

    info!("Slidecast finished successfully");
    Ok(())
}

fn progress_style() -> Result<ProgressStyle> {
    Ok(
        ProgressStyle::with_template("{prefix:>20} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    )
}

fn folder_label(folder: &std::path::Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| folder.display().to_string())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let app_dir = std::env::current_dir()?.join(".slidecast");
    let log_dir = app_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "slidecast.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("slidecast.log").display()
    );

    Ok(())
}
