use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a single project folder to a captioned video
    Render {
        /// Project folder with narration audio and images
        #[arg(short, long)]
        folder: PathBuf,
    },

    /// Render all project folders under a directory
    Batch {
        /// Directory containing project folders
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Concurrent render workers (overrides config, clamped 1-4)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Check a project folder without rendering
    Validate {
        /// Project folder with narration audio and images
        #[arg(short, long)]
        folder: PathBuf,
    },

    /// Transcribe narration audio to an SRT caption file
    Transcribe {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,
    },
}
