use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, SlidecastError};
use crate::media::probe;
use crate::project::{self, ProjectInput};
use crate::render::{BatchRenderer, JobState, ProgressEvent, RenderResult, VideoProcessor};

/// High-level entry points over a loaded configuration: single-folder
/// render, batch render and transcription-only runs.
pub struct Workflow {
    config: Config,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        probe::check_ffmpeg_available(&config.media)?;
        Ok(Self { config })
    }

    /// Render one project folder, reporting progress to the callback.
    pub async fn render_folder<P, F>(&self, folder: P, report: F) -> Result<PathBuf>
    where
        P: AsRef<Path>,
        F: FnMut(JobState, u8, &str),
    {
        let folder = folder.as_ref();
        let summary = project::validate_folder(folder)?;
        info!("{}: {}", folder.display(), summary);

        let input = project::detect_files(folder)?;
        let processor = VideoProcessor::new(self.config.clone())?;
        processor.render(&input, report).await
    }

    /// Render every project folder directly under `input_dir`.
    ///
    /// Folders that do not look like projects (no narration, no images)
    /// are skipped with a warning rather than failing the batch. Workers
    /// default to the configured count unless overridden.
    pub async fn render_batch<P: AsRef<Path>>(
        &self,
        input_dir: P,
        workers: Option<usize>,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Result<Vec<RenderResult>> {
        let input_dir = input_dir.as_ref();
        if !input_dir.is_dir() {
            return Err(SlidecastError::Config(format!(
                "Batch input is not a directory: {}",
                input_dir.display()
            )));
        }

        let projects = discover_projects(input_dir);
        if projects.is_empty() {
            return Err(SlidecastError::Validation(format!(
                "No project folders found under {}",
                input_dir.display()
            )));
        }
        info!("Discovered {} project folder(s)", projects.len());

        let mut config = self.config.clone();
        if let Some(workers) = workers {
            config.render.max_workers = workers;
        }

        let batch = BatchRenderer::new(config)?;
        Ok(batch.render_all(projects, progress_tx).await)
    }

    /// Transcribe a narration file and write segmented captions as SRT.
    pub async fn transcribe_audio<P: AsRef<Path>>(&self, input: P, output: P) -> Result<usize> {
        let input = input.as_ref();
        if !input.exists() {
            return Err(SlidecastError::FileNotFound(input.display().to_string()));
        }
        let processor = VideoProcessor::new(self.config.clone())?;
        processor.transcribe_to_srt(input, output.as_ref()).await
    }
}

/// Project folders are the immediate subdirectories that pass file
/// detection.
fn discover_projects(input_dir: &Path) -> Vec<ProjectInput> {
    let mut projects = Vec::new();
    for entry in WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.path().is_dir() {
            continue;
        }
        match project::detect_files(entry.path()) {
            Ok(input) => projects.push(input),
            Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }
    projects
}
