use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::caption::{self, CaptionChunk};
use crate::config::Config;
use crate::error::{Result, SlidecastError};
use crate::media::encoder::{parse_progress, EncodeCommandBuilder};
use crate::media::probe;
use crate::project::ProjectInput;
use crate::transcribe::TranscriptionService;
use crate::{effects, style};

/// Lifecycle of a render job. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobState {
    Queued,
    Transcribing,
    Segmenting,
    Assembling,
    Encoding,
    Complete,
    Failed,
}

impl JobState {
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Transcribing => "transcribing",
            JobState::Segmenting => "segmenting",
            JobState::Assembling => "assembling",
            JobState::Encoding => "encoding",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        }
    }
}

/// A progress update for one job, suitable for a UI or log sink.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub folder: PathBuf,
    pub state: JobState,
    pub progress: u8,
    pub status: String,
}

/// Outcome of a single render job. Failures carry the message instead of
/// aborting the batch.
#[derive(Debug)]
pub struct RenderResult {
    pub folder: PathBuf,
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Keeps reported progress monotonic. The encoder interleaves frame and
/// timestamp markers that map to slightly different percentages, so raw
/// parses can briefly move backwards.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept an update, returning the value to report or None when the
    /// update would move backwards.
    pub fn update(&mut self, progress: u8) -> Option<u8> {
        if progress > self.last {
            self.last = progress;
            Some(progress)
        } else {
            None
        }
    }

    pub fn current(&self) -> u8 {
        self.last
    }
}

/// Renders one project folder end to end: transcription, caption
/// segmentation, command assembly and encoding. Instances are reusable
/// across jobs; the transcription service remembers accelerator failures
/// so the fallback device sticks for the life of the processor.
pub struct VideoProcessor {
    config: Config,
    transcriber: TranscriptionService,
}

impl VideoProcessor {
    pub fn new(config: Config) -> Result<Self> {
        probe::check_ffmpeg_available(&config.media)?;
        let transcriber = TranscriptionService::with_default_backend(config.transcriber.clone());
        Ok(Self {
            config,
            transcriber,
        })
    }

    /// Construct with an explicit transcription service, for tests.
    pub fn with_transcriber(config: Config, transcriber: TranscriptionService) -> Self {
        Self {
            config,
            transcriber,
        }
    }

    /// Render a single project folder to its output video.
    ///
    /// Progress lands in fixed bands: transcription and segmentation
    /// within 0-20, encoding within 20-99, completion at 100. The temp
    /// subtitle file is removed whether the encode succeeds or not.
    pub async fn render<F>(&self, project: &ProjectInput, mut report: F) -> Result<PathBuf>
    where
        F: FnMut(JobState, u8, &str),
    {
        let output_path = project.output_path();
        let srt_path = project.temp_srt_path();
        info!("Rendering {} -> {}", project.folder.display(), output_path.display());
        info!(
            "Settings: {} @ {} fps, quality {}, {} image(s), effects {:?}",
            self.config.video.resolution.name(),
            self.config.video.fps,
            self.config.video.quality,
            project.images.len(),
            self.config.style.motion_effects
        );

        let duration = probe::audio_duration(&self.config.media, &project.voiceover).await?;
        if duration <= 0.0 {
            return Err(SlidecastError::Media(format!(
                "Narration has no duration: {}",
                project.voiceover.display()
            )));
        }
        debug!("Narration duration: {:.2}s", duration);

        report(JobState::Transcribing, 5, "Transcribing narration...");
        let segments = self.transcriber.transcribe(&project.voiceover).await?;
        if segments.is_empty() {
            return Err(SlidecastError::Transcription(
                "Transcription produced no caption segments".to_string(),
            ));
        }

        report(JobState::Segmenting, 10, "Building captions...");
        let chunks = self.build_chunks(&segments);
        caption::write_srt(&chunks, &srt_path).await?;

        report(JobState::Assembling, 15, "Assembling encoder command...");
        let command = self.build_command(project, &srt_path, duration, &output_path).await;
        let command = match command {
            Ok(cmd) => cmd,
            Err(e) => {
                remove_temp_srt(&srt_path).await;
                return Err(e);
            }
        };

        report(JobState::Encoding, 20, "Rendering video...");
        let mut tracker = ProgressTracker::new();
        tracker.update(20);
        let result = command
            .execute_streaming(|line| {
                if let Some((progress, status)) = parse_progress(line, duration) {
                    if let Some(progress) = tracker.update(progress) {
                        report(JobState::Encoding, progress, &status);
                    }
                }
            })
            .await;

        remove_temp_srt(&srt_path).await;

        match result {
            Ok((true, _)) => {
                report(JobState::Complete, 100, "Complete");
                info!("Finished {}", output_path.display());
                Ok(output_path)
            }
            Ok((false, tail)) => Err(SlidecastError::Media(format!(
                "Encoder failed for {}: {}",
                project.folder.display(),
                tail.join("\n")
            ))),
            Err(e) => Err(e),
        }
    }

    /// Transcribe narration and write the segmented captions as SRT,
    /// without rendering video.
    pub async fn transcribe_to_srt(
        &self,
        audio_path: &std::path::Path,
        output_path: &std::path::Path,
    ) -> Result<usize> {
        let segments = self.transcriber.transcribe(audio_path).await?;
        let chunks = self.build_chunks(&segments);
        caption::write_srt(&chunks, output_path).await?;
        Ok(chunks.len())
    }

    fn build_chunks(&self, segments: &[crate::caption::CaptionSegment]) -> Vec<CaptionChunk> {
        let render = &self.config.render;
        let settings = &self.config.style;
        caption::split_segments(segments, render.max_words, render.max_chars)
            .into_iter()
            .map(|chunk| CaptionChunk {
                text: caption::wrap_midpoint(
                    &caption::apply_text_case(&chunk.text, settings.text_case),
                    render.wrap_width,
                ),
                ..chunk
            })
            .collect()
    }

    async fn build_command(
        &self,
        project: &ProjectInput,
        srt_path: &std::path::Path,
        duration: f64,
        output_path: &PathBuf,
    ) -> Result<crate::media::MediaCommand> {
        let resolution = self.config.video.resolution;
        let settings = self.config.style.clone().normalized();
        let crop = settings.crop.as_ref();

        // Crop regions are validated against each image's true bounds,
        // so dimensions are only probed when a crop is configured.
        let mut per_image_filters = Vec::with_capacity(project.images.len());
        for image in &project.images {
            let dims = match crop {
                Some(_) => Some(probe::image_dimensions(&self.config.media, image).await?),
                None => None,
            };
            per_image_filters.push(effects::per_image_filter(crop, dims, resolution));
        }

        let style = style::build(&settings, resolution.dimensions());
        let plan = effects::build_plan(
            &settings.motion_effects,
            &settings.motion_effect_intensities,
            self.config.video.fps,
            resolution,
            self.config.media.grain_asset.as_deref(),
        );

        let use_accelerator =
            self.config.render.use_accelerator && probe::check_gpu_available();

        let builder = EncodeCommandBuilder::new(
            &self.config.media,
            &self.config.video,
            &self.config.bitrate,
        );
        builder.build(
            project,
            &per_image_filters,
            srt_path,
            &style,
            &plan,
            duration,
            output_path,
            use_accelerator,
            crop.is_some(),
        )
    }
}

async fn remove_temp_srt(srt_path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(srt_path).await {
        if srt_path.exists() {
            warn!("Failed to remove {}: {}", srt_path.display(), e);
        }
    }
}

/// Runs a set of project folders through a bounded pool of processors.
///
/// Concurrency is capped by a semaphore sized to the configured worker
/// count; processors are reused round-robin so whisper model state and
/// accelerator fallback decisions persist across jobs. One failing job
/// never aborts the batch.
pub struct BatchRenderer {
    concurrency: usize,
    processors: Vec<Arc<VideoProcessor>>,
}

impl BatchRenderer {
    pub fn new(config: Config) -> Result<Self> {
        let concurrency = config.render.worker_count();
        let mut processors = Vec::with_capacity(concurrency);
        for _ in 0..concurrency {
            processors.push(Arc::new(VideoProcessor::new(config.clone())?));
        }
        Ok(Self {
            concurrency,
            processors,
        })
    }

    /// Construct from pre-built processors, for tests. The pool size is
    /// also the concurrency bound.
    pub fn with_processors(processors: Vec<Arc<VideoProcessor>>) -> Self {
        Self {
            concurrency: processors.len().max(1),
            processors,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Render all projects, emitting progress events to `progress_tx`.
    /// Results arrive in completion order.
    pub async fn render_all(
        &self,
        projects: Vec<ProjectInput>,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Vec<RenderResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        info!(
            "Starting batch of {} jobs with {} workers",
            projects.len(),
            self.concurrency
        );

        for (i, project) in projects.into_iter().enumerate() {
            let processor = Arc::clone(&self.processors[i % self.processors.len()]);
            let semaphore = Arc::clone(&semaphore);
            let tx = progress_tx.clone();

            let _ = tx.send(ProgressEvent {
                folder: project.folder.clone(),
                state: JobState::Queued,
                progress: 0,
                status: "Queued".to_string(),
            });

            tasks.spawn(async move {
                // Closing the semaphore is not part of this design, so
                // acquisition only fails if the batch itself is gone.
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return RenderResult {
                            folder: project.folder.clone(),
                            success: false,
                            output_path: None,
                            error: Some("Worker pool shut down".to_string()),
                        }
                    }
                };

                let folder = project.folder.clone();
                let event_tx = tx.clone();
                let event_folder = folder.clone();
                let outcome = processor
                    .render(&project, move |state, progress, status| {
                        let _ = event_tx.send(ProgressEvent {
                            folder: event_folder.clone(),
                            state,
                            progress,
                            status: status.to_string(),
                        });
                    })
                    .await;

                match outcome {
                    Ok(output_path) => RenderResult {
                        folder,
                        success: true,
                        output_path: Some(output_path),
                        error: None,
                    },
                    Err(e) => {
                        warn!("Job failed for {}: {}", folder.display(), e);
                        let _ = tx.send(ProgressEvent {
                            folder: folder.clone(),
                            state: JobState::Failed,
                            progress: 0,
                            status: e.to_string(),
                        });
                        RenderResult {
                            folder,
                            success: false,
                            output_path: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!("Render task panicked: {}", e),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::CaptionSegment;
    use crate::config::TextCase;
    use crate::transcribe::{MockTranscriptionBackend, TranscriptionService};

    #[test]
    fn test_progress_tracker_suppresses_decreases() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.update(20), Some(20));
        assert_eq!(tracker.update(35), Some(35));
        // A timestamp-derived parse below the frame-derived one.
        assert_eq!(tracker.update(33), None);
        assert_eq!(tracker.update(35), None);
        assert_eq!(tracker.update(36), Some(36));
        assert_eq!(tracker.current(), 36);
    }

    #[test]
    fn test_job_states_are_ordered() {
        assert!(JobState::Queued < JobState::Transcribing);
        assert!(JobState::Transcribing < JobState::Segmenting);
        assert!(JobState::Segmenting < JobState::Assembling);
        assert!(JobState::Assembling < JobState::Encoding);
        assert!(JobState::Encoding < JobState::Complete);
    }

    #[test]
    fn test_build_chunks_applies_case_and_wrap() {
        let mut config = Config::default();
        config.style.text_case = TextCase::Upper;
        config.render.wrap_width = 10;
        let backend = MockTranscriptionBackend::new();
        let processor = VideoProcessor::with_transcriber(
            config,
            TranscriptionService::new(Box::new(backend)),
        );

        let segments = vec![CaptionSegment {
            start: 0.0,
            end: 2.0,
            text: "hello from the studio".to_string(),
        }];
        let chunks = processor.build_chunks(&segments);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "HELLO FROM\nTHE STUDIO");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_temp_srt_removed_after_failed_encode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        let write_stub = |name: &str, body: &str| {
            let path = bin.join(name);
            std::fs::write(&path, body).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        };
        let ffprobe = write_stub("ffprobe", "#!/bin/sh\necho 12.0\n");
        let ffmpeg = write_stub(
            "ffmpeg",
            "#!/bin/sh\necho 'frame=  60 fps=30' >&2\nexit 1\n",
        );

        let folder = temp.path().join("story");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("narration.mp3"), b"x").unwrap();
        std::fs::write(folder.join("01.png"), b"x").unwrap();
        let project = crate::project::detect_files(&folder).unwrap();

        let mut config = Config::default();
        config.media.ffprobe_path = ffprobe.to_string_lossy().to_string();
        config.media.ffmpeg_path = ffmpeg.to_string_lossy().to_string();

        let mut backend = MockTranscriptionBackend::new();
        backend.expect_accelerator_available().return_const(false);
        backend.expect_transcribe().returning(|_, _| {
            Ok(vec![CaptionSegment {
                start: 0.0,
                end: 2.0,
                text: "hello there".to_string(),
            }])
        });
        let processor = VideoProcessor::with_transcriber(
            config,
            TranscriptionService::new(Box::new(backend)),
        );

        let mut saw_encoding = false;
        let err = processor
            .render(&project, |state, _, _| {
                if state == JobState::Encoding {
                    saw_encoding = true;
                }
            })
            .await
            .unwrap_err();

        // The encode was reached and failed; the temp SRT is still gone.
        assert!(saw_encoding);
        assert!(matches!(err, SlidecastError::Media(_)));
        assert!(!project.temp_srt_path().exists());
        assert!(!project.output_path().exists());
    }

    #[tokio::test]
    async fn test_batch_reports_failure_without_aborting() {
        // Two jobs against folders with no media: both fail on their own,
        // and both results come back.
        let config = Config::default();

        let make_processor = || {
            // Jobs fail while probing the narration, before transcription.
            let mut backend = MockTranscriptionBackend::new();
            backend.expect_accelerator_available().return_const(false);
            Arc::new(VideoProcessor::with_transcriber(
                config.clone(),
                TranscriptionService::new(Box::new(backend)),
            ))
        };

        let batch = BatchRenderer::with_processors(vec![make_processor()]);
        let temp = tempfile::tempdir().unwrap();
        let projects: Vec<ProjectInput> = (0..2)
            .map(|i| {
                let folder = temp.path().join(format!("job{i}"));
                std::fs::create_dir_all(&folder).unwrap();
                ProjectInput {
                    folder: folder.clone(),
                    voiceover: folder.join("missing.mp3"),
                    images: vec![folder.join("missing.png")],
                    script: None,
                }
            })
            .collect();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let results = batch.render_all(projects, tx).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
        assert!(results.iter().all(|r| r.error.is_some()));

        let mut saw_failed = false;
        while let Ok(event) = rx.try_recv() {
            if event.state == JobState::Failed {
                saw_failed = true;
            }
        }
        assert!(saw_failed);
    }
}
