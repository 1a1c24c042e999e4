// Transcription with device fallback.
//
// The service owns device selection and the one-shot accelerated-to-
// fallback retry; the backend trait hides the actual speech-to-text
// invocation so the contract can be tested without a model.

pub mod whisper_cli;

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::caption::CaptionSegment;
use crate::config::TranscriberConfig;
use crate::error::{Result, SlidecastError};

/// Execution target for transcription inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Accelerated,
    Fallback,
}

/// Black-box speech-to-text backend returning ordered timed segments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Whether an accelerated device is available to this backend.
    fn accelerator_available(&self) -> bool;

    /// Transcribe the audio file on the given device, requesting
    /// word-level timing.
    async fn transcribe(&self, audio_path: &Path, device: Device) -> Result<Vec<CaptionSegment>>;
}

/// Wraps a transcription backend with accelerated/fallback device
/// selection. An accelerated failure permanently disables that path for
/// this service instance and retries exactly once on the fallback
/// device; a second failure is fatal. The explicit flag (rather than a
/// retry loop) keeps the one-shot contract obvious.
pub struct TranscriptionService {
    backend: Box<dyn TranscriptionBackend>,
    accelerated_failed: AtomicBool,
}

impl TranscriptionService {
    pub fn new(backend: Box<dyn TranscriptionBackend>) -> Self {
        Self {
            backend,
            accelerated_failed: AtomicBool::new(false),
        }
    }

    /// Create a service over the default whisper CLI backend.
    pub fn with_default_backend(config: TranscriberConfig) -> Self {
        Self::new(Box::new(whisper_cli::WhisperCliBackend::new(config)))
    }

    pub async fn transcribe(&self, audio_path: &Path) -> Result<Vec<CaptionSegment>> {
        if self.backend.accelerator_available() && !self.accelerated_failed.load(Ordering::Acquire)
        {
            match self.backend.transcribe(audio_path, Device::Accelerated).await {
                Ok(segments) => {
                    info!(
                        "Transcription produced {} segments on the accelerated device",
                        segments.len()
                    );
                    return Ok(segments);
                }
                Err(e) => {
                    warn!(
                        "Accelerated transcription failed ({}), disabling accelerated path and retrying on fallback",
                        e
                    );
                    self.accelerated_failed.store(true, Ordering::Release);
                }
            }
        }

        match self.backend.transcribe(audio_path, Device::Fallback).await {
            Ok(segments) => {
                info!(
                    "Transcription produced {} segments on the fallback device",
                    segments.len()
                );
                Ok(segments)
            }
            Err(e) => Err(SlidecastError::Transcription(format!(
                "Transcription failed on the fallback device: {}",
                e
            ))),
        }
    }
}
