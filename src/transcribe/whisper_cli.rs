use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Device, TranscriptionBackend};
use crate::caption::CaptionSegment;
use crate::config::TranscriberConfig;
use crate::error::{Result, SlidecastError};
use crate::media::probe;

/// Whisper CLI JSON output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperOutput {
    pub text: String,
    pub segments: Vec<WhisperSegment>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Backend driving the whisper command-line tool with word-level
/// timestamps and JSON output.
pub struct WhisperCliBackend {
    config: TranscriberConfig,
}

impl WhisperCliBackend {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }

    fn device_name(&self, device: Device) -> &str {
        match device {
            Device::Accelerated => &self.config.accelerated_device,
            Device::Fallback => &self.config.fallback_device,
        }
    }
}

#[async_trait]
impl TranscriptionBackend for WhisperCliBackend {
    fn accelerator_available(&self) -> bool {
        probe::check_gpu_available()
    }

    async fn transcribe(&self, audio_path: &Path, device: Device) -> Result<Vec<CaptionSegment>> {
        let device_name = self.device_name(device);
        info!(
            "Transcribing {} with model '{}' on device '{}'",
            audio_path.display(),
            self.config.model,
            device_name
        );

        let temp_dir = tempfile::tempdir()
            .map_err(|e| SlidecastError::Transcription(format!("Failed to create temp directory: {}", e)))?;
        let output_dir = temp_dir.path();

        let output = Command::new(&self.config.binary_path)
            .arg(audio_path)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--device")
            .arg(device_name)
            .arg("--word_timestamps")
            .arg("True")
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--verbose")
            .arg("False")
            .output()
            .await
            .map_err(|e| SlidecastError::Transcription(format!("Failed to execute whisper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SlidecastError::Transcription(format!(
                "Whisper failed on device '{}': {}",
                device_name, stderr
            )));
        }

        let audio_stem = audio_path
            .file_stem()
            .ok_or_else(|| SlidecastError::Transcription("Invalid audio filename".to_string()))?;
        let json_file = output_dir.join(format!("{}.json", audio_stem.to_string_lossy()));

        let json_content = std::fs::read_to_string(&json_file).map_err(|e| {
            SlidecastError::Transcription(format!("Failed to read whisper output: {}", e))
        })?;

        let whisper_output = parse_output(&json_content)?;

        let segments = to_caption_segments(whisper_output);
        debug!("Whisper returned {} segments", segments.len());
        Ok(segments)
    }
}

fn parse_output(json: &str) -> Result<WhisperOutput> {
    Ok(serde_json::from_str(json)?)
}

fn to_caption_segments(output: WhisperOutput) -> Vec<CaptionSegment> {
    output
        .segments
        .into_iter()
        .filter(|seg| !seg.text.trim().is_empty())
        .map(|seg| CaptionSegment {
            start: seg.start,
            end: seg.end,
            text: seg.text.trim().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whisper_json() {
        let json = r#"{
            "text": " Hello everyone. Welcome back.",
            "segments": [
                {"start": 0.0, "end": 2.5, "text": " Hello everyone."},
                {"start": 2.5, "end": 5.0, "text": " Welcome back."},
                {"start": 5.0, "end": 5.2, "text": "   "}
            ],
            "language": "en"
        }"#;
        let output = parse_output(json).unwrap();
        let segments = to_caption_segments(output);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello everyone.");
        assert_eq!(segments[1].start, 2.5);
    }

    #[test]
    fn test_invalid_whisper_json_is_json_error() {
        let err = parse_output("{not json").unwrap_err();
        assert!(matches!(err, SlidecastError::Json(_)));
    }
}
