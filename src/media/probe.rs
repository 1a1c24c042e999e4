use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, SlidecastError};

/// Check if the media processor binary is available.
pub fn check_ffmpeg_available(config: &MediaConfig) -> Result<()> {
    let output = Command::new(&config.ffmpeg_path)
        .arg("-version")
        .output()
        .map_err(|e| SlidecastError::Media(format!("Media processor not found: {}", e)))?;

    if output.status.success() {
        debug!("Media processor is available");
        Ok(())
    } else {
        Err(SlidecastError::Media(
            "Media processor version check failed".to_string(),
        ))
    }
}

/// Check if an NVIDIA GPU is present. Probed once per process; the
/// answer does not change while we run.
pub fn check_gpu_available() -> bool {
    static GPU_AVAILABLE: OnceLock<bool> = OnceLock::new();
    *GPU_AVAILABLE.get_or_init(|| {
        let available = Command::new("nvidia-smi")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false);
        info!(
            "GPU detection: {}",
            if available { "accelerator present" } else { "no accelerator" }
        );
        available
    })
}

/// Duration of an audio file in seconds, via ffprobe.
pub async fn audio_duration(config: &MediaConfig, audio_path: &Path) -> Result<f64> {
    let output = tokio::process::Command::new(&config.ffprobe_path)
        .arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("default=noprint_wrappers=1:nokey=1")
        .arg(audio_path)
        .output()
        .await
        .map_err(|e| SlidecastError::Media(format!("Failed to execute ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SlidecastError::Media(format!(
            "ffprobe failed for {}: {}",
            audio_path.display(),
            stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.trim().parse::<f64>().map_err(|e| {
        SlidecastError::Media(format!(
            "Unparseable duration for {}: {}",
            audio_path.display(),
            e
        ))
    })
}

/// Pixel dimensions of a still image, via ffprobe. Needed to validate
/// manual crop regions against the true source bounds.
pub async fn image_dimensions(config: &MediaConfig, image_path: &Path) -> Result<(u32, u32)> {
    let output = tokio::process::Command::new(&config.ffprobe_path)
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height")
        .arg("-of")
        .arg("csv=s=x:p=0")
        .arg(image_path)
        .output()
        .await
        .map_err(|e| SlidecastError::Media(format!("Failed to execute ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SlidecastError::Media(format!(
            "ffprobe failed for {}: {}",
            image_path.display(),
            stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_dimensions(stdout.trim()).ok_or_else(|| {
        SlidecastError::Media(format!(
            "Unparseable dimensions for {}: '{}'",
            image_path.display(),
            stdout.trim()
        ))
    })
}

fn parse_dimensions(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}
