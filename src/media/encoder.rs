use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::config::{BitrateTuning, MediaConfig, VideoConfig};
use crate::effects::EffectPlan;
use crate::error::{Result, SlidecastError};
use crate::media::commands::MediaCommand;
use crate::project::ProjectInput;
use crate::style::StyleDescriptor;

/// Assembles the full encoder invocation: input ordering, filter-graph
/// wiring, rate control and stream mapping.
pub struct EncodeCommandBuilder<'a> {
    media: &'a MediaConfig,
    video: &'a VideoConfig,
    bitrate: &'a BitrateTuning,
}

impl<'a> EncodeCommandBuilder<'a> {
    pub fn new(media: &'a MediaConfig, video: &'a VideoConfig, bitrate: &'a BitrateTuning) -> Self {
        Self {
            media,
            video,
            bitrate,
        }
    }

    /// Build the encode command.
    ///
    /// Input order is fixed: one looping input per image (each trimmed to
    /// its proportional share of the duration), then the audio track, then
    /// the looping grain clip when the plan composites an overlay. The
    /// filter graph wires per-image prep, concatenation, the optional
    /// transform chain, the optional overlay composite, and the subtitle
    /// burn-in, in that order.
    ///
    /// `use_accelerator` should already reflect hardware availability.
    /// A manual crop suppresses only the accelerated decode flags (crop
    /// filtering is unreliable under some accelerated decode paths); the
    /// encoder itself stays on NVENC whenever acceleration is requested.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        project: &ProjectInput,
        per_image_filters: &[String],
        srt_path: &Path,
        style: &StyleDescriptor,
        plan: &EffectPlan,
        duration: f64,
        output_path: &Path,
        use_accelerator: bool,
        has_manual_crop: bool,
    ) -> Result<MediaCommand> {
        let num_images = project.images.len();
        if num_images == 0 || per_image_filters.len() != num_images {
            return Err(SlidecastError::Media(
                "Per-image filter count does not match image count".to_string(),
            ));
        }

        let fps = self.video.fps;
        let time_per_image = duration / num_images as f64;
        let hw_decode = use_accelerator && !has_manual_crop;
        if use_accelerator && has_manual_crop {
            info!("Disabling accelerated decode due to custom crop (compatibility)");
        }

        let mut cmd = MediaCommand::new(&self.media.ffmpeg_path, "Video assembly").overwrite();

        if hw_decode {
            cmd = cmd.args(["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"]);
        }

        // Image inputs, each looped for its share of the timeline.
        for image in &project.images {
            cmd = cmd
                .arg("-loop")
                .arg("1")
                .arg("-framerate")
                .arg(fps.to_string())
                .arg("-t")
                .arg(time_per_image.to_string())
                .input(image);
        }

        // Exactly one audio input.
        cmd = cmd.input(&project.voiceover);

        // Optional looping overlay input.
        let overlay_index = num_images + 1;
        if let Some(overlay) = &plan.overlay {
            cmd = cmd
                .arg("-stream_loop")
                .arg("-1")
                .arg("-t")
                .arg(duration.to_string())
                .input(&overlay.asset);
        }

        let mut filter_parts: Vec<String> = Vec::new();

        for (i, filter) in per_image_filters.iter().enumerate() {
            filter_parts.push(format!("[{i}:v]{filter}[v{i}]"));
        }

        let concat_inputs: String = (0..num_images).map(|i| format!("[v{i}]")).collect();
        filter_parts.push(format!(
            "{concat_inputs}concat=n={num_images}:v=1:a=0[vconcat]"
        ));

        // Video-level effects apply to the concatenated stream, not per
        // image; transforms come before the overlay so grain is not
        // distorted by rotation/zoom.
        let mut current = "[vconcat]".to_string();
        if !plan.transforms.is_empty() {
            filter_parts.push(format!("{current}{}[vmotion]", plan.transform_chain()));
            current = "[vmotion]".to_string();
        }

        if let Some(overlay) = &plan.overlay {
            let (w, h) = self.video.resolution.dimensions();
            filter_parts.push(format!(
                "[{overlay_index}:v]scale={w}:{h},format=rgba,colorchannelmixer=aa={:.2}[grain]",
                overlay.opacity
            ));
            filter_parts.push(format!("{current}[grain]overlay=0:0:shortest=1[vfx]"));
            current = "[vfx]".to_string();
        }

        let srt_escaped = escape_filter_path(srt_path);
        filter_parts.push(format!(
            "{current}subtitles='{srt_escaped}':force_style='{}'[vout]",
            style.to_force_style()
        ));

        cmd = cmd.arg("-filter_complex").arg(filter_parts.join(";"));

        cmd = cmd.args(["-map", "[vout]"]);
        cmd = cmd.arg("-map").arg(format!("{num_images}:a"));

        let has_motion = plan.has_motion();
        let target_bitrate = self.bitrate.target(fps, has_motion);
        let max_bitrate = self.bitrate.maximum(fps, has_motion);
        debug!(
            "Using smart bitrate: {} (max: {})",
            target_bitrate, max_bitrate
        );

        let quality = self.video.quality;
        if use_accelerator {
            cmd = cmd.args([
                "-c:v",
                "h264_nvenc",
                "-preset",
                "p1",
                "-tune",
                "hq",
                "-rc",
                "vbr",
                "-cq",
                &quality.to_string(),
                "-b:v",
                &target_bitrate,
                "-maxrate",
                &max_bitrate,
                "-bufsize",
                "4M",
                "-profile:v",
                "high",
                "-level",
                "4.2",
                "-spatial-aq",
                "1",
                "-temporal-aq",
                "1",
                "-rc-lookahead",
                "20",
            ]);
            info!("Using accelerated encoding at {} fps, CQ={}", fps, quality);
        } else {
            cmd = cmd.args([
                "-c:v",
                "libx264",
                "-preset",
                "faster",
                "-tune",
                "film",
                "-crf",
                &quality.to_string(),
                "-profile:v",
                "high",
                "-level",
                "4.2",
            ]);
            info!("Using CPU encoding at {} fps, CRF={}", fps, quality);
        }

        cmd = cmd.args([
            "-c:a",
            "aac",
            "-b:a",
            &self.media.audio_bitrate,
            "-ar",
            &self.media.audio_sample_rate.to_string(),
        ]);

        cmd = cmd.args(["-threads", "0"]);
        cmd = cmd.output(output_path);

        Ok(cmd)
    }
}

/// Escape a path for use inside a filter-graph argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "'\\''")
}

/// Map an encoder diagnostic line to a progress percentage and status.
///
/// The stderr stream is the only progress channel: an explicit frame
/// counter is preferred, a wall-clock timestamp is the fallback. Both map
/// into the 20-99 encoding band (0-20 is transcription/setup, 100 is
/// post-cleanup). Returns None for lines without a progress marker.
pub fn parse_progress(line: &str, duration: f64) -> Option<(u8, String)> {
    static FRAME_RE: OnceLock<Regex> = OnceLock::new();
    static TIME_RE: OnceLock<Regex> = OnceLock::new();

    if duration <= 0.0 {
        return None;
    }

    let frame_re = FRAME_RE.get_or_init(|| Regex::new(r"frame=\s*(\d+)").unwrap());
    if let Some(caps) = frame_re.captures(line) {
        let current_frame: f64 = caps[1].parse().ok()?;
        let total_frames = duration * 30.0;
        let progress = ((current_frame / total_frames) * 80.0).min(79.0) as u8 + 20;
        let current_time = current_frame / 30.0;
        let status = format!(
            "Rendering video... {}/{}s",
            current_time as u64, duration as u64
        );
        return Some((progress, status));
    }

    let time_re = TIME_RE
        .get_or_init(|| Regex::new(r"time=(?:(\d{1,2}):)?(\d{1,2}):(\d{2}(?:\.\d{2})?)").unwrap());
    if let Some(caps) = time_re.captures(line) {
        let hours: f64 = caps
            .get(1)
            .map(|m| m.as_str().parse().unwrap_or(0.0))
            .unwrap_or(0.0);
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        let current_time = hours * 3600.0 + minutes * 60.0 + seconds;

        let progress = ((current_time / duration) * 75.0).min(75.0) as u8 + 20;
        let status = format!(
            "Rendering video... {}/{}s",
            current_time as u64, duration as u64
        );
        return Some((progress, status));
    }

    None
}
