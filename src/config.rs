use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, SlidecastError};

fn default_max_words() -> usize {
    15
}

fn default_max_chars() -> usize {
    75
}

fn default_wrap_width() -> usize {
    42
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub transcriber: TranscriberConfig,
    pub media: MediaConfig,
    pub video: VideoConfig,
    pub render: RenderConfig,
    pub style: RenderSettings,
    pub bitrate: BitrateTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Path to transcriber binary (e.g., whisper)
    pub binary_path: String,
    /// Model to use for transcription
    pub model: String,
    /// Device name for the accelerated path
    pub accelerated_device: String,
    /// Device name for the fallback path
    pub fallback_device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
    /// Looping grain/texture clip used by the noise overlay effect
    pub grain_asset: Option<PathBuf>,
    /// Audio encoding bitrate
    pub audio_bitrate: String,
    /// Audio sample rate in Hz
    pub audio_sample_rate: u32,
}

/// Output format presets: frame rate, rate-control quality and resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Frames per second (24 cinema, 30 standard, 60 smooth)
    pub fps: u32,
    /// Encoder quality knob: CRF on CPU paths, CQ on accelerated paths
    /// (32 low, 28 medium, 23 high, 18 maximum)
    pub quality: u32,
    /// Output resolution preset
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "2k")]
    Qhd,
    #[serde(rename = "4k")]
    Uhd,
}

impl Resolution {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Resolution::Hd720 => (1280, 720),
            Resolution::Hd1080 => (1920, 1080),
            Resolution::Qhd => (2560, 1440),
            Resolution::Uhd => (3840, 2160),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resolution::Hd720 => "720p HD",
            Resolution::Hd1080 => "1080p Full HD",
            Resolution::Qhd => "2K QHD",
            Resolution::Uhd => "4K Ultra HD",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Number of parallel render workers (clamped to 1..=4)
    pub max_workers: usize,
    /// Maximum words per caption chunk
    #[serde(default = "default_max_words")]
    pub max_words: usize,
    /// Maximum characters per caption chunk
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Display-width threshold for the midpoint line-wrap pass
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,
    /// Request hardware-accelerated decode/encode when available
    pub use_accelerator: bool,
}

impl RenderConfig {
    /// Worker count bounded to the supported pool range.
    pub fn worker_count(&self) -> usize {
        self.max_workers.clamp(1, 4)
    }
}

/// Caption style and motion effect settings. Immutable snapshot passed
/// into a job; never mutated mid-render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Font family; a trailing " Bold" suffix selects the bold face
    pub font: String,
    /// Font size in pixels at the output resolution
    pub font_size: u32,
    /// Caption text color as #RRGGBB
    pub text_color: String,
    /// Draw an opaque/semi-opaque box behind the text
    pub has_background: bool,
    pub bg_color: String,
    /// Background opacity in percent (0-100)
    pub bg_opacity: u8,
    /// Draw a stroke around the text (used when the background is off)
    pub has_outline: bool,
    pub outline_color: String,
    pub outline_width: u32,
    pub shadow_depth: u32,
    /// Normalized caption anchor, both axes in [0,1]
    pub caption_position: CaptionPosition,
    /// Case folding applied to final chunk text
    pub text_case: TextCase,
    /// Active motion effect names
    pub motion_effects: Vec<String>,
    /// Per-effect intensity, 0-100
    pub motion_effect_intensities: HashMap<String, u8>,
    /// Manual crop region in source-image pixel space
    pub crop: Option<CropRegion>,
}

impl RenderSettings {
    /// Caption text must always get some treatment: toggling the
    /// background off without explicitly enabling the outline implicitly
    /// enables it.
    pub fn normalized(mut self) -> Self {
        if !self.has_background && !self.has_outline {
            self.has_outline = true;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CaptionPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextCase {
    Title,
    Upper,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Bitrate heuristic constants, in Mbps. Targets are derived from frame
/// rate and whether a motion effect is active; static content compresses
/// better so it gets the lower curve. Tunable defaults, not contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitrateTuning {
    pub static_base: f64,
    pub static_per_fps: f64,
    pub static_max_base: f64,
    pub static_max_per_fps: f64,
    pub motion_base: f64,
    pub motion_per_fps: f64,
    pub motion_max_base: f64,
    pub motion_max_per_fps: f64,
}

impl BitrateTuning {
    /// Target bitrate string (e.g. "2M") for the given frame rate.
    pub fn target(&self, fps: u32, has_motion: bool) -> String {
        let mbps = if has_motion {
            self.motion_base + fps as f64 * self.motion_per_fps
        } else {
            self.static_base + fps as f64 * self.static_per_fps
        };
        format!("{}M", mbps as u64)
    }

    /// Maximum bitrate string for the given frame rate.
    pub fn maximum(&self, fps: u32, has_motion: bool) -> String {
        let mbps = if has_motion {
            self.motion_max_base + fps as f64 * self.motion_max_per_fps
        } else {
            self.static_max_base + fps as f64 * self.static_max_per_fps
        };
        format!("{}M", mbps as u64)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcriber: TranscriberConfig {
                binary_path: "whisper".to_string(),
                model: "base".to_string(),
                accelerated_device: "cuda".to_string(),
                fallback_device: "cpu".to_string(),
            },
            media: MediaConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
                grain_asset: None,
                audio_bitrate: "128k".to_string(),
                audio_sample_rate: 48000,
            },
            video: VideoConfig {
                fps: 30,
                quality: 28,
                resolution: Resolution::Hd1080,
            },
            render: RenderConfig {
                max_workers: 2,
                max_words: default_max_words(),
                max_chars: default_max_chars(),
                wrap_width: default_wrap_width(),
                use_accelerator: true,
            },
            style: RenderSettings {
                font: "Arial Bold".to_string(),
                font_size: 48,
                text_color: "#FFFF00".to_string(),
                has_background: true,
                bg_color: "#000000".to_string(),
                bg_opacity: 80,
                has_outline: false,
                outline_color: "#000000".to_string(),
                outline_width: 3,
                shadow_depth: 2,
                caption_position: CaptionPosition { x: 0.5, y: 0.9 },
                text_case: TextCase::Title,
                motion_effects: vec!["Static".to_string()],
                motion_effect_intensities: HashMap::from([
                    ("Noise".to_string(), 50),
                    ("Tilt".to_string(), 50),
                    ("Dynamic Tilt".to_string(), 50),
                ]),
                crop: None,
            },
            bitrate: BitrateTuning {
                static_base: 1.0,
                static_per_fps: 0.03,
                static_max_base: 1.5,
                static_max_per_fps: 0.04,
                motion_base: 1.5,
                motion_per_fps: 0.05,
                motion_max_base: 2.0,
                motion_max_per_fps: 0.06,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SlidecastError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SlidecastError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SlidecastError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
