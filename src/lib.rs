//! Slidecast - Caption-Synchronized Video Assembly
//!
//! Turns a project folder (one narration audio track plus one or more still
//! images) into a finished captioned video: whisper transcription with
//! GPU/CPU fallback, caption segmentation, ASS subtitle styling, motion
//! effect filter graphs, and batch rendering through ffmpeg.

pub mod cli;
pub mod config;
pub mod error;
pub mod project;
pub mod caption;
pub mod style;
pub mod effects;
pub mod transcribe;
pub mod media;
pub mod render;
pub mod workflow;
