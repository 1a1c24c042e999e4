use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::config::TextCase;
use crate::error::{Result, SlidecastError};

/// A timed segment as emitted by the transcription backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A display-ready caption chunk satisfying the configured word and
/// character bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionChunk {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Terminal punctuation that marks a preferred break point.
fn ends_in_terminal_punctuation(word: &str) -> bool {
    matches!(
        word.chars().last(),
        Some(',' | '.' | '!' | '?' | ';' | ':')
    )
}

/// Split transcribed segments into caption chunks under word/character
/// limits.
///
/// A segment already within both limits passes through unchanged. Longer
/// segments are walked word by word: a break is forced when adding the
/// next word would exceed either limit, and taken early after a word
/// ending in terminal punctuation once the pending chunk holds at least
/// `max_words / 2` words. The remainder is always flushed, so no trailing
/// words are dropped. Chunk timing is a uniform subdivision of the
/// segment's span.
pub fn split_segments(
    segments: &[CaptionSegment],
    max_words: usize,
    max_chars: usize,
) -> Vec<CaptionChunk> {
    let mut chunks = Vec::new();

    for segment in segments {
        let words: Vec<&str> = segment.text.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        let char_count = segment.text.trim().chars().count();
        if words.len() <= max_words && char_count <= max_chars {
            chunks.push(CaptionChunk {
                start: segment.start,
                end: segment.end,
                text: words.join(" "),
            });
            continue;
        }

        let texts = split_words(&words, max_words, max_chars);
        let duration = segment.end - segment.start;
        let n = texts.len() as f64;

        for (i, text) in texts.into_iter().enumerate() {
            let start = segment.start + (i as f64) * duration / n;
            let end = segment.start + (i as f64 + 1.0) * duration / n;
            chunks.push(CaptionChunk { start, end, text });
        }
    }

    debug!(
        "Split {} segments into {} caption chunks",
        segments.len(),
        chunks.len()
    );
    chunks
}

fn split_words(words: &[&str], max_words: usize, max_chars: usize) -> Vec<String> {
    let mut texts = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    let mut pending_chars = 0usize;

    for &word in words {
        let word_chars = word.chars().count();
        let joined_chars = if pending.is_empty() {
            word_chars
        } else {
            pending_chars + 1 + word_chars
        };

        // A single word longer than max_chars still becomes its own
        // chunk; an empty pending buffer always accepts the word.
        if !pending.is_empty() && (pending.len() + 1 > max_words || joined_chars > max_chars) {
            texts.push(pending.join(" "));
            pending = vec![word];
            pending_chars = word_chars;
        } else {
            pending.push(word);
            pending_chars = joined_chars;
        }

        // Softer, preferred break point at terminal punctuation.
        if ends_in_terminal_punctuation(word) && pending.len() >= max_words / 2 {
            texts.push(pending.join(" "));
            pending = Vec::new();
            pending_chars = 0;
        }
    }

    if !pending.is_empty() {
        texts.push(pending.join(" "));
    }

    texts
}

/// Insert a single line break near the midpoint of a chunk text that
/// exceeds the display width, for renderers without native word-wrap.
pub fn wrap_midpoint(text: &str, wrap_width: usize) -> String {
    if text.chars().count() <= wrap_width {
        return text.to_string();
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 2 {
        return text.to_string();
    }

    let half = text.chars().count() / 2;
    let mut first = Vec::new();
    let mut consumed = 0usize;
    let mut split_at = words.len() - 1;

    for (i, word) in words.iter().enumerate() {
        consumed += word.chars().count() + 1;
        first.push(*word);
        if consumed >= half && i + 1 < words.len() {
            split_at = i;
            break;
        }
    }

    let second: Vec<&str> = words[split_at + 1..].to_vec();
    if second.is_empty() {
        return text.to_string();
    }

    format!("{}\n{}", first.join(" "), second.join(" "))
}

/// Apply the configured case folding to final chunk text.
pub fn apply_text_case(text: &str, case: TextCase) -> String {
    match case {
        TextCase::Normal => text.to_string(),
        TextCase::Upper => text.to_uppercase(),
        TextCase::Title => text
            .split(' ')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Generate an SRT subtitle file from caption chunks.
pub async fn write_srt<P: AsRef<Path>>(chunks: &[CaptionChunk], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();

    let mut srt_content = String::new();
    for (index, chunk) in chunks.iter().enumerate() {
        let start_time = format_srt_time(chunk.start);
        let end_time = format_srt_time(chunk.end);

        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            start_time,
            end_time,
            chunk.text.trim()
        ));
    }

    fs::write(output_path, srt_content)
        .await
        .map_err(SlidecastError::Io)?;

    info!(
        "SRT file written: {} ({} captions)",
        output_path.display(),
        chunks.len()
    );
    Ok(())
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds * 1000.0) as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
