use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SlidecastError};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "ogg", "flac"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// The inputs of one render job: a project folder holding a narration
/// track, ordered still images and an optional pre-written script.
/// Constructed once per job, immutable.
#[derive(Debug, Clone)]
pub struct ProjectInput {
    pub folder: PathBuf,
    pub voiceover: PathBuf,
    pub images: Vec<PathBuf>,
    pub script: Option<PathBuf>,
}

impl ProjectInput {
    /// The finished video is written alongside the sources, named after
    /// the folder itself.
    pub fn output_path(&self) -> PathBuf {
        let name = self
            .folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        self.folder.join(format!("{}.mp4", name))
    }

    /// Per-job temporary subtitle artifact, scoped to the job's own
    /// folder so concurrent jobs never share it.
    pub fn temp_srt_path(&self) -> PathBuf {
        self.folder.join("temp_captions.srt")
    }
}

/// Detect project files in a folder: the first audio file found becomes
/// the voiceover, images are ordered by filename, `script.txt` is
/// optional.
pub fn detect_files<P: AsRef<Path>>(folder: P) -> Result<ProjectInput> {
    let folder = folder.as_ref();
    if !folder.is_dir() {
        return Err(SlidecastError::FileNotFound(folder.display().to_string()));
    }

    let mut voiceover = None;
    let mut images = Vec::new();

    let mut entries: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    for path in &entries {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_lowercase(),
            None => continue,
        };
        if voiceover.is_none() && AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            voiceover = Some(path.clone());
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            images.push(path.clone());
        }
    }

    let script_path = folder.join("script.txt");
    let script = script_path.exists().then_some(script_path);

    let voiceover = voiceover.ok_or_else(|| {
        SlidecastError::Validation(format!(
            "Missing files in {}: voiceover audio",
            folder.display()
        ))
    })?;

    if images.is_empty() {
        return Err(SlidecastError::Validation(format!(
            "Missing files in {}: at least 1 image",
            folder.display()
        )));
    }

    debug!(
        "Detected project in {}: {} image(s), script: {}",
        folder.display(),
        images.len(),
        script.is_some()
    );

    Ok(ProjectInput {
        folder: folder.to_path_buf(),
        voiceover,
        images,
        script,
    })
}

/// Validate a folder without building a full input; returns a
/// human-readable summary of what was found.
pub fn validate_folder<P: AsRef<Path>>(folder: P) -> Result<String> {
    let input = detect_files(folder)?;
    let info = if input.images.len() == 1 {
        "Found 1 image (will be used throughout entire video)".to_string()
    } else {
        format!(
            "Found {} images (will be distributed across video duration)",
            input.images.len()
        )
    };
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_detect_files_orders_images_by_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "voiceover.mp3");
        touch(dir.path(), "02.jpg");
        touch(dir.path(), "01.png");
        touch(dir.path(), "03.webp");
        touch(dir.path(), "script.txt");

        let input = detect_files(dir.path()).unwrap();
        assert!(input.voiceover.ends_with("voiceover.mp3"));
        let names: Vec<_> = input
            .images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["01.png", "02.jpg", "03.webp"]);
        assert!(input.script.is_some());
    }

    #[test]
    fn test_missing_voiceover_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "01.png");
        let err = detect_files(dir.path()).unwrap_err();
        assert!(matches!(err, SlidecastError::Validation(_)));
    }

    #[test]
    fn test_missing_images_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "audio.wav");
        let err = detect_files(dir.path()).unwrap_err();
        assert!(matches!(err, SlidecastError::Validation(_)));
    }

    #[test]
    fn test_output_named_after_folder() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("my_story");
        std::fs::create_dir(&project).unwrap();
        touch(&project, "narration.mp3");
        touch(&project, "01.png");

        let input = detect_files(&project).unwrap();
        assert!(input.output_path().ends_with("my_story/my_story.mp4"));
        assert!(input.temp_srt_path().ends_with("my_story/temp_captions.srt"));
    }

    #[test]
    fn test_validate_folder_summary() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "narration.mp3");
        touch(dir.path(), "01.png");
        let info = validate_folder(dir.path()).unwrap();
        assert!(info.contains("1 image"));
    }
}
