use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SlidecastError};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Execute and wait, failing on a non-zero exit.
    pub async fn execute(&self) -> Result<()> {
        debug!(
            "Executing media processing command: {} {:?}",
            self.binary_path, self.args
        );

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| SlidecastError::Media(format!("Failed to execute media processor: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SlidecastError::Media(format!(
                "{} failed: {}",
                self.description, stderr
            )));
        }

        Ok(())
    }

    /// Execute while streaming diagnostic output line-by-line to the
    /// callback. Returns the last stderr lines alongside success so
    /// failures can be reported with context. This is the only progress
    /// channel the encoder offers.
    pub async fn execute_streaming<F>(&self, mut on_line: F) -> Result<(bool, Vec<String>)>
    where
        F: FnMut(&str),
    {
        debug!(
            "Executing media processing command (streaming): {} {:?}",
            self.binary_path, self.args
        );

        let mut child = Command::new(&self.binary_path)
            .args(&self.args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SlidecastError::Media(format!("Failed to spawn media processor: {}", e)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SlidecastError::Media("Failed to capture stderr".to_string()))?;

        let mut lines = BufReader::new(stderr).lines();
        let mut tail: Vec<String> = Vec::new();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| SlidecastError::Media(format!("Failed to read stderr: {}", e)))?
        {
            on_line(&line);
            tail.push(line);
            if tail.len() > 20 {
                tail.remove(0);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| SlidecastError::Media(format!("Failed to wait for media processor: {}", e)))?;

        Ok((status.success(), tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_style_args() {
        let cmd = MediaCommand::new("ffmpeg", "test")
            .overwrite()
            .input("/tmp/in.png")
            .arg("-t")
            .arg("3.5")
            .output("/tmp/out.mp4");
        assert_eq!(
            cmd.args,
            vec!["-y", "-i", "/tmp/in.png", "-t", "3.5", "/tmp/out.mp4"]
        );
    }

    #[tokio::test]
    async fn test_execute_missing_binary_is_media_error() {
        let cmd = MediaCommand::new("definitely-not-a-binary-xyz", "test");
        let err = cmd.execute().await.unwrap_err();
        assert!(matches!(err, SlidecastError::Media(_)));
    }
}
