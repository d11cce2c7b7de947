use std::path::Path;
use std::process::Stdio;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, warn};

use crate::error::{AudioloopError, Result};

use super::{CodecEngine, ProgressFn};

/// Production [`CodecEngine`] backed by the `ffmpeg` binary.
///
/// The working area is a temp directory owned by the engine; every `exec`
/// spawns one ffmpeg process with its current directory set there, so the
/// file names the pipelines use never leave it. Raw progress comes from
/// ffmpeg's `-progress pipe:1` stream, normalized against the `-t` argument
/// when the command carries one (the concat demuxer step does not, so that
/// step only reports its completion tick).
pub struct FfmpegEngine {
    workdir: TempDir,
}

impl FfmpegEngine {
    /// Probe ffmpeg availability and set up a working area.
    pub fn new() -> Result<Self> {
        check_ffmpeg()?;
        let workdir = TempDir::new().map_err(|e| {
            AudioloopError::EngineUnavailable(format!("failed to create working area: {e}"))
        })?;
        debug!("FFmpeg working area: {:?}", workdir.path());
        Ok(Self { workdir })
    }

    /// Get a file's duration in seconds using ffprobe.
    pub fn probe_duration(input: &Path) -> Result<f64> {
        if !input.exists() {
            return Err(AudioloopError::FileNotFound(input.display().to_string()));
        }
        let output = std::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .output()
            .map_err(|e| {
                AudioloopError::EngineUnavailable(format!(
                    "FFprobe not found. Please install FFmpeg (includes FFprobe). Error: {e}"
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AudioloopError::EngineFailure {
                step: "probe",
                input: input.display().to_string(),
                message: stderr.trim().to_string(),
            });
        }

        let duration_str = String::from_utf8_lossy(&output.stdout);
        duration_str
            .trim()
            .parse()
            .map_err(|e| AudioloopError::EngineFailure {
                step: "probe",
                input: input.display().to_string(),
                message: format!("failed to parse duration '{}': {e}", duration_str.trim()),
            })
    }

    fn working_path(&self, name: &str) -> Result<std::path::PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(AudioloopError::EngineFailure {
                step: "write",
                input: name.to_string(),
                message: "working file names must be plain file names".to_string(),
            });
        }
        Ok(self.workdir.path().join(name))
    }
}

#[async_trait::async_trait]
impl CodecEngine for FfmpegEngine {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.working_path(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AudioloopError::EngineFailure {
                step: "write",
                input: name.to_string(),
                message: e.to_string(),
            })?;
        debug!("Staged {} bytes as {}", bytes.len(), name);
        Ok(())
    }

    async fn exec(&self, args: &[String], progress: ProgressFn<'_>) -> Result<()> {
        let expected = expected_duration(args);
        debug!("ffmpeg {}", args.join(" "));

        let mut child = tokio::process::Command::new("ffmpeg")
            .current_dir(self.workdir.path())
            .args(["-hide_banner", "-nostdin", "-y", "-progress", "pipe:1"])
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AudioloopError::EngineFailure {
                step: "exec",
                input: args.join(" "),
                message: format!("failed to spawn ffmpeg: {e}"),
            })?;

        // stderr must be drained while the stdout loop runs: ffmpeg's dts
        // warnings during stream copies can exceed the pipe buffer, and a
        // full undrained pipe blocks the child before it closes stdout.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut captured = String::new();
                let _ = stderr.read_to_string(&mut captured).await;
                captured
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let Some(value) = line.strip_prefix("out_time_us=") else {
                    continue;
                };
                let Ok(time_us) = value.trim().parse::<i64>() else {
                    continue;
                };
                if time_us <= 0 {
                    continue;
                }
                if let Some(total) = expected {
                    let current_secs = time_us as f64 / 1_000_000.0;
                    progress((current_secs / total).min(1.0));
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| AudioloopError::EngineFailure {
                step: "exec",
                input: args.join(" "),
                message: format!("failed to wait for ffmpeg: {e}"),
            })?;

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            warn!("ffmpeg exited with {}: {}", status, stderr.trim());
            return Err(AudioloopError::EngineFailure {
                step: "exec",
                input: args.join(" "),
                message: last_lines(&stderr, 4),
            });
        }

        progress(1.0);
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.working_path(name)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| AudioloopError::EngineFailure {
                step: "read",
                input: name.to_string(),
                message: e.to_string(),
            })?;
        debug!("Read {} bytes from {}", bytes.len(), name);
        Ok(bytes)
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    let output = std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| {
            AudioloopError::EngineUnavailable(format!(
                "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(AudioloopError::EngineUnavailable(
            "FFmpeg check failed".to_string(),
        ));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Output duration in seconds implied by a `-t` argument, if any.
fn expected_duration(args: &[String]) -> Option<f64> {
    let position = args.iter().position(|a| a == "-t")?;
    let value: f64 = args.get(position + 1)?.parse().ok()?;
    (value > 0.0).then_some(value)
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ffmpeg_available() -> bool {
        std::process::Command::new("ffmpeg")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_check_ffmpeg() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available or broken");
            return;
        }
        let result = check_ffmpeg();
        assert!(result.is_ok(), "FFmpeg check failed: {:?}", result.err());
    }

    #[test]
    fn test_expected_duration() {
        let args: Vec<String> = ["-i", "input.mp3", "-ss", "2.000", "-t", "3.000", "-c", "copy"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(expected_duration(&args), Some(3.0));

        let args: Vec<String> = ["-f", "concat", "-i", "list.txt"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(expected_duration(&args), None);

        let args: Vec<String> = ["-t"].iter().map(|s| s.to_string()).collect();
        assert_eq!(expected_duration(&args), None);
    }

    #[test]
    fn test_working_path_rejects_traversal() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }
        let engine = FfmpegEngine::new().unwrap();
        assert!(engine.working_path("input.mp3").is_ok());
        assert!(engine.working_path("../escape.mp3").is_err());
        assert!(engine.working_path("a/b.mp3").is_err());
        assert!(engine.working_path("").is_err());
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\nc\nd\ne", 2), "d\ne");
        assert_eq!(last_lines("only", 4), "only");
    }
}
