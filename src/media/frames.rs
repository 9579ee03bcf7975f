//! Video frame sampling via ffmpeg.

use crate::error::{LeteError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, instrument};

/// Sample frames from a video at a fixed interval and save them as JPEGs.
///
/// Returns `(frame_path, timestamp_seconds)` tuples in playback order. The
/// timestamp is the nominal sampling position (`index * interval`), which is
/// what later captions cite.
#[instrument(skip(output_dir), fields(video = %video.display()))]
pub async fn extract_frames(
    video: &Path,
    output_dir: &Path,
    interval_seconds: u32,
) -> Result<Vec<(PathBuf, f64)>> {
    std::fs::create_dir_all(output_dir)?;

    let interval = interval_seconds.max(1);
    let pattern = output_dir.join("frame_%04d.jpg");

    let result = Command::new("ffmpeg")
        .arg("-i").arg(video)
        .arg("-vf").arg(format!("fps=1/{}", interval))
        .arg("-q:v").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(&pattern)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => {}
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            return Err(LeteError::Media(format!("ffmpeg frame sampling failed: {err}")));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LeteError::ToolNotFound("ffmpeg".into()));
        }
        Err(e) => {
            return Err(LeteError::Media(format!("ffmpeg error: {e}")));
        }
    }

    let mut frame_paths: Vec<PathBuf> = std::fs::read_dir(output_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("frame_") && n.ends_with(".jpg"))
                .unwrap_or(false)
        })
        .collect();
    frame_paths.sort();

    let frames: Vec<(PathBuf, f64)> = frame_paths
        .into_iter()
        .enumerate()
        .map(|(idx, path)| (path, (idx as u32 * interval) as f64))
        .collect();

    info!("Sampled {} frames at {}s intervals", frames.len(), interval);
    Ok(frames)
}
