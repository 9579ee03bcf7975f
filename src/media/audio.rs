//! Audio extraction and segmentation via ffmpeg.
//!
//! ASR models are trained on 16 kHz mono audio, so every source file is
//! normalized to that shape before transcription regardless of container.

use crate::error::{LeteError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Sample rate required by the transcription capability.
const REQUIRED_SAMPLE_RATE: u32 = 16_000;

/// Extract the audio track from any media file and normalize it to
/// mono 16 kHz MP3. Works for both audio and video containers.
#[instrument(skip(output_dir), fields(input = %input.display()))]
pub async fn prepare_audio(input: &Path, output_dir: &Path, stem: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let output = output_dir.join(format!("{}_prepared.mp3", stem));

    debug!("Normalizing audio to mono {} Hz", REQUIRED_SAMPLE_RATE);

    let result = Command::new("ffmpeg")
        .arg("-i").arg(input)
        .arg("-vn")
        .arg("-ac").arg("1")
        .arg("-ar").arg(REQUIRED_SAMPLE_RATE.to_string())
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(&output)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(output),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(LeteError::Media(format!("ffmpeg audio extraction failed: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(LeteError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(LeteError::Media(format!("ffmpeg error: {e}"))),
    }
}

/// Segment a long audio file into bounded chunks for the transcription API.
///
/// Returns `(chunk_path, offset_seconds)` tuples in playback order. Short
/// files are returned unsplit.
#[instrument(skip_all)]
pub async fn split_audio(
    source: &Path,
    output_dir: &Path,
    chunk_seconds: u32,
) -> Result<Vec<(PathBuf, f64)>> {
    std::fs::create_dir_all(output_dir)?;

    let total_duration = probe_duration(source).await?;
    info!("Total audio duration: {:.1}s", total_duration);

    let chunk_len = chunk_seconds as f64;

    if total_duration <= chunk_len {
        return Ok(vec![(source.to_path_buf(), 0.0)]);
    }

    let base_name = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");

    let mut segments = Vec::new();
    let mut offset = 0.0;
    let mut idx = 0u32;

    while offset < total_duration {
        let segment_path = output_dir.join(format!("{}_{:04}.mp3", base_name, idx));
        let segment_len = chunk_len.min(total_duration - offset);

        extract_segment(source, &segment_path, offset, segment_len).await?;

        debug!("Created segment {} at offset {:.1}s", idx, offset);
        segments.push((segment_path, offset));

        offset += chunk_len;
        idx += 1;
    }

    info!("Created {} audio segments", segments.len());
    Ok(segments)
}

/// Extract a time window from an audio file.
async fn extract_segment(source: &Path, dest: &Path, start: f64, length: f64) -> Result<()> {
    // First attempt: stream copy (fast, no quality loss)
    let copy_result = Command::new("ffmpeg")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-c").arg("copy")
        .arg("-y")
        .arg("-loglevel").arg("warning")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    if let Ok(status) = copy_result {
        if status.success() && dest.exists() {
            return Ok(());
        }
    }

    // Fallback: re-encode
    warn!("Stream copy failed, re-encoding segment");

    let encode_result = Command::new("ffmpeg")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match encode_result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(LeteError::Media(format!("Segment extraction failed: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(LeteError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(LeteError::Media(format!("ffmpeg error: {e}"))),
    }
}

/// Query the duration of a media file using ffprobe with JSON output.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LeteError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(LeteError::Media(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(LeteError::Media("ffprobe returned error".into()));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| LeteError::Media("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| LeteError::Media("Could not determine media duration".into()))
}
