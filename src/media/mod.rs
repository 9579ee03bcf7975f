//! ffmpeg-based media plumbing.
//!
//! Audio normalization, segmentation, and video frame sampling. A missing
//! ffmpeg/ffprobe binary is a fatal, non-retriable failure for the job that
//! needed it.

mod audio;
mod frames;

pub use audio::{prepare_audio, probe_duration, split_audio};
pub use frames::extract_frames;
