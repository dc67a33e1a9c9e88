//! Detection sources.
//!
//! A detection source yields one ordered candidate list per frame, in stream
//! order, together with the stream's frame rate and frame count:
//! - `VideoDetectionSource`: decodes a local video file (`FileSource`) and runs
//!   a `DetectorBackend` on every frame
//! - `ReplaySource`: reads detections recorded earlier as JSON Lines
//!
//! Sources never skip or reorder frames. A source error aborts the pass.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod replay;
mod source;

pub use file::{FileConfig, FileSource};
pub use replay::{ReplayRecorder, ReplaySource};
pub use source::{DetectionSource, FrameDetections, VideoDetectionSource};
