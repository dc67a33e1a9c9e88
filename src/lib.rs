//! Rally Splitter
//!
//! Finds rallies in match footage from per-frame ball detections and cuts
//! each one into its own clip.
//!
//! # Architecture
//!
//! A pass runs in two phases:
//!
//! 1. **Scan**: every frame's candidates go through the frame classifier
//!    (size filter, shoe filter, teleport filter) and the outcome is recorded
//!    in a [`Timeline`] of presence flags and forced cuts.
//! 2. **Segment**: the finished timeline is split into rallies with a
//!    gap-tolerant, cut-aware state machine. Rallies not longer than the
//!    minimum duration are dropped.
//!
//! Segmentation is a pure function of the timeline, so a saved timeline can be
//! re-segmented with new thresholds without scanning the video again.
//!
//! # Module Structure
//!
//! - `geometry`: points, boxes, displacement
//! - `detect`: candidates and detector backends (stub, ONNX via tract)
//! - `ingest`: frame sources and detection sources (video, replay)
//! - `classify`: per-frame valid / teleport / absent decision
//! - `timeline`: presence and cut record for a pass
//! - `segment`: rally segmentation
//! - `pipeline`: the sequential pass driver
//! - `export`: ffmpeg stream-copy clip export
//! - `report`: JSON report of a pass
//! - `config`: file and environment configuration

pub mod classify;
pub mod config;
pub mod detect;
pub mod export;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod pipeline;
pub mod report;
pub mod segment;
pub mod timeline;

pub use classify::{classify_frame, ClassifierConfig, FrameClassifier, FrameOutcome, FrameReport};
pub use config::RallyConfig;
pub use detect::{Candidate, CandidateClass, DetectionResult, DetectorBackend};
pub use export::ClipExporter;
pub use frame::{StreamInfo, VideoFrame};
pub use geometry::{BoundingBox, Point};
pub use ingest::{DetectionSource, FileConfig, FileSource, ReplaySource, VideoDetectionSource};
pub use pipeline::{run_pass, PassObserver, PassOptions, PassSummary};
pub use report::RallyReport;
pub use segment::{segment_timeline, Rally, SegmentationConfig};
pub use timeline::Timeline;
