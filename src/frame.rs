//! Decoded video frames and stream metadata.
//!
//! - `VideoFrame`: one decoded RGB24 frame with its stream index. Pixel bytes
//!   are only reachable through a detector run.
//! - `StreamInfo`: frame rate, frame count and geometry reported by a source.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::detect::{DetectionResult, DetectorBackend};

/// Stream-level metadata supplied by the video I/O layer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Frames per second.
    pub fps: f64,
    /// Frame count reported by the container; may be an estimate.
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
}

impl StreamInfo {
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }

    /// Number of frames covering the first `seconds` of the stream.
    pub fn frames_for(&self, seconds: f64) -> usize {
        let frames = (seconds * self.fps).floor();
        if frames.is_finite() && frames > 0.0 {
            frames as usize
        } else {
            0
        }
    }
}

/// One decoded frame of packed RGB24 pixels.
///
/// Not `Clone`: frames are handed to the detector and dropped.
pub struct VideoFrame {
    data: Vec<u8>,
    /// Zero-based position in the stream.
    pub index: usize,
    pub width: u32,
    pub height: u32,
}

impl VideoFrame {
    /// Create a frame. Called only by the ingestion layer.
    pub(crate) fn new(data: Vec<u8>, index: usize, width: u32, height: u32) -> Self {
        Self {
            data,
            index,
            width,
            height,
        }
    }

    /// Run a detector backend on this frame.
    pub fn run_detector<D: DetectorBackend + ?Sized>(
        &self,
        detector: &mut D,
    ) -> Result<DetectionResult> {
        detector.detect(&self.data, self.width, self.height)
    }

    /// Byte length of the pixel buffer.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Candidate, StubBackend};
    use crate::geometry::BoundingBox;

    #[test]
    fn frames_for_rounds_down() {
        let info = StreamInfo {
            fps: 29.97,
            frame_count: 1000,
            width: 1920,
            height: 1080,
        };
        assert_eq!(info.frames_for(40.0), 1198);
        assert_eq!(info.frames_for(0.0), 0);
        assert!((info.duration_secs() - 33.366).abs() < 1e-3);
    }

    #[test]
    fn run_detector_forwards_frame() -> Result<()> {
        let ball = Candidate::object(BoundingBox::new(1.0, 1.0, 5.0, 5.0), 0.7);
        let mut backend = StubBackend::with_script(vec![DetectionResult::new(vec![ball])]);
        let frame = VideoFrame::new(vec![0u8; 12], 0, 2, 2);
        let result = frame.run_detector(&mut backend)?;
        assert_eq!(result.candidates, vec![ball]);
        assert_eq!(frame.byte_len(), 12);
        Ok(())
    }
}
