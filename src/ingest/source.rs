use anyhow::{Context, Result};

use super::file::FileSource;
use crate::detect::{DetectionResult, DetectorBackend};
use crate::frame::StreamInfo;

/// Candidates for one frame, tagged with the frame's stream index.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameDetections {
    pub index: usize,
    pub detections: DetectionResult,
}

/// Ordered per-frame detections for one stream.
pub trait DetectionSource {
    /// Short label for logs and reports.
    fn describe(&self) -> String;

    /// Frame rate and reported frame count.
    fn stream_info(&self) -> StreamInfo;

    /// Detections for the next frame; `None` once the stream is exhausted.
    fn next_detections(&mut self) -> Result<Option<FrameDetections>>;
}

/// Decodes frames from a file and runs a detector backend on each one.
pub struct VideoDetectionSource<B: DetectorBackend> {
    source: FileSource,
    backend: B,
    path: String,
}

impl<B: DetectorBackend> VideoDetectionSource<B> {
    /// Connect the file source and warm up the backend.
    pub fn open(mut source: FileSource, mut backend: B) -> Result<Self> {
        source.connect()?;
        backend
            .warm_up()
            .with_context(|| format!("warm up detector backend '{}'", backend.name()))?;
        let path = source.stats().path;
        Ok(Self {
            source,
            backend,
            path,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: DetectorBackend> DetectionSource for VideoDetectionSource<B> {
    fn describe(&self) -> String {
        format!("{} ({})", self.path, self.backend.name())
    }

    fn stream_info(&self) -> StreamInfo {
        self.source.info()
    }

    fn next_detections(&mut self) -> Result<Option<FrameDetections>> {
        let Some(frame) = self.source.next_frame()? else {
            return Ok(None);
        };
        let detections = frame
            .run_detector(&mut self.backend)
            .with_context(|| format!("detector failed on frame {}", frame.index))?;
        Ok(Some(FrameDetections {
            index: frame.index,
            detections,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Candidate, StubBackend};
    use crate::geometry::BoundingBox;
    use crate::ingest::FileConfig;

    #[test]
    fn video_source_pairs_frames_with_detections() -> Result<()> {
        let ball = Candidate::object(BoundingBox::new(10.0, 10.0, 20.0, 20.0), 0.6);
        let backend = StubBackend::with_script(vec![
            DetectionResult::default(),
            DetectionResult::new(vec![ball]),
        ]);
        let file = FileSource::new(FileConfig {
            synthetic_frames: 3,
            synthetic_width: 2,
            synthetic_height: 2,
            ..FileConfig::new("stub://rally")
        })?;
        let mut source = VideoDetectionSource::open(file, backend)?;
        assert_eq!(source.stream_info().frame_count, 3);
        assert!(source.describe().contains("stub"));

        let first = source.next_detections()?.expect("frame 0");
        assert_eq!(first.index, 0);
        assert!(first.detections.is_empty());

        let second = source.next_detections()?.expect("frame 1");
        assert_eq!(second.index, 1);
        assert_eq!(second.detections.candidates, vec![ball]);

        assert!(source.next_detections()?.is_some());
        assert!(source.next_detections()?.is_none());
        assert_eq!(source.backend().calls(), 3);
        Ok(())
    }
}
