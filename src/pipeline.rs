//! Single sequential rally-detection pass.
//!
//! Frames are pulled from a [`DetectionSource`] in stream order, classified,
//! and recorded into a [`Timeline`]. Once the source is exhausted (or the
//! configured time limit is reached) the finished timeline is segmented into
//! rallies. Any source or detector error aborts the pass; no partial rally list
//! is ever returned.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::classify::{ClassifierConfig, FrameClassifier, FrameOutcome, FrameReport};
use crate::frame::StreamInfo;
use crate::ingest::{DetectionSource, FrameDetections};
use crate::segment::{segment_timeline, Rally, SegmentationConfig};
use crate::timeline::Timeline;

const PROGRESS_LOG_EVERY: usize = 100;

/// Thresholds and limits for one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PassOptions {
    pub classifier: ClassifierConfig,
    pub segmentation: SegmentationConfig,
    /// Stop after this many seconds of footage.
    pub max_seconds: Option<f64>,
}

/// Hooks invoked while a pass runs. All methods default to no-ops.
pub trait PassObserver {
    fn on_start(&mut self, _info: &StreamInfo) -> Result<()> {
        Ok(())
    }

    fn on_frame(&mut self, _frame: &FrameDetections, _report: &FrameReport) -> Result<()> {
        Ok(())
    }

    fn on_finish(&mut self, _frames_processed: usize) -> Result<()> {
        Ok(())
    }
}

impl PassObserver for () {}

impl<A: PassObserver, B: PassObserver> PassObserver for (A, B) {
    fn on_start(&mut self, info: &StreamInfo) -> Result<()> {
        self.0.on_start(info)?;
        self.1.on_start(info)
    }

    fn on_frame(&mut self, frame: &FrameDetections, report: &FrameReport) -> Result<()> {
        self.0.on_frame(frame, report)?;
        self.1.on_frame(frame, report)
    }

    fn on_finish(&mut self, frames_processed: usize) -> Result<()> {
        self.0.on_finish(frames_processed)?;
        self.1.on_finish(frames_processed)
    }
}

impl<T: PassObserver> PassObserver for Option<T> {
    fn on_start(&mut self, info: &StreamInfo) -> Result<()> {
        match self {
            Some(inner) => inner.on_start(info),
            None => Ok(()),
        }
    }

    fn on_frame(&mut self, frame: &FrameDetections, report: &FrameReport) -> Result<()> {
        match self {
            Some(inner) => inner.on_frame(frame, report),
            None => Ok(()),
        }
    }

    fn on_finish(&mut self, frames_processed: usize) -> Result<()> {
        match self {
            Some(inner) => inner.on_finish(frames_processed),
            None => Ok(()),
        }
    }
}

/// Per-outcome frame counts for a pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    pub frames_processed: usize,
    pub valid: usize,
    pub teleports: usize,
    pub absent: usize,
    pub rejected_oversized: u64,
    pub rejected_shoe: u64,
}

impl PassStats {
    fn record(&mut self, report: &FrameReport) {
        self.frames_processed += 1;
        match report.outcome {
            FrameOutcome::Valid(_) => self.valid += 1,
            FrameOutcome::Teleport { .. } => self.teleports += 1,
            FrameOutcome::Absent => self.absent += 1,
        }
        self.rejected_oversized += u64::from(report.rejected_oversized);
        self.rejected_shoe += u64::from(report.rejected_shoe);
    }
}

/// Everything a completed pass produced.
#[derive(Clone, Debug)]
pub struct PassSummary {
    pub source: String,
    pub info: StreamInfo,
    pub stats: PassStats,
    pub timeline: Timeline,
    pub rallies: Vec<Rally>,
}

/// Run a full pass over `source`.
pub fn run_pass<S, O>(source: &mut S, opts: &PassOptions, observer: &mut O) -> Result<PassSummary>
where
    S: DetectionSource + ?Sized,
    O: PassObserver + ?Sized,
{
    let info = source.stream_info();
    if !(info.fps.is_finite() && info.fps > 0.0) {
        return Err(anyhow!(
            "source {} reports invalid frame rate {}",
            source.describe(),
            info.fps
        ));
    }
    let frame_limit = opts.max_seconds.map(|secs| info.frames_for(secs));

    log::info!(
        "pass started: {} @ {:.3} fps, {} frames reported",
        source.describe(),
        info.fps,
        info.frame_count
    );
    observer.on_start(&info)?;

    let mut classifier = FrameClassifier::new(opts.classifier);
    let mut timeline = Timeline::new(info.fps, info.frame_count);
    let mut stats = PassStats::default();

    while let Some(frame) = source.next_detections()? {
        if frame_limit.is_some_and(|limit| frame.index >= limit) {
            log::info!("time limit reached at frame {}", frame.index);
            break;
        }

        let report = classifier.classify(&frame.detections);
        timeline.record(frame.index, &report.outcome);
        stats.record(&report);

        match report.outcome {
            FrameOutcome::Teleport { distance } => {
                log::debug!("frame {}: forced cut (teleport {:.0}px)", frame.index, distance);
            }
            _ if report.rejected_oversized + report.rejected_shoe > 0 => {
                log::trace!(
                    "frame {}: rejected {} oversized, {} shoe-zone",
                    frame.index,
                    report.rejected_oversized,
                    report.rejected_shoe
                );
            }
            _ => {}
        }
        if stats.frames_processed % PROGRESS_LOG_EVERY == 0 {
            log::debug!("scanning: {}/{}", frame.index + 1, info.frame_count);
        }

        observer.on_frame(&frame, &report)?;
    }

    if let Some(limit) = frame_limit {
        timeline.truncate(limit);
    }
    observer.on_finish(stats.frames_processed)?;

    let rallies = segment_timeline(&timeline, &opts.segmentation);
    log::info!(
        "pass finished: {} frames, {} valid, {} cuts, {} rallies",
        stats.frames_processed,
        stats.valid,
        stats.teleports,
        rallies.len()
    );

    Ok(PassSummary {
        source: source.describe(),
        info,
        stats,
        timeline,
        rallies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Candidate, DetectionResult};
    use crate::geometry::BoundingBox;

    struct VecSource {
        info: StreamInfo,
        frames: std::vec::IntoIter<FrameDetections>,
    }

    impl VecSource {
        fn new(fps: f64, frames: Vec<Vec<Candidate>>) -> Self {
            let info = StreamInfo {
                fps,
                frame_count: frames.len(),
                width: 1920,
                height: 1080,
            };
            let frames: Vec<FrameDetections> = frames
                .into_iter()
                .enumerate()
                .map(|(index, c)| FrameDetections {
                    index,
                    detections: DetectionResult::new(c),
                })
                .collect();
            Self {
                info,
                frames: frames.into_iter(),
            }
        }
    }

    impl DetectionSource for VecSource {
        fn describe(&self) -> String {
            "vec".to_string()
        }

        fn stream_info(&self) -> StreamInfo {
            self.info
        }

        fn next_detections(&mut self) -> Result<Option<FrameDetections>> {
            Ok(self.frames.next())
        }
    }

    #[derive(Default)]
    struct Counter {
        started: bool,
        frames: usize,
        finished: Option<usize>,
    }

    impl PassObserver for Counter {
        fn on_start(&mut self, _info: &StreamInfo) -> Result<()> {
            self.started = true;
            Ok(())
        }

        fn on_frame(&mut self, _frame: &FrameDetections, _report: &FrameReport) -> Result<()> {
            self.frames += 1;
            Ok(())
        }

        fn on_finish(&mut self, frames_processed: usize) -> Result<()> {
            self.finished = Some(frames_processed);
            Ok(())
        }
    }

    fn ball(x: f32) -> Vec<Candidate> {
        vec![Candidate::object(
            BoundingBox::from_center(x, 500.0, 12.0, 12.0),
            0.4,
        )]
    }

    fn options(gap: f64, min: f64) -> PassOptions {
        PassOptions {
            segmentation: SegmentationConfig {
                gap_tolerance_secs: gap,
                min_rally_secs: min,
                flush_at_end: false,
            },
            ..PassOptions::default()
        }
    }

    #[test]
    fn teleport_splits_rallies() -> Result<()> {
        let mut frames = Vec::new();
        for i in 0..10 {
            frames.push(ball(100.0 + i as f32 * 10.0));
        }
        // Camera cut: ball reappears far away.
        for i in 0..10 {
            frames.push(ball(1500.0 + i as f32 * 10.0));
        }
        frames.push(vec![]);

        let mut source = VecSource::new(10.0, frames);
        let mut counter = Counter::default();
        let summary = run_pass(&mut source, &options(0.3, 0.5), &mut counter)?;

        assert_eq!(summary.stats.teleports, 1);
        assert!(summary.timeline.is_cut(10));
        let spans: Vec<_> = summary
            .rallies
            .iter()
            .map(|r| (r.start_frame, r.end_frame))
            .collect();
        assert_eq!(spans, vec![(0, 10), (11, 20)]);
        assert!(counter.started);
        assert_eq!(counter.frames, 21);
        assert_eq!(counter.finished, Some(21));
        Ok(())
    }

    #[test]
    fn empty_stream_yields_no_rallies() -> Result<()> {
        let mut source = VecSource::new(30.0, vec![]);
        let summary = run_pass(&mut source, &PassOptions::default(), &mut ())?;
        assert!(summary.rallies.is_empty());
        assert_eq!(summary.stats.frames_processed, 0);
        Ok(())
    }

    #[test]
    fn time_limit_truncates_timeline() -> Result<()> {
        let frames: Vec<_> = (0..50).map(|i| ball(100.0 + i as f32)).collect();
        let mut source = VecSource::new(10.0, frames);
        let opts = PassOptions {
            max_seconds: Some(2.0),
            ..options(0.3, 0.0)
        };
        let summary = run_pass(&mut source, &opts, &mut ())?;
        assert_eq!(summary.stats.frames_processed, 20);
        assert_eq!(summary.timeline.len(), 20);
        // Still present at the last processed frame, so nothing closes.
        assert!(summary.rallies.is_empty());
        Ok(())
    }

    #[test]
    fn invalid_frame_rate_aborts() {
        let mut source = VecSource::new(0.0, vec![ball(1.0)]);
        assert!(run_pass(&mut source, &PassOptions::default(), &mut ()).is_err());
    }

    #[test]
    fn source_errors_abort_the_pass() {
        struct Failing;
        impl DetectionSource for Failing {
            fn describe(&self) -> String {
                "failing".into()
            }
            fn stream_info(&self) -> StreamInfo {
                StreamInfo {
                    fps: 30.0,
                    frame_count: 10,
                    width: 1,
                    height: 1,
                }
            }
            fn next_detections(&mut self) -> Result<Option<FrameDetections>> {
                Err(anyhow!("decoder unavailable"))
            }
        }
        let err = run_pass(&mut Failing, &PassOptions::default(), &mut ()).unwrap_err();
        assert!(err.to_string().contains("decoder unavailable"));
    }
}
