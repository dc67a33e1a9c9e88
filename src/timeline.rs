//! Frame-indexed presence and forced-cut accumulation.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::classify::FrameOutcome;

/// Presence bits plus forced-cut indices for one stream.
///
/// Built in frame order during the pass and read in full by the segmenter
/// afterwards. A cut frame is never also present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    fps: f64,
    presence: Vec<bool>,
    cuts: BTreeSet<usize>,
}

impl Timeline {
    /// Empty timeline sized for `frame_count` frames, all absent.
    pub fn new(fps: f64, frame_count: usize) -> Self {
        Self {
            fps,
            presence: vec![false; frame_count],
            cuts: BTreeSet::new(),
        }
    }

    /// Build from literal arrays. Cut indices past the end are dropped and cut
    /// frames are forced absent.
    pub fn from_parts(fps: f64, mut presence: Vec<bool>, cuts: impl IntoIterator<Item = usize>) -> Self {
        let len = presence.len();
        let cuts: BTreeSet<usize> = cuts.into_iter().filter(|&i| i < len).collect();
        for &i in &cuts {
            presence[i] = false;
        }
        Self { fps, presence, cuts }
    }

    /// Record the outcome for frame `index`.
    ///
    /// Indices beyond the reported frame count grow the timeline; skipped
    /// indices stay absent.
    pub fn record(&mut self, index: usize, outcome: &FrameOutcome) {
        if index >= self.presence.len() {
            self.presence.resize(index + 1, false);
        }
        match outcome {
            FrameOutcome::Valid(_) => {
                self.presence[index] = true;
            }
            FrameOutcome::Teleport { .. } => {
                self.presence[index] = false;
                self.cuts.insert(index);
            }
            FrameOutcome::Absent => {
                self.presence[index] = false;
            }
        }
    }

    /// Drop every frame at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.presence.truncate(len);
        self.cuts.retain(|&i| i < len);
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn len(&self) -> usize {
        self.presence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presence.is_empty()
    }

    pub fn is_present(&self, index: usize) -> bool {
        self.presence.get(index).copied().unwrap_or(false)
    }

    pub fn is_cut(&self, index: usize) -> bool {
        self.cuts.contains(&index)
    }

    pub fn presence(&self) -> &[bool] {
        &self.presence
    }

    pub fn cuts(&self) -> &BTreeSet<usize> {
        &self.cuts
    }

    pub fn present_frames(&self) -> usize {
        self.presence.iter().filter(|&&p| p).count()
    }

    /// Write the timeline as JSON for later re-segmentation.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self).context("serialize timeline")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write timeline {}", path.display()))
    }

    /// Load a timeline written by [`Timeline::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read timeline {}: {}", path.display(), e))?;
        let parsed: Timeline = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid timeline {}: {}", path.display(), e))?;
        if !(parsed.fps.is_finite() && parsed.fps > 0.0) {
            return Err(anyhow!("timeline {} has invalid fps {}", path.display(), parsed.fps));
        }
        Ok(Self::from_parts(parsed.fps, parsed.presence, parsed.cuts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    #[test]
    fn records_outcomes_by_index() {
        let mut timeline = Timeline::new(30.0, 4);
        timeline.record(0, &FrameOutcome::Valid(Point::new(1.0, 1.0)));
        timeline.record(1, &FrameOutcome::Teleport { distance: 500.0 });
        timeline.record(2, &FrameOutcome::Absent);

        assert_eq!(timeline.presence(), &[true, false, false, false]);
        assert!(timeline.is_cut(1));
        assert_eq!(timeline.cuts().len(), 1);
        assert_eq!(timeline.present_frames(), 1);
    }

    #[test]
    fn grows_past_reported_frame_count() {
        let mut timeline = Timeline::new(30.0, 2);
        timeline.record(4, &FrameOutcome::Valid(Point::default()));
        assert_eq!(timeline.len(), 5);
        assert_eq!(timeline.presence(), &[false, false, false, false, true]);
    }

    #[test]
    fn truncate_drops_trailing_cuts() {
        let mut timeline = Timeline::from_parts(10.0, vec![true; 6], [1, 5]);
        timeline.truncate(3);
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.cuts().iter().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn from_parts_forces_cut_frames_absent() {
        let timeline = Timeline::from_parts(10.0, vec![true, true, true], [1, 7]);
        assert_eq!(timeline.presence(), &[true, false, true]);
        assert!(!timeline.is_cut(7));
    }

    #[test]
    fn save_and_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("timeline.json");
        let timeline = Timeline::from_parts(25.0, vec![true, false, true, true], [1]);
        timeline.save(&path)?;
        assert_eq!(Timeline::load(&path)?, timeline);
        Ok(())
    }
}
