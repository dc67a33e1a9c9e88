//! Gap-tolerant, cut-aware rally segmentation over a finished timeline.
//!
//! The segmenter walks frame indices in order with two states, outside and
//! inside a rally:
//!
//! - A cut frame closes an open rally at that index, with no look-ahead.
//! - A present frame opens a rally if none is open.
//! - An absent frame inside a rally scans the window
//!   `[i, i + gap_frames)` (clipped to the timeline). A cut seen first closes
//!   the rally. A present frame seen first bridges the gap. An exhausted window
//!   closes it too. Closing happens at `i`.
//!
//! A rally still open after the last frame is dropped unless `flush_at_end` is set.

use serde::{Deserialize, Serialize};

use crate::timeline::Timeline;

pub const DEFAULT_GAP_TOLERANCE_SECS: f64 = 0.6;
pub const DEFAULT_MIN_RALLY_SECS: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Look-ahead window for bridging absent frames, in seconds.
    pub gap_tolerance_secs: f64,
    /// Rallies must last strictly longer than this to be kept.
    pub min_rally_secs: f64,
    /// Close a rally that is still open at the end of the timeline.
    pub flush_at_end: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            gap_tolerance_secs: DEFAULT_GAP_TOLERANCE_SECS,
            min_rally_secs: DEFAULT_MIN_RALLY_SECS,
            flush_at_end: false,
        }
    }
}

impl SegmentationConfig {
    /// Gap tolerance converted to whole frames, rounded down.
    pub fn gap_frames(&self, fps: f64) -> usize {
        let frames = (self.gap_tolerance_secs * fps).floor();
        if frames.is_finite() && frames > 0.0 {
            frames as usize
        } else {
            0
        }
    }
}

/// One closed rally: frames `[start_frame, end_frame)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rally {
    pub start_frame: usize,
    pub end_frame: usize,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl Rally {
    /// Interval `[start_frame, end_frame)` with times derived from `fps`.
    pub fn from_frames(start_frame: usize, end_frame: usize, fps: f64) -> Self {
        Self {
            start_frame,
            end_frame,
            start_secs: start_frame as f64 / fps,
            end_secs: end_frame as f64 / fps,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    pub fn frame_count(&self) -> usize {
        self.end_frame - self.start_frame
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    OutsideRally,
    InRally { start_frame: usize },
}

struct Closer<'a> {
    fps: f64,
    min_rally_secs: f64,
    rallies: &'a mut Vec<Rally>,
}

impl Closer<'_> {
    fn close(&mut self, start_frame: usize, end_frame: usize) {
        let duration = (end_frame - start_frame) as f64 / self.fps;
        if duration > self.min_rally_secs {
            self.rallies
                .push(Rally::from_frames(start_frame, end_frame, self.fps));
        } else {
            log::trace!(
                "dropping short rally frames {}..{} ({:.2}s)",
                start_frame,
                end_frame,
                duration
            );
        }
    }
}

/// Segment a finished timeline at its own frame rate.
pub fn segment_timeline(timeline: &Timeline, cfg: &SegmentationConfig) -> Vec<Rally> {
    segment(timeline.presence(), |i| timeline.is_cut(i), timeline.fps(), cfg)
}

/// Segment raw presence bits with a cut predicate.
///
/// `fps` must be positive and finite; an empty or non-positive rate yields no rallies.
pub fn segment(
    presence: &[bool],
    is_cut: impl Fn(usize) -> bool,
    fps: f64,
    cfg: &SegmentationConfig,
) -> Vec<Rally> {
    let mut rallies = Vec::new();
    if presence.is_empty() || !(fps.is_finite() && fps > 0.0) {
        return rallies;
    }

    let gap_frames = cfg.gap_frames(fps);
    let len = presence.len();
    let mut closer = Closer {
        fps,
        min_rally_secs: cfg.min_rally_secs,
        rallies: &mut rallies,
    };
    let mut state = State::OutsideRally;

    for i in 0..len {
        if is_cut(i) {
            if let State::InRally { start_frame } = state {
                closer.close(start_frame, i);
                state = State::OutsideRally;
            }
            continue;
        }

        match (state, presence[i]) {
            (State::OutsideRally, true) => {
                state = State::InRally { start_frame: i };
            }
            (State::InRally { start_frame }, false) => {
                let window_end = i.saturating_add(gap_frames).min(len);
                let bridged = (i..window_end)
                    .find_map(|f| {
                        if is_cut(f) {
                            Some(false)
                        } else if presence[f] {
                            Some(true)
                        } else {
                            None
                        }
                    })
                    .unwrap_or(false);
                if !bridged {
                    closer.close(start_frame, i);
                    state = State::OutsideRally;
                }
            }
            _ => {}
        }
    }

    if let State::InRally { start_frame } = state {
        if cfg.flush_at_end {
            closer.close(start_frame, len);
        } else {
            log::debug!(
                "rally open since frame {} left unclosed at end of stream",
                start_frame
            );
        }
    }

    rallies
}
