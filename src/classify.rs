//! Per-frame classification gate.
//!
//! Each frame's candidates are reduced to a single [`FrameOutcome`]:
//!
//! 1. Size filter: object boxes wider or taller than `max_object_extent` are skipped.
//! 2. Shoe filter: object centers inside an agent's foot zone are skipped.
//! 3. Discontinuity filter: the first surviving object is compared against the
//!    previous valid center; a jump beyond `max_jump` is a `Teleport`.
//!
//! The scan is ordered and stops at the first object that survives filters 1
//! and 2. Later candidates in the same frame are never consulted, even if the
//! first survivor teleported.

use serde::{Deserialize, Serialize};

use crate::detect::{Candidate, DetectionResult};
use crate::geometry::{displacement, Point};

pub const DEFAULT_MAX_OBJECT_EXTENT: f32 = 65.0;
pub const DEFAULT_FOOT_ZONE_RATIO: f32 = 0.45;
pub const DEFAULT_FOOT_ZONE_SLACK: f32 = 40.0;
pub const DEFAULT_MAX_JUMP: f32 = 300.0;

/// Thresholds for the classification gate, all in source-frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Largest accepted object width or height.
    pub max_object_extent: f32,
    /// Fraction of an agent's height, measured up from its bottom edge, treated as foot zone.
    pub foot_zone_ratio: f32,
    /// Extra slack below the agent's bottom edge still counted as foot zone.
    pub foot_zone_slack: f32,
    /// Largest accepted displacement between consecutive valid centers.
    pub max_jump: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_object_extent: DEFAULT_MAX_OBJECT_EXTENT,
            foot_zone_ratio: DEFAULT_FOOT_ZONE_RATIO,
            foot_zone_slack: DEFAULT_FOOT_ZONE_SLACK,
            max_jump: DEFAULT_MAX_JUMP,
        }
    }
}

/// Classification of a single frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameOutcome {
    /// The object is present at `center`.
    Valid(Point),
    /// The object jumped further than `max_jump` since the previous valid frame.
    Teleport { distance: f32 },
    /// No usable object in this frame.
    Absent,
}

impl FrameOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, FrameOutcome::Valid(_))
    }

    pub fn is_teleport(&self) -> bool {
        matches!(self, FrameOutcome::Teleport { .. })
    }
}

/// Outcome plus the static-filter rejections seen on the way to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub outcome: FrameOutcome,
    pub rejected_oversized: u32,
    pub rejected_shoe: u32,
}

/// Why a candidate was skipped by a static filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    Oversized,
    ShoeZone,
}

/// Apply the static filters (size, then shoe zone) to one object candidate.
pub fn static_rejection<'a>(
    candidate: &Candidate,
    agents: impl IntoIterator<Item = &'a Candidate>,
    cfg: &ClassifierConfig,
) -> Option<Rejection> {
    let b = candidate.bbox;
    if b.width() > cfg.max_object_extent || b.height() > cfg.max_object_extent {
        return Some(Rejection::Oversized);
    }
    if in_foot_zone(candidate.center(), agents, cfg) {
        return Some(Rejection::ShoeZone);
    }
    None
}

/// True when `center` lies in the lower band of any agent box.
pub fn in_foot_zone<'a>(
    center: Point,
    agents: impl IntoIterator<Item = &'a Candidate>,
    cfg: &ClassifierConfig,
) -> bool {
    agents.into_iter().any(|agent| {
        let p = agent.bbox;
        if !(p.x1 < center.x && center.x < p.x2) {
            return false;
        }
        let zone_top = p.y2 - p.height() * cfg.foot_zone_ratio;
        center.y > zone_top && center.y < p.y2 + cfg.foot_zone_slack
    })
}

/// Classify one frame against an explicit prior.
///
/// Returns the report and the previous-valid-center to carry into the next frame.
pub fn classify_frame(
    prev: Option<Point>,
    detections: &DetectionResult,
    cfg: &ClassifierConfig,
) -> (FrameReport, Option<Point>) {
    let mut rejected_oversized = 0;
    let mut rejected_shoe = 0;
    let mut outcome = FrameOutcome::Absent;

    for candidate in detections.objects() {
        match static_rejection(candidate, detections.agents(), cfg) {
            Some(Rejection::Oversized) => {
                rejected_oversized += 1;
                continue;
            }
            Some(Rejection::ShoeZone) => {
                rejected_shoe += 1;
                continue;
            }
            None => {}
        }

        let center = candidate.center();
        outcome = match prev {
            Some(prev_center) => {
                let (_, speed) = displacement(prev_center, center);
                if speed > cfg.max_jump {
                    FrameOutcome::Teleport { distance: speed }
                } else {
                    FrameOutcome::Valid(center)
                }
            }
            None => FrameOutcome::Valid(center),
        };
        break;
    }

    let next = match outcome {
        FrameOutcome::Valid(center) => Some(center),
        FrameOutcome::Teleport { .. } | FrameOutcome::Absent => None,
    };

    (
        FrameReport {
            outcome,
            rejected_oversized,
            rejected_shoe,
        },
        next,
    )
}

/// Stateful classifier owning the previous-valid-center slot for one stream.
///
/// Frames must be fed strictly in stream order.
#[derive(Clone, Debug, Default)]
pub struct FrameClassifier {
    cfg: ClassifierConfig,
    prev_center: Option<Point>,
}

impl FrameClassifier {
    pub fn new(cfg: ClassifierConfig) -> Self {
        Self {
            cfg,
            prev_center: None,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.cfg
    }

    pub fn prev_center(&self) -> Option<Point> {
        self.prev_center
    }

    /// Classify the next frame and advance the continuity state.
    pub fn classify(&mut self, detections: &DetectionResult) -> FrameReport {
        let (report, next) = classify_frame(self.prev_center, detections, &self.cfg);
        self.prev_center = next;
        report
    }

    /// Forget the continuity chain.
    pub fn reset(&mut self) {
        self.prev_center = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    fn ball_at(x: f32, y: f32) -> Candidate {
        Candidate::object(BoundingBox::from_center(x, y, 10.0, 10.0), 0.5)
    }

    fn frame(candidates: Vec<Candidate>) -> DetectionResult {
        DetectionResult::new(candidates)
    }

    #[test]
    fn jump_beyond_threshold_is_teleport() {
        let cfg = ClassifierConfig::default();
        let (report, next) =
            classify_frame(Some(Point::new(0.0, 0.0)), &frame(vec![ball_at(400.0, 0.0)]), &cfg);
        assert_eq!(report.outcome, FrameOutcome::Teleport { distance: 400.0 });
        assert_eq!(next, None);
    }

    #[test]
    fn jump_within_threshold_is_valid() {
        let cfg = ClassifierConfig::default();
        let (report, next) =
            classify_frame(Some(Point::new(0.0, 0.0)), &frame(vec![ball_at(200.0, 0.0)]), &cfg);
        assert_eq!(report.outcome, FrameOutcome::Valid(Point::new(200.0, 0.0)));
        assert_eq!(next, Some(Point::new(200.0, 0.0)));
    }

    #[test]
    fn stationary_object_is_valid() {
        let cfg = ClassifierConfig::default();
        let (report, _) =
            classify_frame(Some(Point::new(50.0, 50.0)), &frame(vec![ball_at(50.0, 50.0)]), &cfg);
        assert!(report.outcome.is_valid());
    }

    #[test]
    fn shoe_filter_uses_lower_band_of_agent() {
        let cfg = ClassifierConfig::default();
        let player = Candidate::agent(BoundingBox::new(0.0, 100.0, 100.0, 300.0), 0.9);

        let (low, _) = classify_frame(None, &frame(vec![ball_at(50.0, 215.0), player]), &cfg);
        assert_eq!(low.outcome, FrameOutcome::Absent);
        assert_eq!(low.rejected_shoe, 1);

        let (high, _) = classify_frame(None, &frame(vec![ball_at(50.0, 150.0), player]), &cfg);
        assert_eq!(high.outcome, FrameOutcome::Valid(Point::new(50.0, 150.0)));
    }

    #[test]
    fn shoe_zone_boundaries_are_strict() {
        let cfg = ClassifierConfig::default();
        let player = Candidate::agent(BoundingBox::new(0.0, 100.0, 100.0, 300.0), 0.9);
        let agents = [player];

        assert!(!in_foot_zone(Point::new(50.0, 210.0), &agents, &cfg));
        assert!(in_foot_zone(Point::new(50.0, 339.0), &agents, &cfg));
        assert!(!in_foot_zone(Point::new(50.0, 340.0), &agents, &cfg));
        assert!(!in_foot_zone(Point::new(0.0, 250.0), &agents, &cfg));
        assert!(!in_foot_zone(Point::new(100.0, 250.0), &agents, &cfg));
    }

    #[test]
    fn oversized_boxes_are_skipped() {
        let cfg = ClassifierConfig::default();
        let big = Candidate::object(BoundingBox::new(0.0, 0.0, 66.0, 10.0), 0.9);
        let edge = Candidate::object(BoundingBox::new(0.0, 0.0, 65.0, 65.0), 0.9);

        let (report, _) = classify_frame(None, &frame(vec![big]), &cfg);
        assert_eq!(report.outcome, FrameOutcome::Absent);
        assert_eq!(report.rejected_oversized, 1);

        let (report, _) = classify_frame(None, &frame(vec![edge]), &cfg);
        assert!(report.outcome.is_valid());
    }

    #[test]
    fn first_surviving_candidate_wins() {
        let cfg = ClassifierConfig::default();
        let big = Candidate::object(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.99);
        let far = ball_at(500.0, 0.0);
        let near = ball_at(10.0, 0.0);

        let (report, _) =
            classify_frame(Some(Point::new(0.0, 0.0)), &frame(vec![big, far, near]), &cfg);
        assert!(report.outcome.is_teleport());
        assert_eq!(report.rejected_oversized, 1);

        let (report, _) =
            classify_frame(Some(Point::new(0.0, 0.0)), &frame(vec![near, far]), &cfg);
        assert_eq!(report.outcome, FrameOutcome::Valid(Point::new(10.0, 0.0)));
    }

    #[test]
    fn agents_are_never_objects() {
        let cfg = ClassifierConfig::default();
        let player = Candidate::agent(BoundingBox::new(0.0, 0.0, 20.0, 20.0), 0.9);
        let (report, _) = classify_frame(None, &frame(vec![player]), &cfg);
        assert_eq!(report.outcome, FrameOutcome::Absent);
    }

    #[test]
    fn classifier_breaks_chain_after_teleport_and_absence() {
        let mut classifier = FrameClassifier::new(ClassifierConfig::default());

        assert!(classifier.classify(&frame(vec![ball_at(0.0, 0.0)])).outcome.is_valid());
        assert!(classifier
            .classify(&frame(vec![ball_at(1000.0, 0.0)]))
            .outcome
            .is_teleport());
        assert_eq!(classifier.prev_center(), None);
        // Compared against nothing, so any position is accepted.
        assert!(classifier
            .classify(&frame(vec![ball_at(1000.0, 0.0)]))
            .outcome
            .is_valid());

        assert_eq!(classifier.classify(&frame(vec![])).outcome, FrameOutcome::Absent);
        assert_eq!(classifier.prev_center(), None);
        assert!(classifier.classify(&frame(vec![ball_at(0.0, 0.0)])).outcome.is_valid());
    }
}
