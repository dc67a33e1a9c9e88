use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};

/// Candidates produced for one frame, in detector order.
///
/// Order is preserved end to end: the frame classifier lets the first
/// surviving object candidate decide the frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub candidates: Vec<Candidate>,
}

impl DetectionResult {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Object-of-interest candidates in supplied order.
    pub fn objects(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates
            .iter()
            .filter(|c| c.class == CandidateClass::Object)
    }

    /// Occluding-agent candidates in supplied order.
    pub fn agents(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates
            .iter()
            .filter(|c| c.class == CandidateClass::Agent)
    }
}

/// One detection, scoped to a single frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub class: CandidateClass,
    pub confidence: f32,
}

impl Candidate {
    pub fn object(bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            bbox,
            class: CandidateClass::Object,
            confidence,
        }
    }

    pub fn agent(bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            bbox,
            class: CandidateClass::Agent,
            confidence,
        }
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

/// Role of a detection for rally tracking.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateClass {
    /// The object in play (ball).
    Object,
    /// An occluding agent (player) whose feet can be mistaken for the object.
    Agent,
    /// Any other class; ignored by the classifier.
    Other,
}

/// Maps raw detector class ids onto candidate roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassMap {
    pub object_class_id: u32,
    pub agent_class_id: u32,
}

impl ClassMap {
    pub fn classify(&self, class_id: u32) -> CandidateClass {
        if class_id == self.object_class_id {
            CandidateClass::Object
        } else if class_id == self.agent_class_id {
            CandidateClass::Agent
        } else {
            CandidateClass::Other
        }
    }
}

impl Default for ClassMap {
    /// COCO ids: 32 = sports ball, 0 = person.
    fn default() -> Self {
        Self {
            object_class_id: 32,
            agent_class_id: 0,
        }
    }
}
