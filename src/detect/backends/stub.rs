use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::DetectionResult;

/// Stub backend for testing. Replays a scripted candidate list per frame and
/// ignores pixel content. Once the script runs out every frame is empty.
#[derive(Default)]
pub struct StubBackend {
    script: VecDeque<DetectionResult>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<DetectionResult>) -> Self {
        Self {
            script: script.into(),
            calls: 0,
        }
    }

    /// Number of frames this backend has been asked to process.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(
            capability,
            DetectionCapability::ObjectDetection | DetectionCapability::AgentDetection
        )
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<DetectionResult> {
        self.calls += 1;
        Ok(self.script.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Candidate;
    use crate::geometry::BoundingBox;

    #[test]
    fn stub_backend_replays_script_then_goes_quiet() {
        let ball = Candidate::object(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9);
        let mut backend = StubBackend::with_script(vec![
            DetectionResult::new(vec![ball]),
            DetectionResult::default(),
        ]);

        let r1 = backend.detect(b"frame1", 10, 10).unwrap();
        assert_eq!(r1.candidates, vec![ball]);

        let r2 = backend.detect(b"frame2", 10, 10).unwrap();
        assert!(r2.is_empty());

        let r3 = backend.detect(b"frame3", 10, 10).unwrap();
        assert!(r3.is_empty());
        assert_eq!(backend.calls(), 3);
    }
}
