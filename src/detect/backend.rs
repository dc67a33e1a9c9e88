use anyhow::Result;

use crate::detect::result::DetectionResult;

/// Detection capabilities supported by backends.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionCapability {
    /// Boxes for the object in play.
    ObjectDetection,
    /// Boxes for occluding agents (players).
    AgentDetection,
}

/// Detector backend trait.
///
/// Backends turn one decoded RGB frame into an ordered candidate list. The
/// order they return is the order the frame classifier scans, so backends
/// that rank detections (e.g. by confidence) must emit them ranked.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Run detection on a frame of packed RGB24 pixels.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
