#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use super::yolo::{self, Letterbox, LETTERBOX_FILL};
use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::{ClassMap, DetectionResult};

/// Tract-based backend running a YOLOv8 ONNX export.
///
/// Frames are letterboxed into a square `size x size` input, the raw head is
/// decoded with class filtering and NMS, and boxes are mapped back into
/// source-frame pixels.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    classes: ClassMap,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for `size x size` inference.
    pub fn new<P: AsRef<Path>>(model_path: P, size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            size,
            confidence_threshold: 0.15,
            iou_threshold: 0.7,
            classes: ClassMap::default(),
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Override the NMS IoU threshold.
    pub fn with_iou(mut self, iou: f32) -> Self {
        self.iou_threshold = iou;
        self
    }

    /// Override which class ids map to the object and the agent.
    pub fn with_classes(mut self, classes: ClassMap) -> Self {
        self.classes = classes;
        self
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<(Tensor, Letterbox)> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let lb = Letterbox::new(width, height, self.size);
        let side = self.size as usize;
        let src_w = width as usize;
        let src_h = height as usize;
        let fill = LETTERBOX_FILL as f32 / 255.0;
        let (pad_x, pad_y) = (lb.pad_x as usize, lb.pad_y as usize);

        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            if x < pad_x || y < pad_y || x >= pad_x + lb.scaled_width || y >= pad_y + lb.scaled_height
            {
                return fill;
            }
            let sx = (((x - pad_x) as f32 + 0.5) / lb.scale) as usize;
            let sy = (((y - pad_y) as f32 + 0.5) / lb.scale) as usize;
            let idx = (sy.min(src_h - 1) * src_w + sx.min(src_w - 1)) * 3 + channel;
            pixels[idx] as f32 / 255.0
        });

        Ok((input.into_tensor(), lb))
    }

    fn extract_candidates(&self, outputs: TVec<TValue>, lb: &Letterbox) -> Result<DetectionResult> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("unexpected YOLO output shape {:?}", shape));
        }
        let (channels, anchors) = (shape[1], shape[2]);
        let flat: Vec<f32> = view.iter().copied().collect();

        Ok(DetectionResult::new(yolo::decode(
            &flat,
            channels,
            anchors,
            self.confidence_threshold,
            self.iou_threshold,
            self.classes,
            lb,
        )))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(
            capability,
            DetectionCapability::ObjectDetection | DetectionCapability::AgentDetection
        )
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult> {
        if width == 0 || height == 0 {
            return Ok(DetectionResult::default());
        }
        let (input, lb) = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_candidates(outputs, &lb)
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.size;
        let blank = vec![LETTERBOX_FILL; (side as usize) * (side as usize) * 3];
        self.detect(&blank, side, side).map(|_| ())
    }
}
