//! YOLOv8 head decoding: letterbox geometry, class filtering and NMS.

use crate::detect::result::{Candidate, CandidateClass, ClassMap};
use crate::geometry::BoundingBox;

/// Gray fill used by the Ultralytics letterbox.
pub(crate) const LETTERBOX_FILL: u8 = 114;

/// Mapping between a source frame and the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub scaled_width: usize,
    pub scaled_height: usize,
}

impl Letterbox {
    pub(crate) fn new(src_width: u32, src_height: u32, size: u32) -> Self {
        let scale = size as f32 / src_width.max(src_height).max(1) as f32;
        let scaled_width = ((src_width as f32 * scale).round() as usize).min(size as usize);
        let scaled_height = ((src_height as f32 * scale).round() as usize).min(size as usize);
        Self {
            scale,
            pad_x: ((size as usize - scaled_width) / 2) as f32,
            pad_y: ((size as usize - scaled_height) / 2) as f32,
            scaled_width,
            scaled_height,
        }
    }

    /// Map a model-space box back into source-frame pixels.
    pub(crate) fn unmap(&self, b: BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: (b.x1 - self.pad_x) / self.scale,
            y1: (b.y1 - self.pad_y) / self.scale,
            x2: (b.x2 - self.pad_x) / self.scale,
            y2: (b.y2 - self.pad_y) / self.scale,
        }
    }
}

/// Decode a `[4 + classes, anchors]` channel-major YOLOv8 output.
///
/// The arg-max class of each anchor must be one of the mapped roles and reach
/// `threshold`. Survivors go through per-class NMS and come back sorted by
/// descending confidence.
pub(crate) fn decode(
    output: &[f32],
    channels: usize,
    anchors: usize,
    threshold: f32,
    iou_threshold: f32,
    classes: ClassMap,
    letterbox: &Letterbox,
) -> Vec<Candidate> {
    if channels <= 4 || output.len() < channels * anchors {
        return Vec::new();
    }
    let at = |c: usize, a: usize| output[c * anchors + a];

    let mut raw = Vec::new();
    for a in 0..anchors {
        let mut best_class = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for c in 4..channels {
            let score = at(c, a);
            if score > best_score {
                best_score = score;
                best_class = c - 4;
            }
        }
        if best_score.is_nan() || best_score < threshold {
            continue;
        }
        let class = classes.classify(best_class as u32);
        if class == CandidateClass::Other {
            continue;
        }
        let bbox = BoundingBox::from_center(at(0, a), at(1, a), at(2, a), at(3, a));
        raw.push(Candidate {
            bbox,
            class,
            confidence: best_score,
        });
    }

    let mut kept = non_max_suppression(raw, iou_threshold);
    for cand in &mut kept {
        cand.bbox = letterbox.unmap(cand.bbox);
    }
    kept
}

/// Greedy per-class NMS. Output is sorted by descending confidence.
pub(crate) fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for cand in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.class == cand.class && k.bbox.iou(&cand.bbox) > iou_threshold);
        if !suppressed {
            kept.push(cand);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_with(anchors: &[(f32, f32, f32, f32, usize, f32)], classes: usize) -> Vec<f32> {
        let channels = 4 + classes;
        let n = anchors.len();
        let mut out = vec![0.0f32; channels * n];
        for (a, &(cx, cy, w, h, class, score)) in anchors.iter().enumerate() {
            out[a] = cx;
            out[n + a] = cy;
            out[2 * n + a] = w;
            out[3 * n + a] = h;
            out[(4 + class) * n + a] = score;
        }
        out
    }

    #[test]
    fn letterbox_pads_short_side() {
        let lb = Letterbox::new(1920, 1080, 1280);
        assert_eq!(lb.scaled_width, 1280);
        assert_eq!(lb.scaled_height, 720);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 280.0);
        let back = lb.unmap(BoundingBox::new(0.0, 280.0, 128.0, 408.0));
        assert!((back.x2 - 192.0).abs() < 1e-3);
        assert!((back.y1 - 0.0).abs() < 1e-3);
        assert!((back.y2 - 192.0).abs() < 1e-3);
    }

    #[test]
    fn decode_keeps_mapped_classes_in_confidence_order() {
        let out = output_with(
            &[
                (100.0, 100.0, 20.0, 20.0, 32, 0.30),
                (400.0, 300.0, 80.0, 200.0, 0, 0.90),
                (600.0, 600.0, 20.0, 20.0, 5, 0.95),
                (150.0, 150.0, 20.0, 20.0, 32, 0.10),
            ],
            80,
        );
        let lb = Letterbox::new(1280, 1280, 1280);
        let cands = decode(&out, 84, 4, 0.15, 0.7, ClassMap::default(), &lb);
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].class, CandidateClass::Agent);
        assert_eq!(cands[1].class, CandidateClass::Object);
        assert!((cands[1].center().x - 100.0).abs() < 1e-3);
    }

    #[test]
    fn nms_suppresses_same_class_overlap_only() {
        let a = Candidate::object(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.8);
        let b = Candidate::object(BoundingBox::new(1.0, 1.0, 11.0, 11.0), 0.6);
        let c = Candidate::agent(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.5);
        let kept = non_max_suppression(vec![b, c, a], 0.5);
        assert_eq!(kept, vec![a, c]);
    }
}
