//! Pixel-space geometry shared by detectors and the frame classifier.

use serde::{Deserialize, Serialize};

/// A point in source-frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: Point) -> f32 {
        displacement(*self, other).1
    }
}

/// Axis-aligned box in corner form (x1, y1) top-left, (x2, y2) bottom-right.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from a center-form box as produced by YOLO heads.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.x1 + self.x2) / 2.0,
            y: (self.y1 + self.y2) / 2.0,
        }
    }

    /// Intersection over union; zero when either box is degenerate.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Scale all coordinates, used to map model-space boxes back to the source frame.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }
}

/// Unit direction and magnitude of the vector `from -> to`.
///
/// A zero-length vector yields a zero direction and zero magnitude.
pub fn displacement(from: Point, to: Point) -> (Point, f32) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let mag = dx.hypot(dy);
    if mag == 0.0 {
        return (Point::default(), 0.0);
    }
    (Point::new(dx / mag, dy / mag), mag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_displacement_is_zero_speed() {
        let p = Point::new(12.0, 7.5);
        let (dir, mag) = displacement(p, p);
        assert_eq!(mag, 0.0);
        assert_eq!(dir, Point::default());
    }

    #[test]
    fn displacement_returns_unit_direction() {
        let (dir, mag) = displacement(Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert!((mag - 5.0).abs() < 1e-6);
        assert!((dir.x - 0.6).abs() < 1e-6);
        assert!((dir.y - 0.8).abs() < 1e-6);
    }

    #[test]
    fn box_center_and_extent() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 60.0);
        assert_eq!(b.width(), 20.0);
        assert_eq!(b.height(), 40.0);
        assert_eq!(b.center(), Point::new(20.0, 40.0));
        assert_eq!(BoundingBox::from_center(20.0, 40.0, 20.0, 40.0), b);
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }
}
