use serde::Serialize;

/// Axis-aligned box in frame pixel coordinates (corner format).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Corners may be given in any order.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Clamp to `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

/// One recognized plate candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub text: String,
    /// In `[0, 1]` when the model reports one.
    pub confidence: Option<f32>,
    pub region: BoundingBox,
}

impl Detection {
    pub fn new(text: impl Into<String>, confidence: Option<f32>, region: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            region,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_orders_corners() {
        let bbox = BoundingBox::new(50.0, 40.0, 10.0, 20.0);
        assert_eq!(bbox, BoundingBox::new(10.0, 20.0, 50.0, 40.0));
        assert_eq!(bbox.width(), 40.0);
        assert_eq!(bbox.height(), 20.0);
    }

    #[test]
    fn clamp_keeps_box_inside_frame() {
        let bbox = BoundingBox::new(-5.0, 10.0, 700.0, 500.0).clamp_to(640, 480);
        assert_eq!(bbox, BoundingBox::new(0.0, 10.0, 640.0, 480.0));
    }

    #[test]
    fn degenerate_boxes_are_empty() {
        assert!(BoundingBox::new(10.0, 10.0, 10.0, 30.0).is_empty());
        assert!(BoundingBox::new(10.0, 10.0, 30.0, 10.0).is_empty());
        assert!(BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0).is_empty());
        assert!(!BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn box_fully_outside_clamps_to_empty() {
        let bbox = BoundingBox::new(700.0, 10.0, 800.0, 50.0).clamp_to(640, 480);
        assert!(bbox.is_empty());
    }
}
