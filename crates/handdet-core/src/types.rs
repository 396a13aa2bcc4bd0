use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates (top-left + size).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from corner coordinates `[x1, y1, x2, y2]`.
    pub fn from_xyxy(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Build from a center point and size.
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    pub fn to_xyxy(&self) -> [f32; 4] {
        [self.x, self.y, self.right(), self.bottom()]
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Intersection-over-union with another bbox.
    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Clip both corners into `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: u32, height: u32) -> BBox {
        let w = width as f32;
        let h = height as f32;
        let x1 = self.x.clamp(0.0, w);
        let y1 = self.y.clamp(0.0, h);
        let x2 = self.right().clamp(0.0, w);
        let y2 = self.bottom().clamp(0.0, h);
        BBox::from_xyxy(x1, y1, x2, y2)
    }
}

/// A single detected object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub class_id: u32,
}

/// Detector output for one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandResult {
    pub width: u32,
    pub height: u32,
    pub detections: Vec<Detection>,
    pub timing: TimingInfo,
}

impl HandResult {
    pub fn num_hands(&self) -> usize {
        self.detections.len()
    }

    pub fn confidences(&self) -> Vec<f32> {
        self.detections.iter().map(|d| d.confidence).collect()
    }

    /// Boxes as `[x1, y1, x2, y2]` pixel corners.
    pub fn boxes_xyxy(&self) -> Vec<[f32; 4]> {
        self.detections.iter().map(|d| d.bbox.to_xyxy()).collect()
    }
}

/// Timing information for pipeline stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingInfo {
    pub decode_ms: f32,
    pub preprocess_ms: f32,
    pub detect_ms: f32,
    pub total_ms: f32,
}

/// Decoded RGB8 image in HWC layout.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl RawImage {
    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            channels: 3,
        }
    }

    /// Pixel at `(x, y)` as `[r, g, b]`. Out-of-range reads return mid gray.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [128, 128, 128];
        }
        let c = self.channels as usize;
        let idx = (y as usize * self.width as usize + x as usize) * c;
        match self.data.get(idx..idx + c.min(3)) {
            Some(&[r, g, b]) => [r, g, b],
            Some(&[l, ..]) => [l, l, l],
            _ => [128, 128, 128],
        }
    }
}
