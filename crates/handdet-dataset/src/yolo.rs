use std::fmt;
use std::path::Path;
use std::str::FromStr;

use handdet_core::{DetError, Result};

/// One YOLO label line: class id plus a normalized center/size box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloLabel {
    pub class_id: u32,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl YoloLabel {
    /// Normalize a COCO `[x_min, y_min, w, h]` box against the image size.
    ///
    /// Each of the four output values is clamped to `[0, 1]` on its own.
    pub fn from_coco_bbox(class_id: u32, bbox: &[f64], img_width: u32, img_height: u32) -> Result<Self> {
        if img_width == 0 || img_height == 0 {
            return Err(DetError::InvalidAnnotation(format!(
                "image size {img_width}x{img_height} cannot normalize a box"
            )));
        }
        let &[x_min, y_min, w, h] = bbox else {
            return Err(DetError::InvalidAnnotation(format!(
                "bbox must have 4 values, got {}",
                bbox.len()
            )));
        };
        if !bbox.iter().all(|v| v.is_finite()) {
            return Err(DetError::InvalidAnnotation(format!(
                "bbox has non-finite values: {bbox:?}"
            )));
        }

        let iw = img_width as f64;
        let ih = img_height as f64;

        Ok(Self {
            class_id,
            x_center: ((x_min + w / 2.0) / iw).clamp(0.0, 1.0),
            y_center: ((y_min + h / 2.0) / ih).clamp(0.0, 1.0),
            width: (w / iw).clamp(0.0, 1.0),
            height: (h / ih).clamp(0.0, 1.0),
        })
    }

    /// Back to an absolute `[x_min, y_min, w, h]` box.
    pub fn to_coco_bbox(&self, img_width: u32, img_height: u32) -> [f64; 4] {
        let iw = img_width as f64;
        let ih = img_height as f64;
        let w = self.width * iw;
        let h = self.height * ih;
        [self.x_center * iw - w / 2.0, self.y_center * ih - h / 2.0, w, h]
    }

    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for YoloLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

impl FromStr for YoloLabel {
    type Err = DetError;

    fn from_str(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [class_id, xc, yc, w, h] = parts.as_slice() else {
            return Err(DetError::InvalidAnnotation(format!(
                "expected 5 fields, got {}: {line:?}",
                parts.len()
            )));
        };
        let num = |s: &str| -> Result<f64> {
            s.parse::<f64>()
                .map_err(|e| DetError::InvalidAnnotation(format!("bad number {s:?}: {e}")))
        };
        Ok(Self {
            class_id: class_id
                .parse()
                .map_err(|e| DetError::InvalidAnnotation(format!("bad class id {class_id:?}: {e}")))?,
            x_center: num(*xc)?,
            y_center: num(*yc)?,
            width: num(*w)?,
            height: num(*h)?,
        })
    }
}

/// Label file name for an image: basename with a `.txt` extension.
///
/// Directory components of COCO `file_name` are dropped.
pub fn label_file_name(image_file_name: &str) -> Option<String> {
    let stem = Path::new(image_file_name).file_stem()?;
    Some(format!("{}.txt", stem.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_normalize_known_box() {
        let label = YoloLabel::from_coco_bbox(0, &[100.0, 50.0, 200.0, 100.0], 400, 200).unwrap();
        assert!((label.x_center - 0.5).abs() < EPS);
        assert!((label.y_center - 0.5).abs() < EPS);
        assert!((label.width - 0.5).abs() < EPS);
        assert!((label.height - 0.5).abs() < EPS);
        assert_eq!(label.to_line(), "0 0.500000 0.500000 0.500000 0.500000");
    }

    #[test]
    fn test_values_stay_in_unit_range() {
        let boxes: &[[f64; 4]] = &[
            [0.0, 0.0, 640.0, 480.0],
            [630.0, 470.0, 50.0, 50.0],
            [-20.0, -10.0, 30.0, 15.0],
            [0.0, 0.0, 0.0, 0.0],
            [639.9, 479.9, 0.1, 0.1],
            [-100.0, 200.0, 2000.0, 10.0],
        ];
        for bbox in boxes {
            let l = YoloLabel::from_coco_bbox(2, bbox, 640, 480).unwrap();
            for v in [l.x_center, l.y_center, l.width, l.height] {
                assert!((0.0..=1.0).contains(&v), "{v} out of range for {bbox:?}");
            }
        }
    }

    #[test]
    fn test_round_trip_in_bounds_boxes() {
        let (w, h) = (1280, 720);
        for i in 0..50 {
            let f = i as f64;
            let bbox = [f * 7.3, f * 3.1, 40.0 + f * 11.7, 25.0 + f * 5.9];
            let label = YoloLabel::from_coco_bbox(0, &bbox, w, h).unwrap();
            let back = label.to_coco_bbox(w, h);
            for (a, b) in bbox.iter().zip(back.iter()) {
                assert!((a - b).abs() < 1e-6, "{bbox:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert!(YoloLabel::from_coco_bbox(0, &[1.0, 2.0, 3.0], 10, 10).is_err());
        assert!(YoloLabel::from_coco_bbox(0, &[1.0, 2.0, 3.0, 4.0], 0, 10).is_err());
        assert!(YoloLabel::from_coco_bbox(0, &[f64::NAN, 2.0, 3.0, 4.0], 10, 10).is_err());
    }

    #[test]
    fn test_parse_line() {
        let l: YoloLabel = "3 0.250000 0.750000 0.100000 0.200000".parse().unwrap();
        assert_eq!(l.class_id, 3);
        assert!((l.y_center - 0.75).abs() < EPS);
        assert!("3 0.2 0.3".parse::<YoloLabel>().is_err());
        assert!("x 0.1 0.1 0.1 0.1".parse::<YoloLabel>().is_err());
    }

    #[test]
    fn test_label_file_name() {
        assert_eq!(label_file_name("000123.jpg").as_deref(), Some("000123.txt"));
        assert_eq!(label_file_name("sub/dir/img.v2.png").as_deref(), Some("img.v2.txt"));
        assert_eq!(label_file_name("noext").as_deref(), Some("noext.txt"));
        assert_eq!(label_file_name(""), None);
    }
}
