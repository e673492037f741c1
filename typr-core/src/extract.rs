//! Region extraction: crop and binarize one mapped character (made by FontLab https://www.fontlab.com/)

use crate::error::{SynthError, SynthResult};
use crate::glyph_id::GlyphId;
use crate::request::{CharacterMapping, PolygonClip, Rect};
use crate::source::SourceImage;

/// A 1-bit image with y pointing up: row 0 is the bottom row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    /// Build from rows listed top to bottom; `#` marks ink.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut bm = Self::new(width, height);
        for (i, row) in rows.iter().enumerate() {
            let y = height - 1 - i;
            for (x, c) in row.bytes().enumerate() {
                if c == b'#' {
                    bm.set(x, y, true);
                }
            }
        }
        bm
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Out-of-range coordinates read as background.
    pub fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.bits[y as usize * self.width + x as usize]
    }

    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        self.bits[y * self.width + x] = on;
    }

    pub(crate) fn flip(&mut self, x: usize, y: usize) {
        let idx = y * self.width + x;
        self.bits[idx] = !self.bits[idx];
    }

    pub fn ink_count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

/// Binarized crop plus the pixel rectangle it came from.
#[derive(Debug, Clone)]
pub struct ExtractedRegion {
    pub bitmap: Bitmap,
    pub bounds: Rect,
}

/// Crop `mapping` out of `image` and threshold it into ink/background.
pub fn extract_region(
    image: &SourceImage,
    mapping: &CharacterMapping,
    threshold: u8,
) -> SynthResult<ExtractedRegion> {
    let glyph = &mapping.glyph;
    let (mut width, mut height) = validate_rect(glyph, &mapping.rect, image)?;

    let polygon = match &mapping.polygon {
        Some(points) => Some(validate_polygon(glyph, points)?),
        None => None,
    };

    let bounds = match (&polygon, mapping.polygon_clip) {
        (Some(points), PolygonClip::PolygonOnly) => {
            let rect = polygon_bounds(points, image);
            (width, height) = validate_rect(glyph, &rect, image)?;
            rect
        }
        _ => mapping.rect,
    };

    let mut bitmap = Bitmap::new(width, height);

    for py in bounds.y1..bounds.y2 {
        for px in bounds.x1..bounds.x2 {
            let (gray, alpha) = image.luma_alpha(px as u32, py as u32);
            let mut ink = alpha >= 128 && gray < threshold;
            if ink {
                if let Some(points) = &polygon {
                    ink = point_in_polygon(px as f64 + 0.5, py as f64 + 0.5, points);
                }
            }
            if ink {
                let x = (px - bounds.x1) as usize;
                let y = (bounds.y2 - 1 - py) as usize;
                bitmap.set(x, y, true);
            }
        }
    }

    if bitmap.ink_count() == 0 {
        return Err(SynthError::EmptyRegion {
            glyph: glyph.clone(),
        });
    }

    Ok(ExtractedRegion { bitmap, bounds })
}

/// Checks `rect` against the image and returns its size in pixels.
fn validate_rect(
    glyph: &GlyphId,
    rect: &Rect,
    image: &SourceImage,
) -> SynthResult<(usize, usize)> {
    let invalid = |reason: String| SynthError::InvalidRegion {
        glyph: glyph.clone(),
        reason,
    };

    let (width, height) = match (rect.width(), rect.height()) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        (Some(_), Some(_)) => {
            return Err(invalid(format!(
                "rectangle ({}, {}, {}, {}) has no area",
                rect.x1, rect.y1, rect.x2, rect.y2
            )))
        }
        _ => {
            return Err(invalid(format!(
                "rectangle ({}, {}, {}, {}) is too large",
                rect.x1, rect.y1, rect.x2, rect.y2
            )))
        }
    };
    if rect.x1 < 0
        || rect.y1 < 0
        || rect.x2 > image.width() as i64
        || rect.y2 > image.height() as i64
    {
        return Err(invalid(format!(
            "rectangle ({}, {}, {}, {}) exceeds image bounds {}x{}",
            rect.x1,
            rect.y1,
            rect.x2,
            rect.y2,
            image.width(),
            image.height()
        )));
    }
    Ok((width as usize, height as usize))
}

fn validate_polygon<'a>(glyph: &GlyphId, points: &'a [[f64; 2]]) -> SynthResult<&'a [[f64; 2]]> {
    if points.len() < 3 {
        return Err(SynthError::InvalidRegion {
            glyph: glyph.clone(),
            reason: format!("polygon needs at least 3 vertices, got {}", points.len()),
        });
    }
    if points.iter().flatten().any(|v| !v.is_finite()) {
        return Err(SynthError::InvalidRegion {
            glyph: glyph.clone(),
            reason: "polygon has non-finite coordinates".to_string(),
        });
    }
    Ok(points)
}

fn polygon_bounds(points: &[[f64; 2]], image: &SourceImage) -> Rect {
    let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
    let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
    for [x, y] in points {
        min_x = min_x.min(*x);
        min_y = min_y.min(*y);
        max_x = max_x.max(*x);
        max_y = max_y.max(*y);
    }
    Rect::new(
        (min_x.floor() as i64).max(0),
        (min_y.floor() as i64).max(0),
        (max_x.ceil() as i64).min(image.width() as i64),
        (max_y.ceil() as i64).min(image.height() as i64),
    )
}

/// Even-odd containment test.
fn point_in_polygon(x: f64, y: f64, points: &[[f64; 2]]) -> bool {
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let [xi, yi] = points[i];
        let [xj, yj] = points[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_image(size: u32, margin: u32) -> SourceImage {
        let mut pixels = Vec::new();
        for y in 0..size {
            for x in 0..size {
                let ink = x >= margin && x < size - margin && y >= margin && y < size - margin;
                let v = if ink { 0 } else { 255 };
                pixels.extend_from_slice(&[v, v, v]);
            }
        }
        SourceImage::new(size, size, 3, pixels).unwrap()
    }

    #[test]
    fn zero_area_rect_is_invalid() {
        let img = square_image(10, 2);
        let mapping = CharacterMapping::new('A', "img", Rect::new(3, 3, 3, 8));
        let err = extract_region(&img, &mapping, 128).unwrap_err();
        assert!(matches!(err, SynthError::InvalidRegion { .. }));
    }

    #[test]
    fn out_of_bounds_rect_is_invalid() {
        let img = square_image(10, 2);
        let mapping = CharacterMapping::new('A', "img", Rect::new(0, 0, 11, 10));
        let err = extract_region(&img, &mapping, 128).unwrap_err();
        assert!(matches!(err, SynthError::InvalidRegion { .. }));
    }

    #[test]
    fn extreme_rect_coordinates_are_invalid_not_a_panic() {
        let img = square_image(10, 2);
        for rect in [
            Rect::new(i64::MIN, 0, i64::MAX, 10),
            Rect::new(0, i64::MIN, 10, i64::MAX),
            Rect::new(i64::MAX, 0, i64::MIN, 10),
        ] {
            let mapping = CharacterMapping::new('A', "img", rect);
            let err = extract_region(&img, &mapping, 128).unwrap_err();
            assert!(matches!(err, SynthError::InvalidRegion { .. }), "{rect:?}");
        }
    }

    #[test]
    fn blank_region_is_empty() {
        let img = square_image(10, 2);
        let mapping = CharacterMapping::new('A', "img", Rect::new(0, 0, 10, 2));
        let err = extract_region(&img, &mapping, 128).unwrap_err();
        assert!(matches!(err, SynthError::EmptyRegion { .. }));
    }

    #[test]
    fn crop_flips_rows_to_y_up() {
        // Ink only in the top-left pixel of the image.
        let mut pixels = vec![255u8; 4 * 3];
        pixels[0] = 0;
        let img = SourceImage::new(4, 3, 1, pixels).unwrap();
        let mapping = CharacterMapping::new('A', "img", Rect::new(0, 0, 4, 3));

        let region = extract_region(&img, &mapping, 128).unwrap();
        assert!(region.bitmap.get(0, 2));
        assert!(!region.bitmap.get(0, 0));
        assert_eq!(region.bitmap.ink_count(), 1);
    }

    #[test]
    fn polygon_masks_pixels_outside() {
        let img = square_image(10, 0);
        // Triangle covering the lower-left half of the rectangle.
        let mapping = CharacterMapping::new('A', "img", Rect::new(0, 0, 10, 10))
            .with_polygon(vec![[0.0, 0.0], [0.0, 10.0], [10.0, 10.0]]);

        let region = extract_region(&img, &mapping, 128).unwrap();
        let ink = region.bitmap.ink_count();
        assert!(ink > 30 && ink < 70, "ink = {ink}");
        // Image pixel (9, 0) is top-right, outside the triangle.
        assert!(!region.bitmap.get(9, 9));
        assert!(region.bitmap.get(0, 0));
    }

    #[test]
    fn polygon_is_clamped_to_rect_by_default() {
        let img = square_image(10, 0);
        let mapping = CharacterMapping::new('A', "img", Rect::new(2, 2, 6, 6))
            .with_polygon(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);

        let region = extract_region(&img, &mapping, 128).unwrap();
        assert_eq!(region.bounds, Rect::new(2, 2, 6, 6));
        assert_eq!(region.bitmap.ink_count(), 16);

        let mut free = mapping.clone();
        free.polygon_clip = PolygonClip::PolygonOnly;
        let region = extract_region(&img, &free, 128).unwrap();
        assert_eq!(region.bounds, Rect::new(0, 0, 10, 10));
        assert_eq!(region.bitmap.ink_count(), 100);
    }

    #[test]
    fn degenerate_polygon_is_invalid() {
        let img = square_image(10, 0);
        let mapping = CharacterMapping::new('A', "img", Rect::new(0, 0, 10, 10))
            .with_polygon(vec![[0.0, 0.0], [5.0, 5.0]]);
        assert!(matches!(
            extract_region(&img, &mapping, 128),
            Err(SynthError::InvalidRegion { .. })
        ));
    }

    #[test]
    fn transparent_pixels_are_background() {
        let img = SourceImage::new(2, 1, 2, vec![0, 255, 0, 0]).unwrap();
        let mapping = CharacterMapping::new('A', "img", Rect::new(0, 0, 2, 1));
        let region = extract_region(&img, &mapping, 128).unwrap();
        assert!(region.bitmap.get(0, 0));
        assert!(!region.bitmap.get(1, 0));
    }
}
