//! Pixel space to font units (made by FontLab https://www.fontlab.com/)
//!
//! Traced contours arrive in pixel units with the origin at the bottom-left
//! corner of the region. Scaling maps the region height onto the em square,
//! then the baseline offset (or an absolute per-character position) is
//! applied. Results are rounded and clamped to the range every font table
//! can represent.

use serde::{Deserialize, Serialize};

use crate::error::SynthError;
use crate::glyph_id::GlyphId;
use crate::request::FontAdjustments;
use crate::trace::{Contour, Point, Segment};

pub const COORD_MIN: i32 = -16384;
pub const COORD_MAX: i32 = 16383;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontPoint {
    pub x: i32,
    pub y: i32,
}

impl FontPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineSegment {
    Line(FontPoint),
    Cubic(FontPoint, FontPoint, FontPoint),
}

impl OutlineSegment {
    pub fn end(&self) -> FontPoint {
        match self {
            OutlineSegment::Line(p) | OutlineSegment::Cubic(_, _, p) => *p,
        }
    }
}

/// Closed contour in font units; the last segment returns to `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineContour {
    pub start: FontPoint,
    pub segments: Vec<OutlineSegment>,
    pub is_hole: bool,
}

impl OutlineContour {
    /// Same contour traversed the other way.
    pub fn reversed(&self) -> OutlineContour {
        let mut points = Vec::with_capacity(self.segments.len() + 1);
        points.push(self.start);
        points.extend(self.segments.iter().map(OutlineSegment::end));

        let segments = self
            .segments
            .iter()
            .enumerate()
            .rev()
            .map(|(idx, seg)| match *seg {
                OutlineSegment::Line(_) => OutlineSegment::Line(points[idx]),
                OutlineSegment::Cubic(c1, c2, _) => OutlineSegment::Cubic(c2, c1, points[idx]),
            })
            .collect();

        OutlineContour {
            start: self.start,
            segments,
            is_hole: self.is_hole,
        }
    }

    fn points(&self) -> impl Iterator<Item = FontPoint> + '_ {
        std::iter::once(self.start).chain(self.segments.iter().flat_map(|seg| {
            let pts: Vec<FontPoint> = match *seg {
                OutlineSegment::Line(p) => vec![p],
                OutlineSegment::Cubic(a, b, c) => vec![a, b, c],
            };
            pts
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl BBox {
    pub fn union(self, other: BBox) -> BBox {
        BBox {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    pub(crate) fn include(self, p: FontPoint) -> BBox {
        BBox {
            x_min: self.x_min.min(p.x),
            y_min: self.y_min.min(p.y),
            x_max: self.x_max.max(p.x),
            y_max: self.y_max.max(p.y),
        }
    }

    pub(crate) fn at(p: FontPoint) -> BBox {
        BBox {
            x_min: p.x,
            y_min: p.y,
            x_max: p.x,
            y_max: p.y,
        }
    }
}

/// Glyph shape in integer font units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphOutline {
    pub contours: Vec<OutlineContour>,
}

impl GlyphOutline {
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// Control-point bounds; `None` for an empty outline.
    pub fn bounds(&self) -> Option<BBox> {
        self.contours
            .iter()
            .flat_map(OutlineContour::points)
            .fold(None, |acc: Option<BBox>, p| {
                Some(acc.map_or_else(|| BBox::at(p), |b| b.include(p)))
            })
    }

    pub fn point_count(&self) -> usize {
        self.contours.iter().map(|c| c.points().count()).sum()
    }
}

/// Result of normalizing one character.
#[derive(Debug)]
pub struct Normalized {
    pub outline: GlyphOutline,
    /// Set when any coordinate had to be clamped.
    pub overflow: Option<SynthError>,
}

/// Affine map from pixel space into font units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Transform {
    pub fn for_glyph(
        glyph: &GlyphId,
        region_height: usize,
        units_per_em: u16,
        adjustments: &FontAdjustments,
    ) -> Self {
        let scale = f64::from(units_per_em) / region_height.max(1) as f64;
        let width = adjustments
            .char_width_overrides
            .get(glyph)
            .copied()
            .unwrap_or(1.0);

        let (dx, dy) = match adjustments.char_positions.get(glyph) {
            Some(pos) => (pos.x, pos.y),
            None => (0.0, f64::from(adjustments.baseline_offset)),
        };

        Self {
            scale_x: scale * width,
            scale_y: scale,
            dx,
            dy,
        }
    }

    fn apply(&self, p: Point) -> (f64, f64) {
        (p.x * self.scale_x + self.dx, p.y * self.scale_y + self.dy)
    }
}

struct Rounder {
    clamped: usize,
}

impl Rounder {
    fn coord(&mut self, v: f64) -> i32 {
        let r = v.round();
        if r < f64::from(COORD_MIN) {
            self.clamped += 1;
            COORD_MIN
        } else if r > f64::from(COORD_MAX) {
            self.clamped += 1;
            COORD_MAX
        } else {
            r as i32
        }
    }

    fn point(&mut self, t: &Transform, p: Point) -> FontPoint {
        let (x, y) = t.apply(p);
        FontPoint::new(self.coord(x), self.coord(y))
    }
}

/// Scale, translate, round and clamp traced contours into font units.
pub fn normalize(
    glyph: &GlyphId,
    contours: &[Contour],
    region_height: usize,
    units_per_em: u16,
    adjustments: &FontAdjustments,
) -> Normalized {
    let transform = Transform::for_glyph(glyph, region_height, units_per_em, adjustments);
    let mut rounder = Rounder { clamped: 0 };

    let contours = contours
        .iter()
        .map(|contour| OutlineContour {
            start: rounder.point(&transform, contour.start),
            segments: contour
                .segments
                .iter()
                .map(|seg| match *seg {
                    Segment::Line(p) => OutlineSegment::Line(rounder.point(&transform, p)),
                    Segment::Cubic(a, b, c) => OutlineSegment::Cubic(
                        rounder.point(&transform, a),
                        rounder.point(&transform, b),
                        rounder.point(&transform, c),
                    ),
                })
                .collect(),
            is_hole: contour.is_hole,
        })
        .collect();

    let overflow = (rounder.clamped > 0).then(|| SynthError::CoordinateOverflow {
        glyph: glyph.clone(),
        clamped: rounder.clamped,
    });

    Normalized {
        outline: GlyphOutline { contours },
        overflow,
    }
}
