//! Advance widths, side bearings and kerning (made by FontLab https://www.fontlab.com/)

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::Serialize;

use crate::error::{Warning, WarningKind};
use crate::glyph_id::GlyphId;
use crate::normalize::{BBox, GlyphOutline};
use crate::request::{FontAdjustments, KernPair};

/// Horizontal metrics of one glyph, in font units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlyphMetrics {
    pub advance: u16,
    pub lsb: i32,
    pub rsb: i32,
    pub bbox: Option<BBox>,
}

impl GlyphMetrics {
    /// Metrics for an outline-less glyph such as the space.
    pub fn blank(advance: u16) -> Self {
        Self {
            advance,
            lsb: 0,
            rsb: i32::from(advance),
            bbox: None,
        }
    }
}

/// `advance = round(((max_x - min_x) + lsb) * char_width) + letter_spacing`.
pub fn glyph_metrics(outline: &GlyphOutline, adjustments: &FontAdjustments) -> GlyphMetrics {
    let Some(bbox) = outline.bounds() else {
        let advance = clamp_advance(f64::from(adjustments.letter_spacing));
        return GlyphMetrics::blank(advance);
    };

    let lsb = bbox.x_min;
    let ink_width = f64::from(bbox.x_max - bbox.x_min);
    let advance = clamp_advance(
        ((ink_width + f64::from(lsb)) * adjustments.char_width).round()
            + f64::from(adjustments.letter_spacing),
    );

    GlyphMetrics {
        advance,
        lsb,
        rsb: i32::from(advance) - bbox.x_max,
        bbox: Some(bbox),
    }
}

fn clamp_advance(v: f64) -> u16 {
    if v.is_nan() {
        0
    } else {
        v.clamp(0.0, f64::from(u16::MAX)) as u16
    }
}

/// Keep pairs whose glyphs both made it into the font.
///
/// Later duplicates of the same ordered pair win. Zero-valued pairs vanish
/// without a warning since they do not change the layout.
pub fn resolve_kerning(
    pairs: &[KernPair],
    built: &BTreeSet<GlyphId>,
) -> (Vec<KernPair>, Vec<Warning>) {
    let mut kept: BTreeMap<(GlyphId, GlyphId), i16> = BTreeMap::new();
    let mut warnings = Vec::new();

    for pair in pairs {
        let missing: Vec<&GlyphId> = [&pair.left, &pair.right]
            .into_iter()
            .filter(|g| !built.contains(*g))
            .collect();
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
            warnings.push(Warning::new(
                Some(&pair.left),
                WarningKind::KerningDropped,
                format!(
                    "kerning pair {} {} dropped: {} not in font",
                    pair.left,
                    pair.right,
                    names.join(", ")
                ),
            ));
            continue;
        }
        kept.insert((pair.left.clone(), pair.right.clone()), pair.value);
    }

    let resolved: Vec<KernPair> = kept
        .into_iter()
        .filter(|(_, value)| *value != 0)
        .map(|((left, right), value)| KernPair { left, right, value })
        .collect();
    debug!(
        "kerning: {} pairs kept, {} dropped",
        resolved.len(),
        warnings.len()
    );
    (resolved, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{FontPoint, OutlineContour, OutlineSegment};

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> GlyphOutline {
        GlyphOutline {
            contours: vec![OutlineContour {
                start: FontPoint::new(x0, y0),
                segments: vec![
                    OutlineSegment::Line(FontPoint::new(x0, y1)),
                    OutlineSegment::Line(FontPoint::new(x1, y1)),
                    OutlineSegment::Line(FontPoint::new(x1, y0)),
                    OutlineSegment::Line(FontPoint::new(x0, y0)),
                ],
                is_hole: false,
            }],
        }
    }

    #[test]
    fn advance_spans_origin_to_right_edge() {
        let m = glyph_metrics(&rect(40, 0, 540, 700), &FontAdjustments::default());
        assert_eq!(m.advance, 540);
        assert_eq!(m.lsb, 40);
        assert_eq!(m.rsb, 0);
    }

    #[test]
    fn letter_spacing_adds_after_scaling() {
        let adj = FontAdjustments {
            letter_spacing: 50,
            char_width: 1.2,
            ..FontAdjustments::default()
        };
        let m = glyph_metrics(&rect(0, 0, 500, 700), &adj);
        assert_eq!(m.advance, 650);
        assert_eq!(m.rsb, 150);
    }

    #[test]
    fn negative_advance_clamps_to_zero() {
        let adj = FontAdjustments {
            letter_spacing: -5000,
            ..FontAdjustments::default()
        };
        assert_eq!(glyph_metrics(&rect(0, 0, 500, 700), &adj).advance, 0);
    }

    #[test]
    fn empty_outline_gets_spacing_only() {
        let adj = FontAdjustments {
            letter_spacing: 30,
            ..FontAdjustments::default()
        };
        let m = glyph_metrics(&GlyphOutline::default(), &adj);
        assert_eq!(m, GlyphMetrics::blank(30));
    }

    #[test]
    fn kerning_drops_unknown_and_zero_pairs() {
        let built: BTreeSet<GlyphId> = ['A', 'V'].into_iter().map(GlyphId::Char).collect();
        let pair = |l: char, r: char, v: i16| KernPair {
            left: GlyphId::Char(l),
            right: GlyphId::Char(r),
            value: v,
        };
        let (kept, warnings) = resolve_kerning(
            &[pair('A', 'V', -40), pair('A', 'Q', -10), pair('V', 'A', 0), pair('A', 'V', -60)],
            &built,
        );

        assert_eq!(kept, vec![pair('A', 'V', -60)]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::KerningDropped);
        assert!(warnings[0].message.contains('Q'));
    }
}
