//! Fixed-layout tables: `head`, `hhea`, `hmtx`, `maxp`, `OS/2`, `post`, `kern`.

use crate::normalize::BBox;

use super::name::FontNames;
use super::writer::{sat_i16, sat_u16, search_params, TableWriter};

const HEAD_MAGIC: u32 = 0x5F0F_3CF5;
/// Baseline at y=0, left sidebearing at x=0 (bit 1 as set by most tools),
/// integer ppem scaling.
const HEAD_FLAGS: u16 = 0x000B;

/// Largest pair count whose subtable length still fits `u16`.
pub const KERN_MAX_PAIRS: usize = (0xFFFF - 14) / 6;

/// One glyph row as seen by the metric tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphRow {
    pub advance: u16,
    pub bbox: Option<BBox>,
}

impl GlyphRow {
    pub fn lsb(&self) -> i16 {
        self.bbox.map_or(0, |b| sat_i16(b.x_min))
    }
}

/// Font-wide vertical metrics shared by `hhea` and `OS/2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMetrics {
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub x_height: i16,
    pub cap_height: i16,
}

impl LineMetrics {
    /// Ascender and descender cover both the ink and an 80/20 em split.
    pub fn derive(units_per_em: u16, font_bbox: Option<BBox>, x_height: Option<i32>, cap_height: Option<i32>) -> Self {
        let em = f64::from(units_per_em);
        let nominal_asc = (em * 0.8).round() as i32;
        let nominal_desc = -((em * 0.2).round() as i32);
        let (asc, desc) = match font_bbox {
            Some(b) => (b.y_max.max(nominal_asc), b.y_min.min(nominal_desc)),
            None => (nominal_asc, nominal_desc),
        };
        Self {
            ascender: sat_i16(asc),
            descender: sat_i16(desc),
            line_gap: 0,
            x_height: sat_i16(x_height.unwrap_or((em * 0.5).round() as i32)),
            cap_height: sat_i16(cap_height.unwrap_or((em * 0.7).round() as i32)),
        }
    }
}

pub fn build_head(names: &FontNames, units_per_em: u16, bbox: BBox, short_loca: bool) -> Vec<u8> {
    let mut mac_style = 0u16;
    if names.bold {
        mac_style |= 0x01;
    }
    if names.italic {
        mac_style |= 0x02;
    }

    let mut w = TableWriter::with_capacity(54);
    w.u32(0x0001_0000)
        .u32(names.revision)
        .u32(0) // checkSumAdjustment, patched last
        .u32(HEAD_MAGIC)
        .u16(HEAD_FLAGS)
        .u16(units_per_em)
        .i64(names.timestamp)
        .i64(names.timestamp)
        .i16(sat_i16(bbox.x_min))
        .i16(sat_i16(bbox.y_min))
        .i16(sat_i16(bbox.x_max))
        .i16(sat_i16(bbox.y_max))
        .u16(mac_style)
        .u16(8)
        .i16(2)
        .i16(if short_loca { 0 } else { 1 })
        .i16(0);
    w.into_inner()
}

pub fn build_hhea(line: &LineMetrics, rows: &[GlyphRow]) -> Vec<u8> {
    let advance_max = rows.iter().map(|r| r.advance).max().unwrap_or(0);
    let inked: Vec<(u16, BBox)> = rows
        .iter()
        .filter_map(|r| r.bbox.map(|b| (r.advance, b)))
        .collect();
    let min_lsb = inked.iter().map(|(_, b)| b.x_min).min().unwrap_or(0);
    let min_rsb = inked
        .iter()
        .map(|(adv, b)| i32::from(*adv) - b.x_max)
        .min()
        .unwrap_or(0);
    let max_extent = inked.iter().map(|(_, b)| b.x_max).max().unwrap_or(0);

    let mut w = TableWriter::with_capacity(36);
    w.u32(0x0001_0000)
        .i16(line.ascender)
        .i16(line.descender)
        .i16(line.line_gap)
        .u16(advance_max)
        .i16(sat_i16(min_lsb))
        .i16(sat_i16(min_rsb))
        .i16(sat_i16(max_extent))
        .i16(1)
        .i16(0)
        .i16(0);
    for _ in 0..4 {
        w.i16(0);
    }
    w.i16(0).u16(rows.len() as u16);
    w.into_inner()
}

/// Full metrics for every glyph; no trailing lsb-only run.
pub fn build_hmtx(rows: &[GlyphRow]) -> Vec<u8> {
    let mut w = TableWriter::with_capacity(rows.len() * 4);
    for r in rows {
        w.u16(r.advance).i16(r.lsb());
    }
    w.into_inner()
}

/// Version 1.0 `maxp` for TrueType outlines.
pub fn build_maxp_truetype(num_glyphs: u16, max_points: u16, max_contours: u16) -> Vec<u8> {
    let mut w = TableWriter::with_capacity(32);
    w.u32(0x0001_0000)
        .u16(num_glyphs)
        .u16(max_points)
        .u16(max_contours)
        .u16(0)
        .u16(0)
        .u16(2);
    for _ in 0..8 {
        w.u16(0);
    }
    w.into_inner()
}

/// Version 0.5 `maxp` for CFF outlines.
pub fn build_maxp_cff(num_glyphs: u16) -> Vec<u8> {
    let mut w = TableWriter::with_capacity(6);
    w.u32(0x0000_5000).u16(num_glyphs);
    w.into_inner()
}

/// Inputs for `OS/2` beyond the per-glyph rows.
#[derive(Debug, Clone)]
pub struct Os2Input<'a> {
    pub units_per_em: u16,
    pub line: LineMetrics,
    pub rows: &'a [GlyphRow],
    pub codepoints: &'a [u32],
    pub bold: bool,
    pub italic: bool,
    pub has_kerning: bool,
}

fn unicode_ranges(codepoints: &[u32]) -> [u32; 4] {
    let mut ranges = [0u32; 4];
    let mut set = |bit: u32| ranges[(bit / 32) as usize] |= 1 << (bit % 32);
    for &cp in codepoints {
        match cp {
            0x0000..=0x007F => set(0),
            0x0080..=0x00FF => set(1),
            0x0100..=0x017F => set(2),
            0x0180..=0x024F => set(3),
            0x0370..=0x03FF => set(7),
            0x0400..=0x04FF => set(9),
            0x2000..=0x206F => set(31),
            0x3040..=0x309F => set(49),
            0x30A0..=0x30FF => set(50),
            0x4E00..=0x9FFF => set(59),
            0xAC00..=0xD7AF => set(56),
            0x1_0000..=0x10_FFFF => set(57),
            _ => {}
        }
    }
    ranges
}

/// Version 4 `OS/2`.
pub fn build_os2(input: &Os2Input<'_>) -> Vec<u8> {
    let em = f64::from(input.units_per_em);
    let scaled = |f: f64| sat_i16((em * f).round() as i32);

    let advances: Vec<i64> = input
        .rows
        .iter()
        .filter(|r| r.advance > 0)
        .map(|r| i64::from(r.advance))
        .collect();
    let avg_width = if advances.is_empty() {
        0
    } else {
        (advances.iter().sum::<i64>() as f64 / advances.len() as f64).round() as i32
    };

    let mut fs_selection = 0u16;
    if input.italic {
        fs_selection |= 0x0001;
    }
    if input.bold {
        fs_selection |= 0x0020;
    }
    if !input.italic && !input.bold {
        fs_selection |= 0x0040;
    }
    fs_selection |= 0x0080;

    let first = input.codepoints.iter().min().copied().unwrap_or(0);
    let last = input.codepoints.iter().max().copied().unwrap_or(0);
    let ranges = unicode_ranges(input.codepoints);
    let latin = input.codepoints.iter().any(|cp| *cp < 0x100);
    let win_ascent = input
        .rows
        .iter()
        .filter_map(|r| r.bbox.map(|b| b.y_max))
        .max()
        .unwrap_or(0)
        .max(i32::from(input.line.ascender));
    let win_descent = -input
        .rows
        .iter()
        .filter_map(|r| r.bbox.map(|b| b.y_min))
        .min()
        .unwrap_or(0)
        .min(i32::from(input.line.descender));

    let mut w = TableWriter::with_capacity(96);
    w.u16(4)
        .i16(sat_i16(avg_width))
        .u16(if input.bold { 700 } else { 400 })
        .u16(5)
        .u16(0)
        // subscript x/y size, x/y offset
        .i16(scaled(0.65))
        .i16(scaled(0.6))
        .i16(0)
        .i16(scaled(0.075))
        // superscript x/y size, x/y offset
        .i16(scaled(0.65))
        .i16(scaled(0.6))
        .i16(0)
        .i16(scaled(0.35))
        .i16(scaled(0.05))
        .i16(scaled(0.3))
        .i16(0)
        .bytes(&[0u8; 10]);
    for r in ranges {
        w.u32(r);
    }
    w.tag(*b"NONE")
        .u16(fs_selection)
        .u16(first.min(0xFFFF) as u16)
        .u16(last.min(0xFFFF) as u16)
        .i16(input.line.ascender)
        .i16(input.line.descender)
        .i16(input.line.line_gap)
        .u16(sat_u16(i64::from(win_ascent)))
        .u16(sat_u16(i64::from(win_descent)))
        .u32(if latin { 1 } else { 0 })
        .u32(0)
        .i16(input.line.x_height)
        .i16(input.line.cap_height)
        .u16(0)
        .u16(0x20)
        .u16(if input.has_kerning { 2 } else { 1 });
    w.into_inner()
}

/// Index of `name` in the standard Macintosh glyph order, for the names
/// this crate can produce.
fn mac_standard_index(name: &str) -> Option<u16> {
    match name {
        ".notdef" => Some(0),
        "space" => Some(3),
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c @ 'A'..='Z'), None) => Some(36 + (c as u16 - 'A' as u16)),
                (Some(c @ 'a'..='z'), None) => Some(68 + (c as u16 - 'a' as u16)),
                _ => None,
            }
        }
    }
}

fn post_header(version: u32, units_per_em: u16, italic: bool) -> TableWriter {
    let em = f64::from(units_per_em);
    let mut w = TableWriter::new();
    w.u32(version)
        // italicAngle, 16.16
        .i32(if italic { -12 << 16 } else { 0 })
        .i16(sat_i16(-(em * 0.1).round() as i32))
        .i16(sat_i16((em * 0.05).round() as i32))
        .u32(0);
    for _ in 0..4 {
        w.u32(0);
    }
    w
}

/// `post` 2.0 with every glyph name spelled out.
pub fn build_post_v2(glyph_names: &[String], units_per_em: u16, italic: bool) -> Vec<u8> {
    let mut w = post_header(0x0002_0000, units_per_em, italic);
    w.u16(glyph_names.len() as u16);

    let mut custom: Vec<&str> = Vec::new();
    for name in glyph_names {
        let idx = match mac_standard_index(name) {
            Some(idx) => idx,
            None => {
                custom.push(name);
                257 + custom.len() as u16
            }
        };
        w.u16(idx);
    }
    for name in custom {
        w.u8(name.len() as u8).bytes(name.as_bytes());
    }
    w.into_inner()
}

/// `post` 3.0: no glyph names.
pub fn build_post_v3(units_per_em: u16, italic: bool) -> Vec<u8> {
    post_header(0x0003_0000, units_per_em, italic).into_inner()
}

/// Version 0 `kern` with one horizontal format 0 subtable.
/// `pairs` must be sorted by `(left, right)` glyph id.
pub fn build_kern(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
    let pairs = &pairs[..pairs.len().min(KERN_MAX_PAIRS)];
    let n = pairs.len() as u16;
    let (search_range, entry_selector, range_shift) = search_params(n, 6);

    let mut w = TableWriter::with_capacity(18 + pairs.len() * 6);
    w.u16(0).u16(1);
    w.u16(0)
        .u16((14 + 6 * pairs.len()) as u16)
        .u16(0x0001)
        .u16(n)
        .u16(search_range)
        .u16(entry_selector)
        .u16(range_shift);
    for (left, right, value) in pairs {
        w.u16(*left).u16(*right).i16(*value);
    }
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::FontMetadata;

    fn bbox(x0: i32, y0: i32, x1: i32, y1: i32) -> BBox {
        BBox {
            x_min: x0,
            y_min: y0,
            x_max: x1,
            y_max: y1,
        }
    }

    #[test]
    fn head_is_54_bytes_with_magic() {
        let names = FontNames::from_metadata(&FontMetadata::new("Hand")).unwrap();
        let head = build_head(&names, 1000, bbox(0, -10, 500, 700), true);
        assert_eq!(head.len(), 54);
        assert_eq!(&head[12..16], &[0x5F, 0x0F, 0x3C, 0xF5]);
        assert_eq!(&head[8..12], &[0, 0, 0, 0]);
        assert_eq!(&head[50..52], &[0, 0]);
    }

    #[test]
    fn hhea_tracks_extremes_of_inked_glyphs() {
        let rows = [
            GlyphRow {
                advance: 600,
                bbox: Some(bbox(50, 0, 550, 700)),
            },
            GlyphRow {
                advance: 250,
                bbox: None,
            },
        ];
        let line = LineMetrics::derive(1000, Some(bbox(50, 0, 550, 700)), None, None);
        let hhea = build_hhea(&line, &rows);
        assert_eq!(hhea.len(), 36);
        let at = |i: usize| i16::from_be_bytes([hhea[i], hhea[i + 1]]);
        assert_eq!(at(4), 800);
        assert_eq!(at(6), -200);
        assert_eq!(at(10), 600);
        assert_eq!(at(12), 50);
        assert_eq!(at(14), 50);
        assert_eq!(at(16), 550);
        assert_eq!(at(34), 2);
    }

    #[test]
    fn os2_is_version_4_sized() {
        let rows = [GlyphRow {
            advance: 500,
            bbox: Some(bbox(0, 0, 500, 700)),
        }];
        let line = LineMetrics::derive(1000, Some(bbox(0, 0, 500, 700)), None, None);
        let os2 = build_os2(&Os2Input {
            units_per_em: 1000,
            line,
            rows: &rows,
            codepoints: &[0x41],
            bold: false,
            italic: false,
            has_kerning: false,
        });
        assert_eq!(os2.len(), 96);
        assert_eq!(&os2[58..62], b"NONE");
        assert_eq!(u16::from_be_bytes([os2[64], os2[65]]), 0x41);
    }

    #[test]
    fn post_v2_mixes_standard_and_custom_names() {
        let names: Vec<String> = [".notdef", "A", "uni00E9", "space"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let post = build_post_v2(&names, 1000, false);
        let idx: Vec<u16> = (0..4)
            .map(|i| u16::from_be_bytes([post[34 + 2 * i], post[35 + 2 * i]]))
            .collect();
        assert_eq!(idx, vec![0, 36, 258, 3]);
        assert_eq!(&post[42..], b"\x07uni00E9");
    }

    #[test]
    fn kern_header_matches_pair_count() {
        let kern = build_kern(&[(1, 2, -40), (2, 1, -20)]);
        assert_eq!(kern.len(), 4 + 14 + 12);
        assert_eq!(u16::from_be_bytes([kern[10], kern[11]]), 2);
        assert_eq!(u16::from_be_bytes([kern[12], kern[13]]), 12);
    }
}
