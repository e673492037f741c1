//! TrueType outlines: cubic to quadratic conversion, `glyf` and `loca`.

use crate::normalize::{BBox, FontPoint, GlyphOutline, OutlineSegment, COORD_MAX, COORD_MIN};

use super::writer::{sat_i16, TableWriter};

/// Maximum distance, in font units, between a cubic and its quadratic stand-in.
const CU2QU_TOLERANCE: f64 = 1.0;
const MAX_QUADRATIC_SPLITS: usize = 16;

const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const REPEAT: u8 = 0x08;
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pt {
    x: f64,
    y: f64,
}

impl Pt {
    fn of(p: FontPoint) -> Self {
        Self {
            x: f64::from(p.x),
            y: f64::from(p.y),
        }
    }
    fn lerp(self, o: Pt, t: f64) -> Pt {
        Pt {
            x: self.x + (o.x - self.x) * t,
            y: self.y + (o.y - self.y) * t,
        }
    }
    fn dist(self, o: Pt) -> f64 {
        (self.x - o.x).hypot(self.y - o.y)
    }
    fn round(self) -> FontPoint {
        let r = |v: f64| (v.round() as i32).clamp(COORD_MIN, COORD_MAX);
        FontPoint::new(r(self.x), r(self.y))
    }
}

fn cubic_at(c: &[Pt; 4], t: f64) -> Pt {
    let ab = c[0].lerp(c[1], t);
    let bc = c[1].lerp(c[2], t);
    let cd = c[2].lerp(c[3], t);
    ab.lerp(bc, t).lerp(bc.lerp(cd, t), t)
}

/// Sub-curve of `c` between parameters `t0` and `t1`.
fn cubic_segment(c: &[Pt; 4], t0: f64, t1: f64) -> [Pt; 4] {
    let p0 = cubic_at(c, t0);
    let p3 = cubic_at(c, t1);
    let d = t1 - t0;
    let deriv = |t: f64| {
        let s = 1.0 - t;
        Pt {
            x: 3.0 * (s * s * (c[1].x - c[0].x) + 2.0 * s * t * (c[2].x - c[1].x) + t * t * (c[3].x - c[2].x)),
            y: 3.0 * (s * s * (c[1].y - c[0].y) + 2.0 * s * t * (c[2].y - c[1].y) + t * t * (c[3].y - c[2].y)),
        }
    };
    let (d0, d1) = (deriv(t0), deriv(t1));
    [
        p0,
        Pt {
            x: p0.x + d0.x * d / 3.0,
            y: p0.y + d0.y * d / 3.0,
        },
        Pt {
            x: p3.x - d1.x * d / 3.0,
            y: p3.y - d1.y * d / 3.0,
        },
        p3,
    ]
}

/// Single quadratic control point matching the cubic's end tangents on average.
fn quadratic_control(c: &[Pt; 4]) -> Pt {
    Pt {
        x: (3.0 * (c[1].x + c[2].x) - c[0].x - c[3].x) / 4.0,
        y: (3.0 * (c[1].y + c[2].y) - c[0].y - c[3].y) / 4.0,
    }
}

fn quadratic_fits(c: &[Pt; 4], q: Pt) -> bool {
    (1..8).all(|i| {
        let t = i as f64 / 8.0;
        let s = 1.0 - t;
        let quad = Pt {
            x: s * s * c[0].x + 2.0 * s * t * q.x + t * t * c[3].x,
            y: s * s * c[0].y + 2.0 * s * t * q.y + t * t * c[3].y,
        };
        quad.dist(cubic_at(c, t)) <= CU2QU_TOLERANCE
    })
}

/// Approximate one cubic with the fewest equal-parameter quadratic pieces
/// that stay within tolerance. Returns `(control, end)` pairs.
fn cubic_to_quadratics(p0: FontPoint, c1: FontPoint, c2: FontPoint, p3: FontPoint) -> Vec<(FontPoint, FontPoint)> {
    let cubic = [Pt::of(p0), Pt::of(c1), Pt::of(c2), Pt::of(p3)];
    let mut best = Vec::new();
    for n in 1..=MAX_QUADRATIC_SPLITS {
        let pieces: Vec<[Pt; 4]> = (0..n)
            .map(|i| cubic_segment(&cubic, i as f64 / n as f64, (i + 1) as f64 / n as f64))
            .collect();
        let controls: Vec<Pt> = pieces.iter().map(quadratic_control).collect();
        let fits = pieces.iter().zip(&controls).all(|(piece, q)| quadratic_fits(piece, *q));

        best = pieces
            .iter()
            .zip(&controls)
            .map(|(piece, q)| (q.round(), piece[3].round()))
            .collect();
        if fits {
            break;
        }
    }
    if let Some(last) = best.last_mut() {
        last.1 = p3;
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TtPoint {
    p: FontPoint,
    on: bool,
}

/// Quadratic point list of each contour, closing point dropped.
fn contour_points(outline: &GlyphOutline) -> Vec<Vec<TtPoint>> {
    outline
        .contours
        .iter()
        .map(|contour| {
            let mut pts = vec![TtPoint {
                p: contour.start,
                on: true,
            }];
            let mut cur = contour.start;
            for seg in &contour.segments {
                match *seg {
                    OutlineSegment::Line(p) => pts.push(TtPoint { p, on: true }),
                    OutlineSegment::Cubic(c1, c2, p) => {
                        for (q, end) in cubic_to_quadratics(cur, c1, c2, p) {
                            pts.push(TtPoint { p: q, on: false });
                            pts.push(TtPoint { p: end, on: true });
                        }
                    }
                }
                cur = seg.end();
            }
            pts.dedup_by(|b, a| a.on && b.on && a.p == b.p);
            if pts.len() > 1 {
                let (first, last) = (pts[0], pts[pts.len() - 1]);
                if first.on && last.on && first.p == last.p {
                    pts.pop();
                }
            }
            pts
        })
        .filter(|pts| pts.len() >= 2)
        .collect()
}

/// One encoded `glyf` entry plus what `hmtx`, `head` and `maxp` need from it.
#[derive(Debug, Clone, Default)]
pub struct EncodedGlyph {
    pub data: Vec<u8>,
    pub bbox: Option<BBox>,
    pub points: u16,
    pub contours: u16,
}

pub fn encode_glyph(outline: &GlyphOutline) -> EncodedGlyph {
    let contours = contour_points(outline);
    if contours.is_empty() {
        return EncodedGlyph::default();
    }

    let all: Vec<TtPoint> = contours.iter().flatten().copied().collect();
    let bbox = all
        .iter()
        .skip(1)
        .fold(BBox::at(all[0].p), |b, tp| b.include(tp.p));

    let mut w = TableWriter::new();
    w.i16(contours.len() as i16)
        .i16(sat_i16(bbox.x_min))
        .i16(sat_i16(bbox.y_min))
        .i16(sat_i16(bbox.x_max))
        .i16(sat_i16(bbox.y_max));

    let mut end = 0usize;
    for c in &contours {
        end += c.len();
        w.u16((end - 1) as u16);
    }
    w.u16(0);

    let mut flags = Vec::with_capacity(all.len());
    let mut xs = TableWriter::new();
    let mut ys = TableWriter::new();
    let mut prev = FontPoint::new(0, 0);
    for tp in &all {
        let mut flag = if tp.on { ON_CURVE } else { 0 };
        flag |= encode_delta(&mut xs, tp.p.x - prev.x, X_SHORT, X_SAME_OR_POSITIVE);
        flag |= encode_delta(&mut ys, tp.p.y - prev.y, Y_SHORT, Y_SAME_OR_POSITIVE);
        flags.push(flag);
        prev = tp.p;
    }

    write_flags(&mut w, &flags);
    w.bytes(&xs.into_inner()).bytes(&ys.into_inner()).align(2);

    EncodedGlyph {
        data: w.into_inner(),
        bbox: Some(bbox),
        points: all.len() as u16,
        contours: contours.len() as u16,
    }
}

fn encode_delta(out: &mut TableWriter, delta: i32, short: u8, same_or_positive: u8) -> u8 {
    if delta == 0 {
        same_or_positive
    } else if delta.abs() <= 255 {
        out.u8(delta.unsigned_abs() as u8);
        if delta > 0 {
            short | same_or_positive
        } else {
            short
        }
    } else {
        out.i16(sat_i16(delta));
        0
    }
}

fn write_flags(w: &mut TableWriter, flags: &[u8]) {
    let mut i = 0;
    while i < flags.len() {
        let flag = flags[i];
        let mut run = 1;
        while i + run < flags.len() && flags[i + run] == flag && run < 256 {
            run += 1;
        }
        if run > 1 {
            w.u8(flag | REPEAT).u8((run - 1) as u8);
        } else {
            w.u8(flag);
        }
        i += run;
    }
}

/// Concatenated `glyf` data and `loca`; short offsets when they fit.
#[derive(Debug, Clone)]
pub struct GlyphTables {
    pub glyf: Vec<u8>,
    pub loca: Vec<u8>,
    pub short_loca: bool,
}

pub fn build_glyf_loca(glyphs: &[&EncodedGlyph]) -> GlyphTables {
    let mut offsets = Vec::with_capacity(glyphs.len() + 1);
    let mut glyf = TableWriter::new();
    for g in glyphs {
        offsets.push(glyf.len() as u32);
        glyf.bytes(&g.data);
    }
    offsets.push(glyf.len() as u32);

    let short_loca = offsets.last().map_or(true, |&end| end / 2 <= u32::from(u16::MAX));
    let mut loca = TableWriter::new();
    for off in offsets {
        if short_loca {
            loca.u16((off / 2) as u16);
        } else {
            loca.u32(off);
        }
    }

    GlyphTables {
        glyf: glyf.into_inner(),
        loca: loca.into_inner(),
        short_loca,
    }
}
