//! In-process contour tracer (made by FontLab https://www.fontlab.com/)
//!
//! A potrace-style pipeline: boundary decomposition with speckle removal,
//! optimal polygon fitting, corner/curve classification against `alphamax`
//! and optional curve merging bounded by `opttolerance`. The output is
//! deterministic for identical bitmaps and settings.
//!
//! Coordinates are pixel units with the origin at the bottom-left corner of
//! the bitmap and y pointing up. Ink outlines run clockwise, holes
//! counter-clockwise.

mod curve;
mod decompose;
mod polygon;

use std::time::{Duration, Instant};

use log::trace;
use thiserror::Error;

use crate::extract::Bitmap;
use crate::request::TracingSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A segment ends at the point(s) it carries; it starts where the previous one ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Line(Point),
    Cubic(Point, Point, Point),
}

impl Segment {
    pub fn end(&self) -> Point {
        match self {
            Segment::Line(p) | Segment::Cubic(_, _, p) => *p,
        }
    }
}

/// A closed outline; the last segment ends at `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub start: Point,
    pub segments: Vec<Segment>,
    pub is_hole: bool,
}

impl Contour {
    /// Shoelace area over the segment end points and sampled curves;
    /// positive means counter-clockwise.
    pub fn signed_area(&self) -> f64 {
        let mut area = 0.0;
        let mut prev = self.start;
        let mut add = |p: Point, prev: &mut Point| {
            area += prev.x * p.y - p.x * prev.y;
            *prev = p;
        };
        for seg in &self.segments {
            match *seg {
                Segment::Line(p) => add(p, &mut prev),
                Segment::Cubic(c1, c2, p) => {
                    let p0 = prev;
                    for step in 1..=4 {
                        let t = step as f64 / 4.0;
                        add(cubic_at(p0, c1, c2, p, t), &mut prev);
                    }
                }
            }
        }
        area / 2.0
    }

    /// Same outline, opposite direction.
    pub fn reversed(&self) -> Contour {
        let mut points = Vec::with_capacity(self.segments.len() + 1);
        points.push(self.start);
        points.extend(self.segments.iter().map(Segment::end));

        let mut segments = Vec::with_capacity(self.segments.len());
        for (idx, seg) in self.segments.iter().enumerate().rev() {
            let from = points[idx];
            segments.push(match *seg {
                Segment::Line(_) => Segment::Line(from),
                Segment::Cubic(c1, c2, _) => Segment::Cubic(c2, c1, from),
            });
        }

        Contour {
            start: self.start,
            segments,
            is_hole: self.is_hole,
        }
    }
}

fn cubic_at(p0: Point, p1: Point, p2: Point, p3: Point, t: f64) -> Point {
    let s = 1.0 - t;
    let (a, b, c, d) = (s * s * s, 3.0 * s * s * t, 3.0 * s * t * t, t * t * t);
    Point::new(
        a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    )
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TraceError {
    #[error("time limit of {0} ms exceeded")]
    TimeLimit(u64),
    #[error("no contour survived speckle suppression (turdsize {0})")]
    NoContours(u32),
    #[error("invalid tracing settings: {0}")]
    InvalidSettings(String),
    #[error("traced outline has non-finite coordinates")]
    NonFinite,
}

/// Wall-clock bound checked between tracing phases.
#[derive(Debug, Clone)]
pub(crate) struct Deadline {
    limit: Option<(Instant, u64)>,
}

impl Deadline {
    pub(crate) fn after_ms(ms: Option<u64>) -> Self {
        Self {
            limit: ms.map(|ms| (Instant::now() + Duration::from_millis(ms), ms)),
        }
    }

    #[cfg(test)]
    pub(crate) fn unbounded() -> Self {
        Self { limit: None }
    }

    pub(crate) fn check(&self) -> Result<(), TraceError> {
        match self.limit {
            Some((at, ms)) if Instant::now() >= at => Err(TraceError::TimeLimit(ms)),
            _ => Ok(()),
        }
    }
}

fn validate(settings: &TracingSettings) -> Result<(), TraceError> {
    if !settings.alphamax.is_finite() || settings.alphamax < 0.0 {
        return Err(TraceError::InvalidSettings(format!(
            "alphamax must be a non-negative number, got {}",
            settings.alphamax
        )));
    }
    if !settings.opttolerance.is_finite() || settings.opttolerance < 0.0 {
        return Err(TraceError::InvalidSettings(format!(
            "opttolerance must be a non-negative number, got {}",
            settings.opttolerance
        )));
    }
    Ok(())
}

/// Trace every ink boundary in `bitmap`.
pub fn trace_bitmap(bitmap: &Bitmap, settings: &TracingSettings) -> Result<Vec<Contour>, TraceError> {
    validate(settings)?;
    let deadline = Deadline::after_ms(settings.time_limit_ms);

    let paths = decompose::decompose(bitmap, settings.turdsize, settings.turnpolicy, &deadline)?;
    if paths.is_empty() {
        return Err(TraceError::NoContours(settings.turdsize));
    }
    trace!("decomposed {} paths", paths.len());

    let mut contours = Vec::with_capacity(paths.len());
    for path in &paths {
        deadline.check()?;

        let mut vertices = polygon::fit_polygon(path, &deadline)?;
        if !path.positive {
            vertices.reverse();
        }

        let mut nodes = curve::smooth(&vertices, settings.alphamax);
        if settings.opticurve {
            nodes = curve::optimize(&nodes, settings.opttolerance);
        }

        let contour = curve::to_contour(&nodes, !path.positive);
        if !contour_is_finite(&contour) {
            return Err(TraceError::NonFinite);
        }
        contours.push(orient(contour));
    }

    Ok(contours)
}

fn contour_is_finite(contour: &Contour) -> bool {
    let ok = |p: &Point| p.x.is_finite() && p.y.is_finite();
    ok(&contour.start)
        && contour.segments.iter().all(|seg| match seg {
            Segment::Line(p) => ok(p),
            Segment::Cubic(a, b, c) => ok(a) && ok(b) && ok(c),
        })
}

/// Ink clockwise, holes counter-clockwise.
fn orient(contour: Contour) -> Contour {
    let ccw = contour.signed_area() > 0.0;
    if ccw != contour.is_hole {
        contour.reversed()
    } else {
        contour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::TurnPolicy;

    fn settings() -> TracingSettings {
        TracingSettings {
            turdsize: 0,
            ..TracingSettings::default()
        }
    }

    fn bounds(contour: &Contour) -> (f64, f64, f64, f64) {
        let mut pts = vec![contour.start];
        for seg in &contour.segments {
            match *seg {
                Segment::Line(p) => pts.push(p),
                Segment::Cubic(a, b, c) => pts.extend([a, b, c]),
            }
        }
        pts.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }

    #[test]
    fn square_traces_to_clockwise_box() {
        let rows = vec!["........", ".######.", ".######.", ".######.", ".######.", "........"];
        let bm = Bitmap::from_rows(&rows);
        let contours = trace_bitmap(&bm, &settings()).expect("trace");

        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert!(!c.is_hole);
        assert!(c.signed_area() < 0.0, "ink outlines run clockwise");
        assert!((c.signed_area().abs() - 24.0).abs() < 2.0);

        let (x0, y0, x1, y1) = bounds(c);
        assert!((x0 - 1.0).abs() < 0.6 && (x1 - 7.0).abs() < 0.6);
        assert!((y0 - 1.0).abs() < 0.6 && (y1 - 5.0).abs() < 0.6);
        assert!(c.segments.iter().all(|s| matches!(s, Segment::Line(_))));
    }

    #[test]
    fn ring_has_counter_clockwise_hole() {
        let rows = vec![
            "##########",
            "##########",
            "###....###",
            "###....###",
            "###....###",
            "##########",
            "##########",
        ];
        let bm = Bitmap::from_rows(&rows);
        let contours = trace_bitmap(&bm, &settings()).expect("trace");

        assert_eq!(contours.len(), 2);
        let outer = contours.iter().find(|c| !c.is_hole).unwrap();
        let hole = contours.iter().find(|c| c.is_hole).unwrap();
        assert!(outer.signed_area() < 0.0);
        assert!(hole.signed_area() > 0.0);
        assert!(outer.signed_area().abs() > hole.signed_area().abs());
    }

    #[test]
    fn disc_gets_curves() {
        let size = 40i64;
        let r = 15.0;
        let mut bm = Bitmap::new(size as usize, size as usize);
        for y in 0..size {
            for x in 0..size {
                let dx = x as f64 + 0.5 - 20.0;
                let dy = y as f64 + 0.5 - 20.0;
                if dx * dx + dy * dy <= r * r {
                    bm.set(x as usize, y as usize, true);
                }
            }
        }
        let contours = trace_bitmap(&bm, &TracingSettings::default()).expect("trace");

        assert_eq!(contours.len(), 1);
        assert!(contours[0]
            .segments
            .iter()
            .any(|s| matches!(s, Segment::Cubic(..))));
        let area = contours[0].signed_area().abs();
        let expected = std::f64::consts::PI * r * r;
        assert!((area - expected).abs() / expected < 0.05, "area = {area}");
    }

    #[test]
    fn speckles_only_fail() {
        let bm = Bitmap::from_rows(&["#...#", ".....", "..#.."]);
        let err = trace_bitmap(&bm, &TracingSettings::default()).unwrap_err();
        assert_eq!(err, TraceError::NoContours(2));
    }

    #[test]
    fn zero_time_limit_aborts() {
        let bm = Bitmap::from_rows(&["####", "####"]);
        let limited = TracingSettings {
            time_limit_ms: Some(0),
            ..TracingSettings::default()
        };
        assert_eq!(
            trace_bitmap(&bm, &limited).unwrap_err(),
            TraceError::TimeLimit(0)
        );
    }

    #[test]
    fn negative_alphamax_is_rejected() {
        let bm = Bitmap::from_rows(&["##"]);
        let bad = TracingSettings {
            alphamax: -1.0,
            ..TracingSettings::default()
        };
        assert!(matches!(
            trace_bitmap(&bm, &bad),
            Err(TraceError::InvalidSettings(_))
        ));
    }

    #[test]
    fn identical_input_traces_identically() {
        let rows = vec![".#.#.#", "######", "#.##.#", "######", ".#..#."];
        let bm = Bitmap::from_rows(&rows);
        for policy in [TurnPolicy::Random, TurnPolicy::Majority, TurnPolicy::Left] {
            let s = TracingSettings {
                turnpolicy: policy,
                turdsize: 0,
                ..TracingSettings::default()
            };
            assert_eq!(trace_bitmap(&bm, &s), trace_bitmap(&bm, &s));
        }
    }

    #[test]
    fn reversing_flips_area_sign() {
        let c = Contour {
            start: Point::new(0.0, 0.0),
            segments: vec![
                Segment::Line(Point::new(0.0, 10.0)),
                Segment::Cubic(Point::new(3.0, 12.0), Point::new(7.0, 12.0), Point::new(10.0, 10.0)),
                Segment::Line(Point::new(10.0, 0.0)),
                Segment::Line(Point::new(0.0, 0.0)),
            ],
            is_hole: false,
        };
        let r = c.reversed();
        assert!((c.signed_area() + r.signed_area()).abs() < 1e-9);
        assert_eq!(r.segments.last().unwrap().end(), r.start);
        assert_eq!(r.reversed(), c);
    }
}
