//! Corner detection, Bézier smoothing and curve merging over a fitted polygon.

use super::{Contour, Point, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Joint {
    Corner,
    Curve,
}

/// One vertex of a smoothed curve.
///
/// For a `Curve` joint, `c` holds the two Bézier controls and the end point.
/// For a `Corner`, `c[1]` is the corner itself and `c[2]` the end point.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Node {
    pub joint: Joint,
    pub c: [Point; 3],
    pub vertex: Point,
    pub alpha: f64,
}

/// cos(179°): edges bending back on themselves stop curve merging.
const COS179: f64 = -0.999_847_695_156_391;

fn interval(lambda: f64, a: Point, b: Point) -> Point {
    Point::new(a.x + lambda * (b.x - a.x), a.y + lambda * (b.y - a.y))
}

fn fsign(v: f64) -> i32 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Unit vector rotated 90° from the L-infinity direction of `p0 -> p2`.
fn dorth_infty(p0: Point, p2: Point) -> Point {
    Point::new(-(fsign(p2.y - p0.y) as f64), fsign(p2.x - p0.x) as f64)
}

/// Twice the signed area of triangle `p0 p1 p2`.
fn dpara(p0: Point, p1: Point, p2: Point) -> f64 {
    (p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y)
}

fn ddenom(p0: Point, p2: Point) -> f64 {
    let r = dorth_infty(p0, p2);
    r.y * (p2.x - p0.x) - r.x * (p2.y - p0.y)
}

fn cprod(p0: Point, p1: Point, p2: Point, p3: Point) -> f64 {
    (p1.x - p0.x) * (p3.y - p2.y) - (p3.x - p2.x) * (p1.y - p0.y)
}

fn iprod(p0: Point, p1: Point, p2: Point) -> f64 {
    (p1.x - p0.x) * (p2.x - p0.x) + (p1.y - p0.y) * (p2.y - p0.y)
}

fn iprod1(p0: Point, p1: Point, p2: Point, p3: Point) -> f64 {
    (p1.x - p0.x) * (p3.x - p2.x) + (p1.y - p0.y) * (p3.y - p2.y)
}

fn ddist(p: Point, q: Point) -> f64 {
    ((p.x - q.x).powi(2) + (p.y - q.y).powi(2)).sqrt()
}

fn bezier(t: f64, p0: Point, p1: Point, p2: Point, p3: Point) -> Point {
    let s = 1.0 - t;
    let (a, b, c, d) = (s * s * s, 3.0 * s * s * t, 3.0 * t * t * s, t * t * t);
    Point::new(
        a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    )
}

/// Parameter where the Bézier's tangent is parallel to `q0 -> q1`, or -1.
fn tangent(p0: Point, p1: Point, p2: Point, p3: Point, q0: Point, q1: Point) -> f64 {
    let a0 = cprod(p0, p1, q0, q1);
    let b0 = cprod(p1, p2, q0, q1);
    let c0 = cprod(p2, p3, q0, q1);

    let a = a0 - 2.0 * b0 + c0;
    let b = -2.0 * a0 + 2.0 * b0;
    let c = a0;
    let d = b * b - 4.0 * a * c;

    if a == 0.0 || d < 0.0 {
        return -1.0;
    }

    let s = d.sqrt();
    let r1 = (-b + s) / (2.0 * a);
    let r2 = (-b - s) / (2.0 * a);
    if (0.0..=1.0).contains(&r1) {
        r1
    } else if (0.0..=1.0).contains(&r2) {
        r2
    } else {
        -1.0
    }
}

/// Turn polygon vertices into corners and Bézier joints.
pub(crate) fn smooth(vertices: &[Point], alphamax: f64) -> Vec<Node> {
    let m = vertices.len();
    let mut nodes: Vec<Node> = vertices
        .iter()
        .map(|v| Node {
            joint: Joint::Corner,
            c: [*v; 3],
            vertex: *v,
            alpha: 0.0,
        })
        .collect();

    for i in 0..m {
        let j = (i + 1) % m;
        let k = (i + 2) % m;
        let (vi, vj, vk) = (vertices[i], vertices[j], vertices[k]);
        let p4 = interval(0.5, vk, vj);

        let denom = ddenom(vi, vk);
        let mut alpha = if denom != 0.0 {
            let dd = (dpara(vi, vj, vk) / denom).abs();
            let a = if dd > 1.0 { 1.0 - 1.0 / dd } else { 0.0 };
            a / 0.75
        } else {
            4.0 / 3.0
        };

        let node = &mut nodes[j];
        if alpha >= alphamax {
            node.joint = Joint::Corner;
            node.c[1] = vj;
            node.c[2] = p4;
        } else {
            alpha = alpha.clamp(0.55, 1.0);
            node.joint = Joint::Curve;
            node.c[0] = interval(0.5 + 0.5 * alpha, vi, vj);
            node.c[1] = interval(0.5 + 0.5 * alpha, vk, vj);
            node.c[2] = p4;
        }
        node.alpha = alpha;
    }

    nodes
}

#[derive(Debug, Clone, Copy)]
struct Merge {
    pen: f64,
    c: [Point; 2],
    s: f64,
    alpha: f64,
}

/// Merge runs of Bézier joints into single curves where the result stays
/// within `opttolerance` of the original.
pub(crate) fn optimize(nodes: &[Node], opttolerance: f64) -> Vec<Node> {
    let m = nodes.len();
    if m < 2 {
        return nodes.to_vec();
    }

    let convc: Vec<i32> = (0..m)
        .map(|i| match nodes[i].joint {
            Joint::Curve => fsign(dpara(
                nodes[(i + m - 1) % m].vertex,
                nodes[i].vertex,
                nodes[(i + 1) % m].vertex,
            )),
            Joint::Corner => 0,
        })
        .collect();

    // Cumulative area for fast per-range area queries.
    let mut areac = vec![0.0f64; m + 1];
    let mut area = 0.0;
    let p0 = nodes[0].vertex;
    for i in 0..m {
        let i1 = (i + 1) % m;
        if nodes[i1].joint == Joint::Curve {
            let alpha = nodes[i1].alpha;
            area += 0.3 * alpha * (4.0 - alpha)
                * dpara(nodes[i].c[2], nodes[i1].vertex, nodes[i1].c[2])
                / 2.0;
            area += dpara(p0, nodes[i].c[2], nodes[i1].c[2]) / 2.0;
        }
        areac[i + 1] = area;
    }

    let mut pt = vec![0i64; m + 1];
    let mut pen = vec![0.0f64; m + 1];
    let mut len = vec![0usize; m + 1];
    let mut opt: Vec<Option<Merge>> = vec![None; m + 1];
    pt[0] = -1;

    for j in 1..=m {
        pt[j] = j as i64 - 1;
        pen[j] = pen[j - 1];
        len[j] = len[j - 1] + 1;

        for i in (0..j.saturating_sub(1)).rev() {
            let Some(o) = merge_penalty(nodes, i, j % m, opttolerance, &convc, &areac) else {
                break;
            };
            if len[j] > len[i] + 1 || (len[j] == len[i] + 1 && pen[j] > pen[i] + o.pen) {
                pt[j] = i as i64;
                pen[j] = pen[i] + o.pen;
                len[j] = len[i] + 1;
                opt[j] = Some(o);
            }
        }
    }

    let om = len[m];
    let mut out: Vec<Node> = Vec::with_capacity(om);
    let mut j = m;
    for _ in 0..om {
        let src = nodes[j % m];
        let merged = if pt[j] == j as i64 - 1 { None } else { opt[j] };
        match merged {
            None => out.push(src),
            Some(o) => out.push(Node {
                joint: Joint::Curve,
                c: [o.c[0], o.c[1], src.c[2]],
                vertex: interval(o.s, src.c[2], src.vertex),
                alpha: o.alpha,
            }),
        }
        j = pt[j] as usize;
    }
    out.reverse();
    out
}

fn merge_penalty(
    nodes: &[Node],
    i: usize,
    j: usize,
    opttolerance: f64,
    convc: &[i32],
    areac: &[f64],
) -> Option<Merge> {
    let m = nodes.len();
    if i == j {
        return None;
    }

    let vertex = |idx: usize| nodes[idx].vertex;
    let end = |idx: usize| nodes[idx].c[2];

    let i1 = (i + 1) % m;
    let mut k1 = i1;
    let conv = convc[k1];
    if conv == 0 {
        return None;
    }

    // Every joint in the run must bend the same way, by less than 179°.
    let d = ddist(vertex(i), vertex(i1));
    let mut k = k1;
    while k != j {
        k1 = (k + 1) % m;
        let k2 = (k + 2) % m;
        if convc[k1] != conv {
            return None;
        }
        if fsign(cprod(vertex(i), vertex(i1), vertex(k1), vertex(k2))) != conv {
            return None;
        }
        if iprod1(vertex(i), vertex(i1), vertex(k1), vertex(k2))
            < d * ddist(vertex(k1), vertex(k2)) * COS179
        {
            return None;
        }
        k = k1;
    }

    let p0 = end(i);
    let mut p1 = vertex(i1);
    let mut p2 = vertex(j);
    let p3 = end(j);

    let mut area = areac[j] - areac[i];
    area -= dpara(vertex(0), end(i), end(j)) / 2.0;
    if i >= j {
        area += areac[m];
    }

    let a1 = dpara(p0, p1, p2);
    let a2 = dpara(p0, p1, p3);
    let a3 = dpara(p0, p2, p3);
    let a4 = a1 + a3 - a2;

    if a2 == a1 {
        return None;
    }

    let t = a3 / (a3 - a4);
    let s = a2 / (a2 - a1);
    let a = a2 * t / 2.0;
    if a == 0.0 {
        return None;
    }

    let r = area / a;
    let alpha = 2.0 - (4.0 - r / 0.3).sqrt();
    if !alpha.is_finite() {
        return None;
    }

    let c = [interval(t * alpha, p0, p1), interval(s * alpha, p3, p2)];
    p1 = c[0];
    p2 = c[1];
    let mut pen = 0.0;

    // Tangency with the original polygon edges.
    let mut k = i1;
    while k != j {
        let k1 = (k + 1) % m;
        let tt = tangent(p0, p1, p2, p3, vertex(k), vertex(k1));
        if tt < -0.5 {
            return None;
        }
        let pt = bezier(tt, p0, p1, p2, p3);
        let d = ddist(vertex(k), vertex(k1));
        if d == 0.0 {
            return None;
        }
        let d1 = dpara(vertex(k), vertex(k1), pt) / d;
        if d1.abs() > opttolerance {
            return None;
        }
        if iprod(vertex(k), vertex(k1), pt) < 0.0 || iprod(vertex(k1), vertex(k), pt) < 0.0 {
            return None;
        }
        pen += d1 * d1;
        k = k1;
    }

    // Distance to the original joints' end points.
    let mut k = i;
    while k != j {
        let k1 = (k + 1) % m;
        let tt = tangent(p0, p1, p2, p3, end(k), end(k1));
        if tt < -0.5 {
            return None;
        }
        let pt = bezier(tt, p0, p1, p2, p3);
        let d = ddist(end(k), end(k1));
        if d == 0.0 {
            return None;
        }
        let mut d1 = dpara(end(k), end(k1), pt) / d;
        let mut d2 = dpara(end(k), end(k1), vertex(k1)) / d;
        d2 *= 0.75 * nodes[k1].alpha;
        if d2 < 0.0 {
            d1 = -d1;
            d2 = -d2;
        }
        if d1 < d2 - opttolerance {
            return None;
        }
        if d1 < d2 {
            pen += (d1 - d2) * (d1 - d2);
        }
        k = k1;
    }

    Some(Merge { pen, c, s, alpha })
}

/// Lay the nodes out as a closed contour of line and cubic segments.
pub(crate) fn to_contour(nodes: &[Node], is_hole: bool) -> Contour {
    let start = nodes[nodes.len() - 1].c[2];
    let mut segments = Vec::with_capacity(nodes.len() * 2);
    for node in nodes {
        match node.joint {
            Joint::Corner => {
                segments.push(Segment::Line(node.c[1]));
                segments.push(Segment::Line(node.c[2]));
            }
            Joint::Curve => segments.push(Segment::Cubic(node.c[0], node.c[1], node.c[2])),
        }
    }
    Contour {
        start,
        segments,
        is_hole,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(size, 0.0),
            Point::new(size, size),
            Point::new(0.0, size),
        ]
    }

    #[test]
    fn right_angles_become_corners() {
        let nodes = smooth(&square(10.0), 1.0);
        assert!(nodes.iter().all(|n| n.joint == Joint::Corner));
    }

    #[test]
    fn alphamax_above_four_thirds_smooths_everything() {
        let nodes = smooth(&square(10.0), 1.34);
        assert!(nodes.iter().all(|n| n.joint == Joint::Curve));
    }

    #[test]
    fn gentle_turns_are_curved() {
        let r = 20.0;
        let vertices: Vec<Point> = (0..16)
            .map(|i| {
                let a = i as f64 * std::f64::consts::PI / 8.0;
                Point::new(r * a.cos(), r * a.sin())
            })
            .collect();
        let nodes = smooth(&vertices, 1.0);
        assert!(nodes.iter().all(|n| n.joint == Joint::Curve));

        let merged = optimize(&nodes, 0.2);
        assert!(merged.len() <= nodes.len());
        assert!(!merged.is_empty());
    }

    #[test]
    fn corner_contour_alternates_lines() {
        let nodes = smooth(&square(4.0), 1.0);
        let contour = to_contour(&nodes, false);

        assert_eq!(contour.segments.len(), 8);
        let last = match contour.segments.last() {
            Some(Segment::Line(p)) => *p,
            other => panic!("unexpected segment {other:?}"),
        };
        assert_eq!(last, contour.start);
    }

    #[test]
    fn tangent_rejects_parallel_control_polygon() {
        let p = |x, y| Point::new(x, y);
        let t = tangent(p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0), p(3.0, 0.0), p(0.0, 0.0), p(1.0, 0.0));
        assert_eq!(t, -1.0);
    }
}
