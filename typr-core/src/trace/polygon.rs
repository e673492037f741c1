//! Optimal polygon fitting over a pixel-corner path.
//!
//! Straight subpaths are found first (`longest_straight`), then the polygon
//! with the fewest segments and lowest penalty is chosen by dynamic
//! programming, and finally each vertex is moved to the least-squares
//! intersection of its neighbouring segment lines.

use super::decompose::{IPoint, RawPath};
use super::{Deadline, Point, TraceError};

#[derive(Debug, Clone, Copy, Default)]
struct Sums {
    x: f64,
    y: f64,
    x2: f64,
    xy: f64,
    y2: f64,
}

/// Prefix sums of path coordinates relative to the first point.
struct PathSums {
    origin: IPoint,
    sums: Vec<Sums>,
}

impl PathSums {
    fn new(pt: &[IPoint]) -> Self {
        let origin = pt[0];
        let mut sums = Vec::with_capacity(pt.len() + 1);
        let mut acc = Sums::default();
        sums.push(acc);
        for p in pt {
            let x = (p.x - origin.x) as f64;
            let y = (p.y - origin.y) as f64;
            acc.x += x;
            acc.y += y;
            acc.x2 += x * x;
            acc.xy += x * y;
            acc.y2 += y * y;
            sums.push(acc);
        }
        Self { origin, sums }
    }
}

/// Stand-in for "no bound" that still leaves room for index arithmetic.
const UNBOUNDED: i64 = 10_000_000;

fn modn(a: i64, n: i64) -> i64 {
    a.rem_euclid(n)
}

fn floordiv(a: i64, n: i64) -> i64 {
    a.div_euclid(n)
}

fn sign(v: i64) -> i64 {
    v.signum()
}

fn xprod(a: IPoint, b: IPoint) -> i64 {
    a.x * b.y - a.y * b.x
}

/// `a <= b < c` in cyclic order.
fn cyclic(a: i64, b: i64, c: i64) -> bool {
    if a <= c {
        a <= b && b < c
    } else {
        a <= b || b < c
    }
}

/// Fit the polygon for one path; vertices are absolute pixel coordinates.
pub(crate) fn fit_polygon(path: &RawPath, deadline: &Deadline) -> Result<Vec<Point>, TraceError> {
    let sums = PathSums::new(&path.pt);
    let lon = longest_straight(&path.pt);
    let po = best_polygon(&path.pt, &sums, &lon, deadline)?;
    Ok(adjust_vertices(&path.pt, &sums, &po))
}

/// For each point, the furthest index reachable by a straight subpath.
fn longest_straight(pt: &[IPoint]) -> Vec<i64> {
    let n = pt.len() as i64;
    let at = |i: i64| pt[i as usize];

    // Next corner: first index where both coordinates change.
    let mut nc = vec![0i64; n as usize];
    let mut k = 0i64;
    for i in (0..n).rev() {
        if at(i).x != at(k).x && at(i).y != at(k).y {
            k = i + 1;
        }
        nc[i as usize] = k;
    }

    let mut pivk = vec![0i64; n as usize];
    for i in (0..n).rev() {
        let mut ct = [0u32; 4];
        let next = at(modn(i + 1, n));
        let dir = (3 + 3 * (next.x - at(i).x) + (next.y - at(i).y)) / 2;
        ct[dir as usize] += 1;

        let mut constraint = [IPoint { x: 0, y: 0 }; 2];
        let mut k = nc[i as usize];
        let mut k1 = i;
        let mut found = false;

        loop {
            let dir = (3 + 3 * sign(at(k).x - at(k1).x) + sign(at(k).y - at(k1).y)) / 2;
            ct[dir as usize] += 1;

            if ct.iter().all(|c| *c > 0) {
                pivk[i as usize] = k1;
                found = true;
                break;
            }

            let cur = IPoint {
                x: at(k).x - at(i).x,
                y: at(k).y - at(i).y,
            };
            if xprod(constraint[0], cur) < 0 || xprod(constraint[1], cur) > 0 {
                break;
            }

            if cur.x.abs() > 1 || cur.y.abs() > 1 {
                let off = IPoint {
                    x: cur.x + if cur.y >= 0 && (cur.y > 0 || cur.x < 0) { 1 } else { -1 },
                    y: cur.y + if cur.x <= 0 && (cur.x < 0 || cur.y < 0) { 1 } else { -1 },
                };
                if xprod(constraint[0], off) >= 0 {
                    constraint[0] = off;
                }
                let off = IPoint {
                    x: cur.x + if cur.y <= 0 && (cur.y < 0 || cur.x < 0) { 1 } else { -1 },
                    y: cur.y + if cur.x >= 0 && (cur.x > 0 || cur.y < 0) { 1 } else { -1 },
                };
                if xprod(constraint[1], off) <= 0 {
                    constraint[1] = off;
                }
            }

            k1 = k;
            k = nc[k1 as usize];
            if !cyclic(k, i, k1) {
                break;
            }
        }

        if found {
            continue;
        }

        // The constraint was violated between k1 and k: find the last
        // admissible point on that edge.
        let dk = IPoint {
            x: sign(at(k).x - at(k1).x),
            y: sign(at(k).y - at(k1).y),
        };
        let cur = IPoint {
            x: at(k1).x - at(i).x,
            y: at(k1).y - at(i).y,
        };
        let a = xprod(constraint[0], cur);
        let b = xprod(constraint[0], dk);
        let c = xprod(constraint[1], cur);
        let d = xprod(constraint[1], dk);

        let mut j = UNBOUNDED;
        if b < 0 {
            j = floordiv(a, -b);
        }
        if d > 0 {
            j = j.min(floordiv(-c, d));
        }
        pivk[i as usize] = modn(k1 + j, n);
    }

    let mut lon = vec![0i64; n as usize];
    let mut j = pivk[(n - 1) as usize];
    lon[(n - 1) as usize] = j;
    for i in (0..n - 1).rev() {
        if cyclic(i + 1, pivk[i as usize], j) {
            j = pivk[i as usize];
        }
        lon[i as usize] = j;
    }

    let mut i = n - 1;
    while i >= 0 && cyclic(modn(i + 1, n), j, lon[i as usize]) {
        lon[i as usize] = j;
        i -= 1;
    }

    lon
}

/// Deviation penalty for the straight segment from point `i` to point `j`.
fn penalty3(pt: &[IPoint], sums: &PathSums, i: i64, j: i64) -> f64 {
    let n = pt.len() as i64;
    let s = &sums.sums;

    let (j, wrapped) = if j >= n { (j - n, true) } else { (j, false) };
    let (iu, ju) = (i as usize, j as usize);

    let (x, y, x2, xy, y2, k) = if wrapped {
        let total = s[n as usize];
        (
            s[ju + 1].x - s[iu].x + total.x,
            s[ju + 1].y - s[iu].y + total.y,
            s[ju + 1].x2 - s[iu].x2 + total.x2,
            s[ju + 1].xy - s[iu].xy + total.xy,
            s[ju + 1].y2 - s[iu].y2 + total.y2,
            (j + 1 - i + n) as f64,
        )
    } else {
        (
            s[ju + 1].x - s[iu].x,
            s[ju + 1].y - s[iu].y,
            s[ju + 1].x2 - s[iu].x2,
            s[ju + 1].xy - s[iu].xy,
            s[ju + 1].y2 - s[iu].y2,
            (j + 1 - i) as f64,
        )
    };

    let (pi, pj) = (pt[iu], pt[ju]);
    let px = (pi.x + pj.x) as f64 / 2.0 - sums.origin.x as f64;
    let py = (pi.y + pj.y) as f64 / 2.0 - sums.origin.y as f64;
    let ey = (pj.x - pi.x) as f64;
    let ex = -((pj.y - pi.y) as f64);

    let a = (x2 - 2.0 * x * px) / k + px * px;
    let b = (xy - x * py - y * px) / k + px * py;
    let c = (y2 - 2.0 * y * py) / k + py * py;

    let s = ex * ex * a + 2.0 * ex * ey * b + ey * ey * c;
    s.max(0.0).sqrt()
}

/// Indices of the optimal polygon's vertices.
fn best_polygon(
    pt: &[IPoint],
    sums: &PathSums,
    lon: &[i64],
    deadline: &Deadline,
) -> Result<Vec<usize>, TraceError> {
    let n = pt.len() as i64;
    let nu = pt.len();

    let mut clip0 = vec![0i64; nu];
    for i in 0..n {
        let mut c = modn(lon[modn(i - 1, n) as usize] - 1, n);
        if c == i {
            c = modn(i + 1, n);
        }
        clip0[i as usize] = if c < i { n } else { c };
    }

    let mut clip1 = vec![0i64; nu + 1];
    let mut j = 1i64;
    for i in 0..n {
        while j <= clip0[i as usize] {
            clip1[j as usize] = i;
            j += 1;
        }
    }

    let mut seg0 = vec![0i64; nu + 1];
    let mut i = 0i64;
    let mut j = 0usize;
    while i < n {
        seg0[j] = i;
        i = clip0[i as usize];
        j += 1;
    }
    seg0[j] = n;
    let m = j;

    let mut seg1 = vec![0i64; nu + 1];
    let mut i = n;
    for j in (1..=m).rev() {
        seg1[j] = i;
        i = clip1[i as usize];
    }
    seg1[0] = 0;

    let mut pen = vec![0f64; nu + 1];
    let mut prev = vec![0i64; nu + 1];
    for j in 1..=m {
        deadline.check()?;
        for i in seg1[j]..=seg0[j] {
            let mut best = -1.0f64;
            let mut k = seg0[j - 1];
            while k >= clip1[i as usize] {
                let this = penalty3(pt, sums, k, i) + pen[k as usize];
                if best < 0.0 || this < best {
                    prev[i as usize] = k;
                    best = this;
                }
                k -= 1;
            }
            pen[i as usize] = best;
        }
    }

    let mut po = vec![0usize; m];
    let mut i = n;
    for j in (0..m).rev() {
        i = prev[i as usize];
        po[j] = i as usize;
    }
    Ok(po)
}

/// Centroid and principal direction of the points from `i` to `j`.
fn point_slope(pt: &[IPoint], sums: &PathSums, i: i64, j: i64) -> (Point, Point) {
    let n = pt.len() as i64;
    let s = &sums.sums;
    let (mut i, mut j, mut r) = (i, j, 0i64);

    while j >= n {
        j -= n;
        r += 1;
    }
    while i >= n {
        i -= n;
        r -= 1;
    }
    while j < 0 {
        j += n;
        r -= 1;
    }
    while i < 0 {
        i += n;
        r += 1;
    }

    let (iu, ju) = (i as usize, j as usize);
    let total = s[n as usize];
    let rf = r as f64;
    let x = s[ju + 1].x - s[iu].x + rf * total.x;
    let y = s[ju + 1].y - s[iu].y + rf * total.y;
    let x2 = s[ju + 1].x2 - s[iu].x2 + rf * total.x2;
    let xy = s[ju + 1].xy - s[iu].xy + rf * total.xy;
    let y2 = s[ju + 1].y2 - s[iu].y2 + rf * total.y2;
    let k = (j + 1 - i + r * n) as f64;

    let ctr = Point::new(x / k, y / k);

    let mut a = (x2 - x * x / k) / k;
    let b = (xy - x * y / k) / k;
    let mut c = (y2 - y * y / k) / k;

    let lambda2 = (a + c + ((a - c) * (a - c) + 4.0 * b * b).sqrt()) / 2.0;
    a -= lambda2;
    c -= lambda2;

    let dir = if a.abs() >= c.abs() {
        let l = (a * a + b * b).sqrt();
        if l != 0.0 {
            Point::new(-b / l, a / l)
        } else {
            Point::new(0.0, 0.0)
        }
    } else {
        let l = (c * c + b * b).sqrt();
        if l != 0.0 {
            Point::new(-c / l, b / l)
        } else {
            Point::new(0.0, 0.0)
        }
    };

    (ctr, dir)
}

type Quad = [[f64; 3]; 3];

fn quadform(q: &Quad, w: Point) -> f64 {
    let v = [w.x, w.y, 1.0];
    let mut sum = 0.0;
    for i in 0..3 {
        for j in 0..3 {
            sum += v[i] * q[i][j] * v[j];
        }
    }
    sum
}

fn adjust_vertices(pt: &[IPoint], sums: &PathSums, po: &[usize]) -> Vec<Point> {
    let n = pt.len() as i64;
    let m = po.len();
    let x0 = pt[0].x as f64;
    let y0 = pt[0].y as f64;

    let mut ctr = Vec::with_capacity(m);
    let mut dir = Vec::with_capacity(m);
    for i in 0..m {
        let j = po[(i + 1) % m] as i64;
        let j = modn(j - po[i] as i64, n) + po[i] as i64;
        let (c, d) = point_slope(pt, sums, po[i] as i64, j);
        ctr.push(c);
        dir.push(d);
    }

    // Quadratic form measuring squared distance to each segment's line.
    let mut q: Vec<Quad> = Vec::with_capacity(m);
    for i in 0..m {
        let d = dir[i].x * dir[i].x + dir[i].y * dir[i].y;
        let mut form = [[0.0; 3]; 3];
        if d != 0.0 {
            let v = [
                dir[i].y,
                -dir[i].x,
                dir[i].x * ctr[i].y - dir[i].y * ctr[i].x,
            ];
            for (l, row) in form.iter_mut().enumerate() {
                for (k, cell) in row.iter_mut().enumerate() {
                    *cell = v[l] * v[k] / d;
                }
            }
        }
        q.push(form);
    }

    let mut vertices = Vec::with_capacity(m);
    for i in 0..m {
        let s = Point::new(pt[po[i]].x as f64 - x0, pt[po[i]].y as f64 - y0);
        let j = (i + m - 1) % m;

        let mut form = [[0.0; 3]; 3];
        for l in 0..3 {
            for k in 0..3 {
                form[l][k] = q[j][l][k] + q[i][l][k];
            }
        }

        let w = loop {
            let det = form[0][0] * form[1][1] - form[0][1] * form[1][0];
            if det != 0.0 {
                break Point::new(
                    (-form[0][2] * form[1][1] + form[1][2] * form[0][1]) / det,
                    (form[0][2] * form[1][0] - form[1][2] * form[0][0]) / det,
                );
            }

            // Parallel lines: add a constraint through the original vertex.
            let (v0, v1) = if form[0][0] > form[1][1] {
                (-form[0][1], form[0][0])
            } else if form[1][1] != 0.0 {
                (-form[1][1], form[1][0])
            } else {
                (1.0, 0.0)
            };
            let d = v0 * v0 + v1 * v1;
            let v = [v0, v1, -v1 * s.y - v0 * s.x];
            for l in 0..3 {
                for k in 0..3 {
                    form[l][k] += v[l] * v[k] / d;
                }
            }
        };

        if (w.x - s.x).abs() <= 0.5 && (w.y - s.y).abs() <= 0.5 {
            vertices.push(Point::new(w.x + x0, w.y + y0));
            continue;
        }

        // Intersection falls outside the unit square around the vertex:
        // minimise over the square's boundary instead.
        let mut min = quadform(&form, s);
        let mut best = s;

        if form[0][0] != 0.0 {
            for z in 0..2 {
                let wy = s.y - 0.5 + z as f64;
                let wx = -(form[0][1] * wy + form[0][2]) / form[0][0];
                let cand = quadform(&form, Point::new(wx, wy));
                if (wx - s.x).abs() <= 0.5 && cand < min {
                    min = cand;
                    best = Point::new(wx, wy);
                }
            }
        }

        if form[1][1] != 0.0 {
            for z in 0..2 {
                let wx = s.x - 0.5 + z as f64;
                let wy = -(form[1][0] * wx + form[1][2]) / form[1][1];
                let cand = quadform(&form, Point::new(wx, wy));
                if (wy - s.y).abs() <= 0.5 && cand < min {
                    min = cand;
                    best = Point::new(wx, wy);
                }
            }
        }

        for l in 0..2 {
            for k in 0..2 {
                let corner = Point::new(s.x - 0.5 + l as f64, s.y - 0.5 + k as f64);
                let cand = quadform(&form, corner);
                if cand < min {
                    min = cand;
                    best = corner;
                }
            }
        }

        vertices.push(Point::new(best.x + x0, best.y + y0));
    }

    vertices
}
