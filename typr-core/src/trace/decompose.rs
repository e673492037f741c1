//! Boundary decomposition: walk pixel-corner paths around every ink region.

use crate::extract::Bitmap;
use crate::request::TurnPolicy;

use super::{Deadline, TraceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IPoint {
    pub x: i64,
    pub y: i64,
}

/// A closed boundary on the pixel-corner lattice.
#[derive(Debug, Clone)]
pub(crate) struct RawPath {
    pub pt: Vec<IPoint>,
    pub area: i64,
    /// `true` for ink regions, `false` for holes.
    pub positive: bool,
}

/// Find every boundary in `bm`, dropping those enclosing `turdsize` pixels or fewer.
///
/// Each traced region is inverted in a scratch copy so the scan moves on to
/// the next boundary; holes therefore show up as their own paths.
pub(crate) fn decompose(
    bm: &Bitmap,
    turdsize: u32,
    policy: TurnPolicy,
    deadline: &Deadline,
) -> Result<Vec<RawPath>, TraceError> {
    let mut work = bm.clone();
    let mut paths = Vec::new();
    let mut cursor = (0i64, bm.height() as i64 - 1);

    while let Some((x, y)) = find_next(&work, cursor) {
        deadline.check()?;

        let positive = bm.get(x, y);
        let path = find_path(&work, x, y + 1, positive, policy);
        xor_path(&mut work, &path.pt);

        if path.area > turdsize as i64 {
            paths.push(path);
        }
        cursor = (x, y);
    }

    Ok(paths)
}

/// Next ink pixel scanning rows top to bottom, left to right, from `start`.
fn find_next(bm: &Bitmap, start: (i64, i64)) -> Option<(i64, i64)> {
    let (mut x0, y0) = start;
    for y in (0..=y0).rev() {
        for x in x0..bm.width() as i64 {
            if bm.get(x, y) {
                return Some((x, y));
            }
        }
        x0 = 0;
    }
    None
}

fn find_path(bm: &Bitmap, x0: i64, y0: i64, positive: bool, policy: TurnPolicy) -> RawPath {
    let (mut x, mut y) = (x0, y0);
    let (mut dirx, mut diry) = (0i64, -1i64);
    let mut pt = Vec::new();
    let mut area = 0i64;

    loop {
        pt.push(IPoint { x, y });

        x += dirx;
        y += diry;
        area += x * diry;

        if x == x0 && y == y0 {
            break;
        }

        // Pixels ahead-left (c) and ahead-right (d) of the current edge.
        let c = bm.get(x + (dirx + diry - 1) / 2, y + (diry - dirx - 1) / 2);
        let d = bm.get(x + (dirx - diry - 1) / 2, y + (diry + dirx - 1) / 2);

        if c && !d {
            if turn_right(bm, x, y, positive, policy) {
                (dirx, diry) = (diry, -dirx);
            } else {
                (dirx, diry) = (-diry, dirx);
            }
        } else if c {
            (dirx, diry) = (diry, -dirx);
        } else if !d {
            (dirx, diry) = (-diry, dirx);
        }
    }

    RawPath { pt, area, positive }
}

fn turn_right(bm: &Bitmap, x: i64, y: i64, positive: bool, policy: TurnPolicy) -> bool {
    match policy {
        TurnPolicy::Right => true,
        TurnPolicy::Left => false,
        TurnPolicy::Black => positive,
        TurnPolicy::White => !positive,
        TurnPolicy::Random => detrand(x, y),
        TurnPolicy::Majority => majority(bm, x, y),
        TurnPolicy::Minority => !majority(bm, x, y),
    }
}

/// Whether ink dominates the growing square neighbourhoods around corner `(x, y)`.
fn majority(bm: &Bitmap, x: i64, y: i64) -> bool {
    for i in 2..5i64 {
        let mut ct = 0i64;
        for a in (-i + 1)..=(i - 1) {
            ct += vote(bm.get(x + a, y + i - 1));
            ct += vote(bm.get(x + i - 1, y + a - 1));
            ct += vote(bm.get(x + a - 1, y - i));
            ct += vote(bm.get(x - i, y + a));
        }
        if ct > 0 {
            return true;
        } else if ct < 0 {
            return false;
        }
    }
    false
}

fn vote(ink: bool) -> i64 {
    if ink {
        1
    } else {
        -1
    }
}

/// Coordinate hash standing in for randomness so output stays reproducible.
fn detrand(x: i64, y: i64) -> bool {
    let z = (0x04b3_e375u32.wrapping_mul(x as u32) ^ y as u32).wrapping_mul(0x05a8_ef93);
    z.count_ones() & 1 == 1
}

/// Invert the region enclosed by `pt` row by row.
fn xor_path(bm: &mut Bitmap, pt: &[IPoint]) {
    let Some(last) = pt.last() else {
        return;
    };
    let mut y1 = last.y;
    let xa = pt[0].x;

    for p in pt {
        if p.y != y1 {
            let row = p.y.min(y1) as usize;
            let (lo, hi) = if p.x < xa { (p.x, xa) } else { (xa, p.x) };
            for col in lo..hi {
                bm.flip(col as usize, row);
            }
            y1 = p.y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(bm: &Bitmap, turdsize: u32, policy: TurnPolicy) -> Vec<RawPath> {
        decompose(bm, turdsize, policy, &Deadline::unbounded()).expect("decompose")
    }

    #[test]
    fn single_pixel_traces_unit_square() {
        let bm = Bitmap::from_rows(&["#"]);
        let paths = run(&bm, 0, TurnPolicy::Minority);

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].area, 1);
        assert!(paths[0].positive);
        assert_eq!(
            paths[0].pt,
            vec![
                IPoint { x: 0, y: 1 },
                IPoint { x: 0, y: 0 },
                IPoint { x: 1, y: 0 },
                IPoint { x: 1, y: 1 }
            ]
        );
    }

    #[test]
    fn turdsize_drops_speckles() {
        let bm = Bitmap::from_rows(&["#....", ".....", "..###", "..###"]);
        let paths = run(&bm, 2, TurnPolicy::Minority);

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].area, 6);
    }

    #[test]
    fn ring_yields_outer_path_and_hole() {
        let bm = Bitmap::from_rows(&["#####", "#...#", "#...#", "#####"]);
        let paths = run(&bm, 0, TurnPolicy::Minority);

        assert_eq!(paths.len(), 2);
        assert!(paths[0].positive);
        assert_eq!(paths[0].area, 20);
        assert!(!paths[1].positive);
        assert_eq!(paths[1].area, 6);
    }

    #[test]
    fn checkerboard_policy_decides_connectivity() {
        let bm = Bitmap::from_rows(&["#.", ".#"]);

        // Turning toward ink joins the diagonal pixels into one path.
        let joined = run(&bm, 0, TurnPolicy::Black);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].area, 2);

        let split = run(&bm, 0, TurnPolicy::White);
        assert_eq!(split.len(), 2);
    }

    #[test]
    fn random_policy_is_deterministic() {
        let bm = Bitmap::from_rows(&["#.#.", ".#.#", "#.#.", ".#.#"]);
        let first: Vec<i64> = run(&bm, 0, TurnPolicy::Random).iter().map(|p| p.area).collect();
        let second: Vec<i64> = run(&bm, 0, TurnPolicy::Random).iter().map(|p| p.area).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn full_bitmap_closes_along_the_border() {
        let bm = Bitmap::from_rows(&["###", "###"]);
        let paths = run(&bm, 0, TurnPolicy::Minority);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].area, 6);
        assert_eq!(paths[0].pt.len(), 10);
    }
}
