use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Half-width of the view box served by `GET /api/base-points?x=&y=`.
/// A radius of 20 gives a 41×41 window centred on the origin.
pub const VIEW_RADIUS: i64 = 20;

/// Slope that every line-cleanup sweep includes.
pub const BASE_SLOPE: i64 = 1;

/// Extra slopes a sweep may draw, on top of `BASE_SLOPE`.
const SLOPE_CANDIDATES: [i64; 6] = [-3, -2, -1, 0, 2, 3];

/// How many extra slopes a random sweep draws.
const EXTRA_SLOPES: usize = 2;

/// A cell on the integer grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i64,
    pub y: i64,
}

impl GridPoint {
    pub const ORIGIN: GridPoint = GridPoint { x: 0, y: 0 };

    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// True when `point` falls inside the 41×41 box around `origin`.
pub fn within_view(origin: GridPoint, point: GridPoint) -> bool {
    let dx = (point.x as i128 - origin.x as i128).abs();
    let dy = (point.y as i128 - origin.y as i128).abs();
    dx <= VIEW_RADIUS as i128 && dy <= VIEW_RADIUS as i128
}

/// True when `point` satisfies `y - y0 = m * (x - x0)` for `anchor = (x0, y0)`.
///
/// Widened to i128 so coordinates near the i64 bounds cannot overflow.
pub fn on_line(point: GridPoint, anchor: GridPoint, slope: i64) -> bool {
    let dy = point.y as i128 - anchor.y as i128;
    let dx = point.x as i128 - anchor.x as i128;
    dy == slope as i128 * dx
}

/// True when `point` lies on any of the lines through `anchor`.
pub fn on_any_line(point: GridPoint, anchor: GridPoint, slopes: &[i64]) -> bool {
    slopes.iter().any(|&m| on_line(point, anchor, m))
}

/// Picks the slopes for one cleanup sweep: always `BASE_SLOPE`, plus
/// `EXTRA_SLOPES` distinct values from the candidate set.
pub fn pick_slopes<R: Rng + ?Sized>(rng: &mut R) -> Vec<i64> {
    let mut candidates = SLOPE_CANDIDATES;
    candidates.shuffle(rng);

    let mut slopes = Vec::with_capacity(EXTRA_SLOPES + 1);
    slopes.push(BASE_SLOPE);
    slopes.extend_from_slice(&candidates[..EXTRA_SLOPES]);
    slopes
}

/// Normalises a caller-provided slope list: drops duplicates while keeping
/// first-seen order. An empty list stays empty.
pub fn dedup_slopes(slopes: &[i64]) -> Vec<i64> {
    let mut out = Vec::with_capacity(slopes.len());
    for &m in slopes {
        if !out.contains(&m) {
            out.push(m);
        }
    }
    out
}
