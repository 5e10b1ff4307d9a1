//! Line-of-sight computation over the static map
//!
//! The engine is a pure function of the static terrain and a viewpoint:
//! dynamic overlays (other players, live gold glyphs) are layered on by the
//! coordinator at broadcast time, never here.
//!
//! Two regimes apply. Inside a corridor, sight collapses to the four axis
//! neighbors. In the open, a ray is traced from the viewpoint to every
//! obstruction in the wall index; each ray walks two parallel candidate
//! trajectories (a ceiling and a floor rounding of the fractional step) so
//! both halves of an ambiguous diagonal are represented on the coarse
//! integer grid. Revealed cells are additionally capped at a fixed
//! straight-line radius.

use crate::grid::Grid;
use shared::{is_blocking, BLANK, CORRIDOR, FLOOR, GOLD_PILE, SEPARATOR, VISIBILITY_RADIUS};

/// The four axis-neighbor cell values around a position, `None` where the
/// neighbor falls outside the buffer.
fn axis_neighbors(grid: &Grid, pos: usize) -> [Option<char>; 4] {
    let pitch = grid.pitch();
    [
        grid.get(pos + 1),
        pos.checked_sub(1).and_then(|p| grid.get(p)),
        grid.get(pos + pitch),
        pos.checked_sub(pitch).and_then(|p| grid.get(p)),
    ]
}

/// Classifies a viewpoint as inside a corridor.
///
/// Two or more corridor-marker axis neighbors always qualify. A single
/// marker qualifies only together with at least one blank axis neighbor,
/// which distinguishes a dead end from standing in a doorway of an open
/// room.
pub fn in_corridor(grid: &Grid, pos: usize) -> bool {
    let neighbors = axis_neighbors(grid, pos);
    let markers = neighbors
        .iter()
        .filter(|n| **n == Some(CORRIDOR))
        .count();
    if markers >= 2 {
        return true;
    }
    markers == 1 && neighbors.iter().any(|n| *n == Some(BLANK))
}

/// True when `to` lies within the sight radius of `from`, by straight-line
/// distance between cell coordinates.
fn within_radius(grid: &Grid, from: usize, to: i64) -> bool {
    let pitch = grid.pitch() as i64;
    let dc = (to % pitch - (from as i64) % pitch) as f64;
    let dr = (to / pitch - (from as i64) / pitch) as f64;
    dc * dc + dr * dr <= VISIBILITY_RADIUS * VISIBILITY_RADIUS
}

/// True when the cell at `pos` stops a line of sight: blank, boundary,
/// corridor marker, row separator, or out of range entirely.
fn blocked_at(grid: &Grid, pos: i64) -> bool {
    if pos < 0 {
        return true;
    }
    match grid.get(pos as usize) {
        Some(SEPARATOR) => true,
        Some(c) => is_blocking(c),
        None => true,
    }
}

/// Traces an unobstructed path from `from` to the obstruction at `wall`.
///
/// Returns the positions revealed along the way (radius-capped, viewpoint
/// included, the wall cell last), or `None` when both candidate
/// trajectories hit a blocking cell before reaching the wall. A single
/// blocked trajectory stops contributing cells but the other may still
/// carry the path through.
pub fn trace_path(grid: &Grid, from: usize, wall: usize) -> Option<Vec<usize>> {
    let pitch = grid.pitch() as i64;
    let fpitch = pitch as f64;

    let dc = (wall as i64 % pitch - from as i64 % pitch) as f64;
    let dr = (wall as i64 / pitch - from as i64 / pitch) as f64;
    let steps = (dc * dc + dr * dr).sqrt();
    if steps == 0.0 {
        return Some(vec![wall]);
    }

    // per-step movement; the row component is pre-scaled to index units
    let col_step = dc / steps;
    let row_step = (dr / steps) * fpitch;
    let shallow = dr.abs() < dc.abs();

    let start = from as f64;
    let wall_pos = wall as i64;
    let mut ceil_pos = from as i64;
    let mut floor_pos = from as i64;
    let mut cum_col = 0.0f64;
    let mut cum_row = 0.0f64;
    let mut ceil_blocked = false;
    let mut floor_blocked = false;
    let mut first = true;
    let mut revealed = Vec::new();

    // the fractional stepping always lands a trajectory on the wall within
    // a couple of extra iterations; the bound guards against cycling
    let max_iterations = steps.ceil() as usize * 2 + 4;

    for _ in 0..max_iterations {
        if ceil_pos == wall_pos || floor_pos == wall_pos {
            if within_radius(grid, from, wall_pos) {
                revealed.push(wall);
            }
            return Some(revealed);
        }

        if !first {
            if blocked_at(grid, ceil_pos) {
                if floor_blocked {
                    return None;
                }
                ceil_blocked = true;
            }
            if blocked_at(grid, floor_pos) {
                if ceil_blocked {
                    return None;
                }
                floor_blocked = true;
            }
        }

        if !ceil_blocked && within_radius(grid, from, ceil_pos) {
            revealed.push(ceil_pos as usize);
        }
        if !floor_blocked && within_radius(grid, from, floor_pos) {
            revealed.push(floor_pos as usize);
        }

        cum_col += col_step;
        cum_row += row_step;
        if shallow {
            // mostly-horizontal: round the column, split the row rounding
            let exact_ceil = start + cum_col + (cum_row / fpitch).ceil() * fpitch;
            let exact_floor = start + cum_col + (cum_row / fpitch).floor() * fpitch;
            ceil_pos = exact_ceil.round() as i64;
            floor_pos = exact_floor.round() as i64;
        } else {
            // mostly-vertical: round the row, split the column rounding
            let exact = start + cum_col + (cum_row / fpitch).round() * fpitch;
            ceil_pos = exact.ceil() as i64;
            floor_pos = exact.floor() as i64;
        }
        first = false;
    }

    None
}

/// Recomputes a player's currently-visible cells and folds newly revealed
/// static terrain into their accumulated map.
///
/// The visible map is fully blanked on every call; the visited map is never
/// blanked here and only ever grows, with gold glyphs normalized to plain
/// floor (memory records walkability, not loot).
pub fn refresh(grid: &Grid, walls: &[usize], pos: usize, visible: &mut Grid, visited: &mut Grid) {
    visible.blank();

    let mut reveal = |p: usize, visible: &mut Grid, visited: &mut Grid| {
        if let Some(c) = grid.get(p) {
            if c == SEPARATOR {
                return;
            }
            visible.set(p, c);
            visited.set(p, if c == GOLD_PILE { FLOOR } else { c });
        }
    };

    if in_corridor(grid, pos) {
        // sight collapses to the immediate axis neighbors, no deep
        // line-of-sight down the passage
        let pitch = grid.pitch();
        let neighbors = [
            pos.checked_add(1),
            pos.checked_sub(1),
            pos.checked_add(pitch),
            pos.checked_sub(pitch),
        ];
        for n in neighbors.into_iter().flatten() {
            reveal(n, visible, visited);
        }
        return;
    }

    for &wall in walls {
        if let Some(path) = trace_path(grid, pos, wall) {
            for p in path {
                reveal(p, visible, visited);
            }
        }
    }
}
