//! Gold pile placement and the deposit table
//!
//! Gold is placed once at startup: a randomized best-effort scatter that
//! guarantees the pile-count bounds and the exact total, but makes no
//! uniformity promise over all valid partitions. After startup the table
//! only ever moves piles from remaining to collected.

use crate::grid::Grid;
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use shared::{FLOOR, GOLD_MAX_PILES, GOLD_MIN_PILES, GOLD_PILE, GOLD_TOTAL};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised during startup gold placement.
#[derive(Debug, Error)]
pub enum GoldError {
    #[error("not enough floor cells for gold placement: {available} available, {required} required")]
    InsufficientFloor { available: usize, required: usize },
}

/// Process-wide gold parameters, constructed once at startup and passed
/// by reference to the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct GoldConfig {
    pub total: u32,
    pub min_piles: u32,
    pub max_piles: u32,
}

impl Default for GoldConfig {
    fn default() -> Self {
        Self {
            total: GOLD_TOTAL,
            min_piles: GOLD_MIN_PILES,
            max_piles: GOLD_MAX_PILES,
        }
    }
}

/// A single deposit. A collected pile stays in the table so "was picked
/// up" remains distinct from "never had gold".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pile {
    Remaining(u32),
    Collected,
}

/// Mapping from cell position to deposit state.
#[derive(Debug, Default)]
pub struct GoldTable {
    piles: HashMap<usize, Pile>,
}

impl GoldTable {
    /// Sum of all uncollected deposit amounts.
    pub fn remaining(&self) -> u32 {
        self.piles
            .values()
            .map(|pile| match pile {
                Pile::Remaining(amount) => *amount,
                Pile::Collected => 0,
            })
            .sum()
    }

    /// True once every pile has been collected.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Number of piles ever placed, collected or not.
    pub fn pile_count(&self) -> usize {
        self.piles.len()
    }

    /// Collects the pile at `pos`, returning its amount. Collecting an
    /// already-collected or never-placed position is a no-op.
    pub fn collect(&mut self, pos: usize) -> Option<u32> {
        let pile = self.piles.get_mut(&pos)?;
        match *pile {
            Pile::Remaining(amount) => {
                *pile = Pile::Collected;
                Some(amount)
            }
            Pile::Collected => None,
        }
    }

    /// Deposit state at a position, if one was ever placed there.
    pub fn pile_at(&self, pos: usize) -> Option<Pile> {
        self.piles.get(&pos).copied()
    }

    /// Positions of all piles ever placed.
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.piles.keys().copied()
    }
}

/// Places between `min_piles` and `max_piles` piles summing to exactly
/// `total` gold, each on a distinct floor cell chosen by rejection
/// sampling. Accepted cells are marked with the gold glyph on the grid.
///
/// Fails when the map has fewer floor cells than `max_piles`.
pub fn distribute(
    grid: &mut Grid,
    config: &GoldConfig,
    rng: &mut StdRng,
) -> Result<GoldTable, GoldError> {
    let floor_cells = grid.positions_matching(|c| c == FLOOR).len();
    if floor_cells < config.max_piles as usize {
        return Err(GoldError::InsufficientFloor {
            available: floor_cells,
            required: config.max_piles as usize,
        });
    }

    let low = (config.total / config.max_piles).max(1);
    let high = (config.total / config.min_piles).max(low);

    let mut table = GoldTable::default();
    let mut placed = 0u32;
    let mut last_pos = None;

    while placed < config.total && table.pile_count() < config.max_piles as usize {
        let pos = rng.gen_range(0..grid.len());
        if grid.get(pos) != Some(FLOOR) {
            continue;
        }

        // never overshoot the total; the final pile absorbs the remainder
        let amount = rng.gen_range(low..=high).min(config.total - placed);

        table.piles.insert(pos, Pile::Remaining(amount));
        grid.set(pos, GOLD_PILE);
        placed += amount;
        last_pos = Some(pos);
    }

    // pile-count bound reached before the total: top up the last pile
    if placed < config.total {
        if let Some(pos) = last_pos {
            if let Some(Pile::Remaining(amount)) = table.piles.get_mut(&pos) {
                *amount += config.total - placed;
            }
        }
    }

    debug!(
        "placed {} gold across {} piles",
        config.total,
        table.pile_count()
    );
    Ok(table)
}
