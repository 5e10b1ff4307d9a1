//! Flat character-buffer map with bounds-checked cell access
//!
//! A grid stores the rectangular map as one flat byte buffer in which every
//! row, including the last, is terminated by a `\n` separator. Linear
//! positions address the buffer directly, so horizontal neighbors are
//! `pos +/- 1` and vertical neighbors are `pos +/- pitch` where
//! `pitch = width + 1`. That invariant drives all movement and visibility
//! arithmetic in the rest of the server.

use shared::{is_obstruction, BLANK, SEPARATOR};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while constructing a grid from map text.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("first line of map is empty")]
    EmptyFirstRow,
    #[error("map line {line} differs in width from the first line")]
    UnevenRows { line: usize },
    #[error("map contains non-ASCII characters")]
    NotAscii,
    #[error("failed to read map file: {0}")]
    Io(#[from] std::io::Error),
}

/// Rectangular map held as a flat, separator-terminated byte buffer.
#[derive(Debug, Clone)]
pub struct Grid {
    cells: Vec<u8>,
    width: usize,
    height: usize,
}

impl Grid {
    /// Builds a grid from map text, validating rectangularity.
    ///
    /// Every row must hold exactly as many characters as the first row;
    /// a missing trailing separator on the last row is tolerated and
    /// normalized away.
    pub fn from_text(text: &str) -> Result<Grid, GridError> {
        if !text.is_ascii() {
            return Err(GridError::NotAscii);
        }

        let mut normalized = text.to_string();
        if !normalized.ends_with(SEPARATOR) {
            normalized.push(SEPARATOR);
        }

        let mut width = 0;
        let mut height = 0;
        for (i, line) in normalized.split_terminator(SEPARATOR).enumerate() {
            if i == 0 {
                width = line.len();
                if width == 0 {
                    return Err(GridError::EmptyFirstRow);
                }
            } else if line.len() != width {
                return Err(GridError::UnevenRows { line: i + 1 });
            }
            height += 1;
        }
        if height == 0 {
            return Err(GridError::EmptyFirstRow);
        }

        Ok(Grid {
            cells: normalized.into_bytes(),
            width,
            height,
        })
    }

    /// Reads a map file and delegates to [`Grid::from_text`].
    pub fn from_file(path: &Path) -> Result<Grid, GridError> {
        let text = fs::read_to_string(path)?;
        Grid::from_text(&text)
    }

    /// Characters per row, excluding the separator.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of separator-terminated rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Full buffer length, separators included.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Linear-index stride between vertically adjacent cells.
    pub fn pitch(&self) -> usize {
        self.width + 1
    }

    /// Column of a linear position within its row.
    pub fn col(&self, pos: usize) -> usize {
        pos % self.pitch()
    }

    /// Row of a linear position.
    pub fn row(&self, pos: usize) -> usize {
        pos / self.pitch()
    }

    /// Bounds-checked cell read. Out-of-range positions yield `None`;
    /// separator positions read back as `\n`.
    pub fn get(&self, pos: usize) -> Option<char> {
        self.cells.get(pos).map(|&b| b as char)
    }

    /// Bounds-checked single-cell write. Refuses out-of-range positions
    /// and separator positions, returning false.
    pub fn set(&mut self, pos: usize, c: char) -> bool {
        match self.cells.get_mut(pos) {
            Some(cell) if *cell != SEPARATOR as u8 => {
                *cell = c as u8;
                true
            }
            _ => false,
        }
    }

    /// Produces a same-shaped grid with every non-separator cell blanked,
    /// used to seed per-player visible/visited maps.
    pub fn blank_clone(&self) -> Grid {
        let mut clone = self.clone();
        clone.blank();
        clone
    }

    /// Resets every non-separator cell to the blank fill character.
    pub fn blank(&mut self) {
        for cell in &mut self.cells {
            if *cell != SEPARATOR as u8 {
                *cell = BLANK as u8;
            }
        }
    }

    /// Positions of all cells matching the predicate, in buffer order.
    /// Separators are never offered to the predicate.
    pub fn positions_matching<F>(&self, pred: F) -> Vec<usize>
    where
        F: Fn(char) -> bool,
    {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &b)| b != SEPARATOR as u8 && pred(b as char))
            .map(|(i, _)| i)
            .collect()
    }

    /// Positions of every boundary and corridor-marker cell. Computed once
    /// at startup; the result is treated as immutable for the life of the
    /// game.
    pub fn wall_index(&self) -> Vec<usize> {
        self.positions_matching(is_obstruction)
    }

    /// Read-only view of the raw buffer, used when assembling DISPLAY
    /// messages.
    pub fn as_str(&self) -> &str {
        // The constructor and `set` only ever admit ASCII bytes.
        std::str::from_utf8(&self.cells).unwrap_or("")
    }
}
