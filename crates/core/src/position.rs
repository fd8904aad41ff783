//! Grid coordinates and the printable-area extent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SheetError;

/// A cell coordinate on the grid, 0-based.
///
/// `Position` is plain data: any `(row, col)` pair can be constructed,
/// including out-of-range ones. `is_valid` gates every sheet entry point,
/// and `NONE` is the sentinel that malformed reference text collapses to.
///
/// Ordering is row-major, so sorted positions iterate the grid the same way
/// the printable area is scanned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    /// Grid bounds. Positions at or past these are invalid.
    pub const MAX_ROWS: i32 = 16_384;
    pub const MAX_COLS: i32 = 16_384;

    /// The invalid sentinel.
    pub const NONE: Position = Position { row: -1, col: -1 };

    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// True iff both coordinates are inside the grid bounds.
    pub fn is_valid(&self) -> bool {
        (0..Self::MAX_ROWS).contains(&self.row) && (0..Self::MAX_COLS).contains(&self.col)
    }

    /// Parse an A1-style reference (`"B7"` is row 6, column 1).
    ///
    /// Returns `None` for malformed text and for coordinates outside the
    /// grid bounds. Column letters must be uppercase.
    pub fn from_a1(text: &str) -> Option<Position> {
        let letters_len = text.chars().take_while(|c| c.is_ascii_uppercase()).count();
        if letters_len == 0 || letters_len == text.len() {
            return None;
        }
        let (letters, digits) = text.split_at(letters_len);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut col: i64 = 0;
        for c in letters.chars() {
            col = col * 26 + (c as i64 - 'A' as i64 + 1);
            if col > Self::MAX_COLS as i64 {
                return None;
            }
        }
        let row: i64 = digits.parse().ok()?;
        if row == 0 || row > Self::MAX_ROWS as i64 {
            return None;
        }

        Some(Position::new(row as i32 - 1, col as i32 - 1))
    }

    /// Render as A1-style text. Invalid positions render empty.
    pub fn to_a1(&self) -> String {
        if !self.is_valid() {
            return String::new();
        }
        let mut letters = String::new();
        let mut n = self.col;
        loop {
            letters.insert(0, (b'A' + (n % 26) as u8) as char);
            if n < 26 {
                break;
            }
            n = n / 26 - 1;
        }
        format!("{}{}", letters, self.row + 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            f.write_str(&self.to_a1())
        } else {
            write!(f, "({}, {})", self.row, self.col)
        }
    }
}

impl FromStr for Position {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_a1(s).ok_or(SheetError::InvalidPosition)
    }
}

/// Bounding extent of the printable area: `rows` x `cols`, both 0 when the
/// sheet has no text anywhere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub rows: i32,
    pub cols: i32,
}
