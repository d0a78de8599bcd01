/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use anyhow::{bail, Result};

use super::Color;

/// A vertical column of the board, `a` through `h`.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct File(u8);

impl File {
    pub const A: Self = Self(0);
    pub const B: Self = Self(1);
    pub const C: Self = Self(2);
    pub const D: Self = Self(3);
    pub const E: Self = Self(4);
    pub const F: Self = Self(5);
    pub const G: Self = Self(6);
    pub const H: Self = Self(7);

    /// Number of files on a chess board.
    pub const COUNT: usize = 8;

    /// Constructs a new [`File`] without checking that `file < 8`.
    #[inline(always)]
    pub const fn new_unchecked(file: u8) -> Self {
        Self(file)
    }

    /// Constructs a new [`File`], failing if `file >= 8`.
    #[inline(always)]
    pub fn new(file: u8) -> Result<Self> {
        if file >= 8 {
            bail!("File must be in the range [0, 7]. Got {file}");
        }
        Ok(Self(file))
    }

    /// Parses a [`File`] from a character in `a..=h` (case-insensitive).
    #[inline(always)]
    pub fn from_char(c: char) -> Result<Self> {
        let lower = c.to_ascii_lowercase();
        if !('a'..='h').contains(&lower) {
            bail!("File chars must be in the range [a, h]. Got {c:?}");
        }
        Ok(Self(lower as u8 - b'a'))
    }

    /// The raw value of this [`File`].
    #[inline(always)]
    pub const fn inner(&self) -> u8 {
        self.0
    }

    /// This [`File`] as a `usize`, for indexing.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// The lowercase character of this [`File`].
    #[inline(always)]
    pub const fn char(&self) -> char {
        (b'a' + self.0) as char
    }

    /// Iterator over all files, `a` through `h`.
    #[inline(always)]
    pub fn iter() -> impl DoubleEndedIterator<Item = Self> {
        (0..8).map(Self)
    }

    /// Horizontal distance between two files.
    #[inline(always)]
    pub const fn distance(self, other: Self) -> u8 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.char())
    }
}

/// A horizontal row of the board, `1` through `8`.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Rank(u8);

impl Rank {
    pub const ONE: Self = Self(0);
    pub const TWO: Self = Self(1);
    pub const THREE: Self = Self(2);
    pub const FOUR: Self = Self(3);
    pub const FIVE: Self = Self(4);
    pub const SIX: Self = Self(5);
    pub const SEVEN: Self = Self(6);
    pub const EIGHT: Self = Self(7);

    /// Number of ranks on a chess board.
    pub const COUNT: usize = 8;

    /// Constructs a new [`Rank`] without checking that `rank < 8`.
    #[inline(always)]
    pub const fn new_unchecked(rank: u8) -> Self {
        Self(rank)
    }

    /// Constructs a new [`Rank`], failing if `rank >= 8`.
    #[inline(always)]
    pub fn new(rank: u8) -> Result<Self> {
        if rank >= 8 {
            bail!("Rank must be in the range [0, 7]. Got {rank}");
        }
        Ok(Self(rank))
    }

    /// Parses a [`Rank`] from a character in `1..=8`.
    #[inline(always)]
    pub fn from_char(c: char) -> Result<Self> {
        if !('1'..='8').contains(&c) {
            bail!("Rank chars must be in the range [1, 8]. Got {c:?}");
        }
        Ok(Self(c as u8 - b'1'))
    }

    /// The home rank for pieces of `color`.
    #[inline(always)]
    pub const fn first(color: Color) -> Self {
        match color {
            Color::White => Self::ONE,
            Color::Black => Self::EIGHT,
        }
    }

    /// The rank that `color`'s pawns start on.
    #[inline(always)]
    pub const fn second(color: Color) -> Self {
        match color {
            Color::White => Self::TWO,
            Color::Black => Self::SEVEN,
        }
    }

    /// The raw value of this [`Rank`].
    #[inline(always)]
    pub const fn inner(&self) -> u8 {
        self.0
    }

    /// This [`Rank`] as a `usize`, for indexing.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// The digit character of this [`Rank`].
    #[inline(always)]
    pub const fn char(&self) -> char {
        (b'1' + self.0) as char
    }

    /// This rank from the point of view of `color`, so that rank 1 for Black is rank 8 on the board.
    #[inline(always)]
    pub const fn relative_to(self, color: Color) -> Self {
        match color {
            Color::White => self,
            Color::Black => Self(7 - self.0),
        }
    }

    /// Iterator over all ranks, `1` through `8`.
    #[inline(always)]
    pub fn iter() -> impl DoubleEndedIterator<Item = Self> {
        (0..8).map(Self)
    }

    /// Vertical distance between two ranks.
    #[inline(always)]
    pub const fn distance(self, other: Self) -> u8 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

impl fmt::Debug for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rank({})", self.char())
    }
}

/// A single square of the board, indexed `0..64` with `a1 = 0` and `h8 = 63`.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Square(u8);

impl Square {
    pub const A1: Self = Self(0);
    pub const B1: Self = Self(1);
    pub const C1: Self = Self(2);
    pub const D1: Self = Self(3);
    pub const E1: Self = Self(4);
    pub const F1: Self = Self(5);
    pub const G1: Self = Self(6);
    pub const H1: Self = Self(7);
    pub const A8: Self = Self(56);
    pub const C8: Self = Self(58);
    pub const D8: Self = Self(59);
    pub const E8: Self = Self(60);
    pub const F8: Self = Self(61);
    pub const G8: Self = Self(62);
    pub const H8: Self = Self(63);

    /// Number of squares on a chess board.
    pub const COUNT: usize = 64;

    /// Constructs a new [`Square`] from the provided [`File`] and [`Rank`].
    #[inline(always)]
    pub const fn new(file: File, rank: Rank) -> Self {
        Self(rank.0 << 3 | file.0)
    }

    /// Constructs a new [`Square`] from a `0..64` index without bounds checking.
    #[inline(always)]
    pub const fn from_index_unchecked(index: usize) -> Self {
        Self(index as u8)
    }

    /// Constructs a new [`Square`] from a `0..64` index, failing if out of bounds.
    #[inline(always)]
    pub fn from_index(index: usize) -> Result<Self> {
        if index >= Self::COUNT {
            bail!("Square index must be in the range [0, 63]. Got {index}");
        }
        Ok(Self(index as u8))
    }

    /// Parses a [`Square`] from a two-character string like `e4`.
    pub fn from_uci(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let (Some(f), Some(r), None) = (chars.next(), chars.next(), chars.next()) else {
            bail!("Square strings must be 2 characters. Got {s:?}");
        };
        Ok(Self::new(File::from_char(f)?, Rank::from_char(r)?))
    }

    /// The [`File`] of this square.
    #[inline(always)]
    pub const fn file(&self) -> File {
        File(self.0 & 7)
    }

    /// The [`Rank`] of this square.
    #[inline(always)]
    pub const fn rank(&self) -> Rank {
        Rank(self.0 >> 3)
    }

    /// The raw value of this [`Square`].
    #[inline(always)]
    pub const fn inner(&self) -> u8 {
        self.0
    }

    /// This [`Square`] as a `usize`, for indexing.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// This square from the point of view of `color`, mirroring vertically for Black.
    ///
    /// `Square::E1.relative_to(Color::Black)` is `e8`.
    #[inline(always)]
    pub const fn relative_to(self, color: Color) -> Self {
        match color {
            Color::White => self,
            Color::Black => Self(self.0 ^ 56),
        }
    }

    /// The rank of this square from the point of view of `color`.
    #[inline(always)]
    pub const fn relative_rank(self, color: Color) -> Rank {
        self.rank().relative_to(color)
    }

    /// Offsets this square by the provided file and rank deltas, if the result is on the board.
    #[inline(always)]
    pub const fn offset(self, file_delta: i8, rank_delta: i8) -> Option<Self> {
        let file = self.file().0 as i8 + file_delta;
        let rank = self.rank().0 as i8 + rank_delta;
        if file < 0 || file > 7 || rank < 0 || rank > 7 {
            None
        } else {
            Some(Self((rank as u8) << 3 | file as u8))
        }
    }

    /// The square one step toward the opponent's side, from `color`'s point of view.
    #[inline(always)]
    pub const fn forward(self, color: Color) -> Option<Self> {
        match color {
            Color::White => self.offset(0, 1),
            Color::Black => self.offset(0, -1),
        }
    }

    /// The square one step toward `color`'s own side.
    #[inline(always)]
    pub const fn backward(self, color: Color) -> Option<Self> {
        match color {
            Color::White => self.offset(0, -1),
            Color::Black => self.offset(0, 1),
        }
    }

    /// Chebyshev distance between two squares.
    #[inline(always)]
    pub const fn distance(self, other: Self) -> u8 {
        let fd = self.file().distance(other.file());
        let rd = self.rank().distance(other.rank());
        if fd > rd {
            fd
        } else {
            rd
        }
    }

    /// Iterator over all 64 squares, `a1` through `h8`.
    #[inline(always)]
    pub fn iter() -> impl DoubleEndedIterator<Item = Self> {
        (0..64).map(Self)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file(), self.rank())
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Square({self})")
    }
}

impl std::str::FromStr for Square {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_uci(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_parts() {
        let e4 = Square::from_uci("e4").unwrap();
        assert_eq!(e4.file(), File::E);
        assert_eq!(e4.rank(), Rank::FOUR);
        assert_eq!(e4.to_string(), "e4");
        assert_eq!(e4.index(), 28);
    }

    #[test]
    fn test_relative_squares() {
        assert_eq!(Square::E1.relative_to(Color::White), Square::E1);
        assert_eq!(Square::E1.relative_to(Color::Black), Square::E8);
        assert_eq!(Square::A1.relative_rank(Color::Black), Rank::EIGHT);
    }

    #[test]
    fn test_offsets() {
        assert_eq!(Square::A1.offset(-1, 0), None);
        assert_eq!(Square::A1.offset(1, 1), Some(Square::from_uci("b2").unwrap()));
        assert_eq!(Square::E8.forward(Color::White), None);
        assert_eq!(Square::E8.forward(Color::Black), Some(Square::from_uci("e7").unwrap()));
    }

    #[test]
    fn test_invalid_parses() {
        assert!(Square::from_uci("i9").is_err());
        assert!(Square::from_uci("e").is_err());
        assert!(Square::from_uci("e44").is_err());
    }
}
