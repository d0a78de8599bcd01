/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Precomputed attack tables for every piece.
mod attacks;

/// A 64-bit set of squares.
mod bitboard;

/// Staged pseudo-legal move generation.
mod movegen;

/// Compact move encoding and move lists.
mod moves;

/// Colors, piece kinds, and colored pieces.
mod piece;

/// Position representation, make/unmake, and all board predicates.
mod position;

/// Pseudo-random number generation for key material.
mod prng;

/// Squares, files, and ranks.
mod square;

/// Zobrist key material and cycle-detection tables.
pub mod zobrist;

pub use attacks::*;
pub use bitboard::*;
pub use movegen::*;
pub use moves::*;
pub use piece::*;
pub use position::*;
pub use prng::*;
pub use square::*;
pub use zobrist::Key;
