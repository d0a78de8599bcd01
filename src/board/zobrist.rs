/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::LazyLock;

use super::{pseudo_attacks, File, Move, Piece, PieceKind, Square, XoShiRo};

/// A Zobrist hash of a position, or of one of its sub-structures
/// (pawn placement, material signature).
pub type Key = u64;

/// Random key material for incremental position hashing, plus the cuckoo
/// tables used for upper-bound game-cycle detection.
pub struct Zobrist {
    psq: [[Key; Square::COUNT]; Piece::COUNT],
    en_passant: [Key; File::COUNT],
    castling: [Key; 16],
    side: Key,
    no_pawns: Key,

    /// Keys of reversible moves, placed by cuckoo hashing.
    cuckoo: Box<[Key; 8192]>,

    /// The move whose key sits in the matching `cuckoo` slot.
    cuckoo_move: Box<[Move; 8192]>,
}

static ZOBRIST: LazyLock<Zobrist> = LazyLock::new(Zobrist::init);

/// First cuckoo hash bucket for `key`.
#[inline(always)]
const fn h1(key: Key) -> usize {
    (key & 0x1fff) as usize
}

/// Second cuckoo hash bucket for `key`.
#[inline(always)]
const fn h2(key: Key) -> usize {
    ((key >> 16) & 0x1fff) as usize
}

impl Zobrist {
    fn init() -> Self {
        let mut rng = XoShiRo::new();

        let mut psq = [[0; Square::COUNT]; Piece::COUNT];
        for piece in psq.iter_mut() {
            for square in piece.iter_mut() {
                *square = rng.next_u64();
            }
        }

        let mut en_passant = [0; File::COUNT];
        for file in en_passant.iter_mut() {
            *file = rng.next_u64();
        }

        // One key per single right; a combined mask hashes as the XOR of its bits.
        let single: [Key; 4] = std::array::from_fn(|_| rng.next_u64());
        let mut castling = [0; 16];
        for (mask, key) in castling.iter_mut().enumerate() {
            for (bit, single_key) in single.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    *key ^= single_key;
                }
            }
        }

        let side = rng.next_u64();
        let no_pawns = rng.next_u64();

        // Seed the cuckoo tables with the key of every reversible move of every
        // non-pawn piece, so a cycle of two such moves can be found by key alone.
        let mut cuckoo = Box::new([0; 8192]);
        let mut cuckoo_move = Box::new([Move::NONE; 8192]);
        let mut count = 0;

        for piece in Piece::all().filter(|p| !p.is_pawn()) {
            for s1 in Square::iter() {
                for s2 in Square::iter().filter(|s2| s2.index() > s1.index()) {
                    if !pseudo_attacks(piece.kind(), s1).contains(s2) {
                        continue;
                    }

                    let mut mv = Move::new(s1, s2);
                    let mut key = psq[piece.index()][s1.index()]
                        ^ psq[piece.index()][s2.index()]
                        ^ side;

                    let mut i = h1(key);
                    loop {
                        std::mem::swap(&mut cuckoo[i], &mut key);
                        std::mem::swap(&mut cuckoo_move[i], &mut mv);
                        if mv == Move::NONE {
                            break;
                        }
                        i = if i == h1(key) { h2(key) } else { h1(key) };
                    }
                    count += 1;
                }
            }
        }
        debug_assert_eq!(count, 3668);

        Self {
            psq,
            en_passant,
            castling,
            side,
            no_pawns,
            cuckoo,
            cuckoo_move,
        }
    }
}

/// The key contribution of `piece` standing on `square`.
#[inline(always)]
pub fn psq_key(piece: Piece, square: Square) -> Key {
    ZOBRIST.psq[piece.index()][square.index()]
}

/// The key contribution of the `n`-th piece of a kind, for the material signature.
#[inline(always)]
pub fn material_key(piece: Piece, n: u32) -> Key {
    ZOBRIST.psq[piece.index()][n as usize]
}

/// The key contribution of an en-passant target on `file`.
#[inline(always)]
pub fn en_passant_key(file: File) -> Key {
    ZOBRIST.en_passant[file.index()]
}

/// The key contribution of a castling-rights mask.
#[inline(always)]
pub fn castling_key(rights: u8) -> Key {
    ZOBRIST.castling[rights as usize]
}

/// The key contribution of Black being on move.
#[inline(always)]
pub fn side_key() -> Key {
    ZOBRIST.side
}

/// Base key of the pawn hash when no pawns remain.
#[inline(always)]
pub fn no_pawns_key() -> Key {
    ZOBRIST.no_pawns
}

/// Looks up `key` (the XOR difference of two positions) in the cuckoo tables,
/// returning the reversible move connecting them if one exists.
#[inline(always)]
pub fn cuckoo_lookup(key: Key) -> Option<Move> {
    let z = &*ZOBRIST;
    for i in [h1(key), h2(key)] {
        if z.cuckoo[i] == key {
            return Some(z.cuckoo_move[i]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    #[test]
    fn test_keys_are_distinct() {
        let a = psq_key(Piece::WHITE_PAWN, Square::E1);
        let b = psq_key(Piece::WHITE_PAWN, Square::E8);
        let c = psq_key(Piece::BLACK_PAWN, Square::E1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(side_key(), 0);
    }

    #[test]
    fn test_castling_key_composes() {
        // A combined mask must hash as the XOR of its single-right keys.
        assert_eq!(castling_key(0), 0);
        assert_eq!(castling_key(0b0101), castling_key(0b0100) ^ castling_key(0b0001));
        assert_eq!(
            castling_key(0b1111),
            castling_key(0b1000) ^ castling_key(0b0100) ^ castling_key(0b0010) ^ castling_key(0b0001)
        );
    }

    #[test]
    fn test_cuckoo_finds_reversible_move() {
        // A knight shuffling between b1 and c3 produces this key difference.
        let piece = Piece::new(Color::White, PieceKind::Knight);
        let b1 = Square::B1;
        let c3 = Square::from_uci("c3").unwrap();
        let key = psq_key(piece, b1) ^ psq_key(piece, c3) ^ side_key();

        let mv = cuckoo_lookup(key).expect("knight move must be in the cuckoo table");
        assert!(mv.from() == b1 && mv.to() == c3 || mv.from() == c3 && mv.to() == b1);

        // A random key is (virtually) never present.
        assert_eq!(cuckoo_lookup(0xdeadbeef), None);
    }
}
