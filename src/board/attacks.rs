/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::LazyLock;

use super::{Bitboard, Color, PieceKind, Square};

/// Deltas for the movement of the Queen (and King).
const QUEEN_DELTAS: [(i8, i8); 8] = [
    (1, 0),
    (0, -1),
    (-1, 0),
    (0, 1),
    (1, 1),
    (1, -1),
    (-1, -1),
    (-1, 1),
];

/// Deltas for the movement of the Rook.
const ROOK_DELTAS: [(i8, i8); 4] = [(1, 0), (0, -1), (-1, 0), (0, 1)];

/// Deltas for the movement of the Bishop.
const BISHOP_DELTAS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

/// Deltas for the movement of the Knight.
const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (1, -2),
    (2, 1),
    (2, -1),
    (-1, 2),
    (-1, -2),
    (-2, 1),
    (-2, -1),
];

const KNIGHT_ATTACKS: [Bitboard; 64] = generate_leaper_mobility(&KNIGHT_DELTAS);
const KING_ATTACKS: [Bitboard; 64] = generate_leaper_mobility(&QUEEN_DELTAS);
const WHITE_PAWN_ATTACKS: [Bitboard; 64] = generate_pawn_attacks(Color::White);
const BLACK_PAWN_ATTACKS: [Bitboard; 64] = generate_pawn_attacks(Color::Black);

/// Generates the attack set from every square for a "leaper" piece described by `deltas`.
const fn generate_leaper_mobility(deltas: &[(i8, i8)]) -> [Bitboard; Square::COUNT] {
    let mut mobility = [Bitboard::EMPTY; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let square = Square::from_index_unchecked(i);
        let mut movement = Bitboard::EMPTY;

        let mut j = 0;
        while j < deltas.len() {
            let (df, dr) = deltas[j];
            if let Some(shifted) = square.offset(df, dr) {
                movement = movement.or(Bitboard::from_square(shifted));
            }
            j += 1;
        }

        mobility[i] = movement;
        i += 1;
    }

    mobility
}

/// Generates the capture mobility for Pawns of `color`: one square diagonally forward.
const fn generate_pawn_attacks(color: Color) -> [Bitboard; Square::COUNT] {
    let mut mobility = [Bitboard::EMPTY; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let bb = Bitboard::from_square(Square::from_index_unchecked(i));
        let pushed = bb.forward_by(color, 1);
        mobility[i] = pushed.east().or(pushed.west());
        i += 1;
    }

    mobility
}

/// Fetch the attacks of a knight on `square`.
#[inline(always)]
pub const fn knight_attacks(square: Square) -> Bitboard {
    KNIGHT_ATTACKS[square.index()]
}

/// Fetch the attacks of a king on `square`.
#[inline(always)]
pub const fn king_attacks(square: Square) -> Bitboard {
    KING_ATTACKS[square.index()]
}

/// Fetch the capture attacks of a `color` pawn on `square`.
#[inline(always)]
pub const fn pawn_attacks(color: Color, square: Square) -> Bitboard {
    match color {
        Color::White => WHITE_PAWN_ATTACKS[square.index()],
        Color::Black => BLACK_PAWN_ATTACKS[square.index()],
    }
}

/// Fetch the attacks of a bishop on `square`, given the provided occupancy.
#[inline(always)]
pub fn bishop_attacks(square: Square, occupied: Bitboard) -> Bitboard {
    let tables = &*TABLES;
    tables.attacks[bishop_index(&tables.bishop_magics, square, occupied)]
}

/// Fetch the attacks of a rook on `square`, given the provided occupancy.
#[inline(always)]
pub fn rook_attacks(square: Square, occupied: Bitboard) -> Bitboard {
    let tables = &*TABLES;
    tables.attacks[rook_index(&tables.rook_magics, square, occupied)]
}

/// Fetch the attacks of a queen on `square`, given the provided occupancy.
#[inline(always)]
pub fn queen_attacks(square: Square, occupied: Bitboard) -> Bitboard {
    bishop_attacks(square, occupied) | rook_attacks(square, occupied)
}

/// Fetch the attacks of a non-pawn piece of `kind` on `square`, given the provided occupancy.
#[inline(always)]
pub fn attacks_for(kind: PieceKind, square: Square, occupied: Bitboard) -> Bitboard {
    match kind {
        PieceKind::Knight => knight_attacks(square),
        PieceKind::Bishop => bishop_attacks(square, occupied),
        PieceKind::Rook => rook_attacks(square, occupied),
        PieceKind::Queen => queen_attacks(square, occupied),
        PieceKind::King => king_attacks(square),
        PieceKind::Pawn => unreachable!("pawn attacks depend on color"),
    }
}

/// Fetch the attacks of a non-pawn piece of `kind` on an otherwise empty board.
#[inline(always)]
pub fn pseudo_attacks(kind: PieceKind, square: Square) -> Bitboard {
    attacks_for(kind, square, Bitboard::EMPTY)
}

/// All squares strictly between `a` and `b`, or empty if they do not share a line.
#[inline(always)]
pub fn ray_between(a: Square, b: Square) -> Bitboard {
    TABLES.between[a.index()][b.index()]
}

/// The full line (both endpoints included) through `a` and `b`, or empty if they do not share one.
#[inline(always)]
pub fn line_through(a: Square, b: Square) -> Bitboard {
    TABLES.line[a.index()][b.index()]
}

/// Returns `true` if `a`, `b`, and `c` lie on a common rank, file, or diagonal.
#[inline(always)]
pub fn aligned(a: Square, b: Square, c: Square) -> bool {
    line_through(a, b).contains(c)
}

/// Fixed-shift magic multipliers and their offsets into the shared attack table.
struct MagicInit {
    magic: u64,
    offset: u32,
}

macro_rules! m {
    ($magic:expr, $offset:expr) => {
        MagicInit {
            magic: $magic,
            offset: $offset,
        }
    };
}

#[rustfmt::skip]
const BISHOP_INIT: [MagicInit; 64] = [
    m!(0x007f_bfbf_bfbf_bfff,  5378), m!(0x0000_a060_4010_07fc,  4093),
    m!(0x0001_0040_0802_0000,  4314), m!(0x0000_8060_0400_0000,  6587),
    m!(0x0000_1004_0000_0000,  6491), m!(0x0000_21c1_00b2_0000,  6330),
    m!(0x0000_0400_4100_8000,  5609), m!(0x0000_0fb0_203f_ff80, 22236),
    m!(0x0000_0401_0040_1004,  6106), m!(0x0000_0200_8020_0802,  5625),
    m!(0x0000_0040_1020_2000, 16785), m!(0x0000_0080_6004_0000, 16817),
    m!(0x0000_0044_0200_0000,  6842), m!(0x0000_0008_0100_8000,  7003),
    m!(0x0000_07ef_e0bf_ff80,  4197), m!(0x0000_0008_2082_0020,  7356),
    m!(0x0000_4000_8080_8080,  4602), m!(0x0002_1f01_0040_0808,  4538),
    m!(0x0001_8000_c06f_3fff, 29531), m!(0x0000_2582_0080_1000, 45393),
    m!(0x0000_2400_8084_0000, 12420), m!(0x0000_1800_0c03_fff8, 15763),
    m!(0x0000_0a58_4020_8020,  5050), m!(0x0000_0200_0820_8020,  4346),
    m!(0x0000_8040_0081_0100,  6074), m!(0x0001_0119_0080_2008,  7866),
    m!(0x0000_8040_0081_0100, 32139), m!(0x0001_0040_3c04_03ff, 57673),
    m!(0x0007_8402_a880_2000, 55365), m!(0x0000_1010_0080_4400, 15818),
    m!(0x0000_0808_0010_4100,  5562), m!(0x0000_4004_c008_2008,  6390),
    m!(0x0001_0101_2000_8020,  7930), m!(0x0000_8080_9a00_4010, 13329),
    m!(0x0007_fefe_0881_0010,  7170), m!(0x0003_ff0f_833f_c080, 27267),
    m!(0x007f_e080_1900_3042, 53787), m!(0x003f_ffef_ea00_3000,  5097),
    m!(0x0000_1010_1000_2080,  6643), m!(0x0000_8020_0508_0804,  6138),
    m!(0x0000_8080_80a8_0040,  7418), m!(0x0000_1041_0020_0040,  7898),
    m!(0x0003_ffdf_7f83_3fc0, 42012), m!(0x0000_0088_4045_0020, 57350),
    m!(0x0000_7ffc_8018_0030, 22813), m!(0x007f_ffdd_8014_0028, 56693),
    m!(0x0002_0080_200a_0004,  5818), m!(0x0000_1010_1010_0020,  7098),
    m!(0x0007_ffdf_c180_5000,  4451), m!(0x0003_ffef_e0c0_2200,  4709),
    m!(0x0000_0008_2080_6000,  4794), m!(0x0000_0000_0840_3000, 13364),
    m!(0x0000_0001_0020_2000,  4570), m!(0x0000_0040_4080_2000,  4282),
    m!(0x0004_0100_4010_0400, 14964), m!(0x0000_6020_6018_03f4,  4026),
    m!(0x0003_ffdf_dfc2_8048,  4826), m!(0x0000_0008_2082_0020,  7354),
    m!(0x0000_0000_0820_8060,  4848), m!(0x0000_0000_0080_8020, 15946),
    m!(0x0000_0000_0100_2020, 14932), m!(0x0000_0004_0100_2008, 16588),
    m!(0x0000_0040_4040_4040,  6905), m!(0x007f_ff9f_df7f_f813, 16076),
];

#[rustfmt::skip]
const ROOK_INIT: [MagicInit; 64] = [
    m!(0x0028_0077_ffeb_fffe, 26304), m!(0x2004_0102_0109_7fff, 35520),
    m!(0x0010_0200_1005_3fff, 38592), m!(0x0040_0400_0800_4002,  8026),
    m!(0x7fd0_0441_ffff_d003, 22196), m!(0x4020_0088_87df_fffe, 80870),
    m!(0x0040_0088_8847_ffff, 76747), m!(0x0068_00fb_ff75_fffd, 30400),
    m!(0x0000_2801_0113_ffff, 11115), m!(0x0020_0402_01fc_ffff, 18205),
    m!(0x007f_e800_42ff_ffe8, 53577), m!(0x0000_1800_217f_ffe8, 62724),
    m!(0x0000_1800_073f_ffe8, 34282), m!(0x0000_1800_e05f_ffe8, 29196),
    m!(0x0000_1800_602f_ffe8, 23806), m!(0x0000_3000_2fff_ffa0, 49481),
    m!(0x0030_0018_010b_ffff,  2410), m!(0x0003_000c_0085_fffb, 36498),
    m!(0x0004_0008_0201_0008, 24478), m!(0x0004_0020_2002_0004, 10074),
    m!(0x0001_0020_0200_2001, 79315), m!(0x0001_0010_0080_1040, 51779),
    m!(0x0000_0040_4000_8001, 13586), m!(0x0000_0068_00cd_fff4, 19323),
    m!(0x0040_2000_1008_0010, 70612), m!(0x0000_0800_1004_0010, 83652),
    m!(0x0004_0100_0802_0008, 63110), m!(0x0000_0400_2020_0200, 34496),
    m!(0x0002_0080_1010_0100, 84966), m!(0x0000_0080_2001_0020, 54341),
    m!(0x0000_0080_2020_0040, 60421), m!(0x0000_8200_2000_4020, 86402),
    m!(0x00ff_fd18_0030_0030, 50245), m!(0x007f_ff7f_bfd4_0020, 76622),
    m!(0x003f_ffbd_0018_0018, 84676), m!(0x001f_ffde_8018_0018, 78757),
    m!(0x000f_ffe0_bfe8_0018, 37346), m!(0x0001_0000_8020_2001,   370),
    m!(0x0003_fffb_ff98_0180, 42182), m!(0x0001_fffd_ff90_00e0, 45385),
    m!(0x00ff_fefe_ebff_d800, 61659), m!(0x007f_fff7_ffc0_1400, 12790),
    m!(0x003f_ffbf_e4ff_e800, 16762), m!(0x001f_fff0_1fc0_3000,     0),
    m!(0x000f_ffe7_f8bf_e800, 38380), m!(0x0007_ffdf_df3f_f808, 11098),
    m!(0x0003_fff8_5fff_a804, 21803), m!(0x0001_fffd_75ff_a802, 39189),
    m!(0x00ff_ffd7_ffeb_ffd8, 58628), m!(0x007f_ff75_ff7f_bfd8, 44116),
    m!(0x003f_ff86_3fbf_7fd8, 78357), m!(0x001f_ffbf_dfd7_ffd8, 44481),
    m!(0x000f_fff8_1028_0028, 64134), m!(0x0007_ffd7_f7fe_ffd8, 41759),
    m!(0x0003_fffc_0c48_0048,  1394), m!(0x0001_ffff_afd7_ffd8, 40910),
    m!(0x00ff_ffe4_ffdf_a3ba, 66516), m!(0x007f_ffef_7ff3_d3da,  3897),
    m!(0x003f_ffbf_dfef_f7fa,  3930), m!(0x001f_ffef_f7fb_fc22, 72934),
    m!(0x0000_0204_0800_1001, 72662), m!(0x0007_fffe_ffff_77fd, 56325),
    m!(0x0003_ffff_bf7d_feec, 66501), m!(0x0001_ffff_9dff_a333, 14826),
];

/// Size of the shared sliding-attack table for the fixed-shift magics above.
const ATTACK_TABLE_SIZE: usize = 88772;

/// Per-square relevant-occupancy masks for one slider type.
struct Magics {
    masks: [Bitboard; 64],
}

/// Lazily-initialized sliding attack tables plus the derived line/between tables.
struct Tables {
    attacks: Vec<Bitboard>,
    rook_magics: Magics,
    bishop_magics: Magics,
    between: Box<[[Bitboard; 64]; 64]>,
    line: Box<[[Bitboard; 64]; 64]>,
}

static TABLES: LazyLock<Tables> = LazyLock::new(Tables::init);

#[inline(always)]
fn bishop_index(magics: &Magics, square: Square, occupied: Bitboard) -> usize {
    let sq = square.index();
    let hash = (occupied.inner() & magics.masks[sq].inner()).wrapping_mul(BISHOP_INIT[sq].magic);
    BISHOP_INIT[sq].offset as usize + (hash >> (64 - 9)) as usize
}

#[inline(always)]
fn rook_index(magics: &Magics, square: Square, occupied: Bitboard) -> usize {
    let sq = square.index();
    let hash = (occupied.inner() & magics.masks[sq].inner()).wrapping_mul(ROOK_INIT[sq].magic);
    ROOK_INIT[sq].offset as usize + (hash >> (64 - 12)) as usize
}

/// Walks outward from `square` in each of `deltas`, stopping after the first occupied square.
fn sliding_attack(deltas: &[(i8, i8)], square: Square, occupied: Bitboard) -> Bitboard {
    let mut attack = Bitboard::EMPTY;
    for &(df, dr) in deltas {
        let mut sq = square;
        while let Some(next) = sq.offset(df, dr) {
            attack |= next;
            if occupied.contains(next) {
                break;
            }
            sq = next;
        }
    }
    attack
}

impl Tables {
    fn init() -> Self {
        let mut attacks = vec![Bitboard::EMPTY; ATTACK_TABLE_SIZE];
        let rook_magics = Self::init_magics(&mut attacks, &ROOK_DELTAS, |sq, m, occ| {
            let hash = (occ.inner() & m.inner()).wrapping_mul(ROOK_INIT[sq.index()].magic);
            ROOK_INIT[sq.index()].offset as usize + (hash >> (64 - 12)) as usize
        });
        let bishop_magics = Self::init_magics(&mut attacks, &BISHOP_DELTAS, |sq, m, occ| {
            let hash = (occ.inner() & m.inner()).wrapping_mul(BISHOP_INIT[sq.index()].magic);
            BISHOP_INIT[sq.index()].offset as usize + (hash >> (64 - 9)) as usize
        });

        // Line and between tables are derived from the empty-board slider attacks.
        let mut between = Box::new([[Bitboard::EMPTY; 64]; 64]);
        let mut line = Box::new([[Bitboard::EMPTY; 64]; 64]);

        for s1 in Square::iter() {
            for (deltas, init, shift) in [
                (&BISHOP_DELTAS, &BISHOP_INIT, 64 - 9),
                (&ROOK_DELTAS, &ROOK_INIT, 64 - 12u32),
            ] {
                let magics = if shift == 64 - 12 {
                    &rook_magics
                } else {
                    &bishop_magics
                };
                let empty_attacks = {
                    let hash = (Bitboard::EMPTY.inner() & magics.masks[s1.index()].inner())
                        .wrapping_mul(init[s1.index()].magic);
                    attacks[init[s1.index()].offset as usize + (hash >> shift) as usize]
                };

                for s2 in empty_attacks {
                    let s2_attacks = sliding_attack(deltas, s2, Bitboard::EMPTY);
                    line[s1.index()][s2.index()] = (empty_attacks & s2_attacks) | s1 | s2;
                    between[s1.index()][s2.index()] =
                        sliding_attack(deltas, s1, Bitboard::from_square(s2))
                            & sliding_attack(deltas, s2, Bitboard::from_square(s1));
                }
            }
        }

        Self {
            attacks,
            rook_magics,
            bishop_magics,
            between,
            line,
        }
    }

    /// Fills the shared attack table for one slider type, enumerating every subset
    /// of each square's relevant-occupancy mask with the carry-ripple trick.
    fn init_magics(
        attacks: &mut [Bitboard],
        deltas: &[(i8, i8)],
        index: impl Fn(Square, Bitboard, Bitboard) -> usize,
    ) -> Magics {
        let mut masks = [Bitboard::EMPTY; 64];

        for sq in Square::iter() {
            // Board edges are not part of the relevant occupancy.
            let edges = ((Bitboard::RANK_1 | Bitboard::RANK_8)
                & !Bitboard::from_rank(sq.rank()))
                | ((Bitboard::FILE_A | Bitboard::FILE_H) & !Bitboard::from_file(sq.file()));
            let mask = sliding_attack(deltas, sq, Bitboard::EMPTY) & !edges;
            masks[sq.index()] = mask;

            let mut occ = Bitboard::EMPTY;
            loop {
                attacks[index(sq, mask, occ)] = sliding_attack(deltas, sq, occ);
                occ = Bitboard::new(occ.inner().wrapping_sub(mask.inner())) & mask;
                if occ.is_empty() {
                    break;
                }
            }
        }

        Magics { masks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rook_attacks_with_blockers() {
        let d4 = Square::from_uci("d4").unwrap();
        let blockers = Bitboard::from_square(Square::from_uci("d6").unwrap())
            | Square::from_uci("f4").unwrap();

        let moves = rook_attacks(d4, blockers);

        // Blocked beyond d6 and f4, open everywhere else.
        assert!(moves.contains(Square::from_uci("d6").unwrap()));
        assert!(!moves.contains(Square::from_uci("d7").unwrap()));
        assert!(moves.contains(Square::from_uci("f4").unwrap()));
        assert!(!moves.contains(Square::from_uci("g4").unwrap()));
        assert!(moves.contains(Square::from_uci("a4").unwrap()));
        assert!(moves.contains(Square::D1));
    }

    #[test]
    fn test_bishop_attacks_empty_board() {
        let c1 = Square::C1;
        let moves = bishop_attacks(c1, Bitboard::EMPTY);
        assert_eq!(moves.population(), 7);
        assert!(moves.contains(Square::from_uci("h6").unwrap()));
        assert!(moves.contains(Square::A1.offset(1, 1).unwrap()));
    }

    #[test]
    fn test_ray_between() {
        let a1 = Square::A1;
        let a8 = Square::A8;
        assert_eq!(ray_between(a1, a8).population(), 6);
        assert!(ray_between(a1, a8).contains(Square::from_uci("a4").unwrap()));

        // Unaligned squares share no ray.
        assert!(ray_between(Square::A1, Square::from_uci("b3").unwrap()).is_empty());
    }

    #[test]
    fn test_aligned() {
        assert!(aligned(
            Square::A1,
            Square::from_uci("c3").unwrap(),
            Square::from_uci("h8").unwrap()
        ));
        assert!(!aligned(
            Square::A1,
            Square::from_uci("c3").unwrap(),
            Square::from_uci("h7").unwrap()
        ));
    }

    #[test]
    fn test_pawn_attacks() {
        let e4 = Square::from_uci("e4").unwrap();
        let attacks = pawn_attacks(Color::White, e4);
        assert!(attacks.contains(Square::from_uci("d5").unwrap()));
        assert!(attacks.contains(Square::from_uci("f5").unwrap()));
        assert_eq!(attacks.population(), 2);

        // Edge pawns only attack one square.
        let a2 = Square::from_uci("a2").unwrap();
        assert_eq!(pawn_attacks(Color::White, a2).population(), 1);
    }
}
