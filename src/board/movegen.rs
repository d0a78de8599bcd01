/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{
    castling, king_attacks, line_through, pawn_attacks, ray_between, rook_attacks, Bitboard,
    Color, File, Move, MoveList, PieceKind, Position, Rank, Square,
};

/// The families of moves the generator can produce.
///
/// `Captures`, `Quiets` and `QuietChecks` may only be requested when not in
/// check; `Evasions` only when in check. `Legal` dispatches on the checkers
/// and filters the result.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GenType {
    /// Captures and queen promotions.
    Captures,

    /// Non-captures, including under-promotions and castling.
    Quiets,

    /// Non-captures that give check.
    QuietChecks,

    /// Check evasions: king steps plus blocks and captures of the checker.
    Evasions,

    /// Captures plus quiets.
    NonEvasions,

    /// The fully-legal subset of evasions or non-evasions.
    Legal,
}

/// Appends all pseudo-legal moves of the requested family to `list`.
pub fn generate(pos: &Position, gen: GenType, list: &mut MoveList) {
    let us = pos.side_to_move();

    match gen {
        GenType::Legal => {
            let mut pseudo = MoveList::new();
            let inner = if pos.in_check() {
                GenType::Evasions
            } else {
                GenType::NonEvasions
            };
            generate(pos, inner, &mut pseudo);
            list.extend(pseudo.into_iter().filter(|&mv| pos.legal(mv)));
        }

        GenType::Evasions => {
            debug_assert!(pos.in_check());
            generate_evasions(pos, us, list);
        }

        GenType::QuietChecks => {
            debug_assert!(!pos.in_check());
            let mut quiets = MoveList::new();
            generate(pos, GenType::Quiets, &mut quiets);
            list.extend(quiets.into_iter().filter(|&mv| pos.gives_check(mv)));
        }

        GenType::Captures | GenType::Quiets | GenType::NonEvasions => {
            debug_assert!(!pos.in_check());
            let target = match gen {
                GenType::Captures => pos.color(!us),
                GenType::Quiets => !pos.occupied(),
                _ => !pos.color(us),
            };

            generate_pawn_moves(pos, gen, us, target, list);
            generate_piece_moves(pos, us, target, list);

            let king = pos.king(us);
            for to in king_attacks(king) & target {
                list.push(Move::new(king, to));
            }

            if gen != GenType::Captures {
                generate_castling(pos, us, list);
            }
        }
    }
}

/// Pushes the promotion moves appropriate for `gen`: queen promotions belong
/// to the capture stage, under-promotions to the quiet stage.
#[inline(always)]
fn push_promotions(gen: GenType, from: Square, to: Square, list: &mut MoveList) {
    if matches!(
        gen,
        GenType::Captures | GenType::Evasions | GenType::NonEvasions
    ) {
        list.push(Move::promotion(from, to, PieceKind::Queen));
    }
    if matches!(gen, GenType::Quiets | GenType::Evasions | GenType::NonEvasions) {
        list.push(Move::promotion(from, to, PieceKind::Knight));
        list.push(Move::promotion(from, to, PieceKind::Bishop));
        list.push(Move::promotion(from, to, PieceKind::Rook));
    }
}

fn generate_pawn_moves(
    pos: &Position,
    gen: GenType,
    us: Color,
    target: Bitboard,
    list: &mut MoveList,
) {
    let them = !us;
    let up: i8 = if us.is_white() { 1 } else { -1 };
    let empty = !pos.occupied();
    let enemies = pos.color(them);

    let pawns = pos.colored_kind(us, PieceKind::Pawn);
    let rank7 = Bitboard::from_rank(Rank::SEVEN.relative_to(us));
    let rank3 = Bitboard::from_rank(Rank::THREE.relative_to(us));
    let promoting = pawns & rank7;
    let others = pawns & !rank7;

    // Single and double pushes.
    if gen != GenType::Captures {
        let mut single = others.forward_by(us, 1) & empty;
        let mut double = (single & rank3).forward_by(us, 1) & empty;

        if gen == GenType::Evasions {
            single &= target;
            double &= target;
        }

        for to in single {
            list.push(Move::new(to.offset(0, -up).unwrap(), to));
        }
        for to in double {
            list.push(Move::new(to.offset(0, -2 * up).unwrap(), to));
        }
    }

    // Ordinary captures.
    if gen != GenType::Quiets {
        let mut east = others.forward_by(us, 1).east() & enemies;
        let mut west = others.forward_by(us, 1).west() & enemies;
        if gen == GenType::Evasions {
            east &= target;
            west &= target;
        }

        for to in east {
            list.push(Move::new(to.offset(-1, -up).unwrap(), to));
        }
        for to in west {
            list.push(Move::new(to.offset(1, -up).unwrap(), to));
        }

        if let Some(ep) = pos.ep_square() {
            // The captured pawn sits behind the target square; when evading,
            // this helps only if that pawn is the checker.
            let captured_sq = ep.forward(them).unwrap();
            if gen != GenType::Evasions || (target & captured_sq).is_nonempty() {
                for from in pawn_attacks(them, ep) & others {
                    list.push(Move::en_passant(from, ep));
                }
            }
        }
    }

    // Promotions, in every direction that reaches the back rank.
    if promoting.is_nonempty() {
        let mut push = promoting.forward_by(us, 1) & empty;
        let mut east = promoting.forward_by(us, 1).east() & enemies;
        let mut west = promoting.forward_by(us, 1).west() & enemies;

        if gen == GenType::Evasions {
            push &= target;
            east &= target;
            west &= target;
        }

        for to in push {
            push_promotions(gen, to.offset(0, -up).unwrap(), to, list);
        }
        for to in east {
            push_promotions(gen, to.offset(-1, -up).unwrap(), to, list);
        }
        for to in west {
            push_promotions(gen, to.offset(1, -up).unwrap(), to, list);
        }
    }
}

fn generate_piece_moves(pos: &Position, us: Color, target: Bitboard, list: &mut MoveList) {
    for kind in [
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
    ] {
        for from in pos.colored_kind(us, kind) {
            for to in super::attacks_for(kind, from, pos.occupied()) & target {
                list.push(Move::new(from, to));
            }
        }
    }
}

fn generate_castling(pos: &Position, us: Color, list: &mut MoveList) {
    if pos.in_check() {
        return;
    }

    let them = !us;
    let king_from = pos.king(us);

    for short in [true, false] {
        let right = castling::right(us, short);
        if !pos.can_castle(right) || pos.castling_impeded(right) {
            continue;
        }
        let Some(rook_from) = pos.castling_rook_square(right) else {
            continue;
        };

        let king_to = Square::new(
            if short { File::G } else { File::C },
            king_from.rank(),
        );

        // No square the king crosses may be attacked.
        let king_path = ray_between(king_from, king_to) | king_to;
        if king_path
            .into_iter()
            .any(|sq| (pos.attackers_to(sq) & pos.color(them)).is_nonempty())
        {
            continue;
        }

        // With arbitrary rook files, the departing rook may have shielded the
        // king's destination along the back rank.
        if pos.is_chess960()
            && (rook_attacks(king_to, pos.occupied() ^ rook_from)
                & pos.color(them)
                & pos.kinds(PieceKind::Rook, PieceKind::Queen))
            .is_nonempty()
        {
            continue;
        }

        list.push(Move::castling(king_from, rook_from));
    }
}

fn generate_evasions(pos: &Position, us: Color, list: &mut MoveList) {
    let them = !us;
    let ksq = pos.king(us);
    let checkers = pos.checkers();

    // Squares along a checking slider's ray are no refuge for the king.
    let mut slider_rays = Bitboard::EMPTY;
    for checker in checkers
        & (pos.kind(PieceKind::Bishop) | pos.kind(PieceKind::Rook) | pos.kind(PieceKind::Queen))
    {
        slider_rays |= line_through(checker, ksq) ^ checker;
    }

    for to in king_attacks(ksq) & !pos.color(us) & !slider_rays {
        list.push(Move::new(ksq, to));
    }

    // Double check admits only king moves.
    if checkers.more_than_one() {
        return;
    }

    // Block the ray or capture the checker.
    let checker = checkers.lsb();
    let target = ray_between(checker, ksq) | checker;

    generate_pawn_moves(pos, GenType::Evasions, us, target, list);
    generate_piece_moves(pos, us, target, list);
}

/// A convenience wrapper returning the legal moves of `pos`.
pub fn legal_moves(pos: &Position) -> MoveList {
    let mut list = MoveList::new();
    generate(pos, GenType::Legal, &mut list);
    list
}

/// Finds the legal move matching `uci` in coordinate notation, accepting both
/// the standard and the king-takes-rook castling renderings.
pub fn move_from_uci(pos: &Position, uci: &str) -> anyhow::Result<Move> {
    for mv in legal_moves(pos) {
        if mv.to_uci(false) == uci || mv.to_uci(true) == uci {
            return Ok(mv);
        }
    }
    anyhow::bail!("{uci:?} is not a legal move in {}", pos.to_fen())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FEN_KIWIPETE, FEN_STARTPOS};

    #[test]
    fn test_startpos_has_20_moves() {
        let pos = Position::default();
        assert_eq!(legal_moves(&pos).len(), 20);
    }

    #[test]
    fn test_kiwipete_has_48_moves() {
        let pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
        assert_eq!(legal_moves(&pos).len(), 48);
    }

    #[test]
    fn test_stages_partition_nonevasions() {
        for fen in [FEN_STARTPOS, FEN_KIWIPETE] {
            let pos = Position::from_fen(fen, false).unwrap();

            let mut captures = MoveList::new();
            let mut quiets = MoveList::new();
            let mut all = MoveList::new();
            generate(&pos, GenType::Captures, &mut captures);
            generate(&pos, GenType::Quiets, &mut quiets);
            generate(&pos, GenType::NonEvasions, &mut all);

            assert_eq!(captures.len() + quiets.len(), all.len());
            for mv in captures {
                assert!(all.contains(&mv));
            }
            for mv in quiets {
                assert!(all.contains(&mv));
            }
        }
    }

    #[test]
    fn test_evasions_only_resolve_check() {
        // White king in check from a rook; every evasion must be legal or
        // discarded by the legality filter.
        let pos = Position::from_fen("4r2k/8/8/8/8/8/3P4/4K3 w - - 0 1", false).unwrap();
        assert!(pos.in_check());

        let legal = legal_moves(&pos);
        assert!(!legal.is_empty());
        for mv in legal {
            let mut copy = pos.clone();
            let check = copy.gives_check(mv);
            copy.do_move(mv, check);
            // Our king must now be safe.
            assert!(
                (copy.attackers_to(copy.king(!copy.side_to_move()))
                    & copy.color(copy.side_to_move()))
                .is_empty()
            );
        }
    }

    #[test]
    fn test_quiet_checks_give_check() {
        let pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
        let mut checks = MoveList::new();
        generate(&pos, GenType::QuietChecks, &mut checks);

        for mv in checks {
            assert!(pos.gives_check(mv), "{mv} does not give check");
        }
    }

    #[test]
    fn test_legal_agrees_with_membership() {
        // `legal(m)` is true iff `m` appears in the legal move list.
        let pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
        let legal = legal_moves(&pos);

        let mut pseudo = MoveList::new();
        generate(&pos, GenType::NonEvasions, &mut pseudo);

        for mv in pseudo {
            assert_eq!(
                pos.legal(mv),
                legal.contains(&mv),
                "legality disagreement on {mv}"
            );
        }
    }

    #[test]
    fn test_movepicker_moves_are_pseudo_legal() {
        let pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
        let mut all = MoveList::new();
        generate(&pos, GenType::NonEvasions, &mut all);
        for mv in all {
            assert!(pos.pseudo_legal(mv), "{mv} failed pseudo_legal");
        }
    }

    #[test]
    fn test_move_from_uci_castling_forms() {
        let pos =
            Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1", false).unwrap();
        let short = move_from_uci(&pos, "e1g1").unwrap();
        assert!(short.is_castling());
        let long = move_from_uci(&pos, "e1a1").unwrap();
        assert!(long.is_castling());
        assert!(move_from_uci(&pos, "e1e8").is_err());
    }
}
