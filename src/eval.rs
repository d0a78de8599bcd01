/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The evaluator collaborator.
//!
//! The search treats evaluation as a pure function `eval(pos) -> centipawns`
//! bounded below [`Score::KNOWN_WIN`]. The built-in implementation is a
//! tapered material + piece-square evaluation fed by the incrementally
//! maintained scores on [`Position`]; a stronger evaluator can replace
//! [`evaluate`] without touching the search.

use crate::{psqt, Color, Piece, PieceKind, Position, Score};

/// Bonus for having the move.
const TEMPO: i32 = 18;

/// Evaluate `pos` from the side to move's point of view.
pub fn evaluate(pos: &Position) -> Score {
    let phase = game_phase(pos);

    // Interpolate the incremental piece-square totals between game phases.
    let mg = pos.psq_mg();
    let eg = pos.psq_eg();
    let blended = (mg * phase + eg * (psqt::PHASE_TOTAL - phase)) / psqt::PHASE_TOTAL;

    let white_pov = match pos.side_to_move() {
        Color::White => blended,
        Color::Black => -blended,
    };

    let v = Score::new(white_pov + TEMPO);

    // Evaluation never reaches into the proven-win range.
    v.clamp(
        -(Score::KNOWN_WIN - 1),
        Score::KNOWN_WIN - 1,
    )
}

/// An optional hook invoked on the parent of a node about to be evaluated.
///
/// Cache-backed evaluators use this to warm their internal state; the
/// built-in evaluation has nothing to prefetch.
#[inline(always)]
pub fn hint_parent(_pos: &Position) {}

/// Remaining material expressed as a phase in `0..=PHASE_TOTAL`;
/// the starting position is `PHASE_TOTAL`, bare kings are 0.
fn game_phase(pos: &Position) -> i32 {
    let mut phase = 0;
    for color in Color::all() {
        for kind in PieceKind::all() {
            phase += psqt::PHASE_WEIGHT[kind.index()]
                * pos.count(Piece::new(color, kind)) as i32;
        }
    }
    phase.min(psqt::PHASE_TOTAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FEN_STARTPOS;

    #[test]
    fn test_startpos_is_roughly_balanced() {
        let pos = Position::from_fen(FEN_STARTPOS, false).unwrap();
        let v = evaluate(&pos);
        assert!(v.value().abs() < 100, "startpos evaluated at {v}");
    }

    #[test]
    fn test_evaluation_is_side_relative() {
        // A position with an extra White queen must look good for White and
        // bad for Black.
        let white = Position::from_fen("k7/8/8/8/8/8/8/KQ6 w - - 0 1", false).unwrap();
        let black = Position::from_fen("k7/8/8/8/8/8/8/KQ6 b - - 0 1", false).unwrap();
        assert!(evaluate(&white) > 300);
        assert!(evaluate(&black) < -300);
    }

    #[test]
    fn test_evaluation_is_bounded() {
        // Grossly lopsided material still stays below the proven-win range.
        let pos = Position::from_fen("7k/8/8/8/8/Q7/Q7/KQQQ4 w - - 0 1", false).unwrap();
        assert!(evaluate(&pos) < Score::KNOWN_WIN);
        let flipped = Position::from_fen("7k/8/8/8/8/Q7/Q7/KQQQ4 b - - 0 1", false).unwrap();
        assert!(evaluate(&flipped) > -Score::KNOWN_WIN);
    }
}
