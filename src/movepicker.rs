/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Lazily yields the pseudo-legal moves of a node, best-first.
//!
//! Moves come out in stages so that a beta cutoff early in the list spares
//! the cost of generating and scoring the rest: hash move, then winning
//! captures, then the refutations (killers and counter-move), then
//! history-sorted quiets, and finally the losing captures. In check, a
//! dedicated evasion ordering replaces all of that.

use arrayvec::ArrayVec;

use crate::{
    generate, ContIndex, GenType, Histories, Move, PieceKind, Position, Square, DEPTH_QS_CHECKS,
    DEPTH_QS_RECAPTURES, MAX_MOVES,
};

/// A move with its ordering score.
#[derive(Clone, Copy)]
struct ScoredMove {
    mv: Move,
    score: i32,
}

type ScoredList = ArrayVec<ScoredMove, MAX_MOVES>;

/// What the picker produces next.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    // Main search.
    TtMove,
    CaptureInit,
    GoodCapture,
    Refutation,
    QuietInit,
    Quiet,
    BadCapture,

    // In check.
    EvasionTt,
    EvasionInit,
    Evasion,

    // Quiescence.
    QsearchTt,
    QCaptureInit,
    QCapture,
    QCheckInit,
    QCheck,

    // ProbCut.
    ProbCutTt,
    ProbCutInit,
    ProbCutCapture,

    Done,
}

pub struct MovePicker {
    stage: Stage,
    tt_move: Move,
    refutations: [Move; 3],
    refutation_idx: usize,
    cont: [Option<ContIndex>; 3],
    depth: i32,
    threshold: i32,
    recapture_sq: Square,
    list: ScoredList,
    bad_captures: ArrayVec<Move, MAX_MOVES>,
    cur: usize,
}

impl MovePicker {
    /// Picker for a main-search node.
    ///
    /// `killers` and `counter` come from the caller's stack frame; `cont`
    /// holds the continuation-history planes of the 1, 2, and 4 plies back,
    /// used when scoring quiets.
    pub fn new(
        pos: &Position,
        tt_move: Move,
        depth: i32,
        killers: [Move; 2],
        counter: Move,
        cont: [Option<ContIndex>; 3],
    ) -> Self {
        let tt_ok = tt_move != Move::NONE && pos.pseudo_legal(tt_move);
        let stage = match (pos.in_check(), tt_ok) {
            (true, true) => Stage::EvasionTt,
            (true, false) => Stage::EvasionInit,
            (false, true) => Stage::TtMove,
            (false, false) => Stage::CaptureInit,
        };

        Self {
            stage,
            tt_move: if tt_ok { tt_move } else { Move::NONE },
            refutations: [killers[0], killers[1], counter],
            refutation_idx: 0,
            cont,
            depth,
            threshold: 0,
            recapture_sq: Square::A1,
            list: ScoredList::new(),
            bad_captures: ArrayVec::new(),
            cur: 0,
        }
    }

    /// Picker for a quiescence node: captures, queen promotions, and (at the
    /// checks depth bucket) quiet checks. Below the recapture horizon only
    /// recaptures on `recapture_sq` are yielded.
    pub fn new_qsearch(pos: &Position, tt_move: Move, depth: i32, recapture_sq: Square) -> Self {
        debug_assert!(depth <= 0);

        let tt_ok = tt_move != Move::NONE
            && pos.pseudo_legal(tt_move)
            && (depth > DEPTH_QS_RECAPTURES || tt_move.to() == recapture_sq);
        let stage = match (pos.in_check(), tt_ok) {
            (true, true) => Stage::EvasionTt,
            (true, false) => Stage::EvasionInit,
            (false, true) => Stage::QsearchTt,
            (false, false) => Stage::QCaptureInit,
        };

        Self {
            stage,
            tt_move: if tt_ok { tt_move } else { Move::NONE },
            refutations: [Move::NONE; 3],
            refutation_idx: 0,
            cont: [None; 3],
            depth,
            threshold: 0,
            recapture_sq,
            list: ScoredList::new(),
            bad_captures: ArrayVec::new(),
            cur: 0,
        }
    }

    /// Picker for ProbCut: only captures whose static exchange beats
    /// `threshold`.
    pub fn new_probcut(pos: &Position, tt_move: Move, threshold: i32) -> Self {
        debug_assert!(!pos.in_check());

        let tt_ok = tt_move != Move::NONE
            && pos.pseudo_legal(tt_move)
            && pos.is_capture(tt_move)
            && pos.see_ge(tt_move, threshold);

        Self {
            stage: if tt_ok {
                Stage::ProbCutTt
            } else {
                Stage::ProbCutInit
            },
            tt_move: if tt_ok { tt_move } else { Move::NONE },
            refutations: [Move::NONE; 3],
            refutation_idx: 0,
            cont: [None; 3],
            depth: 0,
            threshold,
            recapture_sq: Square::A1,
            list: ScoredList::new(),
            bad_captures: ArrayVec::new(),
            cur: 0,
        }
    }

    /// Yields the next move, or `None` when the node is exhausted.
    ///
    /// With `skip_quiets` set, the quiet stage is passed over (used by
    /// move-count pruning); captures and refutations still come out.
    pub fn next(&mut self, pos: &Position, hist: &Histories, skip_quiets: bool) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TtMove | Stage::EvasionTt | Stage::QsearchTt | Stage::ProbCutTt => {
                    self.stage = match self.stage {
                        Stage::TtMove => Stage::CaptureInit,
                        Stage::EvasionTt => Stage::EvasionInit,
                        Stage::QsearchTt => Stage::QCaptureInit,
                        _ => Stage::ProbCutInit,
                    };
                    return Some(self.tt_move);
                }

                Stage::CaptureInit | Stage::QCaptureInit | Stage::ProbCutInit => {
                    self.generate_and_score_captures(pos, hist);
                    self.stage = match self.stage {
                        Stage::CaptureInit => Stage::GoodCapture,
                        Stage::QCaptureInit => Stage::QCapture,
                        _ => Stage::ProbCutCapture,
                    };
                }

                Stage::GoodCapture => {
                    while self.cur < self.list.len() {
                        let sm = self.pick_best();
                        self.cur += 1;
                        if sm.mv == self.tt_move {
                            continue;
                        }
                        // A capture losing material waits until the end.
                        if pos.see_ge(sm.mv, -sm.score / 18) {
                            return Some(sm.mv);
                        }
                        self.bad_captures.push(sm.mv);
                    }
                    self.stage = Stage::Refutation;
                }

                Stage::Refutation => {
                    while self.refutation_idx < self.refutations.len() {
                        let mv = self.refutations[self.refutation_idx];
                        self.refutation_idx += 1;

                        // The counter-move also defers to the killers.
                        let duplicate = mv == self.tt_move
                            || (self.refutation_idx == 3
                                && (mv == self.refutations[0] || mv == self.refutations[1]));

                        if mv != Move::NONE
                            && !duplicate
                            && !pos.is_capture(mv)
                            && pos.pseudo_legal(mv)
                        {
                            return Some(mv);
                        }
                    }
                    self.stage = Stage::QuietInit;
                }

                Stage::QuietInit => {
                    if !skip_quiets {
                        self.generate_and_score_quiets(pos, hist);
                        let start = self.cur;
                        partial_insertion_sort(&mut self.list[start..], -3000 * self.depth);
                    }
                    self.stage = Stage::Quiet;
                }

                Stage::Quiet => {
                    if !skip_quiets {
                        while self.cur < self.list.len() {
                            let mv = self.list[self.cur].mv;
                            self.cur += 1;
                            if mv != self.tt_move
                                && mv != self.refutations[0]
                                && mv != self.refutations[1]
                                && mv != self.refutations[2]
                            {
                                return Some(mv);
                            }
                        }
                    }
                    self.stage = Stage::BadCapture;
                    self.cur = 0;
                }

                Stage::BadCapture => {
                    if self.cur < self.bad_captures.len() {
                        let mv = self.bad_captures[self.cur];
                        self.cur += 1;
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }

                Stage::EvasionInit => {
                    let mut moves = crate::MoveList::new();
                    generate(pos, GenType::Evasions, &mut moves);
                    self.list.clear();
                    self.cur = 0;
                    for mv in moves {
                        let score = if pos.is_capture(mv) {
                            // Checker captures first, cheapest attacker first.
                            let victim = victim_value(pos, mv);
                            let attacker = pos.moved_piece(mv).unwrap().kind().index() as i32;
                            victim - attacker
                        } else {
                            let quiet = self.quiet_score(pos, hist, mv);
                            quiet - (1 << 28)
                        };
                        self.list.push(ScoredMove { mv, score });
                    }
                    self.stage = Stage::Evasion;
                }

                Stage::Evasion => {
                    while self.cur < self.list.len() {
                        let sm = self.pick_best();
                        self.cur += 1;
                        if sm.mv != self.tt_move {
                            return Some(sm.mv);
                        }
                    }
                    self.stage = Stage::Done;
                }

                Stage::QCapture => {
                    while self.cur < self.list.len() {
                        let sm = self.pick_best();
                        self.cur += 1;
                        if sm.mv == self.tt_move {
                            continue;
                        }
                        if self.depth > DEPTH_QS_RECAPTURES || sm.mv.to() == self.recapture_sq {
                            return Some(sm.mv);
                        }
                    }
                    if self.depth < DEPTH_QS_CHECKS {
                        self.stage = Stage::Done;
                    } else {
                        self.stage = Stage::QCheckInit;
                    }
                }

                Stage::QCheckInit => {
                    let mut moves = crate::MoveList::new();
                    generate(pos, GenType::QuietChecks, &mut moves);
                    self.list.clear();
                    self.cur = 0;
                    for mv in moves {
                        self.list.push(ScoredMove { mv, score: 0 });
                    }
                    self.stage = Stage::QCheck;
                }

                Stage::QCheck => {
                    while self.cur < self.list.len() {
                        let mv = self.list[self.cur].mv;
                        self.cur += 1;
                        if mv != self.tt_move {
                            return Some(mv);
                        }
                    }
                    self.stage = Stage::Done;
                }

                Stage::ProbCutCapture => {
                    while self.cur < self.list.len() {
                        let sm = self.pick_best();
                        self.cur += 1;
                        if sm.mv != self.tt_move && pos.see_ge(sm.mv, self.threshold) {
                            return Some(sm.mv);
                        }
                    }
                    self.stage = Stage::Done;
                }

                Stage::Done => return None,
            }
        }
    }

    /// Moves the best remaining scored move to the cursor position.
    #[inline(always)]
    fn pick_best(&mut self) -> ScoredMove {
        let mut best = self.cur;
        for i in self.cur + 1..self.list.len() {
            if self.list[i].score > self.list[best].score {
                best = i;
            }
        }
        self.list.swap(self.cur, best);
        self.list[self.cur]
    }

    fn generate_and_score_captures(&mut self, pos: &Position, hist: &Histories) {
        let mut moves = crate::MoveList::new();
        generate(pos, GenType::Captures, &mut moves);
        self.list.clear();
        self.cur = 0;

        for mv in moves {
            let victim = victim_value(pos, mv);
            let piece = pos.moved_piece(mv).unwrap();
            let captured_kind = captured_kind(pos, mv);
            let score = 7 * victim + hist.capture.get(piece, mv.to(), captured_kind);
            self.list.push(ScoredMove { mv, score });
        }
    }

    fn generate_and_score_quiets(&mut self, pos: &Position, hist: &Histories) {
        let start = self.cur;
        let mut moves = crate::MoveList::new();
        generate(pos, GenType::Quiets, &mut moves);
        self.list.truncate(start.min(self.list.len()));
        self.cur = self.list.len();

        for mv in moves {
            let score = self.quiet_score(pos, hist, mv);
            self.list.push(ScoredMove { mv, score });
        }
    }

    /// Quiet ordering: butterfly plus the continuation planes plus the
    /// pawn-structure table.
    fn quiet_score(&self, pos: &Position, hist: &Histories, mv: Move) -> i32 {
        let piece = pos.moved_piece(mv).unwrap();
        let to = mv.to();

        let mut score = hist.main.get(pos.side_to_move(), mv);
        score += hist.pawn.get(pos.pawn_key(), piece, to);
        for cont in self.cont.iter().flatten() {
            score += hist.continuation.get(cont, piece, to);
        }
        score
    }
}

/// The material value arriving at the destination of a capture-stage move.
#[inline(always)]
fn victim_value(pos: &Position, mv: Move) -> i32 {
    if mv.is_en_passant() {
        PieceKind::Pawn.value()
    } else if let Some(promo) = mv.promotion_kind() {
        promo.value() + pos.piece_at(mv.to()).map_or(0, |p| p.value())
    } else {
        pos.piece_at(mv.to()).map_or(0, |p| p.value())
    }
}

/// The kind of piece a capture-stage move removes (pawn for en passant,
/// pawn again for a plain queen promotion, which captures nothing).
#[inline(always)]
fn captured_kind(pos: &Position, mv: Move) -> PieceKind {
    if mv.is_en_passant() {
        PieceKind::Pawn
    } else {
        pos.piece_at(mv.to()).map_or(PieceKind::Pawn, |p| p.kind())
    }
}

/// Sorts `list` in descending score order, but only entries scoring at
/// least `limit`; the rest stay behind the sorted prefix in arbitrary order.
fn partial_insertion_sort(list: &mut [ScoredMove], limit: i32) {
    if list.is_empty() {
        return;
    }

    let mut sorted_end = 0;
    for p in 1..list.len() {
        if list[p].score >= limit {
            let tmp = list[p];
            sorted_end += 1;
            list[p] = list[sorted_end];

            let mut q = sorted_end;
            while q > 0 && list[q - 1].score < tmp.score {
                list[q] = list[q - 1];
                q -= 1;
            }
            list[q] = tmp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FEN_KIWIPETE, MoveList};

    fn drain(pos: &Position, mut picker: MovePicker, hist: &Histories) -> Vec<Move> {
        let mut out = Vec::new();
        while let Some(mv) = picker.next(pos, hist, false) {
            out.push(mv);
        }
        out
    }

    #[test]
    fn test_yields_every_pseudo_legal_move_once() {
        let pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
        let hist = Histories::new();
        let picker = MovePicker::new(&pos, Move::NONE, 8, [Move::NONE; 2], Move::NONE, [None; 3]);

        let yielded = drain(&pos, picker, &hist);

        let mut expected = MoveList::new();
        generate(&pos, GenType::NonEvasions, &mut expected);

        assert_eq!(yielded.len(), expected.len(), "picker must yield each move exactly once");
        for mv in &expected {
            assert!(yielded.contains(mv), "{mv} was never yielded");
        }
        for (i, mv) in yielded.iter().enumerate() {
            assert!(!yielded[i + 1..].contains(mv), "{mv} was yielded twice");
        }
    }

    #[test]
    fn test_tt_move_comes_first() {
        let pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
        let hist = Histories::new();

        let mut any = MoveList::new();
        generate(&pos, GenType::Quiets, &mut any);
        let tt_move = any[3];

        let picker = MovePicker::new(&pos, tt_move, 8, [Move::NONE; 2], Move::NONE, [None; 3]);
        let yielded = drain(&pos, picker, &hist);
        assert_eq!(yielded[0], tt_move);
    }

    #[test]
    fn test_killers_come_before_ordinary_quiets() {
        let pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
        let hist = Histories::new();

        let mut quiets = MoveList::new();
        generate(&pos, GenType::Quiets, &mut quiets);
        let killer = quiets[quiets.len() - 1];

        let picker =
            MovePicker::new(&pos, Move::NONE, 8, [killer, Move::NONE], Move::NONE, [None; 3]);
        let yielded = drain(&pos, picker, &hist);

        let mut captures = MoveList::new();
        generate(&pos, GenType::Captures, &mut captures);

        let killer_at = yielded.iter().position(|&m| m == killer).unwrap();
        for (i, mv) in yielded.iter().enumerate() {
            // Every quiet other than the killer must come later.
            if !captures.contains(mv) && *mv != killer {
                assert!(i > killer_at, "quiet {mv} was yielded before the killer");
            }
        }
    }

    #[test]
    fn test_skip_quiets_still_yields_captures() {
        let pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
        let hist = Histories::new();
        let mut picker =
            MovePicker::new(&pos, Move::NONE, 8, [Move::NONE; 2], Move::NONE, [None; 3]);

        let mut yielded = Vec::new();
        while let Some(mv) = picker.next(&pos, &hist, true) {
            yielded.push(mv);
        }

        let mut captures = MoveList::new();
        generate(&pos, GenType::Captures, &mut captures);
        assert_eq!(yielded.len(), captures.len());
    }

    #[test]
    fn test_evasion_picker_in_check() {
        let pos = Position::from_fen("4r2k/8/8/8/8/8/3P4/4K3 w - - 0 1", false).unwrap();
        assert!(pos.in_check());
        let hist = Histories::new();
        let picker = MovePicker::new(&pos, Move::NONE, 8, [Move::NONE; 2], Move::NONE, [None; 3]);
        let yielded = drain(&pos, picker, &hist);

        let mut evasions = MoveList::new();
        generate(&pos, GenType::Evasions, &mut evasions);
        assert_eq!(yielded.len(), evasions.len());
    }

    #[test]
    fn test_qsearch_picker_yields_captures_only_below_checks_depth() {
        let pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
        let hist = Histories::new();
        let mut picker = MovePicker::new_qsearch(&pos, Move::NONE, -2, Square::A1);

        let mut captures = MoveList::new();
        generate(&pos, GenType::Captures, &mut captures);

        let mut n = 0;
        while let Some(mv) = picker.next(&pos, &hist, false) {
            assert!(captures.contains(&mv));
            n += 1;
        }
        assert_eq!(n, captures.len());
    }

    #[test]
    fn test_probcut_picker_honors_threshold() {
        let pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
        let hist = Histories::new();
        let mut picker = MovePicker::new_probcut(&pos, Move::NONE, 100);

        while let Some(mv) = picker.next(&pos, &hist, false) {
            assert!(pos.see_ge(mv, 100), "{mv} does not beat the ProbCut threshold");
        }
    }
}
