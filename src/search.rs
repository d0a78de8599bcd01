/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The iterative-deepening alpha-beta searcher.
//!
//! Each [`Worker`] owns a position copy, a stack of per-ply frames, and its
//! history tables; the transposition table and the stop flag are the only
//! state shared between workers. The main worker (id 0) additionally drives
//! the clock and the `info` stream.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use arrayvec::ArrayVec;
use uci_parser::{UciInfo, UciResponse};

use crate::{
    eval, tune, Bound, Color, ContIndex, Histories, Move, MovePicker, PieceKind, Position, Score,
    SharedContext, Square,
};

/// Hard bound on the distance between the root and any searched node.
pub const MAX_PLY: i32 = 246;

/// Transposition-table depth bucket for quiescence nodes that include checks.
pub const DEPTH_QS_CHECKS: i32 = 0;

/// Transposition-table depth bucket for capture-only quiescence nodes.
pub const DEPTH_QS_NO_CHECKS: i32 = -1;

/// Below this quiescence depth only recaptures are examined.
pub const DEPTH_QS_RECAPTURES: i32 = -5;

/// Depth recorded on eval-only transposition entries.
pub const DEPTH_NONE: i32 = -6;

/// Everything `go` can constrain.
#[derive(Clone, Debug)]
pub struct Limits {
    pub time: [Option<Duration>; Color::COUNT],
    pub inc: [Option<Duration>; Color::COUNT],
    pub movestogo: Option<u32>,
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub mate: Option<i32>,
    pub movetime: Option<Duration>,
    pub infinite: bool,
    pub ponder: bool,
    pub searchmoves: Vec<Move>,
    pub start_time: std::time::Instant,

    /// Per-move allowance for I/O and GUI latency.
    pub move_overhead: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            time: [None; Color::COUNT],
            inc: [None; Color::COUNT],
            movestogo: None,
            depth: None,
            nodes: None,
            mate: None,
            movetime: None,
            infinite: false,
            ponder: false,
            searchmoves: Vec::new(),
            start_time: std::time::Instant::now(),
            move_overhead: Duration::from_millis(10),
        }
    }
}

/// One candidate move at the root, with the bookkeeping that aspiration
/// windows, MultiPV, and the time manager need.
#[derive(Clone, Debug)]
pub struct RootMove {
    pub mv: Move,
    pub score: Score,
    pub previous_score: Score,
    pub average_score: Score,
    pub sel_depth: i32,
    pub pv: Vec<Move>,
}

impl RootMove {
    pub fn new(mv: Move) -> Self {
        Self {
            mv,
            score: -Score::INFINITE,
            previous_score: -Score::INFINITE,
            average_score: -Score::INFINITE,
            sel_depth: 0,
            pv: vec![mv],
        }
    }
}

/// Best sequence of moves found below a node.
#[derive(Clone, Debug, Default)]
pub struct PrincipalVariation(ArrayVec<Move, { MAX_PLY as usize }>);

impl PrincipalVariation {
    #[inline(always)]
    fn clear(&mut self) {
        self.0.clear();
    }

    /// Replaces the contents with `mv` followed by `other`.
    #[inline(always)]
    fn load(&mut self, mv: Move, other: &Self) {
        self.clear();
        self.0.push(mv);
        let spare = self.0.capacity() - 1;
        self.0.extend(other.0.iter().copied().take(spare));
    }

    #[inline(always)]
    pub fn moves(&self) -> &[Move] {
        &self.0
    }
}

/// Per-ply search state, indexed through the worker's stack so that earlier
/// plies remain addressable for continuation history and improving checks.
#[derive(Clone, Copy)]
struct Frame {
    current_move: Move,
    excluded: Move,
    killers: [Move; 2],
    static_eval: Score,
    stat_score: i32,
    move_count: i32,
    in_check: bool,
    tt_pv: bool,
    double_extensions: i32,
    cutoff_count: i32,
    cont: Option<ContIndex>,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            current_move: Move::NONE,
            excluded: Move::NONE,
            killers: [Move::NONE; 2],
            static_eval: Score::NONE,
            stat_score: 0,
            move_count: 0,
            in_check: false,
            tt_pv: false,
            double_extensions: 0,
            cutoff_count: 0,
            cont: None,
        }
    }
}

/// Padding in front of ply 0 so `frame(ply - 6)` is always addressable.
const STACK_OFFSET: i32 = 7;

#[derive(Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Root,
    Pv,
    NonPv,
}

impl NodeKind {
    #[inline(always)]
    fn is_pv(self) -> bool {
        !matches!(self, Self::NonPv)
    }

    #[inline(always)]
    fn is_root(self) -> bool {
        matches!(self, Self::Root)
    }
}

/// Log-log base table for late move reductions, in 1024ths of a ply.
static REDUCTIONS: std::sync::LazyLock<[i32; 256]> = std::sync::LazyLock::new(|| {
    let mut table = [0; 256];
    for (i, r) in table.iter_mut().enumerate().skip(1) {
        *r = (tune::lmr_scale!() * (i as f64).ln()) as i32;
    }
    table
});

/// One search thread. Everything here is thread-private; sharing happens
/// only through [`SharedContext`].
pub struct Worker {
    pub id: usize,
    pub shared: Arc<SharedContext>,
    pub pos: Position,
    pub root_moves: Vec<RootMove>,
    pub histories: Histories,
    stack: Vec<Frame>,

    pub root_depth: i32,
    pub completed_depth: i32,
    pub sel_depth: i32,
    pub pv_idx: usize,
    root_delta: Score,
    nmp_min_ply: i32,
    calls_cnt: i32,

    // Time-management state, meaningful on the main worker only.
    pub previous_best_score: Score,
    best_move_changes: f64,
    last_best_move: Move,
    last_best_move_depth: i32,
    previous_time_reduction: f64,
}

impl Worker {
    pub fn new(id: usize, shared: Arc<SharedContext>) -> Self {
        Self {
            id,
            shared,
            pos: Position::new(),
            root_moves: Vec::new(),
            histories: Histories::new(),
            stack: vec![Frame::default(); (MAX_PLY + STACK_OFFSET + 3) as usize],
            root_depth: 0,
            completed_depth: 0,
            sel_depth: 0,
            pv_idx: 0,
            root_delta: Score::INFINITE,
            nmp_min_ply: 0,
            calls_cnt: 0,
            previous_best_score: Score::INFINITE,
            best_move_changes: 0.0,
            last_best_move: Move::NONE,
            last_best_move_depth: 0,
            previous_time_reduction: 1.0,
        }
    }

    /// Forgets everything learned in previous games.
    pub fn clear(&mut self) {
        self.histories.clear();
        self.previous_best_score = Score::INFINITE;
        self.previous_time_reduction = 1.0;
        self.last_best_move = Move::NONE;
        self.last_best_move_depth = 0;
    }

    #[inline(always)]
    fn is_main(&self) -> bool {
        self.id == 0
    }

    #[inline(always)]
    fn frame(&self, ply: i32) -> &Frame {
        &self.stack[(ply + STACK_OFFSET) as usize]
    }

    #[inline(always)]
    fn frame_mut(&mut self, ply: i32) -> &mut Frame {
        &mut self.stack[(ply + STACK_OFFSET) as usize]
    }

    #[inline(always)]
    fn nodes(&self) -> u64 {
        self.shared.nodes[self.id].load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn count_node(&self) {
        self.shared.nodes[self.id].fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    fn stopped(&self) -> bool {
        self.shared.stop.load(Ordering::Relaxed)
    }

    /// The draw score, with a sub-pawn jitter steering repeated lines apart.
    #[inline(always)]
    fn draw_score(&self) -> Score {
        Score::DRAW - 1 + (self.nodes() & 2) as i32
    }

    /// Periodic bookkeeping: the main worker polls the clock and the node
    /// budget roughly every thousand nodes.
    fn check_time(&mut self) {
        self.calls_cnt -= 1;
        if self.calls_cnt > 0 {
            return;
        }

        self.calls_cnt = match self.shared.limits.nodes {
            Some(nodes) => (nodes / 1024).clamp(1, 1024) as i32,
            None => tune::time_check_interval!(),
        };

        if !self.is_main() {
            return;
        }

        if let Some(max_nodes) = self.shared.limits.nodes {
            if self.shared.total_nodes() >= max_nodes {
                self.shared.stop.store(true, Ordering::Relaxed);
                return;
            }
        }

        // While pondering the clock belongs to the opponent.
        if self.shared.ponder.load(Ordering::Relaxed) {
            return;
        }

        if self.shared.time.use_time_management()
            && self.shared.time.elapsed() >= self.shared.time.maximum()
        {
            self.shared.stop.store(true, Ordering::Relaxed);
        }
    }

    /// The iterative-deepening driver for one worker.
    pub fn iterative_deepening(&mut self) {
        for frame in self.stack.iter_mut() {
            *frame = Frame::default();
        }
        self.root_depth = 0;
        self.completed_depth = 0;
        self.calls_cnt = 0;
        self.nmp_min_ply = 0;
        self.best_move_changes = 0.0;

        let multipv = self.shared.multipv.min(self.root_moves.len()).max(1);
        let mut last_info = std::time::Instant::now();

        while self.root_depth < MAX_PLY - 1 {
            self.root_depth += 1;

            if self.stopped() {
                break;
            }
            if let Some(max_depth) = self.shared.limits.depth {
                if self.root_depth > max_depth {
                    break;
                }
            }

            for rm in self.root_moves.iter_mut() {
                rm.previous_score = rm.score;
            }
            self.best_move_changes /= 2.0;

            for pv_idx in 0..multipv {
                self.pv_idx = pv_idx;
                self.sel_depth = 0;

                // Aspiration window around the move's running average score.
                let avg = if self.root_moves[pv_idx].average_score == -Score::INFINITE {
                    self.root_moves[pv_idx].previous_score
                } else {
                    self.root_moves[pv_idx].average_score
                };

                let mut delta = Score::new(
                    tune::aspiration_delta_base!()
                        + avg.value().abs() * avg.value().abs()
                            / tune::aspiration_delta_divisor!(),
                );
                let (mut alpha, mut beta) =
                    if self.root_depth >= tune::min_aspiration_depth!() && avg.abs() < Score::KNOWN_WIN
                    {
                        ((avg - delta).max(-Score::INFINITE), (avg + delta).min(Score::INFINITE))
                    } else {
                        (-Score::INFINITE, Score::INFINITE)
                    };

                loop {
                    self.root_delta = beta - alpha;
                    let mut pv = PrincipalVariation::default();
                    let value =
                        self.search(NodeKind::Root, alpha, beta, self.root_depth, false, 0, &mut pv);

                    // Keep the lines ordered even mid-aspiration, so an abort
                    // still leaves the best candidate in front.
                    self.sort_root_moves(pv_idx);

                    if self.stopped() {
                        break;
                    }

                    if value <= alpha {
                        // Fail low: drop alpha toward the value, recenter beta.
                        beta = Score::new((alpha.value() + beta.value()) / 2);
                        alpha = (value - delta).max(-Score::INFINITE);
                    } else if value >= beta {
                        // Fail high: push beta up.
                        beta = (value + delta).min(Score::INFINITE);
                    } else {
                        break;
                    }

                    delta = delta + delta / 3;
                }

                self.sort_root_moves(0);

                if self.is_main()
                    && (self.stopped()
                        || pv_idx + 1 == multipv
                        || last_info.elapsed() > Duration::from_secs(3))
                {
                    last_info = std::time::Instant::now();
                    self.emit_info(multipv);
                }
            }

            if self.stopped() {
                break;
            }
            self.completed_depth = self.root_depth;

            let best = &self.root_moves[0];

            // A mate-in-N request ends the search once a short enough mate is known.
            if let Some(mate) = self.shared.limits.mate {
                if best.score.is_mate() && Score::MATE.value() - best.score.value().abs() <= 2 * mate
                {
                    self.shared.stop.store(true, Ordering::Relaxed);
                    break;
                }
            }

            if self.is_main() {
                self.main_thread_iteration_done();
            }
        }

        if self.is_main() && !self.root_moves.is_empty() {
            self.previous_best_score = self.root_moves[0].score;
        }
    }

    /// Clock decisions after a finished iteration, on the main worker.
    ///
    /// The optimum budget is scaled by how the evaluation is drifting, how
    /// long the best move has been stable, and how often it has flipped.
    fn main_thread_iteration_done(&mut self) {
        let best = &self.root_moves[0];
        let best_score = best.score;
        let best_move = best.mv;

        if best_move != self.last_best_move {
            self.last_best_move = best_move;
            self.last_best_move_depth = self.root_depth;
        }

        if !self.shared.time.use_time_management() {
            return;
        }
        if self.shared.ponder.load(Ordering::Relaxed) {
            // The budget only starts counting at ponderhit.
            return;
        }

        let previous = if self.previous_best_score == Score::INFINITE {
            best_score
        } else {
            self.previous_best_score
        };

        let falling_eval = ((66.0
            + 14.0 * f64::from((previous - best_score).value()))
            / 616.0)
            .clamp(0.51, 1.51);

        let time_reduction = if self.root_depth > self.last_best_move_depth + 8 {
            1.56
        } else {
            0.69
        };
        let reduction = (1.4 + self.previous_time_reduction) / (2.1 * time_reduction);
        let instability = 1.0 + 1.8 * self.best_move_changes;

        let total = self
            .shared
            .time
            .optimum()
            .mul_f64(falling_eval * reduction * instability);

        if self.shared.time.elapsed() > total {
            self.previous_time_reduction = time_reduction;
            self.shared.stop.store(true, Ordering::Relaxed);
        }
    }

    /// Stable-sorts the root moves from `from` onward, best first.
    fn sort_root_moves(&mut self, from: usize) {
        self.root_moves[from..]
            .sort_by(|a, b| (b.score, b.previous_score).cmp(&(a.score, a.previous_score)));
    }

    /// Emits one `info` line per PV under consideration.
    fn emit_info(&self, multipv: usize) {
        let elapsed = self.shared.time.elapsed();
        let nodes = self.shared.total_nodes();
        let nps = (nodes as f64 / elapsed.as_secs_f64().max(1e-6)) as u64;
        let chess960 = self.shared.chess960;

        for (i, rm) in self.root_moves.iter().take(multipv).enumerate() {
            let score = if rm.score == -Score::INFINITE {
                rm.previous_score
            } else {
                rm.score
            };
            if score == -Score::INFINITE {
                continue;
            }

            let info = UciInfo::new()
                .depth(self.completed_depth.max(1))
                .seldepth(rm.sel_depth)
                .multipv(i + 1)
                .score(score.into_uci())
                .nodes(nodes)
                .nps(nps)
                .hashfull(self.shared.tt.hashfull())
                .tbhits(self.shared.total_tb_hits())
                .time(elapsed.as_millis())
                .pv(rm.pv.iter().map(|mv| mv.to_uci(chess960)));

            println!("{}", UciResponse::info(info));
        }
    }

    /// The principal-variation search, fail-soft.
    #[allow(clippy::too_many_arguments)]
    fn search(
        &mut self,
        node: NodeKind,
        mut alpha: Score,
        mut beta: Score,
        mut depth: i32,
        cut_node: bool,
        ply: i32,
        pv: &mut PrincipalVariation,
    ) -> Score {
        let pv_node = node.is_pv();
        let root_node = node.is_root();

        // Step 1. Fall into quiescence at the horizon.
        if depth <= 0 {
            return self.qsearch(pv_node, alpha, beta, DEPTH_QS_CHECKS, ply, pv);
        }

        debug_assert!(-Score::INFINITE <= alpha && alpha < beta && beta <= Score::INFINITE);
        debug_assert!(pv_node || alpha + 1 == beta);

        self.check_time();

        let mut local_pv = PrincipalVariation::default();
        if pv_node {
            pv.clear();
            if ply + 1 > self.sel_depth {
                self.sel_depth = ply + 1;
            }
        }

        let in_check = self.pos.in_check();
        let excluded = self.frame(ply).excluded;
        let us = self.pos.side_to_move();

        // Step 2. Aborted search, draws, and the ply ceiling.
        if !root_node {
            if self.stopped() || ply >= MAX_PLY {
                return if ply >= MAX_PLY && !in_check {
                    eval::evaluate(&self.pos)
                } else {
                    self.draw_score()
                };
            }
            if self.pos.is_draw(ply) {
                return self.draw_score();
            }

            // Step 3. Mate-distance pruning.
            alpha = alpha.max(Score::mated_in(ply));
            beta = beta.min(Score::mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }

            // An available repetition of an earlier position bounds us at
            // the draw score from below.
            if self.pos.rule50() >= 3 && alpha < Score::DRAW && self.pos.has_game_cycle(ply) {
                alpha = self.draw_score();
                if alpha >= beta {
                    return alpha;
                }
            }
        }

        self.frame_mut(ply).in_check = in_check;
        self.frame_mut(ply).move_count = 0;
        self.frame_mut(ply + 1).excluded = Move::NONE;
        self.frame_mut(ply + 2).killers = [Move::NONE; 2];
        self.frame_mut(ply + 2).cutoff_count = 0;

        // Step 4. Transposition table lookup.
        let key = self.pos.key();
        let tt_entry = if excluded == Move::NONE {
            self.shared.tt.probe(key)
        } else {
            None
        };
        let tt_hit = tt_entry.is_some();
        let tt_value = tt_entry.map_or(Score::NONE, |e| e.value.from_tt(ply, self.pos.rule50()));
        let tt_move = if root_node {
            self.root_moves[self.pv_idx].pv[0]
        } else {
            tt_entry.map_or(Move::NONE, |e| e.mv)
        };
        let tt_capture = tt_move != Move::NONE && self.pos.is_capture(tt_move);

        if excluded == Move::NONE {
            self.frame_mut(ply).tt_pv = pv_node || tt_entry.is_some_and(|e| e.pv);
        }
        let tt_pv = self.frame(ply).tt_pv;

        // TT cutoff at non-PV nodes with sufficient stored depth.
        if !pv_node
            && tt_value != Score::NONE
            && tt_entry.is_some_and(|e| {
                e.depth > depth - 1
                    && match e.bound {
                        Bound::Exact => true,
                        Bound::Lower => tt_value >= beta,
                        Bound::Upper => tt_value <= alpha,
                        Bound::None => false,
                    }
            })
        {
            // Credit the hash move as if it had been searched. The move may
            // be stale or corrupted by a key collision, so vet it first.
            if tt_move != Move::NONE
                && tt_value >= beta
                && self.pos.pseudo_legal(tt_move)
                && !self.pos.is_capture(tt_move)
            {
                let bonus = stat_bonus(depth);
                self.update_quiet_stats(ply, tt_move, bonus);
            }

            // A long rule-50 tail can invalidate the stored result.
            if self.pos.rule50() < 90 {
                return tt_value;
            }
        }

        // Step 5. Endgame-tablebase probe.
        let tb = &self.shared.tb;
        if !root_node
            && excluded == Move::NONE
            && tb.cardinality() > 0
            && self.pos.occupied().population() <= tb.cardinality()
            && self.pos.rule50() == 0
            && self.pos.castling_rights() == 0
            && depth >= tb.probe_depth
        {
            if let Some(wdl) = tb.probe_wdl(&self.pos) {
                self.shared.tb_hits[self.id].fetch_add(1, Ordering::Relaxed);

                use crate::Wdl::*;
                let draw_leaning = !tb.rule50;
                let value = match wdl {
                    Loss => Score::mated_in(ply + 1) + 1,
                    Win => Score::mate_in(ply + 1) - 1,
                    BlessedLoss if draw_leaning => Score::mated_in(ply + 1) + 1,
                    CursedWin if draw_leaning => Score::mate_in(ply + 1) - 1,
                    _ => Score::DRAW,
                };

                let bound = match wdl {
                    Win | CursedWin => Bound::Lower,
                    Loss | BlessedLoss => Bound::Upper,
                    Draw => Bound::Exact,
                };

                let usable = match bound {
                    Bound::Exact => true,
                    Bound::Lower => value >= beta,
                    _ => value <= alpha,
                };
                if usable {
                    self.shared.tt.save(
                        key,
                        value.to_tt(ply),
                        tt_pv,
                        bound,
                        (depth + 6).min(MAX_PLY - 1),
                        Move::NONE,
                        Score::NONE,
                    );
                    return value;
                }
            }
        }

        // Step 6. Static evaluation, adjusted by the correction history.
        let raw_eval;
        let static_eval;
        if in_check {
            raw_eval = Score::NONE;
            static_eval = Score::NONE;
            self.frame_mut(ply).static_eval = Score::NONE;
        } else if excluded != Move::NONE {
            // Same node, evaluated by the enclosing invocation.
            raw_eval = self.frame(ply).static_eval;
            static_eval = raw_eval;
        } else {
            raw_eval = match tt_entry {
                Some(e) if e.eval != Score::NONE => e.eval,
                _ => eval::evaluate(&self.pos),
            };
            let corrected = raw_eval
                + self
                    .histories
                    .correction
                    .correction(us, self.pos.pawn_key());
            static_eval = corrected.clamp(-Score::KNOWN_WIN + 1, Score::KNOWN_WIN - 1);
            self.frame_mut(ply).static_eval = static_eval;

            if !tt_hit {
                // Record the evaluation so the position needn't be evaluated again.
                self.shared
                    .tt
                    .save(key, Score::NONE, tt_pv, Bound::None, DEPTH_NONE, Move::NONE, raw_eval);
            }
        }

        // Step 7. Improving: is the eval better than two (or four) plies ago?
        let improving = if in_check {
            false
        } else {
            let two = self.frame(ply - 2).static_eval;
            let four = self.frame(ply - 4).static_eval;
            if two != Score::NONE {
                static_eval > two
            } else if four != Score::NONE {
                static_eval > four
            } else {
                true
            }
        };

        if !in_check && !root_node && excluded == Move::NONE {
            // Step 8. Razoring: hopeless evals verify with quiescence.
            if !pv_node
                && static_eval
                    < alpha - tune::razor_base!() - tune::razor_depth_mult!() * depth * depth
            {
                let value = self.qsearch(false, alpha - 1, alpha, DEPTH_QS_CHECKS, ply, &mut local_pv);
                if value < alpha {
                    return value;
                }
            }

            // Step 9. Futility pruning: a comfortable static margin over beta.
            if !pv_node
                && depth < tune::max_futility_depth!()
                && static_eval
                    - Score::new(tune::futility_margin_mult!() * (depth - i32::from(improving)))
                    >= beta
                && static_eval >= beta
                && static_eval < Score::KNOWN_WIN
            {
                return static_eval;
            }

            // Step 10. Null-move pruning with verification.
            if !pv_node
                && self.frame(ply - 1).current_move != Move::NULL
                && static_eval >= beta
                && ply >= self.nmp_min_ply
                && self.pos.non_pawn_material(us) > 0
                && beta > -Score::KNOWN_WIN
            {
                let r = ((static_eval.value() - beta.value()) / tune::nmp_eval_divisor!()).min(6)
                    + depth / 3
                    + 4;
                let nmp_depth = (depth - r).max(0);

                self.frame_mut(ply).current_move = Move::NULL;
                self.frame_mut(ply).cont = None;
                self.pos.do_null_move();
                let null_value = -self.search(
                    NodeKind::NonPv,
                    -beta,
                    -beta + 1,
                    nmp_depth,
                    !cut_node,
                    ply + 1,
                    &mut local_pv,
                );
                self.pos.undo_null_move();

                if self.stopped() {
                    return Score::DRAW;
                }

                if null_value >= beta && null_value < Score::KNOWN_WIN {
                    if self.nmp_min_ply != 0 || depth < tune::nmp_verification_depth!() {
                        return null_value;
                    }

                    // Zugzwang guard: re-search without the null move, with
                    // null-move pruning disabled for a stretch of plies.
                    self.nmp_min_ply = ply + 3 * (depth - r) / 4;
                    let verified = self.search(
                        NodeKind::NonPv,
                        beta - 1,
                        beta,
                        nmp_depth,
                        false,
                        ply,
                        &mut local_pv,
                    );
                    self.nmp_min_ply = 0;

                    if verified >= beta {
                        return null_value;
                    }
                }
            }

            // Step 11. ProbCut: a good capture beating beta by a margin at
            // reduced depth is decisive enough to cut.
            let probcut_beta = beta
                + tune::probcut_margin!()
                - tune::probcut_improving_reduction!() * i32::from(improving);
            if !pv_node
                && depth > tune::min_probcut_depth!()
                && beta.abs() < Score::KNOWN_WIN
                && !(tt_hit
                    && tt_entry.is_some_and(|e| e.depth >= depth - 3)
                    && tt_value != Score::NONE
                    && tt_value < probcut_beta)
            {
                let threshold = probcut_beta - static_eval;
                let mut picker = MovePicker::new_probcut(&self.pos, tt_move, threshold.value());

                while let Some(mv) = picker.next(&self.pos, &self.histories, false) {
                    if mv == excluded || !self.pos.legal(mv) {
                        continue;
                    }

                    let gives_check = self.pos.gives_check(mv);
                    self.make_move(ply, mv, gives_check);

                    // Verify with quiescence first, then a reduced search.
                    let mut value = -self.qsearch(
                        false,
                        -probcut_beta,
                        -probcut_beta + 1,
                        DEPTH_QS_CHECKS,
                        ply + 1,
                        &mut local_pv,
                    );
                    if value >= probcut_beta {
                        value = -self.search(
                            NodeKind::NonPv,
                            -probcut_beta,
                            -probcut_beta + 1,
                            depth - 4,
                            !cut_node,
                            ply + 1,
                            &mut local_pv,
                        );
                    }
                    self.pos.undo_move(mv);

                    if self.stopped() {
                        return Score::DRAW;
                    }

                    if value >= probcut_beta {
                        self.shared.tt.save(
                            key,
                            value.to_tt(ply),
                            tt_pv,
                            Bound::Lower,
                            depth - 3,
                            mv,
                            raw_eval,
                        );
                        return value - (probcut_beta - beta);
                    }
                }
            }
        }

        // Step 12. Internal iterative reduction when no hash move exists.
        if tt_move == Move::NONE && (pv_node || (cut_node && depth >= 8)) {
            depth -= 2;
            if depth <= 0 {
                return self.qsearch(pv_node, alpha, beta, DEPTH_QS_CHECKS, ply, pv);
            }
        }

        // Step 13. The move loop.
        let killers = self.frame(ply).killers;
        let counter = {
            let prev = self.frame(ply - 1).current_move;
            if prev.is_ok() {
                self.pos
                    .piece_at(prev.to())
                    .map_or(Move::NONE, |p| self.histories.counter_moves.get(p, prev.to()))
            } else {
                Move::NONE
            }
        };
        let cont_planes = [
            self.frame(ply - 1).cont,
            self.frame(ply - 2).cont,
            self.frame(ply - 4).cont,
        ];

        let mut picker = MovePicker::new(&self.pos, tt_move, depth, killers, counter, cont_planes);

        let mut best_value = -Score::INFINITE;
        let mut best_move = Move::NONE;
        let mut move_count = 0;
        let mut skip_quiets = false;
        let mut quiets_tried: ArrayVec<Move, 64> = ArrayVec::new();
        let mut captures_tried: ArrayVec<Move, 32> = ArrayVec::new();

        while let Some(mv) = {
            let skip = skip_quiets;
            picker.next(&self.pos, &self.histories, skip)
        } {
            if mv == excluded {
                continue;
            }

            // At the root only the moves of the current MultiPV slice count.
            if root_node && !self.root_moves[self.pv_idx..].iter().any(|rm| rm.mv == mv) {
                continue;
            }

            if !root_node && !self.pos.legal(mv) {
                continue;
            }

            move_count += 1;
            self.frame_mut(ply).move_count = move_count;

            let capture_stage = self.pos.is_capture_stage(mv);
            let gives_check = self.pos.gives_check(mv);
            let piece = self.pos.moved_piece(mv).unwrap();

            let mut new_depth = depth - 1;
            let delta = beta - alpha;
            let r = reduction(improving, depth, move_count, delta, self.root_delta);
            let lmr_depth = new_depth - r;

            // Step 13a. Shallow-depth pruning, once one line is known to not lose.
            if !root_node && self.pos.non_pawn_material(us) > 0 && best_value > -Score::KNOWN_WIN {
                if move_count >= futility_move_count(improving, depth) {
                    skip_quiets = true;
                }

                if capture_stage || gives_check {
                    // Futility for losing captures at shallow depth.
                    if !gives_check
                        && lmr_depth < 7
                        && !in_check
                        && static_eval
                            + tune::capture_futility_base!()
                            + tune::capture_futility_mult!() * lmr_depth
                            + captured_value(&self.pos, mv)
                            <= alpha
                    {
                        continue;
                    }

                    if !self.pos.see_ge(mv, -tune::see_capture_mult!() * depth) {
                        continue;
                    }
                } else {
                    let cont_hist = cont_planes
                        .iter()
                        .flatten()
                        .map(|c| self.histories.continuation.get(c, piece, mv.to()))
                        .sum::<i32>();

                    // Quiets with terrible continuation history go.
                    if lmr_depth < 6 && cont_hist < -tune::cont_history_prune_mult!() * depth {
                        continue;
                    }

                    // Parent futility on the reduced depth.
                    if !in_check
                        && lmr_depth < 13
                        && static_eval + 103 + 136 * lmr_depth <= alpha
                    {
                        continue;
                    }

                    if !self
                        .pos
                        .see_ge(mv, -tune::see_quiet_mult!() * lmr_depth * lmr_depth)
                    {
                        continue;
                    }
                }
            }

            // Step 13b. Extensions.
            let mut extension = 0;
            if !root_node
                && mv == tt_move
                && excluded == Move::NONE
                && depth >= tune::min_singular_depth!()
                && tt_value != Score::NONE
                && !tt_value.is_mate()
                && tt_entry.is_some_and(|e| {
                    matches!(e.bound, Bound::Lower | Bound::Exact) && e.depth >= depth - 3
                })
                && ply < 2 * self.root_depth
            {
                // Singular extension: is the hash move forced? Search the
                // siblings below its score with the move itself excluded.
                let singular_beta =
                    tt_value - Score::new((64 + 57 * i32::from(tt_pv && !pv_node)) * depth / 64);
                let singular_depth = (depth - 1) / 2;

                self.frame_mut(ply).excluded = mv;
                let value = self.search(
                    NodeKind::NonPv,
                    singular_beta - 1,
                    singular_beta,
                    singular_depth,
                    cut_node,
                    ply,
                    &mut local_pv,
                );
                self.frame_mut(ply).excluded = Move::NONE;

                if value < singular_beta {
                    extension = 1;
                    let doubles = self.frame(ply).double_extensions;
                    if !pv_node
                        && value < singular_beta - tune::double_extension_margin!()
                        && doubles <= tune::max_double_extensions!()
                    {
                        extension = 2;
                    }
                } else if singular_beta >= beta {
                    // Multi-cut: even without the hash move this node fails high.
                    return singular_beta;
                } else if tt_value >= beta {
                    extension = -2 + i32::from(pv_node);
                } else if cut_node {
                    extension = -1;
                }
            } else if gives_check && depth > 9 {
                extension = 1;
            } else if mv == tt_move
                && !capture_stage
                && mv == killers[0]
                && cont_planes[0]
                    .as_ref()
                    .map_or(0, |c| self.histories.continuation.get(c, piece, mv.to()))
                    >= 4000
            {
                // A killer that keeps proving itself deserves a full look.
                extension = 1;
            } else if pv_node && capture_stage && {
                let prev = self.frame(ply - 1).current_move;
                prev.is_ok() && prev.to() == mv.to()
            } {
                extension = 1;
            }

            new_depth += extension;
            self.frame_mut(ply).double_extensions =
                self.frame(ply - 1).double_extensions + i32::from(extension >= 2);

            // Step 13c. Make the move.
            self.make_move(ply, mv, gives_check);

            let mut value;

            // Step 13d. Late-move reductions.
            if depth >= 2 && move_count > 1 + i32::from(root_node) && (!tt_pv || !capture_stage) {
                let mut r = r;

                if tt_pv && !(tt_hit && tt_value <= alpha) {
                    r -= 1;
                }
                r += 2 * i32::from(cut_node);
                r += i32::from(tt_capture);
                r -= i32::from(pv_node);
                r -= i32::from(extension >= 2);
                r += i32::from(self.frame(ply + 1).cutoff_count > 3);

                let stat_score = self.histories.main.get(us, mv)
                    + cont_planes
                        .iter()
                        .flatten()
                        .map(|c| self.histories.continuation.get(c, piece, mv.to()))
                        .sum::<i32>();
                self.frame_mut(ply).stat_score = stat_score;
                r -= stat_score / tune::stat_score_divisor!();

                let d = (new_depth - r).clamp(1, new_depth + 1);
                value = -self.search(
                    NodeKind::NonPv,
                    -(alpha + 1),
                    -alpha,
                    d,
                    true,
                    ply + 1,
                    &mut local_pv,
                );

                if value > alpha && d < new_depth {
                    // The reduced search beat alpha: confirm at full depth,
                    // stretching or shrinking it by how decisive the result was.
                    if value > best_value + 50 + 2 * new_depth {
                        new_depth += 1;
                    } else if value < best_value + new_depth {
                        new_depth -= 1;
                    }

                    if d < new_depth {
                        value = -self.search(
                            NodeKind::NonPv,
                            -(alpha + 1),
                            -alpha,
                            new_depth,
                            !cut_node,
                            ply + 1,
                            &mut local_pv,
                        );
                    }

                    // Teach the continuation planes what the re-search found.
                    if !capture_stage {
                        let bonus = if value > alpha {
                            stat_bonus(new_depth)
                        } else {
                            -stat_bonus(new_depth)
                        };
                        self.update_continuation_histories(ply, piece, mv.to(), bonus);
                    }
                }
            } else if !pv_node || move_count > 1 {
                value = -self.search(
                    NodeKind::NonPv,
                    -(alpha + 1),
                    -alpha,
                    new_depth,
                    !cut_node,
                    ply + 1,
                    &mut local_pv,
                );
            } else {
                value = alpha; // placeholder; the PV search below always runs
            }

            // Step 13e. Full-window search for the first move of a PV node
            // and for any later move that improves alpha.
            if pv_node && (move_count == 1 || (value > alpha && (root_node || value < beta))) {
                value = -self.search(
                    NodeKind::Pv,
                    -beta,
                    -alpha,
                    new_depth,
                    false,
                    ply + 1,
                    &mut local_pv,
                );
            }

            self.pos.undo_move(mv);

            // Step 13f. An aborted search leaves a junk value; bail out
            // without touching the table.
            if self.stopped() {
                return Score::DRAW;
            }

            // Step 13g. Bookkeeping at the root.
            if root_node {
                let rm = self
                    .root_moves
                    .iter_mut()
                    .find(|rm| rm.mv == mv)
                    .expect("searched root move must be in the root list");

                rm.average_score = if rm.average_score == -Score::INFINITE {
                    value
                } else {
                    Score::new((rm.average_score.value() + value.value()) / 2)
                };

                if move_count == 1 || value > alpha {
                    rm.score = value;
                    rm.sel_depth = self.sel_depth;
                    rm.pv.clear();
                    rm.pv.push(mv);
                    rm.pv.extend(local_pv.moves().iter().copied());

                    if move_count > 1 && self.is_main() {
                        self.best_move_changes += 1.0;
                    }
                } else {
                    rm.score = -Score::INFINITE;
                }
            }

            if value > best_value {
                best_value = value;

                if value > alpha {
                    best_move = mv;

                    if pv_node && !root_node {
                        pv.load(mv, &local_pv);
                    }

                    if value >= beta {
                        self.frame_mut(ply).cutoff_count += 1 + i32::from(tt_move == Move::NONE);
                        break;
                    }
                    alpha = value;
                }
            }

            if mv != best_move {
                if capture_stage {
                    let _ = captures_tried.try_push(mv);
                } else {
                    let _ = quiets_tried.try_push(mv);
                }
            }
        }

        // Step 14. Checkmate, stalemate, or a fully-excluded singular search.
        if move_count == 0 {
            return if excluded != Move::NONE {
                alpha
            } else if in_check {
                Score::mated_in(ply)
            } else {
                Score::DRAW
            };
        }

        // Step 15. Reward the cause of a beta cutoff, punish the also-rans.
        if best_move != Move::NONE {
            let bonus = if best_value > beta + tune::good_cutoff_margin!() {
                stat_bonus(depth + 1)
            } else {
                stat_bonus(depth)
            };

            if !self.pos.is_capture_stage(best_move) {
                self.update_quiet_stats(ply, best_move, bonus);

                for &quiet in &quiets_tried {
                    let qp = self.pos.moved_piece(quiet).unwrap();
                    self.histories.main.update(us, quiet, -bonus);
                    self.histories
                        .pawn
                        .update(self.pos.pawn_key(), qp, quiet.to(), -bonus);
                    self.update_continuation_histories(ply, qp, quiet.to(), -bonus);
                }
            } else {
                let piece = self.pos.moved_piece(best_move).unwrap();
                let captured = captured_kind_of(&self.pos, best_move);
                self.histories
                    .capture
                    .update(piece, best_move.to(), captured, bonus);
            }

            for &capture in &captures_tried {
                let piece = self.pos.moved_piece(capture).unwrap();
                let captured = captured_kind_of(&self.pos, capture);
                self.histories
                    .capture
                    .update(piece, capture.to(), captured, -bonus);
            }
        }

        // Absorb the eval residual into the correction history.
        if !in_check
            && excluded == Move::NONE
            && !best_value.is_mate()
            && (best_move == Move::NONE || !self.pos.is_capture(best_move))
            && !(best_value >= beta && best_value <= static_eval)
            && !(best_move == Move::NONE && best_value >= static_eval)
            && static_eval != Score::NONE
        {
            self.histories.correction.update(
                us,
                self.pos.pawn_key(),
                (best_value - static_eval).value(),
                depth,
            );
        }

        // Step 16. Store the result.
        if excluded == Move::NONE && !(root_node && self.pv_idx > 0) {
            let bound = if best_value >= beta {
                Bound::Lower
            } else if pv_node && best_move != Move::NONE {
                Bound::Exact
            } else {
                Bound::Upper
            };
            self.shared
                .tt
                .save(key, best_value.to_tt(ply), tt_pv, bound, depth, best_move, raw_eval);
        }

        best_value
    }

    /// Quiescence search: tactical moves only, bounded by the stand-pat.
    fn qsearch(
        &mut self,
        pv_node: bool,
        mut alpha: Score,
        beta: Score,
        depth: i32,
        ply: i32,
        pv: &mut PrincipalVariation,
    ) -> Score {
        debug_assert!(depth <= DEPTH_QS_CHECKS);

        self.check_time();

        let mut local_pv = PrincipalVariation::default();
        if pv_node {
            pv.clear();
        }

        let in_check = self.pos.in_check();

        if self.stopped() || ply >= MAX_PLY {
            return if ply >= MAX_PLY && !in_check {
                eval::evaluate(&self.pos)
            } else {
                self.draw_score()
            };
        }
        if self.pos.is_draw(ply) {
            return self.draw_score();
        }

        // All quiescence nodes share two depth buckets in the table: with
        // and without quiet checks.
        let tt_depth = if in_check || depth >= DEPTH_QS_CHECKS {
            DEPTH_QS_CHECKS
        } else {
            DEPTH_QS_NO_CHECKS
        };

        let key = self.pos.key();
        let tt_entry = self.shared.tt.probe(key);
        let tt_hit = tt_entry.is_some();
        let tt_value = tt_entry.map_or(Score::NONE, |e| e.value.from_tt(ply, self.pos.rule50()));
        let tt_move = tt_entry.map_or(Move::NONE, |e| e.mv);
        let tt_pv = tt_entry.is_some_and(|e| e.pv);

        if !pv_node
            && tt_value != Score::NONE
            && tt_entry.is_some_and(|e| {
                e.depth >= tt_depth
                    && match e.bound {
                        Bound::Exact => true,
                        Bound::Lower => tt_value >= beta,
                        Bound::Upper => tt_value <= alpha,
                        Bound::None => false,
                    }
            })
        {
            return tt_value;
        }

        let us = self.pos.side_to_move();
        let raw_eval;
        let mut best_value;
        let mut futility_base;

        if in_check {
            raw_eval = Score::NONE;
            best_value = -Score::INFINITE;
            futility_base = -Score::INFINITE;
        } else {
            raw_eval = match tt_entry {
                Some(e) if e.eval != Score::NONE => e.eval,
                _ => eval::evaluate(&self.pos),
            };
            best_value = (raw_eval
                + self
                    .histories
                    .correction
                    .correction(us, self.pos.pawn_key()))
            .clamp(-Score::KNOWN_WIN + 1, Score::KNOWN_WIN - 1);

            // Stand pat: doing nothing is already good enough.
            if best_value >= beta {
                if !best_value.is_known_win() && !beta.is_known_win() {
                    best_value = Score::new((3 * best_value.value() + beta.value()) / 4);
                }
                if !tt_hit {
                    self.shared.tt.save(
                        key,
                        best_value.to_tt(ply),
                        false,
                        Bound::Lower,
                        DEPTH_NONE,
                        Move::NONE,
                        raw_eval,
                    );
                }
                return best_value;
            }
            if best_value > alpha {
                alpha = best_value;
            }

            futility_base = best_value + tune::qsearch_futility_margin!();
        }

        let recapture_sq = {
            let prev = self.frame(ply - 1).current_move;
            if prev.is_ok() {
                prev.to()
            } else {
                Square::A1
            }
        };
        let mut picker = MovePicker::new_qsearch(&self.pos, tt_move, depth, recapture_sq);

        let mut best_move = Move::NONE;
        let mut move_count = 0;
        let mut quiet_check_evasions = 0;

        while let Some(mv) = picker.next(&self.pos, &self.histories, false) {
            if !self.pos.legal(mv) {
                continue;
            }

            move_count += 1;
            let capture = self.pos.is_capture(mv);
            let gives_check = self.pos.gives_check(mv);

            // Futility: the best this capture can deliver still loses to
            // alpha. Recaptures on the previous destination are exempt.
            if !in_check
                && !gives_check
                && mv.to() != recapture_sq
                && futility_base > -Score::KNOWN_WIN
                && !mv.is_promotion()
            {
                if move_count > 2 {
                    continue;
                }

                let futility_value = futility_base + captured_value(&self.pos, mv);
                if futility_value <= alpha {
                    best_value = best_value.max(futility_value);
                    continue;
                }
                if futility_base <= alpha && !self.pos.see_ge(mv, 1) {
                    best_value = best_value.max(futility_base);
                    continue;
                }
            }

            // Two quiet ways out of check are plenty; further ones explode
            // the tree without changing the verdict.
            if quiet_check_evasions > 1 {
                break;
            }
            quiet_check_evasions += i32::from(in_check && !capture);

            // Losing captures do not save a quiescent position.
            if !in_check && !self.pos.see_ge(mv, 0) {
                continue;
            }

            self.make_move(ply, mv, gives_check);
            let value = -self.qsearch(pv_node, -beta, -alpha, depth - 1, ply + 1, &mut local_pv);
            self.pos.undo_move(mv);

            if self.stopped() {
                return Score::DRAW;
            }

            if value > best_value {
                best_value = value;

                if value > alpha {
                    best_move = mv;
                    if pv_node {
                        pv.load(mv, &local_pv);
                    }
                    if value >= beta {
                        break;
                    }
                    alpha = value;
                }
            }
        }

        // With every evasion refuted, the checkers deliver mate.
        if in_check && best_value == -Score::INFINITE {
            debug_assert!(move_count == 0);
            return Score::mated_in(ply);
        }

        let bound = if best_value >= beta {
            Bound::Lower
        } else {
            Bound::Upper
        };
        self.shared.tt.save(
            key,
            best_value.to_tt(ply),
            tt_pv,
            bound,
            tt_depth,
            best_move,
            raw_eval,
        );

        best_value
    }

    /// Applies `mv`, recording the frame fields later plies will read.
    #[inline(always)]
    fn make_move(&mut self, ply: i32, mv: Move, gives_check: bool) {
        let piece = self.pos.moved_piece(mv).unwrap();
        let cont = ContIndex {
            in_check: self.pos.in_check(),
            capture: self.pos.is_capture_stage(mv),
            piece,
            to: mv.to(),
        };
        let frame = self.frame_mut(ply);
        frame.current_move = mv;
        frame.cont = Some(cont);

        // Let a cache-backed evaluator warm itself from the parent.
        eval::hint_parent(&self.pos);

        self.pos.do_move(mv, gives_check);
        self.count_node();
    }

    /// Rewards a quiet move that caused (or would cause) a beta cutoff:
    /// butterfly, pawn-structure, and continuation bonuses, killer slot,
    /// and the parent's counter-move.
    fn update_quiet_stats(&mut self, ply: i32, mv: Move, bonus: i32) {
        let us = self.pos.side_to_move();
        let piece = self.pos.moved_piece(mv).unwrap();

        self.histories.main.update(us, mv, bonus);
        self.histories
            .pawn
            .update(self.pos.pawn_key(), piece, mv.to(), bonus);
        self.update_continuation_histories(ply, piece, mv.to(), bonus);

        let killers = &mut self.frame_mut(ply).killers;
        if killers[0] != mv {
            killers[1] = killers[0];
            killers[0] = mv;
        }

        let prev = self.frame(ply - 1).current_move;
        if prev.is_ok() {
            if let Some(prev_piece) = self.pos.piece_at(prev.to()) {
                self.histories.counter_moves.set(prev_piece, prev.to(), mv);
            }
        }
    }

    /// Feeds `bonus` into the continuation planes 1, 2, 3, 4, and 6 plies
    /// back; in check only the immediate planes are touched.
    fn update_continuation_histories(&mut self, ply: i32, piece: crate::Piece, to: Square, bonus: i32) {
        let in_check = self.frame(ply).in_check;
        for back in [1, 2, 3, 4, 6] {
            if in_check && back > 2 {
                break;
            }
            if ply - back < -1 {
                break;
            }
            if let Some(cont) = self.frame(ply - back).cont {
                self.histories.continuation.update(&cont, piece, to, bonus);
            }
        }
    }
}

/// Depth-scaled history bonus, capped.
#[inline(always)]
fn stat_bonus(depth: i32) -> i32 {
    (tune::history_bonus_mult!() * depth - tune::history_bonus_offset!())
        .clamp(0, tune::history_bonus_max!())
}

/// Move-count threshold beyond which quiets are no longer tried.
#[inline(always)]
fn futility_move_count(improving: bool, depth: i32) -> i32 {
    (3 + depth * depth) / (2 - i32::from(improving))
}

/// Base late-move reduction from the log-log table, adjusted by how wide the
/// current and root windows are.
#[inline(always)]
fn reduction(improving: bool, depth: i32, move_count: i32, delta: Score, root_delta: Score) -> i32 {
    let scale = REDUCTIONS[depth.clamp(0, 255) as usize]
        * REDUCTIONS[move_count.clamp(0, 255) as usize];
    (scale + 1372 - delta.value() * 1073 / root_delta.value().max(1)) / 1024
        + i32::from(!improving && scale > 791)
}

/// Material delivered to the destination square of a capture-stage move.
#[inline(always)]
fn captured_value(pos: &Position, mv: Move) -> i32 {
    if mv.is_en_passant() {
        PieceKind::Pawn.value()
    } else {
        pos.piece_at(mv.to()).map_or(0, |p| p.value())
    }
}

/// The captured kind for capture-history indexing.
#[inline(always)]
fn captured_kind_of(pos: &Position, mv: Move) -> PieceKind {
    if mv.is_en_passant() {
        PieceKind::Pawn
    } else {
        pos.piece_at(mv.to()).map_or(PieceKind::Pawn, |p| p.kind())
    }
}
