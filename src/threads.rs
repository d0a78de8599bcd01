/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The worker pool: lazy SMP over a shared transposition table.
//!
//! Each worker runs an independent iterative-deepening loop on its own
//! position copy and history tables; divergence comes for free from history
//! and hash-table races. One atomic stop flag gates them all, and a vote
//! over (completed depth, score) picks the answer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use uci_parser::UciResponse;

use crate::{
    legal_moves, Limits, Move, Position, RootMove, Score, TbConfig, TimeManager,
    TranspositionTable, Worker, XoShiRo,
};

/// Everything a search shares between its workers.
pub struct SharedContext {
    pub tt: Arc<TranspositionTable>,
    pub tb: TbConfig,
    pub stop: AtomicBool,
    pub ponder: AtomicBool,
    pub nodes: Vec<AtomicU64>,
    pub tb_hits: Vec<AtomicU64>,
    pub limits: Limits,
    pub time: TimeManager,
    pub chess960: bool,
    pub multipv: usize,
}

impl SharedContext {
    /// A placeholder context for workers that have not searched yet.
    pub fn idle(tt: Arc<TranspositionTable>) -> Self {
        let limits = Limits::default();
        let time = TimeManager::new(&limits, crate::Color::White, 0);
        Self {
            tt,
            tb: TbConfig::default(),
            stop: AtomicBool::new(true),
            ponder: AtomicBool::new(false),
            nodes: Vec::new(),
            tb_hits: Vec::new(),
            limits,
            time,
            chess960: false,
            multipv: 1,
        }
    }

    /// Sum of the per-worker node counters.
    #[inline(always)]
    pub fn total_nodes(&self) -> u64 {
        self.nodes.iter().map(|n| n.load(Ordering::Relaxed)).sum()
    }

    /// Sum of the per-worker tablebase-hit counters.
    #[inline(always)]
    pub fn total_tb_hits(&self) -> u64 {
        self.tb_hits.iter().map(|n| n.load(Ordering::Relaxed)).sum()
    }
}

/// Per-search configuration the engine hands to [`ThreadPool::start_thinking`].
#[derive(Clone, Debug)]
pub struct SearchOptions {
    pub multipv: usize,
    pub skill_level: Option<i32>,
    pub chess960: bool,
    pub tb: TbConfig,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            multipv: 1,
            skill_level: None,
            chess960: false,
            tb: TbConfig::default(),
        }
    }
}

/// The pool of persistent search workers.
pub struct ThreadPool {
    workers: Vec<Arc<Mutex<Worker>>>,
    tt: Arc<TranspositionTable>,
    tt_size_mb: usize,
    shared: Arc<SharedContext>,
    coordinator: Option<JoinHandle<()>>,
    searching: Arc<AtomicBool>,
}

impl ThreadPool {
    /// Builds a pool of `threads` workers sharing a `tt_mb`-megabyte table.
    pub fn new(threads: usize, tt_mb: usize) -> Self {
        let tt = Arc::new(TranspositionTable::new(tt_mb));
        let shared = Arc::new(SharedContext::idle(Arc::clone(&tt)));

        let mut pool = Self {
            workers: Vec::new(),
            tt,
            tt_size_mb: tt_mb,
            shared,
            coordinator: None,
            searching: Arc::new(AtomicBool::new(false)),
        };
        pool.set_thread_count(threads);
        pool
    }

    /// Rebuilds the worker set; takes effect immediately (call between searches).
    pub fn set_thread_count(&mut self, threads: usize) {
        self.wait();
        let threads = threads.max(1);
        self.workers = (0..threads)
            .map(|id| Arc::new(Mutex::new(Worker::new(id, Arc::clone(&self.shared)))))
            .collect();
    }

    /// Number of workers.
    #[inline(always)]
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Replaces the transposition table with a fresh one of `mb` megabytes.
    pub fn resize_tt(&mut self, mb: usize) {
        self.wait();
        self.tt = Arc::new(TranspositionTable::new(mb));
        self.tt_size_mb = mb;
    }

    /// Clears the table and every worker's memory of previous games.
    pub fn new_game(&mut self) {
        self.wait();
        match Arc::get_mut(&mut self.tt) {
            Some(tt) => tt.clear(),
            None => self.tt = Arc::new(TranspositionTable::new(self.tt_size_mb)),
        }
        for worker in &self.workers {
            worker.lock().unwrap().clear();
        }
    }

    /// Returns `true` while a search is in flight.
    #[inline(always)]
    pub fn is_searching(&self) -> bool {
        self.searching.load(Ordering::Relaxed)
    }

    /// Raises the stop flag; workers return at their next poll.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Relaxed);
    }

    /// Leaves ponder mode; the clock now counts against the budget.
    pub fn ponderhit(&self) {
        self.shared.ponder.store(false, Ordering::Relaxed);
    }

    /// Blocks until the current search (if any) has fully wound down.
    pub fn wait(&mut self) {
        self.stop();
        if let Some(handle) = self.coordinator.take() {
            let _ = handle.join();
        }
    }

    /// Waits for the search to end and reports how many nodes it visited.
    pub fn wait_for_nodes(&mut self) -> u64 {
        self.wait();
        self.shared.total_nodes()
    }

    /// Runs a search to completion and returns the winning worker's best
    /// move and score. `go` itself is asynchronous; this wrapper exists for
    /// the benchmark and for tests.
    pub fn search_sync(
        &mut self,
        pos: &Position,
        limits: Limits,
        options: SearchOptions,
    ) -> Option<(Move, Score)> {
        self.start_thinking(pos, limits, options);
        self.wait();

        let idx = best_thread(&self.workers)?;
        let worker = self.workers[idx].lock().unwrap();
        let rm = worker.root_moves.first()?;
        Some((rm.mv, best_score(rm)))
    }

    /// Entry capacity of the shared transposition table.
    pub fn tt_capacity(&self) -> usize {
        self.tt.capacity()
    }

    /// Sampled permill occupancy of the shared transposition table.
    pub fn tt_hashfull(&self) -> usize {
        self.tt.hashfull()
    }

    /// Copies the root position into every worker and sets them searching.
    ///
    /// Returns immediately; the final `bestmove` is printed by the
    /// coordinator thread once the pool agrees the search is over.
    pub fn start_thinking(&mut self, pos: &Position, limits: Limits, options: SearchOptions) {
        self.wait();

        let root_moves: Vec<RootMove> = legal_moves(pos)
            .into_iter()
            .filter(|mv| {
                limits.searchmoves.is_empty() || limits.searchmoves.contains(mv)
            })
            .map(RootMove::new)
            .collect();

        // Nothing to search: answer immediately, per protocol.
        if root_moves.is_empty() {
            println!(
                "{}",
                UciResponse::BestMove {
                    bestmove: Some("0000".to_string()),
                    ponder: None,
                }
            );
            return;
        }

        // Skill-limited play picks among several lines, so it needs them.
        let multipv = match options.skill_level {
            Some(_) => options.multipv.max(4),
            None => options.multipv,
        }
        .min(root_moves.len());

        let threads = self.workers.len();
        let time = TimeManager::new(&limits, pos.side_to_move(), pos.game_ply());
        let shared = Arc::new(SharedContext {
            tt: Arc::clone(&self.tt),
            tb: options.tb.clone(),
            stop: AtomicBool::new(false),
            ponder: AtomicBool::new(limits.ponder),
            nodes: (0..threads).map(|_| AtomicU64::new(0)).collect(),
            tb_hits: (0..threads).map(|_| AtomicU64::new(0)).collect(),
            limits,
            time,
            chess960: options.chess960,
            multipv,
        });
        self.shared = Arc::clone(&shared);
        self.tt.new_search();

        for worker in &self.workers {
            let mut worker = worker.lock().unwrap();
            worker.shared = Arc::clone(&shared);
            worker.pos = pos.clone();
            worker.root_moves = root_moves.clone();
        }

        self.searching.store(true, Ordering::Relaxed);
        let workers = self.workers.clone();
        let searching = Arc::clone(&self.searching);
        let skill_level = options.skill_level;

        self.coordinator = Some(std::thread::spawn(move || {
            // Helpers first, then the main worker on this thread.
            let helpers: Vec<_> = workers[1..]
                .iter()
                .map(|worker| {
                    let worker = Arc::clone(worker);
                    std::thread::spawn(move || {
                        worker.lock().unwrap().iterative_deepening();
                    })
                })
                .collect();

            workers[0].lock().unwrap().iterative_deepening();

            // In ponder or infinite mode the protocol owns the end of the
            // search: spin until `stop` (or ponderhit followed by a stop).
            while !shared.stop.load(Ordering::Relaxed)
                && (shared.limits.infinite || shared.ponder.load(Ordering::Relaxed))
            {
                std::thread::yield_now();
            }

            shared.stop.store(true, Ordering::Relaxed);
            for helper in helpers {
                let _ = helper.join();
            }

            finalize(&workers, &shared, skill_level);
            searching.store(false, Ordering::Relaxed);
        }));
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.wait();
    }
}

/// Votes for the worker holding the most trustworthy result: lexicographic
/// (completed depth, score), so helpers only outrank the main worker by
/// actually finishing deeper with a better line.
fn best_thread(workers: &[Arc<Mutex<Worker>>]) -> Option<usize> {
    let mut best = None;
    let mut best_rank = (-1, -Score::INFINITE);

    for (i, worker) in workers.iter().enumerate() {
        let worker = worker.lock().unwrap();
        let Some(rm) = worker.root_moves.first() else {
            continue;
        };
        let rank = (worker.completed_depth, best_score(rm));
        if rank > best_rank {
            best_rank = rank;
            best = Some(i);
        }
    }

    best
}

/// Applies any skill handicap to the winning worker's lines and prints
/// `bestmove` (plus a ponder move when the PV provides one).
fn finalize(
    workers: &[Arc<Mutex<Worker>>],
    shared: &SharedContext,
    skill_level: Option<i32>,
) {
    let Some(best_idx) = best_thread(workers) else {
        return;
    };

    let best_worker = workers[best_idx].lock().unwrap();
    let chosen = match skill_level {
        Some(level) => pick_with_skill(level, &best_worker.root_moves, shared),
        None => best_worker.root_moves[0].mv,
    };

    let ponder = best_worker
        .root_moves
        .iter()
        .find(|rm| rm.mv == chosen)
        .and_then(|rm| rm.pv.get(1))
        .map(|mv| mv.to_uci(shared.chess960));

    println!(
        "{}",
        UciResponse::BestMove {
            bestmove: Some(chosen.to_uci(shared.chess960)),
            ponder,
        }
    );
}

#[inline(always)]
fn best_score(rm: &RootMove) -> Score {
    if rm.score == -Score::INFINITE {
        rm.previous_score
    } else {
        rm.score
    }
}

/// Stochastic move choice simulating weaker play: each candidate's score is
/// perturbed in proportion to its deficit and the configured weakness, and
/// the best perturbed line is played.
fn pick_with_skill(level: i32, root_moves: &[RootMove], shared: &SharedContext) -> Move {
    let candidates = shared.multipv.min(root_moves.len());
    if candidates <= 1 {
        return root_moves[0].mv;
    }

    let top = best_score(&root_moves[0]).value();
    let spread = (top - best_score(&root_moves[candidates - 1]).value()).min(200);
    let weakness = 120 - 2 * level.clamp(0, 20);

    let mut rng = XoShiRo::from_seeds([
        shared.total_nodes() | 1,
        0x9e37_79b9_7f4a_7c15,
        top.unsigned_abs() as u64 + 1,
        0xbf58_476d_1ce4_e5b9,
    ]);

    let mut best = root_moves[0].mv;
    let mut max_score = -Score::INFINITE.value();
    for rm in &root_moves[..candidates] {
        let score = best_score(rm).value();
        let push = (weakness * (top - score)
            + spread * (rng.next_below(weakness.max(1) as u64) as i32))
            / 128;
        if score + push >= max_score {
            max_score = score + push;
            best = rm.mv;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn search_blocking(pool: &mut ThreadPool, pos: &Position, limits: Limits) -> Move {
        pool.start_thinking(pos, limits, SearchOptions::default());
        // The coordinator prints bestmove; for tests we just join and read
        // the main worker's verdict.
        pool.wait();
        let worker = pool.workers[0].lock().unwrap();
        worker.root_moves[0].mv
    }

    #[test]
    fn test_finds_obvious_capture() {
        let mut pool = ThreadPool::new(1, 4);
        let pos = Position::from_fen("3q1n2/4P3/8/8/8/8/k7/7K w - - 0 1", false).unwrap();
        let limits = Limits {
            depth: Some(3),
            ..Limits::default()
        };

        let best = search_blocking(&mut pool, &pos, limits);
        assert_eq!(best.to_uci(false), "e7d8q", "pawn should capture and promote");
    }

    #[test]
    fn test_mate_in_one_is_found() {
        let mut pool = ThreadPool::new(1, 4);
        let pos = Position::from_fen("k7/8/KQ6/8/8/8/8/8 w - - 0 1", false).unwrap();
        let limits = Limits {
            depth: Some(4),
            ..Limits::default()
        };

        pool.start_thinking(&pos, limits, SearchOptions::default());
        pool.wait();
        let worker = pool.workers[0].lock().unwrap();
        assert!(
            worker.root_moves[0].score.is_mate(),
            "search must see the mate, got {:?}",
            worker.root_moves[0].score
        );
    }

    #[test]
    fn test_stop_flag_aborts_promptly() {
        let mut pool = ThreadPool::new(2, 4);
        let pos = Position::default();

        pool.start_thinking(&pos, Limits::default(), SearchOptions::default());
        assert!(pool.is_searching());

        std::thread::sleep(Duration::from_millis(50));
        let begin = std::time::Instant::now();
        pool.wait();
        assert!(
            begin.elapsed() < Duration::from_secs(2),
            "stop must abort an infinite search quickly"
        );
        assert!(!pool.is_searching());
    }

    #[test]
    fn test_node_limit_is_respected() {
        let mut pool = ThreadPool::new(1, 4);
        let pos = Position::default();
        let limits = Limits {
            nodes: Some(20_000),
            ..Limits::default()
        };

        pool.start_thinking(&pos, limits, SearchOptions::default());
        pool.wait();
        let nodes = pool.shared.total_nodes();
        assert!(
            nodes < 200_000,
            "search of 20k nodes used {nodes} nodes before stopping"
        );
    }
}
