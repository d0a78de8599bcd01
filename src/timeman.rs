/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::time::{Duration, Instant};

use crate::{Color, Limits};

/// Converts the clock situation into an optimum and a maximum time budget.
///
/// The optimum is what a well-paced move should take; the searcher scales it
/// by stability factors and stops between iterations once it is spent. The
/// maximum is a hard wall consulted inside the search loop.
#[derive(Clone, Copy, Debug)]
pub struct TimeManager {
    start: Instant,
    optimum: Duration,
    maximum: Duration,

    /// False for fixed-depth/nodes/infinite searches: the clock never stops us.
    use_time: bool,
}

/// Plan at most this many moves ahead when no movestogo is given.
const MOVE_HORIZON: i64 = 50;

impl TimeManager {
    /// Plans the budgets for a search starting now.
    pub fn new(limits: &Limits, us: Color, game_ply: i32) -> Self {
        let start = limits.start_time;
        let overhead_ms = limits.move_overhead.as_millis() as i64;

        // Fixed move time bypasses the allocation entirely.
        if let Some(movetime) = limits.movetime {
            let budget = movetime.saturating_sub(limits.move_overhead);
            return Self {
                start,
                optimum: budget,
                maximum: budget,
                use_time: true,
            };
        }

        let Some(time) = limits.time[us.index()] else {
            // Depth, node, mate, or infinite limits: no clock.
            return Self {
                start,
                optimum: Duration::MAX,
                maximum: Duration::MAX,
                use_time: false,
            };
        };

        let time_ms = time.as_millis() as i64;
        let inc_ms = limits.inc[us.index()].map_or(0, |d| d.as_millis() as i64);
        let mtg = limits
            .movestogo
            .map_or(MOVE_HORIZON, |n| i64::from(n).min(MOVE_HORIZON));

        // What we can spend over the planning horizon, less overhead.
        let time_left = (time_ms + inc_ms * (mtg - 1) - overhead_ms * (2 + mtg)).max(1) as f64;
        let ply = f64::from(game_ply);

        let (opt_scale, max_scale) = if limits.movestogo.is_none() {
            // Sudden death or increment: spend more as the game goes on.
            let opt = (0.0084 + (ply + 3.0).sqrt() * 0.0042)
                .min(0.21 * time_ms as f64 / time_left);
            let max = (4.0 + ply / 12.0).min(7.0);
            (opt, max)
        } else {
            // x moves in y minutes: spread the budget over the cycle.
            let opt = ((0.88 + ply / 116.4) / mtg as f64)
                .min(0.88 * time_ms as f64 / time_left);
            let max = (1.5 + 0.11 * mtg as f64).min(6.3);
            (opt, max)
        };

        let optimum_ms = (opt_scale * time_left).max(1.0) as u64;
        let maximum_ms = (((time_ms as f64 * 0.8 - overhead_ms as f64).max(1.0)) as u64)
            .min((max_scale * optimum_ms as f64) as u64)
            .max(1);

        Self {
            start,
            optimum: Duration::from_millis(optimum_ms),
            maximum: Duration::from_millis(maximum_ms),
            use_time: true,
        }
    }

    /// Time spent since the search began.
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// The well-paced budget for this move.
    #[inline(always)]
    pub fn optimum(&self) -> Duration {
        self.optimum
    }

    /// The hard budget for this move.
    #[inline(always)]
    pub fn maximum(&self) -> Duration {
        self.maximum
    }

    /// Returns `true` if the clock governs this search at all.
    #[inline(always)]
    pub fn use_time_management(&self) -> bool {
        self.use_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits_with_time(ms: u64) -> Limits {
        Limits {
            time: [Some(Duration::from_millis(ms)), Some(Duration::from_millis(ms))],
            ..Limits::default()
        }
    }

    #[test]
    fn test_budgets_are_ordered_and_bounded() {
        let limits = limits_with_time(60_000);
        let tm = TimeManager::new(&limits, Color::White, 20);

        assert!(tm.use_time_management());
        assert!(tm.optimum() <= tm.maximum());
        assert!(tm.maximum() < Duration::from_millis(60_000));
        assert!(tm.optimum() >= Duration::from_millis(1));
    }

    #[test]
    fn test_movetime_is_taken_literally() {
        let limits = Limits {
            movetime: Some(Duration::from_millis(500)),
            ..Limits::default()
        };
        let tm = TimeManager::new(&limits, Color::White, 0);
        assert_eq!(tm.optimum(), tm.maximum());
        assert!(tm.maximum() <= Duration::from_millis(500));
    }

    #[test]
    fn test_infinite_search_ignores_clock() {
        let tm = TimeManager::new(&Limits::default(), Color::White, 0);
        assert!(!tm.use_time_management());
        assert_eq!(tm.maximum(), Duration::MAX);
    }

    #[test]
    fn test_movestogo_spreads_budget() {
        let mut limits = limits_with_time(60_000);
        limits.movestogo = Some(40);
        let tm = TimeManager::new(&limits, Color::Black, 10);

        // Roughly a fortieth of the clock, never the whole of it.
        assert!(tm.optimum() >= Duration::from_millis(500));
        assert!(tm.optimum() <= Duration::from_millis(5_000));
    }
}
