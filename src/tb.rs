/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The endgame-tablebase collaborator.
//!
//! The searcher only depends on this narrow interface: a win/draw/loss probe
//! that may fail, plus the configuration limiting when probing is worth
//! attempting. The built-in implementation has no table files and always
//! fails, which the searcher treats as "no tablebase information".

use crate::Position;

/// Outcome of a successful WDL probe, from the side to move's perspective.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Wdl {
    Loss,

    /// Lost, but saved by the 50-move rule.
    BlessedLoss,

    Draw,

    /// Won, but voided by the 50-move rule.
    CursedWin,

    Win,
}

/// Tablebase configuration, set through the `Syzygy*` options.
#[derive(Clone, Debug)]
pub struct TbConfig {
    pub path: Option<String>,
    pub probe_depth: i32,
    pub probe_limit: u32,
    pub rule50: bool,
}

impl Default for TbConfig {
    fn default() -> Self {
        Self {
            path: None,
            probe_depth: 1,
            probe_limit: 7,
            rule50: true,
        }
    }
}

impl TbConfig {
    /// Largest piece count for which a probe can possibly succeed,
    /// or 0 when probing is disabled entirely.
    #[inline(always)]
    pub fn cardinality(&self) -> u32 {
        if self.path.is_some() {
            self.probe_limit
        } else {
            0
        }
    }

    /// Probes the win/draw/loss tables for `pos`.
    ///
    /// Returns `None` on failure (missing file, I/O error, position out of
    /// range); the caller proceeds as if no tablebases existed.
    #[inline(always)]
    pub fn probe_wdl(&self, _pos: &Position) -> Option<Wdl> {
        // No table files are bundled; every probe fails.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_tablebases_never_probe() {
        let config = TbConfig::default();
        assert_eq!(config.cardinality(), 0);

        let pos = Position::from_fen("k7/8/8/8/8/8/8/K7 w - - 0 1", false).unwrap();
        assert_eq!(config.probe_wdl(&pos), None);
    }
}
