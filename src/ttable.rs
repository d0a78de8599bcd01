/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! A fixed-memory transposition table shared by every search thread.
//!
//! Probes and saves are lock-free: each entry is two relaxed atomic words,
//! and the key word is stored XOR-ed with the data word, so a torn
//! read-write interleaving fails the key check instead of yielding a
//! mismatched (key, payload) pair. Writers tolerate lost updates.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::{Key, Move, Score};

/// Number of bytes in a megabyte.
const BYTES_IN_MB: usize = 1024 * 1024;

/// Entries per cluster; a probe scans the whole cluster.
const CLUSTER_SIZE: usize = 3;

/// Offset added to a depth before packing, making quiescence depths storable.
const DEPTH_OFFSET: i32 = 8;

/// How a stored value relates to the true score of its position.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Bound {
    /// No usable search value; the entry may still carry a static eval.
    None = 0,

    /// The true score is at most the stored value (fail-low result).
    Upper = 1,

    /// The true score is at least the stored value (fail-high result).
    Lower = 2,

    /// The stored value is the true score of a completed PV search.
    Exact = 3,
}

impl Bound {
    #[inline(always)]
    const fn from_bits(bits: u64) -> Self {
        match bits & 3 {
            0 => Self::None,
            1 => Self::Upper,
            2 => Self::Lower,
            _ => Self::Exact,
        }
    }
}

/// A decoded transposition-table hit.
#[derive(Clone, Copy, Debug)]
pub struct TtData {
    pub mv: Move,
    pub value: Score,
    pub eval: Score,
    pub depth: i32,
    pub bound: Bound,
    pub pv: bool,
}

/// One packed entry: `key ^ data` and the data word itself.
#[derive(Default)]
struct Entry {
    keyx: AtomicU64,
    data: AtomicU64,
}

/// Data-word layout, low to high: move 16, value 16, eval 16,
/// depth 8, bound 2, pv 1, generation 5.
#[inline(always)]
fn pack(mv: Move, value: Score, eval: Score, depth: i32, bound: Bound, pv: bool, gen: u8) -> u64 {
    debug_assert!((-DEPTH_OFFSET..=255 - DEPTH_OFFSET).contains(&depth));

    (mv.bits() as u64)
        | ((value.value() as i16 as u16 as u64) << 16)
        | ((eval.value() as i16 as u16 as u64) << 32)
        | ((((depth + DEPTH_OFFSET) as u64) & 0xff) << 48)
        | ((bound as u64) << 56)
        | ((pv as u64) << 58)
        | (((gen & 0x1f) as u64) << 59)
}

#[inline(always)]
fn unpack(data: u64) -> TtData {
    TtData {
        mv: Move::from_bits((data & 0xffff) as u16),
        value: Score::new(((data >> 16) as u16 as i16) as i32),
        eval: Score::new(((data >> 32) as u16 as i16) as i32),
        depth: ((data >> 48) & 0xff) as i32 - DEPTH_OFFSET,
        bound: Bound::from_bits(data >> 56),
        pv: (data >> 58) & 1 != 0,
    }
}

#[inline(always)]
fn generation_of(data: u64) -> u8 {
    (data >> 59) as u8 & 0x1f
}

#[inline(always)]
fn depth_bits(data: u64) -> i32 {
    ((data >> 48) & 0xff) as i32
}

/// The shared transposition table.
pub struct TranspositionTable {
    clusters: Vec<[Entry; CLUSTER_SIZE]>,

    /// Search counter used to age out entries from earlier searches.
    generation: AtomicU8,
}

impl TranspositionTable {
    /// Default size of the table, in megabytes.
    pub const DEFAULT_SIZE: usize = 16;

    /// Minimum size of the table, in megabytes.
    pub const MIN_SIZE: usize = 1;

    /// Maximum size of the table, in megabytes.
    pub const MAX_SIZE: usize = 1_048_576;

    /// Creates a table of (at most) `mb` megabytes, rounding the cluster
    /// count down to a power of two.
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(Self::MIN_SIZE) * BYTES_IN_MB;
        let want = bytes / std::mem::size_of::<[Entry; CLUSTER_SIZE]>();
        let count = if want.is_power_of_two() {
            want
        } else {
            want.next_power_of_two() / 2
        }
        .max(1);

        let mut clusters = Vec::with_capacity(count);
        clusters.resize_with(count, Default::default);

        Self {
            clusters,
            generation: AtomicU8::new(0),
        }
    }

    /// Number of entries the table can hold.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.clusters.len() * CLUSTER_SIZE
    }

    /// Erases every entry and resets the generation counter.
    pub fn clear(&mut self) {
        for cluster in &mut self.clusters {
            for entry in cluster {
                *entry.keyx.get_mut() = 0;
                *entry.data.get_mut() = 0;
            }
        }
        *self.generation.get_mut() = 0;
    }

    /// Advances the generation; called once at the start of each root search.
    #[inline(always)]
    pub fn new_search(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    fn current_generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed) & 0x1f
    }

    /// Age distance from the current search, in generations.
    #[inline(always)]
    fn relative_age(&self, data: u64) -> i32 {
        i32::from((32 + self.current_generation() - generation_of(data)) & 0x1f)
    }

    #[inline(always)]
    fn cluster_index(&self, key: Key) -> usize {
        key as usize & (self.clusters.len() - 1)
    }

    /// Looks up `key`, returning the decoded entry on a validated hit.
    ///
    /// Every load is relaxed; the XOR-ed key word rejects entries torn by a
    /// concurrent writer.
    pub fn probe(&self, key: Key) -> Option<TtData> {
        let cluster = &self.clusters[self.cluster_index(key)];

        for entry in cluster {
            let data = entry.data.load(Ordering::Relaxed);
            let keyx = entry.keyx.load(Ordering::Relaxed);

            if data != 0 && keyx ^ data == key {
                return Some(unpack(data));
            }
        }

        None
    }

    /// Stores a search result for `key`.
    ///
    /// Within the cluster, an entry for the same key is preferred, then an
    /// empty slot, then the entry whose stored depth minus an age penalty is
    /// least. A non-exact result several plies shallower than a same-key
    /// entry only refreshes that entry's move; eval-only writes (bound
    /// [`Bound::None`]) are always accepted.
    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &self,
        key: Key,
        value: Score,
        pv: bool,
        bound: Bound,
        depth: i32,
        mv: Move,
        eval: Score,
    ) {
        let generation = self.current_generation();
        let cluster = &self.clusters[self.cluster_index(key)];

        let mut victim = 0;
        let mut victim_worth = i32::MAX;
        let mut matching = None;

        for (i, entry) in cluster.iter().enumerate() {
            let data = entry.data.load(Ordering::Relaxed);
            let keyx = entry.keyx.load(Ordering::Relaxed);

            if data == 0 {
                if victim_worth > i32::MIN {
                    victim = i;
                    victim_worth = i32::MIN;
                }
                continue;
            }

            if keyx ^ data == key {
                matching = Some((i, unpack(data)));
                break;
            }

            let worth = depth_bits(data) - 8 * self.relative_age(data);
            if worth < victim_worth {
                victim = i;
                victim_worth = worth;
            }
        }

        let slot = match matching {
            Some((i, old)) => {
                if bound != Bound::Exact && bound != Bound::None && depth < old.depth - 3 {
                    // Too shallow to replace; at most refresh the move.
                    if mv != Move::NONE && mv != old.mv {
                        let data =
                            pack(mv, old.value, old.eval, old.depth, old.bound, old.pv, generation);
                        cluster[i].data.store(data, Ordering::Relaxed);
                        cluster[i].keyx.store(key ^ data, Ordering::Relaxed);
                    }
                    return;
                }
                i
            }
            None => victim,
        };

        // Keep the previously known move when the new result has none.
        let stored_move = match (mv, matching) {
            (Move::NONE, Some((_, old))) => old.mv,
            _ => mv,
        };

        let data = pack(stored_move, value, eval, depth, bound, pv, generation);
        cluster[slot].data.store(data, Ordering::Relaxed);
        cluster[slot].keyx.store(key ^ data, Ordering::Relaxed);
    }

    /// Approximate permill fill of the table, sampled from the front,
    /// counting only entries written by the current search.
    pub fn hashfull(&self) -> usize {
        let generation = self.current_generation();
        let sample = self.clusters.len().min(334);
        let mut filled = 0;
        let mut seen = 0;

        for cluster in &self.clusters[..sample] {
            for entry in cluster {
                if seen >= 1000 {
                    break;
                }
                seen += 1;
                let data = entry.data.load(Ordering::Relaxed);
                if data != 0 && generation_of(data) == generation {
                    filled += 1;
                }
            }
        }

        filled * 1000 / seen.max(1)
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PieceKind, Square};

    #[test]
    fn test_store_then_load() {
        let tt = TranspositionTable::new(1);
        tt.new_search();

        let key = 0xdead_beef_cafe_f00d;
        let mv = Move::new(Square::E1, Square::E8);
        tt.save(key, Score::new(123), true, Bound::Exact, 9, mv, Score::new(55));

        let hit = tt.probe(key).expect("stored entry must be found");
        assert_eq!(hit.mv, mv);
        assert_eq!(hit.value, Score::new(123));
        assert_eq!(hit.eval, Score::new(55));
        assert_eq!(hit.depth, 9);
        assert_eq!(hit.bound, Bound::Exact);
        assert!(hit.pv);

        assert!(tt.probe(key ^ 1).is_none(), "a different key must miss");
    }

    #[test]
    fn test_special_moves_roundtrip() {
        let tt = TranspositionTable::new(1);
        let castle = Move::castling(Square::E1, Square::H1);
        let promo = Move::promotion(
            Square::from_uci("a7").unwrap(),
            Square::A8,
            PieceKind::Rook,
        );

        tt.save(1, Score::DRAW, false, Bound::Lower, 3, castle, Score::DRAW);
        tt.save(2, Score::DRAW, false, Bound::Lower, 3, promo, Score::DRAW);

        assert_eq!(tt.probe(1).unwrap().mv, castle);
        assert_eq!(tt.probe(2).unwrap().mv, promo);
    }

    #[test]
    fn test_negative_depth_buckets() {
        // Quiescence entries store small negative depths.
        let tt = TranspositionTable::new(1);
        tt.save(7, Score::new(-4), false, Bound::Upper, -1, Move::NONE, Score::new(-4));
        assert_eq!(tt.probe(7).unwrap().depth, -1);
    }

    #[test]
    fn test_deep_entry_resists_shallow_overwrite() {
        let tt = TranspositionTable::new(1);
        tt.new_search();

        let key = 42;
        let deep_move = Move::new(Square::A1, Square::A8);
        tt.save(key, Score::new(10), false, Bound::Lower, 20, deep_move, Score::DRAW);

        // A much shallower non-exact result must not clobber the depth.
        tt.save(key, Score::new(-10), false, Bound::Upper, 2, Move::NONE, Score::DRAW);
        let hit = tt.probe(key).unwrap();
        assert_eq!(hit.depth, 20);
        assert_eq!(hit.mv, deep_move);

        // An exact result always replaces.
        tt.save(key, Score::new(33), true, Bound::Exact, 5, Move::NONE, Score::DRAW);
        let hit = tt.probe(key).unwrap();
        assert_eq!(hit.depth, 5);
        assert_eq!(hit.mv, deep_move, "the old move survives a move-less save");
    }

    #[test]
    fn test_eval_only_write_is_accepted() {
        let tt = TranspositionTable::new(1);
        tt.new_search();

        let key = 77;
        tt.save(key, Score::NONE, false, Bound::None, -6, Move::NONE, Score::new(31));
        let hit = tt.probe(key).expect("eval-only entries are probeable");
        assert_eq!(hit.bound, Bound::None);
        assert_eq!(hit.eval, Score::new(31));
    }

    #[test]
    fn test_capacity_is_power_of_two_clusters() {
        for mb in [1, 2, 7, 16] {
            let tt = TranspositionTable::new(mb);
            let clusters = tt.capacity() / CLUSTER_SIZE;
            assert!(clusters.is_power_of_two());
            assert!(clusters * std::mem::size_of::<[Entry; CLUSTER_SIZE]>() <= mb * BYTES_IN_MB);
        }
    }
}
