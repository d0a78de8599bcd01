/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Numeric search parameters, collected in one place so a tuning run can
//! patch them without touching search logic. Values are starting points,
//! not truths.

/// Base of the aspiration-window half-width.
macro_rules! aspiration_delta_base {
    () => {
        10
    };
}
pub(crate) use aspiration_delta_base;

/// Divisor scaling the aspiration half-width with the score magnitude.
macro_rules! aspiration_delta_divisor {
    () => {
        15620
    };
}
pub(crate) use aspiration_delta_divisor;

/// Minimum depth before aspiration windows are used at all.
macro_rules! min_aspiration_depth {
    () => {
        4
    };
}
pub(crate) use min_aspiration_depth;

/// Razoring margin: base and per-depth-squared slope.
macro_rules! razor_base {
    () => {
        456
    };
}
pub(crate) use razor_base;

macro_rules! razor_depth_mult {
    () => {
        252
    };
}
pub(crate) use razor_depth_mult;

/// Maximum depth for child-node futility pruning.
macro_rules! max_futility_depth {
    () => {
        9
    };
}
pub(crate) use max_futility_depth;

/// Futility margin per depth.
macro_rules! futility_margin_mult {
    () => {
        165
    };
}
pub(crate) use futility_margin_mult;

/// Divisor converting the eval surplus over beta into null-move reduction.
macro_rules! nmp_eval_divisor {
    () => {
        168
    };
}
pub(crate) use nmp_eval_divisor;

/// Depth from which a null-move fail-high requires a verification search.
macro_rules! nmp_verification_depth {
    () => {
        14
    };
}
pub(crate) use nmp_verification_depth;

/// Margin added to beta for ProbCut.
macro_rules! probcut_margin {
    () => {
        180
    };
}
pub(crate) use probcut_margin;

/// Reduction of the ProbCut margin when the eval is improving.
macro_rules! probcut_improving_reduction {
    () => {
        60
    };
}
pub(crate) use probcut_improving_reduction;

/// Minimum depth for ProbCut.
macro_rules! min_probcut_depth {
    () => {
        5
    };
}
pub(crate) use min_probcut_depth;

/// Minimum depth for singular-extension search.
macro_rules! min_singular_depth {
    () => {
        6
    };
}
pub(crate) use min_singular_depth;

/// Margin below the singular beta that buys a double extension.
macro_rules! double_extension_margin {
    () => {
        17
    };
}
pub(crate) use double_extension_margin;

/// Cap on double extensions along one search path.
macro_rules! max_double_extensions {
    () => {
        11
    };
}
pub(crate) use max_double_extensions;

/// Scale of the log-log late-move-reduction table, in 1/100 ply.
macro_rules! lmr_scale {
    () => {
        20.81
    };
}
pub(crate) use lmr_scale;

/// Divisor turning a statScore into a reduction adjustment.
macro_rules! stat_score_divisor {
    () => {
        14000
    };
}
pub(crate) use stat_score_divisor;

/// Continuation-history threshold for pruning late quiets.
macro_rules! cont_history_prune_mult {
    () => {
        4000
    };
}
pub(crate) use cont_history_prune_mult;

/// Capture futility margin: base and per-depth slope.
macro_rules! capture_futility_base {
    () => {
        200
    };
}
pub(crate) use capture_futility_base;

macro_rules! capture_futility_mult {
    () => {
        250
    };
}
pub(crate) use capture_futility_mult;

/// SEE pruning slopes for captures (per depth) and quiets (per depth squared).
macro_rules! see_capture_mult {
    () => {
        200
    };
}
pub(crate) use see_capture_mult;

macro_rules! see_quiet_mult {
    () => {
        27
    };
}
pub(crate) use see_quiet_mult;

/// History bonus: slope, offset, and cap of the depth-scaled bonus.
macro_rules! history_bonus_mult {
    () => {
        170
    };
}
pub(crate) use history_bonus_mult;

macro_rules! history_bonus_offset {
    () => {
        90
    };
}
pub(crate) use history_bonus_offset;

macro_rules! history_bonus_max {
    () => {
        1600
    };
}
pub(crate) use history_bonus_max;

/// Extra margin over beta that earns a larger best-move bonus.
macro_rules! good_cutoff_margin {
    () => {
        150
    };
}
pub(crate) use good_cutoff_margin;

/// Stand-pat futility margin in quiescence.
macro_rules! qsearch_futility_margin {
    () => {
        200
    };
}
pub(crate) use qsearch_futility_margin;

/// Nodes between two time checks on the main thread.
macro_rules! time_check_interval {
    () => {
        1024
    };
}
pub(crate) use time_check_interval;
