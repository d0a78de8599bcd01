/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! End-to-end scenarios: move-generation node counts on reference
//! positions, plus full searches exercising mate, draw, and zugzwang
//! handling through the public API.

use skink::{
    legal_moves, move_from_uci, Limits, Position, Score, SearchOptions, ThreadPool,
    FEN_KIWIPETE, FEN_STARTPOS,
};

/// Counts leaf nodes of the legal move tree, with bulk counting at the
/// horizon so the final ply needs no make/unmake.
fn perft(pos: &mut Position, depth: i32) -> u64 {
    let moves = legal_moves(pos);
    if depth <= 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0;
    for mv in moves {
        let gives_check = pos.gives_check(mv);
        pos.do_move(mv, gives_check);
        nodes += perft(pos, depth - 1);
        pos.undo_move(mv);
    }
    nodes
}

fn play(pos: &mut Position, uci: &str) {
    let mv = move_from_uci(pos, uci).expect("test move must be legal");
    let gives_check = pos.gives_check(mv);
    pos.do_move(mv, gives_check);
}

fn search(pool: &mut ThreadPool, pos: &Position, depth: i32) -> (String, Score) {
    let limits = Limits {
        depth: Some(depth),
        ..Limits::default()
    };
    let (mv, score) = pool
        .search_sync(pos, limits, SearchOptions::default())
        .expect("search must produce a move");
    (mv.to_uci(false), score)
}

#[test]
fn perft_startpos() {
    let mut pos = Position::from_fen(FEN_STARTPOS, false).unwrap();
    assert_eq!(perft(&mut pos, 1), 20);
    assert_eq!(perft(&mut pos, 2), 400);
    assert_eq!(perft(&mut pos, 3), 8_902);
    assert_eq!(perft(&mut pos, 4), 197_281);
    assert_eq!(perft(&mut pos, 5), 4_865_609);
}

#[test]
fn perft_kiwipete() {
    let mut pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
    assert_eq!(perft(&mut pos, 1), 48);
    assert_eq!(perft(&mut pos, 2), 2_039);
    assert_eq!(perft(&mut pos, 3), 97_862);
    assert_eq!(perft(&mut pos, 4), 4_085_603);
}

#[test]
fn perft_tricky_positions() {
    // Standard suite covering en passant, promotions, and pins.
    for (fen, depth, expected) in [
        ("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", 5, 674_624u64),
        (
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
            4,
            422_333,
        ),
        (
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            3,
            62_379,
        ),
        (
            "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
            3,
            89_890,
        ),
    ] {
        let mut pos = Position::from_fen(fen, false).unwrap();
        assert_eq!(perft(&mut pos, depth), expected, "perft({depth}) of {fen}");
    }
}

#[test]
fn scholars_mate_position_is_mated() {
    // Scholar's mate just delivered: Black to move, no escape.
    let pos = Position::from_fen(
        "r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4",
        false,
    )
    .unwrap();

    assert!(pos.in_check());
    assert!(legal_moves(&pos).is_empty(), "a mated side has no legal moves");
}

#[test]
fn search_sees_mate_in_one() {
    // One move before scholar's mate: the search must find Qxf7#.
    let pos = Position::from_fen(
        "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5Q2/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
        false,
    )
    .unwrap();
    let mut pool = ThreadPool::new(1, 16);

    let (best, score) = search(&mut pool, &pos, 6);
    assert_eq!(best, "f3f7");
    assert_eq!(score, Score::mate_in(1), "mate in one ply, got {score:?}");
}

#[test]
fn threefold_repetition_searches_as_draw() {
    let mut pos = Position::from_fen(FEN_STARTPOS, false).unwrap();
    for uci in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"] {
        play(&mut pos, uci);
    }
    assert!(pos.is_draw(0));

    let mut pool = ThreadPool::new(1, 16);
    let (_, score) = search(&mut pool, &pos, 6);
    assert!(
        score.value().abs() <= 50,
        "a thrice-repeated position should search near the draw score, got {score:?}"
    );
}

#[test]
fn zugzwang_is_not_a_null_move_win() {
    // KP vs kp where a naive null-move fail-high would claim a White win;
    // the verification search must keep the score honest.
    let pos = Position::from_fen("8/k1p5/8/KP6/8/8/8/8 w - - 0 1", false).unwrap();
    let mut pool = ThreadPool::new(1, 16);

    let (_, score) = search(&mut pool, &pos, 12);
    assert!(
        score.value().abs() <= 150,
        "zugzwang position must not score as a win, got {score:?}"
    );
}

#[test]
fn transpositions_share_a_key() {
    // Two move orders reaching the same position must hash identically.
    let mut a = Position::from_fen(FEN_STARTPOS, false).unwrap();
    for uci in ["e2e4", "e7e5", "g1f3", "b8c6"] {
        play(&mut a, uci);
    }

    let mut b = Position::from_fen(FEN_STARTPOS, false).unwrap();
    for uci in ["g1f3", "b8c6", "e2e4", "e7e5"] {
        play(&mut b, uci);
    }

    assert_eq!(a.key(), b.key());
    assert_eq!(a.to_fen(), b.to_fen());
}

#[test]
fn stalemate_searches_as_draw() {
    // Black to move has no moves but is not in check.
    let pos = Position::from_fen("k7/8/KQ6/8/8/8/8/8 b - - 0 1", false).unwrap();
    assert!(!pos.in_check());
    assert!(legal_moves(&pos).is_empty());
}

#[test]
fn fifty_move_rule_bounds_the_score() {
    // A rook up, but one reversible move from the 100-halfmove draw.
    let pos = Position::from_fen("k7/8/8/8/8/8/8/K6R w - - 99 80", false).unwrap();
    let mut pool = ThreadPool::new(1, 16);

    let (_, score) = search(&mut pool, &pos, 4);
    assert!(
        score.value().abs() <= 50,
        "rule-50 draw must dominate material, got {score:?}"
    );
}

#[test]
fn multithreaded_search_terminates_and_agrees_on_legality() {
    let pos = Position::from_fen(FEN_KIWIPETE, false).unwrap();
    let mut pool = ThreadPool::new(4, 16);

    let limits = Limits {
        depth: Some(7),
        ..Limits::default()
    };
    let (mv, _) = pool
        .search_sync(&pos, limits, SearchOptions::default())
        .unwrap();
    assert!(
        legal_moves(&pos).contains(&mv),
        "a parallel search must return a legal move"
    );
}

#[test]
fn deeper_search_does_not_lose_a_won_position() {
    // KQ vs k: any reasonable depth must report a decisive advantage.
    let pos = Position::from_fen("7k/8/8/8/8/8/6QK/8 w - - 0 1", false).unwrap();
    let mut pool = ThreadPool::new(1, 16);

    let (_, score) = search(&mut pool, &pos, 10);
    assert!(
        score.value() > 400 || score.is_mate(),
        "KQ vs k must be winning, got {score:?}"
    );
}
