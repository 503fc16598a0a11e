/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    sync::Arc,
    thread,
    time::Duration,
};

use arcana::*;
use futures_lite::future::block_on;

fn session(scenario: Scenario) -> GameSession {
    let catalog = Arc::new(ArcanaCatalog::builtin().unwrap());
    GameSession::from_scenario(catalog, EngineConfig::default(), scenario).unwrap()
}

fn play(game: &mut GameSession, moves: &[&str]) {
    for mv in moves {
        game.apply_uci(mv)
            .unwrap_or_else(|e| panic!("failed to play {mv:?} on {}: {e}", game.fen()));
    }
}

#[test]
fn test_bulletproof_blocks_captures_for_three_plies() {
    let scenario = Scenario::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1")
        .with_grant(Color::White, "modsBLT", 1);
    let mut game = session(scenario);

    let white_takes = |game: &GameSession| {
        game.legal_destinations(MoveMode::Normal, Some(Square::E4))
            .intersects(Square::D5)
    };
    let black_takes = |game: &GameSession| {
        game.legal_destinations(MoveMode::Normal, Some(Square::D5))
            .intersects(Square::E4)
    };

    assert!(white_takes(&game));
    assert_eq!(
        game.activate_arcana("modsBLT").unwrap(),
        Some(Activation::Applied)
    );

    // Ply 1
    assert!(!white_takes(&game));
    play(&mut game, &["e1d1"]);

    // Ply 2
    assert!(!black_takes(&game));
    assert!(game
        .legal_destinations(MoveMode::Normal, Some(Square::D5))
        .intersects(Square::D4));
    play(&mut game, &["e8d8"]);

    // Ply 3
    assert!(!white_takes(&game));
    let outcome = game.apply_uci("d1e1").unwrap();
    let MoveOutcome::Committed { expired, .. } = outcome else {
        panic!("expected the turn to be committed");
    };
    assert_eq!(expired, [ExpiredEffect::SuspendLifted]);

    // Ply 4
    assert!(black_takes(&game));
}

#[test]
fn test_dyad_without_first_half_is_refunded() {
    let scenario = Scenario::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1")
        .with_grant(Color::White, "dyadP", 1);
    let mut game = session(scenario);

    assert_eq!(game.activate_arcana("dyadP").unwrap(), None);
    assert_eq!(game.arcana().uses("dyadP", Color::White), 1);
    assert!(game.active_mode().is_none());
}

#[test]
fn test_dyad_without_second_half_is_refunded() {
    // The only first half is a2a3, after which White cannot move again
    let fen = "kb4r1/8/8/8/p7/8/P7/7K w - - 0 1";
    let scenario = Scenario::from_fen(fen).with_grant(Color::White, "dyadP", 1);
    let mut game = session(scenario);

    let activation = game.activate_arcana("dyadP").unwrap();
    assert!(matches!(activation, Some(Activation::Mode(MoveMode::Dyad(_)))));
    assert_eq!(game.arcana().uses("dyadP", Color::White), 0);

    assert_eq!(game.apply_uci("a2a3").unwrap(), MoveOutcome::Cancelled);
    assert_eq!(game.arcana().uses("dyadP", Color::White), 1);
    assert_eq!(game.fen(), Position::from_fen(fen).unwrap().to_fen());
    assert!(game.history().is_empty());
    assert!(game.active_mode().is_none());
}

#[test]
fn test_dyad_turn_is_one_entry() {
    let scenario = Scenario::default().with_grant(Color::White, "dyadA", 1);
    let mut game = session(scenario);

    game.activate_arcana("dyadA").unwrap();
    assert_eq!(game.apply_uci("e2e4").unwrap(), MoveOutcome::Pending);
    assert_eq!(game.position().side_to_move(), Color::White);

    let outcome = game.apply_uci("d2d4").unwrap();
    assert!(matches!(outcome, MoveOutcome::Committed { ref notation, .. } if notation == "e4-d4"));
    assert_eq!(game.history().len(), 1);
    assert_eq!(game.position().side_to_move(), Color::Black);
    assert_eq!(game.arcana().uses("dyadA", Color::White), 0);
}

#[test]
fn test_cancel_after_first_half_restores_turn() {
    let scenario = Scenario::default().with_grant(Color::White, "dyadA", 1);
    let mut game = session(scenario);

    game.activate_arcana("dyadA").unwrap();
    game.apply_uci("g1f3").unwrap();
    assert!(game.position().is_dyad_pending());

    assert!(game.cancel_active_mode().unwrap());
    assert_eq!(game.fen(), FEN_STARTPOS);
    assert_eq!(game.arcana().uses("dyadA", Color::White), 1);
}

#[test]
fn test_repetition_on_third_occurrence() {
    let mut game = session(Scenario::default());
    let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];

    play(&mut game, &shuffle);
    assert_eq!(game.result(), None);

    play(&mut game, &shuffle[..3]);
    assert_eq!(game.result(), None);

    play(&mut game, &shuffle[3..]);
    assert_eq!(game.result(), Some(GameResult::Repetition));
    assert!(matches!(
        game.apply_uci("e2e4"),
        Err(SessionError::GameOver(GameResult::Repetition))
    ));
}

#[test]
fn test_insufficient_material_and_fifty_moves() {
    let game = session(Scenario::from_fen("8/4k3/8/8/3K4/8/5N2/8 w - - 0 1"));
    assert_eq!(game.result(), Some(GameResult::InsufficientMaterial));

    let mut game = session(Scenario::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 99 80"));
    assert_eq!(game.result(), None);
    play(&mut game, &["a1a2"]);
    assert_eq!(game.result(), Some(GameResult::FiftyMoves));
}

#[test]
fn test_mate_in_one_at_depth_one() {
    let mut game = session(Scenario::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1"));
    let config = SearchConfig::new(1, Duration::from_secs(60));

    let result = block_on(game.think(config)).unwrap();
    assert_eq!(result.bestmove.map(|mv| mv.to_string()), Some(String::from("a1a8")));
    assert!(result.score.is_mate());
    assert!(!game.is_thinking());

    let outcome = block_on(game.play_best(config)).unwrap();
    assert!(matches!(
        outcome,
        Some(MoveOutcome::Committed {
            result: Some(GameResult::Checkmate(Color::White)),
            ..
        })
    ));
}

#[test]
fn test_hint_levels() {
    let game = session(Scenario::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1"));
    let config = SearchConfig::new(1, Duration::from_secs(60));

    let origin = block_on(game.request_hint(HintLevel::Origin, config)).unwrap();
    assert_eq!(origin, Some(Hint::Origin(Square::A1)));

    let line = block_on(game.request_hint(HintLevel::Line, config)).unwrap();
    assert_eq!(line.map(|hint| hint.to_string()), Some(String::from("Ra8#")));
}

#[test]
fn test_summon_is_not_stalemate() {
    let fen = "k7/8/KQ6/8/8/8/8/8 b - - 0 1";

    let game = session(Scenario::from_fen(fen));
    assert_eq!(game.result(), Some(GameResult::Stalemate));

    let game = session(Scenario::from_fen(fen).with_grant(Color::Black, "sumnN", 1));
    assert_eq!(game.result(), None);
    assert!(game.legal_moves().iter().all(|mv| mv.is_summon()));
    assert!(!game.legal_moves().is_empty());
}

#[test]
fn test_rewind_restores_counters_but_spends_sight() {
    let scenario = Scenario::from_fen("4k3/p7/8/8/8/8/P7/4K3 w - - 0 1")
        .with_grant(Color::White, "sumnN", 1)
        .with_grant(Color::White, "modsFUT", 1);
    let mut game = session(scenario);
    let start = game.fen();

    play(&mut game, &["N@b1", "e8d8", "e1d1", "d8e8"]);
    assert_eq!(game.arcana().uses("sumnN", Color::White), 0);
    assert_eq!(game.history().len(), 4);

    let activation = game.future_sight("modsFUT").unwrap();
    assert_eq!(activation, Some(Activation::Rewind(4)));

    assert_eq!(game.history().len(), 0);
    assert_eq!(game.history().cursor(), 0);
    assert_eq!(game.fen(), start);
    assert_eq!(game.arcana().uses("sumnN", Color::White), 1);
    assert_eq!(game.arcana().uses("modsFUT", Color::White), 0);
}

#[test]
fn test_rewind_too_far_is_refunded() {
    let scenario = Scenario::default().with_grant(Color::White, "modsFUT", 1);
    let mut game = session(scenario);
    play(&mut game, &["e2e4", "e7e5"]);

    assert!(matches!(
        game.activate_arcana("modsFUT"),
        Err(SessionError::RewindTooFar {
            requested: 4,
            available: 2
        })
    ));
    assert_eq!(game.arcana().uses("modsFUT", Color::White), 1);
    assert_eq!(game.history().len(), 2);
}

#[test]
fn test_failed_rewind_keeps_the_shown_ply() {
    let scenario = Scenario::default().with_grant(Color::White, "modsFUT", 1);
    let mut game = session(scenario);
    play(&mut game, &["e2e4", "e7e5"]);

    assert_eq!(game.navigate(Navigation::Start).unwrap(), 0);
    assert!(matches!(
        game.future_sight("modsFUT"),
        Err(SessionError::RewindTooFar { .. })
    ));
    assert_eq!(game.history().cursor(), 0);
    assert_eq!(game.fen(), FEN_STARTPOS);

    // Playing from the shown position branches there
    play(&mut game, &["d2d4"]);
    assert_eq!(game.history().len(), 1);
    assert_eq!(game.history().entries()[0].notation, "d4");
    assert_eq!(
        game.fen(),
        "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq d3 0 1"
    );
    assert!(game.history().is_consistent());
}

#[test]
fn test_grants_during_play_are_replayed() {
    let mut game = session(Scenario::default());
    play(&mut game, &["e2e4", "e7e5"]);

    game.grant_arcana("sumnN", Color::White, 1).unwrap();
    play(&mut game, &["N@e2"]);
    assert_eq!(game.arcana().uses("sumnN", Color::White), 0);
    assert_eq!(game.history().len(), 3);

    let history = game.history();
    assert_eq!(history.replay(3).unwrap().to_fen(), game.fen());
    assert!(history.is_consistent());

    // A grant made while viewing an earlier ply lands on that ply's branch
    game.navigate(Navigation::Jump(2)).unwrap();
    game.grant_arcana("sumnQ", Color::White, 1).unwrap();
    play(&mut game, &["Q@e2"]);

    let history = game.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history.entries()[2].notation, "Q@e2");
    assert_eq!(history.snapshot(2).unwrap().arcana.uses("sumnQ", Color::White), 0);
    assert_eq!(history.snapshot(3).unwrap().arcana.uses("sumnN", Color::White), 0);
    assert!(history.is_consistent());
}

#[test]
fn test_replay_reproduces_every_fen() {
    let scenario = Scenario::from_fen("4k3/pppp4/8/8/8/8/PPPP4/4K3 w - - 0 1")
        .with_grant(Color::White, "sumnN", 1)
        .with_grant(Color::White, "modsBLT", 1)
        .with_grant(Color::White, "dyadA", 1)
        .with_grant(Color::White, "offrP", 1);
    let mut game = session(scenario);

    game.activate_arcana("modsBLT").unwrap();
    play(&mut game, &["e1f1", "e8f8", "N@g1", "f8e8"]);

    game.activate_arcana("dyadA").unwrap();
    play(&mut game, &["a2a3", "b2b3", "e8f8", "x@c2"]);

    assert_eq!(game.history().len(), 7);
    assert_eq!(game.arcana().uses("offrP", Color::White), 0);
    assert_eq!(game.arcana().uses("sumnN", Color::White), 1);

    let history = game.history();
    for (ply, fen) in history.fens().enumerate() {
        assert_eq!(history.replay(ply).unwrap().to_fen(), fen);
    }
    assert!(history.is_consistent());
}

#[test]
fn test_navigation_and_branching() {
    let mut game = session(Scenario::default());
    play(&mut game, &["e2e4", "e7e5", "g1f3"]);

    assert_eq!(game.navigate(Navigation::Back).unwrap(), 2);
    assert_eq!(game.navigate(Navigation::Start).unwrap(), 0);
    assert_eq!(game.fen(), FEN_STARTPOS);
    assert_eq!(game.navigate(Navigation::Jump(1)).unwrap(), 1);

    play(&mut game, &["c7c5"]);
    assert_eq!(game.history().len(), 2);
    assert_eq!(game.history().entries()[1].notation, "c5");
    assert!(game.history().is_consistent());
}

#[test]
fn test_stop_cancels_search() {
    let game = session(Scenario::from_fen(FEN_KIWIPETE));
    let task = game.start_search(SearchConfig::default()).unwrap();
    assert!(game.is_thinking());

    let handle = thread::spawn(move || block_on(task.run()));
    thread::sleep(Duration::from_millis(200));
    game.stop_search();

    let result = handle.join().unwrap();
    assert!(!game.is_thinking());
    assert!(result.depth < MAX_DEPTH);
}

#[test]
fn test_search_does_not_spend_live_arcana() {
    let scenario = Scenario::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1")
        .with_grant(Color::White, "sumnQ", 1);
    let game = session(scenario);

    // A held summon can still bring mating material
    assert_eq!(game.result(), None);

    let config = SearchConfig::new(2, Duration::from_secs(60));
    let result = block_on(game.think(config)).unwrap();
    assert!(result.bestmove.is_some_and(|mv| mv.is_summon()));
    assert_eq!(game.arcana().uses("sumnQ", Color::White), 1);
}
