/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::Arc;

use arcana::*;

const CUSTOM_CATALOG: &str = r#"[
    { "id": "sumnQ", "name": "Summon Queen", "category": "summon",
      "effect": { "type": "summon", "piece": "queen" } },
    { "id": "sumnRQ", "name": "Royal Decree", "category": "summon",
      "effect": { "type": "royalty", "piece": "queen" } },
    { "id": "gainQ", "name": "Windfall", "category": "gain",
      "effect": { "type": "gain", "grants": [{ "id": "sumnQ", "uses": 2 }] } }
]"#;

fn session_with(catalog: &Arc<ArcanaCatalog>, scenario: Scenario) -> GameSession {
    GameSession::from_scenario(Arc::clone(catalog), EngineConfig::default(), scenario).unwrap()
}

#[test]
fn test_custom_catalog_drives_a_session() {
    let catalog = Arc::new(ArcanaCatalog::from_json(CUSTOM_CATALOG).unwrap());
    assert_eq!(catalog.len(), 3);

    let scenario = Scenario::default().with_grant(Color::White, "gainQ", 1);
    let mut game = session_with(&catalog, scenario);

    assert_eq!(game.activate_arcana("gainQ").unwrap(), Some(Activation::Applied));
    assert_eq!(game.arcana().uses("gainQ", Color::White), 0);
    assert_eq!(game.arcana().uses("sumnQ", Color::White), 2);

    // Gains do not end the turn
    assert_eq!(game.position().side_to_move(), Color::White);
    play_one(&mut game, "e2e4");
    assert_eq!(game.history().len(), 1);
    assert_eq!(game.arcana().uses("sumnQ", Color::White), 2);
}

#[test]
fn test_catalog_errors() {
    let unknown_grant = r#"[
        { "id": "gainX", "name": "Nothing", "category": "gain",
          "effect": { "type": "gain", "grants": [{ "id": "missing", "uses": 1 }] } }
    ]"#;
    assert!(matches!(
        ArcanaCatalog::from_json(unknown_grant),
        Err(ArcanaError::Unknown(id)) if id == "missing"
    ));

    let wrong_category = r#"[
        { "id": "sumnX", "name": "Odd", "category": "dyad",
          "effect": { "type": "summon", "piece": "knight" } }
    ]"#;
    assert!(matches!(
        ArcanaCatalog::from_json(wrong_category),
        Err(ArcanaError::Mismatch { .. })
    ));

    assert!(matches!(
        ArcanaCatalog::from_json("{ not json"),
        Err(ArcanaError::Parse(_))
    ));

    // Scenarios naming arcana outside the catalog are refused
    let catalog = Arc::new(ArcanaCatalog::from_json(CUSTOM_CATALOG).unwrap());
    let scenario = Scenario::default().with_grant(Color::Black, "dyadA", 1);
    assert!(matches!(
        GameSession::from_scenario(catalog, EngineConfig::default(), scenario),
        Err(SessionError::Arcana(ArcanaError::Unknown(_)))
    ));
}

#[test]
fn test_shared_catalog_does_not_leak_between_sessions() {
    let catalog = Arc::new(ArcanaCatalog::builtin().unwrap());
    let scenario = Scenario::from_fen("4k3/p7/8/8/8/8/7P/4K3 w - - 0 1");
    let mut first = session_with(&catalog, scenario.clone());
    let second = session_with(&catalog, scenario);

    first.grant_arcana("sumnQ", Color::White, 3).unwrap();
    assert_eq!(first.arcana().uses("sumnQ", Color::White), 3);
    assert_eq!(second.arcana().uses("sumnQ", Color::White), 0);

    // Seven board moves, plus a Queen on any of the 14 empty squares of the first two ranks
    assert_eq!(first.legal_moves().len(), 7 + 14);
    assert_eq!(second.legal_moves().len(), 7);
    assert!(Arc::ptr_eq(first.catalog(), second.catalog()));
}

#[test]
fn test_restart_restores_scenario_uses() {
    let scenario = Scenario::from_fen("4k3/pppp4/8/8/8/8/PPPP4/4K3 w - - 0 1")
        .with_grant(Color::White, "sumnN", 1);
    let catalog = Arc::new(ArcanaCatalog::builtin().unwrap());
    let mut game = session_with(&catalog, scenario);
    let start = game.fen();

    play_one(&mut game, "N@g1");
    play_one(&mut game, "e8f8");
    assert_eq!(game.arcana().uses("sumnN", Color::White), 0);

    game.grant_arcana("sumnQ", Color::Black, 1).unwrap();
    game.restart().unwrap();

    assert_eq!(game.fen(), start);
    assert!(game.history().is_empty());
    assert_eq!(game.arcana().uses("sumnN", Color::White), 1);
    assert_eq!(game.arcana().uses("sumnQ", Color::Black), 0);
}

#[test]
fn test_royalty_moves_when_granted() {
    let catalog = Arc::new(ArcanaCatalog::from_json(CUSTOM_CATALOG).unwrap());
    let scenario = Scenario::default().with_grant(Color::White, "sumnRQ", 1);
    let mut game = session_with(&catalog, scenario);

    let royalties = game.legal_moves().iter().filter(|mv| mv.is_royalty()).count();
    assert_eq!(royalties, 15, "every friendly piece but the King can be crowned");

    // Crowning the d2 pawn lets it move like a Queen
    play_one(&mut game, "Q+d2");
    assert_eq!(game.arcana().uses("sumnRQ", Color::White), 0);
    assert!(game.position().royalty_at(Square::D2).is_some());
    play_one(&mut game, "e7e5");

    let destinations = game.legal_destinations(MoveMode::Normal, Some(Square::D2));
    assert!(destinations.intersects(Square::D5));
    assert!(destinations.intersects(Square::H6));
}

fn play_one(game: &mut GameSession, mv: &str) {
    game.apply_uci(mv)
        .unwrap_or_else(|e| panic!("failed to play {mv:?} on {}: {e}", game.fen()));
}
