/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use futures::channel::oneshot;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    Activation, ArcanaCatalog, ArcanaError, ArcanaState, Bitboard, Color, Effect, EngineConfig,
    EvalWeights, ExpiredEffect, HistoryEntry, HistoryManager, Hint, HintLevel, Move, MoveList, MoveMode,
    Navigation, PieceKind, Position, Search, SearchConfig, SearchResult, SessionError, Square,
    Turn, ZobristKey, FEN_STARTPOS,
};

/// How a game ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    /// The side to move was mated; the contained color won.
    Checkmate(Color),
    Stalemate,
    Repetition,
    InsufficientMaterial,
    FiftyMoves,
}

impl GameResult {
    /// The winner, if the game was not drawn.
    #[inline(always)]
    pub const fn winner(&self) -> Option<Color> {
        match self {
            Self::Checkmate(color) => Some(*color),
            _ => None,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkmate(winner) => write!(f, "{} wins by checkmate", winner.name()),
            Self::Stalemate => write!(f, "draw by stalemate"),
            Self::Repetition => write!(f, "draw by threefold repetition"),
            Self::InsufficientMaterial => write!(f, "draw by insufficient material"),
            Self::FiftyMoves => write!(f, "draw by the fifty-move rule"),
        }
    }
}

/// Uses of an arcana handed to a player, when a game starts or during play.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ScenarioGrant {
    pub color: Color,
    pub id: String,
    pub uses: u8,
}

/// Starting point of a game: a position and the arcana each player begins with.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub fen: String,
    pub grants: Vec<ScenarioGrant>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            fen: String::from(FEN_STARTPOS),
            grants: Vec::new(),
        }
    }
}

impl Scenario {
    /// A scenario starting at `fen`, without arcana.
    pub fn from_fen(fen: impl Into<String>) -> Self {
        Self {
            fen: fen.into(),
            ..Default::default()
        }
    }

    /// A scenario where each side lines up its own army, one letter per file of its back rank.
    pub fn from_armies(white: &str, black: &str) -> Result<Self, SessionError> {
        let position = Position::from_armies(white, black)?;
        Ok(Self::from_fen(position.to_fen()))
    }

    /// Parses a scenario from JSON.
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        serde_json::from_str(json).map_err(|e| SessionError::Parse(e.into()))
    }

    /// Adds `uses` of `id` to `color`'s starting arcana.
    pub fn with_grant(mut self, color: Color, id: impl Into<String>, uses: u8) -> Self {
        self.grants.push(ScenarioGrant {
            color,
            id: id.into(),
            uses,
        });
        self
    }

    /// Builds the position and arcana this scenario describes.
    fn build(&self, catalog: &Arc<ArcanaCatalog>) -> Result<(Position, ArcanaState), SessionError> {
        let position = Position::from_fen(&self.fen)?;
        self.build_with(position, catalog)
    }

    /// Builds this scenario's arcana on top of a different position.
    fn build_with(
        &self,
        mut position: Position,
        catalog: &Arc<ArcanaCatalog>,
    ) -> Result<(Position, ArcanaState), SessionError> {
        let mut arcana = ArcanaState::new(Arc::clone(catalog));
        for grant in &self.grants {
            arcana.grant(&grant.id, grant.color, grant.uses)?;
        }
        arcana.sync(&mut position);
        Ok((position, arcana))
    }
}

/// An arcana whose mode the move generator is currently in.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ActiveMode {
    pub id: String,
    pub mode: MoveMode,
}

/// What happened when a move was applied.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum MoveOutcome {
    /// The turn was committed to history.
    Committed {
        notation: String,
        expired: Vec<ExpiredEffect>,
        result: Option<GameResult>,
    },

    /// The first half of a double move was made, and a second move is owed.
    Pending,

    /// The first half of a double move left no second move, so the double move was undone and refunded.
    Cancelled,
}

/// A search detached from its [`GameSession`], so the session stays readable while it runs.
///
/// The session refuses to change its position until the search concludes or is stopped.
pub struct SearchTask {
    position: Position,
    arcana: ArcanaState,
    weights: EvalWeights,
    keys: Vec<ZobristKey>,
    is_searching: Arc<AtomicBool>,
    config: SearchConfig,
}

impl SearchTask {
    /// The position being searched.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Runs the search to completion, clearing the session's thinking flag afterwards.
    pub async fn run(self) -> SearchResult {
        let search = Search::new(
            &self.position,
            &self.arcana,
            &self.weights,
            Arc::clone(&self.is_searching),
            self.config,
        )
        .with_history(self.keys.iter().copied());

        search.start().await
    }
}

/// A single game of arcane chess.
///
/// The session owns the position, both players' arcana, and the history. Every mutation goes
/// through it, so a game can never be changed while its engine is thinking.
#[derive(Debug)]
pub struct GameSession {
    /// Shared, read-only arcana definitions.
    catalog: Arc<ArcanaCatalog>,

    /// Search and evaluation settings.
    config: EngineConfig,

    /// How this game started, for restarts.
    scenario: Scenario,

    /// Live position, including any arcana activated or half-move made this turn.
    position: Position,

    /// Live arcana, including anything spent this turn.
    arcana: ArcanaState,

    /// Committed turns.
    history: HistoryManager,

    /// What has been done so far in the turn being built.
    turn: Turn,

    /// Notation of each move in `turn`.
    notations: Vec<String>,

    /// The mode the move generator is in, if any.
    active: Option<ActiveMode>,

    /// Set once the game ends.
    result: Option<GameResult>,

    /// Effects that expired at the end of the last committed turn.
    expired: Vec<ExpiredEffect>,

    /// Set while a search is running.
    thinking: Arc<AtomicBool>,
}

impl GameSession {
    /// Starts a new game from the standard starting position, without arcana.
    pub fn new(catalog: Arc<ArcanaCatalog>, config: EngineConfig) -> Self {
        let scenario = Scenario::default();
        let position = Position::default();
        let arcana = ArcanaState::new(Arc::clone(&catalog));
        Self::from_parts(catalog, config, scenario, position, arcana)
    }

    /// Starts a new game from `scenario`.
    pub fn from_scenario(
        catalog: Arc<ArcanaCatalog>,
        config: EngineConfig,
        scenario: Scenario,
    ) -> Result<Self, SessionError> {
        let (position, arcana) = scenario.build(&catalog)?;
        Ok(Self::from_parts(catalog, config, scenario, position, arcana))
    }

    fn from_parts(
        catalog: Arc<ArcanaCatalog>,
        config: EngineConfig,
        scenario: Scenario,
        position: Position,
        arcana: ArcanaState,
    ) -> Self {
        let mut session = Self {
            catalog,
            config,
            scenario,
            position,
            arcana: arcana.clone(),
            history: HistoryManager::new(position, arcana),
            turn: Turn::default(),
            notations: Vec::new(),
            active: None,
            result: None,
            expired: Vec::new(),
            thinking: Arc::new(AtomicBool::new(false)),
        };
        session.result = session.detect_result();
        session
    }

    #[inline(always)]
    pub fn position(&self) -> &Position {
        &self.position
    }

    #[inline(always)]
    pub fn arcana(&self) -> &ArcanaState {
        &self.arcana
    }

    #[inline(always)]
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    #[inline(always)]
    pub fn catalog(&self) -> &Arc<ArcanaCatalog> {
        &self.catalog
    }

    #[inline(always)]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline(always)]
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// The result of the game, if it has ended.
    #[inline(always)]
    pub const fn result(&self) -> Option<GameResult> {
        self.result
    }

    /// The arcana whose mode is active, if any.
    #[inline(always)]
    pub fn active_mode(&self) -> Option<&ActiveMode> {
        self.active.as_ref()
    }

    /// Effects that expired when the last turn was committed.
    #[inline(always)]
    pub fn expired(&self) -> &[ExpiredEffect] {
        &self.expired
    }

    /// Returns `true` while a search is running.
    #[inline(always)]
    pub fn is_thinking(&self) -> bool {
        self.thinking.load(Ordering::Relaxed)
    }

    /// FEN of the live position.
    #[inline(always)]
    pub fn fen(&self) -> String {
        self.position.to_fen()
    }

    /// Destinations of every legal move under `mode`, optionally only those starting on `from`.
    ///
    /// Empty whenever the request cannot be honored: while thinking, after the game ended,
    /// when another mode is active, or when the mode's arcana is not held.
    pub fn legal_destinations(&self, mode: MoveMode, from: Option<Square>) -> Bitboard {
        if self.is_thinking() || self.result.is_some() {
            return Bitboard::EMPTY_BOARD;
        }

        let allowed = match &self.active {
            Some(active) => active.mode == mode,
            None => {
                mode == MoveMode::Normal
                    || self
                        .arcana
                        .held_modes(self.position.side_to_move())
                        .contains(&mode)
            }
        };

        if !allowed {
            return Bitboard::EMPTY_BOARD;
        }

        self.position.legal_destinations(mode, from)
    }

    /// Every move that [`GameSession::apply_move`] would accept right now.
    ///
    /// Without an active mode, this includes arcane moves of every arcana the side to move holds.
    pub fn legal_moves(&self) -> MoveList {
        if self.is_thinking() || self.result.is_some() {
            return MoveList::new();
        }

        match &self.active {
            Some(active) => self.position.legal_moves(active.mode),
            None => {
                let modes = self.arcana.held_modes(self.position.side_to_move());
                self.position.all_legal_moves(&modes)
            }
        }
    }

    /// Ensures the position may change.
    fn ensure_mutable(&self) -> Result<(), SessionError> {
        if self.is_thinking() {
            return Err(SessionError::Thinking);
        }
        if let Some(result) = self.result {
            return Err(SessionError::GameOver(result));
        }
        Ok(())
    }

    /// Activates `id` for the side to move.
    ///
    /// Returns `Ok(None)` when the activation was undone straight away because its mode had
    /// nothing to do (a double move with no legal first half); the use is refunded.
    pub fn activate_arcana(&mut self, id: &str) -> Result<Option<Activation>, SessionError> {
        self.ensure_mutable()?;
        if self.active.is_some() || !self.turn.moves.is_empty() {
            return Err(SessionError::ModeActive);
        }

        let color = self.position.side_to_move();
        let activation = self.arcana.activate(id, color, &mut self.position)?;

        match activation {
            Activation::Mode(mode) => {
                if matches!(mode, MoveMode::Dyad(_)) && self.position.legal_moves(mode).is_empty() {
                    self.arcana.revert(id, color)?;
                    info!("{id} has no legal first move and was cancelled");
                    return Ok(None);
                }

                self.turn.activations.push(id.to_string());
                self.active = Some(ActiveMode {
                    id: id.to_string(),
                    mode,
                });
            }
            Activation::Applied => self.turn.activations.push(id.to_string()),
            Activation::Rewind(plies) => {
                if let Err(e) = self.rewind(id, color, plies) {
                    // Nothing was rewound, so the use comes back
                    self.arcana.revert(id, color)?;
                    return Err(e);
                }
            }
        }

        info!("{} activated {id}", color.name());
        Ok(Some(activation))
    }

    /// Leaves the active mode, refunding its arcana and undoing any half-made double move.
    ///
    /// Returns `false` if no mode was active.
    pub fn cancel_active_mode(&mut self) -> Result<bool, SessionError> {
        if self.is_thinking() {
            return Err(SessionError::Thinking);
        }

        let cancelled = match &self.active {
            Some(active) => active.id.clone(),
            // A double move whose first half was made no longer has an active mode
            None if self.position.is_dyad_pending() => match self.dyad_activation() {
                Some(id) => id,
                None => return Ok(false),
            },
            None => return Ok(false),
        };

        self.restart_turn_without(&cancelled)?;
        debug!("Cancelled {cancelled}");
        Ok(true)
    }

    /// The activation that started the double move in progress.
    fn dyad_activation(&self) -> Option<String> {
        self.turn
            .activations
            .iter()
            .rev()
            .find(|id| matches!(self.catalog.mode_of(id), Some(MoveMode::Dyad(_))))
            .cloned()
    }

    /// Rebuilds the turn in progress from its start, re-activating everything except `skipped`.
    ///
    /// Moves made this turn are undone.
    fn restart_turn_without(&mut self, skipped: &str) -> Result<(), SessionError> {
        let grants = std::mem::take(&mut self.turn.grants);
        let mut activations = std::mem::take(&mut self.turn.activations);
        if let Some(i) = activations.iter().rposition(|id| id == skipped) {
            activations.remove(i);
        }

        let start = self.history.current().clone();
        self.position = start.position;
        self.arcana = start.arcana;
        self.turn = Turn::default();
        self.notations.clear();
        self.active = None;

        for grant in grants {
            self.arcana.grant(&grant.id, grant.color, grant.uses)?;
            self.turn.grants.push(grant);
        }
        self.arcana.sync(&mut self.position);

        let color = self.position.side_to_move();
        for id in activations {
            if let Activation::Mode(mode) = self.arcana.activate(&id, color, &mut self.position)? {
                self.active = Some(ActiveMode {
                    id: id.clone(),
                    mode,
                });
            }
            self.turn.activations.push(id);
        }

        Ok(())
    }

    /// Applies `mv` for the side to move.
    ///
    /// With a mode active, `mv` must be one of that mode's moves. Otherwise, an arcane move (or a
    /// double move's first half) spends whichever held arcana produces it.
    pub fn apply_move(&mut self, mv: Move) -> Result<MoveOutcome, SessionError> {
        self.ensure_mutable()?;
        let color = self.position.side_to_move();

        let (mode, implicit) = match &self.active {
            Some(active) => (active.mode, None),
            None if (mv.is_arcane() || mv.is_dyad()) && !self.position.is_dyad_pending() => {
                match self.providing_arcana(mv) {
                    Some((id, mode)) => (mode, Some(id)),
                    None => return Err(SessionError::IllegalMove(mv.to_string())),
                }
            }
            None => (MoveMode::Normal, None),
        };

        if !self.position.legal_moves(mode).contains(&mv) {
            return Err(SessionError::IllegalMove(mv.to_string()));
        }

        if let Some(id) = implicit {
            self.arcana.activate(&id, color, &mut self.position)?;
            self.turn.activations.push(id);
        }

        self.notations.push(mv.san(&self.position));
        self.position.make_move(mv);
        self.turn.moves.push(mv);
        self.active = None;

        if mv.is_dyad() {
            if self.position.legal_moves(MoveMode::Normal).is_empty() {
                if let Some(id) = self.dyad_activation() {
                    self.restart_turn_without(&id)?;
                }
                info!("Double move has no second half and was cancelled");
                return Ok(MoveOutcome::Cancelled);
            }
            return Ok(MoveOutcome::Pending);
        }

        self.commit()
    }

    /// Parses `text` (as accepted by [`Move::from_uci`]) and applies the matching legal move.
    ///
    /// A plain board move is read as a double move's first half while a double move is active.
    pub fn apply_uci(&mut self, text: &str) -> Result<MoveOutcome, SessionError> {
        self.ensure_mutable()?;
        let parsed = Move::from_uci(&self.position, text)?;
        let mv = self
            .legal_moves()
            .into_iter()
            .find(|candidate| same_move(*candidate, parsed))
            .ok_or_else(|| SessionError::IllegalMove(text.to_string()))?;

        self.apply_move(mv)
    }

    /// Applies the move from `from` to `to`, awaiting a promotion choice on `choice` if the move promotes.
    ///
    /// The choice is only awaited when it is needed. A dropped sender cancels the move.
    pub async fn apply_move_with_promotion(
        &mut self,
        from: Square,
        to: Square,
        choice: oneshot::Receiver<PieceKind>,
    ) -> Result<MoveOutcome, SessionError> {
        self.ensure_mutable()?;

        let candidates = self
            .legal_moves()
            .into_iter()
            .filter(|mv| mv.is_board_move() && mv.from() == from && mv.to() == to)
            .collect::<Vec<_>>();

        let mv = match candidates.as_slice() {
            [] => return Err(SessionError::IllegalMove(format!("{from}{to}"))),
            [mv] if mv.promoted().is_none() => *mv,
            _ => {
                let kind = choice.await.map_err(|_| SessionError::PromotionCancelled)?;
                candidates
                    .iter()
                    .find(|mv| mv.promoted() == Some(kind))
                    .copied()
                    .ok_or_else(|| SessionError::IllegalMove(format!("{from}{to}={}", kind.char())))?
            }
        };

        self.apply_move(mv)
    }

    /// The arcana (and its mode) that the side to move would spend to play `mv`.
    fn providing_arcana(&self, mv: Move) -> Option<(String, MoveMode)> {
        self.arcana
            .modes(self.position.side_to_move())
            .into_iter()
            .find(|&(_, mode)| self.position.legal_moves(mode).contains(&mv))
            .map(|(id, mode)| (id.to_string(), mode))
    }

    /// Commits the turn in progress to history, replaying it from the start of the turn.
    fn commit(&mut self) -> Result<MoveOutcome, SessionError> {
        let turn = std::mem::take(&mut self.turn);
        let notation = std::mem::take(&mut self.notations).join("-");

        let start = self.history.current().clone();
        let mut position = start.position;
        let mut arcana = start.arcana;
        let expired = turn.apply(&mut position, &mut arcana)?;

        if position != self.position {
            warn!(
                "Replayed turn {notation} reached {:?} instead of {:?}",
                position.to_fen(),
                self.position.to_fen()
            );
        }

        self.position = position;
        self.arcana = arcana.clone();
        self.history.commit(notation.clone(), turn, position, arcana);
        self.active = None;

        for effect in &expired {
            info!("{effect}");
        }
        self.expired = expired.clone();

        self.result = self.detect_result();
        if let Some(result) = self.result {
            info!("Game over: {result}");
        }

        Ok(MoveOutcome::Committed {
            notation,
            expired,
            result: self.result,
        })
    }

    /// Checks whether the live position ends the game.
    ///
    /// Every mode the side to move holds counts towards having a legal move.
    fn detect_result(&self) -> Option<GameResult> {
        let position = &self.position;
        let color = position.side_to_move();
        let modes = self.arcana.held_modes(color);

        if !position.has_legal_move(&modes) {
            return Some(if position.is_check() {
                GameResult::Checkmate(color.opponent())
            } else {
                GameResult::Stalemate
            });
        }

        if self.history.occurrences(position.key()) >= 3 {
            return Some(GameResult::Repetition);
        }
        if position.can_draw_by_insufficient_material() && !self.arcana.can_add_material() {
            return Some(GameResult::InsufficientMaterial);
        }
        if position.can_draw_by_fifty() {
            return Some(GameResult::FiftyMoves);
        }

        None
    }

    /// Removes the last `plies` turns. The arcana use that caused the rewind stays spent.
    fn rewind(&mut self, id: &str, color: Color, plies: usize) -> Result<(), SessionError> {
        if !self.turn.activations.is_empty() {
            return Err(SessionError::ModeActive);
        }

        // Fails before the cursor moves, so the shown ply stays live
        self.history.rewind(plies)?;

        let snapshot = self.history.latest_mut();
        if snapshot.arcana.uses(id, color) > 0 {
            snapshot.arcana.activate(id, color, &mut snapshot.position)?;
        }

        self.load_current();
        info!("Rewound {plies} plies");
        Ok(())
    }

    /// Activates a rewinding arcana by its identifier; see [`GameSession::activate_arcana`].
    pub fn future_sight(&mut self, id: &str) -> Result<Option<Activation>, SessionError> {
        match self.catalog.get(id).map(|entry| &entry.effect) {
            Some(Effect::FutureSight { .. }) => self.activate_arcana(id),
            Some(_) => Err(SessionError::IllegalMove(format!("{id} does not rewind"))),
            None => Err(ArcanaError::Unknown(id.to_string()).into()),
        }
    }

    /// Moves the history cursor, showing the position at that ply.
    ///
    /// Moves applied from an earlier ply start a new branch.
    pub fn navigate(&mut self, navigation: Navigation) -> Result<usize, SessionError> {
        if self.is_thinking() {
            return Err(SessionError::Thinking);
        }

        let ply = self.history.navigate(navigation);
        self.load_current();
        Ok(ply)
    }

    /// Replaces the live state with the history's state at its cursor, dropping the turn in progress.
    fn load_current(&mut self) {
        let snapshot = self.history.current().clone();
        self.position = snapshot.position;
        self.arcana = snapshot.arcana;
        self.turn = Turn::default();
        self.notations.clear();
        self.active = None;
        self.expired.clear();
        self.result = self.detect_result();
    }

    /// Hands `uses` of `id` to `color` in the live state.
    ///
    /// The grant is logged with the turn in progress, so replaying history hands it out again.
    /// Leaving the turn uncommitted (navigating, rewinding, restarting) drops it.
    pub fn grant_arcana(&mut self, id: &str, color: Color, uses: u8) -> Result<(), SessionError> {
        if self.is_thinking() {
            return Err(SessionError::Thinking);
        }

        self.arcana.grant(id, color, uses)?;
        self.arcana.sync(&mut self.position);
        self.turn.grants.push(ScenarioGrant {
            color,
            id: id.to_string(),
            uses,
        });

        self.result = self.detect_result();
        Ok(())
    }

    /// Starts this game over from its scenario.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        if self.is_thinking() {
            return Err(SessionError::Thinking);
        }

        let (position, arcana) = self.scenario.build(&self.catalog)?;
        self.reset(position, arcana);
        info!("Restarted game from {:?}", self.scenario.fen);
        Ok(())
    }

    /// Starts a new game from `scenario`.
    pub fn new_game(&mut self, scenario: Scenario) -> Result<(), SessionError> {
        if self.is_thinking() {
            return Err(SessionError::Thinking);
        }

        let (position, arcana) = scenario.build(&self.catalog)?;
        self.scenario = scenario;
        self.reset(position, arcana);
        Ok(())
    }

    /// Starts a new game on a randomly shuffled back rank, keeping this scenario's arcana.
    ///
    /// Returns the Scharnagl number of the arrangement.
    pub fn randomize(&mut self) -> Result<usize, SessionError> {
        if self.is_thinking() {
            return Err(SessionError::Thinking);
        }

        let n = rand::rng().random_range(0..960);
        let position = Position::from_960(n)?;
        let (position, arcana) = self.scenario.build_with(position, &self.catalog)?;

        self.scenario.fen = position.to_fen();
        self.reset(position, arcana);
        info!("Randomized game #{n}: {}", self.scenario.fen);
        Ok(n)
    }

    fn reset(&mut self, position: Position, arcana: ArcanaState) {
        self.history = HistoryManager::new(position, arcana);
        self.load_current();
    }

    /// Detaches a search of the live position, marking the session as thinking.
    ///
    /// The session refuses to change until the returned task finishes or [`GameSession::stop_search`] is called.
    pub fn start_search(&self, config: SearchConfig) -> Result<SearchTask, SessionError> {
        self.ensure_mutable()?;
        if self.active.is_some() || !self.turn.moves.is_empty() {
            return Err(SessionError::ModeActive);
        }

        self.thinking.store(true, Ordering::Relaxed);

        let keys = (0..=self.history.cursor())
            .filter_map(|ply| self.history.snapshot(ply))
            .map(|snapshot| snapshot.position.key())
            .collect();

        Ok(SearchTask {
            position: self.position,
            arcana: self.arcana.clone(),
            weights: self.config.eval.clone(),
            keys,
            is_searching: Arc::clone(&self.thinking),
            config,
        })
    }

    /// Search settings from this session's config, starting now.
    pub fn default_search_config(&self) -> SearchConfig {
        SearchConfig::from_defaults(&self.config.search)
    }

    /// Cancels a running search. It returns the best move of its deepest finished iteration.
    pub fn stop_search(&self) {
        self.thinking.store(false, Ordering::Relaxed);
    }

    /// Searches the live position to completion.
    pub async fn think(&self, config: SearchConfig) -> Result<SearchResult, SessionError> {
        let task = self.start_search(config)?;
        Ok(task.run().await)
    }

    /// Searches the live position and reveals the result at `level`.
    pub async fn request_hint(
        &self,
        level: HintLevel,
        config: SearchConfig,
    ) -> Result<Option<Hint>, SessionError> {
        let result = self.think(config).await?;
        Ok(result.hint(level, &self.position))
    }

    /// Searches the live position and plays the best move found.
    pub async fn play_best(&mut self, config: SearchConfig) -> Result<Option<MoveOutcome>, SessionError> {
        let result = self.think(config).await?;
        match result.bestmove {
            Some(mv) => self.apply_move(mv).map(Some),
            None => Ok(None),
        }
    }

    /// The latest committed history entry, if any.
    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.history.entries().last()
    }
}

/// Returns `true` if `candidate` is the generated move that `parsed` describes.
///
/// Parsed moves lack the flags only generation knows, so they are compared by shape.
fn same_move(candidate: Move, parsed: Move) -> bool {
    candidate.from() == parsed.from()
        && candidate.to() == parsed.to()
        && candidate.promoted() == parsed.promoted()
        && candidate.is_arcane() == parsed.is_arcane()
        && (candidate.mode() == parsed.mode() || (candidate.is_dyad() && !parsed.is_arcane()))
}
