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
    time::{Duration, Instant},
};

use anyhow::{bail, Result};
use futures_lite::future::yield_now;
use rand::{prelude::IndexedRandom, Rng};
use tracing::{debug, info};

use crate::{
    tune, ArcanaState, EvalWeights, Evaluator, Move, MoveList, MoveMode, MovePicker, Position,
    Score, SearchDefaults, Square, ZobristKey,
};

/// Maximum depth that can be searched
pub const MAX_DEPTH: usize = 64;

/// The result of a search, containing the best move found, score, and total nodes searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Number of nodes searched.
    pub nodes: u64,

    /// Best move found during the search.
    pub bestmove: Option<Move>,

    /// Evaluation of the position after `bestmove` is made, from the searching side's perspective.
    pub score: Score,

    /// Deepest depth that was searched to completion.
    pub depth: usize,

    /// Principal variation: the line the search expects, starting with `bestmove`.
    pub pv: Vec<Move>,
}

impl Default for SearchResult {
    /// A default search result should initialize to a *very bad* value,
    /// since there isn't a move to play.
    #[inline(always)]
    fn default() -> Self {
        Self {
            nodes: 0,
            bestmove: None,
            score: -Score::INF,
            depth: 0,
            pv: Vec::new(),
        }
    }
}

/// How much of a search result to reveal when giving the player a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HintLevel {
    /// Only the square to move from.
    Origin = 1,
    /// The whole move.
    Move = 2,
    /// The best line, in notation.
    Line = 3,
}

impl TryFrom<u8> for HintLevel {
    type Error = anyhow::Error;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            1 => Ok(Self::Origin),
            2 => Ok(Self::Move),
            3 => Ok(Self::Line),
            _ => bail!("Hint level must be 1, 2, or 3. Got {level}"),
        }
    }
}

/// A hint derived from a [`SearchResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hint {
    Origin(Square),
    Move(Move),
    Line(Vec<String>),
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Origin(square) => write!(f, "{square}"),
            Self::Move(mv) => write!(f, "{mv}"),
            Self::Line(line) => write!(f, "{}", line.join(" ")),
        }
    }
}

impl SearchResult {
    /// Reveals this result at `level`, with notation relative to `position`, the position that was searched.
    ///
    /// Returns `None` if there was no move to play.
    pub fn hint(&self, level: HintLevel, position: &Position) -> Option<Hint> {
        let bestmove = self.bestmove?;
        let hint = match level {
            HintLevel::Origin => Hint::Origin(bestmove.from()),
            HintLevel::Move => Hint::Move(bestmove),
            HintLevel::Line => Hint::Line(line_notation(position, &self.pv)),
        };
        Some(hint)
    }
}

/// Notation of each move of `line`, played one after another from `position`.
pub fn line_notation(position: &Position, line: &[Move]) -> Vec<String> {
    let mut position = *position;
    line.iter()
        .map(|&mv| {
            let san = mv.to_san(&position);
            position.make_move(mv);
            san
        })
        .collect()
}

/// Configuration variables for executing a [`Search`].
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Maximum depth to execute the search.
    pub max_depth: usize,

    /// Node allowance.
    ///
    /// If the search exceeds this many nodes, it will exit as quickly as possible.
    pub max_nodes: u64,

    /// Start time of the search.
    pub starttime: Instant,

    /// Soft limit on search time.
    ///
    /// During iterative deepening, if a search concludes and this timeout is exceeded,
    /// the entire search will exit, since there probably isn't enough time remaining
    /// to conduct a search at a deeper depth.
    pub soft_timeout: Duration,

    /// Hard limit on search time.
    ///
    /// During *any* point in the search, if this limit is exceeded, the search will cancel.
    pub hard_timeout: Duration,

    /// Skip the search entirely and play a quick, mostly random move.
    pub glitch: bool,
}

impl SearchConfig {
    /// Constructs a new [`SearchConfig`] that searches up to `depth`, spending at most `movetime`.
    pub fn new(depth: usize, movetime: Duration) -> Self {
        Self {
            max_depth: depth.clamp(1, MAX_DEPTH),
            hard_timeout: movetime,
            soft_timeout: movetime * tune::soft_timeout_percent!() / 100,
            ..Default::default()
        }
    }

    /// Constructs a new [`SearchConfig`] from the engine's search defaults.
    pub fn from_defaults(defaults: &SearchDefaults) -> Self {
        Self {
            glitch: defaults.glitch,
            ..Self::new(defaults.depth, Duration::from_millis(defaults.movetime_ms))
        }
    }
}

impl Default for SearchConfig {
    /// A default [`SearchConfig`] will permit an "infinite" search.
    ///
    /// The word "infinite" is quoted here because the actual defaults are the `::MAX` values for each field.
    #[inline(always)]
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_nodes: u64::MAX,
            starttime: Instant::now(),
            soft_timeout: Duration::MAX,
            hard_timeout: Duration::MAX,
            glitch: false,
        }
    }
}

/// Executes a search on the provided position at a specified depth.
///
/// Every node is a copy of both the [`Position`] and the [`ArcanaState`], so arcane moves spend
/// their arcana and timers tick exactly as they would in the game.
pub struct Search<'a> {
    /// The position to search on.
    position: &'a Position,

    /// Arcana held by both players at the root.
    arcana: &'a ArcanaState,

    /// Weights used to evaluate leaves.
    weights: &'a EvalWeights,

    /// The result of the search, updated as-needed during search.
    result: SearchResult,

    /// An atomic flag to determine if the search should be cancelled at any time.
    ///
    /// If this is ever `false`, the search will exit as soon as possible.
    is_searching: Arc<AtomicBool>,

    /// Configuration variables for this instance of the search.
    config: SearchConfig,

    /// Signatures of every position from the start of the game to the current node.
    path: Vec<ZobristKey>,
}

impl<'a> Search<'a> {
    /// Construct a new [`Search`] instance to execute on the provided [`Position`].
    #[inline(always)]
    pub fn new(
        position: &'a Position,
        arcana: &'a ArcanaState,
        weights: &'a EvalWeights,
        is_searching: Arc<AtomicBool>,
        config: SearchConfig,
    ) -> Self {
        Self {
            position,
            arcana,
            weights,
            result: SearchResult::default(),
            is_searching,
            config,
            path: Vec::new(),
        }
    }

    /// Signatures of the positions that led to the root, used to detect repetitions inside the tree.
    ///
    /// The root itself may be included.
    pub fn with_history(mut self, keys: impl IntoIterator<Item = ZobristKey>) -> Self {
        self.path = keys.into_iter().collect();
        self.path.retain(|&key| key != self.position.key());
        self
    }

    /// Start the search, returning its results.
    ///
    /// This is the entrypoint of the search. It yields to the executor between iterations
    /// and between root moves, and clears the search flag once it concludes.
    pub async fn start(mut self) -> SearchResult {
        debug!("Starting search on {:?}", self.position.to_fen());

        let res = if self.config.glitch {
            self.glitch()
        } else {
            self.iterative_deepening().await
        };

        if let Some(mv) = res.bestmove {
            info!(
                "bestmove {mv} score {} depth {} nodes {}",
                res.score.describe(),
                res.depth,
                res.nodes
            );
        }

        // Search has concluded, alert other threads that we are no longer searching
        self.is_searching.store(false, Ordering::Relaxed);

        res
    }

    /// Performs [iterative deepening](https://www.chessprogramming.org/Iterative_Deepening) (ID) on the Search's position.
    ///
    /// The best move of each iteration is searched first in the next one.
    /// After each iteration, we check if we've exceeded our `soft_timeout` and, if we haven't, we run a search at a greater depth.
    /// The result of a cancelled iteration is discarded.
    ///
    /// Depth 1 always runs to completion unless the search is stopped, so a move is found under any time budget.
    async fn iterative_deepening(&mut self) -> SearchResult {
        // Start at depth 1 because a search at depth 0 makes no sense
        let mut depth = 1;

        // Save the result of the search to an external variable.
        // If any search iteration was cancelled, we can't trust `self.result` anymore.
        let mut res = self.result.clone();

        // The actual Iterative Deepening loop
        while (depth == 1 || self.config.starttime.elapsed() < self.config.soft_timeout)
            && self.is_searching.load(Ordering::Relaxed)
            && depth <= self.config.max_depth
        {
            // If the search returned an error, it was cancelled, so exit the iterative deepening loop.
            if let Err(e) = self.search_root(depth, res.bestmove).await {
                debug!(
                    "Search cancelled during depth {depth}: {e}. Falling back to depth {}",
                    depth - 1
                );
                break;
            }

            // If the search at the next depth succeeded, update the result.
            res = self.result.clone();

            let elapsed = self.config.starttime.elapsed();
            debug!(
                "depth {depth} score {} nodes {} time {}ms pv {}",
                res.score.describe(),
                res.nodes,
                elapsed.as_millis(),
                res.pv
                    .iter()
                    .map(|mv| mv.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            );

            // Nothing to search, or a forced mate was found within the horizon
            if res.bestmove.is_none()
                || (res.score.is_mate() && res.score.plies_to_mate() <= depth as i32)
            {
                break;
            }

            depth += 1;
            yield_now().await;
        }

        // Node counts from a cancelled iteration still count
        res.nodes = self.result.nodes;
        res
    }

    /// Searches every root move at `depth`, yielding after each one.
    ///
    /// On success, `self.result` holds the best move, score, and line for this depth.
    async fn search_root(&mut self, depth: usize, previous: Option<Move>) -> Result<()> {
        let position = *self.position;
        let arcana = self.arcana.clone();
        let moves = node_moves(&position, &arcana);

        if moves.is_empty() {
            self.result.bestmove = None;
            self.result.pv.clear();
            self.result.score = if position.is_check() {
                -Score::MATE
            } else {
                Score::DRAW
            };
            self.result.depth = depth;
            return Ok(());
        }

        let mut alpha = -Score::INF;
        let beta = Score::INF;
        let mut best = None;
        let mut best_score = -Score::INF;
        let mut best_pv = Vec::new();

        self.path.push(position.key());
        for (mv, _) in MovePicker::for_search(moves, &position, previous) {
            let (child, child_arcana) = make(&position, &arcana, mv);

            let mut child_pv = Vec::new();
            let score = self.negamax(&child, &child_arcana, depth - 1, 1, -beta, -alpha, &mut child_pv);
            let score = match score {
                Ok(score) => -score,
                Err(e) => {
                    self.path.pop();
                    return Err(e);
                }
            };

            if score > best_score {
                best_score = score;
                best = Some(mv);
                best_pv.clear();
                best_pv.push(mv);
                best_pv.extend(child_pv);
            }
            alpha = alpha.max(score);

            yield_now().await;
        }
        self.path.pop();

        self.result.bestmove = best;
        self.result.score = best_score;
        self.result.pv = best_pv;
        self.result.depth = depth;

        Ok(())
    }

    /// Primary location of search logic.
    ///
    /// Uses the [negamax](https://www.chessprogramming.org/Negamax) algorithm with fail-soft alpha-beta pruning.
    /// The best line from this node is written to `pv`.
    #[allow(clippy::too_many_arguments)]
    fn negamax(
        &mut self,
        position: &Position,
        arcana: &ArcanaState,
        depth: usize,
        ply: i32,
        mut alpha: Score,
        beta: Score,
        pv: &mut Vec<Move>,
    ) -> Result<Score> {
        self.result.nodes += 1;
        self.check_limits()?;

        // Draws inside the tree
        if position.can_draw_by_fifty()
            || (position.can_draw_by_insufficient_material() && !arcana.can_add_material())
            || self.path.contains(&position.key())
        {
            return Ok(Score::DRAW);
        }

        let moves = node_moves(position, arcana);

        // If there are no legal moves, it's either mate or a draw.
        if moves.is_empty() {
            let score = if position.is_check() {
                Score::mated_in(ply)
            } else {
                // Drawing is better than losing
                Score::DRAW
            };

            return Ok(score);
        }

        // If we've reached a terminal node, evaluate the position
        if depth == 0 {
            return Ok(Evaluator::new(position, self.weights).eval());
        }

        // Start with a *really bad* initial score
        let mut best = -Score::INF;

        self.path.push(position.key());
        for (mv, _) in MovePicker::for_search(moves, position, None) {
            // Copy-make the new position
            let (child, child_arcana) = make(position, arcana, mv);

            // Recurse
            let mut child_pv = Vec::new();
            let score = match self.negamax(
                &child,
                &child_arcana,
                depth - 1,
                ply + 1,
                -beta,
                -alpha,
                &mut child_pv,
            ) {
                Ok(score) => -score,
                Err(e) => {
                    self.path.pop();
                    return Err(e);
                }
            };

            if score > best {
                best = score;

                if score > alpha {
                    alpha = score;
                    pv.clear();
                    pv.push(mv);
                    pv.extend(child_pv);
                }

                if score >= beta {
                    break;
                }
            }
        }
        self.path.pop();

        Ok(best)
    }

    /// Cancels the search if it was stopped, or ran out of time or nodes.
    #[inline(always)]
    fn check_limits(&self) -> Result<()> {
        // The search was stopped by an external factor
        if !self.is_searching.load(Ordering::Relaxed) {
            bail!("cancelled by external command");
        }

        // Budgets only apply once an iteration has completed
        if self.result.depth == 0 {
            return Ok(());
        }

        // The clock is only read every so often
        if self.result.nodes % tune::nodes_between_checks!() == 0
            && self.config.starttime.elapsed() >= self.config.hard_timeout
        {
            let ms = self.config.hard_timeout.as_millis();
            bail!("exceeded hard timeout of {ms}ms");
        }

        if self.result.nodes >= self.config.max_nodes {
            let nodes = self.config.max_nodes;
            bail!("exceeded node allowance of {nodes} nodes");
        }

        Ok(())
    }

    /// Chooses a move without searching: a capture half of the time when one exists, otherwise any move.
    fn glitch(&mut self) -> SearchResult {
        let mut res = self.result.clone();
        let moves = node_moves(self.position, self.arcana);

        let mut rng = rand::rng();
        let captures = moves
            .iter()
            .copied()
            .filter(|mv| mv.is_capture())
            .collect::<Vec<_>>();

        let choice = if !captures.is_empty()
            && rng.random_range(0..100) < tune::glitch_capture_percent!()
        {
            captures.choose(&mut rng).copied()
        } else {
            moves.choose(&mut rng).copied()
        };

        match choice {
            Some(mv) => {
                let (child, _) = make(self.position, self.arcana, mv);
                // This is from the opponent's perspective, so we need to negate the score.
                res.score = -Evaluator::new(&child, self.weights).eval();
                res.bestmove = Some(mv);
                res.pv = vec![mv];
                res.depth = 1;
                res.nodes = 1;
            }
            None => {
                res.score = if self.position.is_check() {
                    -Score::MATE
                } else {
                    Score::DRAW
                };
            }
        }

        debug!("Glitched into {:?}", res.bestmove);
        res
    }
}

/// Every move considered by the search: normal moves plus any summon, royalty, swap, or offering the side to move holds.
///
/// Teleports and double moves are left to players.
pub fn node_moves(position: &Position, arcana: &ArcanaState) -> MoveList {
    let modes = arcana
        .held_modes(position.side_to_move())
        .into_iter()
        .filter(|mode| {
            matches!(
                mode,
                MoveMode::Summon(_) | MoveMode::Royalty(_) | MoveMode::Swap(_) | MoveMode::Offering(_)
            )
        })
        .collect::<Vec<_>>();

    position.all_legal_moves(&modes)
}

/// Copy-makes `mv`, spending the arcana it draws on and advancing every timer by one ply.
fn make(position: &Position, arcana: &ArcanaState, mv: Move) -> (Position, ArcanaState) {
    let mut arcana = arcana.clone();
    if mv.is_arcane() {
        arcana.spend_for(position, mv);
    }

    let mut child = position.with_move_made(mv);
    arcana.tick(&mut child);

    (child, arcana)
}

#[cfg(test)]
mod tests {
    use futures_lite::future::block_on;

    use super::*;
    use crate::{ArcanaCatalog, Color};

    fn arcana() -> ArcanaState {
        ArcanaState::new(Arc::new(ArcanaCatalog::builtin().unwrap()))
    }

    fn search(fen: &str, arcana: &ArcanaState, config: SearchConfig) -> SearchResult {
        let is_searching = Arc::new(AtomicBool::new(true));
        let position = fen.parse().unwrap();
        let weights = EvalWeights::default();
        let search = Search::new(&position, arcana, &weights, is_searching, config);
        block_on(search.start())
    }

    fn ensure_is_mate_in(fen: &str, config: SearchConfig, moves: i32) {
        let res = search(fen, &arcana(), config);
        assert!(
            res.score.is_mate(),
            "Search on {fen:?} with config {config:#?} produced result that is not mate.\nResult: {res:#?}"
        );
        assert_eq!(
            res.score.moves_to_mate(),
            moves,
            "Search on {fen:?} with config {config:#?} produced result not mate in {moves}.\nResult: {res:#?}"
        );
    }

    #[test]
    fn test_white_mate_in_1() {
        let fen = "k7/8/KQ6/8/8/8/8/8 w - - 0 1";
        let config = SearchConfig {
            max_depth: 2,
            ..Default::default()
        };

        ensure_is_mate_in(fen, config, 1);
    }

    #[test]
    fn test_black_mated_in_1() {
        let fen = "1k6/8/KQ6/2Q5/8/8/8/8 b - - 0 1";
        let config = SearchConfig {
            max_depth: 3,
            ..Default::default()
        };

        ensure_is_mate_in(fen, config, -1);
    }

    #[test]
    fn test_mate_in_1_at_depth_1() {
        // Back-rank mate: Ra8#
        let fen = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1";
        let config = SearchConfig {
            max_depth: 1,
            ..Default::default()
        };

        let res = search(fen, &arcana(), config);
        assert_eq!(res.bestmove.map(|mv| mv.to_string()), Some(String::from("a1a8")));
        assert_eq!(res.depth, 1);
        assert_eq!(res.pv.len(), 1);
    }

    #[test]
    fn test_depth_1_completes_without_time() {
        let fen = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1";

        let res = search(fen, &arcana(), SearchConfig::new(1, Duration::ZERO));
        assert_eq!(res.bestmove.map(|mv| mv.to_string()), Some(String::from("a1a8")));
        assert_eq!(res.depth, 1);

        // Budgets stop deeper iterations, not the first one
        let config = SearchConfig {
            max_nodes: 1,
            ..SearchConfig::new(8, Duration::ZERO)
        };
        let res = search(crate::FEN_KIWIPETE, &arcana(), config);
        assert!(res.bestmove.is_some());
        assert_eq!(res.depth, 1);
    }

    #[test]
    fn test_stalemate() {
        let fen = "k7/8/KQ6/8/8/8/8/8 b - - 0 1";
        let res = search(fen, &arcana(), SearchConfig::default());
        assert!(res.bestmove.is_none());
        assert_eq!(res.score, Score::DRAW);
    }

    #[test]
    fn test_summon_escapes_stalemate() {
        // No board moves, but a held summon
        let fen = "k7/8/KQ6/8/8/8/8/8 b - - 0 1";
        let mut arcana = arcana();
        arcana.grant("sumnN", Color::Black, 1).unwrap();

        let config = SearchConfig {
            max_depth: 1,
            ..Default::default()
        };
        let res = search(fen, &arcana, config);
        assert!(res.bestmove.is_some_and(|mv| mv.is_summon()));
    }

    #[test]
    fn test_pv_starts_with_bestmove() {
        let config = SearchConfig {
            max_depth: 3,
            ..Default::default()
        };
        let res = search(crate::FEN_KIWIPETE, &arcana(), config);
        assert_eq!(res.depth, 3);
        assert_eq!(res.pv.first().copied(), res.bestmove);
        assert!(res.nodes > 0);
    }

    #[test]
    fn test_stopped_search_returns_nothing_deeper() {
        let is_searching = Arc::new(AtomicBool::new(false));
        let position = Position::default();
        let arcana = arcana();
        let weights = EvalWeights::default();
        let search = Search::new(&position, &arcana, &weights, is_searching, SearchConfig::default());
        let res = block_on(search.start());
        assert!(res.bestmove.is_none());
        assert_eq!(res.depth, 0);
    }

    #[test]
    fn test_glitch_returns_legal_move() {
        let config = SearchConfig {
            glitch: true,
            ..Default::default()
        };
        let res = search(crate::FEN_STARTPOS, &arcana(), config);
        let position = Position::default();
        let mv = res.bestmove.unwrap();
        assert!(position.legal_moves(MoveMode::Normal).contains(&mv));
    }

    #[test]
    fn test_hint_levels() {
        let config = SearchConfig {
            max_depth: 1,
            ..Default::default()
        };
        let fen = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1";
        let res = search(fen, &arcana(), config);
        let position = Position::from_fen(fen).unwrap();

        assert_eq!(
            res.hint(HintLevel::Origin, &position),
            Some(Hint::Origin(Square::A1))
        );
        assert_eq!(
            res.hint(HintLevel::Line, &position),
            Some(Hint::Line(vec![String::from("Ra8#")]))
        );
        assert!(HintLevel::try_from(4).is_err());
    }

    #[test]
    fn test_with_history_skips_root() {
        let position = Position::default();
        let arcana = arcana();
        let weights = EvalWeights::default();
        let is_searching = Arc::new(AtomicBool::new(true));
        let search = Search::new(&position, &arcana, &weights, is_searching, SearchConfig::default())
            .with_history([position.key()]);
        assert!(search.path.is_empty());
    }
}
