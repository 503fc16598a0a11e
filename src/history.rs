/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use tracing::debug;

use crate::{
    Activation, ArcanaError, ArcanaState, ExpiredEffect, Move, Position, ScenarioGrant,
    SessionError, Square, ZobristKey,
};

/// Everything that happened during one turn: arcana handed out, the arcana the player activated,
/// then the move(s) they made.
///
/// A turn holds two moves only when the first is the first half of a double move.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Turn {
    /// Uses granted to either player before the turn was committed.
    pub grants: Vec<ScenarioGrant>,

    /// Arcana activated before moving, in order.
    pub activations: Vec<String>,

    /// Moves made, in order.
    pub moves: Vec<Move>,
}

impl Turn {
    /// A turn consisting of a single move and no arcana.
    pub fn single(mv: Move) -> Self {
        Self {
            grants: Vec::new(),
            activations: Vec::new(),
            moves: vec![mv],
        }
    }

    /// Plays this turn onto `position`: grants first, then activations, then the moves, and
    /// finally every timer advances by one ply.
    ///
    /// Activations that switch the move generator into a mode are completed after the moves are made.
    pub fn apply(
        &self,
        position: &mut Position,
        arcana: &mut ArcanaState,
    ) -> Result<Vec<ExpiredEffect>, ArcanaError> {
        let color = position.side_to_move();

        for grant in &self.grants {
            arcana.grant(&grant.id, grant.color, grant.uses)?;
        }
        if !self.grants.is_empty() {
            arcana.sync(position);
        }

        let mut pending = Vec::new();
        for id in &self.activations {
            if let Activation::Mode(_) = arcana.activate(id, color, position)? {
                pending.push(id.as_str());
            }
        }

        position.make_moves(self.moves.iter().copied());

        for id in pending {
            arcana.complete(id, color, position)?;
        }

        Ok(arcana.tick(position))
    }
}

/// A single record of the game log.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct HistoryEntry {
    /// FEN of the position reached after this turn.
    pub fen: String,

    /// Notation of the turn, such as `Nf3` or `e4-e5` for a double move.
    pub notation: String,

    /// Origin of the turn's first move, for highlighting.
    pub from: Square,

    /// Destination of the turn's last move, for highlighting.
    pub to: Square,

    /// What was played, so that the log can be replayed.
    pub turn: Turn,
}

/// Exact game state at a point in history.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub position: Position,
    pub arcana: ArcanaState,
}

/// Where to move the read cursor of a [`HistoryManager`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Navigation {
    Back,
    Forward,
    Start,
    End,
    /// Jump to a specific ply, clamped to the length of the log.
    Jump(usize),
}

/// Append-only game log with a movable read cursor.
///
/// `snapshots[0]` is the initial state, and `snapshots[i + 1]` is the state after `entries[i]`.
/// The cursor is a ply in `0..=len()`; whatever is shown to the player is `snapshots[cursor]`.
#[derive(Clone, Debug)]
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
    snapshots: Vec<Snapshot>,
    cursor: usize,
}

impl HistoryManager {
    /// Starts a new log at the provided state.
    pub fn new(position: Position, arcana: ArcanaState) -> Self {
        Self {
            entries: Vec::new(),
            snapshots: vec![Snapshot { position, arcana }],
            cursor: 0,
        }
    }

    /// Records a turn that led to `position` and `arcana`.
    ///
    /// Any entries after the cursor are discarded first, so committing from an earlier point starts a new branch.
    pub fn commit(
        &mut self,
        notation: String,
        turn: Turn,
        position: Position,
        arcana: ArcanaState,
    ) -> &HistoryEntry {
        self.entries.truncate(self.cursor);
        self.snapshots.truncate(self.cursor + 1);

        let from = turn.moves.first().map(|mv| mv.from()).unwrap_or_default();
        let to = turn.moves.last().map(|mv| mv.to()).unwrap_or_default();

        self.entries.push(HistoryEntry {
            fen: position.to_fen(),
            notation,
            from,
            to,
            turn,
        });
        self.snapshots.push(Snapshot { position, arcana });
        self.cursor = self.entries.len();

        let index = self.cursor - 1;
        debug!("Committed ply {}: {}", self.cursor, self.entries[index].notation);
        &self.entries[index]
    }

    /// Moves the cursor without changing the log, returning the new cursor.
    pub fn navigate(&mut self, navigation: Navigation) -> usize {
        self.cursor = match navigation {
            Navigation::Back => self.cursor.saturating_sub(1),
            Navigation::Forward => (self.cursor + 1).min(self.len()),
            Navigation::Start => 0,
            Navigation::End => self.len(),
            Navigation::Jump(ply) => ply.min(self.len()),
        };
        self.cursor
    }

    /// Removes the last `plies` entries, moving the cursor to the new end.
    ///
    /// Returns the snapshot that is now the latest.
    pub fn rewind(&mut self, plies: usize) -> Result<&Snapshot, SessionError> {
        if plies > self.len() {
            return Err(SessionError::RewindTooFar {
                requested: plies,
                available: self.len(),
            });
        }

        let len = self.len() - plies;
        self.entries.truncate(len);
        self.snapshots.truncate(len + 1);
        self.cursor = len;
        debug!("Rewound {plies} plies to ply {len}");

        Ok(self.latest())
    }

    /// The state at the cursor.
    #[inline(always)]
    pub fn current(&self) -> &Snapshot {
        &self.snapshots[self.cursor]
    }

    /// The state after the last entry.
    #[inline(always)]
    pub fn latest(&self) -> &Snapshot {
        &self.snapshots[self.len()]
    }

    /// Mutable access to the state after the last entry.
    #[inline(always)]
    pub(crate) fn latest_mut(&mut self) -> &mut Snapshot {
        let len = self.len();
        &mut self.snapshots[len]
    }

    /// The state at `ply`, if the log reaches that far.
    #[inline(always)]
    pub fn snapshot(&self, ply: usize) -> Option<&Snapshot> {
        self.snapshots.get(ply)
    }

    /// FEN of the position at the cursor.
    #[inline(always)]
    pub fn current_fen(&self) -> String {
        self.current().position.to_fen()
    }

    /// FENs of every position in the log, starting with the initial one.
    pub fn fens(&self) -> impl Iterator<Item = String> + '_ {
        self.snapshots.iter().map(|snapshot| snapshot.position.to_fen())
    }

    #[inline(always)]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns `true` if the cursor is on the latest entry.
    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.cursor == self.len()
    }

    /// Number of committed turns.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline(always)]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Number of times `key` occurs among the positions up to and including the cursor.
    pub fn occurrences(&self, key: ZobristKey) -> usize {
        self.snapshots[..=self.cursor]
            .iter()
            .filter(|snapshot| snapshot.position.key() == key)
            .count()
    }

    /// Replays the first `plies` turns from the initial state, returning the resulting position.
    pub fn replay(&self, plies: usize) -> Result<Position, ArcanaError> {
        let initial = &self.snapshots[0];
        let mut position = initial.position;
        let mut arcana = initial.arcana.clone();

        for entry in self.entries.iter().take(plies) {
            entry.turn.apply(&mut position, &mut arcana)?;
        }

        Ok(position)
    }

    /// Returns `true` if replaying every prefix of the log reproduces its recorded FEN.
    pub fn is_consistent(&self) -> bool {
        self.fens()
            .enumerate()
            .all(|(ply, fen)| self.replay(ply).is_ok_and(|pos| pos.to_fen() == fen))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::*;

    fn start() -> (Position, ArcanaState) {
        let catalog = Arc::new(ArcanaCatalog::builtin().unwrap());
        (Position::default(), ArcanaState::new(catalog))
    }

    fn play(history: &mut HistoryManager, uci: &str) {
        let Snapshot {
            mut position,
            mut arcana,
        } = history.latest().clone();
        let mv = Move::from_uci(&position, uci).unwrap();
        let notation = mv.to_san(&position);
        let turn = Turn::single(mv);
        turn.apply(&mut position, &mut arcana).unwrap();
        history.commit(notation, turn, position, arcana);
    }

    #[test]
    fn test_commit_and_navigate() {
        let (pos, arcana) = start();
        let mut history = HistoryManager::new(pos, arcana);
        for mv in ["e2e4", "e7e5", "g1f3"] {
            play(&mut history, mv);
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 3);
        assert_eq!(history.entries()[2].notation, "Nf3");
        assert_eq!(history.entries()[2].from, Square::G1);
        assert_eq!(history.entries()[2].to, Square::F3);

        assert_eq!(history.navigate(Navigation::Back), 2);
        assert_eq!(history.navigate(Navigation::Start), 0);
        assert_eq!(history.current_fen(), FEN_STARTPOS);
        assert_eq!(history.navigate(Navigation::Back), 0);
        assert_eq!(history.navigate(Navigation::Jump(10)), 3);
        assert_eq!(history.navigate(Navigation::Forward), 3);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_commit_branches_from_cursor() {
        let (pos, arcana) = start();
        let mut history = HistoryManager::new(pos, arcana);
        for mv in ["e2e4", "e7e5", "g1f3"] {
            play(&mut history, mv);
        }

        history.navigate(Navigation::Jump(1));
        let Snapshot {
            mut position,
            mut arcana,
        } = history.current().clone();
        let mv = Move::from_uci(&position, "c7c5").unwrap();
        let turn = Turn::single(mv);
        turn.apply(&mut position, &mut arcana).unwrap();
        history.commit(String::from("c5"), turn, position, arcana);

        assert_eq!(history.len(), 2);
        assert_eq!(history.entries()[1].notation, "c5");
        assert!(history.is_consistent());
    }

    #[test]
    fn test_rewind() {
        let (pos, arcana) = start();
        let mut history = HistoryManager::new(pos, arcana);
        for mv in ["e2e4", "e7e5", "g1f3", "b8c6"] {
            play(&mut history, mv);
        }

        let fen_after_two = history.entries()[1].fen.clone();
        let snapshot = history.rewind(2).unwrap();
        assert_eq!(snapshot.position.to_fen(), fen_after_two);
        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), 2);

        assert!(matches!(
            history.rewind(3),
            Err(SessionError::RewindTooFar {
                requested: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn test_replay_matches_fens() {
        let (pos, arcana) = start();
        let mut history = HistoryManager::new(pos, arcana);
        for mv in ["e2e4", "d7d5", "e4d5", "d8d5", "b1c3"] {
            play(&mut history, mv);
        }

        for (ply, fen) in history.fens().enumerate() {
            assert_eq!(history.replay(ply).unwrap().to_fen(), fen);
        }
        assert!(history.is_consistent());
    }

    #[test]
    fn test_occurrences() {
        let (pos, arcana) = start();
        let key = pos.key();
        let mut history = HistoryManager::new(pos, arcana);
        for mv in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            play(&mut history, mv);
        }
        assert_eq!(history.occurrences(key), 2);
    }
}
