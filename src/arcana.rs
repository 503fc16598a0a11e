/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{ArcanaError, Color, Effects, Move, MoveMode, PieceKind, Position, Square};

/// The catalog that ships with the engine.
pub const DEFAULT_CATALOG: &str = include_str!("../data/arcana.json");

/// Broad family of an arcana, as shown to players.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Summon,
    Dyad,
    Shift,
    Swap,
    Offer,
    Modifier,
    Gain,
    Token,
}

impl Category {
    /// Returns `true` if an arcana of this category may carry `effect`.
    pub fn fits(&self, effect: &Effect) -> bool {
        use Effect::*;
        match self {
            Self::Summon => matches!(effect, Summon { .. } | Royalty { .. }),
            Self::Dyad => matches!(effect, Dyad { .. }),
            Self::Shift => matches!(effect, Shift { .. }),
            Self::Swap => matches!(effect, Swap { .. }),
            Self::Offer => matches!(effect, Offering { .. }),
            Self::Modifier => matches!(
                effect,
                Teleport
                    | Charge
                    | Shogun
                    | Regency
                    | Bulletproof { .. }
                    | Cloak { .. }
                    | FutureSight { .. }
            ),
            Self::Gain => matches!(effect, Gain { .. }),
            Self::Token => matches!(
                effect,
                Bulletproof { .. } | Cloak { .. } | Gain { .. } | FutureSight { .. }
            ),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Summon => "summon",
            Self::Dyad => "dyad",
            Self::Shift => "shift",
            Self::Swap => "swap",
            Self::Offer => "offer",
            Self::Modifier => "modifier",
            Self::Gain => "gain",
            Self::Token => "token",
        };
        write!(f, "{name}")
    }
}

/// A number of uses of an arcana, handed out by gains, offerings, and scenarios.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Grant {
    pub id: String,
    pub uses: u8,
}

/// What an arcana does once activated (or, for passive effects, while held).
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Place a new piece on the back ranks.
    Summon { piece: PieceKind },
    /// Mark a friendly piece's square with royalty.
    Royalty { piece: PieceKind },
    /// Exchange two adjacent friendly pieces.
    Swap {
        #[serde(default)]
        piece: Option<PieceKind>,
    },
    /// Sacrifice a piece, receiving `grants` once the sacrifice is made.
    Offering {
        piece: PieceKind,
        #[serde(default)]
        grants: Vec<Grant>,
    },
    /// Move a non-King piece to any empty square.
    Teleport,
    /// Make two moves in one turn.
    Dyad {
        #[serde(default)]
        piece: Option<PieceKind>,
    },
    /// Passive: alternate one-step moveset for a kind.
    Shift { piece: PieceKind },
    /// Passive: pawns may capture at the end of a double step.
    Charge,
    /// Passive: Kings also leap like Knights.
    Shogun,
    /// Passive: with several Kings, only all of them being attacked is check.
    Regency,
    /// Block every capture for a number of plies.
    Bulletproof { plies: u8 },
    /// The caster's pieces of a kind cannot be captured for a number of plies.
    Cloak { piece: PieceKind, plies: u8 },
    /// Receive uses of other arcana.
    Gain { grants: Vec<Grant> },
    /// Rewind the game by a number of plies.
    FutureSight { plies: usize },
}

impl Effect {
    /// The [`MoveMode`] this effect switches the move generator into, if any.
    pub fn mode(&self) -> Option<MoveMode> {
        match *self {
            Self::Summon { piece } => Some(MoveMode::Summon(piece)),
            Self::Royalty { piece } => Some(MoveMode::Royalty(piece)),
            Self::Swap { piece } => Some(MoveMode::Swap(piece)),
            Self::Offering { piece, .. } => Some(MoveMode::Offering(piece)),
            Self::Teleport => Some(MoveMode::Teleport),
            Self::Dyad { piece } => Some(MoveMode::Dyad(piece)),
            _ => None,
        }
    }

    /// Returns `true` for effects that apply for as long as they are held, rather than on activation.
    pub const fn is_passive(&self) -> bool {
        matches!(
            self,
            Self::Shift { .. } | Self::Charge | Self::Shogun | Self::Regency
        )
    }

    /// Name of this effect's tag.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Summon { .. } => "summon",
            Self::Royalty { .. } => "royalty",
            Self::Swap { .. } => "swap",
            Self::Offering { .. } => "offering",
            Self::Teleport => "teleport",
            Self::Dyad { .. } => "dyad",
            Self::Shift { .. } => "shift",
            Self::Charge => "charge",
            Self::Shogun => "shogun",
            Self::Regency => "regency",
            Self::Bulletproof { .. } => "bulletproof",
            Self::Cloak { .. } => "cloak",
            Self::Gain { .. } => "gain",
            Self::FutureSight { .. } => "future_sight",
        }
    }
}

/// A single record of the arcana catalog.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ArcanaEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    /// Inherent arcana are never used up.
    #[serde(default)]
    pub inherent: bool,
    pub effect: Effect,
}

impl ArcanaEntry {
    /// Returns `true` if activating this arcana never spends a use.
    ///
    /// Passive effects are always inherent.
    #[inline(always)]
    pub const fn is_inherent(&self) -> bool {
        self.inherent || self.effect.is_passive()
    }
}

/// Read-only collection of every known arcana, shared between games.
#[derive(Clone, Debug, Default)]
pub struct ArcanaCatalog {
    entries: Vec<ArcanaEntry>,
    index: HashMap<String, usize>,
}

impl ArcanaCatalog {
    /// Builds a catalog from `entries`, checking that every entry's effect fits its category
    /// and that identifiers are unique.
    pub fn new(entries: Vec<ArcanaEntry>) -> Result<Self, ArcanaError> {
        let mut index = HashMap::with_capacity(entries.len());

        for (i, entry) in entries.iter().enumerate() {
            if !entry.category.fits(&entry.effect) {
                return Err(ArcanaError::Mismatch {
                    id: entry.id.clone(),
                    category: entry.category,
                    effect: entry.effect.name(),
                });
            }

            if index.insert(entry.id.clone(), i).is_some() {
                return Err(ArcanaError::Duplicate(entry.id.clone()));
            }
        }

        // Grants must refer to entries that exist
        for entry in &entries {
            let grants: &[Grant] = match &entry.effect {
                Effect::Gain { grants } | Effect::Offering { grants, .. } => grants,
                _ => &[],
            };
            if let Some(grant) = grants.iter().find(|g| !index.contains_key(&g.id)) {
                return Err(ArcanaError::Unknown(grant.id.clone()));
            }
        }

        debug!("Loaded arcana catalog with {} entries", entries.len());
        Ok(Self { entries, index })
    }

    /// Parses a catalog from a JSON array of entries.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let json = r#"[{ "id": "sumnN", "name": "Summon Knight", "category": "summon",
    ///                  "effect": { "type": "summon", "piece": "knight" } }]"#;
    /// let catalog = ArcanaCatalog::from_json(json).unwrap();
    /// assert_eq!(catalog.mode_of("sumnN"), Some(MoveMode::Summon(PieceKind::Knight)));
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ArcanaError> {
        let entries: Vec<ArcanaEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// The catalog that ships with the engine.
    pub fn builtin() -> Result<Self, ArcanaError> {
        Self::from_json(DEFAULT_CATALOG)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the entry `id` within this catalog.
    #[inline(always)]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    #[inline(always)]
    pub fn get(&self, id: &str) -> Option<&ArcanaEntry> {
        self.index_of(id).map(|i| &self.entries[i])
    }

    #[inline(always)]
    pub fn entry(&self, index: usize) -> Option<&ArcanaEntry> {
        self.entries.get(index)
    }

    /// The [`MoveMode`] the entry `id` switches the generator into, if any.
    pub fn mode_of(&self, id: &str) -> Option<MoveMode> {
        self.get(id).and_then(|entry| entry.effect.mode())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArcanaEntry> {
        self.entries.iter()
    }
}

/// What activating an arcana asks of the caller.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Activation {
    /// The move generator should switch to this mode until a move is made or the mode is cancelled.
    Mode(MoveMode),
    /// The effect has been applied in full.
    Applied,
    /// The game should be rewound by this many plies.
    Rewind(usize),
}

/// Notification that something timed out during [`ArcanaState::tick`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ExpiredEffect {
    /// The royalty mark on `square` faded.
    Royalty { square: Square, kind: PieceKind },
    /// Captures are possible again.
    SuspendLifted,
    /// A duration effect of `color` ended.
    Ended { id: String, color: Color },
}

impl fmt::Display for ExpiredEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Royalty { square, kind } => {
                write!(f, "The {} royalty on {square} has faded", kind.name())
            }
            Self::SuspendLifted => write!(f, "Captures are possible again"),
            Self::Ended { id, color } => write!(f, "{}'s {id} has worn off", color.name()),
        }
    }
}

/// Per-player arcana counters for a single game.
///
/// Uses and durations are indexed by catalog position, so the catalog is kept alongside them.
#[derive(Clone, Debug)]
pub struct ArcanaState {
    catalog: Arc<ArcanaCatalog>,

    /// Remaining uses of each catalog entry.
    uses: [Vec<u8>; Color::COUNT],

    /// Plies remaining on each active duration effect.
    durations: [Vec<u8>; Color::COUNT],
}

impl ArcanaState {
    /// Creates an empty state, with no arcana held by either player.
    pub fn new(catalog: Arc<ArcanaCatalog>) -> Self {
        let len = catalog.len();
        Self {
            catalog,
            uses: [vec![0; len], vec![0; len]],
            durations: [vec![0; len], vec![0; len]],
        }
    }

    #[inline(always)]
    pub fn catalog(&self) -> &Arc<ArcanaCatalog> {
        &self.catalog
    }

    /// Looks up `id`, failing if it is not in the catalog.
    fn resolve(&self, id: &str) -> Result<usize, ArcanaError> {
        self.catalog
            .index_of(id)
            .ok_or_else(|| ArcanaError::Unknown(id.to_string()))
    }

    /// Remaining uses `color` has of `id`. Unknown identifiers have none.
    pub fn uses(&self, id: &str, color: Color) -> u8 {
        self.catalog
            .index_of(id)
            .map_or(0, |i| self.uses[color][i])
    }

    /// Plies remaining on `color`'s active `id` duration effect.
    pub fn duration(&self, id: &str, color: Color) -> u8 {
        self.catalog
            .index_of(id)
            .map_or(0, |i| self.durations[color][i])
    }

    /// Gives `color` `uses` more uses of `id`.
    ///
    /// Passive effects granted here only reach a [`Position`] after [`ArcanaState::sync`].
    pub fn grant(&mut self, id: &str, color: Color, uses: u8) -> Result<(), ArcanaError> {
        let index = self.resolve(id)?;
        let held = &mut self.uses[color][index];
        *held = held.saturating_add(uses);
        trace!("{color} granted {uses} of {id} ({} held)", *held);
        Ok(())
    }

    /// Activates `id` for `color`, spending a use unless the entry is inherent, and applies
    /// any immediate effect to `position`.
    ///
    /// Nothing changes when activation fails.
    pub fn activate(
        &mut self,
        id: &str,
        color: Color,
        position: &mut Position,
    ) -> Result<Activation, ArcanaError> {
        let index = self.resolve(id)?;
        let entry = &self.catalog.entries[index];

        if entry.effect.is_passive() {
            return Err(ArcanaError::Passive(id.to_string()));
        }
        if self.uses[color][index] == 0 {
            return Err(ArcanaError::Exhausted {
                id: id.to_string(),
                color,
            });
        }

        if !entry.is_inherent() {
            self.uses[color][index] -= 1;
        }

        let activation = match entry.effect.clone() {
            Effect::Bulletproof { plies } => {
                position.suspend_captures(plies);
                Activation::Applied
            }
            Effect::Cloak { plies, .. } => {
                let remaining = &mut self.durations[color][index];
                *remaining = (*remaining).max(plies);
                Activation::Applied
            }
            Effect::Gain { grants } => {
                self.apply_grants(&grants, color);
                Activation::Applied
            }
            Effect::FutureSight { plies } => Activation::Rewind(plies),
            effect => match effect.mode() {
                Some(mode) => Activation::Mode(mode),
                None => Activation::Applied,
            },
        };

        self.sync(position);
        debug!("{color} activated {id}: {activation:?}");
        Ok(activation)
    }

    /// Gives back the use spent by activating `id`, without touching the board.
    ///
    /// Used when a mode is cancelled before a move is made.
    pub fn revert(&mut self, id: &str, color: Color) -> Result<(), ArcanaError> {
        let index = self.resolve(id)?;
        if !self.catalog.entries[index].is_inherent() {
            self.uses[color][index] = self.uses[color][index].saturating_add(1);
        }
        debug!("{color} reverted {id}");
        Ok(())
    }

    /// Finishes an activated mode once its move has been made, handing out an offering's grants.
    pub fn complete(&mut self, id: &str, color: Color, position: &mut Position) -> Result<(), ArcanaError> {
        let index = self.resolve(id)?;
        if let Effect::Offering { grants, .. } = self.catalog.entries[index].effect.clone() {
            self.apply_grants(&grants, color);
            self.sync(position);
        }
        Ok(())
    }

    /// Grants are validated when the catalog is built, so none can fail here.
    fn apply_grants(&mut self, grants: &[Grant], color: Color) {
        for grant in grants {
            if let Some(i) = self.catalog.index_of(&grant.id) {
                self.uses[color][i] = self.uses[color][i].saturating_add(grant.uses);
            }
        }
    }

    /// Advances every timer by one ply: royalty marks, the capture suspension, and duration effects.
    ///
    /// Returns everything that expired.
    pub fn tick(&mut self, position: &mut Position) -> Vec<ExpiredEffect> {
        let mut expired = Vec::new();

        for square in position.royalty_squares() {
            let Some(mark) = position.royalty_at(square) else {
                continue;
            };
            if mark.timer <= 1 {
                expired.push(ExpiredEffect::Royalty {
                    square,
                    kind: mark.kind,
                });
            }
        }
        position.tick_royalty();

        if position.tick_suspend() {
            expired.push(ExpiredEffect::SuspendLifted);
        }

        for color in Color::all() {
            for (index, remaining) in self.durations[color].iter_mut().enumerate() {
                if *remaining == 0 {
                    continue;
                }
                *remaining -= 1;
                if *remaining == 0 {
                    expired.push(ExpiredEffect::Ended {
                        id: self.catalog.entries[index].id.clone(),
                        color,
                    });
                }
            }
        }

        self.sync(position);
        expired
    }

    /// Spends whichever held arcana `mv` draws on, handing out any follow-up grants.
    ///
    /// Returns the catalog index spent, or `None` if the move needs no arcana (or none is held).
    /// `position` is the position *before* `mv` is made.
    pub fn spend_for(&mut self, position: &Position, mv: Move) -> Option<usize> {
        let color = position.side_to_move();
        let index = (0..self.catalog.len()).find(|&i| {
            self.uses[color][i] > 0
                && self.catalog.entries[i]
                    .effect
                    .mode()
                    .is_some_and(|mode| mode_produces(mode, position, mv))
        })?;

        let entry = &self.catalog.entries[index];
        if !entry.is_inherent() {
            self.uses[color][index] -= 1;
        }
        if let Effect::Offering { grants, .. } = entry.effect.clone() {
            self.apply_grants(&grants, color);
        }

        Some(index)
    }

    /// Every [`MoveMode`] `color` can currently activate, alongside the arcana providing it.
    pub fn modes(&self, color: Color) -> Vec<(&str, MoveMode)> {
        let mut modes = Vec::new();
        for (i, entry) in self.catalog.entries.iter().enumerate() {
            let Some(mode) = entry.effect.mode() else {
                continue;
            };
            if self.uses[color][i] > 0 && !modes.iter().any(|&(_, m)| m == mode) {
                modes.push((entry.id.as_str(), mode));
            }
        }
        modes
    }

    /// Every [`MoveMode`] `color` can currently activate.
    pub fn held_modes(&self, color: Color) -> Vec<MoveMode> {
        self.modes(color).into_iter().map(|(_, mode)| mode).collect()
    }

    /// Returns `true` if either player holds a summon of a piece that can capture.
    pub fn can_add_material(&self) -> bool {
        Color::all().into_iter().any(|color| {
            self.held_modes(color)
                .into_iter()
                .any(|mode| matches!(mode, MoveMode::Summon(kind) if !kind.is_ghostly()))
        })
    }

    /// Writes the passive and duration effects of both players into `position`.
    pub fn sync(&self, position: &mut Position) {
        let mut effects = Effects::default();

        for color in Color::all() {
            for (i, entry) in self.catalog.entries.iter().enumerate() {
                let held = self.uses[color][i] > 0;
                match entry.effect {
                    Effect::Shift { piece } if held => effects.add_shift(color, piece),
                    Effect::Charge if held => effects.set_charge(color, true),
                    Effect::Shogun if held => effects.set_shogun(color, true),
                    Effect::Regency if held => effects.set_regency(color, true),
                    Effect::Cloak { piece, .. } if self.durations[color][i] > 0 => {
                        effects.add_cloak(color, piece)
                    }
                    _ => {}
                }
            }
        }

        position.set_effects(effects);
    }

    /// Removes every use and duration from both players.
    pub fn clear(&mut self) {
        for color in Color::all() {
            self.uses[color].fill(0);
            self.durations[color].fill(0);
        }
    }
}

/// Returns `true` if `mv`, played on `position`, is a move generated under `mode`.
fn mode_produces(mode: MoveMode, position: &Position, mv: Move) -> bool {
    let kind_matches = |kind: Option<PieceKind>, square: Square| {
        kind.map_or(true, |kind| position.kind_at(square) == Some(kind))
    };

    match mode {
        MoveMode::Normal => false,
        MoveMode::Summon(kind) => mv.is_summon() && !mv.is_royalty() && mv.promoted() == Some(kind),
        MoveMode::Royalty(kind) => mv.is_royalty() && mv.promoted() == Some(kind),
        MoveMode::Offering(kind) => mv.is_offering() && mv.captured() == Some(kind),
        MoveMode::Swap(kind) => {
            mv.is_swap() && (kind_matches(kind, mv.from()) || kind_matches(kind, mv.to()))
        }
        MoveMode::Teleport => mv.is_teleport(),
        MoveMode::Dyad(kind) => mv.is_dyad() && kind_matches(kind, mv.from()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ArcanaState {
        ArcanaState::new(Arc::new(ArcanaCatalog::builtin().unwrap()))
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = ArcanaCatalog::builtin().unwrap();
        assert!(!catalog.is_empty());
        assert_eq!(
            catalog.mode_of("sumnRQ"),
            Some(MoveMode::Royalty(PieceKind::Queen))
        );
        assert_eq!(catalog.mode_of("modsBLT"), None);
        assert!(catalog.get("shftP").unwrap().is_inherent());
    }

    #[test]
    fn test_category_mismatch_is_rejected() {
        let json = r#"[{ "id": "bad", "name": "Bad", "category": "gain",
                         "effect": { "type": "summon", "piece": "queen" } }]"#;
        let err = ArcanaCatalog::from_json(json).unwrap_err();
        assert!(matches!(err, ArcanaError::Mismatch { .. }));
    }

    #[test]
    fn test_duplicates_and_unknown_grants_are_rejected() {
        let json = r#"[
            { "id": "a", "name": "A", "category": "modifier", "effect": { "type": "teleport" } },
            { "id": "a", "name": "A", "category": "modifier", "effect": { "type": "teleport" } }
        ]"#;
        assert!(matches!(
            ArcanaCatalog::from_json(json),
            Err(ArcanaError::Duplicate(_))
        ));

        let json = r#"[{ "id": "g", "name": "G", "category": "gain",
                         "effect": { "type": "gain", "grants": [{ "id": "nope", "uses": 1 }] } }]"#;
        assert!(matches!(
            ArcanaCatalog::from_json(json),
            Err(ArcanaError::Unknown(_))
        ));
    }

    #[test]
    fn test_activate_spends_and_revert_refunds() {
        let mut arcana = state();
        let mut pos = Position::default();
        arcana.grant("sumnN", Color::White, 2).unwrap();

        let activation = arcana.activate("sumnN", Color::White, &mut pos).unwrap();
        assert_eq!(activation, Activation::Mode(MoveMode::Summon(PieceKind::Knight)));
        assert_eq!(arcana.uses("sumnN", Color::White), 1);

        arcana.revert("sumnN", Color::White).unwrap();
        assert_eq!(arcana.uses("sumnN", Color::White), 2);
        assert_eq!(pos, Position::default());
    }

    #[test]
    fn test_activate_without_uses_fails() {
        let mut arcana = state();
        let mut pos = Position::default();
        let err = arcana.activate("sumnQ", Color::Black, &mut pos).unwrap_err();
        assert!(matches!(err, ArcanaError::Exhausted { .. }));
        assert!(matches!(
            arcana.activate("nonsense", Color::Black, &mut pos),
            Err(ArcanaError::Unknown(_))
        ));
    }

    #[test]
    fn test_passive_effects_sync_into_position() {
        let mut arcana = state();
        let mut pos = Position::default();
        arcana.grant("shftP", Color::White, 1).unwrap();
        arcana.grant("modsSHO", Color::Black, 1).unwrap();
        arcana.sync(&mut pos);

        assert!(pos.effects().has_shift(Color::White, PieceKind::Pawn));
        assert!(!pos.effects().has_shift(Color::Black, PieceKind::Pawn));
        assert!(pos.effects().has_shogun(Color::Black));
        assert!(matches!(
            arcana.activate("shftP", Color::White, &mut pos),
            Err(ArcanaError::Passive(_))
        ));
    }

    #[test]
    fn test_bulletproof_and_tick() {
        let mut arcana = state();
        let mut pos = Position::default();
        arcana.grant("modsBLT", Color::White, 1).unwrap();
        arcana.activate("modsBLT", Color::White, &mut pos).unwrap();
        assert_eq!(pos.suspend(), 3);

        assert!(arcana.tick(&mut pos).is_empty());
        assert!(arcana.tick(&mut pos).is_empty());
        assert_eq!(arcana.tick(&mut pos), vec![ExpiredEffect::SuspendLifted]);
        assert_eq!(pos.suspend(), 0);
    }

    #[test]
    fn test_cloak_duration() {
        let mut arcana = state();
        let mut pos = Position::default();
        arcana.grant("modsINV", Color::Black, 1).unwrap();
        arcana.activate("modsINV", Color::Black, &mut pos).unwrap();
        assert!(pos.effects().is_cloaked(Color::Black, PieceKind::Pawn));

        for _ in 0..3 {
            assert!(arcana.tick(&mut pos).is_empty());
        }
        let expired = arcana.tick(&mut pos);
        assert_eq!(
            expired,
            vec![ExpiredEffect::Ended {
                id: String::from("modsINV"),
                color: Color::Black
            }]
        );
        assert!(!pos.effects().is_cloaked(Color::Black, PieceKind::Pawn));
    }

    #[test]
    fn test_royalty_expiry_is_reported() {
        let mut arcana = state();
        let mut pos = Position::from_fen("4k3/8/8/8/4R3/8/8/4K3 w - - 0 1 r:Te4/1").unwrap();
        let expired = arcana.tick(&mut pos);
        assert_eq!(
            expired,
            vec![ExpiredEffect::Royalty {
                square: Square::E4,
                kind: PieceKind::Templar
            }]
        );
        assert!(pos.royalty_at(Square::E4).is_none());
    }

    #[test]
    fn test_gain_and_offering_grants() {
        let mut arcana = state();
        let mut pos = Position::default();
        arcana.grant("gainSUM", Color::White, 1).unwrap();
        arcana.activate("gainSUM", Color::White, &mut pos).unwrap();
        assert_eq!(arcana.uses("sumnN", Color::White), 1);
        assert_eq!(arcana.uses("sumnZ", Color::White), 1);

        arcana.grant("offrP", Color::White, 1).unwrap();
        let mv = Move::offering(Square::A2, PieceKind::Pawn);
        assert_eq!(arcana.spend_for(&pos, mv), arcana.catalog().index_of("offrP"));
        assert_eq!(arcana.uses("offrP", Color::White), 0);
        assert_eq!(arcana.uses("sumnN", Color::White), 2);
    }

    #[test]
    fn test_spend_for_ignores_board_moves() {
        let mut arcana = state();
        let pos = Position::default();
        arcana.grant("sumnN", Color::White, 1).unwrap();
        let mv = Move::from_uci(&pos, "e2e4").unwrap();
        assert_eq!(arcana.spend_for(&pos, mv), None);
        assert_eq!(arcana.uses("sumnN", Color::White), 1);
    }

    #[test]
    fn test_modes_and_clear() {
        let mut arcana = state();
        arcana.grant("sumnN", Color::White, 1).unwrap();
        arcana.grant("dyadA", Color::White, 1).unwrap();
        arcana.grant("shftP", Color::White, 1).unwrap();

        let modes = arcana.held_modes(Color::White);
        assert_eq!(
            modes,
            vec![MoveMode::Summon(PieceKind::Knight), MoveMode::Dyad(None)]
        );
        assert!(arcana.held_modes(Color::Black).is_empty());

        arcana.clear();
        assert!(arcana.held_modes(Color::White).is_empty());
        assert_eq!(arcana.uses("shftP", Color::White), 0);
    }
}
