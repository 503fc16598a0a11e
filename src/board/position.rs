/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    ops::{Deref, Index, IndexMut},
    str::FromStr,
};

use anyhow::{anyhow, bail, Context, Result};

use super::{
    Bitboard, Color, File, Move, Piece, PieceKind, Rank, Square, ZobristKey, ROYALTY_PLIES,
};

/// Represents the castling rights of a single player.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
pub struct CastlingRights {
    /// If a right is `Some(square)`, then `square` is the *Rook*'s location
    pub(crate) short: Option<Square>,
    pub(crate) long: Option<Square>,
}

impl CastlingRights {
    /// Number of combined castling states for both players.
    ///
    /// Used for Zobrist hashing.
    pub const COUNT: usize = 16;

    /// Creates a new [`CastlingRights`] that permits castling with a Rook on the provided squares.
    #[inline(always)]
    pub const fn new(short: Option<Square>, long: Option<Square>) -> Self {
        Self { short, long }
    }

    #[inline(always)]
    pub const fn short(&self) -> Option<Square> {
        self.short
    }

    #[inline(always)]
    pub const fn long(&self) -> Option<Square> {
        self.long
    }

    /// Creates a `usize` in `[0, 4)` describing which rights are held.
    #[inline(always)]
    pub(crate) const fn index(&self) -> usize {
        (self.short.is_some() as usize) | (self.long.is_some() as usize) << 1
    }
}

/// Overlay conditions that can be placed on a square.
///
/// Conditions are set up by scenarios and persist until cleared.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct SquareConditions(u8);

impl SquareConditions {
    pub const NONE: Self = Self(0);
    /// The piece standing here cannot move.
    pub const ENTANGLED: Self = Self(1 << 0);
    /// Arcane placements (summons, teleports) cannot target this square.
    pub const FOG: Self = Self(1 << 1);
    /// The piece standing here cannot capture.
    pub const DISARMED: Self = Self(1 << 2);

    #[inline(always)]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    #[inline(always)]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Parses conditions from their letters: `E`ntangled, `F`og, `D`isarmed.
    ///
    /// # Example
    /// ```
    /// # use arcana::SquareConditions;
    /// let c = SquareConditions::from_chars("EF").unwrap();
    /// assert!(c.contains(SquareConditions::FOG));
    /// assert!(!c.contains(SquareConditions::DISARMED));
    /// ```
    pub fn from_chars(chars: &str) -> Result<Self> {
        chars.chars().try_fold(Self::NONE, |acc, c| {
            let condition = match c {
                'E' => Self::ENTANGLED,
                'F' => Self::FOG,
                'D' => Self::DISARMED,
                _ => bail!("Invalid square condition {c:?}. Expected one of 'E', 'F', 'D'"),
            };
            Ok(acc.with(condition))
        })
    }

    /// Letters of every set condition, in `EFD` order.
    pub fn to_chars(&self) -> String {
        [(Self::ENTANGLED, 'E'), (Self::FOG, 'F'), (Self::DISARMED, 'D')]
            .into_iter()
            .filter(|(condition, _)| self.contains(*condition))
            .map(|(_, c)| c)
            .collect()
    }
}

impl fmt::Debug for SquareConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_chars())
    }
}

/// A royalty mark on a square: the piece standing here also moves like `kind`, for `timer` more plies.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RoyaltyMark {
    pub kind: PieceKind,
    pub timer: u8,
}

/// Rule modifiers currently in force for each player.
///
/// These are derived from each player's arcana and consulted on every move generation call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct Effects {
    /// Kinds with an alternate one-step moveset, as a bitmask over [`PieceKind`].
    shift: [u16; Color::COUNT],
    /// Kinds that cannot be captured, as a bitmask over [`PieceKind`].
    cloak: [u16; Color::COUNT],
    /// Pawns may capture at the end of a double step.
    charge: [bool; Color::COUNT],
    /// Kings also leap like Knights.
    shogun: [bool; Color::COUNT],
    /// With several Kings, only all of them being attacked is check.
    regency: [bool; Color::COUNT],
}

impl Effects {
    #[inline(always)]
    pub const fn has_shift(&self, color: Color, kind: PieceKind) -> bool {
        self.shift[color.index()] & (1 << kind.index()) != 0
    }

    #[inline(always)]
    pub const fn is_cloaked(&self, color: Color, kind: PieceKind) -> bool {
        self.cloak[color.index()] & (1 << kind.index()) != 0
    }

    #[inline(always)]
    pub const fn has_charge(&self, color: Color) -> bool {
        self.charge[color.index()]
    }

    #[inline(always)]
    pub const fn has_shogun(&self, color: Color) -> bool {
        self.shogun[color.index()]
    }

    #[inline(always)]
    pub const fn has_regency(&self, color: Color) -> bool {
        self.regency[color.index()]
    }

    pub fn add_shift(&mut self, color: Color, kind: PieceKind) {
        self.shift[color] |= 1 << kind.index();
    }

    pub fn add_cloak(&mut self, color: Color, kind: PieceKind) {
        self.cloak[color] |= 1 << kind.index();
    }

    pub fn set_charge(&mut self, color: Color, enabled: bool) {
        self.charge[color] = enabled;
    }

    pub fn set_shogun(&mut self, color: Color, enabled: bool) {
        self.shogun[color] = enabled;
    }

    pub fn set_regency(&mut self, color: Color, enabled: bool) {
        self.regency[color] = enabled;
    }
}

/// Represents the full state of the board, including move counters and arcane overlays.
///
/// Board placement, material totals, and the Zobrist key are only ever changed together,
/// through the private `place` and `take` functions.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Bitboard representation of the game board.
    pub(crate) board: Board,

    /// The [`Color`] of the current player.
    side_to_move: Color,

    /// Castling rights for each player.
    castling_rights: [CastlingRights; Color::COUNT],

    /// Optional attack square for en passant.
    ep_square: Option<Square>,

    /// Used to enforce the fifty-move rule.
    ///
    /// - Incremented after each turn.
    /// - Reset after a capture, a pawn move, a summon, or an offering.
    halfmove: usize,

    /// Number of moves since the beginning of the game.
    fullmove: usize,

    /// Zobrist hash key of this position.
    key: ZobristKey,

    /// Sum of piece values for each player.
    material: [i32; Color::COUNT],

    /// Royalty marks on each square.
    royalty: [Option<RoyaltyMark>; Square::COUNT],

    /// Condition overlays on each square.
    conditions: [SquareConditions; Square::COUNT],

    /// Plies remaining during which no captures can be made.
    suspend: u8,

    /// Whether the side to move still owes the second half of a double move.
    dyad_pending: bool,

    /// Rule modifiers currently in force.
    effects: Effects,
}

impl Position {
    /// Creates a new, empty [`Position`] with the following properties:
    /// * No pieces on the board
    /// * White moves first
    /// * No castling rights
    /// * No en passant square available
    /// * Halfmove counter set to 0
    /// * Fullmove counter set to 1
    ///
    /// # Example
    /// ```
    /// # use arcana::Position;
    /// let state = Position::new();
    /// assert_eq!(state.to_fen(), "8/8/8/8/8/8/8/8 w - - 0 1");
    /// ```
    pub fn new() -> Self {
        let mut pos = Self {
            board: Board::new(),
            side_to_move: Color::White,
            castling_rights: [CastlingRights::default(); Color::COUNT],
            ep_square: None,
            halfmove: 0,
            fullmove: 1,
            key: ZobristKey::default(),
            material: [0; Color::COUNT],
            royalty: [None; Square::COUNT],
            conditions: [SquareConditions::NONE; Square::COUNT],
            suspend: 0,
            dyad_pending: false,
            effects: Effects::default(),
        };
        pos.key = ZobristKey::new(&pos);
        pos
    }

    /// Creates a new [`Position`] from the provided FEN string.
    ///
    /// After the six classical fields, any of the following tagged fields may appear:
    /// * `r:Qe4/3,Td5/2`: royalty marks, as kind, square, and plies remaining.
    /// * `c:e4EF,d5D`: square conditions.
    /// * `s:3`: plies of capture suspension remaining.
    /// * `d:1`: the side to move owes the second half of a double move.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let fen = "4k3/8/8/8/4T3/8/8/4K3 w - - 0 1 r:Qe4/3 c:d5D s:2";
    /// let pos = Position::from_fen(fen).unwrap();
    /// assert_eq!(pos.royalty_at(Square::E4).unwrap().timer, 3);
    /// assert!(pos.conditions_at(Square::D5).contains(SquareConditions::DISARMED));
    /// assert_eq!(pos.suspend(), 2);
    /// assert_eq!(pos.to_fen(), fen);
    /// ```
    pub fn from_fen(fen: &str) -> Result<Self> {
        let mut pos = Self::new();
        let mut split = fen.split_whitespace();

        let placements = split
            .next()
            .ok_or(anyhow!("FEN string must have piece placements."))?;
        let board = Board::from_fen(placements)?;
        for (square, piece) in board.iter() {
            pos.place(piece, square);
        }

        let active_color = split.next().unwrap_or("w");
        pos.side_to_move = Color::from_str(active_color)?;

        let castling = split.next().unwrap_or("-");
        pos.castling_rights = Self::parse_castling(&pos.board, castling)?;

        let en_passant_target = split.next().unwrap_or("-");
        pos.ep_square = match en_passant_target {
            "-" => None,
            square => Some(Square::from_uci(square)?),
        };

        let halfmove = split.next().unwrap_or("0");
        pos.halfmove = halfmove.parse().or(Err(anyhow!(
            "FEN string must have valid halfmove counter. Got {halfmove:?}"
        )))?;

        let fullmove = split.next().unwrap_or("1");
        pos.fullmove = fullmove.parse().or(Err(anyhow!(
            "FEN string must have valid fullmove counter. Got {fullmove:?}"
        )))?;

        for field in split {
            if let Some(marks) = field.strip_prefix("r:") {
                for mark in marks.split(',').filter(|m| !m.is_empty()) {
                    let (kind_and_square, timer) = mark
                        .split_once('/')
                        .ok_or(anyhow!("Royalty mark must be of the form `Qe4/3`. Got {mark:?}"))?;
                    let kind = kind_and_square
                        .get(0..1)
                        .ok_or(anyhow!("Royalty mark is missing its kind. Got {mark:?}"))?
                        .parse::<PieceKind>()?;
                    let square = kind_and_square
                        .get(1..)
                        .ok_or(anyhow!("Royalty mark is missing its square. Got {mark:?}"))?
                        .parse::<Square>()?;
                    let timer = timer
                        .parse()
                        .with_context(|| format!("Invalid royalty timer in {mark:?}"))?;
                    pos.royalty[square] = Some(RoyaltyMark { kind, timer });
                }
            } else if let Some(conditions) = field.strip_prefix("c:") {
                for entry in conditions.split(',').filter(|c| !c.is_empty()) {
                    let square = entry
                        .get(0..2)
                        .ok_or(anyhow!("Square condition must start with a square. Got {entry:?}"))?
                        .parse::<Square>()?;
                    let chars = entry.get(2..).unwrap_or_default();
                    pos.conditions[square] = SquareConditions::from_chars(chars)?;
                }
            } else if let Some(suspend) = field.strip_prefix("s:") {
                pos.suspend = suspend
                    .parse()
                    .with_context(|| format!("Invalid suspend counter {suspend:?}"))?;
            } else if let Some(dyad) = field.strip_prefix("d:") {
                pos.dyad_pending = dyad != "0";
            } else {
                bail!("Unknown FEN field {field:?}");
            }
        }

        pos.key = ZobristKey::new(&pos);

        Ok(pos)
    }

    /// Creates a [`Position`] from two army rosters: one piece letter per file, from the a-file to the h-file.
    ///
    /// Each side's Pawns are placed on its second rank. Castling rights are granted for the outermost
    /// Rooks on either side of the King.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let pos = Position::from_armies("RNBQKBNR", "RNBQKBNR").unwrap();
    /// assert_eq!(pos, Position::default());
    ///
    /// let pos = Position::from_armies("RUTVKTUR", "RNBQKBNR").unwrap();
    /// assert_eq!(pos.piece_at(Square::D1), Some(Piece::new(Color::White, PieceKind::Valkyrie)));
    /// ```
    pub fn from_armies(white: &str, black: &str) -> Result<Self> {
        let parse = |roster: &str| -> Result<[PieceKind; File::COUNT]> {
            let kinds = roster
                .chars()
                .map(PieceKind::from_uci)
                .collect::<Result<Vec<_>>>()?;
            kinds.try_into().map_err(|kinds: Vec<PieceKind>| {
                anyhow!(
                    "Army roster must have exactly {} pieces. Got {}",
                    File::COUNT,
                    kinds.len()
                )
            })
        };

        Ok(Self::from_back_ranks([parse(white)?, parse(black)?]))
    }

    /// Converts a [Scharnagl Number](https://en.wikipedia.org/wiki/Fischer_random_chess_numbering_scheme#Direct_derivation) to a Chess960 starting position.
    ///
    /// # Examples
    /// ```
    /// # use arcana::*;
    /// // 518 is the Scharnagl number for startpos
    /// let startpos = Position::from_960(518).unwrap();
    /// assert_eq!(startpos, Position::from_fen(FEN_STARTPOS).unwrap());
    ///
    /// assert!(Position::from_960(960).is_err());
    /// ```
    pub fn from_960(n: usize) -> Result<Self> {
        let placements = Self::scharnagl_to_placements(n)?;
        Ok(Self::from_back_ranks([placements; Color::COUNT]))
    }

    /// Builds a position from each side's back rank, with full rows of Pawns.
    fn from_back_ranks(back_ranks: [[PieceKind; File::COUNT]; Color::COUNT]) -> Self {
        let mut pos = Self::new();

        for color in Color::all() {
            for (file, kind) in File::iter().zip(back_ranks[color]) {
                pos.place(Piece::new(color, kind), Square::new(file, Rank::first(color)));
                pos.place(
                    Piece::new(color, PieceKind::Pawn),
                    Square::new(file, Rank::second(color)),
                );
            }

            // Castling uses the outermost Rook on each side of the King
            let back_rank = Bitboard::from_rank(Rank::first(color));
            let Some(king) = (pos.king(color) & back_rank).lsb() else {
                continue;
            };
            let rooks = pos.rooks(color) & back_rank;
            pos.castling_rights[color].long = rooks.iter().find(|sq| sq.file() < king.file());
            pos.castling_rights[color].short =
                rooks.iter().filter(|sq| sq.file() > king.file()).last();
        }

        pos.key = ZobristKey::new(&pos);
        pos
    }

    /// Copies `self` and returns a [`Position`] after having applied the provided [`Move`].
    #[inline(always)]
    pub fn with_move_made(&self, mv: Move) -> Self {
        let mut copied = *self;
        copied.make_move(mv);
        copied
    }

    /// Generates a FEN string from this [`Position`].
    ///
    /// # Example
    /// ```
    /// # use arcana::Position;
    /// let state = Position::default();
    /// assert_eq!(state.to_fen(), "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
    /// ```
    pub fn to_fen(&self) -> String {
        format!("{self}")
    }

    /// Returns the current player as a [`Color`].
    #[inline(always)]
    pub const fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// If en passant can be performed, returns the en passant [`Square`].
    #[inline(always)]
    pub const fn ep_square(&self) -> Option<Square> {
        self.ep_square
    }

    /// Returns the [`CastlingRights`] of the current position.
    #[inline(always)]
    pub const fn castling_rights(&self) -> &[CastlingRights; Color::COUNT] {
        &self.castling_rights
    }

    /// Returns the [`CastlingRights`] for `color` in the current position.
    #[inline(always)]
    pub const fn castling_rights_for(&self, color: Color) -> &CastlingRights {
        &self.castling_rights[color.index()]
    }

    /// Castling rights in FEN notation.
    ///
    /// Rooks on their classical squares use `KQkq`; any other Rook uses its file letter.
    pub fn castling_rights_fen(&self) -> String {
        let mut castling = String::with_capacity(4);

        for color in Color::all() {
            let rights = self.castling_rights[color];
            let chars = [
                (rights.short, File::H, 'k'),
                (rights.long, File::A, 'q'),
            ];
            for (right, classical_file, classical_char) in chars {
                if let Some(sq) = right {
                    let c = if sq.file() == classical_file {
                        classical_char
                    } else {
                        sq.file().char()
                    };
                    castling.push(if color.is_white() {
                        c.to_ascii_uppercase()
                    } else {
                        c
                    });
                }
            }
        }

        // If no side can castle, use a hyphen
        if castling.is_empty() {
            castling = String::from("-");
        }
        castling
    }

    /// Returns the half-move counter of the current position.
    #[inline(always)]
    pub const fn halfmove(&self) -> usize {
        self.halfmove
    }

    /// Returns the full-move counter of the current position.
    #[inline(always)]
    pub const fn fullmove(&self) -> usize {
        self.fullmove
    }

    /// Fetch the Zobrist hash key of this position.
    #[inline(always)]
    pub const fn key(&self) -> ZobristKey {
        self.key
    }

    /// Sum of the values of `color`'s pieces.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let pos = Position::default();
    /// assert_eq!(pos.material(Color::White), 8 * 100 + 2 * 300 + 2 * 320 + 2 * 500 + 900);
    /// assert_eq!(pos.material(Color::White), pos.material(Color::Black));
    /// ```
    #[inline(always)]
    pub const fn material(&self, color: Color) -> i32 {
        self.material[color.index()]
    }

    /// The royalty mark on `square`, if any.
    #[inline(always)]
    pub const fn royalty_at(&self, square: Square) -> Option<RoyaltyMark> {
        self.royalty[square.index()]
    }

    /// Squares holding a royalty mark.
    pub fn royalty_squares(&self) -> Bitboard {
        Square::iter()
            .filter(|&sq| self.royalty[sq].is_some())
            .collect()
    }

    /// The conditions on `square`.
    #[inline(always)]
    pub const fn conditions_at(&self, square: Square) -> SquareConditions {
        self.conditions[square.index()]
    }

    /// Squares whose conditions include every condition in `condition`.
    pub fn squares_with(&self, condition: SquareConditions) -> Bitboard {
        Square::iter()
            .filter(|&sq| self.conditions[sq].contains(condition))
            .collect()
    }

    /// Replaces the conditions on `square`.
    #[inline(always)]
    pub fn set_conditions(&mut self, square: Square, conditions: SquareConditions) {
        self.conditions[square] = conditions;
    }

    /// Plies remaining during which no captures can be made.
    #[inline(always)]
    pub const fn suspend(&self) -> u8 {
        self.suspend
    }

    /// Suspends all captures for `plies` plies, keeping any longer suspension already in place.
    #[inline(always)]
    pub fn suspend_captures(&mut self, plies: u8) {
        self.suspend = self.suspend.max(plies);
    }

    /// Returns `true` if the side to move still owes the second half of a double move.
    #[inline(always)]
    pub const fn is_dyad_pending(&self) -> bool {
        self.dyad_pending
    }

    /// Rule modifiers currently in force.
    #[inline(always)]
    pub const fn effects(&self) -> &Effects {
        &self.effects
    }

    /// Replaces the rule modifiers currently in force.
    #[inline(always)]
    pub fn set_effects(&mut self, effects: Effects) {
        self.effects = effects;
    }

    /// Returns `true` if the half-move counter is 100 or greater.
    ///
    /// Since "half-move" increases with ply, the 50-move rule takes effect at 100 ply.
    #[inline(always)]
    pub const fn can_draw_by_fifty(&self) -> bool {
        self.halfmove() >= 100
    }

    /// Returns `true` if there is insufficient material on the board to cause a checkmate.
    ///
    /// Any Pawn, Rook, Queen, royalty-family or equus piece is enough to mate. Ghosts never count.
    /// Otherwise, the classical rules for lone minor pieces apply.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// // Lone Kings
    /// let kk: Position = "8/4k3/8/8/3K4/8/8/8 w - - 0 1".parse().unwrap();
    /// assert!(kk.can_draw_by_insufficient_material());
    ///
    /// // Ghosts cannot mate
    /// let kgk: Position = "8/4k3/8/8/3K4/8/5G2/8 w - - 0 1".parse().unwrap();
    /// assert!(kgk.can_draw_by_insufficient_material());
    ///
    /// // A single Zebra can
    /// let kzk: Position = "8/4k3/8/8/3K4/8/5Z2/8 w - - 0 1".parse().unwrap();
    /// assert!(!kzk.can_draw_by_insufficient_material());
    ///
    /// // Opposing Bishops on different color squares
    /// let diff_square_bishops: Position = "8/3bk3/8/8/3K4/8/5B2/8 w - - 0 1".parse().unwrap();
    /// assert!(!diff_square_bishops.can_draw_by_insufficient_material());
    /// ```
    pub fn can_draw_by_insufficient_material(&self) -> bool {
        let sufficient = [
            PieceKind::Pawn,
            PieceKind::Rook,
            PieceKind::Queen,
            PieceKind::Templar,
            PieceKind::Mystic,
            PieceKind::Valkyrie,
            PieceKind::Zebra,
            PieceKind::Unicorn,
        ];
        if sufficient
            .into_iter()
            .any(|kind| self.kind(kind).is_nonempty())
        {
            return false;
        }

        let wb = self.bishops(Color::White);
        let wn = self.knights(Color::White);
        let bb = self.bishops(Color::Black);
        let bn = self.knights(Color::Black);

        match (
            wb.population(),
            wn.population(),
            bb.population(),
            bn.population(),
        ) {
            // Lone kings, a single bishop, or a single knight
            (0, 0, 0, 0) | (1, 0, 0, 0) | (0, 0, 1, 0) | (0, 1, 0, 0) | (0, 0, 0, 1) => true,

            // Each King has a single Bishop, on the same color
            (1, 0, 1, 0) => match (wb.lsb(), bb.lsb()) {
                (Some(w), Some(b)) => w.color() == b.color(),
                _ => false,
            },

            _ => false,
        }
    }

    /// Toggles the current player from White to Black (or vice versa).
    #[inline(always)]
    pub fn toggle_side_to_move(&mut self) {
        self.key.hash_side_to_move(self.side_to_move);
        self.side_to_move = self.side_to_move.opponent();
        self.key.hash_side_to_move(self.side_to_move);
    }

    /// Fetches this position's [`Board`]
    #[inline(always)]
    pub const fn board(&self) -> &Board {
        &self.board
    }

    /// Returns `true` if `color` can castle (either short or long).
    #[inline(always)]
    pub const fn can_castle(&self, color: Color) -> bool {
        self.castling_rights[color.index()].short.is_some()
            || self.castling_rights[color.index()].long.is_some()
    }

    /// Apply the provided `moves` to the board. No enforcement of legality.
    pub fn make_moves(&mut self, moves: impl IntoIterator<Item = Move>) {
        for mv in moves {
            self.make_move(mv);
        }
    }

    /// Applies the move. No enforcement of legality.
    ///
    /// A [`Move`] flagged as a dyad half keeps the side to move, which then owes a second move.
    pub fn make_move(&mut self, mv: Move) {
        let color = self.side_to_move;
        let from = mv.from();
        let to = mv.to();

        // Un-hash the side-to-move
        self.key.hash_side_to_move(color);

        // Clear the EP square from the last move (and un-hash it)
        if let Some(ep_square) = self.ep_square.take() {
            self.key.hash_ep_square(ep_square);
        }

        if !mv.is_dyad() {
            self.halfmove += 1;
        }

        if mv.is_royalty() {
            if let Some(kind) = mv.promoted() {
                self.place_royalty(to, kind, ROYALTY_PLIES);
            }
        } else if mv.is_summon() {
            if let Some(kind) = mv.promoted() {
                self.place(Piece::new(color, kind), to);
            }
            self.halfmove = 0;
        } else if mv.is_offering() {
            if let Some(piece) = self.take(from) {
                self.forfeit_castling_rights(piece, from);
            }
            self.halfmove = 0;
        } else if mv.is_swap() {
            let first = self.take(from);
            let second = self.take(to);
            for (piece, vacated, dst) in [(first, from, to), (second, to, from)] {
                if let Some(piece) = piece {
                    self.forfeit_castling_rights(piece, vacated);
                    self.place(piece, dst);
                }
            }
        } else if mv.is_teleport() {
            if let Some(piece) = self.take(from) {
                self.forfeit_castling_rights(piece, from);
                self.place(piece, to);
            }
        } else {
            self.make_board_move(mv, color);
        }

        if mv.is_dyad() {
            if !self.dyad_pending {
                self.dyad_pending = true;
                self.key.hash_dyad(true);
            }
        } else {
            if self.dyad_pending {
                self.dyad_pending = false;
                self.key.hash_dyad(true);
            }
            self.fullmove += color.index();
            self.side_to_move = color.opponent();
        }

        // Toggle the hash of the current player
        self.key.hash_side_to_move(self.side_to_move);
    }

    /// Moves a piece across the board, handling captures, castling, en passant, and promotion.
    fn make_board_move(&mut self, mv: Move, color: Color) {
        let from = mv.from();
        let mut to = mv.to();

        let Some(mut piece) = self.take(from) else {
            return;
        };

        if mv.is_castle() {
            if let Some((king_dst, rook_dst)) = mv.castling_destinations() {
                if let Some(rook) = self.take(to) {
                    self.place(rook, rook_dst);
                }
                to = king_dst;
            }
            self.clear_castling_rights(color);
        } else if mv.is_capture() {
            // En passant captures the pawn one square behind `to`
            let victim_square = if mv.is_en_passant() {
                to.backward_by(color, 1).unwrap_or(to)
            } else {
                to
            };

            if let Some(victim) = self.take(victim_square) {
                self.forfeit_castling_rights(victim, victim_square);
            }

            self.halfmove = 0;
        }

        // A plain double step leaves an en passant square behind
        if mv.is_pawn_double_push() && !mv.is_capture() && !mv.is_dyad() {
            self.ep_square = from.forward_by(color, 1);
            self.key.hash_optional_ep_square(self.ep_square);
        }

        if piece.is_pawn() {
            self.halfmove = 0;
        }
        if !mv.is_castle() {
            self.forfeit_castling_rights(piece, from);
        }

        if let Some(promotion) = mv.promoted() {
            piece = piece.promoted(promotion);
        }

        self.place(piece, to);
    }

    /// Decrements every royalty timer, removing marks that reach zero.
    ///
    /// Returns the squares whose marks expired.
    pub fn tick_royalty(&mut self) -> Bitboard {
        let mut expired = Bitboard::EMPTY_BOARD;
        for square in Square::iter() {
            let Some(mut mark) = self.royalty[square] else {
                continue;
            };

            mark.timer = mark.timer.saturating_sub(1);
            if mark.timer == 0 {
                self.clear_royalty(square);
                expired |= square;
            } else {
                self.royalty[square] = Some(mark);
            }
        }
        expired
    }

    /// Decrements the capture suspension, returning `true` if it was just lifted.
    pub fn tick_suspend(&mut self) -> bool {
        if self.suspend == 0 {
            return false;
        }
        self.suspend -= 1;
        self.suspend == 0
    }

    /// Marks `square` with royalty of `kind` for `timer` plies.
    pub fn place_royalty(&mut self, square: Square, kind: PieceKind, timer: u8) {
        self.clear_royalty(square);
        self.royalty[square] = Some(RoyaltyMark { kind, timer });
        self.key.hash_royalty(square, kind);
    }

    /// Removes the royalty mark on `square`, if any.
    pub fn clear_royalty(&mut self, square: Square) {
        if let Some(mark) = self.royalty[square].take() {
            self.key.hash_royalty(square, mark.kind);
        }
    }

    /// Places a piece at the provided square, updating material and Zobrist hash information.
    ///
    /// Any piece already on `square` is removed first.
    fn place(&mut self, piece: Piece, square: Square) {
        if self.board.has(square) {
            self.take(square);
        }
        self.board.place(piece, square);
        self.material[piece.color()] += piece.kind().value();
        self.key.hash_piece(square, piece);
    }

    /// Removes and returns a piece on the provided square, updating material and Zobrist hash information.
    fn take(&mut self, square: Square) -> Option<Piece> {
        let piece = self.board.take(square)?;
        self.material[piece.color()] -= piece.kind().value();
        self.key.hash_piece(square, piece);
        Some(piece)
    }

    /// Removes any castling right lost by `piece` leaving (or being removed from) `square`.
    fn forfeit_castling_rights(&mut self, piece: Piece, square: Square) {
        let color = piece.color();
        if piece.is_king() {
            self.clear_castling_rights(color);
            return;
        }

        let rights = self.castling_rights[color];
        if rights.short == Some(square) || rights.long == Some(square) {
            self.key.hash_castling_rights(&self.castling_rights);
            if rights.short == Some(square) {
                self.castling_rights[color].short = None;
            } else {
                self.castling_rights[color].long = None;
            }
            self.key.hash_castling_rights(&self.castling_rights);
        }
    }

    /// Clears the castling rights of `color`
    fn clear_castling_rights(&mut self, color: Color) {
        self.key.hash_castling_rights(&self.castling_rights);
        self.castling_rights[color] = CastlingRights::default();
        self.key.hash_castling_rights(&self.castling_rights);
    }

    /// Parses FEN castling rights in either `KQkq` or file-letter form.
    fn parse_castling(board: &Board, castling: &str) -> Result<[CastlingRights; Color::COUNT]> {
        let mut rights = [CastlingRights::default(); Color::COUNT];
        if castling == "-" {
            return Ok(rights);
        }

        for c in castling.chars() {
            let color = Color::from_case(c);
            let rank = Rank::first(color);
            let rook_file = match c.to_ascii_lowercase() {
                'k' => File::H,
                'q' => File::A,
                other => File::from_char(other)?,
            };
            let rook_square = Square::new(rook_file, rank);

            let king_file = (board.king(color) & Bitboard::from_rank(rank))
                .lsb()
                .map(|sq| sq.file())
                .unwrap_or(File::E);

            if rook_file > king_file {
                rights[color].short = Some(rook_square);
            } else {
                rights[color].long = Some(rook_square);
            }
        }

        Ok(rights)
    }

    /// Converts a [Scharnagl Number](https://en.wikipedia.org/wiki/Fischer_random_chess_numbering_scheme#Direct_derivation)
    /// to the order of pieces on a back rank.
    fn scharnagl_to_placements(n: usize) -> Result<[PieceKind; File::COUNT]> {
        if n >= 960 {
            bail!("Scharnagl number must be in [0, 960). Got {n}");
        }

        // Pawns mark empty squares, and are replaced as we go
        let mut startpos = [PieceKind::Pawn; File::COUNT];

        // Bishops on a light square, then on a dark square
        let (n2, b1) = (n / 4, n % 4);
        startpos[1 + b1 * 2] = PieceKind::Bishop;
        let (n3, b2) = (n2 / 4, n2 % 4);
        startpos[b2 * 2] = PieceKind::Bishop;

        // The Queen on the q'th free square
        let (n4, q) = (n3 / 6, n3 % 6);
        Self::fill_nth_empty(&mut startpos, q, PieceKind::Queen);

        // Both Knights from the N5N table; the second index is counted after the first is placed
        let (kn1, kn2) = [
            (0, 0),
            (0, 1),
            (0, 2),
            (0, 3),
            (1, 1),
            (1, 2),
            (1, 3),
            (2, 2),
            (2, 3),
            (3, 3),
        ][n4];
        Self::fill_nth_empty(&mut startpos, kn1, PieceKind::Knight);
        Self::fill_nth_empty(&mut startpos, kn2, PieceKind::Knight);

        // Rook, King, Rook in the remaining squares
        for kind in [PieceKind::Rook, PieceKind::King, PieceKind::Rook] {
            Self::fill_nth_empty(&mut startpos, 0, kind);
        }

        Ok(startpos)
    }

    /// Replaces the `n`th remaining empty slot of `rank` with `kind`.
    fn fill_nth_empty(rank: &mut [PieceKind; File::COUNT], n: usize, kind: PieceKind) {
        if let Some(slot) = rank
            .iter_mut()
            .filter(|k| matches!(k, PieceKind::Pawn))
            .nth(n)
        {
            *slot = kind;
        }
    }
}

impl FromStr for Position {
    type Err = anyhow::Error;
    #[inline(always)]
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}

impl Deref for Position {
    type Target = Board;
    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.board()
    }
}

impl Default for Position {
    /// The classical starting position.
    fn default() -> Self {
        use PieceKind::*;
        let classical = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];
        Self::from_back_ranks([classical; Color::COUNT])
    }
}

impl fmt::Display for Position {
    /// Display this position's FEN string, with any arcane fields appended.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let placements = self.board().to_fen();
        let active_color = self.side_to_move();
        let castling = self.castling_rights_fen();

        let en_passant_target = if let Some(square) = self.ep_square {
            square.to_string()
        } else {
            String::from("-")
        };

        let halfmove = self.halfmove;
        let fullmove = self.fullmove;

        write!(
            f,
            "{placements} {active_color} {castling} {en_passant_target} {halfmove} {fullmove}"
        )?;

        let marks = Square::iter()
            .filter_map(|sq| {
                self.royalty[sq]
                    .map(|mark| format!("{}{sq}/{}", mark.kind.char(), mark.timer))
            })
            .collect::<Vec<_>>();
        if !marks.is_empty() {
            write!(f, " r:{}", marks.join(","))?;
        }

        let conditions = Square::iter()
            .filter(|&sq| !self.conditions[sq].is_empty())
            .map(|sq| format!("{sq}{}", self.conditions[sq].to_chars()))
            .collect::<Vec<_>>();
        if !conditions.is_empty() {
            write!(f, " c:{}", conditions.join(","))?;
        }

        if self.suspend > 0 {
            write!(f, " s:{}", self.suspend)?;
        }

        if self.dyad_pending {
            write!(f, " d:1")?;
        }

        Ok(())
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in Rank::iter().rev() {
            write!(f, "{rank}|")?;
            for file in File::iter() {
                let square = Square::new(file, rank);
                let piece_char = self.piece_at(square).map(|p| p.to_uci()).unwrap_or('.');
                let mark = if self.royalty[square].is_some() { '*' } else { ' ' };
                write!(f, "{mark}{piece_char}")?;
            }

            if rank == Rank::SEVEN {
                write!(f, "           FEN: {}", self.to_fen())?;
            } else if rank == Rank::SIX {
                write!(f, "          Side: {}", self.side_to_move().name())?;
            } else if rank == Rank::FIVE {
                write!(f, "      Castling: {}", self.castling_rights_fen())?;
            } else if rank == Rank::FOUR {
                write!(
                    f,
                    "      Material: {} / {}",
                    self.material(Color::White),
                    self.material(Color::Black)
                )?;
            } else if rank == Rank::THREE {
                write!(f, "       Suspend: {}", self.suspend())?;
            } else if rank == Rank::TWO {
                write!(f, "          Dyad: {}", self.is_dyad_pending())?;
            } else if rank == Rank::ONE {
                write!(f, "           Key: {}", self.key())?;
            }
            writeln!(f)?;
        }
        write!(f, " +")?;
        for _ in File::iter() {
            write!(f, "--")?;
        }
        write!(f, "\n   ")?;
        for file in File::iter() {
            write!(f, "{file} ")?;
        }

        Ok(())
    }
}

/// Represents all pieces and their locations on the board.
///
/// Has no knowledge of castling rights, en passant, or arcane overlays. If you need those, see [`Position`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    /// All squares occupied by a specific color.
    colors: [Bitboard; Color::COUNT],

    /// All squares occupied by a specific piece kind.
    pieces: [Bitboard; PieceKind::COUNT],

    /// Redundant mailbox to speed up the [`Board::piece_at`] functions.
    mailbox: [Option<Piece>; Square::COUNT],
}

impl Board {
    /// Creates a new, empty [`Board`] containing no pieces.
    ///
    /// # Example
    /// ```
    /// # use arcana::Board;
    /// let board = Board::new();
    /// assert_eq!(board.to_fen(), "8/8/8/8/8/8/8/8");
    /// ```
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            colors: [Bitboard::EMPTY_BOARD; Color::COUNT],
            pieces: [Bitboard::EMPTY_BOARD; PieceKind::COUNT],
            mailbox: [None; Square::COUNT],
        }
    }

    /// Constructs a [`Board`] from the placement field of a FEN string.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let board = Board::from_fen("k7/8/8/8/2Z5/8/8/7K").unwrap();
    /// assert_eq!(board.kind_at(Square::C4), Some(PieceKind::Zebra));
    /// assert!(Board::from_fen("k7/8/8/8/2X5/8/8/7K").is_err());
    /// ```
    pub fn from_fen(fen: &str) -> Result<Self> {
        let mut board = Self::new();

        // If this FEN string contains more than just the initial placements, extract the placements
        let placements = fen.split_whitespace().next().unwrap_or_default();

        if placements.matches('/').count() != 7 {
            bail!("FEN must have piece placements for all 8 ranks");
        }

        // Reversed so that White pieces are at the "bottom" of the board
        for (rank, placements) in placements.split('/').rev().enumerate() {
            let mut file = 0;
            let rank = Rank(rank as u8);

            for piece_char in placements.chars() {
                if file >= File::COUNT as u8 {
                    bail!("FEN rank {rank} has more than 8 squares");
                }

                if let Some(empty) = piece_char.to_digit(10) {
                    file += empty as u8;
                } else {
                    let piece = Piece::from_uci(piece_char).with_context(|| {
                        format!("FEN placements must contain piece chars or digits. Got {piece_char:?}")
                    })?;
                    board.place(piece, Square::new(File::new_unchecked(file), rank));
                    file += 1;
                }
            }
        }

        Ok(board)
    }

    /// Returns `true` if there is a piece at the given [`Square`], else `false`.
    #[inline(always)]
    pub const fn has(&self, square: Square) -> bool {
        self.mailbox[square.index()].is_some()
    }

    /// Places the provided [`Piece`] and the supplied [`Square`].
    ///
    /// If another piece occupies this square, this does *not* remove that piece.
    #[inline(always)]
    pub fn place(&mut self, piece: Piece, square: Square) {
        self[piece.color()].set(square);
        self[piece.kind()].set(square);
        self.mailbox[square] = Some(piece);
    }

    /// Takes the [`Piece`] from a given [`Square`], if there is one present.
    #[inline(always)]
    pub fn take(&mut self, square: Square) -> Option<Piece> {
        let piece = self.mailbox[square].take()?;
        self.colors[piece.color()].clear(square);
        self.pieces[piece.kind()].clear(square);
        Some(piece)
    }

    /// Fetches the [`Color`] of the piece at the provided [`Square`], if there is one.
    #[inline(always)]
    pub fn color_at(&self, square: Square) -> Option<Color> {
        self.mailbox[square].map(|piece| piece.color())
    }

    /// Fetches the [`PieceKind`] of the piece at the provided [`Square`], if there is one.
    #[inline(always)]
    pub fn kind_at(&self, square: Square) -> Option<PieceKind> {
        self.mailbox[square].map(|piece| piece.kind())
    }

    /// Fetches the [`Piece`] at the provided [`Square`], if there is one.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let board = Position::default();
    /// assert_eq!(board.piece_at(Square::A2), Some(Piece::WHITE_PAWN));
    /// assert!(board.piece_at(Square::E4).is_none());
    /// ```
    #[inline(always)]
    pub const fn piece_at(&self, square: Square) -> Option<Piece> {
        self.mailbox[square.index()]
    }

    /// Fetches the [`Bitboard`] of every piece of the supplied [`PieceKind`], of both colors.
    #[inline(always)]
    pub const fn kind(&self, kind: PieceKind) -> Bitboard {
        self.pieces[kind.index()]
    }

    /// Fetches the [`Bitboard`] of every piece of the supplied [`Color`].
    #[inline(always)]
    pub const fn color(&self, color: Color) -> Bitboard {
        self.colors[color.index()]
    }

    /// Fetches a [`Bitboard`] of all occupied squares on the board.
    #[inline(always)]
    pub const fn occupied(&self) -> Bitboard {
        self.color(Color::White).or(self.color(Color::Black))
    }

    /// Fetches a [`Bitboard`] of all non-occupied squares on the board.
    #[inline(always)]
    pub const fn empty(&self) -> Bitboard {
        self.occupied().not()
    }

    /// Fetches the [`Bitboard`] corresponding to the supplied [`Piece`].
    #[inline(always)]
    pub const fn piece(&self, piece: Piece) -> Bitboard {
        self.piece_parts(piece.color(), piece.kind())
    }

    /// Analogous to [`Board::piece`] with a [`Piece`]'s individual components.
    #[inline(always)]
    pub const fn piece_parts(&self, color: Color, kind: PieceKind) -> Bitboard {
        self.color(color).and(self.kind(kind))
    }

    /// Creates a [`BoardIter`] to iterate over all occupied [`Square`]s in this [`Board`].
    #[inline(always)]
    pub const fn iter(&self) -> BoardIter<'_> {
        BoardIter {
            board: self,
            occupancy: self.occupied(),
        }
    }

    /// Returns an iterator over all of the pieces in `mask` along with their locations.
    #[inline(always)]
    pub const fn iter_for(&self, mask: Bitboard) -> BoardIter<'_> {
        BoardIter {
            board: self,
            occupancy: mask,
        }
    }

    #[inline(always)]
    pub const fn pawns(&self, color: Color) -> Bitboard {
        self.piece_parts(color, PieceKind::Pawn)
    }

    #[inline(always)]
    pub const fn knights(&self, color: Color) -> Bitboard {
        self.piece_parts(color, PieceKind::Knight)
    }

    #[inline(always)]
    pub const fn bishops(&self, color: Color) -> Bitboard {
        self.piece_parts(color, PieceKind::Bishop)
    }

    #[inline(always)]
    pub const fn rooks(&self, color: Color) -> Bitboard {
        self.piece_parts(color, PieceKind::Rook)
    }

    /// Fetches the [`Bitboard`] for the King(s) of the provided color.
    #[inline(always)]
    pub const fn king(&self, color: Color) -> Bitboard {
        self.piece_parts(color, PieceKind::King)
    }

    /// Generates the placement field of a FEN string for this [`Board`].
    pub fn to_fen(&self) -> String {
        let mut placements: [String; Rank::COUNT] = Default::default();

        for rank in Rank::iter() {
            let mut empty_spaces = 0;
            for file in File::iter() {
                if let Some(piece) = self.piece_at(Square::new(file, rank)) {
                    if empty_spaces != 0 {
                        placements[rank.index()] += &empty_spaces.to_string();
                        empty_spaces = 0;
                    }
                    placements[rank.index()].push(piece.to_uci());
                } else {
                    empty_spaces += 1;
                }
            }

            if empty_spaces != 0 {
                placements[rank.index()] += &empty_spaces.to_string();
            }
        }
        placements.reverse();

        placements.join("/")
    }
}

impl Default for Board {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut board = String::with_capacity(198);

        for rank in Rank::iter().rev() {
            board += &format!("{rank}| ");

            for file in File::iter() {
                let occupant = self
                    .piece_at(Square::new(file, rank))
                    .map(|piece| piece.to_uci())
                    .unwrap_or('.');

                board += &format!("{occupant} ");
            }

            board += "\n"
        }
        board += " +";
        for _ in File::iter() {
            board += "--";
        }
        board += "\n   ";
        for file in File::iter() {
            board += &format!("{file} ");
        }

        write!(f, "{board}")
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

impl Index<PieceKind> for Board {
    type Output = Bitboard;
    #[inline(always)]
    fn index(&self, index: PieceKind) -> &Self::Output {
        &self.pieces[index]
    }
}

impl IndexMut<PieceKind> for Board {
    #[inline(always)]
    fn index_mut(&mut self, index: PieceKind) -> &mut Self::Output {
        &mut self.pieces[index]
    }
}

impl Index<Color> for Board {
    type Output = Bitboard;
    #[inline(always)]
    fn index(&self, index: Color) -> &Self::Output {
        &self.colors[index]
    }
}

impl IndexMut<Color> for Board {
    #[inline(always)]
    fn index_mut(&mut self, index: Color) -> &mut Self::Output {
        &mut self.colors[index]
    }
}

/// An iterator over a set of squares on a [`Board`].
///
/// Calls to [`Iterator::next`] will yield a tuple of a [`Square`] and a [`Piece`].
/// Squares in the mask without a piece are skipped.
pub struct BoardIter<'a> {
    /// The board to retrieve pieces from.
    board: &'a Board,

    /// The list of squares to iterate over.
    occupancy: Bitboard,
}

impl Iterator for BoardIter<'_> {
    type Item = (Square, Piece);

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let square = self.occupancy.pop_lsb()?;
            if let Some(piece) = self.board.piece_at(square) {
                return Some((square, piece));
            }
        }
    }

    #[inline(always)]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.occupancy.population() as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MoveFlags, MoveMode, FEN_KIWIPETE, FEN_STARTPOS};

    #[test]
    fn test_classical_fens_round_trip() {
        for fen in [
            FEN_STARTPOS,
            FEN_KIWIPETE,
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2",
        ] {
            assert_eq!(Position::from_fen(fen).unwrap().to_fen(), fen);
        }
    }

    #[test]
    fn test_arcane_fen_fields_round_trip() {
        let fen = "4k3/8/8/3g4/4T3/8/8/4K3 b - - 3 9 r:Te4/2,Vd5/1 c:a1EF,h8D s:3 d:1";
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.to_fen(), fen);
        assert!(pos.is_dyad_pending());
        assert_eq!(pos.key(), ZobristKey::new(&pos));
    }

    #[test]
    fn test_zobrist_key_side_to_move() {
        let fen = "r3k2r/pppp1ppp/8/4p3/8/8/PPPPPPPP/R3K2R w KQkq e6 0 1";
        let fen_black = "r3k2r/pppp1ppp/8/4p3/8/8/PPPPPPPP/R3K2R b KQkq - 0 1";
        assert_ne!(
            Position::from_fen(fen).unwrap().key(),
            Position::from_fen(fen_black).unwrap().key()
        );
    }

    #[test]
    fn test_zobrist_key_updates_on_quiet_moves() {
        let mut pos = Position::default();
        let original_key = pos.key();
        assert_ne!(original_key.inner(), 0);

        for mv in ["b1a3", "b8a6", "a3b1", "a6b8"] {
            pos.make_move(Move::from_uci(&pos, mv).unwrap());
            assert_eq!(pos.key(), ZobristKey::new(&pos));
        }

        // After returning to the original position, the keys should be equal again
        assert_eq!(pos.key(), original_key);
    }

    #[test]
    fn test_material_tracks_captures_and_summons() {
        let mut pos = Position::from_fen("4k3/8/3p4/8/4N3/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(pos.material(Color::Black), 100);

        pos.make_move(Move::from_uci(&pos, "e4d6").unwrap());
        assert_eq!(pos.material(Color::Black), 0);
        assert_eq!(pos.halfmove(), 0);

        pos.make_move(Move::summon(Square::D8, PieceKind::Unicorn));
        assert_eq!(pos.material(Color::Black), 450);
        assert_eq!(pos.key(), ZobristKey::new(&pos));
    }

    #[test]
    fn test_castling_rights_update_on_rook_moves_and_captures() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        pos.make_move(Move::from_uci(&pos, "h1h8").unwrap());
        assert_eq!(pos.castling_rights_fen(), "Qq");
        assert_eq!(pos.key(), ZobristKey::new(&pos));
    }

    #[test]
    fn test_castling_moves_king_and_rook() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        pos.make_move(Move::from_uci(&pos, "e1g1").unwrap());
        assert_eq!(pos.to_fen(), "r3k2r/8/8/8/8/8/8/R4RK1 b kq - 1 1");
    }

    #[test]
    fn test_dyad_half_keeps_side_to_move() {
        let mut pos = Position::default();
        let first = Move::new(Square::E2, Square::E4, MoveFlags::PAWN_DOUBLE | MoveFlags::DYAD);
        pos.make_move(first);
        assert_eq!(pos.side_to_move(), Color::White);
        assert!(pos.is_dyad_pending());
        assert!(pos.ep_square().is_none());

        pos.make_move(Move::from_uci(&pos, "d2d3").unwrap());
        assert_eq!(pos.side_to_move(), Color::Black);
        assert!(!pos.is_dyad_pending());
        assert_eq!(pos.key(), ZobristKey::new(&pos));
    }

    #[test]
    fn test_royalty_ticks_down_and_expires() {
        let mut pos = Position::from_fen("4k3/8/8/8/4R3/8/8/4K3 w - - 0 1 r:Te4/2").unwrap();
        assert!(pos.tick_royalty().is_empty());
        assert_eq!(pos.royalty_at(Square::E4).unwrap().timer, 1);
        assert_eq!(pos.tick_royalty(), Bitboard::from_square(Square::E4));
        assert!(pos.royalty_at(Square::E4).is_none());
        assert_eq!(pos.key(), ZobristKey::new(&pos));
    }

    #[test]
    fn test_swap_and_teleport() {
        let mut pos = Position::default();
        pos.make_move(Move::swap(Square::B1, Square::C1));
        assert_eq!(pos.kind_at(Square::B1), Some(PieceKind::Bishop));
        assert_eq!(pos.kind_at(Square::C1), Some(PieceKind::Knight));

        pos.make_move(Move::teleport(Square::A8, Square::A4));
        assert_eq!(pos.kind_at(Square::A4), Some(PieceKind::Rook));
        assert_eq!(pos.castling_rights_fen(), "KQk");
        assert_eq!(pos.key(), ZobristKey::new(&pos));
    }

    #[test]
    fn test_960_positions_keep_castling_rooks() {
        for n in [0, 518, 959] {
            let pos = Position::from_960(n).unwrap();
            assert!(pos.can_castle(Color::White));
            assert_eq!(Position::from_fen(&pos.to_fen()).unwrap(), pos);
        }
    }

    /// Board, material, signature, and FEN must all agree after any mutation.
    fn assert_consistent(pos: &Position, context: &str) {
        assert_eq!(pos.key(), ZobristKey::new(pos), "stale key after {context}");

        for color in Color::all() {
            let recount: i32 = pos
                .board()
                .iter_for(pos.board().color(color))
                .map(|(_, piece)| piece.kind().value())
                .sum();
            assert_eq!(pos.material(color), recount, "stale material after {context}");
        }

        let fen = pos.to_fen();
        let parsed = Position::from_fen(&fen).unwrap();
        assert_eq!(parsed.to_fen(), fen, "FEN drift after {context}");
        assert_eq!(parsed.key(), pos.key(), "FEN loses state after {context}");
    }

    #[test]
    fn test_every_mode_keeps_state_consistent() {
        let fens = [
            crate::FEN_ARCANE,
            "4k3/8/8/3g4/4T3/8/8/4K3 w - - 3 9 r:Te4/2,Vd5/1 c:a1EF,h8D",
            "rutqkbnr/ppp2ppp/8/3pp3/4P3/8/PPPP1PPP/RUTQKBNR w KQkq d6 0 3 r:Md5/4",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1 r:Qe5/3 c:c3E,f3F s:2",
        ];
        let modes = [
            MoveMode::Normal,
            MoveMode::Teleport,
            MoveMode::Summon(PieceKind::Knight),
            MoveMode::Summon(PieceKind::Pawn),
            MoveMode::Summon(PieceKind::Valkyrie),
            MoveMode::Royalty(PieceKind::Templar),
            MoveMode::Swap(None),
            MoveMode::Offering(PieceKind::Pawn),
            MoveMode::Offering(PieceKind::Knight),
            MoveMode::Dyad(None),
        ];

        for fen in fens {
            let pos = Position::from_fen(fen).unwrap();
            assert_consistent(&pos, fen);

            for mode in modes {
                for mv in pos.legal_moves(mode) {
                    let context = format!("{mv} ({mode}) on {fen}");
                    let child = pos.with_move_made(mv);
                    assert_consistent(&child, &context);

                    let mut ticked = child;
                    ticked.tick_royalty();
                    assert_consistent(&ticked, &format!("royalty tick after {context}"));

                    // Second halves of a double move
                    if child.is_dyad_pending() {
                        for second in child.legal_moves(MoveMode::Normal) {
                            let grandchild = child.with_move_made(second);
                            assert_consistent(&grandchild, &format!("{second} after {context}"));
                        }
                    }
                }
            }
        }
    }
}
