/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    ops::{BitOr, BitOrAssign},
};

use anyhow::{anyhow, bail, Result};

use super::{File, MoveMode, PieceKind, Position, Rank, Square};

/// Upper bound on the number of moves generated for a single position and mode.
///
/// Summons and swaps can produce far more moves than the classical 218.
pub const MAX_NUM_MOVES: usize = 2048;

/// An alias for an [`arrayvec::ArrayVec`] containing at most [`MAX_NUM_MOVES`] moves.
pub type MoveList = arrayvec::ArrayVec<Move, MAX_NUM_MOVES>;

/// A set of flags describing what kind of [`Move`] is being made.
///
/// Flags combine freely; a promotion that captures is simply a [`Move`] with a captured kind and [`MoveFlags::PROMOTION`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct MoveFlags(u16);

impl MoveFlags {
    pub const NONE: Self = Self(0);
    /// A Pawn advancing two squares from its starting rank.
    pub const PAWN_DOUBLE: Self = Self(1 << 0);
    pub const EN_PASSANT: Self = Self(1 << 1);
    /// The King moving onto its own Rook's square to castle.
    pub const CASTLE: Self = Self(1 << 2);
    pub const PROMOTION: Self = Self(1 << 3);
    /// A piece placed from reserve instead of moving one.
    pub const SUMMON: Self = Self(1 << 4);
    /// A friendly piece sacrificed as a cost.
    pub const CONSUME: Self = Self(1 << 5);
    /// A step granted by an alternate moveset.
    pub const SHIFT: Self = Self(1 << 6);
    /// Set on every spell-driven move.
    pub const ARCANE: Self = Self(1 << 7);
    pub const SWAP: Self = Self(1 << 8);
    /// A summon that marks a square with royalty instead of placing a piece.
    pub const ROYALTY: Self = Self(1 << 9);
    pub const TELEPORT: Self = Self(1 << 10);
    /// The first half of a double move.
    pub const DYAD: Self = Self(1 << 11);

    /// Mask of every valid flag bit.
    const ALL: u16 = 0x0FFF;

    #[inline(always)]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & Self::ALL)
    }

    #[inline(always)]
    pub const fn bits(&self) -> u16 {
        self.0
    }

    /// Returns `true` if every flag in `other` is also set in `self`.
    #[inline(always)]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline(always)]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MoveFlags {
    type Output = Self;
    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self::Output {
        self.with(rhs)
    }
}

impl BitOrAssign for MoveFlags {
    #[inline(always)]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for MoveFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 12] = [
            "PAWN_DOUBLE",
            "EN_PASSANT",
            "CASTLE",
            "PROMOTION",
            "SUMMON",
            "CONSUME",
            "SHIFT",
            "ARCANE",
            "SWAP",
            "ROYALTY",
            "TELEPORT",
            "DYAD",
        ];

        let names = NAMES
            .iter()
            .enumerate()
            .filter(|(i, _)| self.0 & (1 << i) != 0)
            .map(|(_, name)| *name)
            .collect::<Vec<_>>();

        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}

/// Represents a move made on the board, including spell-driven placements.
///
/// Internally encoded using the following bit pattern:
/// ```text
///     000000000000 0000 0000 000000 000000
///          |        |    |     |      |
///          |        |    |     |      +- Source square of the move.
///          |        |    |     +- Target square of the move.
///          |        |    +- Captured kind code (0 = none, else PieceKind + 1).
///          |        +- Promoted (or summoned) kind code (0 = none, else PieceKind + 1).
///          +- MoveFlags.
/// ```
///
/// Summons, royalty marks and offerings act on a single square, so their source and target are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Move(u32);

impl Move {
    /// Mask for the source ("from") bits.
    const SRC_MASK: u32 = 0b0000_0000_0000_0000_0000_0000_0011_1111;
    /// Mask for the destination ("to") bits.
    const DST_MASK: u32 = 0b0000_0000_0000_0000_0000_1111_1100_0000;
    /// Mask for the captured kind bits.
    const CAP_MASK: u32 = 0b0000_0000_0000_0000_1111_0000_0000_0000;
    /// Mask for the promoted kind bits.
    const PRO_MASK: u32 = 0b0000_0000_0000_1111_0000_0000_0000_0000;
    /// Start index of destination bits.
    const DST_BITS: u32 = 6;
    /// Start index of captured kind bits.
    const CAP_BITS: u32 = 12;
    /// Start index of promoted kind bits.
    const PRO_BITS: u32 = 16;
    /// Start index of flag bits.
    const FLG_BITS: u32 = 20;

    /// Packs all parts of a move into a single [`Move`].
    ///
    /// No validation is performed: any combination of fields round-trips through the extractors.
    ///
    /// # Example
    /// ```
    /// # use arcana::{Move, MoveFlags, PieceKind, Square};
    /// let mv = Move::encode(Square::E7, Square::D8, Some(PieceKind::Rook), Some(PieceKind::Queen), MoveFlags::PROMOTION);
    /// assert_eq!(mv.from(), Square::E7);
    /// assert_eq!(mv.to(), Square::D8);
    /// assert_eq!(mv.captured(), Some(PieceKind::Rook));
    /// assert_eq!(mv.promoted(), Some(PieceKind::Queen));
    /// assert_eq!(mv.flags(), MoveFlags::PROMOTION);
    /// ```
    #[inline(always)]
    pub const fn encode(
        from: Square,
        to: Square,
        captured: Option<PieceKind>,
        promoted: Option<PieceKind>,
        flags: MoveFlags,
    ) -> Self {
        Self(
            from.inner() as u32
                | (to.inner() as u32) << Self::DST_BITS
                | (Self::kind_code(captured) as u32) << Self::CAP_BITS
                | (Self::kind_code(promoted) as u32) << Self::PRO_BITS
                | (flags.bits() as u32) << Self::FLG_BITS,
        )
    }

    /// Creates a new [`Move`] with no captured or promoted piece.
    ///
    /// # Example
    /// ```
    /// # use arcana::{Move, MoveFlags, Square};
    /// let e2e4 = Move::new(Square::E2, Square::E4, MoveFlags::PAWN_DOUBLE);
    /// assert_eq!(e2e4.to_string(), "e2e4");
    /// ```
    #[inline(always)]
    pub const fn new(from: Square, to: Square, flags: MoveFlags) -> Self {
        Self::encode(from, to, None, None, flags)
    }

    /// Creates a summon of `kind` onto `square`.
    #[inline(always)]
    pub const fn summon(square: Square, kind: PieceKind) -> Self {
        Self::encode(
            square,
            square,
            None,
            Some(kind),
            MoveFlags::SUMMON.with(MoveFlags::ARCANE),
        )
    }

    /// Creates a royalty mark of `kind` on `square`.
    #[inline(always)]
    pub const fn royalty(square: Square, kind: PieceKind) -> Self {
        Self::encode(
            square,
            square,
            None,
            Some(kind),
            MoveFlags::SUMMON
                .with(MoveFlags::ROYALTY)
                .with(MoveFlags::ARCANE),
        )
    }

    /// Creates an offering that sacrifices the `kind` standing on `square`.
    #[inline(always)]
    pub const fn offering(square: Square, kind: PieceKind) -> Self {
        Self::encode(
            square,
            square,
            Some(kind),
            None,
            MoveFlags::CONSUME.with(MoveFlags::ARCANE),
        )
    }

    /// Creates a swap of the friendly pieces on `from` and `to`.
    #[inline(always)]
    pub const fn swap(from: Square, to: Square) -> Self {
        Self::new(from, to, MoveFlags::SWAP.with(MoveFlags::ARCANE))
    }

    /// Creates a teleport of the piece on `from` onto the empty `to`.
    #[inline(always)]
    pub const fn teleport(from: Square, to: Square) -> Self {
        Self::new(from, to, MoveFlags::TELEPORT.with(MoveFlags::ARCANE))
    }

    /// Returns a copy of this [`Move`] with `flags` added.
    #[inline(always)]
    pub const fn with_flags(self, flags: MoveFlags) -> Self {
        Self(self.0 | (flags.bits() as u32) << Self::FLG_BITS)
    }

    /// Returns a copy of this [`Move`] with its captured kind replaced by `captured`.
    #[inline(always)]
    pub const fn with_captured(self, captured: Option<PieceKind>) -> Self {
        Self(self.0 & !Self::CAP_MASK | (Self::kind_code(captured) as u32) << Self::CAP_BITS)
    }

    /// Returns a copy of this [`Move`] with its promoted kind replaced by `promoted`.
    #[inline(always)]
    pub const fn with_promoted(self, promoted: Option<PieceKind>) -> Self {
        Self(self.0 & !Self::PRO_MASK | (Self::kind_code(promoted) as u32) << Self::PRO_BITS)
    }

    /// Creates an "illegal" [`Move`], representing moving a piece to and from A1.
    ///
    /// # Example
    /// ```
    /// # use arcana::Move;
    /// assert_eq!(Move::illegal().to_string(), "a1a1");
    /// ```
    #[inline(always)]
    pub const fn illegal() -> Self {
        Self(0)
    }

    /// Fetches the source (or "from") part of this [`Move`], as a [`Square`].
    #[inline(always)]
    pub const fn from(&self) -> Square {
        Square::from_bits_unchecked((self.0 & Self::SRC_MASK) as u8)
    }

    /// Fetches the destination (or "to") part of this [`Move`], as a [`Square`].
    #[inline(always)]
    pub const fn to(&self) -> Square {
        Square::from_bits_unchecked(((self.0 & Self::DST_MASK) >> Self::DST_BITS) as u8)
    }

    /// Fetches the kind of the piece removed by this [`Move`], if any.
    ///
    /// For offerings, this is the sacrificed friendly piece.
    #[inline(always)]
    pub const fn captured(&self) -> Option<PieceKind> {
        Self::kind_from_code(((self.0 & Self::CAP_MASK) >> Self::CAP_BITS) as u8)
    }

    /// Fetches the promoted (or summoned) kind of this [`Move`], if any.
    #[inline(always)]
    pub const fn promoted(&self) -> Option<PieceKind> {
        Self::kind_from_code(((self.0 & Self::PRO_MASK) >> Self::PRO_BITS) as u8)
    }

    /// Fetches the [`MoveFlags`] of this [`Move`].
    #[inline(always)]
    pub const fn flags(&self) -> MoveFlags {
        MoveFlags::from_bits((self.0 >> Self::FLG_BITS) as u16)
    }

    /// The raw bits of this [`Move`].
    #[inline(always)]
    pub const fn inner(&self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub const fn has(&self, flags: MoveFlags) -> bool {
        self.flags().contains(flags)
    }

    /// Returns `true` if this [`Move`] removes an enemy piece from the board.
    ///
    /// Offerings remove a friendly piece and are not captures.
    #[inline(always)]
    pub const fn is_capture(&self) -> bool {
        self.captured().is_some() && !self.has(MoveFlags::CONSUME)
    }

    #[inline(always)]
    pub const fn is_quiet(&self) -> bool {
        !self.is_capture() && self.promoted().is_none()
    }

    #[inline(always)]
    pub const fn is_en_passant(&self) -> bool {
        self.has(MoveFlags::EN_PASSANT)
    }

    #[inline(always)]
    pub const fn is_castle(&self) -> bool {
        self.has(MoveFlags::CASTLE)
    }

    #[inline(always)]
    pub const fn is_short_castle(&self) -> bool {
        self.is_castle() && self.to().file().inner() > self.from().file().inner()
    }

    #[inline(always)]
    pub const fn is_pawn_double_push(&self) -> bool {
        self.has(MoveFlags::PAWN_DOUBLE)
    }

    #[inline(always)]
    pub const fn is_promotion(&self) -> bool {
        self.has(MoveFlags::PROMOTION)
    }

    /// Returns `true` for piece summons, but not royalty marks.
    #[inline(always)]
    pub const fn is_summon(&self) -> bool {
        self.has(MoveFlags::SUMMON) && !self.has(MoveFlags::ROYALTY)
    }

    #[inline(always)]
    pub const fn is_royalty(&self) -> bool {
        self.has(MoveFlags::ROYALTY)
    }

    #[inline(always)]
    pub const fn is_offering(&self) -> bool {
        self.has(MoveFlags::CONSUME)
    }

    #[inline(always)]
    pub const fn is_swap(&self) -> bool {
        self.has(MoveFlags::SWAP)
    }

    #[inline(always)]
    pub const fn is_teleport(&self) -> bool {
        self.has(MoveFlags::TELEPORT)
    }

    #[inline(always)]
    pub const fn is_shift(&self) -> bool {
        self.has(MoveFlags::SHIFT)
    }

    #[inline(always)]
    pub const fn is_dyad(&self) -> bool {
        self.has(MoveFlags::DYAD)
    }

    #[inline(always)]
    pub const fn is_arcane(&self) -> bool {
        self.has(MoveFlags::ARCANE)
    }

    /// Returns `true` if this [`Move`] is a base chess move (possibly a dyad half or shift), not a spell placement.
    #[inline(always)]
    pub const fn is_board_move(&self) -> bool {
        !self.is_arcane()
    }

    /// The [`MoveMode`] a [`Move`] of this shape is generated under.
    ///
    /// Kinds that the move itself does not record (such as a swap's required kind) are `None`.
    pub fn mode(&self) -> MoveMode {
        if self.is_royalty() {
            self.promoted()
                .map(MoveMode::Royalty)
                .unwrap_or(MoveMode::Normal)
        } else if self.is_summon() {
            self.promoted()
                .map(MoveMode::Summon)
                .unwrap_or(MoveMode::Normal)
        } else if self.is_offering() {
            self.captured()
                .map(MoveMode::Offering)
                .unwrap_or(MoveMode::Normal)
        } else if self.is_swap() {
            MoveMode::Swap(None)
        } else if self.is_teleport() {
            MoveMode::Teleport
        } else if self.is_dyad() {
            MoveMode::Dyad(None)
        } else {
            MoveMode::Normal
        }
    }

    /// For castling moves, the squares the King and Rook end up on.
    #[inline(always)]
    pub const fn castling_destinations(&self) -> Option<(Square, Square)> {
        if !self.is_castle() {
            return None;
        }

        let rank = self.from().rank();
        let (king, rook) = if self.is_short_castle() {
            (File::G, File::F)
        } else {
            (File::C, File::D)
        };
        Some((Square::new(king, rank), Square::new(rook, rank)))
    }

    /// Creates a [`Move`] from its coordinate text form, extracting extra info from the provided [`Position`].
    ///
    /// Accepted forms:
    /// * `e2e4`, `e7e8q`: a board move, optionally promoting.
    /// * `e1g1` / `e1h1`: castling, in standard or King-takes-Rook form.
    /// * `N@g1`: summon a Knight onto g1.
    /// * `T+e4`: mark e4 with Templar royalty.
    /// * `x@b2`: offer the piece on b2.
    /// * `e1<>d1`: swap the pieces on e1 and d1.
    /// * `b1~f5`: teleport the piece on b1 to f5.
    /// * A trailing `*` marks the first half of a double move.
    ///
    /// Will return a [`anyhow::Error`] if the string is invalid in any way.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let pos = Position::default();
    /// let e2e4 = Move::from_uci(&pos, "e2e4").unwrap();
    /// assert!(e2e4.is_pawn_double_push());
    ///
    /// let summon = Move::from_uci(&pos, "N@e3").unwrap();
    /// assert_eq!(summon, Move::summon(Square::E3, PieceKind::Knight));
    ///
    /// let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    /// let e1c1 = Move::from_uci(&pos, "e1c1").unwrap();
    /// assert!(e1c1.is_castle());
    /// assert_eq!(e1c1.to(), Square::A1);
    /// ```
    pub fn from_uci(position: &Position, uci: &str) -> Result<Self> {
        let uci = uci.trim();
        let (body, dyad) = match uci.strip_suffix('*') {
            Some(body) => (body, true),
            None => (uci, false),
        };

        let mv = if let Some(square) = body.strip_prefix("x@") {
            let square = Square::from_uci(square)?;
            let piece = position
                .piece_at(square)
                .ok_or(anyhow!("No piece to offer at {square} when parsing {uci:?}"))?;
            Self::offering(square, piece.kind())
        } else if let Some((from, to)) = body.split_once("<>") {
            Self::swap(Square::from_uci(from)?, Square::from_uci(to)?)
        } else if let Some((from, to)) = body.split_once('~') {
            Self::teleport(Square::from_uci(from)?, Square::from_uci(to)?)
        } else if let Some((kind, square)) = body.split_once('@') {
            Self::summon(Square::from_uci(square)?, kind.parse()?)
        } else if let Some((kind, square)) = body.split_once('+') {
            Self::royalty(Square::from_uci(square)?, kind.parse()?)
        } else {
            Self::board_move_from_uci(position, body)?
        };

        if dyad {
            if mv.is_arcane() {
                bail!("Only board moves can be the first half of a double move. Got {uci:?}");
            }
            Ok(mv.with_flags(MoveFlags::DYAD))
        } else {
            Ok(mv)
        }
    }

    /// Parses a plain coordinate move like `e2e4` or `e7e8q`.
    fn board_move_from_uci(position: &Position, uci: &str) -> Result<Self> {
        // Extract the to/from squares
        let from = uci
            .get(0..2)
            .ok_or(anyhow!("Move str must contain a `from` square. Got {uci:?}"))?;
        let to = uci
            .get(2..4)
            .ok_or(anyhow!("Move str must contain a `to` square. Got {uci:?}"))?;

        let from = Square::from_uci(from)?;
        let to = Square::from_uci(to)?;

        // Extract information about the piece being moved
        let piece = position.piece_at(from).ok_or(anyhow!(
            "No piece found at {from} when parsing {uci:?} on position {position}"
        ))?;
        let color = piece.color();

        // If there is a promotion char, attempt to convert it to a PieceKind
        let promotion = uci
            .get(4..5)
            .map(|c| c.parse::<PieceKind>())
            .transpose()?;

        let mut flags = MoveFlags::NONE;
        if promotion.is_some() {
            flags |= MoveFlags::PROMOTION;
        }

        // Castling, either as `e1g1` or as the King moving onto its own Rook
        if piece.is_king() && from.rank() == Rank::first(color) {
            let rights = position.castling_rights_for(color);
            let onto_own_rook = position
                .piece_at(to)
                .is_some_and(|p| p.color() == color && p.is_rook());

            if onto_own_rook && (rights.short == Some(to) || rights.long == Some(to)) {
                return Ok(Self::new(from, to, MoveFlags::CASTLE));
            }

            if from.file() == File::E && to.rank() == from.rank() {
                if to.file() == File::G {
                    if let Some(rook) = rights.short {
                        return Ok(Self::new(from, rook, MoveFlags::CASTLE));
                    }
                } else if to.file() == File::C {
                    if let Some(rook) = rights.long {
                        return Ok(Self::new(from, rook, MoveFlags::CASTLE));
                    }
                }
            }
        }

        let mut captured = position
            .piece_at(to)
            .filter(|victim| victim.color() != color)
            .map(|victim| victim.kind());

        if piece.is_pawn() {
            let rank_diff = from.rank().abs_diff(to.rank());
            if from.file() == to.file() && rank_diff == 2 {
                flags |= MoveFlags::PAWN_DOUBLE;
            } else if from.rank() == to.rank() {
                flags |= MoveFlags::SHIFT;
            } else if Some(to) == position.ep_square() && captured.is_none() {
                flags |= MoveFlags::EN_PASSANT;
                captured = Some(PieceKind::Pawn);
            }
        } else if !position.reach(from).intersects(to) {
            flags |= MoveFlags::SHIFT;
        }

        Ok(Self::encode(from, to, captured, promotion, flags))
    }

    /// Short algebraic notation of this [`Move`], without a check suffix, as played on `position`.
    ///
    /// # Example
    /// ```
    /// # use arcana::*;
    /// let pos = Position::default();
    /// let mv = Move::from_uci(&pos, "g1f3").unwrap();
    /// assert_eq!(mv.san(&pos), "Nf3");
    /// ```
    pub fn san(&self, position: &Position) -> String {
        let from = self.from();
        let to = self.to();

        if self.is_royalty() {
            let kind = self.promoted().map(|k| k.char()).unwrap_or('?');
            return format!("+{kind}{to}");
        }
        if self.is_summon() {
            let kind = self.promoted().map(|k| k.char()).unwrap_or('?');
            return format!("{kind}@{to}");
        }
        if self.is_offering() {
            return format!("x@{to}");
        }
        if self.is_swap() {
            return format!("{from}<>{to}");
        }
        if self.is_teleport() {
            return format!("{from}~{to}");
        }
        if self.is_castle() {
            return if self.is_short_castle() {
                String::from("O-O")
            } else {
                String::from("O-O-O")
            };
        }

        let Some(piece) = position.piece_at(from) else {
            return self.to_string();
        };

        let mut san = String::with_capacity(8);
        if piece.is_pawn() {
            if self.is_capture() {
                san.push(from.file().char());
                san.push('x');
            }
            san += &to.to_uci();
            if let Some(promotion) = self.promoted() {
                san.push('=');
                san.push(promotion.char());
            }
        } else {
            san.push(piece.kind().char());

            // Disambiguate between identical pieces that could also reach `to`
            let rivals = position
                .legal_moves(MoveMode::Normal)
                .into_iter()
                .filter(|mv| {
                    mv.to() == to
                        && mv.from() != from
                        && position.piece_at(mv.from()) == Some(piece)
                })
                .map(|mv| mv.from())
                .collect::<Vec<_>>();

            if !rivals.is_empty() {
                if rivals.iter().all(|sq| sq.file() != from.file()) {
                    san.push(from.file().char());
                } else if rivals.iter().all(|sq| sq.rank() != from.rank()) {
                    san.push(from.rank().char());
                } else {
                    san += &from.to_uci();
                }
            }

            if self.is_capture() {
                san.push('x');
            }
            san += &to.to_uci();
        }

        san
    }

    /// Short algebraic notation of this [`Move`] as played on `position`, with a `+` or `#` suffix.
    ///
    /// Mate detection here only considers board moves.
    pub fn to_san(&self, position: &Position) -> String {
        let mut san = self.san(position);
        let after = position.with_move_made(*self);
        if after.is_in_check(after.side_to_move()) {
            if after.legal_moves(MoveMode::Normal).is_empty() {
                san.push('#');
            } else {
                san.push('+');
            }
        }
        san
    }

    /// Converts a [`PieceKind`] to its 4-bit code.
    #[inline(always)]
    const fn kind_code(kind: Option<PieceKind>) -> u8 {
        match kind {
            Some(kind) => kind.bits() + 1,
            None => 0,
        }
    }

    /// Converts a 4-bit code back to a [`PieceKind`].
    #[inline(always)]
    const fn kind_from_code(code: u8) -> Option<PieceKind> {
        if code == 0 || code as usize > PieceKind::COUNT {
            None
        } else {
            Some(PieceKind::from_bits_unchecked(code - 1))
        }
    }
}

impl fmt::Display for Move {
    /// A [`Move`] is displayed in its coordinate text form.
    ///
    /// Castling is displayed with the King's destination square, like `e1g1`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self.from();
        let to = self.to();

        if self.is_royalty() {
            let kind = self.promoted().map(|k| k.char()).unwrap_or('?');
            return write!(f, "{kind}+{to}");
        }
        if self.is_summon() {
            let kind = self.promoted().map(|k| k.char()).unwrap_or('?');
            return write!(f, "{kind}@{to}");
        }
        if self.is_offering() {
            return write!(f, "x@{to}");
        }
        if self.is_swap() {
            return write!(f, "{from}<>{to}");
        }
        if self.is_teleport() {
            return write!(f, "{from}~{to}");
        }

        let to = self
            .castling_destinations()
            .map(|(king, _)| king)
            .unwrap_or(to);

        write!(f, "{from}{to}")?;
        if let Some(promotion) = self.promoted() {
            write!(f, "{}", promotion.to_uci())?;
        }
        if self.is_dyad() {
            write!(f, "*")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} ({:?})", self.flags())?;
        if let Some(captured) = self.captured() {
            write!(f, " x{}", captured.char())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_preserves_all_fields() {
        let flags = MoveFlags::SUMMON | MoveFlags::ROYALTY | MoveFlags::ARCANE | MoveFlags::DYAD;
        let mv = Move::encode(
            Square::H8,
            Square::A1,
            Some(PieceKind::Unicorn),
            Some(PieceKind::Valkyrie),
            flags,
        );
        assert_eq!(mv.from(), Square::H8);
        assert_eq!(mv.to(), Square::A1);
        assert_eq!(mv.captured(), Some(PieceKind::Unicorn));
        assert_eq!(mv.promoted(), Some(PieceKind::Valkyrie));
        assert_eq!(mv.flags(), flags);
    }

    #[test]
    fn test_arcane_forms_display() {
        assert_eq!(Move::summon(Square::G1, PieceKind::Knight).to_string(), "N@g1");
        assert_eq!(Move::royalty(Square::E4, PieceKind::Templar).to_string(), "T+e4");
        assert_eq!(Move::offering(Square::B2, PieceKind::Pawn).to_string(), "x@b2");
        assert_eq!(Move::swap(Square::E1, Square::D1).to_string(), "e1<>d1");
        assert_eq!(Move::teleport(Square::B1, Square::F5).to_string(), "b1~f5");
        let dyad = Move::new(Square::E2, Square::E4, MoveFlags::PAWN_DOUBLE | MoveFlags::DYAD);
        assert_eq!(dyad.to_string(), "e2e4*");
    }

    #[test]
    fn test_text_forms_parse_back() {
        let pos = Position::default();
        for text in ["e2e4", "g1f3", "N@e3", "Q+d2", "x@b2", "e1<>d1", "b1~f5", "e2e4*"] {
            let mv = Move::from_uci(&pos, text).unwrap();
            assert_eq!(mv.to_string(), text);
        }
    }

    #[test]
    fn test_en_passant_and_capture_kinds() {
        let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let ep = Move::from_uci(&pos, "e5d6").unwrap();
        assert!(ep.is_en_passant());
        assert!(ep.is_capture());
        assert_eq!(ep.captured(), Some(PieceKind::Pawn));

        let offering = Move::from_uci(&pos, "x@e5").unwrap();
        assert!(!offering.is_capture());
        assert_eq!(offering.captured(), Some(PieceKind::Pawn));
    }

    #[test]
    fn test_san_forms() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(Move::from_uci(&pos, "e1g1").unwrap().san(&pos), "O-O");
        assert_eq!(Move::from_uci(&pos, "e1c1").unwrap().san(&pos), "O-O-O");
        assert_eq!(Move::from_uci(&pos, "a1b1").unwrap().san(&pos), "Rb1");
        assert_eq!(Move::summon(Square::D3, PieceKind::Zebra).san(&pos), "Z@d3");
        assert_eq!(Move::royalty(Square::A1, PieceKind::Mystic).san(&pos), "+Ma1");
    }
}
