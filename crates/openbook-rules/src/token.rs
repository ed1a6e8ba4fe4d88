//! Packed 16-bit move tokens.
//!
//! Layout: destination square in bits 0–5, origin square in bits 6–11,
//! promotion piece in bits 12–14 (0 = none, 1 = knight, 2 = bishop,
//! 3 = rook, 4 = queen). Squares are numbered a1 = 0 … h8 = 63.
//! Castling is encoded as the king's two-square move (`e1g1`).

use std::fmt;
use std::str::FromStr;

/// Promotion piece carried by a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Promotion {
    Knight,
    Bishop,
    Rook,
    Queen,
}

impl Promotion {
    fn code(self) -> u16 {
        match self {
            Promotion::Knight => 1,
            Promotion::Bishop => 2,
            Promotion::Rook => 3,
            Promotion::Queen => 4,
        }
    }

    fn from_code(code: u16) -> Option<Option<Promotion>> {
        match code {
            0 => Some(None),
            1 => Some(Some(Promotion::Knight)),
            2 => Some(Some(Promotion::Bishop)),
            3 => Some(Some(Promotion::Rook)),
            4 => Some(Some(Promotion::Queen)),
            _ => None,
        }
    }

    fn letter(self) -> char {
        match self {
            Promotion::Knight => 'n',
            Promotion::Bishop => 'b',
            Promotion::Rook => 'r',
            Promotion::Queen => 'q',
        }
    }

    pub(crate) fn from_letter(c: char) -> Option<Promotion> {
        match c.to_ascii_lowercase() {
            'n' => Some(Promotion::Knight),
            'b' => Some(Promotion::Bishop),
            'r' => Some(Promotion::Rook),
            'q' => Some(Promotion::Queen),
            _ => None,
        }
    }
}

/// A move identifier, unique per (position, move).
///
/// Tokens order by their raw packed value; that order is the stable
/// tie-break used wherever the engine has to choose between equal weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MoveToken(u16);

impl MoveToken {
    /// Build a token from square indices (0..64).
    ///
    /// Returns `None` if either square is out of range.
    pub fn new(from: u8, to: u8, promotion: Option<Promotion>) -> Option<MoveToken> {
        if from >= 64 || to >= 64 {
            return None;
        }
        let promo = promotion.map_or(0, Promotion::code);
        Some(MoveToken((promo << 12) | ((from as u16) << 6) | to as u16))
    }

    /// Reinterpret a raw packed value, rejecting unused bits and bad promotions.
    pub fn from_raw(raw: u16) -> Option<MoveToken> {
        if raw & 0x8000 != 0 {
            return None;
        }
        Promotion::from_code(raw >> 12)?;
        Some(MoveToken(raw))
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn from_square(self) -> u8 {
        ((self.0 >> 6) & 0x3f) as u8
    }

    pub fn to_square(self) -> u8 {
        (self.0 & 0x3f) as u8
    }

    pub fn promotion(self) -> Option<Promotion> {
        Promotion::from_code(self.0 >> 12).flatten()
    }
}

fn square_name(sq: u8) -> [char; 2] {
    [(b'a' + sq % 8) as char, (b'1' + sq / 8) as char]
}

pub(crate) fn parse_square(file: u8, rank: u8) -> Option<u8> {
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    Some((rank - b'1') * 8 + (file - b'a'))
}

impl fmt::Display for MoveToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = square_name(self.from_square());
        let [c, d] = square_name(self.to_square());
        write!(f, "{a}{b}{c}{d}")?;
        if let Some(p) = self.promotion() {
            write!(f, "{}", p.letter())?;
        }
        Ok(())
    }
}

/// Syntactic UCI parse (`e2e4`, `e7e8q`). Legality is not checked here.
impl FromStr for MoveToken {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let b = s.as_bytes();
        if b.len() != 4 && b.len() != 5 {
            return Err(());
        }
        let from = parse_square(b[0], b[1]).ok_or(())?;
        let to = parse_square(b[2], b[3]).ok_or(())?;
        let promotion = match b.get(4) {
            Some(&c) => Some(Promotion::from_letter(c as char).ok_or(())?),
            None => None,
        };
        MoveToken::new(from, to, promotion).ok_or(())
    }
}
