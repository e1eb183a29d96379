//! 駒種（PieceType）と駒（Piece）
//!
//! 番号付けは Apery 定跡フォーマットの規約に従う:
//! - 駒種番号は歩=1 〜 竜=14
//! - 駒番号は先手がそのまま、後手は +16
//! - 持ち駒の並びは 歩・香・桂・銀・金・角・飛

use super::Color;

/// 駒種
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PieceType {
    Pawn = 1,
    Lance = 2,
    Knight = 3,
    Silver = 4,
    Bishop = 5,
    Rook = 6,
    Gold = 7,
    King = 8,
    ProPawn = 9,
    ProLance = 10,
    ProKnight = 11,
    ProSilver = 12,
    Horse = 13,
    Dragon = 14,
}

/// 持ち駒として数える駒種の数（歩・香・桂・銀・金・角・飛）
pub(crate) const HAND_PIECE_NUM: usize = 7;

impl PieceType {
    /// 駒種の数
    pub const NUM: usize = 14;

    /// 定跡フォーマットの駒種番号（歩=1 〜 竜=14）
    #[inline]
    pub const fn book_index(self) -> usize {
        self as usize
    }

    /// 駒種番号から復元する
    pub fn from_book_index(value: usize) -> Option<PieceType> {
        match value {
            1 => Some(PieceType::Pawn),
            2 => Some(PieceType::Lance),
            3 => Some(PieceType::Knight),
            4 => Some(PieceType::Silver),
            5 => Some(PieceType::Bishop),
            6 => Some(PieceType::Rook),
            7 => Some(PieceType::Gold),
            8 => Some(PieceType::King),
            9 => Some(PieceType::ProPawn),
            10 => Some(PieceType::ProLance),
            11 => Some(PieceType::ProKnight),
            12 => Some(PieceType::ProSilver),
            13 => Some(PieceType::Horse),
            14 => Some(PieceType::Dragon),
            _ => None,
        }
    }

    /// SFEN / USI の駒文字（大文字）から変換する
    pub fn from_sfen_char(c: char) -> Option<PieceType> {
        match c {
            'P' => Some(PieceType::Pawn),
            'L' => Some(PieceType::Lance),
            'N' => Some(PieceType::Knight),
            'S' => Some(PieceType::Silver),
            'B' => Some(PieceType::Bishop),
            'R' => Some(PieceType::Rook),
            'G' => Some(PieceType::Gold),
            'K' => Some(PieceType::King),
            _ => None,
        }
    }

    /// SFEN 表記
    pub const fn sfen_str(self) -> &'static str {
        match self {
            PieceType::Pawn => "P",
            PieceType::Lance => "L",
            PieceType::Knight => "N",
            PieceType::Silver => "S",
            PieceType::Bishop => "B",
            PieceType::Rook => "R",
            PieceType::Gold => "G",
            PieceType::King => "K",
            PieceType::ProPawn => "+P",
            PieceType::ProLance => "+L",
            PieceType::ProKnight => "+N",
            PieceType::ProSilver => "+S",
            PieceType::Horse => "+B",
            PieceType::Dragon => "+R",
        }
    }

    /// 成駒を返す
    pub const fn promoted(self) -> Option<PieceType> {
        match self {
            PieceType::Pawn => Some(PieceType::ProPawn),
            PieceType::Lance => Some(PieceType::ProLance),
            PieceType::Knight => Some(PieceType::ProKnight),
            PieceType::Silver => Some(PieceType::ProSilver),
            PieceType::Bishop => Some(PieceType::Horse),
            PieceType::Rook => Some(PieceType::Dragon),
            _ => None,
        }
    }

    /// 持ち駒としての番号（歩=0, 香=1, 桂=2, 銀=3, 金=4, 角=5, 飛=6）
    pub const fn hand_index(self) -> Option<usize> {
        match self {
            PieceType::Pawn => Some(0),
            PieceType::Lance => Some(1),
            PieceType::Knight => Some(2),
            PieceType::Silver => Some(3),
            PieceType::Gold => Some(4),
            PieceType::Bishop => Some(5),
            PieceType::Rook => Some(6),
            _ => None,
        }
    }
}

/// 駒（駒種 + 手番）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub piece_type: PieceType,
    pub color: Color,
}

impl Piece {
    /// 定跡フォーマットの駒番号（先手 1..14 / 後手 17..30）
    #[inline]
    pub const fn book_code(self) -> usize {
        self.piece_type.book_index()
            + match self.color {
                Color::Black => 0,
                Color::White => 16,
            }
    }

    /// SFEN の駒文字から変換する。大文字が先手、小文字が後手。
    pub fn from_sfen_char(c: char, promoted: bool) -> Option<Piece> {
        let color = if c.is_ascii_uppercase() {
            Color::Black
        } else {
            Color::White
        };
        let mut piece_type = PieceType::from_sfen_char(c.to_ascii_uppercase())?;
        if promoted {
            piece_type = piece_type.promoted()?;
        }
        Some(Piece { piece_type, color })
    }
}
