//! SFEN の解析と正規化
//!
//! ハッシュ計算に必要な範囲（盤上の駒・手番・持ち駒）だけを取り出す。
//! 手数フィールドはキーに影響しないため読み飛ばす。

use crate::types::{Color, HAND_PIECE_NUM, Piece, PieceType, Square};
use thiserror::Error;

/// 平手初期局面の SFEN
pub const SFEN_HIRATE: &str = "lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL b - 1";

/// SFEN 解析エラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SfenError {
    #[error("invalid board field: {0}")]
    InvalidBoard(String),

    #[error("invalid turn field: {0}")]
    InvalidTurn(String),

    #[error("invalid hands field: {0}")]
    InvalidHands(String),

    #[error("missing {0} field")]
    MissingField(&'static str),
}

/// ハッシュ計算に必要な範囲の局面情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPosition {
    /// 盤上の駒と升
    pub pieces: Vec<(Piece, Square)>,
    /// 手番
    pub side_to_move: Color,
    /// 持ち駒の枚数 [手番][持ち駒番号]
    pub hands: [[u8; HAND_PIECE_NUM]; Color::NUM],
}

/// SFEN 文字列を解析する
pub fn parse_sfen(sfen: &str) -> Result<RawPosition, SfenError> {
    let mut fields = sfen.split_ascii_whitespace();
    let board = fields.next().ok_or(SfenError::MissingField("board"))?;
    let turn = fields.next().ok_or(SfenError::MissingField("turn"))?;
    let hands = fields.next().ok_or(SfenError::MissingField("hands"))?;

    Ok(RawPosition {
        pieces: parse_board(board)?,
        side_to_move: Color::from_sfen(turn).ok_or_else(|| SfenError::InvalidTurn(turn.to_string()))?,
        hands: parse_hands(hands)?,
    })
}

fn parse_board(board: &str) -> Result<Vec<(Piece, Square)>, SfenError> {
    let err = || SfenError::InvalidBoard(board.to_string());
    let mut pieces = Vec::with_capacity(40);
    for (rank_index, row) in board.split('/').enumerate() {
        if rank_index >= 9 {
            return Err(err());
        }
        let rank = rank_index as u8 + 1;
        let mut file = 9i32;
        let mut promoted = false;
        for c in row.chars() {
            if let Some(n) = c.to_digit(10) {
                if promoted {
                    return Err(err());
                }
                file -= n as i32;
                continue;
            }
            if c == '+' {
                if promoted {
                    return Err(err());
                }
                promoted = true;
                continue;
            }
            if file < 1 {
                return Err(err());
            }
            let piece = Piece::from_sfen_char(c, promoted).ok_or_else(err)?;
            let square = Square::new(file as u8, rank).ok_or_else(err)?;
            pieces.push((piece, square));
            file -= 1;
            promoted = false;
        }
        if promoted || file < 0 {
            return Err(err());
        }
    }
    Ok(pieces)
}

fn parse_hands(hands: &str) -> Result<[[u8; HAND_PIECE_NUM]; Color::NUM], SfenError> {
    let err = || SfenError::InvalidHands(hands.to_string());
    let mut result = [[0u8; HAND_PIECE_NUM]; Color::NUM];
    if hands == "-" {
        return Ok(result);
    }
    let mut count = 0u32;
    for c in hands.chars() {
        if let Some(n) = c.to_digit(10) {
            count = count * 10 + n;
            continue;
        }
        let piece = Piece::from_sfen_char(c, false).ok_or_else(err)?;
        let index = piece.piece_type.hand_index().ok_or_else(err)?;
        let n = if count == 0 { 1 } else { count };
        // 同一駒種は最大 18 枚（歩）
        if n > 18 {
            return Err(err());
        }
        result[piece.color.index()][index] = n as u8;
        count = 0;
    }
    Ok(result)
}

/// SFEN の手数フィールドを 1 に正規化し、元の手数と合わせて返す。
/// 手数が無い・解析できない場合の手数は 0 とする。
pub fn normalize_sfen(sfen: &str) -> (String, u32) {
    // 先頭 3 フィールド（盤面・手番・持ち駒）の範囲を求める
    let mut columns = 0;
    let mut end = sfen.len();
    for (i, b) in sfen.bytes().enumerate() {
        if b == b' ' {
            columns += 1;
            if columns == 3 {
                end = i;
                break;
            }
        }
    }
    let ply = sfen
        .get(end + 1..)
        .and_then(|rest| rest.split_ascii_whitespace().next())
        .and_then(|token| token.parse::<u32>().ok())
        .unwrap_or(0);
    (format!("{} 1", &sfen[..end]), ply)
}
