//! Apery 互換の定跡キー（Zobrist ハッシュ）
//!
//! 盤上の駒 ×（駒番号・升番号）、手番側の持ち駒 ×（駒種・枚数）、
//! 後手番の 3 種類の項を XOR で畳み込む。乱数テーブルは Apery の
//! `Book::init` と同じ順序で MT19937-64（既定シード）から生成する。
//! この順序を変えると既存の定跡ファイルと互換性がなくなる。

mod mt64;

use std::sync::LazyLock;

use crate::sfen::{RawPosition, SfenError, parse_sfen};
use crate::types::{Color, HAND_PIECE_NUM, Square};

use mt64::Mt19937_64;

/// Apery の駒番号の範囲（空きを含む。先手 1..=14 / 後手 17..=30）
const PIECE_CODE_NUM: usize = 31;
/// 同一駒種を持てる最大枚数 + 1（歩 18 枚まで）
const HAND_COUNT_NUM: usize = 19;

struct BookZobrist {
    piece: Vec<[u64; Square::NUM]>,
    hand: [[u64; HAND_COUNT_NUM]; HAND_PIECE_NUM],
    turn: u64,
}

static ZOBRIST: LazyLock<BookZobrist> = LazyLock::new(|| {
    let mut mt = Mt19937_64::new(mt64::DEFAULT_SEED);
    // 生成順序は Apery の Book::init と同一: 駒×升 → 持ち駒×枚数 → 手番
    let mut piece = vec![[0u64; Square::NUM]; PIECE_CODE_NUM];
    for table in piece.iter_mut() {
        for value in table.iter_mut() {
            *value = mt.next_u64();
        }
    }
    let mut hand = [[0u64; HAND_COUNT_NUM]; HAND_PIECE_NUM];
    for table in hand.iter_mut() {
        for value in table.iter_mut() {
            *value = mt.next_u64();
        }
    }
    let turn = mt.next_u64();
    BookZobrist { piece, hand, turn }
});

/// 局面の定跡キーを計算する
pub fn book_hash(position: &RawPosition) -> u64 {
    let z = &*ZOBRIST;
    let mut key = 0u64;
    for &(piece, square) in &position.pieces {
        key ^= z.piece[piece.book_code()][square.book_index()];
    }
    // 持ち駒は手番側のみ参照する。枚数 0 の項も XOR する。
    let hand = &position.hands[position.side_to_move.index()];
    for (index, &count) in hand.iter().enumerate() {
        key ^= z.hand[index][count as usize];
    }
    if position.side_to_move == Color::White {
        key ^= z.turn;
    }
    key
}

/// SFEN 文字列から定跡キーを計算する
pub fn hash_sfen(sfen: &str) -> Result<u64, SfenError> {
    Ok(book_hash(&parse_sfen(sfen)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 参照実装の出力をリトルエンディアンの 16 進文字列で表したもの
    fn parse_key(hex: &str) -> u64 {
        let mut bytes = [0u8; 8];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk).unwrap();
            bytes[i] = u8::from_str_radix(s, 16).unwrap();
        }
        u64::from_le_bytes(bytes)
    }

    #[test]
    fn test_hash_reference_vectors() {
        let cases = [
            (
                "lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL b - 1",
                "157eade1e78ebeee",
            ),
            (
                "lnsgkgsnl/1r5b1/ppppppppp/9/9/2P6/PP1PPPPPP/1B5R1/LNSGKGSNL w - 2",
                "d5207256821f7b3e",
            ),
            (
                "lnsgk1snl/1r4g2/pppppp1pp/6p2/7P1/2P6/PP1PPPP1P/1+b5R1/LNSGKGSNL b b 7",
                "dabcbe6950ce089a",
            ),
            (
                "lnsgk1snl/1r4g2/p1pppp1pp/6p2/1p5P1/2P6/PPSPPPP1P/7R1/LN1GKGSNL w Bb 12",
                "ac59e8ffb6da83e7",
            ),
            (
                "ln1gk1snl/6gb1/2sppppp1/p7p/2R6/Pr4P2/2PPPPN1P/1BGK2S2/LNS2G2L w 3Pp 26",
                "ffa73ad01aa22070",
            ),
            (
                "ln1gk1snl/1r4gb1/2sppppp1/p7p/2R6/P5P2/2PPPPN1P/1BGK2S2/LNS2G2L b 3Pp 27",
                "b7fac43349829798",
            ),
        ];
        for (sfen, wants) in cases {
            assert_eq!(hash_sfen(sfen).unwrap(), parse_key(wants), "sfen={sfen}");
        }
    }

    #[test]
    fn test_hash_deterministic() {
        let a = hash_sfen(crate::sfen::SFEN_HIRATE).unwrap();
        let b = hash_sfen(crate::sfen::SFEN_HIRATE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_ignores_move_number() {
        // 手数フィールドはキーに影響しない
        let a = hash_sfen("lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL b - 1")
            .unwrap();
        let b = hash_sfen("lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL b - 99")
            .unwrap();
        assert_eq!(a, b);
    }
}
