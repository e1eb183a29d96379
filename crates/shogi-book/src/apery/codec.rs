//! Apery 形式のレコード・指し手エンコード
//!
//! 指し手は 16bit に詰める:
//! - bit14: 成りフラグ
//! - bit7-13: 移動元（0..=80 は盤上の升、81.. は打つ駒の駒種番号 - 1）
//! - bit0-6: 移動先の升
//!
//! レコードは 16 バイト固定長・リトルエンディアン:
//! ハッシュ u64 / 指し手 u16 / 出現回数 u16 / 評価値 i32

use crate::book::BookMove;
use crate::error::BookError;
use crate::types::{PieceType, Square};

/// 1 レコードのバイト数
pub const RECORD_SIZE: usize = 16;

/// 打つ手の移動元の基点
const DROP_ORIGIN: u16 = 81;

/// USI 表記の指し手を 16bit に詰める
pub fn encode_move(usi: &str) -> Result<u16, BookError> {
    let err = || BookError::InvalidMove(usi.to_string());
    let bytes = usi.as_bytes();
    if bytes.len() != 4 && bytes.len() != 5 {
        return Err(err());
    }
    let promote = bytes.len() == 5;
    if promote && bytes[4] != b'+' {
        return Err(err());
    }
    let to = Square::from_usi(&usi[2..4]).ok_or_else(err)?;
    let from = if bytes[1] == b'*' {
        // 打つ手に成りはない
        if promote {
            return Err(err());
        }
        let piece_type = PieceType::from_sfen_char(bytes[0] as char).ok_or_else(err)?;
        DROP_ORIGIN + piece_type.book_index() as u16 - 1
    } else {
        Square::from_usi(&usi[0..2]).ok_or_else(err)?.book_index() as u16
    };
    Ok(((promote as u16) << 14) | (from << 7) | to.book_index() as u16)
}

/// 16bit の指し手を USI 表記に戻す
pub fn decode_move(value: u16) -> Result<String, BookError> {
    let err = || BookError::InvalidMove(format!("{value:#06x}"));
    let to = Square::from_book_index((value & 0x7f) as usize).ok_or_else(err)?;
    let from = (value >> 7) & 0x7f;
    let mut usi = if from < DROP_ORIGIN {
        let from = Square::from_book_index(from as usize).ok_or_else(err)?;
        format!("{}{}", from.usi(), to.usi())
    } else {
        let piece_type = PieceType::from_book_index((from - DROP_ORIGIN + 1) as usize)
            .ok_or_else(err)?;
        format!("{}*{}", piece_type.sfen_str(), to.usi())
    };
    if (value >> 14) & 1 == 1 {
        usi.push('+');
    }
    Ok(usi)
}

/// 1 レコードをエンコードする
pub fn encode_record(hash: u64, mv: &BookMove) -> Result<[u8; RECORD_SIZE], BookError> {
    let mut buf = [0u8; RECORD_SIZE];
    buf[0..8].copy_from_slice(&hash.to_le_bytes());
    buf[8..10].copy_from_slice(&encode_move(&mv.usi)?.to_le_bytes());
    // テキスト形式由来の出現回数は u16 に収まらないことがあるため飽和させる
    let count = mv.count.unwrap_or(0).min(u16::MAX as u32) as u16;
    buf[10..12].copy_from_slice(&count.to_le_bytes());
    buf[12..16].copy_from_slice(&mv.score.unwrap_or(0).to_le_bytes());
    Ok(buf)
}

/// 1 レコードをデコードする
pub fn decode_record(buf: &[u8; RECORD_SIZE]) -> Result<(u64, BookMove), BookError> {
    let hash = u64::from_le_bytes(buf[0..8].try_into().unwrap());
    let packed = u16::from_le_bytes(buf[8..10].try_into().unwrap());
    let count = u16::from_le_bytes(buf[10..12].try_into().unwrap());
    let score = i32::from_le_bytes(buf[12..16].try_into().unwrap());
    let mv = BookMove {
        usi: decode_move(packed)?,
        usi2: None,
        score: Some(score),
        depth: None,
        count: Some(count as u32),
        comment: String::new(),
    };
    Ok((hash, mv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_move() {
        // 7g(=60) -> 7f(=59)
        assert_eq!(encode_move("7g7f").unwrap(), (60 << 7) | 59);
        // 歩打ちの移動元は 81
        assert_eq!(encode_move("P*3d").unwrap(), (81 << 7) | 21);
        // 成りフラグ
        assert_eq!(
            encode_move("8h2b+").unwrap(),
            (1 << 14) | (70 << 7) | 10
        );
    }

    #[test]
    fn test_move_roundtrip() {
        // 通常の指し手・成り・駒打ちのすべての形
        let mut cases = Vec::new();
        cases.push("7g7f".to_string());
        cases.push("8h2b+".to_string());
        for piece in ["P", "L", "N", "S", "G", "B", "R"] {
            cases.push(format!("{piece}*5e"));
        }
        for from in 0..Square::NUM {
            let from = Square::from_book_index(from).unwrap();
            cases.push(format!("{}{}", from.usi(), "5e"));
            cases.push(format!("{}{}+", from.usi(), "5e"));
        }
        for usi in cases {
            let encoded = encode_move(&usi).unwrap();
            assert_eq!(decode_move(encoded).unwrap(), usi, "usi={usi}");
        }
    }

    #[test]
    fn test_encode_move_rejects_invalid() {
        assert!(encode_move("").is_err());
        assert!(encode_move("7g7").is_err());
        assert!(encode_move("7g7f++").is_err());
        assert!(encode_move("0a1a").is_err());
        assert!(encode_move("X*5e").is_err());
        assert!(encode_move("P*5e+").is_err());
    }

    #[test]
    fn test_record_roundtrip() {
        let mv = BookMove {
            usi: "2g2f".to_string(),
            usi2: None,
            score: Some(-123),
            depth: None,
            count: Some(45),
            comment: String::new(),
        };
        let buf = encode_record(0x0123_4567_89ab_cdef, &mv).unwrap();
        let (hash, decoded) = decode_record(&buf).unwrap();
        assert_eq!(hash, 0x0123_4567_89ab_cdef);
        assert_eq!(decoded, mv);
    }

    #[test]
    fn test_record_layout_little_endian() {
        let mv = BookMove {
            usi: "7g7f".to_string(),
            score: Some(1),
            count: Some(2),
            ..Default::default()
        };
        let buf = encode_record(0x1122_3344_5566_7788, &mv).unwrap();
        assert_eq!(&buf[0..8], &[0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
        assert_eq!(&buf[10..12], &[2, 0]);
        assert_eq!(&buf[12..16], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_record_count_saturates() {
        let mv = BookMove {
            usi: "7g7f".to_string(),
            count: Some(100_000),
            ..Default::default()
        };
        let buf = encode_record(0, &mv).unwrap();
        let (_, decoded) = decode_record(&buf).unwrap();
        assert_eq!(decoded.count, Some(u16::MAX as u32));
    }
}
