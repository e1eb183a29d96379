//! 升（Square）
//!
//! 筋・段はともに 1..=9。定跡フォーマットの升番号は `筋*9 + 段 - 10`
//! （1一=0, 1九=8, …, 9九=80）。

/// 盤上の升
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// 升の数
    pub const NUM: usize = 81;

    /// 筋・段（1..=9）から作成する
    pub const fn new(file: u8, rank: u8) -> Option<Square> {
        if file >= 1 && file <= 9 && rank >= 1 && rank <= 9 {
            Some(Square { file, rank })
        } else {
            None
        }
    }

    /// 筋（1..=9）
    #[inline]
    pub const fn file(self) -> u8 {
        self.file
    }

    /// 段（1..=9）
    #[inline]
    pub const fn rank(self) -> u8 {
        self.rank
    }

    /// 定跡フォーマットの升番号（0..=80）
    #[inline]
    pub const fn book_index(self) -> usize {
        self.file as usize * 9 + self.rank as usize - 10
    }

    /// 升番号から復元する
    pub const fn from_book_index(value: usize) -> Option<Square> {
        if value < Self::NUM {
            Some(Square {
                file: (value / 9 + 1) as u8,
                rank: (value % 9 + 1) as u8,
            })
        } else {
            None
        }
    }

    /// USI 表記（例: `7g`）から変換する
    pub fn from_usi(s: &str) -> Option<Square> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        if !bytes[0].is_ascii_digit() || !(b'a'..=b'i').contains(&bytes[1]) {
            return None;
        }
        Square::new(bytes[0] - b'0', bytes[1] - b'a' + 1)
    }

    /// USI 表記を返す
    pub fn usi(self) -> String {
        format!("{}{}", self.file, (b'a' + self.rank - 1) as char)
    }
}
