//! 定跡データモデル
//!
//! - `BookMove` / `BookEntry`: 1 局面に対する定跡手と統計
//! - `FormatBook<K>`: キー → エントリのソート済みマップ（共通の追加規則つき）
//! - `BookKey`: SFEN からバックエンド固有のキーを計算する能力
//! - `Book`: 両バックエンドのタグ付きバリアント
//!
//! どちらのバックエンドもキー昇順の `BTreeMap` を持つ。永続化時の
//! 「キー昇順・同一キー連続」の不変条件は、並べ替えではなく
//! マップの走査順として常に満たされる。

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::Serialize;

use crate::error::BookError;
use crate::sfen::normalize_sfen;
use crate::zobrist::hash_sfen;

/// 定跡フォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFormat {
    /// やねうら王 定跡DB（テキスト形式）
    Yaneuraou,
    /// Apery 定跡（バイナリ形式）
    Apery,
}

impl BookFormat {
    /// フォーマットのタグ名
    pub const fn name(self) -> &'static str {
        match self {
            BookFormat::Yaneuraou => "yane2016",
            BookFormat::Apery => "apery",
        }
    }
}

/// 定跡手
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookMove {
    /// 指し手（USI 表記）
    pub usi: String,
    /// 予想される相手の応手
    pub usi2: Option<String>,
    /// 評価値
    pub score: Option<i32>,
    /// 探索深さ
    pub depth: Option<u32>,
    /// 出現回数
    pub count: Option<u32>,
    /// コメント
    pub comment: String,
}

/// 1 局面分の定跡
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookEntry {
    /// 局面に対するコメント
    pub comment: String,
    /// 定跡手（格納順を保持する）
    pub moves: Vec<BookMove>,
    /// 初期局面からの手数（不明なら 0）
    pub min_ply: u32,
}

impl BookEntry {
    pub(crate) fn new(min_ply: u32) -> Self {
        Self {
            comment: String::new(),
            moves: Vec::new(),
            min_ply,
        }
    }

    pub(crate) fn single(mv: BookMove, min_ply: u32) -> Self {
        Self {
            comment: String::new(),
            moves: vec![mv],
            min_ply,
        }
    }
}

/// SFEN からバックエンド固有のキーを計算する能力
pub(crate) trait BookKey: Ord + Clone + Sized {
    fn key_of(sfen: &str) -> Result<Self, BookError>;
}

/// やねうら王形式: 手数を 1 に正規化した SFEN がキー
impl BookKey for String {
    fn key_of(sfen: &str) -> Result<String, BookError> {
        Ok(normalize_sfen(sfen).0)
    }
}

/// Apery 形式: 64bit 局面ハッシュがキー。異なる局面のキーが衝突した
/// 場合は区別されずマージされる（既知の仕様）。
impl BookKey for u64 {
    fn key_of(sfen: &str) -> Result<u64, BookError> {
        Ok(hash_sfen(sfen)?)
    }
}

/// キー → エントリのソート済みマップ
#[derive(Debug)]
pub struct FormatBook<K: Ord> {
    entries: BTreeMap<K, BookEntry>,
    /// 異なるキーの数
    entry_count: usize,
    /// 読み込み・マージで重複として捨てた数
    duplicate_count: usize,
}

/// やねうら王形式のバックエンド
pub type YaneBook = FormatBook<String>;
/// Apery 形式のバックエンド
pub type AperyBook = FormatBook<u64>;

impl<K: Ord> Default for FormatBook<K> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            entry_count: 0,
            duplicate_count: 0,
        }
    }
}

impl<K: Ord> FormatBook<K> {
    pub fn get(&self, key: &K) -> Option<&BookEntry> {
        self.entries.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &K) -> Option<&mut BookEntry> {
        self.entries.get_mut(key)
    }

    /// キー昇順で走査する
    pub fn iter(&self) -> impl Iterator<Item = (&K, &BookEntry)> {
        self.entries.iter()
    }

    /// 異なるキーの数
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// 読み込み・マージで重複として捨てた数
    pub fn duplicate_count(&self) -> usize {
        self.duplicate_count
    }

    /// 読み込み・マージ共通の追加規則:
    /// 新キーなら entry_count を増やして挿入し、既存キーに同じ `usi` が
    /// あれば duplicate_count を増やして捨てる。
    pub(crate) fn add_move(&mut self, key: K, mv: BookMove) {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.moves.iter().any(|m| m.usi == mv.usi) {
                    self.duplicate_count += 1;
                } else {
                    entry.moves.push(mv);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(BookEntry::single(mv, 0));
                self.entry_count += 1;
            }
        }
    }

    /// `usi` が一致する手を置き換え、なければ末尾に加える。
    /// キー自体が無ければ新しいエントリを作る。
    pub(crate) fn upsert_move(&mut self, key: K, mv: BookMove) {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if let Some(existing) = entry.moves.iter_mut().find(|m| m.usi == mv.usi) {
                    *existing = mv;
                } else {
                    entry.moves.push(mv);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(BookEntry::single(mv, 0));
                self.entry_count += 1;
            }
        }
    }

    /// 局面ブロックを開始する。重複キーは duplicate_count に数え、
    /// min_ply が小さい方のブロックを残す。
    /// 戻り値はこのブロックの指し手を取り込むかどうか。
    pub(crate) fn begin_block(&mut self, key: K, min_ply: u32) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                self.duplicate_count += 1;
                if min_ply < occupied.get().min_ply {
                    occupied.insert(BookEntry::new(min_ply));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(BookEntry::new(min_ply));
                self.entry_count += 1;
                true
            }
        }
    }
}

/// メモリ上の定跡
#[derive(Debug)]
pub enum Book {
    Yaneuraou(YaneBook),
    Apery(AperyBook),
}

impl Default for Book {
    fn default() -> Self {
        Book::Yaneuraou(YaneBook::default())
    }
}

impl Book {
    pub fn format(&self) -> BookFormat {
        match self {
            Book::Yaneuraou(_) => BookFormat::Yaneuraou,
            Book::Apery(_) => BookFormat::Apery,
        }
    }

    pub fn entry_count(&self) -> usize {
        match self {
            Book::Yaneuraou(book) => book.entry_count(),
            Book::Apery(book) => book.entry_count(),
        }
    }

    pub fn duplicate_count(&self) -> usize {
        match self {
            Book::Yaneuraou(book) => book.duplicate_count(),
            Book::Apery(book) => book.duplicate_count(),
        }
    }

    /// SFEN に対応するエントリを返す
    pub fn entry(&self, sfen: &str) -> Result<Option<&BookEntry>, BookError> {
        match self {
            Book::Yaneuraou(book) => Ok(book.get(&String::key_of(sfen)?)),
            Book::Apery(book) => Ok(book.get(&u64::key_of(sfen)?)),
        }
    }

    pub(crate) fn entry_mut(&mut self, sfen: &str) -> Result<Option<&mut BookEntry>, BookError> {
        match self {
            Book::Yaneuraou(book) => Ok(book.get_mut(&String::key_of(sfen)?)),
            Book::Apery(book) => Ok(book.get_mut(&u64::key_of(sfen)?)),
        }
    }

    /// 指し手を更新または追加する
    pub fn upsert_move(&mut self, sfen: &str, mv: BookMove) -> Result<(), BookError> {
        match self {
            Book::Yaneuraou(book) => {
                book.upsert_move(String::key_of(sfen)?, mv);
            }
            Book::Apery(book) => {
                // Apery 形式で保持できる値のみ残す。score / count は必須。
                let mv = BookMove {
                    usi: mv.usi,
                    usi2: None,
                    score: Some(mv.score.unwrap_or(0)),
                    depth: None,
                    count: Some(mv.count.unwrap_or(0)),
                    comment: String::new(),
                };
                book.upsert_move(u64::key_of(sfen)?, mv);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(usi: &str) -> BookMove {
        BookMove {
            usi: usi.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_move_counts() {
        let mut book = AperyBook::default();
        book.add_move(1, mv("7g7f"));
        book.add_move(1, mv("2g2f"));
        book.add_move(2, mv("3c3d"));
        book.add_move(1, mv("7g7f")); // 重複
        assert_eq!(book.entry_count(), 2);
        assert_eq!(book.duplicate_count(), 1);
        assert_eq!(book.get(&1).unwrap().moves.len(), 2);
    }

    #[test]
    fn test_upsert_move_replaces() {
        let mut book = YaneBook::default();
        book.upsert_move("key 1".to_string(), mv("7g7f"));
        let updated = BookMove {
            usi: "7g7f".to_string(),
            score: Some(100),
            ..Default::default()
        };
        book.upsert_move("key 1".to_string(), updated);
        let entry = book.get(&"key 1".to_string()).unwrap();
        assert_eq!(entry.moves.len(), 1);
        assert_eq!(entry.moves[0].score, Some(100));
        assert_eq!(book.entry_count(), 1);
    }

    #[test]
    fn test_begin_block_keeps_smaller_ply() {
        let mut book = YaneBook::default();
        assert!(book.begin_block("key 1".to_string(), 30));
        book.get_mut(&"key 1".to_string())
            .unwrap()
            .moves
            .push(mv("7g7f"));

        // 手数が大きい重複ブロックは捨てる
        assert!(!book.begin_block("key 1".to_string(), 40));
        assert_eq!(book.get(&"key 1".to_string()).unwrap().moves.len(), 1);

        // 手数が小さい重複ブロックは置き換える
        assert!(book.begin_block("key 1".to_string(), 10));
        let entry = book.get(&"key 1".to_string()).unwrap();
        assert_eq!(entry.min_ply, 10);
        assert!(entry.moves.is_empty());

        assert_eq!(book.entry_count(), 1);
        assert_eq!(book.duplicate_count(), 2);
    }

    #[test]
    fn test_apery_upsert_sanitizes() {
        let mut book = Book::Apery(AperyBook::default());
        let full = BookMove {
            usi: "7g7f".to_string(),
            usi2: Some("3c3d".to_string()),
            score: None,
            depth: Some(20),
            count: None,
            comment: "comment".to_string(),
        };
        book.upsert_move(crate::sfen::SFEN_HIRATE, full).unwrap();
        let entry = book.entry(crate::sfen::SFEN_HIRATE).unwrap().unwrap();
        let stored = &entry.moves[0];
        assert_eq!(stored.usi2, None);
        assert_eq!(stored.depth, None);
        assert_eq!(stored.score, Some(0));
        assert_eq!(stored.count, Some(0));
        assert_eq!(stored.comment, "");
    }
}
