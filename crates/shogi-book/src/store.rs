//! 定跡セッション
//!
//! 1 冊の定跡を開き、検索・編集・保存・取り込みを行う。ファイルサイズが
//! しきい値を超える場合はメモリに展開せず、ソート済みファイルへの
//! 二分探索で検索する（on-the-fly モード）。on-the-fly の定跡は読み取り
//! 専用で、編集操作は受け付けない。

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::apery;
use crate::book::{Book, BookFormat, BookMove};
use crate::error::{BookError, BookResult};
use crate::types::Color;
use crate::yaneuraou;

/// 定跡の保持方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingMode {
    /// 全体をメモリに展開する
    InMemory,
    /// ファイルへの二分探索で検索する
    OnTheFly,
}

impl LoadingMode {
    pub const fn name(self) -> &'static str {
        match self {
            LoadingMode::InMemory => "in-memory",
            LoadingMode::OnTheFly => "on-the-fly",
        }
    }
}

/// 定跡を開くときのオプション
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// このサイズ（MB）を超えるファイルを on-the-fly で開く
    pub on_the_fly_threshold_mb: f64,
}

/// 取り込み対象の対局者
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayerCriteria {
    #[default]
    Both,
    Black,
    White,
}

impl PlayerCriteria {
    fn accepts(self, color: Color) -> bool {
        match self {
            PlayerCriteria::Both => true,
            PlayerCriteria::Black => color == Color::Black,
            PlayerCriteria::White => color == Color::White,
        }
    }
}

/// 棋譜からの取り込み条件
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// この手数より前の手は取り込まない
    pub min_ply: u32,
    /// この手数より後の手は取り込まない
    pub max_ply: u32,
    pub player_criteria: PlayerCriteria,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            min_ply: 0,
            max_ply: u32::MAX,
            player_criteria: PlayerCriteria::Both,
        }
    }
}

/// 棋譜中の 1 手。`sfen` は指す直前の局面。
#[derive(Debug, Clone)]
pub struct SourceMove {
    pub sfen: String,
    pub usi: String,
    /// 初期局面からの手数
    pub ply: u32,
    /// 手番
    pub color: Color,
}

/// 取り込み結果
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ImportSummary {
    /// 新たに追加した手の数
    pub entry_count: usize,
    /// 既存の手と重複していた数
    pub duplicate_count: usize,
}

enum BookHandle {
    InMemory { book: Book, saved: bool },
    OnTheFly { format: BookFormat, file: File, size: u64 },
}

impl BookHandle {
    fn empty() -> Self {
        BookHandle::InMemory {
            book: Book::default(),
            saved: true,
        }
    }
}

/// 開いている定跡。初期状態は空のやねうら王形式。
pub struct BookStore {
    handle: BookHandle,
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BookStore {
    pub fn new() -> Self {
        Self {
            handle: BookHandle::empty(),
        }
    }

    pub fn format(&self) -> BookFormat {
        match &self.handle {
            BookHandle::InMemory { book, .. } => book.format(),
            BookHandle::OnTheFly { format, .. } => *format,
        }
    }

    pub fn loading_mode(&self) -> LoadingMode {
        match &self.handle {
            BookHandle::InMemory { .. } => LoadingMode::InMemory,
            BookHandle::OnTheFly { .. } => LoadingMode::OnTheFly,
        }
    }

    /// 保存していない変更があるかどうか
    pub fn is_unsaved(&self) -> bool {
        matches!(&self.handle, BookHandle::InMemory { saved: false, .. })
    }

    /// 異なる局面の数。on-the-fly では数えられない。
    pub fn entry_count(&self) -> Option<usize> {
        match &self.handle {
            BookHandle::InMemory { book, .. } => Some(book.entry_count()),
            BookHandle::OnTheFly { .. } => None,
        }
    }

    /// 読み込み時に重複として捨てた数。on-the-fly では数えられない。
    pub fn duplicate_count(&self) -> Option<usize> {
        match &self.handle {
            BookHandle::InMemory { book, .. } => Some(book.duplicate_count()),
            BookHandle::OnTheFly { .. } => None,
        }
    }

    /// パスの拡張子からフォーマットを判別する。`.db` がやねうら王形式で、
    /// それ以外はすべて Apery 形式として扱う。
    fn format_by_path(path: &Path) -> BookFormat {
        if path.extension().and_then(|e| e.to_str()) == Some("db") {
            BookFormat::Yaneuraou
        } else {
            BookFormat::Apery
        }
    }

    /// 定跡ファイルを開く。しきい値指定があり、かつファイルサイズが
    /// 超えている場合のみ on-the-fly で開く。
    pub fn open(&mut self, path: &Path, options: Option<&OpenOptions>) -> BookResult<LoadingMode> {
        let metadata = fs::symlink_metadata(path)?;
        if !metadata.is_file() {
            return Err(BookError::NotAFile(path.to_path_buf()));
        }

        let size = metadata.len();
        match options {
            Some(options) if size as f64 > options.on_the_fly_threshold_mb * 1024.0 * 1024.0 => {
                self.open_on_the_fly(path, size)?;
                Ok(LoadingMode::OnTheFly)
            }
            _ => {
                self.open_in_memory(path, size)?;
                Ok(LoadingMode::InMemory)
            }
        }
    }

    fn open_on_the_fly(&mut self, path: &Path, size: u64) -> BookResult<()> {
        info!("loading book on-the-fly: path={} size={size}", path.display());
        let format = Self::format_by_path(path);
        let file = File::open(path)?;
        if format == BookFormat::Yaneuraou
            && !yaneuraou::validate_ordering(BufReader::new(&file))?
        {
            return Err(BookError::NotOrdered(path.to_path_buf()));
        }
        self.handle = BookHandle::OnTheFly { format, file, size };
        Ok(())
    }

    fn open_in_memory(&mut self, path: &Path, size: u64) -> BookResult<()> {
        info!("loading book in-memory: path={} size={size}", path.display());
        let file = File::open(path)?;
        let book = match Self::format_by_path(path) {
            BookFormat::Yaneuraou => Book::Yaneuraou(yaneuraou::load_book(BufReader::new(file))?),
            BookFormat::Apery => {
                let mut input = BufReader::with_capacity(128 * 1024, file);
                Book::Apery(apery::load_book(&mut input)?)
            }
        };
        if book.duplicate_count() > 0 {
            warn!("duplicated entries: {}", book.duplicate_count());
        }
        info!("loaded book with {} entries", book.entry_count());
        self.handle = BookHandle::InMemory { book, saved: true };
        Ok(())
    }

    /// 開いている定跡を破棄して空の状態に戻す
    pub fn clear(&mut self) {
        self.handle = BookHandle::empty();
    }

    /// 定跡をファイルに書き出す。拡張子はフォーマットと一致している
    /// 必要がある（やねうら王形式は `.db`、Apery 形式は `.bin`）。
    pub fn save(&mut self, path: &Path) -> BookResult<()> {
        let BookHandle::InMemory { book, saved } = &mut self.handle else {
            return Err(BookError::OnTheFlyReadOnly("save"));
        };
        let result = Self::store_to(book, path);
        *saved = result.is_ok();
        result
    }

    fn store_to(book: &Book, path: &Path) -> BookResult<()> {
        let expected = match book.format() {
            BookFormat::Yaneuraou => "db",
            BookFormat::Apery => "bin",
        };
        if path.extension().and_then(|e| e.to_str()) != Some(expected) {
            return Err(BookError::InvalidExtension(path.to_path_buf()));
        }
        let mut output = BufWriter::new(File::create(path)?);
        match book {
            Book::Yaneuraou(book) => yaneuraou::store_book(book, &mut output)?,
            Book::Apery(book) => apery::store_book(book, &mut output)?,
        }
        output.flush()?;
        Ok(())
    }

    /// 局面に対応する定跡手を返す
    pub fn search_moves(&self, sfen: &str) -> BookResult<Vec<BookMove>> {
        match &self.handle {
            BookHandle::InMemory { book, .. } => Ok(book
                .entry(sfen)?
                .map(|entry| entry.moves.clone())
                .unwrap_or_default()),
            BookHandle::OnTheFly { format, file, size } => match format {
                BookFormat::Yaneuraou => yaneuraou::search_moves_on_the_fly(sfen, file, *size),
                BookFormat::Apery => apery::search_moves_on_the_fly(sfen, file, *size),
            },
        }
    }

    /// 指し手を更新または追加する。on-the-fly では何もしない。
    pub fn update_move(&mut self, sfen: &str, mv: BookMove) -> BookResult<()> {
        let BookHandle::InMemory { book, saved } = &mut self.handle else {
            return Ok(());
        };
        *saved = false;
        book.upsert_move(sfen, mv)
    }

    /// 指し手を削除する。on-the-fly では何もしない。
    pub fn remove_move(&mut self, sfen: &str, usi: &str) -> BookResult<()> {
        let BookHandle::InMemory { book, saved } = &mut self.handle else {
            return Ok(());
        };
        if let Some(entry) = book.entry_mut(sfen)? {
            entry.moves.retain(|mv| mv.usi != usi);
            *saved = false;
        }
        Ok(())
    }

    /// 指し手を表示順の `order` 番目に移動する。on-the-fly では何もしない。
    pub fn update_move_order(&mut self, sfen: &str, usi: &str, order: usize) -> BookResult<()> {
        let BookHandle::InMemory { book, saved } = &mut self.handle else {
            return Ok(());
        };
        if let Some(entry) = book.entry_mut(sfen)? {
            if let Some(index) = entry.moves.iter().position(|mv| mv.usi == usi) {
                let mv = entry.moves.remove(index);
                let order = order.min(entry.moves.len());
                entry.moves.insert(order, mv);
                *saved = false;
            }
        }
        Ok(())
    }

    fn sort_moves_by_count(&mut self, sfen: &str) -> BookResult<()> {
        let BookHandle::InMemory { book, saved } = &mut self.handle else {
            return Ok(());
        };
        if let Some(entry) = book.entry_mut(sfen)? {
            entry
                .moves
                .sort_by(|a, b| b.count.unwrap_or(0).cmp(&a.count.unwrap_or(0)));
            *saved = false;
        }
        Ok(())
    }

    /// 棋譜の手を定跡に取り込む。同じ局面の同じ手は出現回数に合算し、
    /// 各局面の手は出現回数の多い順に並べ替える。
    pub fn import_moves(
        &mut self,
        moves: &[SourceMove],
        options: &ImportOptions,
    ) -> BookResult<ImportSummary> {
        if matches!(&self.handle, BookHandle::OnTheFly { .. }) {
            return Err(BookError::OnTheFlyReadOnly("import into"));
        }

        let mut summary = ImportSummary::default();
        for source in moves {
            if source.ply < options.min_ply || source.ply > options.max_ply {
                continue;
            }
            if !options.player_criteria.accepts(source.color) {
                continue;
            }

            let existing = self
                .search_moves(&source.sfen)?
                .into_iter()
                .find(|mv| mv.usi == source.usi);
            let mut mv = match existing {
                Some(existing) => {
                    summary.duplicate_count += 1;
                    existing
                }
                None => {
                    summary.entry_count += 1;
                    BookMove {
                        usi: source.usi.clone(),
                        ..Default::default()
                    }
                }
            };
            mv.count = Some(mv.count.unwrap_or(0) + 1);
            self.update_move(&source.sfen, mv)?;
            self.sort_moves_by_count(&source.sfen)?;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfen::SFEN_HIRATE;

    const SFEN_2: &str = "lnsgkgsnl/1r5b1/ppppppppp/9/9/2P6/PP1PPPPPP/1B5R1/LNSGKGSNL w - 2";

    fn source(sfen: &str, usi: &str, ply: u32, color: Color) -> SourceMove {
        SourceMove {
            sfen: sfen.to_string(),
            usi: usi.to_string(),
            ply,
            color,
        }
    }

    #[test]
    fn test_new_store_is_empty_yaneuraou() {
        let store = BookStore::new();
        assert_eq!(store.format(), BookFormat::Yaneuraou);
        assert_eq!(store.loading_mode(), LoadingMode::InMemory);
        assert!(!store.is_unsaved());
        assert_eq!(store.entry_count(), Some(0));
        assert!(store.search_moves(SFEN_HIRATE).unwrap().is_empty());
    }

    #[test]
    fn test_update_and_remove_move() {
        let mut store = BookStore::new();
        let mv = BookMove {
            usi: "7g7f".to_string(),
            score: Some(50),
            ..Default::default()
        };
        store.update_move(SFEN_HIRATE, mv).unwrap();
        assert!(store.is_unsaved());
        assert_eq!(store.entry_count(), Some(1));
        assert_eq!(store.search_moves(SFEN_HIRATE).unwrap().len(), 1);

        store.remove_move(SFEN_HIRATE, "7g7f").unwrap();
        assert!(store.search_moves(SFEN_HIRATE).unwrap().is_empty());
    }

    #[test]
    fn test_update_move_order() {
        let mut store = BookStore::new();
        for usi in ["7g7f", "2g2f", "5g5f"] {
            let mv = BookMove {
                usi: usi.to_string(),
                ..Default::default()
            };
            store.update_move(SFEN_HIRATE, mv).unwrap();
        }
        store.update_move_order(SFEN_HIRATE, "5g5f", 0).unwrap();
        let moves = store.search_moves(SFEN_HIRATE).unwrap();
        let order: Vec<&str> = moves.iter().map(|mv| mv.usi.as_str()).collect();
        assert_eq!(order, ["5g5f", "7g7f", "2g2f"]);
    }

    #[test]
    fn test_import_moves() {
        let mut store = BookStore::new();
        let sources = [
            source(SFEN_HIRATE, "7g7f", 1, Color::Black),
            source(SFEN_2, "3c3d", 2, Color::White),
            source(SFEN_HIRATE, "7g7f", 1, Color::Black),
            source(SFEN_HIRATE, "2g2f", 1, Color::Black),
        ];
        let summary = store.import_moves(&sources, &ImportOptions::default()).unwrap();
        assert_eq!(summary.entry_count, 3);
        assert_eq!(summary.duplicate_count, 1);

        // 出現回数の多い順に並ぶ
        let moves = store.search_moves(SFEN_HIRATE).unwrap();
        assert_eq!(moves[0].usi, "7g7f");
        assert_eq!(moves[0].count, Some(2));
        assert_eq!(moves[1].usi, "2g2f");
        assert_eq!(moves[1].count, Some(1));
    }

    #[test]
    fn test_import_moves_filters() {
        let mut store = BookStore::new();
        let sources = [
            source(SFEN_HIRATE, "7g7f", 1, Color::Black),
            source(SFEN_2, "3c3d", 2, Color::White),
        ];

        let options = ImportOptions {
            player_criteria: PlayerCriteria::Black,
            ..Default::default()
        };
        let summary = store.import_moves(&sources, &options).unwrap();
        assert_eq!(summary.entry_count, 1);
        assert!(store.search_moves(SFEN_2).unwrap().is_empty());

        store.clear();
        let options = ImportOptions {
            min_ply: 2,
            ..Default::default()
        };
        let summary = store.import_moves(&sources, &options).unwrap();
        assert_eq!(summary.entry_count, 1);
        assert!(store.search_moves(SFEN_HIRATE).unwrap().is_empty());
    }

    #[test]
    fn test_save_rejects_wrong_extension() {
        let mut store = BookStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.bin");
        // やねうら王形式は .db のみ
        assert!(matches!(
            store.save(&path),
            Err(BookError::InvalidExtension(_))
        ));
    }

    #[test]
    fn test_open_rejects_directory() {
        let mut store = BookStore::new();
        let dir = tempfile::tempdir().unwrap();
        let result = store.open(dir.path(), None);
        assert!(matches!(result, Err(BookError::NotAFile(_))));
    }
}
