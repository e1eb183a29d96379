//! 将棋の定跡（opening book）データベースの読み書き・検索ライブラリ
//!
//! 対応フォーマット:
//! - やねうら王 定跡DB（`#YANEURAOU-DB2016 1.00`、テキスト形式）
//! - Apery 定跡（16 バイト固定長レコード、バイナリ形式）
//!
//! どちらの形式も、外部ツールが生成したファイルをそのまま読めるように
//! バイナリレイアウトと 64bit 局面キー（Apery 互換 Zobrist）を
//! ビット単位で再現する。ファイルサイズに応じて全体をメモリに展開するか、
//! ソート済みファイルへの二分探索（on-the-fly）で検索するかを選択できる。

pub mod apery;
pub mod book;
pub mod error;
mod fileio;
pub mod sfen;
pub mod store;
pub mod types;
pub mod yaneuraou;
pub mod zobrist;

pub use book::{Book, BookEntry, BookFormat, BookMove};
pub use error::{BookError, BookResult};
pub use store::{
    BookStore, ImportOptions, ImportSummary, LoadingMode, OpenOptions, PlayerCriteria, SourceMove,
};
