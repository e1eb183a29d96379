//! 定跡エンジンのエラー型

use std::path::PathBuf;

use crate::sfen::SfenError;

/// 定跡の読み書き・検索で発生するエラー
#[derive(thiserror::Error, Debug)]
pub enum BookError {
    /// 未対応の定跡ヘッダー（実際のヘッダー文字列を保持する）
    #[error("unsupported book header: {0}")]
    UnsupportedHeader(String),

    /// バイナリ定跡のレコード境界不整合
    #[error("invalid apery book format: {len} bytes is not a multiple of 16")]
    InvalidBinaryFormat { len: u64 },

    /// USI 表記として解釈できない指し手
    #[error("invalid usi move: {0}")]
    InvalidMove(String),

    /// SFEN 解析エラー
    #[error(transparent)]
    Sfen(#[from] SfenError),

    /// 通常ファイル以外を開こうとした
    #[error("not a file: {0}")]
    NotAFile(PathBuf),

    /// 保存先の拡張子がフォーマットと一致しない
    #[error("invalid file extension: {0}")]
    InvalidExtension(PathBuf),

    /// 局面順で整列されていないテキスト定跡
    #[error("book is not ordered by position: {0}")]
    NotOrdered(PathBuf),

    /// on-the-fly モードの定跡に対する書き込み操作
    #[error("cannot {0} on-the-fly book")]
    OnTheFlyReadOnly(&'static str),

    /// I/O エラー（リトライせずそのまま伝播する）
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 定跡操作の Result 型
pub type BookResult<T> = Result<T, BookError>;
