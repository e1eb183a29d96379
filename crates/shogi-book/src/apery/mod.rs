//! Apery 定跡フォーマット
//!
//! ヘッダーのない 16 バイト固定長レコードの列。このエンジンが書き出す
//! ファイルはハッシュ昇順に整列し、同一ハッシュのレコードは連続する。
//! その前提により、メモリに載らないファイルでも二分探索で検索できる。

mod codec;

pub use codec::{RECORD_SIZE, decode_move, encode_move};

use std::fs::File;
use std::io::{Read, Write};

use log::debug;

use crate::book::{AperyBook, BookMove};
use crate::error::BookError;
use crate::fileio::read_exact_at;
use crate::zobrist::hash_sfen;

use codec::{decode_record, encode_record};

const RECORD_LEN: u64 = RECORD_SIZE as u64;

/// 入力ストリームを最後まで読み、既存の定跡にマージする。
/// 16 バイト単位で読み切れない入力は途中結果を返さず失敗する。
pub fn load_into<R: Read>(book: &mut AperyBook, input: &mut R) -> Result<(), BookError> {
    let mut buf = [0u8; RECORD_SIZE];
    let mut total: u64 = 0;
    loop {
        let filled = fill_record(input, &mut buf)?;
        if filled == 0 {
            return Ok(());
        }
        if filled < RECORD_SIZE {
            return Err(BookError::InvalidBinaryFormat {
                len: total + filled as u64,
            });
        }
        let (hash, mv) = decode_record(&buf)?;
        book.add_move(hash, mv);
        total += RECORD_LEN;
    }
}

/// 入力ストリーム全体から定跡を構築する
pub fn load_book<R: Read>(input: &mut R) -> Result<AperyBook, BookError> {
    let mut book = AperyBook::default();
    load_into(&mut book, input)?;
    Ok(book)
}

fn fill_record<R: Read>(input: &mut R, buf: &mut [u8; RECORD_SIZE]) -> Result<usize, BookError> {
    let mut filled = 0;
    while filled < RECORD_SIZE {
        let n = input.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// 全レコードをキー昇順・同一キー連続で書き出す
pub fn store_book<W: Write>(book: &AperyBook, output: &mut W) -> Result<(), BookError> {
    for (&key, entry) in book.iter() {
        for mv in &entry.moves {
            output.write_all(&encode_record(key, mv)?)?;
        }
    }
    Ok(())
}

/// キーに一致する最初のレコードのオフセットを求める。
///
/// 二分探索の着地点は同一キーの連続区間の途中になりうるため、
/// begin 方向へ 16 バイトずつ巻き戻して区間の先頭を確定する。
fn binary_search(key: u64, file: &File, size: u64) -> Result<Option<u64>, BookError> {
    let mut buf = [0u8; 8];
    let mut begin: u64 = 0;
    let mut end: u64 = size;
    while begin < end {
        let mid = (begin + end) / 2;
        // begin は常に 16 の倍数なので、境界に切り下げても begin を下回らない
        let mut offset = mid - mid % RECORD_LEN;
        loop {
            read_exact_at(file, &mut buf, offset)?;
            let probe = u64::from_le_bytes(buf);
            if key < probe {
                end = mid;
                break;
            }
            if key > probe {
                begin = offset + RECORD_LEN;
                break;
            }
            if offset == begin {
                return Ok(Some(offset));
            }
            offset -= RECORD_LEN;
        }
    }
    Ok(None)
}

/// 局面に対応する定跡手をファイルから直接検索する。
/// 見つかった位置から同一キーのレコードを格納順に集める。
pub fn search_moves_on_the_fly(
    sfen: &str,
    file: &File,
    size: u64,
) -> Result<Vec<BookMove>, BookError> {
    let key = hash_sfen(sfen)?;
    let Some(mut offset) = binary_search(key, file, size)? else {
        return Ok(Vec::new());
    };
    debug!("apery book hit: key={key:#018x} offset={offset}");

    let mut moves = Vec::new();
    let mut buf = [0u8; RECORD_SIZE];
    while offset + RECORD_LEN <= size {
        read_exact_at(file, &mut buf, offset)?;
        let (hash, mv) = decode_record(&buf)?;
        if hash != key {
            break;
        }
        moves.push(mv);
        offset += RECORD_LEN;
    }
    Ok(moves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(hash: u64, usi: &str, count: u32, score: i32) -> Vec<u8> {
        let mv = BookMove {
            usi: usi.to_string(),
            count: Some(count),
            score: Some(score),
            ..Default::default()
        };
        encode_record(hash, &mv).unwrap().to_vec()
    }

    #[test]
    fn test_load_book() {
        let mut data = Vec::new();
        data.extend(record(10, "7g7f", 3, 50));
        data.extend(record(10, "2g2f", 2, 40));
        data.extend(record(10, "7g7f", 1, 0)); // 重複
        data.extend(record(20, "3c3d", 1, -10));
        let book = load_book(&mut Cursor::new(&data)).unwrap();
        assert_eq!(book.entry_count(), 2);
        assert_eq!(book.duplicate_count(), 1);
        let moves = &book.get(&10).unwrap().moves;
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].usi, "7g7f");
        assert_eq!(moves[0].score, Some(50));
        assert_eq!(moves[1].usi, "2g2f");
    }

    #[test]
    fn test_load_book_rejects_partial_record() {
        // 17 バイトはレコード境界に一致しない
        let mut data = record(10, "7g7f", 1, 0);
        data.push(0);
        let result = load_book(&mut Cursor::new(&data));
        assert!(matches!(
            result,
            Err(BookError::InvalidBinaryFormat { len: 17 })
        ));
    }

    #[test]
    fn test_store_book_sorted_by_key() {
        let mut book = AperyBook::default();
        let mv = |usi: &str| BookMove {
            usi: usi.to_string(),
            score: Some(0),
            count: Some(0),
            ..Default::default()
        };
        book.add_move(0xffff_0000_0000_0000, mv("7g7f"));
        book.add_move(1, mv("2g2f"));
        book.add_move(1, mv("3g3f"));

        let mut data = Vec::new();
        store_book(&book, &mut data).unwrap();
        assert_eq!(data.len(), 48);
        // キー昇順・同一キー連続
        assert_eq!(u64::from_le_bytes(data[0..8].try_into().unwrap()), 1);
        assert_eq!(u64::from_le_bytes(data[16..24].try_into().unwrap()), 1);
        assert_eq!(
            u64::from_le_bytes(data[32..40].try_into().unwrap()),
            0xffff_0000_0000_0000
        );
    }

    #[test]
    fn test_store_load_roundtrip() {
        let mut data = Vec::new();
        data.extend(record(30, "3c3d", 1, -10));
        data.extend(record(10, "7g7f", 3, 50));
        data.extend(record(10, "2g2f", 2, 40));
        let book = load_book(&mut Cursor::new(&data)).unwrap();

        let mut stored = Vec::new();
        store_book(&book, &mut stored).unwrap();
        let reloaded = load_book(&mut Cursor::new(&stored)).unwrap();
        assert_eq!(reloaded.entry_count(), book.entry_count());
        for (key, entry) in book.iter() {
            assert_eq!(&reloaded.get(key).unwrap().moves, &entry.moves);
        }
    }
}
