//! やねうら王 定跡DBフォーマット（テキスト形式）
//!
//! `#YANEURAOU-DB2016 1.00` ヘッダーで始まり、`sfen ` 行と定跡手の行が
//! 続く。キーは手数を 1 に正規化した SFEN 文字列で、ファイルは
//! キーの辞書順に整列していることを前提に on-the-fly 検索できる。

use std::fs::File;
use std::io::{BufRead, Write};

use log::warn;

use crate::book::{BookMove, YaneBook};
use crate::error::BookError;
use crate::fileio::read_at;
use crate::sfen::normalize_sfen;

/// 定跡DBファイルの先頭行
pub const YANEURAOU_BOOK_HEADER_V100: &str = "#YANEURAOU-DB2016 1.00";

const MOVE_NONE: &str = "none";
const SCORE_NONE: &str = "none";
const DEPTH_NONE: &str = "none";

const SFEN_MARKER: &str = "sfen ";
const COMMENT_MARKER1: &str = "#";
const COMMENT_MARKER2: &str = "//";

/// 解析済みの 1 行
enum Line {
    Comment(String),
    Position { sfen: String, ply: u32 },
    Move(BookMove),
}

/// 定跡手の行かどうか。USI 表記の指し手に続く区切りスペースまで確認する。
fn is_move_line(line: &str) -> bool {
    let b = line.as_bytes();
    let file = |c: u8| c.is_ascii_digit() && c != b'0';
    let rank = |c: u8| (b'a'..=b'i').contains(&c);
    if b.len() >= 5 && file(b[0]) && rank(b[1]) && file(b[2]) && rank(b[3]) {
        if b[4] == b' ' {
            return true;
        }
        if b[4] == b'+' && b.len() >= 6 && b[5] == b' ' {
            return true;
        }
    }
    b.len() >= 5
        && matches!(b[0], b'R' | b'B' | b'G' | b'S' | b'N' | b'L' | b'P')
        && b[1] == b'*'
        && file(b[2])
        && rank(b[3])
        && b[4] == b' '
}

fn parse_line(line: &str) -> Line {
    if let Some(comment) = line.strip_prefix(COMMENT_MARKER1) {
        return Line::Comment(comment.to_string());
    }
    if let Some(comment) = line.strip_prefix(COMMENT_MARKER2) {
        return Line::Comment(comment.to_string());
    }

    if let Some(body) = line.strip_prefix(SFEN_MARKER) {
        let (sfen, ply) = normalize_sfen(body);
        return Line::Position { sfen, ply };
    }

    if is_move_line(line) {
        // 5 列 + 行末コメント。6 番目の要素が 5 個目のスペース以降の残り。
        let mut columns = line.splitn(6, ' ');
        let usi = columns.next().unwrap_or("").to_string();
        let usi2 = columns.next().filter(|c| *c != MOVE_NONE && !c.is_empty());
        // 過去のバージョンが score / depth の省略時に空文字を出力していた
        // 時期があるため、空文字も省略として扱う。
        let score = columns
            .next()
            .filter(|c| *c != SCORE_NONE && !c.is_empty())
            .and_then(|c| c.parse().ok());
        let depth = columns
            .next()
            .filter(|c| *c != DEPTH_NONE && !c.is_empty())
            .and_then(|c| c.parse().ok());
        let count = columns
            .next()
            .filter(|c| !c.is_empty())
            .and_then(|c| c.parse().ok());
        let comment = columns
            .next()
            .map(|c| {
                c.strip_prefix(COMMENT_MARKER1)
                    .or_else(|| c.strip_prefix(COMMENT_MARKER2))
                    .unwrap_or(c)
            })
            .unwrap_or("")
            .to_string();
        return Line::Move(BookMove {
            usi,
            usi2: usi2.map(str::to_string),
            score,
            depth,
            count,
            comment,
        });
    }

    // どれにも該当しない行はコメントとみなす
    Line::Comment(line.to_string())
}

fn append_comment_line(base: &mut String, next: &str) {
    if !base.is_empty() {
        base.push('\n');
    }
    base.push_str(next);
}

/// 直前の `sfen` 行の扱い
enum Current {
    /// まだ局面が現れていない
    None,
    /// 重複ブロックとして手を読み捨てる
    Skipped,
    /// このキーのエントリに手を取り込む
    Key(String),
}

/// テキスト定跡を最後まで読み込む。
/// 最初の空でない行がヘッダーでなければ失敗する。
pub fn load_book<R: BufRead>(input: R) -> Result<YaneBook, BookError> {
    let mut book = YaneBook::default();
    let mut current = Current::None;
    let mut seen_header = false;
    for (line_no, line) in input.lines().enumerate() {
        let mut line = line?;
        if line_no == 0 && line.starts_with('\u{feff}') {
            line.drain(..'\u{feff}'.len_utf8());
        }
        if !seen_header {
            if line.is_empty() {
                continue;
            }
            if line != YANEURAOU_BOOK_HEADER_V100 {
                return Err(BookError::UnsupportedHeader(line));
            }
            seen_header = true;
            continue;
        }
        match parse_line(&line) {
            Line::Comment(comment) => {
                // コメント行は直前のエントリまたは直前の手に付く
                if let Current::Key(key) = &current {
                    if let Some(entry) = book.get_mut(key) {
                        match entry.moves.last_mut() {
                            Some(mv) => append_comment_line(&mut mv.comment, &comment),
                            None => append_comment_line(&mut entry.comment, &comment),
                        }
                    }
                }
            }
            Line::Position { sfen, ply } => {
                current = if book.begin_block(sfen.clone(), ply) {
                    Current::Key(sfen)
                } else {
                    Current::Skipped
                };
            }
            Line::Move(mv) => match &current {
                Current::Key(key) => book.add_move(key.clone(), mv),
                Current::Skipped => {}
                Current::None => {
                    warn!("move line without position line: line={line_no}");
                }
            },
        }
    }
    Ok(book)
}

/// テキスト定跡を書き出す。キーの辞書順に並ぶため、出力はそのまま
/// on-the-fly 検索の前提（整列済み）を満たす。
pub fn store_book<W: Write>(book: &YaneBook, output: &mut W) -> Result<(), BookError> {
    writeln!(output, "{YANEURAOU_BOOK_HEADER_V100}")?;
    for (sfen, entry) in book.iter() {
        writeln!(output, "{SFEN_MARKER}{sfen}")?;
        if !entry.comment.is_empty() {
            for comment_line in entry.comment.split('\n') {
                writeln!(output, "{COMMENT_MARKER1}{comment_line}")?;
            }
        }
        for mv in &entry.moves {
            let usi2 = mv.usi2.as_deref().filter(|s| !s.is_empty()).unwrap_or(MOVE_NONE);
            let score = mv.score.map_or_else(|| SCORE_NONE.to_string(), |v| v.to_string());
            let depth = mv.depth.map_or_else(|| DEPTH_NONE.to_string(), |v| v.to_string());
            // 出現回数の省略は空文字。連続スペースをまとめて読む実装が
            // あるため score / depth は解析不能な文字列で埋める。
            let count = mv.count.map_or_else(String::new, |v| v.to_string());
            writeln!(output, "{} {} {} {} {}", mv.usi, usi2, score, depth, count)?;
            if !mv.comment.is_empty() {
                for comment_line in mv.comment.split('\n') {
                    writeln!(output, "{COMMENT_MARKER1}{comment_line}")?;
                }
            }
        }
    }
    Ok(())
}

/// `sfen` 行のキーが正規化後の辞書順で狭義単調増加かどうかを調べる。
/// on-the-fly 検索はこの整列を前提とする。
pub fn validate_ordering<R: BufRead>(input: R) -> Result<bool, BookError> {
    let mut prev: Option<String> = None;
    for line in input.lines() {
        let line = line?;
        let Some(body) = line.strip_prefix(SFEN_MARKER) else {
            continue;
        };
        let (sfen, _) = normalize_sfen(body);
        if let Some(prev) = &prev {
            if *prev >= sfen {
                return Ok(false);
            }
        }
        prev = Some(sfen);
    }
    Ok(true)
}

const PROBE_BUF: usize = 1024;
const MOVES_BUF: usize = 8 * 1024;
const MARKER_LEN: usize = SFEN_MARKER.len();

fn check_sfen_marker(buf: &[u8], offset: usize) -> bool {
    buf.len() >= offset + MARKER_LEN && &buf[offset..offset + MARKER_LEN] == SFEN_MARKER.as_bytes()
}

/// バッファ内で行頭に現れる最初の `sfen ` の位置を探す
fn find_sfen_marker(buf: &[u8], is_file_head: bool) -> Option<usize> {
    if is_file_head {
        // 通常はヘッダーが先頭にあるが、いきなり SFEN が来ても扱える
        if check_sfen_marker(buf, 0) {
            return Some(0);
        }
        if buf.starts_with(&[0xef, 0xbb, 0xbf]) && check_sfen_marker(buf, 3) {
            return Some(3);
        }
    }
    for i in 0..buf.len().saturating_sub(MARKER_LEN + 1) {
        if (buf[i] == b'\n' || buf[i] == b'\r') && check_sfen_marker(buf, i + 1) {
            return Some(i + 1);
        }
    }
    None
}

/// 改行直前までを 1 行として切り出す
fn line_at(buf: &[u8], offset: usize) -> &[u8] {
    let mut end = offset;
    while end < buf.len() && buf[end] != b'\n' && buf[end] != b'\r' {
        end += 1;
    }
    &buf[offset..end]
}

/// 正規化済み SFEN に一致する `sfen` 行を二分探索し、
/// その行の直後のオフセットを返す。
fn binary_search(sfen: &str, file: &File, size: u64) -> Result<Option<u64>, BookError> {
    let mut buffer = [0u8; PROBE_BUF];
    let mut begin: u64 = 0;
    let mut end: u64 = size;
    while begin < end {
        let mid = (begin + end) / 2;

        // mid 以降で最初の sfen 行を探す
        let mut head = mid;
        let mut sfen_offset = None;
        while head < end {
            let n = read_at(file, &mut buffer, head)?;
            if n == 0 {
                break;
            }
            if let Some(offset) = find_sfen_marker(&buffer[..n], head == 0) {
                sfen_offset = Some(head + offset as u64);
                break;
            }
            // マーカーが読み込み境界をまたぐ場合に備えて重ねて読む
            head += (PROBE_BUF - (MARKER_LEN + 1)) as u64;
        }
        let Some(sfen_offset) = sfen_offset else {
            return Ok(None);
        };

        let n = read_at(file, &mut buffer, sfen_offset)?;
        let line = line_at(&buffer[..n], 0);
        let line_str = String::from_utf8_lossy(line);
        let (current, _) = normalize_sfen(&line_str[MARKER_LEN..]);
        let after = sfen_offset + line.len() as u64 + 1;
        if sfen == current {
            return Ok(Some(after));
        }
        if sfen < current.as_str() {
            end = mid;
        } else {
            begin = after;
        }
    }
    Ok(None)
}

/// 局面に対応する定跡手をファイルから直接検索する。
/// ファイルがキーの辞書順に整列していることを前提とする。
pub fn search_moves_on_the_fly(
    sfen: &str,
    file: &File,
    size: u64,
) -> Result<Vec<BookMove>, BookError> {
    let (sfen, _) = normalize_sfen(sfen);
    let Some(offset) = binary_search(&sfen, file, size)? else {
        return Ok(Vec::new());
    };

    let mut buffer = vec![0u8; MOVES_BUF];
    let n = read_at(file, &mut buffer, offset)?;
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut moves = Vec::new();
    let mut i = 0;
    loop {
        let line = line_at(&buffer[..n], i);
        i += line.len() + 1;
        if i >= n {
            // バッファ末尾に達した行は完結している保証がないため捨てる
            break;
        }
        match parse_line(&String::from_utf8_lossy(line)) {
            // コメント行は on-the-fly では無視する
            Line::Comment(_) => continue,
            Line::Move(mv) => moves.push(mv),
            Line::Position { .. } => break,
        }
    }
    Ok(moves)
}
