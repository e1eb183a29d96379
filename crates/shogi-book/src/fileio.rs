//! 位置指定読み込み（positioned read）
//!
//! on-the-fly 検索は共有カーソルを動かさず、明示オフセットで読む。
//! 同一ハンドルへの並行読み出しの可否はプラットフォームの
//! read プリミティブの再入可能性に従う。ロックはここでは行わない。

use std::fs::File;
use std::io;

#[cfg(unix)]
pub(crate) fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
pub(crate) fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

/// `buf` 全体が埋まるまで位置指定読み込みを繰り返す
pub(crate) fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = read_at(file, &mut buf[filled..], offset + filled as u64)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected end of book file",
            ));
        }
        filled += n;
    }
    Ok(())
}
