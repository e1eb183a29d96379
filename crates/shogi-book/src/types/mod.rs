//! 局面ドメインの最小サーフェス
//!
//! 定跡エンジンが依存するのは升・駒種の番号付けと SFEN/USI 表記だけなので、
//! 指し手の合法性判定や局面の進行はここでは扱わない。

mod color;
mod piece;
mod square;

pub use color::Color;
pub(crate) use piece::HAND_PIECE_NUM;
pub use piece::{Piece, PieceType};
pub use square::Square;
