//! 棋子定义

use serde::{Deserialize, Serialize};

/// 棋盘格内容
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tile {
    /// 空格
    Empty,
    /// 黑子（先手）
    Black,
    /// 白子（后手）
    White,
}

impl Tile {
    /// 获取对方颜色
    ///
    /// 只对 `Black`/`White` 有定义，对 `Empty` 调用属于调用方 bug。
    pub fn opposite(self) -> Tile {
        match self {
            Tile::Black => Tile::White,
            Tile::White => Tile::Black,
            Tile::Empty => unreachable!("Empty has no opposite"),
        }
    }

    /// 获取序列化字符
    pub fn to_char(self) -> char {
        match self {
            Tile::Empty => '.',
            Tile::Black => 'B',
            Tile::White => 'W',
        }
    }

    /// 从序列化字符解析
    pub fn from_char(c: char) -> Option<Tile> {
        match c {
            '.' => Some(Tile::Empty),
            'B' => Some(Tile::Black),
            'W' => Some(Tile::White),
            _ => None,
        }
    }
}
