//! 棋盘状态与黑白棋规则

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::constants::{BOARD_SIZE, ROW_SEPARATOR};
use crate::error::GameError;
use crate::tile::Tile;

/// 八个罗盘方向
const DIRECTIONS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// 双方子数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scores {
    pub black: usize,
    pub white: usize,
}

/// 对局结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    /// 黑方胜
    BlackWins,
    /// 白方胜
    WhiteWins,
    /// 平局
    Draw,
}

impl GameResult {
    /// 获取广播用字符
    pub fn to_char(self) -> char {
        match self {
            GameResult::BlackWins => 'B',
            GameResult::WhiteWins => 'W',
            GameResult::Draw => '.',
        }
    }

    /// 从广播字符解析
    pub fn from_char(c: char) -> Option<GameResult> {
        match c {
            'B' => Some(GameResult::BlackWins),
            'W' => Some(GameResult::WhiteWins),
            '.' => Some(GameResult::Draw),
            _ => None,
        }
    }
}

/// 8x8 棋盘，只能通过 `place` 修改
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    tiles: [[Tile; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// 创建初始棋盘，中央四格按标准开局摆放
    pub fn new() -> Self {
        let mut board = Self {
            tiles: [[Tile::Empty; BOARD_SIZE]; BOARD_SIZE],
        };
        board.tiles[3][3] = Tile::White;
        board.tiles[3][4] = Tile::Black;
        board.tiles[4][3] = Tile::Black;
        board.tiles[4][4] = Tile::White;
        board
    }

    /// 获取指定格的内容
    pub fn get(&self, row: usize, col: usize) -> Tile {
        self.tiles[row][col]
    }

    /// 判断落子是否合法
    ///
    /// 目标格必须为空，且至少一个方向上夹住一个以上的对方棋子。
    pub fn is_move_valid(&self, color: Tile, row: usize, col: usize) -> bool {
        if row >= BOARD_SIZE || col >= BOARD_SIZE {
            return false;
        }
        if self.tiles[row][col] != Tile::Empty {
            return false;
        }
        DIRECTIONS
            .iter()
            .any(|&dir| self.captured_count(color, row, col, dir) > 0)
    }

    /// 沿一个方向统计被夹住的对方棋子数
    ///
    /// 返回 0 表示该方向不构成夹击：遇到空格、走出边界，
    /// 或第一格就是己方棋子。
    fn captured_count(&self, color: Tile, row: usize, col: usize, dir: (i32, i32)) -> usize {
        let rival = color.opposite();
        let mut count = 0;
        let (mut r, mut c) = (row as i32 + dir.0, col as i32 + dir.1);
        while (0..BOARD_SIZE as i32).contains(&r) && (0..BOARD_SIZE as i32).contains(&c) {
            let tile = self.tiles[r as usize][c as usize];
            if tile == rival {
                count += 1;
            } else if tile == color {
                return count;
            } else {
                return 0;
            }
            r += dir.0;
            c += dir.1;
        }
        0
    }

    /// 落子并翻转所有被夹住的对方棋子
    ///
    /// 非法落子不改动棋盘。返回棋盘是否发生了变化。
    pub fn place(&mut self, row: usize, col: usize, color: Tile) -> bool {
        if !self.is_move_valid(color, row, col) {
            return false;
        }

        self.tiles[row][col] = color;
        for &dir in &DIRECTIONS {
            let count = self.captured_count(color, row, col, dir);
            let (mut r, mut c) = (row as i32, col as i32);
            for _ in 0..count {
                r += dir.0;
                c += dir.1;
                self.tiles[r as usize][c as usize] = color;
            }
        }
        true
    }

    /// 存在合法落子点的行号
    pub fn rows_with_valid_moves(&self, color: Tile) -> Vec<usize> {
        (0..BOARD_SIZE)
            .filter(|&row| (0..BOARD_SIZE).any(|col| self.is_move_valid(color, row, col)))
            .collect()
    }

    /// 某一行中合法落子点的列号
    pub fn tiles_with_valid_move(&self, color: Tile, row: usize) -> Vec<usize> {
        (0..BOARD_SIZE)
            .filter(|&col| self.is_move_valid(color, row, col))
            .collect()
    }

    /// 指定颜色是否还有任何合法落子
    pub fn has_any_valid_move(&self, color: Tile) -> bool {
        (0..BOARD_SIZE)
            .any(|row| (0..BOARD_SIZE).any(|col| self.is_move_valid(color, row, col)))
    }

    /// 双方子数统计
    pub fn scores(&self) -> Scores {
        let mut scores = Scores { black: 0, white: 0 };
        for row in &self.tiles {
            for &tile in row {
                match tile {
                    Tile::Black => scores.black += 1,
                    Tile::White => scores.white += 1,
                    Tile::Empty => {}
                }
            }
        }
        scores
    }

    /// 判定对局是否结束
    ///
    /// 结束条件：一方子数为零；棋盘已满；双方都无合法落子。
    /// 后两种按子数多者胜，相等为平局。返回 `None` 表示对局继续。
    pub fn outcome(&self) -> Option<GameResult> {
        let Scores { black, white } = self.scores();

        if black == 0 && white > 0 {
            return Some(GameResult::WhiteWins);
        }
        if white == 0 && black > 0 {
            return Some(GameResult::BlackWins);
        }

        let full = black + white == BOARD_SIZE * BOARD_SIZE;
        if full
            || (!self.has_any_valid_move(Tile::Black) && !self.has_any_valid_move(Tile::White))
        {
            return Some(match black.cmp(&white) {
                Ordering::Greater => GameResult::BlackWins,
                Ordering::Less => GameResult::WhiteWins,
                Ordering::Equal => GameResult::Draw,
            });
        }

        None
    }

    /// 序列化为文本：八行各八个字符，以 '|' 连接
    pub fn serialize(&self) -> String {
        self.tiles
            .iter()
            .map(|row| row.iter().map(|t| t.to_char()).collect::<String>())
            .collect::<Vec<_>>()
            .join(&ROW_SEPARATOR.to_string())
    }

    /// 从文本解析棋盘
    ///
    /// 形状或字符不合法时返回错误，不产生半填充的棋盘。
    pub fn deserialize(text: &str) -> Result<Board, GameError> {
        let rows: Vec<&str> = text.split(ROW_SEPARATOR).collect();
        if rows.len() != BOARD_SIZE {
            return Err(GameError::InvalidBoard {
                reason: format!("expected {} rows, got {}", BOARD_SIZE, rows.len()),
            });
        }

        let mut tiles = [[Tile::Empty; BOARD_SIZE]; BOARD_SIZE];
        for (r, row) in rows.iter().enumerate() {
            let chars: Vec<char> = row.chars().collect();
            if chars.len() != BOARD_SIZE {
                return Err(GameError::InvalidBoard {
                    reason: format!(
                        "row {} has {} columns, expected {}",
                        r,
                        chars.len(),
                        BOARD_SIZE
                    ),
                });
            }
            for (c, &ch) in chars.iter().enumerate() {
                tiles[r][c] = Tile::from_char(ch).ok_or_else(|| GameError::InvalidBoard {
                    reason: format!("invalid tile character: {:?}", ch),
                })?;
            }
        }

        Ok(Board { tiles })
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
