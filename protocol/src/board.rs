//! 棋盘状态

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::error::GameError;

/// 棋子标记
///
/// 房主固定为 A（先手），加入者固定为 B，在房间存续期间不变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    A,
    B,
}

impl Mark {
    /// 获取对方标记
    pub fn opponent(&self) -> Mark {
        match self {
            Mark::A => Mark::B,
            Mark::B => Mark::A,
        }
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mark::A => write!(f, "A"),
            Mark::B => write!(f, "B"),
        }
    }
}

/// 棋盘坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: u8,
    pub col: u8,
}

impl Position {
    /// 创建坐标（不检查范围）
    pub fn new_unchecked(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// 坐标是否在棋盘范围内
    pub fn is_valid(&self) -> bool {
        (self.row as usize) < BOARD_SIZE && (self.col as usize) < BOARD_SIZE
    }

    /// 转换为行主序下标
    pub fn to_index(&self) -> usize {
        self.row as usize * BOARD_SIZE + self.col as usize
    }
}

/// 棋盘
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// 13x13 格子，行主序，使用 Vec 以支持 serde
    cells: Vec<Option<Mark>>,
}

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self {
            cells: vec![None; BOARD_SIZE * BOARD_SIZE],
        }
    }

    /// 获取指定位置的标记（空格或越界返回 None）
    pub fn get(&self, pos: Position) -> Option<Mark> {
        if pos.is_valid() {
            self.cells[pos.to_index()]
        } else {
            None
        }
    }

    /// 落子
    ///
    /// 一个格子在一局中只能从空写入一次，已占用的格子拒绝覆盖。
    pub fn place(&mut self, pos: Position, mark: Mark) -> Result<(), GameError> {
        if !pos.is_valid() {
            return Err(GameError::OutOfBounds {
                row: pos.row,
                col: pos.col,
            });
        }
        let index = pos.to_index();
        if self.cells[index].is_some() {
            return Err(GameError::CellOccupied {
                row: pos.row,
                col: pos.col,
            });
        }
        self.cells[index] = Some(mark);
        Ok(())
    }

    /// 棋盘是否已下满
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| cell.is_some())
    }

    /// 清空棋盘（仅再战时使用）
    pub fn reset(&mut self) {
        self.cells.fill(None);
    }

    /// 已落子数量
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}
