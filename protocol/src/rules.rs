//! 连珠判定
//!
//! 获胜线只可能经过刚落下的棋子，因此每次落子只需从该点沿
//! 四条轴向双向扫描，无需遍历整个棋盘。

use crate::board::{Board, Mark, Position};
use crate::constants::{BOARD_SIZE, WIN_LENGTH};

/// 四条无向轴：横、竖、两条对角线
const AXES: [(i32, i32); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// 连珠检测器
pub struct WinDetector;

impl WinDetector {
    /// 查找经过 `pos` 的获胜线
    ///
    /// 沿每条轴从落子点向两端延伸，统计连续的同色棋子（落子点自身计 1）。
    /// 任一轴的连续数达到 WIN_LENGTH 即返回整条连线（6 连及以上同样成立），
    /// 坐标按行列顺序排列；否则返回 None。
    pub fn find_win_line(board: &Board, pos: Position, mark: Mark) -> Option<Vec<Position>> {
        for (dr, dc) in AXES {
            let mut line = vec![pos];

            for dir in [-1i32, 1] {
                let mut step = 1i32;
                loop {
                    let row = pos.row as i32 + dr * dir * step;
                    let col = pos.col as i32 + dc * dir * step;

                    if row < 0 || row >= BOARD_SIZE as i32 || col < 0 || col >= BOARD_SIZE as i32 {
                        break;
                    }

                    let next = Position::new_unchecked(row as u8, col as u8);
                    if board.get(next) != Some(mark) {
                        break;
                    }

                    line.push(next);
                    step += 1;
                }
            }

            if line.len() >= WIN_LENGTH {
                line.sort_unstable_by_key(|p| (p.row, p.col));
                return Some(line);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place_all(board: &mut Board, cells: &[(u8, u8)], mark: Mark) {
        for &(row, col) in cells {
            board.place(Position::new_unchecked(row, col), mark).unwrap();
        }
    }

    #[test]
    fn test_horizontal_win() {
        let mut board = Board::empty();
        place_all(&mut board, &[(6, 6), (6, 7), (6, 8), (6, 9), (6, 10)], Mark::A);

        let line =
            WinDetector::find_win_line(&board, Position::new_unchecked(6, 10), Mark::A)
                .expect("five in a row should win");
        assert_eq!(
            line,
            vec![
                Position::new_unchecked(6, 6),
                Position::new_unchecked(6, 7),
                Position::new_unchecked(6, 8),
                Position::new_unchecked(6, 9),
                Position::new_unchecked(6, 10),
            ]
        );
    }

    #[test]
    fn test_vertical_win_through_middle_placement() {
        let mut board = Board::empty();
        place_all(&mut board, &[(2, 4), (3, 4), (5, 4), (6, 4)], Mark::B);
        board.place(Position::new_unchecked(4, 4), Mark::B).unwrap();

        // 最后落在连线中间同样要被检出
        let line = WinDetector::find_win_line(&board, Position::new_unchecked(4, 4), Mark::B).unwrap();
        assert_eq!(line.len(), 5);
        assert_eq!(line[0], Position::new_unchecked(2, 4));
        assert_eq!(line[4], Position::new_unchecked(6, 4));
    }

    #[test]
    fn test_diagonal_wins() {
        let mut board = Board::empty();
        place_all(&mut board, &[(0, 0), (1, 1), (2, 2), (3, 3), (4, 4)], Mark::A);
        assert!(
            WinDetector::find_win_line(&board, Position::new_unchecked(2, 2), Mark::A).is_some()
        );

        let mut board = Board::empty();
        place_all(&mut board, &[(4, 8), (5, 7), (6, 6), (7, 5), (8, 4)], Mark::B);
        let line =
            WinDetector::find_win_line(&board, Position::new_unchecked(8, 4), Mark::B).unwrap();
        assert_eq!(line.len(), 5);
        // 反对角线按行升序排列
        assert_eq!(line[0], Position::new_unchecked(4, 8));
        assert_eq!(line[4], Position::new_unchecked(8, 4));
    }

    #[test]
    fn test_four_is_not_a_win() {
        let mut board = Board::empty();
        place_all(&mut board, &[(6, 6), (6, 7), (6, 8), (6, 9)], Mark::A);

        assert!(
            WinDetector::find_win_line(&board, Position::new_unchecked(6, 9), Mark::A).is_none()
        );
    }

    #[test]
    fn test_overline_counts() {
        let mut board = Board::empty();
        place_all(
            &mut board,
            &[(6, 3), (6, 4), (6, 5), (6, 6), (6, 7), (6, 8)],
            Mark::A,
        );

        // 6 连同样算胜，返回整条连线
        let line =
            WinDetector::find_win_line(&board, Position::new_unchecked(6, 5), Mark::A).unwrap();
        assert_eq!(line.len(), 6);

        // 7 连亦然
        let mut board = Board::empty();
        place_all(
            &mut board,
            &[(2, 9), (3, 9), (4, 9), (5, 9), (6, 9), (7, 9), (8, 9)],
            Mark::B,
        );
        let line =
            WinDetector::find_win_line(&board, Position::new_unchecked(5, 9), Mark::B).unwrap();
        assert_eq!(line.len(), 7);
        assert_eq!(line[0], Position::new_unchecked(2, 9));
        assert_eq!(line[6], Position::new_unchecked(8, 9));
    }

    #[test]
    fn test_opponent_mark_breaks_run() {
        let mut board = Board::empty();
        place_all(&mut board, &[(6, 6), (6, 7), (6, 9), (6, 10)], Mark::A);
        board.place(Position::new_unchecked(6, 8), Mark::B).unwrap();

        assert!(
            WinDetector::find_win_line(&board, Position::new_unchecked(6, 10), Mark::A).is_none()
        );
    }

    #[test]
    fn test_run_at_board_edge() {
        let mut board = Board::empty();
        place_all(&mut board, &[(0, 8), (0, 9), (0, 10), (0, 11), (0, 12)], Mark::B);

        let line =
            WinDetector::find_win_line(&board, Position::new_unchecked(0, 12), Mark::B).unwrap();
        assert_eq!(line.len(), 5);
    }
}
