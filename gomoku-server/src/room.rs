//! 房间系统

use std::collections::HashMap;
use std::time::Instant;

use rand::Rng;

use protocol::{
    Board, GameError, Mark, PlayerId, PlayerInfo, Position, RoomCode, RoomState, WinDetector,
    ROOM_CODE_LEN,
};

/// 房间码字符集（大写字母 + 数字，便于口头分享）
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// 房间内的玩家
#[derive(Debug, Clone)]
pub struct GamePlayer {
    pub id: PlayerId,
    pub mark: Mark,
    /// 本房间内累计获胜局数
    pub score: u32,
}

impl GamePlayer {
    fn new(id: PlayerId, mark: Mark) -> Self {
        Self { id, mark, score: 0 }
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            mark: self.mark,
            score: self.score,
        }
    }
}

/// 一次落子被接受后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveVerdict {
    /// 落子有效，轮到对方
    Placed { next_turn: PlayerId },
    /// 落子构成连珠，对局结束
    Win { line: Vec<Position> },
    /// 棋盘下满且无连珠，和局
    Draw,
}

/// 房间
///
/// 状态机: Waiting -> Playing -> Finished -> Playing(再战) -> ...
/// 房间只因玩家离开而销毁，对局结束本身不会销毁房间。
pub struct Room {
    pub code: RoomCode,
    /// 玩家按加入顺序排列：首位固定为 A，次位固定为 B
    pub players: Vec<GamePlayer>,
    pub board: Board,
    /// 下一手玩家，仅在 Playing 状态有意义
    pub current_turn: Option<PlayerId>,
    pub state: RoomState,
    /// 上一局获胜者，再战时由其先行
    pub last_winner: Option<PlayerId>,
    /// 已表示愿意再战的玩家（去重）
    pub ready_to_rematch: Vec<PlayerId>,
    pub created_at: Instant,
}

impl Room {
    /// 创建新房间，房主为先手 A
    pub fn new(code: RoomCode, creator: PlayerId) -> Self {
        Self {
            code,
            players: vec![GamePlayer::new(creator, Mark::A)],
            board: Board::empty(),
            current_turn: Some(creator),
            state: RoomState::Waiting,
            last_winner: None,
            ready_to_rematch: Vec::new(),
            created_at: Instant::now(),
        }
    }

    /// 检查房间是否已满
    pub fn is_full(&self) -> bool {
        self.players.len() >= 2
    }

    /// 检查玩家是否在房间中
    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    /// 获取玩家的标记
    pub fn mark_of(&self, player_id: PlayerId) -> Option<Mark> {
        self.players
            .iter()
            .find(|p| p.id == player_id)
            .map(|p| p.mark)
    }

    /// 获取指定标记的玩家
    pub fn player_by_mark(&self, mark: Mark) -> Option<&GamePlayer> {
        self.players.iter().find(|p| p.mark == mark)
    }

    /// 获取对手 ID
    pub fn opponent_of(&self, player_id: PlayerId) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|p| p.id != player_id)
            .map(|p| p.id)
    }

    /// 房间内玩家信息快照（用于广播）
    pub fn player_infos(&self) -> Vec<PlayerInfo> {
        self.players.iter().map(|p| p.info()).collect()
    }

    /// 第二名玩家加入，固定为后手 B
    ///
    /// 要求房间恰好只有房主一人；成功后进入 Playing，首局由 A 先行。
    pub fn join(&mut self, player_id: PlayerId) -> Option<Mark> {
        if self.players.len() != 1 || self.has_player(player_id) {
            return None;
        }
        let creator_id = self.player_by_mark(Mark::A)?.id;

        self.players.push(GamePlayer::new(player_id, Mark::B));
        self.state = RoomState::Playing;
        self.current_turn = Some(creator_id);
        Some(Mark::B)
    }

    /// 尝试落子
    ///
    /// 接受条件: 对局进行中、轮到该玩家、坐标有效、格子为空。
    /// 任一条件不满足返回 Err，棋盘不变——调用方按无效输入静默丢弃。
    pub fn try_move(
        &mut self,
        mover: PlayerId,
        pos: Position,
    ) -> Result<MoveVerdict, GameError> {
        if self.state != RoomState::Playing {
            return Err(GameError::NotPlaying);
        }
        if self.current_turn != Some(mover) {
            return Err(GameError::NotYourTurn);
        }
        let mark = self.mark_of(mover).ok_or(GameError::NotInRoom)?;

        self.board.place(pos, mark)?;

        if let Some(line) = WinDetector::find_win_line(&self.board, pos, mark) {
            self.state = RoomState::Finished;
            self.last_winner = Some(mover);
            if let Some(winner) = self.players.iter_mut().find(|p| p.id == mover) {
                winner.score += 1;
            }
            return Ok(MoveVerdict::Win { line });
        }

        if self.board.is_full() {
            self.state = RoomState::Finished;
            return Ok(MoveVerdict::Draw);
        }

        let next_turn = self.opponent_of(mover).ok_or(GameError::NotInRoom)?;
        self.current_turn = Some(next_turn);
        Ok(MoveVerdict::Placed { next_turn })
    }

    /// 玩家表示愿意再战（重复信号合并，不累计）
    ///
    /// 返回当前就绪列表以及双方是否都已就绪；
    /// 仅在 Finished 状态且玩家在房间内时有效。
    pub fn signal_ready(&mut self, player_id: PlayerId) -> Option<(Vec<PlayerId>, bool)> {
        if self.state != RoomState::Finished || !self.has_player(player_id) {
            return None;
        }
        if !self.ready_to_rematch.contains(&player_id) {
            self.ready_to_rematch.push(player_id);
        }
        let all_ready = self.players.len() >= 2
            && self
                .players
                .iter()
                .all(|p| self.ready_to_rematch.contains(&p.id));

        Some((self.ready_to_rematch.clone(), all_ready))
    }

    /// 双方就绪后重置房间，开始新对局
    ///
    /// 上一局获胜者（若仍在房间内）先行，否则由 A 先行。
    /// 返回新对局的先手玩家。
    pub fn reset_for_rematch(&mut self) -> PlayerId {
        self.board.reset();

        let opener = match self.last_winner {
            Some(winner) if self.has_player(winner) => winner,
            _ => self.players[0].id,
        };

        self.current_turn = Some(opener);
        self.state = RoomState::Playing;
        self.last_winner = None;
        self.ready_to_rematch.clear();
        opener
    }
}

/// 房间注册表
///
/// 进程启动时构造并注入，不使用模块级单例，便于测试中隔离实例。
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// 生成不与现存房间冲突的房间码
    fn generate_code(&self) -> RoomCode {
        let mut rng = rand::thread_rng();
        loop {
            let code: String = (0..ROOM_CODE_LEN)
                .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    /// 创建房间
    pub fn create(&mut self, creator: PlayerId) -> RoomCode {
        let code = self.generate_code();
        let room = Room::new(code.clone(), creator);
        self.rooms.insert(code.clone(), room);
        code
    }

    /// 获取房间
    pub fn get(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    /// 获取房间（可变）
    pub fn get_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    /// 移除房间
    pub fn remove(&mut self, code: &str) -> Option<Room> {
        self.rooms.remove(code)
    }

    /// 查找玩家所在的全部房间（断线清理用）
    pub fn rooms_of(&self, player_id: PlayerId) -> Vec<RoomCode> {
        self.rooms
            .values()
            .filter(|r| r.has_player(player_id))
            .map(|r| r.code.clone())
            .collect()
    }

    /// 获取房间数量
    pub fn count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::BOARD_SIZE;

    fn pos(row: u8, col: u8) -> Position {
        Position::new_unchecked(row, col)
    }

    #[test]
    fn test_create_room() {
        let mut registry = RoomRegistry::new();

        let code1 = registry.create(100);
        let code2 = registry.create(200);

        assert_ne!(code1, code2);
        assert_eq!(code1.len(), ROOM_CODE_LEN);
        assert!(code1.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(registry.count(), 2);

        let room = registry.get(&code1).unwrap();
        assert_eq!(room.state, RoomState::Waiting);
        assert_eq!(room.mark_of(100), Some(Mark::A));
    }

    #[test]
    fn test_join_assigns_mark_b() {
        let mut room = Room::new("AAAAAA".to_string(), 100);

        assert_eq!(room.join(200), Some(Mark::B));
        assert_eq!(room.state, RoomState::Playing);
        // 首局由 A 先行
        assert_eq!(room.current_turn, Some(100));

        // 第三人无法加入
        assert_eq!(room.join(300), None);
        // 同一连接不能占据两个位置
        let mut room2 = Room::new("BBBBBB".to_string(), 100);
        assert_eq!(room2.join(100), None);
    }

    #[test]
    fn test_move_rejected_before_game_starts() {
        let mut room = Room::new("AAAAAA".to_string(), 100);

        let result = room.try_move(100, pos(6, 6));
        assert_eq!(result, Err(GameError::NotPlaying));
        assert_eq!(room.board.occupied_count(), 0);
    }

    #[test]
    fn test_move_rejected_out_of_turn() {
        let mut room = Room::new("AAAAAA".to_string(), 100);
        room.join(200);

        let result = room.try_move(200, pos(6, 6));
        assert_eq!(result, Err(GameError::NotYourTurn));
        assert_eq!(room.board.occupied_count(), 0);
        assert_eq!(room.current_turn, Some(100));
    }

    #[test]
    fn test_move_rejected_on_occupied_cell() {
        let mut room = Room::new("AAAAAA".to_string(), 100);
        room.join(200);

        room.try_move(100, pos(6, 6)).unwrap();
        let result = room.try_move(200, pos(6, 6));

        assert_eq!(result, Err(GameError::CellOccupied { row: 6, col: 6 }));
        assert_eq!(room.board.get(pos(6, 6)), Some(Mark::A));
        // 被拒绝的落子不消耗回合
        assert_eq!(room.current_turn, Some(200));
    }

    #[test]
    fn test_turn_alternates_strictly() {
        let mut room = Room::new("AAAAAA".to_string(), 100);
        room.join(200);

        let verdict = room.try_move(100, pos(0, 0)).unwrap();
        assert_eq!(verdict, MoveVerdict::Placed { next_turn: 200 });

        let verdict = room.try_move(200, pos(1, 0)).unwrap();
        assert_eq!(verdict, MoveVerdict::Placed { next_turn: 100 });
    }

    #[test]
    fn test_five_in_a_row_wins() {
        let mut room = Room::new("AAAAAA".to_string(), 100);
        room.join(200);

        // P1 下第 6 行，P2 在远处应子，互不阻挡
        for i in 0..4u8 {
            room.try_move(100, pos(6, 6 + i)).unwrap();
            room.try_move(200, pos(12, i)).unwrap();
        }
        let verdict = room.try_move(100, pos(6, 10)).unwrap();

        match verdict {
            MoveVerdict::Win { line } => {
                assert_eq!(line, (6..=10).map(|c| pos(6, c)).collect::<Vec<_>>());
            }
            other => panic!("expected win, got {:?}", other),
        }
        assert_eq!(room.state, RoomState::Finished);
        assert_eq!(room.last_winner, Some(100));
        assert_eq!(room.player_by_mark(Mark::A).unwrap().score, 1);
        assert_eq!(room.player_by_mark(Mark::B).unwrap().score, 0);

        // 终局后棋盘不再接受落子
        let result = room.try_move(200, pos(0, 0));
        assert_eq!(result, Err(GameError::NotPlaying));
    }

    /// 生成一个无任何五连的满盘染色：(2*row + col) mod 4 决定颜色，
    /// 任意方向最长同色连续为 2。A 恰好 85 格，B 84 格，与先后手吻合。
    fn draw_pattern() -> (Vec<Position>, Vec<Position>) {
        let mut a_cells = Vec::new();
        let mut b_cells = Vec::new();
        for row in 0..BOARD_SIZE as u8 {
            for col in 0..BOARD_SIZE as u8 {
                if (2 * row as usize + col as usize) % 4 < 2 {
                    a_cells.push(pos(row, col));
                } else {
                    b_cells.push(pos(row, col));
                }
            }
        }
        (a_cells, b_cells)
    }

    #[test]
    fn test_full_board_without_run_is_draw() {
        let mut room = Room::new("AAAAAA".to_string(), 100);
        room.join(200);

        let (a_cells, b_cells) = draw_pattern();
        assert_eq!(a_cells.len(), 85);
        assert_eq!(b_cells.len(), 84);

        for i in 0..b_cells.len() {
            assert_eq!(
                room.try_move(100, a_cells[i]).unwrap(),
                MoveVerdict::Placed { next_turn: 200 }
            );
            assert_eq!(
                room.try_move(200, b_cells[i]).unwrap(),
                MoveVerdict::Placed { next_turn: 100 }
            );
        }
        // 最后一子落下，棋盘满且无连珠
        let verdict = room.try_move(100, a_cells[84]).unwrap();
        assert_eq!(verdict, MoveVerdict::Draw);
        assert_eq!(room.state, RoomState::Finished);
        assert_eq!(room.last_winner, None);
    }

    fn finish_game(room: &mut Room, winner: PlayerId, loser: PlayerId) {
        if room.current_turn == Some(loser) {
            room.try_move(loser, pos(12, 12)).unwrap();
        }
        for i in 0..4u8 {
            room.try_move(winner, pos(6, i)).unwrap();
            room.try_move(loser, pos(10, i)).unwrap();
        }
        let verdict = room.try_move(winner, pos(6, 4)).unwrap();
        assert!(matches!(verdict, MoveVerdict::Win { .. }));
    }

    #[test]
    fn test_rematch_signals_coalesce() {
        let mut room = Room::new("AAAAAA".to_string(), 100);
        room.join(200);
        finish_game(&mut room, 100, 200);

        let (ready, all_ready) = room.signal_ready(200).unwrap();
        assert_eq!(ready, vec![200]);
        assert!(!all_ready);

        // 重复信号不累计，效果与一次相同
        let (ready, all_ready) = room.signal_ready(200).unwrap();
        assert_eq!(ready, vec![200]);
        assert!(!all_ready);

        let (ready, all_ready) = room.signal_ready(100).unwrap();
        assert_eq!(ready.len(), 2);
        assert!(all_ready);
    }

    #[test]
    fn test_ready_ignored_outside_finished() {
        let mut room = Room::new("AAAAAA".to_string(), 100);
        room.join(200);

        assert!(room.signal_ready(100).is_none());
        assert!(room.signal_ready(999).is_none());
    }

    #[test]
    fn test_rematch_reset_winner_opens() {
        let mut room = Room::new("AAAAAA".to_string(), 100);
        room.join(200);
        finish_game(&mut room, 100, 200);

        room.signal_ready(100);
        room.signal_ready(200);
        let opener = room.reset_for_rematch();

        assert_eq!(opener, 100);
        assert_eq!(room.current_turn, Some(100));
        assert_eq!(room.state, RoomState::Playing);
        assert_eq!(room.board.occupied_count(), 0);
        assert_eq!(room.last_winner, None);
        assert!(room.ready_to_rematch.is_empty());
        // 比分跨局保留
        assert_eq!(room.player_by_mark(Mark::A).unwrap().score, 1);
    }

    #[test]
    fn test_rematch_reset_defaults_to_mark_a() {
        let mut room = Room::new("AAAAAA".to_string(), 100);
        room.join(200);
        finish_game(&mut room, 200, 100);

        // 无获胜者记录时（和局后）由 A 先行
        room.last_winner = None;
        let opener = room.reset_for_rematch();
        assert_eq!(opener, 100);
    }

    #[test]
    fn test_rooms_of_and_remove() {
        let mut registry = RoomRegistry::new();
        let code = registry.create(100);
        registry.get_mut(&code).unwrap().join(200);

        assert_eq!(registry.rooms_of(100), vec![code.clone()]);
        assert_eq!(registry.rooms_of(200), vec![code.clone()]);
        assert!(registry.rooms_of(999).is_empty());

        registry.remove(&code);
        assert!(registry.get(&code).is_none());
        assert!(registry.rooms_of(100).is_empty());
    }
}
