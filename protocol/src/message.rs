//! 消息类型定义

use serde::{Deserialize, Serialize};

use crate::board::{Board, Mark, Position};

/// 玩家 ID（由网关为每个连接分配）
pub type PlayerId = u64;

/// 房间码（6 位大写字母数字短码）
pub type RoomCode = String;

/// 房间状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    /// 等待第二名玩家加入
    Waiting,
    /// 对局进行中
    Playing,
    /// 对局结束，等待再战握手
    Finished,
}

/// 房间内玩家信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub mark: Mark,
    /// 在本房间累计获胜局数
    pub score: u32,
}

/// 客户端发送给服务端的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    // === 房间操作 ===
    /// 创建房间（请求方为先手 A）
    CreateRoom,
    /// 加入房间（加入方为后手 B）
    JoinRoom { room_code: RoomCode },
    /// 离开房间
    LeaveRoom { room_code: RoomCode },

    // === 对局操作 ===
    /// 落子
    MakeMove { room_code: RoomCode, row: u8, col: u8 },
    /// 对局结束后表示愿意再战
    ReadyForRematch { room_code: RoomCode },

    // === 心跳 ===
    /// 保活心跳
    Heartbeat { room_code: RoomCode },
}

/// 服务端发送给客户端的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    // === 房间事件（仅发给请求方） ===
    /// 房间创建成功
    RoomCreated { room_code: RoomCode, mark: Mark },
    /// 加入房间成功，附带完整对局状态
    RoomJoined {
        room_code: RoomCode,
        mark: Mark,
        board: Board,
        players: Vec<PlayerInfo>,
        current_turn: PlayerId,
        state: RoomState,
    },

    // === 对局事件（房间内广播） ===
    /// 对手已加入（发给房主）
    OpponentJoined {
        opponent_id: PlayerId,
        players: Vec<PlayerInfo>,
        state: RoomState,
        current_turn: PlayerId,
    },
    /// 落子完成
    MoveMade {
        board: Board,
        current_turn: PlayerId,
        state: RoomState,
        last_move: Position,
    },
    /// 对局结束，有获胜方
    GameOver {
        winner: PlayerId,
        win_line: Vec<Position>,
        players: Vec<PlayerInfo>,
        last_move: Position,
    },
    /// 对局结束，棋盘下满无胜负
    GameDraw,

    // === 再战握手 ===
    /// 有玩家表示愿意再战
    PlayerReady {
        player_id: PlayerId,
        mark: Mark,
        ready: Vec<PlayerId>,
        all_ready: bool,
    },
    /// 双方就绪，棋盘已重置，新对局开始
    GameReset {
        board: Board,
        current_turn: PlayerId,
        state: RoomState,
    },

    // === 离开 ===
    /// 对手已离开，房间销毁
    OpponentLeft,

    // === 心跳 ===
    /// 心跳响应，附带服务端时间戳（毫秒）
    HeartbeatAck { server_time_ms: i64 },

    // === 错误 ===
    /// 错误消息（仅请求/响应类事件）
    Error { code: ErrorCode, message: String },
}

/// 错误码定义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    // === 房间相关 (1xx) ===
    /// 房间不存在
    RoomNotFound = 100,
    /// 房间已满
    RoomFull = 101,
    /// 房间状态异常
    InvalidRoomState = 102,

    // === 系统相关 (5xx) ===
    /// 内部错误
    InternalError = 500,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
