//! 服务器主逻辑
//!
//! 所有房间/棋盘变更都发生在单个事件的处理过程中，处理器之间没有
//! 交错执行，因此无需加锁。两名玩家几乎同时落子时，以先出队者为准，
//! 后者被回合检查拒绝。

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;

use protocol::{
    ClientMessage, ErrorCode, Mark, PlayerId, Position, RoomCode, ServerMessage, BOARD_SIZE,
};

use crate::events::{EventLog, EventRecord, EventType};
use crate::room::{MoveVerdict, RoomRegistry};
use crate::session::SessionManager;

/// 服务器状态
pub struct ServerState {
    pub sessions: SessionManager,
    pub rooms: RoomRegistry,
    /// 玩家 ID -> 消息发送通道
    pub connections: HashMap<PlayerId, mpsc::Sender<ServerMessage>>,
    /// 事件日志（fire-and-forget）
    pub events: EventLog,
}

impl ServerState {
    pub fn new(events: EventLog) -> Self {
        Self {
            sessions: SessionManager::new(),
            rooms: RoomRegistry::new(),
            connections: HashMap::new(),
            events,
        }
    }

    /// 发送消息给玩家
    pub async fn send_to_player(&self, player_id: PlayerId, msg: ServerMessage) {
        if let Some(tx) = self.connections.get(&player_id) {
            let _ = tx.send(msg).await;
        }
    }

    /// 广播消息给房间内所有玩家
    pub async fn broadcast_to_room(&self, room_code: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_code) {
            for player in &room.players {
                self.send_to_player(player.id, msg.clone()).await;
            }
        }
    }

    /// 玩家的客户端 IP（用于事件日志）
    fn client_ip(&self, player_id: PlayerId) -> Option<String> {
        self.sessions.get(player_id).and_then(|s| s.ip())
    }
}

/// 待发送的消息
///
/// 处理器先在此缓冲，状态变更完成后统一发送，
/// 避免在持有 &mut 状态时穿插 await。
struct PendingMessages {
    messages: Vec<(PlayerId, ServerMessage)>,
    broadcasts: Vec<(RoomCode, ServerMessage)>,
}

impl PendingMessages {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            broadcasts: Vec::new(),
        }
    }

    fn send(&mut self, player_id: PlayerId, msg: ServerMessage) {
        self.messages.push((player_id, msg));
    }

    fn broadcast(&mut self, room_code: &str, msg: ServerMessage) {
        self.broadcasts.push((room_code.to_string(), msg));
    }

    async fn flush(self, state: &ServerState) {
        for (player_id, msg) in self.messages {
            state.send_to_player(player_id, msg).await;
        }
        for (room_code, msg) in self.broadcasts {
            state.broadcast_to_room(&room_code, msg).await;
        }
    }
}

/// 消息处理器
pub struct MessageHandler;

impl MessageHandler {
    /// 处理客户端消息，返回值为发给请求方的直接应答
    pub async fn handle(
        state: &mut ServerState,
        player_id: PlayerId,
        msg: ClientMessage,
    ) -> Option<ServerMessage> {
        let mut pending = PendingMessages::new();

        let result = match msg {
            ClientMessage::CreateRoom => Self::handle_create_room(state, player_id),
            ClientMessage::JoinRoom { room_code } => {
                Self::handle_join_room(state, &mut pending, player_id, &room_code)
            }
            ClientMessage::MakeMove { room_code, row, col } => {
                Self::handle_make_move(state, &mut pending, player_id, &room_code, row, col)
            }
            ClientMessage::ReadyForRematch { room_code } => {
                Self::handle_ready_for_rematch(state, &mut pending, player_id, &room_code)
            }
            ClientMessage::LeaveRoom { room_code } => {
                Self::handle_leave_room(state, &mut pending, player_id, &room_code)
            }
            ClientMessage::Heartbeat { room_code } => {
                Self::handle_heartbeat(player_id, &room_code)
            }
        };

        pending.flush(state).await;

        result
    }

    /// 处理创建房间（请求方固定为先手 A）
    fn handle_create_room(state: &mut ServerState, player_id: PlayerId) -> Option<ServerMessage> {
        let room_code = state.rooms.create(player_id);
        tracing::info!(player_id, %room_code, "房间已创建");

        state.events.log(
            EventRecord::new(EventType::RoomCreated, player_id)
                .with_room(room_code.clone())
                .with_mark(Mark::A)
                .with_ip(state.client_ip(player_id)),
        );

        Some(ServerMessage::RoomCreated {
            room_code,
            mark: Mark::A,
        })
    }

    /// 处理加入房间
    fn handle_join_room(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        room_code: &str,
    ) -> Option<ServerMessage> {
        let room = match state.rooms.get(room_code) {
            Some(r) => r,
            None => {
                return Some(ServerMessage::Error {
                    code: ErrorCode::RoomNotFound,
                    message: "房间不存在".to_string(),
                });
            }
        };

        if room.is_full() {
            return Some(ServerMessage::Error {
                code: ErrorCode::RoomFull,
                message: "房间已满".to_string(),
            });
        }

        // 房主必须在场且加入者不能是房主自己
        let creator_id = match room.player_by_mark(Mark::A) {
            Some(p) if p.id != player_id => p.id,
            _ => {
                return Some(ServerMessage::Error {
                    code: ErrorCode::InvalidRoomState,
                    message: "房间状态异常".to_string(),
                });
            }
        };

        let room = match state.rooms.get_mut(room_code) {
            Some(r) => r,
            None => {
                return Some(ServerMessage::Error {
                    code: ErrorCode::InternalError,
                    message: "内部错误".to_string(),
                });
            }
        };
        let mark = match room.join(player_id) {
            Some(mark) => mark,
            None => {
                return Some(ServerMessage::Error {
                    code: ErrorCode::InvalidRoomState,
                    message: "房间状态异常".to_string(),
                });
            }
        };

        let board = room.board.clone();
        let players = room.player_infos();
        let state_snapshot = room.state;
        tracing::info!(player_id, room_code, "玩家加入，对局开始");

        state.events.log(
            EventRecord::new(EventType::GameStarted, player_id)
                .with_room(room_code.to_string())
                .with_mark(mark)
                .with_ip(state.client_ip(player_id)),
        );

        // 通知房主有对手加入
        pending.send(
            creator_id,
            ServerMessage::OpponentJoined {
                opponent_id: player_id,
                players: players.clone(),
                state: state_snapshot,
                current_turn: creator_id,
            },
        );

        Some(ServerMessage::RoomJoined {
            room_code: room_code.to_string(),
            mark,
            board,
            players,
            current_turn: creator_id,
            state: state_snapshot,
        })
    }

    /// 处理落子
    ///
    /// 任何违反前置条件的落子（房间不存在、未轮到、格子占用、越界）
    /// 都被静默丢弃：不回发错误，不广播，状态不变。
    fn handle_make_move(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        room_code: &str,
        row: u8,
        col: u8,
    ) -> Option<ServerMessage> {
        // 边界校验在触碰棋盘之前完成
        if row as usize >= BOARD_SIZE || col as usize >= BOARD_SIZE {
            tracing::debug!(player_id, room_code, row, col, "落子坐标越界，忽略");
            return None;
        }
        let pos = Position::new_unchecked(row, col);

        let room = match state.rooms.get_mut(room_code) {
            Some(r) => r,
            None => {
                tracing::debug!(player_id, room_code, "房间不存在，忽略落子");
                return None;
            }
        };

        let verdict = match room.try_move(player_id, pos) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(player_id, room_code, error = %e, "落子被拒绝");
                return None;
            }
        };

        match verdict {
            MoveVerdict::Placed { next_turn } => {
                pending.broadcast(
                    room_code,
                    ServerMessage::MoveMade {
                        board: room.board.clone(),
                        current_turn: next_turn,
                        state: room.state,
                        last_move: pos,
                    },
                );
            }
            MoveVerdict::Win { line } => {
                let players = room.player_infos();
                let score = room.players[0].score;
                let mark = room.mark_of(player_id);
                tracing::info!(player_id, room_code, "对局结束，产生获胜方");

                let mut record = EventRecord::new(EventType::GameWon, player_id)
                    .with_room(room_code.to_string())
                    .with_details(json!({ "score": score }))
                    .with_ip(state.client_ip(player_id));
                if let Some(mark) = mark {
                    record = record.with_mark(mark);
                }
                state.events.log(record);

                pending.broadcast(
                    room_code,
                    ServerMessage::GameOver {
                        winner: player_id,
                        win_line: line,
                        players,
                        last_move: pos,
                    },
                );
            }
            MoveVerdict::Draw => {
                tracing::info!(player_id, room_code, "棋盘下满，和局");
                pending.broadcast(room_code, ServerMessage::GameDraw);
            }
        }

        None
    }

    /// 处理再战信号
    fn handle_ready_for_rematch(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        room_code: &str,
    ) -> Option<ServerMessage> {
        let room = match state.rooms.get_mut(room_code) {
            Some(r) => r,
            None => return None,
        };

        let mark = match room.mark_of(player_id) {
            Some(m) => m,
            None => return None,
        };

        // 仅 Finished 状态接受再战信号，重复信号合并
        let (ready, all_ready) = match room.signal_ready(player_id) {
            Some(result) => result,
            None => {
                tracing::debug!(player_id, room_code, "再战信号被忽略");
                return None;
            }
        };

        pending.broadcast(
            room_code,
            ServerMessage::PlayerReady {
                player_id,
                mark,
                ready,
                all_ready,
            },
        );

        if all_ready {
            let opener = room.reset_for_rematch();
            let board = room.board.clone();
            let state_snapshot = room.state;
            let score = room.players[0].score;
            tracing::info!(room_code, opener, "双方就绪，开始新对局");

            state.events.log(
                EventRecord::new(EventType::GameReset, player_id)
                    .with_room(room_code.to_string())
                    .with_mark(mark)
                    .with_details(json!({ "score": score }))
                    .with_ip(state.client_ip(player_id)),
            );

            pending.broadcast(
                room_code,
                ServerMessage::GameReset {
                    board,
                    current_turn: opener,
                    state: state_snapshot,
                },
            );
        }

        None
    }

    /// 处理主动离开房间
    fn handle_leave_room(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        room_code: &str,
    ) -> Option<ServerMessage> {
        let ip = state.client_ip(player_id);
        Self::depart_room(state, pending, player_id, room_code, ip);
        None
    }

    /// 处理心跳（活跃时间戳已由网关统一刷新）
    fn handle_heartbeat(player_id: PlayerId, room_code: &str) -> Option<ServerMessage> {
        tracing::trace!(player_id, room_code, "心跳");
        Some(ServerMessage::HeartbeatAck {
            server_time_ms: Utc::now().timestamp_millis(),
        })
    }

    /// 玩家离开房间的统一处理（主动离开与断线共用）
    ///
    /// 任何状态下离开都立即销毁房间：通知其余占用者（恰好一次），
    /// 然后把房间从注册表移除。没有暂停或挂起的选项。
    /// 断线路径调用时会话已被移除，客户端 IP 由调用方提供。
    fn depart_room(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        room_code: &str,
        ip: Option<String>,
    ) {
        let room = match state.rooms.get(room_code) {
            Some(r) => r,
            None => return,
        };
        if !room.has_player(player_id) {
            return;
        }

        let mark = room.mark_of(player_id);
        let score = room.players[0].score;

        for player in &room.players {
            if player.id != player_id {
                pending.send(player.id, ServerMessage::OpponentLeft);
            }
        }

        let mut record = EventRecord::new(EventType::RoomLeft, player_id)
            .with_room(room_code.to_string())
            .with_details(json!({ "score": score }))
            .with_ip(ip);
        if let Some(mark) = mark {
            record = record.with_mark(mark);
        }
        state.events.log(record);

        state.rooms.remove(room_code);
        tracing::info!(player_id, room_code, "玩家离开，房间销毁");
    }

    /// 处理连接断开（对端关闭、传输错误或空闲超时强制断开）
    pub async fn handle_disconnect(state: &mut ServerState, player_id: PlayerId) {
        state.connections.remove(&player_id);

        // 会话不存在说明已经清理过（例如清扫与关闭事件竞争），直接返回
        let session = match state.sessions.remove(player_id) {
            Some(s) => s,
            None => return,
        };

        // 会话已移除，离开记录的 IP 取自其快照
        let ip = session.ip();
        state.events.log(
            EventRecord::new(EventType::Disconnect, player_id).with_ip(ip.clone()),
        );

        let mut pending = PendingMessages::new();
        for room_code in state.rooms.rooms_of(player_id) {
            Self::depart_room(state, &mut pending, player_id, &room_code, ip.clone());
        }
        pending.flush(state).await;

        tracing::info!(player_id, "连接已断开");
    }

    /// 空闲连接清扫（由网关定时调用）
    pub async fn sweep_idle(state: &mut ServerState, threshold: Duration) {
        for player_id in state.sessions.idle(threshold) {
            tracing::info!(player_id, "连接空闲超时，强制断开");
            Self::handle_disconnect(state, player_id).await;
        }
    }
}
