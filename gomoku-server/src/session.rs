//! 会话管理
//!
//! 为每个传输层连接维护服务端身份与活跃时间戳。时间戳基于单调时钟
//! (Instant)，空闲判定不受系统时钟调整影响。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use protocol::PlayerId;

/// 连接会话
#[derive(Debug, Clone)]
pub struct Session {
    pub id: PlayerId,
    /// 远端地址（用于事件日志）
    pub addr: Option<String>,
    pub connected_at: Instant,
    /// 最近一次收到任何入站消息的时间
    last_seen: Instant,
}

impl Session {
    /// 客户端 IP（剥离端口，用于事件日志的去重统计）
    pub fn ip(&self) -> Option<String> {
        self.addr.as_ref().map(|addr| {
            addr.rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| addr.clone())
        })
    }
}

/// 会话管理器
pub struct SessionManager {
    sessions: HashMap<PlayerId, Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// 登记新连接（ID 由网关在 accept 时分配）
    pub fn insert(&mut self, player_id: PlayerId, addr: Option<String>) {
        let now = Instant::now();
        self.sessions.insert(
            player_id,
            Session {
                id: player_id,
                addr,
                connected_at: now,
                last_seen: now,
            },
        );
    }

    /// 刷新活跃时间戳（任何入站消息都会调用，包括心跳）
    pub fn touch(&mut self, player_id: PlayerId) {
        if let Some(session) = self.sessions.get_mut(&player_id) {
            session.last_seen = Instant::now();
        }
    }

    /// 找出空闲时间达到阈值的连接
    pub fn idle(&self, threshold: Duration) -> Vec<PlayerId> {
        self.sessions
            .values()
            .filter(|s| s.last_seen.elapsed() >= threshold)
            .map(|s| s.id)
            .collect()
    }

    /// 移除会话
    pub fn remove(&mut self, player_id: PlayerId) -> Option<Session> {
        self.sessions.remove(&player_id)
    }

    /// 获取会话
    pub fn get(&self, player_id: PlayerId) -> Option<&Session> {
        self.sessions.get(&player_id)
    }

    /// 当前连接数
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
