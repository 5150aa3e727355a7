//! 事件日志
//!
//! 面向分析统计的只追加日志（JSONL 格式）。写入是 fire-and-forget：
//! 任何存储错误只在本地记录，绝不影响对局状态，也不会阻塞消息处理。

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use protocol::{Mark, PlayerId, RoomCode};

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    Connection,
    Disconnect,
    RoomCreated,
    RoomLeft,
    GameStarted,
    GameWon,
    GameReset,
}

/// 单条事件记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub player_id: PlayerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_code: Option<RoomCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark: Option<Mark>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl EventRecord {
    pub fn new(event_type: EventType, player_id: PlayerId) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            player_id,
            room_code: None,
            mark: None,
            details: serde_json::Value::Null,
            ip: None,
            user_agent: None,
        }
    }

    pub fn with_room(mut self, room_code: impl Into<RoomCode>) -> Self {
        self.room_code = Some(room_code.into());
        self
    }

    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.mark = Some(mark);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip = ip;
        self
    }
}

/// 聚合统计（统计查询协作方契约）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    /// 出现过的房间数（去重）
    pub total_rooms: usize,
    /// 不同客户端 IP 数（去重）
    pub total_players: usize,
    /// 分出胜负的对局数
    pub completed_games: usize,
}

/// 事件存储（只追加 JSONL 文件）
pub struct EventStore {
    path: PathBuf,
}

impl EventStore {
    /// 打开存储，确保父目录存在
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("无法创建事件日志目录: {:?}", parent))?;
            }
        }
        Ok(Self { path })
    }

    /// 跨平台默认存储路径
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().context("无法获取应用数据目录")?;
        Ok(data_dir.join("gomoku-server").join("events.jsonl"))
    }

    /// 追加一条记录
    pub fn append(&self, record: &EventRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("序列化事件记录失败")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("打开事件日志失败: {:?}", self.path))?;
        writeln!(file, "{}", line)
            .with_context(|| format!("写入事件日志失败: {:?}", self.path))?;
        Ok(())
    }

    /// 计算聚合统计
    ///
    /// 房间数按 room-created/game-started/game-won 中出现的房间码去重，
    /// 玩家数按客户端 IP 去重，完成对局数为 game-won 记录条数。
    pub fn game_stats(&self) -> Result<GameStats> {
        let mut rooms = std::collections::HashSet::new();
        let mut players = std::collections::HashSet::new();
        let mut completed_games = 0usize;

        if !self.path.exists() {
            return Ok(GameStats {
                total_rooms: 0,
                total_players: 0,
                completed_games: 0,
            });
        }

        let file = fs::File::open(&self.path)
            .with_context(|| format!("打开事件日志失败: {:?}", self.path))?;
        for line in BufReader::new(file).lines() {
            let line = line.context("读取事件日志失败")?;
            // 跳过损坏的行，统计尽力而为
            let record: EventRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(_) => continue,
            };

            if matches!(
                record.event_type,
                EventType::RoomCreated | EventType::GameStarted | EventType::GameWon
            ) {
                if let Some(code) = &record.room_code {
                    rooms.insert(code.clone());
                }
                if let Some(ip) = &record.ip {
                    players.insert(ip.clone());
                }
            }
            if record.event_type == EventType::GameWon {
                completed_games += 1;
            }
        }

        Ok(GameStats {
            total_rooms: rooms.len(),
            total_players: players.len(),
            completed_games,
        })
    }

    /// 日志文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 事件日志前端
///
/// 消息处理任务通过无界通道投递记录，后台任务负责落盘。
/// `log` 永不阻塞、永不失败——通道关闭时记录被静默丢弃。
#[derive(Clone)]
pub struct EventLog {
    tx: Option<mpsc::UnboundedSender<EventRecord>>,
}

impl EventLog {
    /// 启动后台落盘任务
    pub fn spawn(store: EventStore) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<EventRecord>();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = store.append(&record) {
                    tracing::warn!(error = %e, "事件记录写入失败，已丢弃");
                }
            }
        });
        Self { tx: Some(tx) }
    }

    /// 不落盘的空实现（测试用）
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// 投递一条记录
    pub fn log(&self, record: EventRecord) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (EventStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = EventStore::open(temp_dir.path().join("events.jsonl")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_append_and_read_back() {
        let (store, _temp_dir) = create_test_store();

        let record = EventRecord::new(EventType::RoomCreated, 7)
            .with_room("AB12CD")
            .with_mark(Mark::A)
            .with_ip(Some("10.0.0.1".to_string()));
        store.append(&record).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        let parsed: EventRecord = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed.event_type, EventType::RoomCreated);
        assert_eq!(parsed.room_code.as_deref(), Some("AB12CD"));
        assert_eq!(parsed.mark, Some(Mark::A));
        // 事件类型按原始短横线命名序列化
        assert!(content.contains("\"room-created\""));
    }

    #[test]
    fn test_game_stats_aggregation() {
        let (store, _temp_dir) = create_test_store();

        // 两个房间、三个不同 IP、两局分出胜负
        store
            .append(
                &EventRecord::new(EventType::RoomCreated, 1)
                    .with_room("ROOM01")
                    .with_ip(Some("10.0.0.1".to_string())),
            )
            .unwrap();
        store
            .append(
                &EventRecord::new(EventType::GameStarted, 2)
                    .with_room("ROOM01")
                    .with_ip(Some("10.0.0.2".to_string())),
            )
            .unwrap();
        store
            .append(
                &EventRecord::new(EventType::GameWon, 1)
                    .with_room("ROOM01")
                    .with_ip(Some("10.0.0.1".to_string()))
                    .with_details(serde_json::json!({ "score": 1 })),
            )
            .unwrap();
        store
            .append(
                &EventRecord::new(EventType::GameWon, 1)
                    .with_room("ROOM01")
                    .with_ip(Some("10.0.0.1".to_string()))
                    .with_details(serde_json::json!({ "score": 2 })),
            )
            .unwrap();
        store
            .append(
                &EventRecord::new(EventType::RoomCreated, 3)
                    .with_room("ROOM02")
                    .with_ip(Some("10.0.0.3".to_string())),
            )
            .unwrap();
        // 连接/断开事件不参与房间与玩家统计
        store
            .append(
                &EventRecord::new(EventType::Connection, 4)
                    .with_ip(Some("10.0.0.4".to_string())),
            )
            .unwrap();

        let stats = store.game_stats().unwrap();
        assert_eq!(stats.total_rooms, 2);
        assert_eq!(stats.total_players, 3);
        assert_eq!(stats.completed_games, 2);
    }

    #[test]
    fn test_stats_on_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = EventStore::open(temp_dir.path().join("never-written.jsonl")).unwrap();

        let stats = store.game_stats().unwrap();
        assert_eq!(stats.total_rooms, 0);
        assert_eq!(stats.total_players, 0);
        assert_eq!(stats.completed_games, 0);
    }

    #[test]
    fn test_stats_skips_corrupt_lines() {
        let (store, _temp_dir) = create_test_store();
        store
            .append(
                &EventRecord::new(EventType::GameWon, 1)
                    .with_room("ROOM01")
                    .with_ip(Some("10.0.0.1".to_string())),
            )
            .unwrap();

        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        writeln!(file, "not json at all").unwrap();

        let stats = store.game_stats().unwrap();
        assert_eq!(stats.completed_games, 1);
    }

    #[tokio::test]
    async fn test_event_log_fire_and_forget() {
        let (store, _temp_dir) = create_test_store();
        let path = store.path().to_path_buf();
        let log = EventLog::spawn(store);

        log.log(EventRecord::new(EventType::Connection, 1));
        // disabled 前端直接丢弃
        EventLog::disabled().log(EventRecord::new(EventType::Connection, 2));

        // 等待后台任务落盘
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if path.exists() {
                break;
            }
        }
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
