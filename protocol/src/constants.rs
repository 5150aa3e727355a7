//! 协议常量定义

use std::time::Duration;

/// 协议版本号
pub const PROTOCOL_VERSION: u8 = 1;

/// 棋盘边长（13x13）
pub const BOARD_SIZE: usize = 13;

/// 连珠获胜所需的最少连续棋子数
pub const WIN_LENGTH: usize = 5;

/// 房间码长度（可口头分享的短码）
pub const ROOM_CODE_LEN: usize = 6;

/// 消息帧最大大小
pub const MAX_FRAME_SIZE: usize = 65536;

/// 客户端心跳间隔（秒）
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 连接空闲超时（秒）- 超过此时间无任何消息则强制断开
pub const IDLE_TIMEOUT_SECS: u64 = 300;

/// 空闲检查周期（秒）
pub const IDLE_SWEEP_INTERVAL_SECS: u64 = 60;

/// 心跳间隔 Duration
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(HEARTBEAT_INTERVAL_SECS);

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);

/// 空闲超时 Duration
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(IDLE_TIMEOUT_SECS);

/// 空闲检查周期 Duration
pub const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(IDLE_SWEEP_INTERVAL_SECS);
