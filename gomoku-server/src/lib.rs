//! 五子棋服务端
//!
//! 包含:
//! - 房间系统
//! - 对局控制
//! - 会话管理
//! - 连接网关
//! - 事件日志

pub mod events;
pub mod gateway;
pub mod room;
pub mod server;
pub mod session;

pub use events::{EventLog, EventRecord, EventStore, EventType, GameStats};
pub use gateway::Gateway;
pub use room::{GamePlayer, MoveVerdict, Room, RoomRegistry};
pub use server::{MessageHandler, ServerState};
pub use session::{Session, SessionManager};
