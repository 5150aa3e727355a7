//! 五子棋共享协议库
//!
//! 包含:
//! - 棋盘、标记、坐标等核心数据结构
//! - 连珠判定规则
//! - 消息类型定义 (ClientMessage, ServerMessage)
//! - 传输层抽象 (Connector, Connection, Listener traits)
//! - 帧编解码 (FrameReader, FrameWriter)

mod board;
mod constants;
mod error;
mod message;
mod rules;
mod transport;

pub use board::{Board, Mark, Position};
pub use constants::*;
pub use error::{GameError, ProtocolError, Result};
pub use message::{
    ClientMessage, ErrorCode, PlayerId, PlayerInfo, RoomCode, RoomState, ServerMessage,
};
pub use rules::WinDetector;
pub use transport::{
    Connection, Connector, FrameReader, FrameWriter, Listener, NetworkConfig, TcpConnection,
    TcpConnector, TcpListener,
};
