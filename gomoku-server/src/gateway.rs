//! 连接网关
//!
//! 每条连接拆成读写两个任务，任一侧结束即拆除另一侧；所有入站消息
//! 汇入单个派发任务，由它独占服务器状态，逐条处理。空闲清扫由派发
//! 任务内的定时器驱动，与消息处理天然串行。

use tokio::sync::mpsc;
use tokio::time::interval;

use protocol::{
    ClientMessage, PlayerId, ProtocolError, ServerMessage, TcpConnection, TcpListener,
    IDLE_SWEEP_INTERVAL, IDLE_TIMEOUT,
};
use protocol::{Connection, Listener};

use crate::events::{EventLog, EventRecord, EventType};
use crate::server::{MessageHandler, ServerState};

/// 出站消息通道容量（单条连接）
const OUTBOUND_CHANNEL_SIZE: usize = 64;

/// 连接任务投递给派发任务的事件
enum GatewayEvent {
    /// 新连接已建立
    Connected {
        player_id: PlayerId,
        addr: Option<String>,
        tx: mpsc::Sender<ServerMessage>,
    },
    /// 收到一条客户端消息
    Message {
        player_id: PlayerId,
        msg: ClientMessage,
    },
    /// 连接已关闭（对端断开、传输错误或出站通道被移除）
    Closed { player_id: PlayerId },
}

/// 网关
pub struct Gateway {
    listener: TcpListener,
}

impl Gateway {
    /// 绑定监听地址
    pub async fn bind(addr: &str) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// 实际监听地址（绑定端口 0 时由系统分配）
    pub fn local_addr(&self) -> Option<String> {
        self.listener.local_addr()
    }

    /// 接受连接并持续服务
    pub async fn run(mut self, events: EventLog) -> anyhow::Result<()> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = ServerState::new(events);
        tokio::spawn(dispatch_loop(state, event_rx));

        // 连接 ID 在进程生命周期内单调递增，不复用
        let mut next_player_id: PlayerId = 1;
        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let player_id = next_player_id;
                    next_player_id += 1;
                    tracing::info!(player_id, addr = ?conn.peer_addr(), "接受新连接");
                    tokio::spawn(handle_connection(conn, player_id, event_tx.clone()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "接受连接失败");
                }
            }
        }
    }
}

/// 派发循环：独占服务器状态，串行处理事件与空闲清扫
async fn dispatch_loop(
    mut state: ServerState,
    mut event_rx: mpsc::UnboundedReceiver<GatewayEvent>,
) {
    let mut sweep = interval(IDLE_SWEEP_INTERVAL);

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(GatewayEvent::Connected { player_id, addr, tx }) => {
                        state.sessions.insert(player_id, addr);
                        state.connections.insert(player_id, tx);
                        state.events.log(
                            EventRecord::new(EventType::Connection, player_id)
                                .with_ip(state.sessions.get(player_id).and_then(|s| s.ip())),
                        );
                    }
                    Some(GatewayEvent::Message { player_id, msg }) => {
                        state.sessions.touch(player_id);
                        if let Some(reply) =
                            MessageHandler::handle(&mut state, player_id, msg).await
                        {
                            state.send_to_player(player_id, reply).await;
                        }
                    }
                    Some(GatewayEvent::Closed { player_id }) => {
                        MessageHandler::handle_disconnect(&mut state, player_id).await;
                    }
                    None => break,
                }
            }
            _ = sweep.tick() => {
                MessageHandler::sweep_idle(&mut state, IDLE_TIMEOUT).await;
            }
        }
    }
}

/// 单条连接的读写任务对
///
/// 写任务在出站通道关闭时结束（派发任务移除 sender 即可强制断开），
/// 读任务在对端关闭或传输错误时结束；任一侧结束都会中止另一侧，
/// 最终恰好投递一次 Closed 事件。
async fn handle_connection(
    conn: TcpConnection,
    player_id: PlayerId,
    event_tx: mpsc::UnboundedSender<GatewayEvent>,
) {
    let addr = conn.peer_addr();
    let (mut reader, mut writer) = conn.split();
    let (tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CHANNEL_SIZE);

    if event_tx
        .send(GatewayEvent::Connected { player_id, addr, tx })
        .is_err()
    {
        return;
    }

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = writer.write_frame(&msg).await {
                tracing::debug!(player_id, error = %e, "出站写入失败");
                break;
            }
        }
    });

    let reader_tx = event_tx.clone();
    let mut read_task = tokio::spawn(async move {
        loop {
            match reader.read_frame::<ClientMessage>().await {
                Ok(msg) => {
                    if reader_tx
                        .send(GatewayEvent::Message { player_id, msg })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(ProtocolError::ConnectionClosed) => break,
                Err(e) => {
                    tracing::debug!(player_id, error = %e, "入站读取失败");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut write_task => read_task.abort(),
        _ = &mut read_task => write_task.abort(),
    }

    let _ = event_tx.send(GatewayEvent::Closed { player_id });
    tracing::debug!(player_id, "连接任务退出");
}
