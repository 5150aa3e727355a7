use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gomoku_server::{EventLog, EventStore, Gateway};
use protocol::NetworkConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("gomoku_server=debug".parse()?))
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| NetworkConfig::default().addr());

    let store = EventStore::open(EventStore::default_path()?)?;
    info!("事件日志: {:?}", store.path());
    let events = EventLog::spawn(store);

    let gateway = Gateway::bind(&addr).await?;
    info!("五子棋服务端启动，监听 {}", addr);

    gateway.run(events).await
}
