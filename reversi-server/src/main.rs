use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use protocol::{ArbiterChannel, TcpTransport, DEFAULT_LISTEN_ADDR};
use reversi_server::{Relay, TurnCoordinator};

/// 黑白棋仲裁服务端
#[derive(Parser)]
struct Args {
    /// 中继监听地址
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reversi_server=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    info!("黑白棋服务端启动中...");

    let relay = Relay::bind(&args.listen).await?;
    let addr = relay.local_addr().unwrap_or_else(|| args.listen.clone());
    info!("中继监听于 {}", addr);
    tokio::spawn(relay.run());

    let transport = TcpTransport::connect(&addr).await?;
    let channel = ArbiterChannel::open(transport).await?;

    // 每个仲裁进程只主持一局
    let summary = TurnCoordinator::new(channel).run().await?;
    info!("对局结果: {:?}", summary.result);

    Ok(())
}
