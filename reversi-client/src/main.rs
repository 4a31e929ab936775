use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use protocol::{ClientChannel, TcpTransport, DEFAULT_BROKER_ADDR};
use reversi_client::{random_uid, RandomPicker, Session, TextView};

/// 黑白棋玩家客户端
#[derive(Parser)]
struct Args {
    /// 中继服务器地址
    #[arg(long, default_value = DEFAULT_BROKER_ADDR)]
    broker: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reversi_client=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let uid = random_uid();

    info!("玩家 {} 连接中继 {} ...", uid, args.broker);
    let transport = TcpTransport::connect(&args.broker).await?;
    let channel = ClientChannel::open(transport, uid).await?;

    let mut session = Session::new(channel, RandomPicker, TextView);

    // ctrl-c 时尽力宣告离线再退出
    let result = tokio::select! {
        result = session.run() => Some(result?),
        _ = tokio::signal::ctrl_c() => None,
    };

    session.close().await?;
    if let Some(result) = result {
        info!("对局结果: {:?}", result);
    }

    Ok(())
}
