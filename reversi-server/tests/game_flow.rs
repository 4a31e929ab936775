//! 端到端对局测试
//!
//! 仲裁方加两个桩客户端跑完整局，桩总是选择第一个合法落子。

use std::time::Duration;

use tokio::time::timeout;

use protocol::{ArbiterChannel, ClientChannel, GameResult, LocalHub, TcpTransport};
use reversi_client::{FirstValidPicker, NullView, Session};
use reversi_server::{Relay, TurnCoordinator};

/// 跑一个桩客户端直到对局结束
async fn run_stub(channel: ClientChannel) -> GameResult {
    let mut session = Session::new(channel, FirstValidPicker, NullView);
    let result = session.run().await.unwrap();
    session.close().await.unwrap();
    result
}

#[tokio::test]
async fn full_game_over_local_hub() {
    let hub = LocalHub::new();

    let arbiter = ArbiterChannel::open(hub.transport()).await.unwrap();
    let game = tokio::spawn(TurnCoordinator::new(arbiter).run());

    let alice = ClientChannel::open(hub.transport(), "stub-alice").await.unwrap();
    let bob = ClientChannel::open(hub.transport(), "stub-bob").await.unwrap();
    let alice_task = tokio::spawn(run_stub(alice));
    let bob_task = tokio::spawn(run_stub(bob));

    // 回合数有上界，整局必须在限定时间内结束
    let summary = timeout(Duration::from_secs(30), game)
        .await
        .expect("game did not terminate")
        .unwrap()
        .unwrap();

    // 广播的结果必须与按最终棋盘独立重算的一致
    assert_eq!(summary.board.outcome(), Some(summary.result));

    let alice_result = timeout(Duration::from_secs(5), alice_task)
        .await
        .expect("winner not broadcast to alice")
        .unwrap();
    let bob_result = timeout(Duration::from_secs(5), bob_task)
        .await
        .expect("winner not broadcast to bob")
        .unwrap();
    assert_eq!(alice_result, summary.result);
    assert_eq!(bob_result, summary.result);
}

#[tokio::test]
async fn full_game_over_tcp_relay() {
    let relay = Relay::bind("127.0.0.1:0").await.unwrap();
    let addr = relay.local_addr().unwrap();
    tokio::spawn(relay.run());

    let transport = TcpTransport::connect(&addr).await.unwrap();
    let arbiter = ArbiterChannel::open(transport).await.unwrap();
    let game = tokio::spawn(TurnCoordinator::new(arbiter).run());
    // 等中继登记完仲裁方的订阅，再放玩家进来
    tokio::time::sleep(Duration::from_millis(100)).await;

    let transport = TcpTransport::connect(&addr).await.unwrap();
    let alice = ClientChannel::open(transport, "stub-alice").await.unwrap();
    let transport = TcpTransport::connect(&addr).await.unwrap();
    let bob = ClientChannel::open(transport, "stub-bob").await.unwrap();

    let alice_task = tokio::spawn(run_stub(alice));
    let bob_task = tokio::spawn(run_stub(bob));

    let summary = timeout(Duration::from_secs(60), game)
        .await
        .expect("game did not terminate")
        .unwrap()
        .unwrap();

    assert_eq!(summary.board.outcome(), Some(summary.result));

    let alice_result = timeout(Duration::from_secs(5), alice_task)
        .await
        .expect("winner not broadcast to alice")
        .unwrap();
    let bob_result = timeout(Duration::from_secs(5), bob_task)
        .await
        .expect("winner not broadcast to bob")
        .unwrap();
    assert_eq!(alice_result, summary.result);
    assert_eq!(bob_result, summary.result);
}
