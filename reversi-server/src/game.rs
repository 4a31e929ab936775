//! 回合协调
//!
//! 仲裁方的权威对局循环：广播棋盘、等待确认、移交行棋权、
//! 收取并验证落子。离线方视为弃权，对方直接获胜。

use tracing::{debug, info, warn};

use protocol::{parse_move, ArbiterChannel, Board, GameResult, Message, Scores, Tag, Tile};

use crate::pairing::{self, Players};

/// 对局阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// 等待玩家配对
    AwaitingPlayers,
    /// 对局进行中
    Playing,
    /// 对局结束
    Finished,
}

/// 对局结束后的摘要
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub result: GameResult,
    pub board: Board,
}

/// 一次行棋权移交的结果
enum TurnOutcome {
    /// 收到合法落子
    Move { row: usize, col: usize },
    /// 某个玩家离线
    Forfeit(GameResult),
}

/// 回合协调器，独占棋盘
pub struct TurnCoordinator {
    channel: ArbiterChannel,
    board: Board,
    phase: GamePhase,
}

impl TurnCoordinator {
    /// 创建协调器
    pub fn new(channel: ArbiterChannel) -> TurnCoordinator {
        TurnCoordinator {
            channel,
            board: Board::new(),
            phase: GamePhase::AwaitingPlayers,
        }
    }

    /// 当前对局阶段
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// 运行一整局：配对、轮转回合、广播结果
    pub async fn run(mut self) -> protocol::Result<GameSummary> {
        let players = pairing::wait_for_players(&self.channel).await;
        self.phase = GamePhase::Playing;

        let mut active = Tile::Black;
        loop {
            // 处理两回合之间积压的离线通知，其余积压消息已过期
            if let Some(result) = self.drain_disconnects(&players) {
                return self.finish(result).await;
            }

            self.channel
                .broadcast(Tag::Board, &self.board.serialize())
                .await?;

            // 行棋方确认收到棋盘后才移交行棋权
            let message = self.receive_from(&players, active, Tag::BoardAck).await;
            if let Some(result) = forfeit_by(&players, &message) {
                return self.finish(result).await;
            }

            let (row, col) = match self.request_move(&players, active).await? {
                TurnOutcome::Move { row, col } => (row, col),
                TurnOutcome::Forfeit(result) => return self.finish(result).await,
            };

            if !self.board.place(row, col, active) {
                // request_move 已验证过合法性，到这里只可能是内部不一致
                warn!("落子 ({}, {}) 未改变棋盘，重新询问", row, col);
                continue;
            }
            debug!("{:?} 落子 ({}, {})", active, row, col);

            active = active.opposite();

            if let Some(result) = self.board.outcome() {
                return self.finish(result).await;
            }

            // 无合法落子则过手
            if !self.board.has_any_valid_move(active) {
                info!("{:?} 无合法落子，过手", active);
                active = active.opposite();
            }
        }
    }

    /// 清空邮箱并检查离线通知
    fn drain_disconnects(&self, players: &Players) -> Option<GameResult> {
        for message in self.channel.flush_mailbox() {
            if message.tag == Tag::Disconnected && players.contains(&message.sender) {
                return forfeit_by(players, &message);
            }
            debug!("丢弃过期消息: {}", message);
        }
        None
    }

    /// 等待指定玩家的某一标签消息
    ///
    /// 配对玩家的离线通知同样会返回，避免在对方离线后无限等待。
    async fn receive_from(&self, players: &Players, color: Tile, tag: Tag) -> Message {
        let uid = players.uid(color).to_string();
        let players = players.clone();
        self.channel
            .receive_matching(move |m| {
                (m.tag == tag && m.sender == uid)
                    || (m.tag == Tag::Disconnected && players.contains(&m.sender))
            })
            .await
    }

    /// 移交行棋权并收取一个合法落子；非法输入会重新询问
    async fn request_move(
        &self,
        players: &Players,
        active: Tile,
    ) -> protocol::Result<TurnOutcome> {
        let uid = players.uid(active).to_string();
        loop {
            self.channel
                .send_to_client(&uid, Tag::YourTurn, &active.to_char().to_string())
                .await?;

            let message = self.receive_from(players, active, Tag::Place).await;
            if let Some(result) = forfeit_by(players, &message) {
                return Ok(TurnOutcome::Forfeit(result));
            }

            match parse_move(&message.content) {
                Ok((row, col)) if self.board.is_move_valid(active, row, col) => {
                    return Ok(TurnOutcome::Move { row, col });
                }
                Ok((row, col)) => {
                    warn!("玩家 {} 提交非法落子 ({}, {})，重新询问", uid, row, col);
                }
                Err(err) => {
                    warn!("玩家 {} 的落子内容无法解析: {}，重新询问", uid, err);
                }
            }
        }
    }

    /// 广播对局结果并进入结束阶段
    async fn finish(&mut self, result: GameResult) -> protocol::Result<GameSummary> {
        self.phase = GamePhase::Finished;
        let Scores { black, white } = self.board.scores();
        info!("对局结束: {:?} (黑 {} : 白 {})", result, black, white);

        self.channel
            .broadcast(Tag::Winner, &result.to_char().to_string())
            .await?;

        Ok(GameSummary {
            result,
            board: self.board,
        })
    }
}

/// 消息若是配对玩家的离线通知，返回对方获胜的结果
fn forfeit_by(players: &Players, message: &Message) -> Option<GameResult> {
    if message.tag != Tag::Disconnected {
        return None;
    }
    match players.color_of(&message.sender)? {
        Tile::Black => {
            info!("黑方 {} 离线弃权", message.sender);
            Some(GameResult::WhiteWins)
        }
        Tile::White => {
            info!("白方 {} 离线弃权", message.sender);
            Some(GameResult::BlackWins)
        }
        Tile::Empty => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use protocol::{ClientChannel, LocalHub};
    use tokio::time::timeout;

    use super::*;

    /// 手工扮演一名只会确认棋盘的客户端，直到收到结果
    async fn ack_until_winner(channel: ClientChannel) -> GameResult {
        loop {
            let message = channel.receive_any().await;
            match message.tag {
                Tag::Board => channel.send_to_arbiter(Tag::BoardAck, "").await.unwrap(),
                Tag::Winner => {
                    let c = message.content.chars().next().unwrap();
                    return GameResult::from_char(c).unwrap();
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_disconnect_during_game_forfeits() {
        let hub = LocalHub::new();
        let arbiter = ArbiterChannel::open(hub.transport()).await.unwrap();
        let coordinator = TurnCoordinator::new(arbiter);
        assert_eq!(coordinator.phase(), GamePhase::AwaitingPlayers);
        let game = tokio::spawn(coordinator.run());

        let alice = ClientChannel::open(hub.transport(), "alice").await.unwrap();
        let bob = ClientChannel::open(hub.transport(), "bob").await.unwrap();

        // bob 不参与回合，只挂机等结果；alice 确认第一张棋盘后离线
        let bob_task = tokio::spawn(ack_until_winner(bob));

        let message = alice
            .receive_matching(|m| m.tag == Tag::Board)
            .await;
        assert!(Board::deserialize(&message.content).is_ok());
        alice.send_to_arbiter(Tag::BoardAck, "").await.unwrap();
        alice.close().await.unwrap();

        let summary = timeout(Duration::from_secs(10), game)
            .await
            .expect("game timed out")
            .unwrap()
            .unwrap();

        // alice 离线，胜方必然是 bob 执的那一色
        let bob_result = timeout(Duration::from_secs(10), bob_task)
            .await
            .expect("winner not broadcast")
            .unwrap();
        assert_eq!(bob_result, summary.result);
        assert_ne!(summary.result, GameResult::Draw);
    }

    #[tokio::test]
    async fn test_invalid_moves_are_reprompted() {
        let hub = LocalHub::new();
        let arbiter = ArbiterChannel::open(hub.transport()).await.unwrap();
        let coordinator = TurnCoordinator::new(arbiter);
        let game = tokio::spawn(coordinator.run());

        let alice = ClientChannel::open(hub.transport(), "alice").await.unwrap();
        let bob = ClientChannel::open(hub.transport(), "bob").await.unwrap();

        // 两个客户端：行棋时先送一条坏内容、再送一个占用格，最后离线结束对局
        for (channel, junk) in [(alice, "not-a-move"), (bob, "3,3")] {
            tokio::spawn(async move {
                let mut misbehaved = false;
                loop {
                    let message = channel.receive_any().await;
                    match message.tag {
                        Tag::Board => {
                            channel.send_to_arbiter(Tag::BoardAck, "").await.unwrap()
                        }
                        Tag::YourTurn if !misbehaved => {
                            misbehaved = true;
                            // 解析失败与非法落子都必须换来重新询问
                            channel.send_to_arbiter(Tag::Place, junk).await.unwrap();
                        }
                        Tag::YourTurn => {
                            channel.close().await.unwrap();
                            return;
                        }
                        Tag::Winner => return,
                        _ => {}
                    }
                }
            });
        }

        let summary = timeout(Duration::from_secs(10), game)
            .await
            .expect("game timed out")
            .unwrap()
            .unwrap();

        // 第一位行棋方离线弃权，棋盘从未被非法输入改动
        assert_eq!(summary.board, Board::new());
        assert_ne!(summary.result, GameResult::Draw);
    }
}
