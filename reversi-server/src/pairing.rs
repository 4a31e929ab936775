//! 玩家配对
//!
//! 从上线/离线通知中收集恰好两名玩家，再分配棋色。

use std::collections::HashSet;

use rand::Rng;
use tracing::info;

use protocol::{ArbiterChannel, Tag, Tile};

/// 对局双方的身份映射，配对完成后在整局中不变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Players {
    black: String,
    white: String,
}

impl Players {
    /// 创建映射，双方必须不同
    pub fn new(black: impl Into<String>, white: impl Into<String>) -> Players {
        let (black, white) = (black.into(), white.into());
        assert_ne!(black, white, "players must be distinct");
        Players { black, white }
    }

    /// 指定颜色的玩家标识
    pub fn uid(&self, color: Tile) -> &str {
        match color {
            Tile::Black => &self.black,
            Tile::White => &self.white,
            Tile::Empty => unreachable!("Empty is not a player"),
        }
    }

    /// 标识对应的棋色
    pub fn color_of(&self, uid: &str) -> Option<Tile> {
        if uid == self.black {
            Some(Tile::Black)
        } else if uid == self.white {
            Some(Tile::White)
        } else {
            None
        }
    }

    /// 是否为对局中的玩家
    pub fn contains(&self, uid: &str) -> bool {
        self.color_of(uid).is_some()
    }
}

/// 等待恰好两名玩家上线并分配棋色
///
/// 维护候选集合：`connected` 加入，`disconnected` 移除先连后断的候选。
/// 棋色分配是随机的，协议里不存在可依赖的先后信号。
pub async fn wait_for_players(channel: &ArbiterChannel) -> Players {
    let mut pending: HashSet<String> = HashSet::new();

    while pending.len() < 2 {
        let message = channel
            .receive_matching(|m| matches!(m.tag, Tag::Connected | Tag::Disconnected))
            .await;

        match message.tag {
            Tag::Connected => {
                info!("玩家上线: {}", message.sender);
                pending.insert(message.sender);
            }
            Tag::Disconnected => {
                info!("玩家离线: {}", message.sender);
                pending.remove(&message.sender);
            }
            _ => {}
        }
    }

    let mut ids = pending.into_iter();
    let (Some(first), Some(second)) = (ids.next(), ids.next()) else {
        unreachable!("pairing set holds exactly two uids");
    };

    let (black, white) = if rand::thread_rng().gen() {
        (first, second)
    } else {
        (second, first)
    };
    let players = Players::new(black, white);
    info!(
        "配对完成: 黑方 = {}, 白方 = {}",
        players.uid(Tile::Black),
        players.uid(Tile::White)
    );
    players
}
