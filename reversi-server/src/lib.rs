//! 黑白棋仲裁服务端
//!
//! 包含:
//! - 发布/订阅中继
//! - 玩家配对
//! - 回合协调

pub mod game;
pub mod pairing;
pub mod relay;

pub use game::{GamePhase, GameSummary, TurnCoordinator};
pub use pairing::{wait_for_players, Players};
pub use relay::Relay;
