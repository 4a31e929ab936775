//! 黑白棋共享协议库
//!
//! 包含:
//! - 棋子、棋盘与黑白棋规则
//! - 棋盘与落子的文本编码
//! - 消息与主题方案 (Message, Tag)
//! - 传输层抽象 (Transport, Publisher, Subscriber) 与 TCP/进程内实现
//! - 邮箱通道 (ClientChannel, ArbiterChannel)

mod board;
mod channel;
mod constants;
mod error;
mod message;
mod tile;
mod transport;

pub use board::{Board, GameResult, Scores};
pub use channel::{ArbiterChannel, ClientChannel};
pub use constants::*;
pub use error::{GameError, ProtocolError, Result};
pub use message::{encode_move, parse_move, Message, Tag};
pub use tile::Tile;
pub use transport::{
    topic_matches, Delivery, FrameReader, FrameWriter, LocalHub, LocalTransport, Packet,
    Publisher, Subscriber, TcpTransport, Transport,
};
