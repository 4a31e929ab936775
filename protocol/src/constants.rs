//! 协议常量定义

use std::time::Duration;

/// 协议帧版本号
pub const PROTOCOL_VERSION: u8 = 1;

/// 主题命名空间（四段主题的第一段）
pub const SCOPE: &str = "othello";

/// 仲裁方的固定标识
pub const ARBITER_UID: &str = "server";

/// 广播接收方标识
pub const BROADCAST_UID: &str = "*";

/// 棋盘边长
pub const BOARD_SIZE: usize = 8;

/// 序列化棋盘的行分隔符
pub const ROW_SEPARATOR: char = '|';

/// 消息帧最大大小
pub const MAX_FRAME_SIZE: usize = 65536;

/// 中继默认监听地址
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9883";

/// 客户端默认连接的中继地址
pub const DEFAULT_BROKER_ADDR: &str = "localhost:9883";

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
