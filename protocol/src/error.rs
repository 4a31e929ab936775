//! 错误类型定义

use thiserror::Error;

/// 规则与编码错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// 无效的棋盘文本
    #[error("Invalid board encoding: {reason}")]
    InvalidBoard { reason: String },

    /// 无效的落子内容
    #[error("Invalid move content: {content:?}")]
    InvalidMove { content: String },
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误（bincode）
    #[error("Bincode serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// 主题格式错误
    #[error("Malformed topic: {topic}")]
    MalformedTopic { topic: String },

    /// 未知的消息标签
    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    /// 协议版本不匹配
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 规则错误
    #[error("Game error: {0}")]
    Game(#[from] GameError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
