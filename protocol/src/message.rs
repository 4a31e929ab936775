//! 消息与主题编码
//!
//! 主题共四段：`scope/sender/receiver/tag`，负载为 UTF-8 文本，
//! 含义由标签决定。

use std::fmt;
use std::str::FromStr;

use crate::constants::SCOPE;
use crate::error::{GameError, ProtocolError};

/// 消息标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// 客户端上线（内容为空）
    Connected,
    /// 客户端离线（内容为空）
    Disconnected,
    /// 棋盘广播（内容为序列化棋盘）
    Board,
    /// 棋盘确认（内容为空）
    BoardAck,
    /// 行棋权移交（内容为行棋方颜色字符）
    YourTurn,
    /// 落子（内容为 `"row,col"`）
    Place,
    /// 对局结果（内容为结果字符）
    Winner,
}

impl Tag {
    /// 获取线上标签字符串
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Connected => "connected",
            Tag::Disconnected => "disconnected",
            Tag::Board => "board",
            Tag::BoardAck => "board-ack",
            Tag::YourTurn => "your-turn",
            Tag::Place => "place",
            Tag::Winner => "winner",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(Tag::Connected),
            "disconnected" => Ok(Tag::Disconnected),
            "board" => Ok(Tag::Board),
            "board-ack" => Ok(Tag::BoardAck),
            "your-turn" => Ok(Tag::YourTurn),
            "place" => Ok(Tag::Place),
            "winner" => Ok(Tag::Winner),
            _ => Err(ProtocolError::UnknownTag(s.to_string())),
        }
    }
}

/// 一条寻址消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub receiver: String,
    pub tag: Tag,
    pub content: String,
}

impl Message {
    /// 创建消息
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        tag: Tag,
        content: impl Into<String>,
    ) -> Message {
        Message {
            sender: sender.into(),
            receiver: receiver.into(),
            tag,
            content: content.into(),
        }
    }

    /// 构造四段主题
    pub fn topic(&self) -> String {
        format!("{}/{}/{}/{}", SCOPE, self.sender, self.receiver, self.tag)
    }

    /// 从主题与负载解析消息
    ///
    /// 段数不对、scope 不匹配或标签未知时返回错误。
    pub fn from_topic(topic: &str, payload: &str) -> Result<Message, ProtocolError> {
        let segments: Vec<&str> = topic.split('/').collect();
        let [scope, sender, receiver, tag] = segments[..] else {
            return Err(ProtocolError::MalformedTopic {
                topic: topic.to_string(),
            });
        };
        if scope != SCOPE {
            return Err(ProtocolError::MalformedTopic {
                topic: topic.to_string(),
            });
        }

        Ok(Message {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            tag: tag.parse()?,
            content: payload.to_string(),
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({})->({}) [{}]: {:?}",
            self.sender, self.receiver, self.tag, self.content
        )
    }
}

/// 编码 `place` 消息内容
pub fn encode_move(row: usize, col: usize) -> String {
    format!("{},{}", row, col)
}

/// 解析 `place` 消息内容：两个十进制整数，逗号分隔
pub fn parse_move(content: &str) -> Result<(usize, usize), GameError> {
    let invalid = || GameError::InvalidMove {
        content: content.to_string(),
    };

    let (row, col) = content.split_once(',').ok_or_else(invalid)?;
    let row = row.parse().map_err(|_| invalid())?;
    let col = col.parse().map_err(|_| invalid())?;
    Ok((row, col))
}
