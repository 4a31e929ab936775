//! 传输层抽象
//!
//! 提供 Transport/Publisher/Subscriber traits，使邮箱层与具体总线实现解耦。
//! 传输只承诺按主题过滤、至多一次、跨主题无序的投递，上层不得有更多假设。

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use crate::constants::{CONNECT_TIMEOUT, MAX_FRAME_SIZE, PROTOCOL_VERSION};
use crate::error::{ProtocolError, Result};

/// 一次投递
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub payload: String,
}

/// 中继帧
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    /// 订阅主题模式
    Subscribe { pattern: String },
    /// 发布消息
    Publish { topic: String, payload: String },
}

/// 判断主题是否匹配模式
///
/// 模式与主题都按 '/' 分段，`+` 段匹配任意单段，段数必须一致。
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern = pattern.split('/');
    let mut topic = topic.split('/');
    loop {
        match (pattern.next(), topic.next()) {
            (None, None) => return true,
            (Some(p), Some(t)) => {
                if p != "+" && p != t {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// 发布端抽象
#[async_trait]
pub trait Publisher: Send + Sync {
    /// 发布一条消息
    async fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

/// 订阅端抽象
#[async_trait]
pub trait Subscriber: Send {
    /// 接收下一条投递
    async fn recv(&mut self) -> Result<Delivery>;
}

/// 传输连接抽象
#[async_trait]
pub trait Transport: Send + Sized {
    type Pub: Publisher + 'static;
    type Sub: Subscriber + 'static;

    /// 订阅主题模式
    async fn subscribe(&mut self, pattern: &str) -> Result<()>;

    /// 分离发布端与订阅端
    fn split(self) -> (Self::Pub, Self::Sub);
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 传输连接，通过中继交换帧
pub struct TcpTransport {
    reader: FrameReader<OwnedReadHalf>,
    writer: Arc<Mutex<FrameWriter<OwnedWriteHalf>>>,
}

impl TcpTransport {
    /// 连接中继
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)?
            .map_err(ProtocolError::Io)?;

        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: FrameReader::new(read_half),
            writer: Arc::new(Mutex::new(FrameWriter::new(write_half))),
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Pub = TcpPublisher;
    type Sub = TcpSubscriber;

    async fn subscribe(&mut self, pattern: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .write_frame(&Packet::Subscribe {
                pattern: pattern.to_string(),
            })
            .await
    }

    fn split(self) -> (TcpPublisher, TcpSubscriber) {
        (
            TcpPublisher {
                writer: self.writer,
            },
            TcpSubscriber {
                reader: self.reader,
            },
        )
    }
}

/// TCP 发布端
pub struct TcpPublisher {
    writer: Arc<Mutex<FrameWriter<OwnedWriteHalf>>>,
}

#[async_trait]
impl Publisher for TcpPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .write_frame(&Packet::Publish {
                topic: topic.to_string(),
                payload: payload.to_string(),
            })
            .await
    }
}

/// TCP 订阅端
pub struct TcpSubscriber {
    reader: FrameReader<OwnedReadHalf>,
}

#[async_trait]
impl Subscriber for TcpSubscriber {
    async fn recv(&mut self) -> Result<Delivery> {
        loop {
            match self.reader.read_frame().await? {
                Packet::Publish { topic, payload } => return Ok(Delivery { topic, payload }),
                // 中继不会向客户端下发订阅帧
                Packet::Subscribe { .. } => continue,
            }
        }
    }
}

// ============================================================================
// 帧编解码
// ============================================================================

/// 帧头大小: 1 字节版本 + 4 字节长度
const HEADER_SIZE: usize = 5;

/// 帧读取器
pub struct FrameReader<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    /// 创建新的帧读取器
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// 读取并解码一帧
    pub async fn read_frame(&mut self) -> Result<Packet> {
        // 读取帧头
        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ProtocolError::ConnectionClosed
            } else {
                ProtocolError::Io(e)
            }
        })?;

        // 解析版本号
        let version = header[0];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: version,
            });
        }

        // 解析长度（大端序）
        let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
        if length > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                max: MAX_FRAME_SIZE,
            });
        }

        // 读取帧体
        if self.buffer.len() < length {
            self.buffer.resize(length, 0);
        }
        self.reader
            .read_exact(&mut self.buffer[..length])
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    ProtocolError::ConnectionClosed
                } else {
                    ProtocolError::Io(e)
                }
            })?;

        let packet = bincode::deserialize(&self.buffer[..length])?;
        Ok(packet)
    }
}

/// 帧写入器
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    /// 创建新的帧写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 编码并写入一帧
    pub async fn write_frame(&mut self, packet: &Packet) -> Result<()> {
        let payload = bincode::serialize(packet)?;
        if payload.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        // 构造帧头
        let length = payload.len() as u32;
        let mut header = [0u8; HEADER_SIZE];
        header[0] = PROTOCOL_VERSION;
        header[1..5].copy_from_slice(&length.to_be_bytes());

        self.writer.write_all(&header).await?;
        self.writer.write_all(&payload).await?;
        self.writer.flush().await?;

        Ok(())
    }
}

// ============================================================================
// 进程内总线
// ============================================================================

/// 进程内总线的一个端点
struct Endpoint {
    patterns: Vec<String>,
    tx: mpsc::UnboundedSender<Delivery>,
}

fn lock_endpoints(endpoints: &StdMutex<Vec<Endpoint>>) -> MutexGuard<'_, Vec<Endpoint>> {
    endpoints.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 进程内发布/订阅总线，用于测试与单进程对局
#[derive(Clone, Default)]
pub struct LocalHub {
    endpoints: Arc<StdMutex<Vec<Endpoint>>>,
}

impl LocalHub {
    /// 创建总线
    pub fn new() -> Self {
        Self::default()
    }

    /// 接入一个新端点
    pub fn transport(&self) -> LocalTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut endpoints = lock_endpoints(&self.endpoints);
        let index = endpoints.len();
        endpoints.push(Endpoint {
            patterns: Vec::new(),
            tx,
        });
        drop(endpoints);

        LocalTransport {
            index,
            endpoints: self.endpoints.clone(),
            rx,
        }
    }
}

/// 进程内传输连接
pub struct LocalTransport {
    index: usize,
    endpoints: Arc<StdMutex<Vec<Endpoint>>>,
    rx: mpsc::UnboundedReceiver<Delivery>,
}

#[async_trait]
impl Transport for LocalTransport {
    type Pub = LocalPublisher;
    type Sub = LocalSubscriber;

    async fn subscribe(&mut self, pattern: &str) -> Result<()> {
        let mut endpoints = lock_endpoints(&self.endpoints);
        if let Some(endpoint) = endpoints.get_mut(self.index) {
            endpoint.patterns.push(pattern.to_string());
        }
        Ok(())
    }

    fn split(self) -> (LocalPublisher, LocalSubscriber) {
        (
            LocalPublisher {
                endpoints: self.endpoints,
            },
            LocalSubscriber { rx: self.rx },
        )
    }
}

/// 进程内发布端
pub struct LocalPublisher {
    endpoints: Arc<StdMutex<Vec<Endpoint>>>,
}

#[async_trait]
impl Publisher for LocalPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let endpoints = lock_endpoints(&self.endpoints);
        for endpoint in endpoints.iter() {
            if endpoint.patterns.iter().any(|p| topic_matches(p, topic)) {
                // 端点已关闭则丢弃，至多一次投递
                let _ = endpoint.tx.send(Delivery {
                    topic: topic.to_string(),
                    payload: payload.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// 进程内订阅端
pub struct LocalSubscriber {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

#[async_trait]
impl Subscriber for LocalSubscriber {
    async fn recv(&mut self) -> Result<Delivery> {
        self.rx.recv().await.ok_or(ProtocolError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matches() {
        assert!(topic_matches("othello/+/server/+", "othello/alice/server/place"));
        assert!(topic_matches("othello/+/*/+", "othello/server/*/board"));
        assert!(topic_matches("othello/alice/server/place", "othello/alice/server/place"));

        // scope 不同
        assert!(!topic_matches("othello/+/server/+", "chess/alice/server/place"));
        // 接收方不同
        assert!(!topic_matches("othello/+/server/+", "othello/alice/bob/place"));
        // 段数不同
        assert!(!topic_matches("othello/+/server/+", "othello/alice/server"));
        assert!(!topic_matches("othello/+/server/+", "othello/a/server/place/extra"));
    }

    #[tokio::test]
    async fn test_local_hub_routes_by_pattern() {
        let hub = LocalHub::new();

        let mut alice = hub.transport();
        alice.subscribe("othello/+/alice/+").await.unwrap();
        let mut bob = hub.transport();
        bob.subscribe("othello/+/bob/+").await.unwrap();

        let (alice_pub, mut alice_sub) = alice.split();
        let (_bob_pub, mut bob_sub) = bob.split();

        alice_pub
            .publish("othello/alice/bob/place", "2,3")
            .await
            .unwrap();

        let delivery = bob_sub.recv().await.unwrap();
        assert_eq!(delivery.topic, "othello/alice/bob/place");
        assert_eq!(delivery.payload, "2,3");

        // 发给 bob 的消息不应进入 alice 的队列
        alice_pub
            .publish("othello/bob/alice/board-ack", "")
            .await
            .unwrap();
        let delivery = alice_sub.recv().await.unwrap();
        assert_eq!(delivery.topic, "othello/bob/alice/board-ack");
    }

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (client, server) = tokio::io::duplex(4096);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer
            .write_frame(&Packet::Subscribe {
                pattern: "othello/+/server/+".to_string(),
            })
            .await
            .unwrap();
        writer
            .write_frame(&Packet::Publish {
                topic: "othello/alice/server/place".to_string(),
                payload: "2,3".to_string(),
            })
            .await
            .unwrap();

        match reader.read_frame().await.unwrap() {
            Packet::Subscribe { pattern } => assert_eq!(pattern, "othello/+/server/+"),
            packet => panic!("unexpected packet: {:?}", packet),
        }
        match reader.read_frame().await.unwrap() {
            Packet::Publish { topic, payload } => {
                assert_eq!(topic, "othello/alice/server/place");
                assert_eq!(payload, "2,3");
            }
            packet => panic!("unexpected packet: {:?}", packet),
        }
    }

    #[tokio::test]
    async fn test_frame_reader_reports_closed() {
        let (client, server) = tokio::io::duplex(4096);
        drop(client);

        let mut reader = FrameReader::new(server);
        assert!(matches!(
            reader.read_frame().await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }
}
