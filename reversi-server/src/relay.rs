//! 发布/订阅中继
//!
//! 仲裁进程内嵌的参考总线：按订阅模式转发 `Publish` 帧。
//! 投递至多一次，不保证跨连接的先后顺序；发布方自己匹配的
//! 订阅同样会收到回声，去重是通道过滤器的职责。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use protocol::{topic_matches, FrameReader, FrameWriter, Packet, ProtocolError};

/// 一个已接入的对端
struct Peer {
    id: u64,
    patterns: Vec<String>,
    tx: mpsc::UnboundedSender<Packet>,
}

fn lock_peers(peers: &Mutex<Vec<Peer>>) -> MutexGuard<'_, Vec<Peer>> {
    peers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// TCP 发布/订阅中继
pub struct Relay {
    listener: TcpListener,
}

impl Relay {
    /// 绑定监听地址
    pub async fn bind(addr: &str) -> anyhow::Result<Relay> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Relay { listener })
    }

    /// 获取实际监听地址
    pub fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }

    /// 运行接入循环
    pub async fn run(self) -> anyhow::Result<()> {
        let peers: Arc<Mutex<Vec<Peer>>> = Arc::new(Mutex::new(Vec::new()));
        let mut next_id = 0u64;

        loop {
            let (stream, addr) = self.listener.accept().await?;
            debug!("中继接入新连接 {}: {}", next_id, addr);

            let id = next_id;
            next_id += 1;
            let peers = peers.clone();
            tokio::spawn(async move {
                match serve_peer(stream, id, &peers).await {
                    Err(ProtocolError::ConnectionClosed) => debug!("中继连接 {} 已断开", id),
                    Err(err) => warn!("中继连接 {} 出错: {}", id, err),
                    Ok(()) => {}
                }
                lock_peers(&peers).retain(|p| p.id != id);
            });
        }
    }
}

/// 处理单个对端连接
async fn serve_peer(
    stream: TcpStream,
    id: u64,
    peers: &Mutex<Vec<Peer>>,
) -> protocol::Result<()> {
    stream.set_nodelay(true)?;
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);
    let mut writer = FrameWriter::new(write_half);

    let (tx, mut rx) = mpsc::unbounded_channel::<Packet>();
    lock_peers(peers).push(Peer {
        id,
        patterns: Vec::new(),
        tx,
    });

    // 写出任务：把转发队列中的帧写给对端
    let write_task = tokio::spawn(async move {
        while let Some(packet) = rx.recv().await {
            if writer.write_frame(&packet).await.is_err() {
                return;
            }
        }
    });

    let result = loop {
        match reader.read_frame().await {
            Ok(Packet::Subscribe { pattern }) => {
                debug!("中继连接 {} 订阅: {}", id, pattern);
                let mut peers = lock_peers(peers);
                if let Some(peer) = peers.iter_mut().find(|p| p.id == id) {
                    peer.patterns.push(pattern);
                }
            }
            Ok(Packet::Publish { topic, payload }) => {
                let peers = lock_peers(peers);
                for peer in peers.iter() {
                    if peer.patterns.iter().any(|p| topic_matches(p, &topic)) {
                        // 对端已关闭则丢弃，至多一次投递
                        let _ = peer.tx.send(Packet::Publish {
                            topic: topic.clone(),
                            payload: payload.clone(),
                        });
                    }
                }
            }
            Err(err) => break Err(err),
        }
    };

    write_task.abort();
    result
}
