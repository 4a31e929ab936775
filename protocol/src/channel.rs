//! 邮箱与通道
//!
//! 在无序、至多一次的传输之上提供每参与者一份的入站邮箱，
//! 以及按谓词匹配的阻塞式收取。入站消息由泵任务过滤后入箱，
//! 消费方挂起等待而不是忙轮询。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::constants::{ARBITER_UID, BROADCAST_UID, SCOPE};
use crate::error::Result;
use crate::message::{Message, Tag};
use crate::transport::{Publisher, Subscriber, Transport};

/// 通道角色，决定入站过滤规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// 仲裁方：丢弃自己名义发出的消息
    Arbiter,
    /// 玩家：只接受仲裁方发来的消息
    Client,
}

/// 每参与者一份的入站邮箱
#[derive(Default)]
struct Mailbox {
    queue: Mutex<VecDeque<Message>>,
    notify: Notify,
}

impl Mailbox {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, message: Message) {
        self.lock().push_back(message);
        self.notify.notify_one();
    }
}

/// 通道核心：入站泵 + 邮箱 + 发布端
pub struct Channel {
    uid: String,
    mailbox: Arc<Mailbox>,
    publisher: Box<dyn Publisher>,
    pump: JoinHandle<()>,
}

impl Channel {
    /// 打开通道：订阅发给自己的与广播的主题，并启动入站泵
    async fn open<T: Transport>(mut transport: T, uid: String, role: Role) -> Result<Channel> {
        transport
            .subscribe(&format!("{}/+/{}/+", SCOPE, uid))
            .await?;
        transport
            .subscribe(&format!("{}/+/{}/+", SCOPE, BROADCAST_UID))
            .await?;

        let (publisher, subscriber) = transport.split();
        let mailbox = Arc::new(Mailbox::default());
        let pump = tokio::spawn(pump(subscriber, mailbox.clone(), uid.clone(), role));

        Ok(Channel {
            uid,
            mailbox,
            publisher: Box::new(publisher),
            pump,
        })
    }

    /// 收取第一条满足谓词的消息，没有则挂起等待
    ///
    /// 匹配顺序是当前邮箱快照的顺序，不是跨发送方的严格到达顺序。
    pub async fn receive_matching<F>(&self, mut condition: F) -> Message
    where
        F: FnMut(&Message) -> bool,
    {
        loop {
            {
                let mut queue = self.mailbox.lock();
                if let Some(index) = queue.iter().position(|m| condition(m)) {
                    if let Some(message) = queue.remove(index) {
                        return message;
                    }
                }
            }
            self.mailbox.notify.notified().await;
        }
    }

    /// 收取任意一条消息
    ///
    /// 每个逻辑回合至多调用一次，避免提前消费后续消息。
    pub async fn receive_any(&self) -> Message {
        self.receive_matching(|_| true).await
    }

    /// 原子地取走当前排队的全部消息
    pub fn flush_mailbox(&self) -> Vec<Message> {
        self.mailbox.lock().drain(..).collect()
    }

    /// 以自己的身份发送一条消息
    pub async fn send(&self, receiver: &str, tag: Tag, content: &str) -> Result<()> {
        let message = Message::new(self.uid.clone(), receiver, tag, content);
        tracing::debug!("发出 {}", message);
        self.publisher.publish(&message.topic(), &message.content).await
    }

    /// 本通道的参与者标识
    pub fn uid(&self) -> &str {
        &self.uid
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// 入站泵：过滤传输投递并写入邮箱
async fn pump<S: Subscriber + 'static>(
    mut subscriber: S,
    mailbox: Arc<Mailbox>,
    uid: String,
    role: Role,
) {
    loop {
        let delivery = match subscriber.recv().await {
            Ok(delivery) => delivery,
            Err(err) => {
                tracing::debug!("通道 ({}) 传输已结束: {}", uid, err);
                return;
            }
        };

        let message = match Message::from_topic(&delivery.topic, &delivery.payload) {
            Ok(message) => message,
            Err(_) => {
                tracing::warn!("丢弃无效主题: {}", delivery.topic);
                continue;
            }
        };

        // 自己发出的广播回声，静默丢弃
        if message.sender == uid && message.receiver == BROADCAST_UID {
            continue;
        }

        if message.sender == uid
            || (message.receiver != uid && message.receiver != BROADCAST_UID)
        {
            tracing::warn!("丢弃无效消息: {}", message);
            continue;
        }

        let role_mismatch = match role {
            Role::Client => message.sender != ARBITER_UID,
            Role::Arbiter => message.sender == ARBITER_UID,
        };
        if role_mismatch {
            tracing::warn!("丢弃无效消息: {}", message);
            continue;
        }

        tracing::debug!("收到 {}", message);
        mailbox.push(message);
    }
}

/// 玩家侧通道：打开时宣告上线，关闭时宣告离线
pub struct ClientChannel {
    channel: Channel,
}

impl ClientChannel {
    /// 打开玩家通道并发送 `connected`
    pub async fn open<T: Transport>(transport: T, uid: impl Into<String>) -> Result<ClientChannel> {
        let channel = Channel::open(transport, uid.into(), Role::Client).await?;
        let this = ClientChannel { channel };
        this.send_to_arbiter(Tag::Connected, "").await?;
        tracing::info!("通道 ({}) 已上线", this.uid());
        Ok(this)
    }

    /// 发送 `disconnected` 并关闭通道
    pub async fn close(self) -> Result<()> {
        self.send_to_arbiter(Tag::Disconnected, "").await?;
        tracing::info!("通道 ({}) 已离线", self.uid());
        Ok(())
    }

    /// 给仲裁方发送消息
    pub async fn send_to_arbiter(&self, tag: Tag, content: &str) -> Result<()> {
        self.channel.send(ARBITER_UID, tag, content).await
    }

    /// 收取第一条满足谓词的消息，没有则挂起等待
    pub async fn receive_matching<F>(&self, condition: F) -> Message
    where
        F: FnMut(&Message) -> bool,
    {
        self.channel.receive_matching(condition).await
    }

    /// 收取任意一条消息
    pub async fn receive_any(&self) -> Message {
        self.channel.receive_any().await
    }

    /// 原子地取走当前排队的全部消息
    pub fn flush_mailbox(&self) -> Vec<Message> {
        self.channel.flush_mailbox()
    }

    /// 本通道的玩家标识
    pub fn uid(&self) -> &str {
        self.channel.uid()
    }
}

/// 仲裁方通道，整个进程唯一
pub struct ArbiterChannel {
    channel: Channel,
}

impl ArbiterChannel {
    /// 打开仲裁方通道
    pub async fn open<T: Transport>(transport: T) -> Result<ArbiterChannel> {
        let channel = Channel::open(transport, ARBITER_UID.to_string(), Role::Arbiter).await?;
        tracing::info!("仲裁通道已就绪");
        Ok(ArbiterChannel { channel })
    }

    /// 给指定玩家发送消息
    pub async fn send_to_client(&self, uid: &str, tag: Tag, content: &str) -> Result<()> {
        self.channel.send(uid, tag, content).await
    }

    /// 向所有参与者广播
    pub async fn broadcast(&self, tag: Tag, content: &str) -> Result<()> {
        self.channel.send(BROADCAST_UID, tag, content).await
    }

    /// 收取第一条满足谓词的消息，没有则挂起等待
    pub async fn receive_matching<F>(&self, condition: F) -> Message
    where
        F: FnMut(&Message) -> bool,
    {
        self.channel.receive_matching(condition).await
    }

    /// 收取任意一条消息
    pub async fn receive_any(&self) -> Message {
        self.channel.receive_any().await
    }

    /// 原子地取走当前排队的全部消息
    pub fn flush_mailbox(&self) -> Vec<Message> {
        self.channel.flush_mailbox()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::transport::LocalHub;

    /// 等待泵任务把已发布的消息送进邮箱
    async fn settle() {
        sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_receive_matching_out_of_order() {
        let hub = LocalHub::new();
        let arbiter = ArbiterChannel::open(hub.transport()).await.unwrap();
        let client = ClientChannel::open(hub.transport(), "alice").await.unwrap();

        // 先消费配对通知
        let connected = arbiter.receive_any().await;
        assert_eq!(connected.tag, Tag::Connected);

        client.send_to_arbiter(Tag::BoardAck, "").await.unwrap();
        client.send_to_arbiter(Tag::Place, "2,3").await.unwrap();

        // 谓词匹配跳过队首的 board-ack
        let place = arbiter.receive_matching(|m| m.tag == Tag::Place).await;
        assert_eq!(place.content, "2,3");

        // board-ack 仍在邮箱里
        let ack = arbiter.receive_any().await;
        assert_eq!(ack.tag, Tag::BoardAck);
        assert_eq!(ack.sender, "alice");
    }

    #[tokio::test]
    async fn test_flush_mailbox_drains_everything() {
        let hub = LocalHub::new();
        let arbiter = ArbiterChannel::open(hub.transport()).await.unwrap();
        let client = ClientChannel::open(hub.transport(), "alice").await.unwrap();

        client.send_to_arbiter(Tag::BoardAck, "").await.unwrap();
        settle().await;

        let drained = arbiter.flush_mailbox();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].tag, Tag::Connected);
        assert_eq!(drained[1].tag, Tag::BoardAck);
        assert!(arbiter.flush_mailbox().is_empty());
    }

    #[tokio::test]
    async fn test_client_filters_non_arbiter_senders() {
        let hub = LocalHub::new();
        let alice = ClientChannel::open(hub.transport(), "alice").await.unwrap();

        // 冒充其他玩家直接向 alice 发消息
        let (intruder, _sub) = hub.transport().split();
        intruder
            .publish("othello/mallory/alice/place", "0,0")
            .await
            .unwrap();
        // 仲裁方的消息正常通过
        intruder
            .publish("othello/server/alice/your-turn", "B")
            .await
            .unwrap();
        settle().await;

        let messages = alice.flush_mailbox();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].tag, Tag::YourTurn);
        assert_eq!(messages[0].sender, "server");
    }

    #[tokio::test]
    async fn test_broadcast_echo_is_dropped() {
        let hub = LocalHub::new();
        let arbiter = ArbiterChannel::open(hub.transport()).await.unwrap();

        // 仲裁方订阅了广播主题，会收到自己广播的回声
        arbiter.broadcast(Tag::Board, "payload").await.unwrap();
        settle().await;

        assert!(arbiter.flush_mailbox().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_topics_are_dropped() {
        let hub = LocalHub::new();
        let alice = ClientChannel::open(hub.transport(), "alice").await.unwrap();

        let (sender, _sub) = hub.transport().split();
        // 未知标签被丢弃
        sender
            .publish("othello/server/alice/bogus", "")
            .await
            .unwrap();
        // 合法主题正常入箱
        sender.publish("othello/server/alice/place", "").await.unwrap();
        settle().await;

        let messages = alice.flush_mailbox();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].tag, Tag::Place);
    }

    #[tokio::test]
    async fn test_receive_blocks_until_arrival() {
        let hub = LocalHub::new();
        let arbiter = ArbiterChannel::open(hub.transport()).await.unwrap();
        let client = ClientChannel::open(hub.transport(), "alice").await.unwrap();

        let waiter = tokio::spawn(async move {
            let message = arbiter
                .receive_matching(|m| m.tag == Tag::Place && m.sender == "alice")
                .await;
            message.content
        });

        sleep(Duration::from_millis(100)).await;
        client.send_to_arbiter(Tag::Place, "5,4").await.unwrap();

        let content = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(content, "5,4");
    }
}
