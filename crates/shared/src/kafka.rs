//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的 Consumer 抽象，
//! 统一消息反序列化、错误映射和优雅关闭语义。

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::CrmError;

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
}

impl ConsumerMessage {
    /// 从 rdkafka 的借用消息构造，提取并拥有所有字段
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
            timestamp: msg.timestamp().to_millis(),
        }
    }

    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, CrmError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| CrmError::Kafka(format!("负载反序列化失败: {e}")))
    }
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 消费者
///
/// 封装 `StreamConsumer` 并提供基于 `watch` channel 的优雅关闭语义，
/// 确保进程退出时正在处理的消息能自然完成。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    /// 创建消费者
    ///
    /// 偏移量每秒自动提交一次——提交发生在投递确认之前，
    /// 崩溃时最多丢失约 1 秒已提交未投递的记录。
    pub fn new(config: &KafkaConfig) -> Result<Self, CrmError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "1000")
            .set("session.timeout.ms", "30000")
            .create()
            .map_err(|e| CrmError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.consumer_group,
            "Kafka 消费者已初始化"
        );
        Ok(Self { consumer })
    }

    /// 订阅事件 topic
    pub fn subscribe(&self, topic: &str) -> Result<(), CrmError> {
        self.consumer
            .subscribe(&[topic])
            .map_err(|e| CrmError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(topic, "已订阅 Kafka topic");
        Ok(())
    }

    /// 启动消费循环
    ///
    /// 使用 `tokio::select!` 同时监听消息流和关闭信号：
    /// - 收到消息时调用 handler 处理并等待其完成后再拉取下一条，
    ///   投递顺序与 topic 内顺序一致；handler 返回错误只记录日志而不中断循环，
    ///   避免单条坏消息导致整个消费者停止。
    /// - 关闭信号变为 `true` 时退出循环，正在执行的 handler 能自然完成。
    ///   每处理完一条消息都会重新检查信号，停止延迟不超过单条消息的处理时长。
    pub async fn start<F, Fut>(self, mut shutdown: watch::Receiver<bool>, handler: F)
    where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: std::future::Future<Output = Result<(), CrmError>>,
    {
        use futures::StreamExt;

        let stream = self.consumer.stream();
        futures::pin_mut!(stream);

        info!("消费循环已启动");

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，消费循环退出");
                        break;
                    }
                }

                next = stream.next() => {
                    let Some(next) = next else {
                        warn!("消息流意外结束，消费循环退出");
                        break;
                    };

                    match next {
                        Ok(borrowed_msg) => {
                            let msg = ConsumerMessage::from_borrowed(&borrowed_msg);
                            debug!(
                                partition = msg.partition,
                                offset = msg.offset,
                                "收到消息"
                            );

                            if let Err(e) = handler(msg).await {
                                error!(error = %e, "处理消息失败");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "接收消息出错");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
