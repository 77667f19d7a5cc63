//! CRM 事件消费者
//!
//! 从 Kafka 消费 CRM 事件，逐条格式化并投递到 Telegram。
//! 严格串行处理：前一条消息的投递结束（无论成败）后才拉取下一条，
//! 保证通知顺序与 topic 内事件顺序一致。

use std::sync::Arc;

use crm_shared::config::AppConfig;
use crm_shared::events::CrmEvent;
use crm_shared::kafka::{ConsumerMessage, KafkaConsumer};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::BridgeError;
use crate::formatter::format_notification;
use crate::telegram::TelegramClient;

/// 通知投递到的论坛话题名
const ALERTS_TOPIC: &str = "Alerts";

/// CRM 事件消费者
///
/// 持有 Kafka 订阅与 Telegram 客户端，驱动消费循环直到收到关闭信号。
pub struct EventConsumer {
    consumer: KafkaConsumer,
    topic: String,
    telegram: Arc<TelegramClient>,
}

impl EventConsumer {
    /// 创建消费者；订阅无法建立时返回错误，由启动流程决定终止
    pub fn new(config: &AppConfig, telegram: Arc<TelegramClient>) -> Result<Self, BridgeError> {
        let consumer = KafkaConsumer::new(&config.kafka)?;
        Ok(Self {
            consumer,
            topic: config.kafka.topic.clone(),
            telegram,
        })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), BridgeError> {
        let Self {
            consumer,
            topic,
            telegram,
        } = self;

        consumer.subscribe(&topic)?;

        info!(topic = %topic, "CRM 事件消费者已启动");

        consumer
            .start(shutdown, |msg| {
                let telegram = &telegram;
                async move {
                    if let Err(e) = handle_message(telegram, &msg).await {
                        error!(
                            error = %e,
                            topic = %msg.topic,
                            partition = msg.partition,
                            offset = msg.offset,
                            "处理 CRM 事件失败"
                        );
                    }
                    Ok(())
                }
            })
            .await;

        info!("CRM 事件消费者已停止");
        Ok(())
    }
}

/// 处理单条 Kafka 消息
///
/// 独立函数便于在测试中直接调用，无需构造完整的消费者。
/// 反序列化失败返回错误，由循环记录日志后跳过该条消息。
async fn handle_message(
    telegram: &TelegramClient,
    msg: &ConsumerMessage,
) -> Result<(), BridgeError> {
    let event: CrmEvent = msg
        .deserialize_payload()
        .map_err(|e| BridgeError::DeserializationFailed(e.to_string()))?;

    info!(
        topic = %msg.topic,
        offset = msg.offset,
        event_type = ?event.event_type,
        "收到 CRM 事件"
    );

    handle_event(telegram, &event).await;
    Ok(())
}

/// 处理单个 CRM 事件
///
/// event_type 缺失的事件记录警告后直接忽略，不尝试投递。
/// 投递失败只记录日志——偏移量已自动提交，该事件不会重投。
pub async fn handle_event(telegram: &TelegramClient, event: &CrmEvent) {
    let Some(event_type) = event.event_type.as_deref() else {
        warn!("事件缺少 event_type 字段，已忽略");
        return;
    };

    let text = format_notification(event_type, &event.data);

    if telegram.send_to_topic(&text, ALERTS_TOPIC).await {
        info!(event_type, topic = ALERTS_TOPIC, "通知已发送到 Telegram");
    } else {
        error!(event_type, "通知发送失败，该事件已丢弃");
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
