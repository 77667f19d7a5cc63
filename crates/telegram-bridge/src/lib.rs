//! Telegram 桥接服务
//!
//! 从 Kafka 消费 CRM 领域事件，格式化为人类可读的通知后
//! 通过 Telegram Bot API 投递到群组的 Alerts 话题。
//! 投递失败只记录日志不重试——偏移量在投递确认前已自动提交。

pub mod consumer;
pub mod error;
pub mod formatter;
pub mod service;
pub mod telegram;
