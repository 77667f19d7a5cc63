//! 统一错误处理模块
//!
//! 定义基础设施层共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum CrmError {
    /// 消费者创建、订阅等 Kafka 层面的失败
    #[error("Kafka 错误: {0}")]
    Kafka(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, CrmError>;
