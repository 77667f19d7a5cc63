//! 桥接服务错误类型
//!
//! 区分致命的启动错误（订阅无法建立）与逐条消息的非致命错误
//! （反序列化失败），便于消费循环决定中止还是跳过。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("事件反序列化失败: {0}")]
    DeserializationFailed(String),

    #[error(transparent)]
    Shared(#[from] crm_shared::error::CrmError),
}
