//! CRM 事件模型
//!
//! 定义 crm-msgAccepted topic 上流转的事件信封格式。
//! 上游不强制 schema——event_type 缺失是合法状态，由消费方决定如何处理，
//! 因此字段全部宽松解析而非解析失败。

use serde::{Deserialize, Serialize};

/// 集中管理已知的事件类型名称，防止字符串散落在格式化与测试代码中
pub mod event_types {
    pub const CLIENT_CREATED: &str = "client_created";
    pub const CLIENT_STATUS_CHANGED: &str = "client_status_changed";
}

/// CRM 领域事件
///
/// `data` 为任意键值对，缺失时为 JSON null；具体字段含义由
/// event_type 决定，在通知格式化阶段按需提取。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmEvent {
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}
