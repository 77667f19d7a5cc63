//! 通知格式化
//!
//! 将 CRM 事件渲染为 Telegram 的 HTML 文本。纯函数、无副作用，
//! 相同输入保证产生相同输出。当前使用硬编码模板，
//! 未来可扩展为从配置中心动态加载。

use crm_shared::events::event_types;

/// 字段缺失时的占位文案
const NOT_SPECIFIED: &str = "未指定";

/// 根据事件类型和上下文数据渲染通知文本
///
/// 已知事件类型使用固定模板；未知类型回退为携带原始
/// event_type 与完整 data 的通用模板，保证任何事件都可投递。
pub fn format_notification(event_type: &str, data: &serde_json::Value) -> String {
    match event_type {
        event_types::CLIENT_CREATED => {
            let full_name = extract_str(data, "full_name");
            let email = extract_str(data, "email");
            let phone = extract_str(data, "phone");
            let status = extract_str(data, "status");
            let client_id = extract_str(data, "client_id");

            format!(
                "🆕 <b>新客户已创建</b>\n\n\
                 👤 <b>姓名:</b> {full_name}\n\
                 📧 <b>邮箱:</b> {email}\n\
                 📱 <b>电话:</b> {phone}\n\
                 📊 <b>状态:</b> ✅ {status}\n\
                 🆔 <b>ID:</b> {client_id}"
            )
        }
        event_types::CLIENT_STATUS_CHANGED => {
            let full_name = extract_str(data, "full_name");
            let email = extract_str(data, "email");
            let phone = extract_str(data, "phone");
            let old_status = extract_str(data, "old_status");
            let new_status = extract_str(data, "new_status");
            let client_id = extract_str(data, "client_id");

            format!(
                "🔄 <b>客户状态变更</b>\n\n\
                 👤 <b>姓名:</b> {full_name}\n\
                 📧 <b>邮箱:</b> {email}\n\
                 📱 <b>电话:</b> {phone}\n\
                 🔄 <b>变更:</b> {old_status} → {new_status}\n\
                 🆔 <b>ID:</b> {client_id}"
            )
        }
        other => {
            format!("📢 <b>客户事件通知</b>\n\n类型: {other}\n数据: {data}")
        }
    }
}

/// 从 JSON 对象中安全提取字符串值
///
/// 优先取字符串类型的值，对数值等非字符串类型自动转换为 JSON 表示，
/// 确保模板渲染不会因类型不匹配而 panic。
fn extract_str(data: &serde_json::Value, key: &str) -> String {
    data.get(key)
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}
