//! Telegram Bot API 客户端
//!
//! 封装 sendMessage、getMe 等 Bot API 调用，持有惰性创建、可显式释放的
//! HTTP 会话。投递失败（传输错误、非 2xx 状态码、应用层拒绝）一律返回
//! `false`/`None` 并记录日志，由调用方决定后续动作，不向上抛出。

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crm_shared::config::TelegramConfig;

/// 群组中预先创建的 "Alerts" 话题的 message_thread_id，
/// 同时作为未知话题名的回退目标
const DEFAULT_THREAD_ID: i64 = 2;

/// 论坛话题名称到 message_thread_id 的静态映射
const TOPIC_THREADS: &[(&str, i64)] = &[("Alerts", DEFAULT_THREAD_ID)];

/// createForumTopic 使用的话题图标颜色与表情
const TOPIC_ICON_COLOR: i64 = 13_338_331;
const TOPIC_ICON_EMOJI_ID: &str = "5960716412669399009";

/// 按话题名解析 message_thread_id
fn thread_id_for_topic(name: &str) -> Option<i64> {
    TOPIC_THREADS
        .iter()
        .find(|(topic, _)| *topic == name)
        .map(|(_, id)| *id)
}

// ---------------------------------------------------------------------------
// API 响应模型
// ---------------------------------------------------------------------------

/// Bot API 统一响应信封
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

/// getMe 返回的机器人身份信息，仅用于启动诊断
#[derive(Debug, Clone, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

// ---------------------------------------------------------------------------
// TelegramClient
// ---------------------------------------------------------------------------

/// Telegram Bot API 客户端
///
/// 内部持有单个共享的 `reqwest::Client`，首次调用时创建，
/// `close()` 后再次调用会按需重建。凭证缺失时所有发送操作
/// 直接短路返回失败，不发起网络调用。
pub struct TelegramClient {
    token: Option<String>,
    chat_id: Option<String>,
    api_base: String,
    request_timeout: Duration,
    /// 惰性创建的 HTTP 会话；锁只保护创建与释放，不跨 await 持有
    http: Mutex<Option<Client>>,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
            http: Mutex::new(None),
        }
    }

    /// 机器人凭证是否完整
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }

    /// 获取共享 HTTP 会话，不存在时创建
    ///
    /// 每次出站请求都带超时上限，超时按传输失败处理
    fn ensure_open(&self) -> Client {
        let mut slot = self.http.lock();
        slot.get_or_insert_with(|| {
            info!("Telegram API 的 HTTP 会话已创建");
            Client::builder()
                .timeout(self.request_timeout)
                .user_agent("crm-telegram-bridge/1.0")
                .build()
                .unwrap_or_else(|_| Client::new())
        })
        .clone()
    }

    /// 释放 HTTP 会话；可重复调用，未创建时为 no-op
    pub fn close(&self) {
        let mut slot = self.http.lock();
        if slot.take().is_some() {
            info!("Telegram API 的 HTTP 会话已关闭");
        }
    }

    /// 调用 Bot API 方法，返回响应中的 result 字段
    ///
    /// 统一处理三类失败：传输错误（含超时）、非 2xx 状态码、
    /// 响应体 ok=false。全部记录日志并返回 None。
    /// token 不会出现在日志中。
    async fn call_api(&self, method: &str, payload: Option<Value>) -> Option<Value> {
        let Some(token) = &self.token else {
            warn!(method, "机器人令牌未配置，跳过 Telegram API 调用");
            return None;
        };

        let client = self.ensure_open();
        let url = format!("{}/bot{}/{}", self.api_base, token, method);

        let request = match payload {
            Some(body) => client.post(&url).json(&body),
            None => client.get(&url),
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(method, error = %e, "Telegram API 请求失败");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                method,
                status = status.as_u16(),
                body = %body,
                "Telegram API 返回非成功状态码"
            );
            return None;
        }

        match response.json::<ApiResponse>().await {
            Ok(api) if api.ok => Some(api.result.unwrap_or(Value::Null)),
            Ok(api) => {
                error!(
                    method,
                    error_code = ?api.error_code,
                    description = ?api.description,
                    "Telegram API 调用被拒绝"
                );
                None
            }
            Err(e) => {
                error!(method, error = %e, "Telegram API 响应解析失败");
                None
            }
        }
    }

    /// 发送文本消息
    ///
    /// `thread_id` 指定论坛话题（forum topic）；None 时发送到群组主线程。
    /// 重复调用会产生重复消息——协议层不去重。
    pub async fn send_text(&self, text: &str, thread_id: Option<i64>) -> bool {
        let Some(chat_id) = self.chat_id.clone().filter(|_| self.token.is_some()) else {
            warn!("Telegram 机器人未配置，消息未发送");
            return false;
        };

        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(id) = thread_id {
            payload["message_thread_id"] = json!(id);
        }

        let sent = self.call_api("sendMessage", Some(payload)).await.is_some();
        if sent {
            let preview: String = text.chars().take(50).collect();
            info!(preview = %preview, "消息已发送到 Telegram");
        }
        sent
    }

    /// 发送消息到指定论坛话题
    ///
    /// 话题名通过静态映射解析为 message_thread_id，
    /// 未知话题回退到默认的 Alerts 话题。
    pub async fn send_to_topic(&self, text: &str, topic_name: &str) -> bool {
        let thread_id = thread_id_for_topic(topic_name).unwrap_or(DEFAULT_THREAD_ID);
        self.send_text(text, Some(thread_id)).await
    }

    /// 发送带说明文字的图片
    pub async fn send_photo(&self, photo_url: &str, caption: &str) -> bool {
        let Some(chat_id) = self.chat_id.clone().filter(|_| self.token.is_some()) else {
            warn!("Telegram 机器人未配置，图片未发送");
            return false;
        };

        let payload = json!({
            "chat_id": chat_id,
            "photo": photo_url,
            "caption": caption,
            "parse_mode": "HTML",
        });

        self.call_api("sendPhoto", Some(payload)).await.is_some()
    }

    /// 发送文档
    pub async fn send_document(&self, document_url: &str, caption: &str) -> bool {
        let Some(chat_id) = self.chat_id.clone().filter(|_| self.token.is_some()) else {
            warn!("Telegram 机器人未配置，文档未发送");
            return false;
        };

        let payload = json!({
            "chat_id": chat_id,
            "document": document_url,
            "caption": caption,
        });

        self.call_api("sendDocument", Some(payload)).await.is_some()
    }

    /// 获取机器人身份信息，仅用于启动诊断
    pub async fn get_me(&self) -> Option<BotIdentity> {
        let result = self.call_api("getMe", None).await?;

        match serde_json::from_value::<BotIdentity>(result) {
            Ok(me) => {
                info!(id = me.id, username = ?me.username, "获取机器人信息成功");
                Some(me)
            }
            Err(e) => {
                error!(error = %e, "机器人信息解析失败");
                None
            }
        }
    }

    /// 在群组中创建论坛话题，返回新话题的 message_thread_id
    pub async fn create_forum_topic(&self, name: &str) -> Option<i64> {
        let Some(chat_id) = self.chat_id.clone().filter(|_| self.token.is_some()) else {
            warn!("Telegram 机器人未配置，无法创建话题");
            return None;
        };

        let payload = json!({
            "chat_id": chat_id,
            "name": name,
            "icon_color": TOPIC_ICON_COLOR,
            "icon_custom_emoji_id": TOPIC_ICON_EMOJI_ID,
        });

        let result = self.call_api("createForumTopic", Some(payload)).await?;
        let thread_id = result.get("message_thread_id").and_then(Value::as_i64);

        match thread_id {
            Some(id) => {
                info!(name, thread_id = id, "论坛话题已创建");
                Some(id)
            }
            None => {
                error!(name, "createForumTopic 响应缺少 message_thread_id");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn make_client(api_base: &str) -> TelegramClient {
        TelegramClient::new(&TelegramConfig {
            bot_token: Some("123:ABC".to_string()),
            chat_id: Some("-100200300".to_string()),
            api_base: api_base.to_string(),
            request_timeout_seconds: 5,
        })
    }

    fn make_unconfigured_client(api_base: &str) -> TelegramClient {
        TelegramClient::new(&TelegramConfig {
            bot_token: None,
            chat_id: None,
            api_base: api_base.to_string(),
            request_timeout_seconds: 5,
        })
    }

    const OK_BODY: &str = r#"{"ok":true,"result":{"message_id":1}}"#;

    #[test]
    fn test_thread_id_for_topic() {
        assert_eq!(thread_id_for_topic("Alerts"), Some(2));
        assert_eq!(thread_id_for_topic("Unknown"), None);
    }

    #[tokio::test]
    async fn test_send_text_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": "-100200300",
                "text": "hello",
                "parse_mode": "HTML",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(OK_BODY)
            .create_async()
            .await;

        let client = make_client(&server.url());
        assert!(client.send_text("hello", None).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_text_api_rejection_returns_false() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request"}"#)
            .create_async()
            .await;

        let client = make_client(&server.url());
        assert!(!client.send_text("hello", None).await);
    }

    #[tokio::test]
    async fn test_send_text_http_error_returns_false() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let client = make_client(&server.url());
        assert!(!client.send_text("hello", None).await);
    }

    #[tokio::test]
    async fn test_send_text_transport_error_returns_false() {
        // 无监听端口，连接被拒绝
        let client = make_client("http://127.0.0.1:1");
        assert!(!client.send_text("hello", None).await);
    }

    #[tokio::test]
    async fn test_unconfigured_client_makes_no_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let get_mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = make_unconfigured_client(&server.url());
        assert!(!client.send_text("hello", None).await);
        assert!(!client.send_to_topic("hello", "Alerts").await);
        assert!(!client.send_photo("http://x/p.png", "caption").await);
        assert!(!client.send_document("http://x/d.pdf", "caption").await);
        assert!(client.get_me().await.is_none());
        assert!(client.create_forum_topic("Alerts").await.is_none());

        mock.assert_async().await;
        get_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_to_topic_routes_to_alerts_thread() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .match_body(Matcher::PartialJson(json!({"message_thread_id": 2})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(OK_BODY)
            .expect(2)
            .create_async()
            .await;

        let client = make_client(&server.url());
        assert!(client.send_to_topic("alert!", "Alerts").await);
        // 未知话题名回退到默认话题
        assert!(client.send_to_topic("alert!", "NoSuchTopic").await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_reopens_on_demand() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(OK_BODY)
            .create_async()
            .await;

        let client = make_client(&server.url());
        client.close();
        client.close();

        // close 之后发送会按需重建会话
        assert!(client.send_text("hello", None).await);
        client.close();
    }

    #[tokio::test]
    async fn test_get_me_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/bot123:ABC/getMe")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{"id":42,"username":"crm_bot","first_name":"CRM"}}"#)
            .create_async()
            .await;

        let client = make_client(&server.url());
        let me = client.get_me().await.expect("应返回机器人信息");
        assert_eq!(me.id, 42);
        assert_eq!(me.username.as_deref(), Some("crm_bot"));
    }

    #[tokio::test]
    async fn test_get_me_failure_returns_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/bot123:ABC/getMe")
            .with_status(401)
            .with_body(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#)
            .create_async()
            .await;

        let client = make_client(&server.url());
        assert!(client.get_me().await.is_none());
    }

    #[tokio::test]
    async fn test_send_photo_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:ABC/sendPhoto")
            .match_body(Matcher::PartialJson(json!({
                "photo": "http://x/p.png",
                "caption": "客户合同截图",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(OK_BODY)
            .create_async()
            .await;

        let client = make_client(&server.url());
        assert!(client.send_photo("http://x/p.png", "客户合同截图").await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_forum_topic_returns_thread_id() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:ABC/createForumTopic")
            .match_body(Matcher::PartialJson(json!({"name": "Reports"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{"message_thread_id":7,"name":"Reports"}}"#)
            .create_async()
            .await;

        let client = make_client(&server.url());
        assert_eq!(client.create_forum_topic("Reports").await, Some(7));
    }
}
