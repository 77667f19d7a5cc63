//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Kafka 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: String,
    /// 订阅的事件 topic
    pub topic: String,
    pub consumer_group: String,
    pub auto_offset_reset: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "kafka:29092".to_string(),
            topic: "crm-msgAccepted".to_string(),
            consumer_group: "telegram_bot_group".to_string(),
            auto_offset_reset: "earliest".to_string(),
        }
    }
}

/// Telegram Bot API 配置
///
/// token 与 chat_id 均无默认值——缺失时服务降级为只消费不投递，
/// 由上层记录警告而非直接失败。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
    /// 每次出站请求的超时上限（秒），超时按传输失败处理
    pub request_timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub kafka: KafkaConfig,
    pub telegram: TelegramConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（CRM_ 前缀，如 CRM_KAFKA__BROKERS -> kafka.brokers）
    /// 5. docker-compose 注入的扁平环境变量（KAFKA_BROKERS、TELEGRAM_BOT_TOKEN 等）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("CRM_ENV").unwrap_or_else(|_| "development".to_string());

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            // 默认配置
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            // 加载默认配置文件
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            // 加载环境特定配置
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false),
            )
            // 加载服务特定配置（如 telegram-bridge.toml）
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            // 环境变量覆盖（CRM_KAFKA__BROKERS -> kafka.brokers）
            .add_source(
                Environment::with_prefix("CRM")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        config.apply_flat_env_overrides();

        Ok(config)
    }

    /// 应用部署环境注入的扁平环境变量
    ///
    /// docker-compose 以 KAFKA_BROKERS、TELEGRAM_BOT_TOKEN 这类不带
    /// 前缀的变量下发配置，在文件配置之后逐项覆盖。
    fn apply_flat_env_overrides(&mut self) {
        if let Ok(brokers) = std::env::var("KAFKA_BROKERS") {
            self.kafka.brokers = brokers;
        }
        if let Ok(topic) = std::env::var("KAFKA_TOPIC") {
            self.kafka.topic = topic;
        }
        if let Ok(group_id) = std::env::var("KAFKA_GROUP_ID") {
            self.kafka.consumer_group = group_id;
        }
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Ok(chat_id) = std::env::var("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
