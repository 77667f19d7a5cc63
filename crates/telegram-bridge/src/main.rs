//! Telegram 桥接服务入口
//!
//! 消费 crm-msgAccepted topic 的 CRM 事件并投递到 Telegram 群组。

use crm_shared::config::{AppConfig, ObservabilityConfig};
use telegram_bridge::service::BridgeService;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("telegram-bridge").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    init_tracing(&config.observability);

    // 启动失败（如 Kafka 订阅无法建立）向上传播，进程以非零状态退出
    BridgeService::new(config).run().await?;

    Ok(())
}

/// 初始化日志输出
///
/// RUST_LOG 优先于配置文件中的 log_level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
