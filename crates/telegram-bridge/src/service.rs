//! 桥接服务编排
//!
//! 负责启动顺序（Telegram 客户端 → 连接诊断 → Kafka 消费者）、
//! 信号驱动的取消以及退出路径上的资源清理。
//! OS 信号只在这里转换为 watch channel，核心循环不感知信号机制。

use std::sync::Arc;

use crm_shared::config::AppConfig;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::consumer::EventConsumer;
use crate::error::BridgeError;
use crate::telegram::TelegramClient;

/// 桥接服务
///
/// `run()` 会阻塞当前任务直到收到停止信号或启动失败。
pub struct BridgeService {
    config: AppConfig,
}

impl BridgeService {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// 启动服务并阻塞运行
    ///
    /// 凭证缺失时降级为只消费不投递；getMe 诊断失败不阻塞启动；
    /// 消费者订阅失败为致命错误，向上传播。
    /// 无论哪条路径退出，都会先停止消费循环再释放 HTTP 会话。
    pub async fn run(self) -> Result<(), BridgeError> {
        info!(
            service = %self.config.service_name,
            environment = %self.config.environment,
            "启动 Telegram 桥接服务..."
        );

        let telegram = Arc::new(TelegramClient::new(&self.config.telegram));

        if !telegram.is_configured() {
            warn!("Telegram 机器人未配置，事件将被消费后丢弃");
        } else if let Some(me) = telegram.get_me().await {
            info!(bot = ?me.username, "Telegram 连接验证成功");
        } else {
            // 诊断失败不阻塞启动
            warn!("无法获取机器人信息，跳过连接验证");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            // 消费循环可能已自行退出，发送失败可忽略
            let _ = shutdown_tx.send(true);
        });

        let result = consume(&self.config, telegram.clone(), shutdown_rx).await;

        // 消费循环已退出，释放出站 HTTP 会话
        telegram.close();
        info!("资源已清理，服务退出");

        result
    }
}

/// 构造消费者并进入消费循环
///
/// 独立函数保证订阅建立失败时错误也经过 run() 的清理路径。
async fn consume(
    config: &AppConfig,
    telegram: Arc<TelegramClient>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), BridgeError> {
    let consumer = EventConsumer::new(config, telegram)?;
    consumer.run(shutdown).await
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
