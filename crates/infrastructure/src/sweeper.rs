//! 过期消息清扫任务
//!
//! 固定周期调用消息服务的清扫。失败不会终止任务，由下一个周期重试。

use std::sync::Arc;
use std::time::Duration;

use application::MessageService;

pub struct MessageSweeper {
    service: Arc<MessageService>,
    interval: Duration,
}

impl MessageSweeper {
    pub fn new(service: Arc<MessageService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// 清扫循环。作为独立任务 spawn，随进程退出。
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval_secs = self.interval.as_secs(), "message sweeper started");
        loop {
            ticker.tick().await;
            let deleted = self.service.sweep().await;
            if deleted > 0 {
                tracing::debug!(deleted, "sweep cycle finished");
            }
        }
    }
}
