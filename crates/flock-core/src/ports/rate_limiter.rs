//! RateLimiter port - 外部 API 呼び出し間隔の制御
//!
//! The batch validator calls `wait` before every batch except the first.
//! Swapping in a token bucket only means another implementation here.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn wait(&self);
}

/// Sleeps a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelayLimiter {
    delay: Duration,
}

impl FixedDelayLimiter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl RateLimiter for FixedDelayLimiter {
    async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Never waits. For tests and fixture runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl RateLimiter for NoDelay {
    async fn wait(&self) {}
}
