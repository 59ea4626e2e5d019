//! 片段级重试策略
//!
//! 默认不重试（fail-fast）；配置 `max_retries > 0` 后，对可重试的后端错误做指数退避

use std::time::Duration;

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 首次失败后的最大重试次数，0 表示失败即终止
    pub max_retries: u32,
    /// 初始退避
    pub initial_backoff: Duration,
    /// 退避上限（同时限制服务端给出的 Retry-After）
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn fail_fast() -> Self {
        Self::default()
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 第 `attempt` 次失败（从 1 开始）后是否还能重试
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// 第 `attempt` 次失败后的等待时间
    ///
    /// 服务端给出的 `hint`（如 Retry-After）优先，但不超过 `max_backoff`
    pub fn backoff(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint.min(self.max_backoff);
        }
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }
}
