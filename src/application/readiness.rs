//! Backend Readiness - 后端就绪状态
//!
//! 启动时记录 `SynthesisBackend::load()` 的结果，供合成请求和健康检查读取

use std::sync::{PoisonError, RwLock};

/// 就绪状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// 尚未加载
    Pending,
    Ready,
    /// 加载失败及原因
    Unavailable(String),
}

/// 后端就绪状态（进程内共享，只在启动时写入）
#[derive(Debug)]
pub struct BackendReadiness {
    state: RwLock<Readiness>,
}

impl BackendReadiness {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Readiness::Pending),
        }
    }

    pub fn ready() -> Self {
        Self {
            state: RwLock::new(Readiness::Ready),
        }
    }

    pub fn mark_ready(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Readiness::Ready;
    }

    pub fn mark_unavailable(&self, reason: impl Into<String>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) =
            Readiness::Unavailable(reason.into());
    }

    pub fn get(&self) -> Readiness {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 不可用原因；就绪时返回 None
    pub fn unavailable_reason(&self) -> Option<String> {
        match self.get() {
            Readiness::Ready => None,
            Readiness::Pending => Some("backend not loaded".to_string()),
            Readiness::Unavailable(reason) => Some(reason),
        }
    }
}

impl Default for BackendReadiness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_is_unavailable() {
        let readiness = BackendReadiness::new();
        assert_eq!(
            readiness.unavailable_reason().as_deref(),
            Some("backend not loaded")
        );
    }

    #[test]
    fn test_transitions() {
        let readiness = BackendReadiness::new();
        readiness.mark_ready();
        assert_eq!(readiness.get(), Readiness::Ready);
        readiness.mark_unavailable("missing api key");
        assert_eq!(
            readiness.unavailable_reason().as_deref(),
            Some("missing api key")
        );
    }
}
