//! Pipeline Run - 单次合成请求的生命周期
//!
//! 状态机：
//! Received → Segmenting → Synthesizing → Assembling → Encoding → Done
//! 任何非终止状态都可以进入 Failed

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// 运行状态错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

/// 运行状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Received,
    Segmenting,
    Synthesizing,
    Assembling,
    Encoding,
    Done,
    /// 失败原因
    Failed(String),
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Received => "received",
            RunState::Segmenting => "segmenting",
            RunState::Synthesizing => "synthesizing",
            RunState::Assembling => "assembling",
            RunState::Encoding => "encoding",
            RunState::Done => "done",
            RunState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed(_))
    }

    /// 合法的下一个（非失败）状态
    fn next(&self) -> Option<RunState> {
        match self {
            RunState::Received => Some(RunState::Segmenting),
            RunState::Segmenting => Some(RunState::Synthesizing),
            RunState::Synthesizing => Some(RunState::Assembling),
            RunState::Assembling => Some(RunState::Encoding),
            RunState::Encoding => Some(RunState::Done),
            RunState::Done | RunState::Failed(_) => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Failed(reason) => write!(f, "failed({})", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// 一次合成运行
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub id: Uuid,
    pub state: RunState,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub segment_count: usize,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Received,
            created_at: Utc::now(),
            completed_at: None,
            segment_count: 0,
        }
    }

    /// 前进到下一个状态
    pub fn advance(&mut self, to: RunState) -> Result<(), RunError> {
        match self.state.next() {
            Some(next) if next == to => {
                tracing::debug!(run_id = %self.id, from = self.state.as_str(), to = to.as_str(), "Run state changed");
                if to.is_terminal() {
                    self.completed_at = Some(Utc::now());
                }
                self.state = to;
                Ok(())
            }
            _ => Err(RunError::InvalidTransition {
                from: self.state.as_str(),
                to: to.as_str(),
            }),
        }
    }

    /// 标记为失败
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), RunError> {
        if self.state.is_terminal() {
            return Err(RunError::InvalidTransition {
                from: self.state.as_str(),
                to: "failed",
            });
        }
        self.state = RunState::Failed(reason.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// 运行耗时（毫秒）
    pub fn elapsed_ms(&self) -> i64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.created_at).num_milliseconds()
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut run = PipelineRun::new();
        for state in [
            RunState::Segmenting,
            RunState::Synthesizing,
            RunState::Assembling,
            RunState::Encoding,
            RunState::Done,
        ] {
            run.advance(state).unwrap();
        }
        assert_eq!(run.state, RunState::Done);
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn test_skipping_states_rejected() {
        let mut run = PipelineRun::new();
        let err = run.advance(RunState::Assembling).unwrap_err();
        assert_eq!(
            err,
            RunError::InvalidTransition {
                from: "received",
                to: "assembling"
            }
        );
        assert_eq!(run.state, RunState::Received);
    }

    #[test]
    fn test_fail_from_any_non_terminal_state() {
        let mut run = PipelineRun::new();
        run.advance(RunState::Segmenting).unwrap();
        run.advance(RunState::Synthesizing).unwrap();
        run.fail("segment 1 failed").unwrap();
        assert_eq!(run.state.to_string(), "failed(segment 1 failed)");
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut run = PipelineRun::new();
        run.fail("boom").unwrap();
        assert!(run.fail("again").is_err());
        assert!(run.advance(RunState::Segmenting).is_err());
    }
}
