//! Status Queries

/// 查询后端状态
#[derive(Debug, Clone)]
pub struct GetBackendStatus;
