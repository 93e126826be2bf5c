// ==========================================
// MacroClaw 摄取管线 - API 层错误类型
// ==========================================
// 职责: 校验入参，转换仓储错误
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
