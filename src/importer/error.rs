// ==========================================
// MacroClaw 摄取管线 - 摄取层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 摄取层错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 分类与映射错误 =====
    /// 表头不匹配任何已知导出类型；附带原始表头，绝不静默回退
    #[error("无法识别导出类型，表头: {headers:?}（期望 nutrition/workout/weight/summary 导出）")]
    DetectionFailure { headers: Vec<String> },

    #[error("缺少日期字段 (行 {row})")]
    MissingDate { row: usize },

    #[error("日期格式错误 (行 {row}, 字段 {field}): 无法解析 {value}")]
    DateFormatError {
        row: usize,
        field: String,
        value: String,
    },

    #[error("类型转换失败 (行 {row}, 字段 {field}): {message}")]
    TypeConversionError {
        row: usize,
        field: String,
        message: String,
    },

    // ===== 归档错误 =====
    #[error("归档失败: {0}")]
    ArchiveError(String),

    // ===== 下层透传 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
