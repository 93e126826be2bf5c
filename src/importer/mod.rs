// ==========================================
// MacroClaw 摄取管线 - 摄取层
// ==========================================
// 职责: 外部导出文件 -> 规范表
// 流程: 解析 -> 归一化/检测 -> 准备 -> 去重/upsert -> 归档
// ==========================================

// 模块声明
pub mod bulk;
pub mod detect;
pub mod engine;
pub mod error;
pub mod prepare;
pub mod workbook;

// 重导出核心类型
pub use bulk::{is_bulk_workbook, resolve_target_values, BULK_SHEET_NAMES};
pub use detect::{detect_export_type, normalize_header};
pub use engine::{file_sha256, IngestEngine};
pub use error::{ImportError, ImportResult};
pub use prepare::prepare_batch;
pub use workbook::RawSheet;
