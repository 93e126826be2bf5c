// ==========================================
// MacroClaw 摄取管线 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + calamine
// 定位: MacroFactor 导出数据的去重入库与查询
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 摄取层 - 外部导出文件
pub mod importer;

// API 层 - 读取接口
pub mod api;

// 配置层 - 管线配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    DailySummary, ExportType, ImportHistoryEntry, IngestReport, NutritionEntry, PreparedBatch,
    ProgramTarget, WeightObservation, WorkoutSet,
};

// 摄取引擎
pub use importer::{ImportError, ImportResult, IngestEngine};

// 存储与查询
pub use api::QueryApi;
pub use repository::{JsonRow, RepositoryError, RepositoryResult, Store};

// 配置
pub use config::PipelineConfig;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "MacroClaw";
