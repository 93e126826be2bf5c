// ==========================================
// MacroClaw 摄取管线 - 领域模型层
// ==========================================
// 职责: 定义导出类型与规范行实体
// 红线: 不含数据访问逻辑，不含摄取编排逻辑
// ==========================================

pub mod records;
pub mod types;

// 重导出核心类型
pub use records::{
    DailySummary, ImportHistoryEntry, IngestReport, NutritionEntry, PreparedBatch, ProgramTarget,
    WeightObservation, WorkoutSet,
};
pub use types::{weekday_name, ExportType};
