// ==========================================
// MacroClaw 摄取管线 - 规范行实体
// ==========================================
// 职责: 定义五张规范表对应的强类型行结构
// 红线: 不含数据访问逻辑，由 importer::prepare 纯转换产出
// ==========================================

use crate::domain::types::ExportType;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

// ==========================================
// NutritionEntry - 逐餐营养记录
// ==========================================
/// nutrition_log 表的一行
///
/// 主键: (date, meal, food_name)，meal/food_name 缺失时由准备器
/// 填充 "Unknown" 以满足 NOT NULL 约束
#[derive(Debug, Clone, PartialEq)]
pub struct NutritionEntry {
    pub date: NaiveDate,
    pub meal: String,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub food_name: String,
    /// 未映射表头的无损 JSON 序列化（不单独可查，但不丢信息）
    pub food_details: Option<String>,
    pub source: String,
    pub imported_at: String,
}

// ==========================================
// WorkoutSet - 训练组记录
// ==========================================
/// workouts 表的一行，主键 (date, exercise_name, set_number)
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSet {
    pub date: NaiveDate,
    pub workout_name: Option<String>,
    pub duration_min: Option<f64>,
    pub exercise_name: String,
    /// 源数据缺失时取批内 1 起始序号
    pub set_number: i64,
    pub reps: Option<i64>,
    pub weight_kg: Option<f64>,
    pub rpe: Option<f64>,
    pub notes: Option<String>,
    pub source: String,
    pub imported_at: String,
}

// ==========================================
// WeightObservation - 体重观测
// ==========================================
/// weight_log 表的一行，主键 date
///
/// 秤重与趋势值允许单边缺失（bulk 导出外连接合并的结果）
#[derive(Debug, Clone, PartialEq)]
pub struct WeightObservation {
    pub date: NaiveDate,
    pub scale_weight_kg: Option<f64>,
    pub trend_weight_kg: Option<f64>,
    pub source: String,
    pub imported_at: String,
}

// ==========================================
// DailySummary - 每日宏量汇总
// ==========================================
/// daily_summary 表的一行，主键 date
///
/// 各字段由多张 bulk 工作表分步填充：宏量表建行，
/// Expenditure 表补 expenditure_kcal，计划表补目标值
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_calories: Option<f64>,
    pub total_protein_g: Option<f64>,
    pub total_carbs_g: Option<f64>,
    pub total_fat_g: Option<f64>,
    pub calorie_target: Option<f64>,
    pub protein_target_g: Option<f64>,
    pub expenditure_kcal: Option<f64>,
    pub source: String,
    pub imported_at: String,
}

// ==========================================
// ProgramTarget - 营养计划条目
// ==========================================
/// Nutrition Program Settings 工作表的一行：
/// 自 update_date 起生效的周模式中某一天的目标值
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramTarget {
    pub update_date: NaiveDate,
    pub weekday: String,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
}

// ==========================================
// ImportHistoryEntry - 导入历史
// ==========================================
/// export_history 表的一行，file_hash 为唯一去重键
#[derive(Debug, Clone)]
pub struct ImportHistoryEntry {
    pub id: String,
    pub export_type: String,
    pub file_path: String,
    pub file_hash: String,
    pub rows_imported: usize,
    pub imported_at: String,
}

// ==========================================
// PreparedBatch - 按类型准备完成的行集
// ==========================================
/// 行准备器的输出：每个导出类型恰好一个变体，
/// 落库时按变体穷尽分派到对应表
#[derive(Debug, Clone)]
pub enum PreparedBatch {
    Nutrition(Vec<NutritionEntry>),
    Workout(Vec<WorkoutSet>),
    Weight(Vec<WeightObservation>),
    Summary(Vec<DailySummary>),
}

impl PreparedBatch {
    pub fn export_type(&self) -> ExportType {
        match self {
            PreparedBatch::Nutrition(_) => ExportType::Nutrition,
            PreparedBatch::Workout(_) => ExportType::Workout,
            PreparedBatch::Weight(_) => ExportType::Weight,
            PreparedBatch::Summary(_) => ExportType::Summary,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PreparedBatch::Nutrition(rows) => rows.len(),
            PreparedBatch::Workout(rows) => rows.len(),
            PreparedBatch::Weight(rows) => rows.len(),
            PreparedBatch::Summary(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ==========================================
// IngestReport - 单文件摄取结果
// ==========================================
/// ingest 入口的返回值，面向 watcher/CLI 协作方
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub export_type: String,
    pub rows_imported: usize,
    pub file_hash: String,
    pub file_path: String,
    /// 内容哈希命中历史记录时为 true（正常跳过，非错误）
    pub skipped: bool,
    /// bulk 导入时按域拆分的行数明细
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_breakdown: Option<BTreeMap<String, usize>>,
}
