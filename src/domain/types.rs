// ==========================================
// MacroClaw 摄取管线 - 领域类型定义
// ==========================================
// 职责: 导出类型枚举与周名映射
// ==========================================

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 导出类型 (Export Type)
// ==========================================
// 封闭枚举: 每个变体对应一张规范表和一个行准备器
// 序列化格式: 小写 (与 export_history.export_type 一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    Nutrition, // 逐餐营养记录 -> nutrition_log
    Workout,   // 训练组记录 -> workouts
    Weight,    // 体重观测 -> weight_log
    Summary,   // 每日宏量汇总 -> daily_summary
}

impl ExportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportType::Nutrition => "nutrition",
            ExportType::Workout => "workout",
            ExportType::Weight => "weight",
            ExportType::Summary => "summary",
        }
    }

    /// 全部导出类型（检测优先级顺序见 importer::detect）
    pub fn all() -> [ExportType; 4] {
        [
            ExportType::Nutrition,
            ExportType::Workout,
            ExportType::Weight,
            ExportType::Summary,
        ]
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nutrition" => Ok(ExportType::Nutrition),
            "workout" => Ok(ExportType::Workout),
            "weight" => Ok(ExportType::Weight),
            "summary" => Ok(ExportType::Summary),
            other => Err(format!("未知导出类型: {}", other)),
        }
    }
}

// ==========================================
// 周名映射 (Weekday Name)
// ==========================================
// 营养计划表按英文周名存储目标值，与 chrono::Weekday 对齐
pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
