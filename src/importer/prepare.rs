// ==========================================
// MacroClaw 摄取管线 - 行准备器
// ==========================================
// 职责: 归一化工作表 -> 规范行结构的纯转换
// 契约: 已识别表头重命名为规范列；营养表未识别表头
//       无损序列化进 food_details；主键类目字段缺失
//       填 "Unknown"；每行打上来源与导入时间戳
// ==========================================

use crate::domain::records::{
    DailySummary, NutritionEntry, PreparedBatch, ProgramTarget, WeightObservation, WorkoutSet,
};
use crate::domain::types::ExportType;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::workbook::RawSheet;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};

/// 主键类目字段缺失时的占位值
const UNKNOWN: &str = "Unknown";

/// 营养表的已识别表头；此外的列进入 food_details
const NUTRITION_KNOWN_HEADERS: &[&str] = &[
    "Date", "Meal", "Calories", "Protein", "Carbs", "Fat", "Fiber", "Sodium", "Food Name", "Name",
];

// ==========================================
// 入口: 按导出类型穷尽分派
// ==========================================

/// 把一张归一化工作表准备为对应类型的规范行批
///
/// 每个 ExportType 变体都有对应准备器，match 穷尽保证
/// 不存在"未注册类型"这种运行时状态
pub fn prepare_batch(
    etype: ExportType,
    sheet: &RawSheet,
    source: &str,
) -> ImportResult<PreparedBatch> {
    match etype {
        ExportType::Nutrition => Ok(PreparedBatch::Nutrition(prepare_nutrition(sheet, source)?)),
        ExportType::Workout => Ok(PreparedBatch::Workout(prepare_workouts(sheet, source)?)),
        ExportType::Weight => Ok(PreparedBatch::Weight(prepare_weight(sheet, source)?)),
        ExportType::Summary => Ok(PreparedBatch::Summary(prepare_summary(sheet, source)?)),
    }
}

/// 导入时间戳（整批共用一个墙钟时刻）
pub fn import_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

// ==========================================
// 各类型准备器
// ==========================================

/// 营养记录准备器
pub fn prepare_nutrition(sheet: &RawSheet, source: &str) -> ImportResult<Vec<NutritionEntry>> {
    let stamp = import_stamp();
    let mut out = Vec::with_capacity(sheet.rows.len());

    for (idx, row) in sheet.rows.iter().enumerate() {
        let row_number = idx + 1;
        let date = parse_required_date(row, &["Date"], "Date", row_number)?;

        // 未识别表头的键值对无损保留为 JSON 文本
        let extras: BTreeMap<&str, &str> = row
            .iter()
            .filter(|(k, v)| !NUTRITION_KNOWN_HEADERS.contains(&k.as_str()) && !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let food_details = if extras.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&extras).map_err(anyhow::Error::new)?)
        };

        out.push(NutritionEntry {
            date,
            meal: get_string(row, &["Meal"]).unwrap_or_else(|| UNKNOWN.to_string()),
            calories: parse_f64(row, &["Calories"], "Calories", row_number)?,
            protein_g: parse_f64(row, &["Protein"], "Protein", row_number)?,
            carbs_g: parse_f64(row, &["Carbs"], "Carbs", row_number)?,
            fat_g: parse_f64(row, &["Fat"], "Fat", row_number)?,
            fiber_g: parse_f64(row, &["Fiber"], "Fiber", row_number)?,
            sodium_mg: parse_f64(row, &["Sodium"], "Sodium", row_number)?,
            food_name: get_string(row, &["Food Name", "Name"])
                .unwrap_or_else(|| UNKNOWN.to_string()),
            food_details,
            source: source.to_string(),
            imported_at: stamp.clone(),
        });
    }

    Ok(out)
}

/// 训练组准备器
pub fn prepare_workouts(sheet: &RawSheet, source: &str) -> ImportResult<Vec<WorkoutSet>> {
    let stamp = import_stamp();
    let mut out = Vec::with_capacity(sheet.rows.len());

    for (idx, row) in sheet.rows.iter().enumerate() {
        let row_number = idx + 1;
        let date = parse_required_date(row, &["Date"], "Date", row_number)?;

        // 源数据缺组号时取批内 1 起始序号，保证主键非空
        let set_number = parse_i64(row, &["Set Number", "Set"], "Set Number", row_number)?
            .unwrap_or(row_number as i64);

        out.push(WorkoutSet {
            date,
            workout_name: get_string(row, &["Workout Name"]),
            duration_min: parse_f64(row, &["Duration"], "Duration", row_number)?,
            exercise_name: get_string(row, &["Exercise Name"])
                .unwrap_or_else(|| UNKNOWN.to_string()),
            set_number,
            reps: parse_i64(row, &["Reps"], "Reps", row_number)?,
            weight_kg: parse_f64(row, &["Weight"], "Weight", row_number)?,
            rpe: parse_f64(row, &["RPE"], "RPE", row_number)?,
            notes: get_string(row, &["Notes"]),
            source: source.to_string(),
            imported_at: stamp.clone(),
        });
    }

    Ok(out)
}

/// 体重观测准备器
pub fn prepare_weight(sheet: &RawSheet, source: &str) -> ImportResult<Vec<WeightObservation>> {
    let stamp = import_stamp();
    let mut out = Vec::with_capacity(sheet.rows.len());

    for (idx, row) in sheet.rows.iter().enumerate() {
        let row_number = idx + 1;
        out.push(WeightObservation {
            date: parse_required_date(row, &["Date"], "Date", row_number)?,
            scale_weight_kg: parse_f64(row, &["Scale Weight"], "Scale Weight", row_number)?,
            trend_weight_kg: parse_f64(row, &["Trend Weight"], "Trend Weight", row_number)?,
            source: source.to_string(),
            imported_at: stamp.clone(),
        });
    }

    Ok(out)
}

/// 每日汇总准备器
pub fn prepare_summary(sheet: &RawSheet, source: &str) -> ImportResult<Vec<DailySummary>> {
    let stamp = import_stamp();
    let mut out = Vec::with_capacity(sheet.rows.len());

    for (idx, row) in sheet.rows.iter().enumerate() {
        let row_number = idx + 1;
        out.push(DailySummary {
            date: parse_required_date(row, &["Date"], "Date", row_number)?,
            total_calories: parse_f64(row, &["Calories", "Total Calories"], "Calories", row_number)?,
            total_protein_g: parse_f64(row, &["Protein", "Total Protein"], "Protein", row_number)?,
            total_carbs_g: parse_f64(row, &["Carbs", "Total Carbs"], "Carbs", row_number)?,
            total_fat_g: parse_f64(row, &["Fat", "Total Fat"], "Fat", row_number)?,
            calorie_target: parse_f64(row, &["Calorie Target"], "Calorie Target", row_number)?,
            protein_target_g: parse_f64(row, &["Protein Target"], "Protein Target", row_number)?,
            expenditure_kcal: parse_f64(row, &["Expenditure"], "Expenditure", row_number)?,
            source: source.to_string(),
            imported_at: stamp.clone(),
        });
    }

    Ok(out)
}

/// 营养计划表准备器（bulk 目标解析的输入）
///
/// 计划更新日期在导出中为 DD/MM/YYYY
pub fn prepare_program_targets(sheet: &RawSheet) -> ImportResult<Vec<ProgramTarget>> {
    let mut out = Vec::with_capacity(sheet.rows.len());

    for (idx, row) in sheet.rows.iter().enumerate() {
        let row_number = idx + 1;
        out.push(ProgramTarget {
            update_date: parse_required_date(
                row,
                &["Program Update Date"],
                "Program Update Date",
                row_number,
            )?,
            weekday: get_string(row, &["Program Weekday"]).unwrap_or_else(|| UNKNOWN.to_string()),
            calories: parse_f64(row, &["Calories"], "Calories", row_number)?,
            protein_g: parse_f64(row, &["Protein"], "Protein", row_number)?,
        });
    }

    Ok(out)
}

// ==========================================
// 字段提取辅助
// ==========================================

/// 提取字符串字段，按别名顺序取第一个非空值
pub(crate) fn get_string(row: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(v) = row.get(*key) {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// 解析浮点数（空值 -> None，非法值 -> 类型转换错误）
fn parse_f64(
    row: &HashMap<String, String>,
    keys: &[&str],
    field: &str,
    row_number: usize,
) -> ImportResult<Option<f64>> {
    match get_string(row, keys) {
        None => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ImportError::TypeConversionError {
                row: row_number,
                field: field.to_string(),
                message: format!("无法解析为浮点数: {}", value),
            }),
    }
}

/// 解析整数；Excel 数值单元格可能渲染为浮点形式，
/// 小数部分为零时截断接受
fn parse_i64(
    row: &HashMap<String, String>,
    keys: &[&str],
    field: &str,
    row_number: usize,
) -> ImportResult<Option<i64>> {
    match get_string(row, keys) {
        None => Ok(None),
        Some(value) => {
            if let Ok(n) = value.parse::<i64>() {
                return Ok(Some(n));
            }
            match value.parse::<f64>() {
                Ok(f) if f.fract() == 0.0 => Ok(Some(f as i64)),
                _ => Err(ImportError::TypeConversionError {
                    row: row_number,
                    field: field.to_string(),
                    message: format!("无法解析为整数: {}", value),
                }),
            }
        }
    }
}

/// 解析必填日期字段
fn parse_required_date(
    row: &HashMap<String, String>,
    keys: &[&str],
    field: &str,
    row_number: usize,
) -> ImportResult<NaiveDate> {
    match get_string(row, keys) {
        None => Err(ImportError::MissingDate { row: row_number }),
        Some(value) => parse_date_value(&value).ok_or_else(|| ImportError::DateFormatError {
            row: row_number,
            field: field.to_string(),
            value,
        }),
    }
}

/// 多格式日期解析
///
/// 依次尝试 ISO 日期、DD/MM/YYYY、ISO 日期时间，
/// 最后回退 Excel 序列日期（1899-12-30 起算天数）
pub(crate) fn parse_date_value(value: &str) -> Option<NaiveDate> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }

    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(v, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(dt.date());
        }
    }

    if let Ok(serial) = v.parse::<f64>() {
        // 合理区间约 1954..2064 年，避免把普通数值误判为日期
        if (20000.0..60000.0).contains(&serial) {
            let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
            return base.checked_add_signed(chrono::Duration::days(serial.trunc() as i64));
        }
    }

    None
}
