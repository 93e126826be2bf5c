// ==========================================
// MacroClaw 摄取管线 - 导出类型检测与表头归一化
// ==========================================
// 算法: 固定签名集按优先级求交集，命中即返回
// 顺序敏感: summary 与 nutrition 共享 Calories/Protein，
//           必须先查 summary 专有标记
// ==========================================

use crate::domain::types::ExportType;
use crate::importer::error::{ImportError, ImportResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

// ==========================================
// 表头签名集
// ==========================================
// 同一逻辑导出在 bulk 模式下带单位后缀（"Protein (g)"），
// 在 daily 模式下为裸形式（"Protein"）；签名按归一化后表头匹配

const SUMMARY_SIGNATURES: &[&str] = &["Calorie Target", "Expenditure"];
const WORKOUT_SIGNATURES: &[&str] = &["Exercise Name", "Reps", "Weight"];
const WEIGHT_SIGNATURES: &[&str] = &["Scale Weight", "Trend Weight"];
const NUTRITION_SIGNATURES: &[&str] = &["Calories", "Protein", "Carbs", "Fat"];

/// 检测优先级（见模块头注释）
const DETECTION_ORDER: &[(&[&str], ExportType)] = &[
    (SUMMARY_SIGNATURES, ExportType::Summary),
    (WORKOUT_SIGNATURES, ExportType::Workout),
    (WEIGHT_SIGNATURES, ExportType::Weight),
    (NUTRITION_SIGNATURES, ExportType::Nutrition),
];

// ==========================================
// 表头归一化
// ==========================================

// 尾部括号单位后缀，如 "Calories (kcal)" / "Weight (kg)"
static UNIT_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("单位后缀正则非法"));

/// 去除表头尾部的括号单位后缀（幂等）
///
/// "Protein (g)" -> "Protein"，"Protein" 保持不变
pub fn normalize_header(raw: &str) -> String {
    UNIT_SUFFIX_RE.replace(raw.trim(), "").trim().to_string()
}

// ==========================================
// 导出类型检测
// ==========================================

/// 从归一化表头判定导出类型
///
/// # 返回
/// - Ok(ExportType): 第一个与表头集相交的签名集对应的类型
/// - Err(DetectionFailure): 无任何签名命中，附带原始表头
pub fn detect_export_type(headers: &[String]) -> ImportResult<ExportType> {
    let header_set: HashSet<&str> = headers.iter().map(|h| h.as_str()).collect();

    for (signatures, etype) in DETECTION_ORDER {
        if signatures.iter().any(|sig| header_set.contains(sig)) {
            return Ok(*etype);
        }
    }

    Err(ImportError::DetectionFailure {
        headers: headers.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_strips_unit_suffix() {
        assert_eq!(normalize_header("Protein (g)"), "Protein");
        assert_eq!(normalize_header("Calories (kcal)"), "Calories");
        assert_eq!(normalize_header("  Weight (kg) "), "Weight");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_header("Trend Weight (kg)");
        assert_eq!(normalize_header(&once), once);
        assert_eq!(normalize_header("Protein"), "Protein");
    }

    #[test]
    fn test_detect_each_type() {
        assert_eq!(
            detect_export_type(&headers(&["Date", "Meal", "Calories", "Protein", "Carbs", "Fat"]))
                .unwrap(),
            ExportType::Nutrition
        );
        assert_eq!(
            detect_export_type(&headers(&["Date", "Exercise Name", "Reps", "Weight"])).unwrap(),
            ExportType::Workout
        );
        assert_eq!(
            detect_export_type(&headers(&["Date", "Scale Weight", "Trend Weight"])).unwrap(),
            ExportType::Weight
        );
        assert_eq!(
            detect_export_type(&headers(&["Date", "Calorie Target", "Expenditure"])).unwrap(),
            ExportType::Summary
        );
    }

    #[test]
    fn test_summary_takes_priority_over_nutrition() {
        // summary 表也带 Calories/Protein，summary 专有标记必须先命中
        let h = headers(&["Calories", "Protein", "Calorie Target", "Expenditure"]);
        assert_eq!(detect_export_type(&h).unwrap(), ExportType::Summary);
    }

    #[test]
    fn test_detection_failure_carries_headers() {
        let h = headers(&["Foo", "Bar"]);
        match detect_export_type(&h) {
            Err(ImportError::DetectionFailure { headers }) => {
                assert_eq!(headers, vec!["Foo".to_string(), "Bar".to_string()]);
            }
            other => panic!("期望 DetectionFailure，实际 {:?}", other.map(|t| t.as_str())),
        }
    }

    #[test]
    fn test_suffixed_headers_detect_after_normalization() {
        let raw = ["Date", "Calories (kcal)", "Protein (g)", "Carbs (g)", "Fat (g)"];
        let normalized: Vec<String> = raw.iter().map(|h| normalize_header(h)).collect();
        assert_eq!(detect_export_type(&normalized).unwrap(), ExportType::Nutrition);
    }
}
