// ==========================================
// MacroClaw 摄取管线 - 全量导出分解与目标解析
// ==========================================
// 职责: 把多工作表的全历史导出拆分为各域数据集，
//       并按时点语义解析历史热量/蛋白质目标
// 容错: 单张工作表缺失或异常仅告警并贡献 0 行，
//       不中止整个导入
// ==========================================

use crate::domain::records::{ProgramTarget, WeightObservation};
use crate::domain::types::weekday_name;
use crate::importer::error::ImportResult;
use crate::importer::prepare::{
    self, get_string, import_stamp, parse_date_value, prepare_program_targets,
};
use crate::importer::workbook::{self, RawSheet};
use crate::repository::ingest_repo;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

// ==========================================
// 已知 bulk 工作表
// ==========================================

pub const SHEET_MACROS: &str = "Calories & Macros";
pub const SHEET_SCALE: &str = "Scale Weight";
pub const SHEET_TREND: &str = "Weight Trend";
pub const SHEET_EXPENDITURE: &str = "Expenditure";
pub const SHEET_PROGRAM: &str = "Nutrition Program Settings";

/// 工作表名与已知集合相交即判定为 bulk 导出
pub const BULK_SHEET_NAMES: &[&str] = &[
    SHEET_MACROS,
    SHEET_SCALE,
    SHEET_TREND,
    SHEET_EXPENDITURE,
    SHEET_PROGRAM,
];

pub fn is_bulk_workbook(sheet_names: &[String]) -> bool {
    sheet_names
        .iter()
        .any(|name| BULK_SHEET_NAMES.contains(&name.as_str()))
}

// ==========================================
// bulk 摄取主流程
// ==========================================

/// 处理一个全历史（bulk）导出工作簿
///
/// 在调用方事务内逐表写入，返回按域拆分的行数明细；
/// 明细之和即记入历史的总行数
///
/// # 参数
/// - conn: 事务内连接
/// - path: 工作簿路径
/// - source: 来源文件显示名
pub fn ingest_bulk(
    conn: &Connection,
    path: &Path,
    source: &str,
) -> ImportResult<BTreeMap<String, usize>> {
    let mut stats: BTreeMap<String, usize> = BTreeMap::new();

    // --- Calories & Macros -> daily_summary --------------------------------
    match workbook::read_sheet(path, SHEET_MACROS) {
        Ok(sheet) if !sheet.rows.is_empty() => {
            match prepare::prepare_summary(&sheet, source) {
                Ok(rows) => {
                    let n = ingest_repo::upsert_summary(conn, &rows)?;
                    stats.insert("summary".to_string(), n);
                }
                Err(e) => warn!(sheet = SHEET_MACROS, error = %e, "跳过工作表"),
            }
        }
        Ok(_) => debug!(sheet = SHEET_MACROS, "工作表为空"),
        Err(e) => warn!(sheet = SHEET_MACROS, error = %e, "跳过工作表"),
    }

    // --- Scale Weight + Weight Trend -> weight_log（按日期外连接） ----------
    let scale = match workbook::read_sheet(path, SHEET_SCALE) {
        // bulk 导出把秤重列命名为 "Weight (kg)"，归一化后为 "Weight"
        Ok(sheet) => weight_series(&sheet, &["Scale Weight", "Weight"], false),
        Err(e) => {
            warn!(sheet = SHEET_SCALE, error = %e, "跳过工作表");
            Vec::new()
        }
    };
    let trend = match workbook::read_sheet(path, SHEET_TREND) {
        Ok(sheet) => weight_series(&sheet, &["Trend Weight"], true),
        Err(e) => {
            warn!(sheet = SHEET_TREND, error = %e, "跳过工作表");
            Vec::new()
        }
    };

    if !scale.is_empty() || !trend.is_empty() {
        let rows = merge_weight_series(&scale, &trend, source);
        let n = ingest_repo::upsert_weight(conn, &rows)?;
        stats.insert("weight".to_string(), n);
    }

    // --- Expenditure -> 回填 daily_summary.expenditure_kcal -----------------
    match workbook::read_sheet(path, SHEET_EXPENDITURE) {
        Ok(sheet) if sheet.headers.iter().any(|h| h == "Expenditure") => {
            let mut updates = 0usize;
            for (idx, row) in sheet.rows.iter().enumerate() {
                let Some(date) =
                    get_string(row, &["Date"]).and_then(|v| parse_date_value(&v))
                else {
                    warn!(sheet = SHEET_EXPENDITURE, row = idx + 1, "日期缺失或非法，跳过行");
                    continue;
                };
                let Some(kcal) =
                    get_string(row, &["Expenditure"]).and_then(|v| v.parse::<f64>().ok())
                else {
                    continue;
                };
                ingest_repo::update_expenditure(conn, date, kcal)?;
                updates += 1;
            }
            if updates > 0 {
                stats.insert("expenditure_updates".to_string(), updates);
            }
        }
        Ok(_) => debug!(sheet = SHEET_EXPENDITURE, "缺少 Expenditure 列或工作表为空"),
        Err(e) => warn!(sheet = SHEET_EXPENDITURE, error = %e, "跳过工作表"),
    }

    // --- Nutrition Program Settings -> 历史目标解析 -------------------------
    match workbook::read_sheet(path, SHEET_PROGRAM) {
        Ok(sheet) if !sheet.rows.is_empty() => match program_targets_checked(&sheet) {
            Some(programs) => {
                let updated = apply_targets(conn, &programs)?;
                stats.insert("target_updates".to_string(), updated);
            }
            None => {}
        },
        Ok(_) => debug!(sheet = SHEET_PROGRAM, "工作表为空"),
        Err(e) => warn!(sheet = SHEET_PROGRAM, error = %e, "跳过工作表"),
    }

    info!(?stats, "bulk 导入各工作表处理完成");
    Ok(stats)
}

/// 校验计划表必需列并准备条目；缺列时告警返回 None
fn program_targets_checked(sheet: &RawSheet) -> Option<Vec<ProgramTarget>> {
    const REQUIRED: &[&str] = &["Program Update Date", "Program Weekday", "Calories", "Protein"];
    let missing: Vec<&str> = REQUIRED
        .iter()
        .filter(|col| !sheet.headers.iter().any(|h| h == *col))
        .copied()
        .collect();
    if !missing.is_empty() {
        warn!(sheet = SHEET_PROGRAM, ?missing, "计划表缺少必需列");
        return None;
    }

    match prepare_program_targets(sheet) {
        Ok(programs) => Some(programs),
        Err(e) => {
            warn!(sheet = SHEET_PROGRAM, error = %e, "跳过工作表");
            None
        }
    }
}

// ==========================================
// 体重序列提取与外连接
// ==========================================

/// 从工作表提取 (日期, 数值) 序列
///
/// 数值列按别名取第一个命中；sole_column_fallback 时
/// 回退为首个非 Date 列（趋势表的列名随导出版本漂移）
fn weight_series(
    sheet: &RawSheet,
    aliases: &[&str],
    sole_column_fallback: bool,
) -> Vec<(NaiveDate, f64)> {
    let value_header = aliases
        .iter()
        .find(|a| sheet.headers.iter().any(|h| h == *a))
        .map(|a| a.to_string())
        .or_else(|| {
            if sole_column_fallback {
                sheet
                    .headers
                    .iter()
                    .find(|h| h.as_str() != "Date" && !h.is_empty())
                    .cloned()
            } else {
                None
            }
        });

    let Some(value_header) = value_header else {
        warn!(sheet = %sheet.name, "未找到体重数值列");
        return Vec::new();
    };

    let mut series = Vec::new();
    for (idx, row) in sheet.rows.iter().enumerate() {
        let Some(date) = get_string(row, &["Date"]).and_then(|v| parse_date_value(&v)) else {
            warn!(sheet = %sheet.name, row = idx + 1, "日期缺失或非法，跳过行");
            continue;
        };
        let Some(raw) = get_string(row, &[value_header.as_str()]) else {
            continue;
        };
        match raw.parse::<f64>() {
            Ok(v) => series.push((date, v)),
            Err(_) => {
                warn!(sheet = %sheet.name, row = idx + 1, value = %raw, "体重数值非法，跳过行")
            }
        }
    }
    series
}

/// 秤重与趋势序列按日期外连接
///
/// 仅出现在一侧的日期仍产出观测行，另一字段为 None
fn merge_weight_series(
    scale: &[(NaiveDate, f64)],
    trend: &[(NaiveDate, f64)],
    source: &str,
) -> Vec<WeightObservation> {
    let mut merged: BTreeMap<NaiveDate, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for &(date, v) in scale {
        merged.entry(date).or_default().0 = Some(v);
    }
    for &(date, v) in trend {
        merged.entry(date).or_default().1 = Some(v);
    }

    let stamp = import_stamp();
    merged
        .into_iter()
        .map(|(date, (scale_weight_kg, trend_weight_kg))| WeightObservation {
            date,
            scale_weight_kg,
            trend_weight_kg,
            source: source.to_string(),
            imported_at: stamp.clone(),
        })
        .collect()
}

// ==========================================
// 历史目标解析（时点连接）
// ==========================================

/// 对 daily_summary 中每个日期解析当日生效的目标并回填
///
/// 返回实际更新的行数
fn apply_targets(conn: &Connection, programs: &[ProgramTarget]) -> ImportResult<usize> {
    let summary_dates = ingest_repo::summary_dates(conn)?;
    let resolved = resolve_target_values(&summary_dates, programs);

    let mut updated = 0usize;
    for (date, calories, protein) in resolved {
        updated += ingest_repo::update_targets(conn, date, calories, protein)?;
    }
    info!(updated, "daily_summary 目标值回填完成");
    Ok(updated)
}

/// 时点目标解析核心
///
/// 计划表以 (更新日期, 周名) 存周模式：一次更新自其日期起
/// 生效，直至被更晚的更新取代。对每个 summary 日期：
/// (a) 取周名；(b) 在升序更新日期上归并推进，找最近一次
/// <= 该日期的更新；(c) 查 (生效更新, 周名)；(d) 命中则产出
/// 目标值。早于一切更新的日期不产出
///
/// 同一 (更新日期, 周名) 出现多行时，表内后行覆盖前行
pub fn resolve_target_values(
    summary_dates: &[NaiveDate],
    programs: &[ProgramTarget],
) -> Vec<(NaiveDate, Option<f64>, Option<f64>)> {
    let mut lookup: HashMap<(NaiveDate, &str), (Option<f64>, Option<f64>)> = HashMap::new();
    for p in programs {
        lookup.insert((p.update_date, p.weekday.as_str()), (p.calories, p.protein_g));
    }

    let mut update_dates: Vec<NaiveDate> = programs.iter().map(|p| p.update_date).collect();
    update_dates.sort_unstable();
    update_dates.dedup();

    let mut dates: Vec<NaiveDate> = summary_dates.to_vec();
    dates.sort_unstable();

    // 双有序序列归并: active_idx 指向首个 > 当前日期的更新
    let mut resolved = Vec::new();
    let mut active_idx = 0usize;
    for date in dates {
        while active_idx < update_dates.len() && update_dates[active_idx] <= date {
            active_idx += 1;
        }
        if active_idx == 0 {
            // 该日期早于最早的计划更新，无目标可解析
            continue;
        }
        let active_update = update_dates[active_idx - 1];
        if let Some(&(calories, protein)) = lookup.get(&(active_update, weekday_name(date))) {
            resolved.push((date, calories, protein));
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn program(update: &str, weekday: &str, calories: f64, protein: f64) -> ProgramTarget {
        ProgramTarget {
            update_date: date(update),
            weekday: weekday.to_string(),
            calories: Some(calories),
            protein_g: Some(protein),
        }
    }

    #[test]
    fn test_is_bulk_workbook() {
        let bulk = vec!["Calories & Macros".to_string(), "Expenditure".to_string()];
        let single = vec!["Sheet1".to_string()];
        assert!(is_bulk_workbook(&bulk));
        assert!(!is_bulk_workbook(&single));
    }

    #[test]
    fn test_point_in_time_resolution_across_updates() {
        // 2024-01-01 与 2024-02-01 两次周一目标更新
        let programs = vec![
            program("2024-01-01", "Monday", 2000.0, 150.0),
            program("2024-02-01", "Monday", 2200.0, 160.0),
        ];
        // 2024-01-08 与 2024-02-05 都是周一
        let dates = vec![date("2024-01-08"), date("2024-02-05")];

        let resolved = resolve_target_values(&dates, &programs);
        assert_eq!(
            resolved,
            vec![
                (date("2024-01-08"), Some(2000.0), Some(150.0)),
                (date("2024-02-05"), Some(2200.0), Some(160.0)),
            ]
        );
    }

    #[test]
    fn test_date_before_first_update_gets_no_target() {
        let programs = vec![program("2024-01-01", "Monday", 2000.0, 150.0)];
        let resolved = resolve_target_values(&[date("2023-12-25")], &programs);
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_weekday_without_program_row_is_untouched() {
        // 计划只覆盖周一，周二无行
        let programs = vec![program("2024-01-01", "Monday", 2000.0, 150.0)];
        let resolved = resolve_target_values(&[date("2024-01-09")], &programs);
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_duplicate_program_rows_last_wins() {
        let programs = vec![
            program("2024-01-01", "Monday", 2000.0, 150.0),
            program("2024-01-01", "Monday", 2100.0, 155.0),
        ];
        let resolved = resolve_target_values(&[date("2024-01-08")], &programs);
        assert_eq!(resolved, vec![(date("2024-01-08"), Some(2100.0), Some(155.0))]);
    }

    #[test]
    fn test_update_on_exact_date_is_active() {
        let programs = vec![program("2024-01-01", "Monday", 2000.0, 150.0)];
        // 2024-01-01 本身是周一
        let resolved = resolve_target_values(&[date("2024-01-01")], &programs);
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_merge_weight_outer_join() {
        let scale = vec![(date("2024-03-01"), 82.5), (date("2024-03-02"), 82.3)];
        let trend = vec![(date("2024-03-02"), 82.4), (date("2024-03-03"), 82.2)];

        let rows = merge_weight_series(&scale, &trend, "bulk.xlsx");
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].date, date("2024-03-01"));
        assert_eq!(rows[0].scale_weight_kg, Some(82.5));
        assert_eq!(rows[0].trend_weight_kg, None);

        assert_eq!(rows[1].scale_weight_kg, Some(82.3));
        assert_eq!(rows[1].trend_weight_kg, Some(82.4));

        assert_eq!(rows[2].scale_weight_kg, None);
        assert_eq!(rows[2].trend_weight_kg, Some(82.2));
    }

    #[test]
    fn test_weight_series_sole_column_fallback() {
        let mut row = HashMap::new();
        row.insert("Date".to_string(), "2024-03-01".to_string());
        row.insert("Trend".to_string(), "82.1".to_string());
        let sheet = RawSheet {
            name: "Weight Trend".to_string(),
            headers: vec!["Date".to_string(), "Trend".to_string()],
            rows: vec![row],
        };

        let series = weight_series(&sheet, &["Trend Weight"], true);
        assert_eq!(series, vec![(date("2024-03-01"), 82.1)]);
    }
}
