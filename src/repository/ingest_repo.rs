// ==========================================
// MacroClaw 摄取管线 - 写入侧仓储
// ==========================================
// 职责: 规范表的 upsert / 导入历史 / 目标值回填
// 约束: 所有函数在调用方事务内执行（传入 &Connection，
//       bulk 多表写入与历史记录由引擎统一提交）
// 约束: 所有查询参数化
// ==========================================

use crate::domain::records::{
    DailySummary, ImportHistoryEntry, NutritionEntry, PreparedBatch, WeightObservation, WorkoutSet,
};
use crate::repository::error::RepositoryResult;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

// ==========================================
// 导入历史（内容哈希去重键）
// ==========================================

/// 按内容哈希查找历史记录，返回记录 id
pub fn find_history_by_hash(conn: &Connection, file_hash: &str) -> RepositoryResult<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM export_history WHERE file_hash = ?1 LIMIT 1",
            params![file_hash],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// 写入导入历史记录
///
/// 必须是单文件摄取事务中的最后一次写入：
/// 历史记录存在 == 对应行已全部落库
pub fn insert_history(conn: &Connection, entry: &ImportHistoryEntry) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO export_history (id, export_type, file_path, file_hash, rows_imported, imported_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            entry.id,
            entry.export_type,
            entry.file_path,
            entry.file_hash,
            entry.rows_imported as i64,
            entry.imported_at,
        ],
    )?;
    Ok(())
}

// ==========================================
// 规范表 upsert
// ==========================================
// INSERT OR REPLACE: 业务主键重复时原地替换（last-write-wins），
// 重复导出重叠日期范围不产生重复行

/// 按批类型分派 upsert，返回写入行数
pub fn upsert_batch(conn: &Connection, batch: &PreparedBatch) -> RepositoryResult<usize> {
    match batch {
        PreparedBatch::Nutrition(rows) => upsert_nutrition(conn, rows),
        PreparedBatch::Workout(rows) => upsert_workouts(conn, rows),
        PreparedBatch::Weight(rows) => upsert_weight(conn, rows),
        PreparedBatch::Summary(rows) => upsert_summary(conn, rows),
    }
}

pub fn upsert_nutrition(conn: &Connection, rows: &[NutritionEntry]) -> RepositoryResult<usize> {
    let mut stmt = conn.prepare(
        r#"
        INSERT OR REPLACE INTO nutrition_log
            (date, meal, calories, protein_g, carbs_g, fat_g, fiber_g,
             sodium_mg, food_name, food_details, source, imported_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )?;
    for row in rows {
        stmt.execute(params![
            row.date.to_string(),
            row.meal,
            row.calories,
            row.protein_g,
            row.carbs_g,
            row.fat_g,
            row.fiber_g,
            row.sodium_mg,
            row.food_name,
            row.food_details,
            row.source,
            row.imported_at,
        ])?;
    }
    Ok(rows.len())
}

pub fn upsert_workouts(conn: &Connection, rows: &[WorkoutSet]) -> RepositoryResult<usize> {
    let mut stmt = conn.prepare(
        r#"
        INSERT OR REPLACE INTO workouts
            (date, workout_name, duration_min, exercise_name, set_number,
             reps, weight_kg, rpe, notes, source, imported_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )?;
    for row in rows {
        stmt.execute(params![
            row.date.to_string(),
            row.workout_name,
            row.duration_min,
            row.exercise_name,
            row.set_number,
            row.reps,
            row.weight_kg,
            row.rpe,
            row.notes,
            row.source,
            row.imported_at,
        ])?;
    }
    Ok(rows.len())
}

pub fn upsert_weight(conn: &Connection, rows: &[WeightObservation]) -> RepositoryResult<usize> {
    let mut stmt = conn.prepare(
        r#"
        INSERT OR REPLACE INTO weight_log
            (date, scale_weight_kg, trend_weight_kg, source, imported_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )?;
    for row in rows {
        stmt.execute(params![
            row.date.to_string(),
            row.scale_weight_kg,
            row.trend_weight_kg,
            row.source,
            row.imported_at,
        ])?;
    }
    Ok(rows.len())
}

pub fn upsert_summary(conn: &Connection, rows: &[DailySummary]) -> RepositoryResult<usize> {
    let mut stmt = conn.prepare(
        r#"
        INSERT OR REPLACE INTO daily_summary
            (date, total_calories, total_protein_g, total_carbs_g, total_fat_g,
             calorie_target, protein_target_g, expenditure_kcal, source, imported_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )?;
    for row in rows {
        stmt.execute(params![
            row.date.to_string(),
            row.total_calories,
            row.total_protein_g,
            row.total_carbs_g,
            row.total_fat_g,
            row.calorie_target,
            row.protein_target_g,
            row.expenditure_kcal,
            row.source,
            row.imported_at,
        ])?;
    }
    Ok(rows.len())
}

// ==========================================
// daily_summary 增量回填
// ==========================================

/// 回填某日的消耗估算，只更新已存在的行，不建新行
///
/// 返回受影响行数（0 或 1）
pub fn update_expenditure(
    conn: &Connection,
    date: NaiveDate,
    expenditure_kcal: f64,
) -> RepositoryResult<usize> {
    let affected = conn.execute(
        "UPDATE daily_summary SET expenditure_kcal = ?1 WHERE date = ?2",
        params![expenditure_kcal, date.to_string()],
    )?;
    Ok(affected)
}

/// 回填某日的热量/蛋白质目标，只更新已存在的行
pub fn update_targets(
    conn: &Connection,
    date: NaiveDate,
    calorie_target: Option<f64>,
    protein_target_g: Option<f64>,
) -> RepositoryResult<usize> {
    let affected = conn.execute(
        "UPDATE daily_summary SET calorie_target = ?1, protein_target_g = ?2 WHERE date = ?3",
        params![calorie_target, protein_target_g, date.to_string()],
    )?;
    Ok(affected)
}

/// daily_summary 中已有的全部日期（升序）
pub fn summary_dates(conn: &Connection) -> RepositoryResult<Vec<NaiveDate>> {
    let mut stmt = conn.prepare("SELECT date FROM daily_summary ORDER BY date")?;
    let dates = stmt
        .query_map([], |row| row.get::<_, NaiveDate>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::store::Store;

    fn entry(date: &str, meal: &str, food: &str, calories: f64) -> NutritionEntry {
        NutritionEntry {
            date: date.parse().unwrap(),
            meal: meal.to_string(),
            calories: Some(calories),
            protein_g: None,
            carbs_g: None,
            fat_g: None,
            fiber_g: None,
            sodium_mg: None,
            food_name: food.to_string(),
            food_details: None,
            source: "test.xlsx".to_string(),
            imported_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_upsert_replaces_on_primary_key() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection().unwrap();

        upsert_nutrition(&conn, &[entry("2024-01-01", "Breakfast", "Oatmeal", 300.0)]).unwrap();
        upsert_nutrition(&conn, &[entry("2024-01-01", "Breakfast", "Oatmeal", 310.0)]).unwrap();

        let (count, calories): (i64, f64) = conn
            .query_row(
                "SELECT COUNT(*), MAX(calories) FROM nutrition_log",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(calories, 310.0);
    }

    #[test]
    fn test_update_expenditure_only_touches_existing_rows() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection().unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(update_expenditure(&conn, date, 2500.0).unwrap(), 0);

        conn.execute(
            "INSERT INTO daily_summary (date, total_calories) VALUES ('2024-03-01', 2000.0)",
            [],
        )
        .unwrap();
        assert_eq!(update_expenditure(&conn, date, 2500.0).unwrap(), 1);
    }

    #[test]
    fn test_history_hash_lookup() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection().unwrap();

        assert!(find_history_by_hash(&conn, "abc").unwrap().is_none());

        let entry = ImportHistoryEntry {
            id: "hist-1".to_string(),
            export_type: "nutrition".to_string(),
            file_path: "/tmp/export.xlsx".to_string(),
            file_hash: "abc".to_string(),
            rows_imported: 3,
            imported_at: "2024-01-01 00:00:00".to_string(),
        };
        insert_history(&conn, &entry).unwrap();

        assert_eq!(
            find_history_by_hash(&conn, "abc").unwrap(),
            Some("hist-1".to_string())
        );
    }
}
