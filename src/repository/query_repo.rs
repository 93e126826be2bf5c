// ==========================================
// MacroClaw 摄取管线 - 读取侧仓储
// ==========================================
// 职责: 规范表的只读聚合查询
// 约束: 空结果返回空集合，不报错；无副作用
// 输出: JSON 行映射，日期在边界处为 ISO-8601 文本
// ==========================================

use crate::repository::error::RepositoryResult;
use chrono::NaiveDate;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, ToSql};
use serde_json::{Map, Value};

/// JSON 行映射（字段名 → 值）
pub type JsonRow = Map<String, Value>;

// ==========================================
// 通用行转换
// ==========================================

/// 执行查询并把每行转为 JSON 映射
///
/// 日期列在 schema 中即为 ISO 文本，无需额外转换
fn query_json_rows(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> RepositoryResult<Vec<JsonRow>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut out = Vec::new();
    let mut rows = stmt.query(params)?;
    while let Some(row) = rows.next()? {
        let mut map = JsonRow::new();
        for (idx, name) in columns.iter().enumerate() {
            let value = match row.get_ref(idx)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(n) => Value::from(n),
                ValueRef::Real(f) => Value::from(f),
                ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Blob(_) => Value::Null,
            };
            map.insert(name.clone(), value);
        }
        out.push(map);
    }
    Ok(out)
}

/// 保留一位小数（与报表展示口径一致）
fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

// ==========================================
// 查询函数
// ==========================================

/// 某日的每日汇总（至多一行）
pub fn daily_summary(conn: &Connection, date: NaiveDate) -> RepositoryResult<Option<JsonRow>> {
    let mut rows = query_json_rows(
        conn,
        "SELECT * FROM daily_summary WHERE date = ?1 LIMIT 1",
        params![date.to_string()],
    )?;
    Ok(if rows.is_empty() {
        None
    } else {
        Some(rows.remove(0))
    })
}

/// 某日的全部食物条目，按餐次、食物名排序
pub fn nutrition_log(conn: &Connection, date: NaiveDate) -> RepositoryResult<Vec<JsonRow>> {
    query_json_rows(
        conn,
        "SELECT * FROM nutrition_log WHERE date = ?1 ORDER BY meal, food_name",
        params![date.to_string()],
    )
}

/// 日期范围内的训练组，按日期、动作、组号排序（闭区间）
pub fn workouts_between(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> RepositoryResult<Vec<JsonRow>> {
    query_json_rows(
        conn,
        "SELECT * FROM workouts WHERE date BETWEEN ?1 AND ?2
         ORDER BY date, exercise_name, set_number",
        params![start.to_string(), end.to_string()],
    )
}

/// 截至 as_of 往前 days 天的体重观测，按日期升序
pub fn weight_trend(
    conn: &Connection,
    as_of: NaiveDate,
    days: i64,
) -> RepositoryResult<Vec<JsonRow>> {
    let start = as_of - chrono::Duration::days(days);
    query_json_rows(
        conn,
        "SELECT * FROM weight_log WHERE date >= ?1 ORDER BY date ASC",
        params![start.to_string()],
    )
}

/// 滚动窗口内的宏量依从度
///
/// adherence_pct = 窗口内实际热量均值 ÷ 目标热量均值 × 100，
/// 无目标数据时为 null；窗口内无任何记录时仅返回 days_tracked=0
pub fn macro_adherence(conn: &Connection, as_of: NaiveDate, days: i64) -> RepositoryResult<JsonRow> {
    let start = as_of - chrono::Duration::days(days);

    let (days_tracked, avg_calories, avg_protein, avg_carbs, avg_fat, avg_cal_target, avg_prot_target) =
        conn.query_row(
            r#"
            SELECT
                COUNT(*),
                AVG(total_calories),
                AVG(total_protein_g),
                AVG(total_carbs_g),
                AVG(total_fat_g),
                AVG(calorie_target),
                AVG(protein_target_g)
            FROM daily_summary
            WHERE date >= ?1
            "#,
            params![start.to_string()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, Option<f64>>(6)?,
                ))
            },
        )?;

    let mut map = JsonRow::new();
    map.insert("days_tracked".to_string(), Value::from(days_tracked));
    if days_tracked == 0 {
        return Ok(map);
    }

    let opt = |v: Option<f64>| v.map(round1).map(Value::from).unwrap_or(Value::Null);
    map.insert("avg_calories".to_string(), opt(avg_calories));
    map.insert("avg_protein_g".to_string(), opt(avg_protein));
    map.insert("avg_carbs_g".to_string(), opt(avg_carbs));
    map.insert("avg_fat_g".to_string(), opt(avg_fat));
    map.insert("avg_calorie_target".to_string(), opt(avg_cal_target));
    map.insert("avg_protein_target_g".to_string(), opt(avg_prot_target));

    // 目标缺失时依从度为 null，而非 0
    let adherence = match (avg_calories, avg_cal_target) {
        (Some(actual), Some(target)) if target > 0.0 => {
            Value::from(round1(actual / target * 100.0))
        }
        _ => Value::Null,
    };
    map.insert("adherence_pct".to_string(), adherence);

    Ok(map)
}

/// 窗口内每个动作的最重一组（同重量按次数多者胜）
pub fn recent_prs(conn: &Connection, as_of: NaiveDate, days: i64) -> RepositoryResult<Vec<JsonRow>> {
    let start = as_of - chrono::Duration::days(days);
    query_json_rows(
        conn,
        r#"
        WITH ranked AS (
            SELECT
                exercise_name,
                weight_kg,
                reps,
                date,
                ROW_NUMBER() OVER (
                    PARTITION BY exercise_name
                    ORDER BY weight_kg DESC, reps DESC
                ) AS rn
            FROM workouts
            WHERE date >= ?1
              AND weight_kg IS NOT NULL
        )
        SELECT
            exercise_name,
            weight_kg AS max_weight_kg,
            reps      AS reps_at_max,
            date
        FROM ranked
        WHERE rn = 1
        ORDER BY max_weight_kg DESC
        "#,
        params![start.to_string()],
    )
}
