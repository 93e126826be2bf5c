// ==========================================
// MacroClaw 摄取管线 - 查询 API
// ==========================================
// 职责: 封装读取侧仓储，供 CLI/报表协作方校验摄取结果
// 契约: 纯读查询，无副作用；空结果返回空集合；
//       边界处日期一律为 ISO-8601 文本
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::repository::query_repo;
use crate::repository::store::Store;
use crate::repository::JsonRow;
use chrono::NaiveDate;

// ==========================================
// QueryApi - 读取侧聚合查询
// ==========================================
pub struct QueryApi {
    store: Store,
}

impl QueryApi {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// 某日的每日汇总（无数据时 None）
    pub fn daily_summary(&self, date: &str) -> ApiResult<Option<JsonRow>> {
        let date = parse_iso_date(date)?;
        let conn = self.store.connection()?;
        Ok(query_repo::daily_summary(&conn, date)?)
    }

    /// 某日的营养记录，按餐次、食物名排序
    pub fn nutrition_log(&self, date: &str) -> ApiResult<Vec<JsonRow>> {
        let date = parse_iso_date(date)?;
        let conn = self.store.connection()?;
        Ok(query_repo::nutrition_log(&conn, date)?)
    }

    /// 日期范围内的训练组（闭区间）
    pub fn workouts(&self, start: &str, end: &str) -> ApiResult<Vec<JsonRow>> {
        let start = parse_iso_date(start)?;
        let end = parse_iso_date(end)?;
        if end < start {
            return Err(ApiError::InvalidInput(format!(
                "结束日期早于开始日期: {} < {}",
                end, start
            )));
        }
        let conn = self.store.connection()?;
        Ok(query_repo::workouts_between(&conn, start, end)?)
    }

    /// 最近 days 天的体重观测，按日期升序
    pub fn weight_trend(&self, days: i64) -> ApiResult<Vec<JsonRow>> {
        let days = validate_days(days)?;
        let conn = self.store.connection()?;
        Ok(query_repo::weight_trend(&conn, today(), days)?)
    }

    /// 最近 days 天的宏量依从度
    pub fn macro_adherence(&self, days: i64) -> ApiResult<JsonRow> {
        let days = validate_days(days)?;
        let conn = self.store.connection()?;
        Ok(query_repo::macro_adherence(&conn, today(), days)?)
    }

    /// 最近 days 天每个动作的最重一组
    pub fn recent_prs(&self, days: i64) -> ApiResult<Vec<JsonRow>> {
        let days = validate_days(days)?;
        let conn = self.store.connection()?;
        Ok(query_repo::recent_prs(&conn, today(), days)?)
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn parse_iso_date(raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::InvalidInput(format!("日期须为 YYYY-MM-DD: {}", raw)))
}

fn validate_days(days: i64) -> ApiResult<i64> {
    if days <= 0 {
        return Err(ApiError::InvalidInput(format!("天数须为正: {}", days)));
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_date_rejected() {
        let api = QueryApi::new(Store::open_in_memory().unwrap());
        assert!(matches!(
            api.daily_summary("01/02/2024"),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.workouts("2024-01-02", "2024-01-01"),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.weight_trend(0),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_store_gives_empty_results() {
        let api = QueryApi::new(Store::open_in_memory().unwrap());
        assert!(api.daily_summary("2024-01-01").unwrap().is_none());
        assert!(api.nutrition_log("2024-01-01").unwrap().is_empty());
        assert!(api.recent_prs(30).unwrap().is_empty());
    }
}
