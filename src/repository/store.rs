// ==========================================
// MacroClaw 摄取管线 - 规范表 Schema 与连接管理
// ==========================================
// 职责: 建表/建索引（幂等）+ 共享连接句柄
// 约束: 连接句柄显式传递，不使用全局状态
// ==========================================

use crate::db::{configure_sqlite_connection, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

// ==========================================
// 规范表 DDL
// ==========================================
// 日期列统一存 ISO-8601 文本（YYYY-MM-DD），字典序即日期序
const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS nutrition_log (
  date            TEXT NOT NULL,
  meal            TEXT NOT NULL,
  calories        REAL,
  protein_g       REAL,
  carbs_g         REAL,
  fat_g           REAL,
  fiber_g         REAL,
  sodium_mg       REAL,
  food_name       TEXT NOT NULL,
  food_details    TEXT,
  source          TEXT,
  imported_at     TEXT NOT NULL DEFAULT (datetime('now')),
  PRIMARY KEY (date, meal, food_name)
);

CREATE TABLE IF NOT EXISTS workouts (
  date            TEXT NOT NULL,
  workout_name    TEXT,
  duration_min    REAL,
  exercise_name   TEXT NOT NULL,
  set_number      INTEGER NOT NULL,
  reps            INTEGER,
  weight_kg       REAL,
  rpe             REAL,
  notes           TEXT,
  source          TEXT,
  imported_at     TEXT NOT NULL DEFAULT (datetime('now')),
  PRIMARY KEY (date, exercise_name, set_number)
);

CREATE TABLE IF NOT EXISTS weight_log (
  date                TEXT PRIMARY KEY,
  scale_weight_kg     REAL,
  trend_weight_kg     REAL,
  source              TEXT,
  imported_at         TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS daily_summary (
  date                TEXT PRIMARY KEY,
  total_calories      REAL,
  total_protein_g     REAL,
  total_carbs_g       REAL,
  total_fat_g         REAL,
  calorie_target      REAL,
  protein_target_g    REAL,
  expenditure_kcal    REAL,
  source              TEXT,
  imported_at         TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS export_history (
  id              TEXT PRIMARY KEY,
  export_type     TEXT NOT NULL,
  file_path       TEXT NOT NULL,
  file_hash       TEXT NOT NULL,
  rows_imported   INTEGER NOT NULL DEFAULT 0,
  imported_at     TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_nutrition_log_date ON nutrition_log (date);
CREATE INDEX IF NOT EXISTS idx_workouts_date ON workouts (date);
CREATE INDEX IF NOT EXISTS idx_weight_log_date ON weight_log (date);
CREATE INDEX IF NOT EXISTS idx_daily_summary_date ON daily_summary (date);
CREATE UNIQUE INDEX IF NOT EXISTS idx_export_history_hash ON export_history (file_hash);
"#;

// ==========================================
// Store - 规范数据存储句柄
// ==========================================
/// 共享的 SQLite 存储句柄
///
/// 摄取引擎在"哈希查重 → 写入"全程持有内部互斥锁，
/// 以此串行化对规范表的写入（单写者模型）
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// 打开（必要时创建）存储文件并幂等初始化 schema
    ///
    /// # 参数
    /// - db_path: 数据库文件路径，父目录自动创建
    pub fn open<P: AsRef<Path>>(db_path: P) -> RepositoryResult<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RepositoryError::DatabaseConnectionError(format!(
                        "无法创建数据目录 {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let path_str = db_path.to_string_lossy();
        info!(db_path = %path_str, "打开数据库");
        let conn = open_sqlite_connection(&path_str)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 打开内存数据库（测试用）
    pub fn open_in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        configure_sqlite_connection(&conn)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建存储句柄（幂等补建 schema）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            ensure_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 获取数据库连接（作用域内独占）
    pub fn connection(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

/// 确保全部规范表与索引存在（幂等）
fn ensure_schema(conn: &Connection) -> RepositoryResult<()> {
    conn.execute_batch(SCHEMA_DDL)?;
    Ok(())
}
