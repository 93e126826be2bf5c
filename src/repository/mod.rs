// ==========================================
// MacroClaw 摄取管线 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口，屏蔽数据库细节
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化，防止 SQL 注入
// ==========================================

pub mod error;
pub mod ingest_repo;
pub mod query_repo;
pub mod store;

// 重导出核心类型
pub use error::{RepositoryError, RepositoryResult};
pub use query_repo::JsonRow;
pub use store::Store;
