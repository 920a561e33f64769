//! 数据库连接池

use sqlx::{Pool, Postgres};

pub type DbPool = Pool<Postgres>;

pub async fn create_pool(database_url: &str, max_size: u32) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_size)
        .connect(database_url)
        .await
}

/// sqlx 错误到仓储错误的统一映射。唯一约束冲突单独区分，
/// 上层依赖它实现"每个房间键最多一条连接记录"。
pub(crate) fn map_sqlx(err: sqlx::Error) -> domain::RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => domain::RepositoryError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            domain::RepositoryError::conflict(db.to_string())
        }
        _ => domain::RepositoryError::storage(err.to_string()),
    }
}
