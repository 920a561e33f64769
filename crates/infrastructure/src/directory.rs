//! 用户档案与团队目录的数据库适配器
//!
//! 用户与团队由外部系统维护，这里只做只读查询。

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use application::{ProfileStore, TeamDirectory};
use domain::{RepositoryError, TeamId, UserId, UserProfile};

use crate::db::{map_sqlx, DbPool};

#[derive(Debug, Clone, FromRow)]
struct ProfileRecord {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
}

pub struct PgProfileStore {
    pool: Arc<DbPool>,
}

impl PgProfileStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_profile(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT id, username, display_name FROM users WHERE id = $1",
        )
        .bind(Uuid::from(user_id))
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(record.map(|r| UserProfile {
            id: UserId::from(r.id),
            username: r.username,
            display_name: r.display_name,
        }))
    }
}

pub struct PgTeamDirectory {
    pool: Arc<DbPool>,
}

impl PgTeamDirectory {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamDirectory for PgTeamDirectory {
    async fn is_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM team_members WHERE team_id = $1 AND user_id = $2)",
        )
        .bind(Uuid::from(team_id))
        .bind(Uuid::from(user_id))
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(exists)
    }
}
