//! 保留设置仓储实现
//!
//! 设置分两张表：chat_settings 存默认模式，chat_setting_overrides
//! 存按房间的覆盖项。upsert 在同一事务里重写全部覆盖项。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use application::RetentionRepository;
use domain::{DeleteMode, RepositoryError, RetentionSetting, RoomKey, RoomOverride, UserId};

use crate::db::{map_sqlx, DbPool};

#[derive(Debug, Clone, FromRow)]
struct SettingRecord {
    pub user_id: Uuid,
    pub default_delete_mode: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct OverrideRecord {
    pub room_key: String,
    pub delete_mode: String,
}

fn parse_mode(value: &str) -> Result<DeleteMode, RepositoryError> {
    DeleteMode::parse(value)
        .ok_or_else(|| RepositoryError::storage(format!("unknown delete mode: {value}")))
}

pub struct PgRetentionRepository {
    pool: Arc<DbPool>,
}

impl PgRetentionRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RetentionRepository for PgRetentionRepository {
    async fn find_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<RetentionSetting>, RepositoryError> {
        let record = sqlx::query_as::<_, SettingRecord>(
            "SELECT user_id, default_delete_mode, updated_at FROM chat_settings WHERE user_id = $1",
        )
        .bind(Uuid::from(user_id))
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        let Some(record) = record else {
            return Ok(None);
        };

        let overrides = sqlx::query_as::<_, OverrideRecord>(
            "SELECT room_key, delete_mode FROM chat_setting_overrides WHERE user_id = $1",
        )
        .bind(Uuid::from(user_id))
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut room_overrides = Vec::with_capacity(overrides.len());
        for row in overrides {
            let room_key = RoomKey::parse(row.room_key)
                .map_err(|e| RepositoryError::storage(e.to_string()))?;
            room_overrides.push(RoomOverride {
                room_key,
                mode: parse_mode(&row.delete_mode)?,
            });
        }

        Ok(Some(RetentionSetting {
            user_id: UserId::from(record.user_id),
            default_mode: parse_mode(&record.default_delete_mode)?,
            room_overrides,
            updated_at: record.updated_at,
        }))
    }

    async fn upsert(
        &self,
        setting: RetentionSetting,
    ) -> Result<RetentionSetting, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            r#"INSERT INTO chat_settings (user_id, default_delete_mode, updated_at)
               VALUES ($1, $2, $3)
               ON CONFLICT (user_id)
               DO UPDATE SET default_delete_mode = $2, updated_at = $3"#,
        )
        .bind(Uuid::from(setting.user_id))
        .bind(setting.default_mode.as_str())
        .bind(setting.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        sqlx::query("DELETE FROM chat_setting_overrides WHERE user_id = $1")
            .bind(Uuid::from(setting.user_id))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        for item in &setting.room_overrides {
            sqlx::query(
                "INSERT INTO chat_setting_overrides (user_id, room_key, delete_mode)
                 VALUES ($1, $2, $3)",
            )
            .bind(Uuid::from(setting.user_id))
            .bind(item.room_key.as_str())
            .bind(item.mode.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(setting)
    }
}
