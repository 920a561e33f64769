//! 连接请求仓储实现

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use application::ConnectionRepository;
use domain::{
    ConnectionId, ConnectionRequest, ConnectionStatus, RepositoryError, RoomKey, UserId,
};

use crate::db::{map_sqlx, DbPool};

/// 数据库连接请求模型
#[derive(Debug, Clone, FromRow)]
struct ConnectionRecord {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub receiver_id: Uuid,
    pub status: String,
    pub room_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ConnectionRecord> for ConnectionRequest {
    type Error = RepositoryError;

    fn try_from(record: ConnectionRecord) -> Result<Self, Self::Error> {
        let status = ConnectionStatus::parse(&record.status).ok_or_else(|| {
            RepositoryError::storage(format!("unknown connection status: {}", record.status))
        })?;
        let room_key = RoomKey::parse(record.room_key)
            .map_err(|e| RepositoryError::storage(e.to_string()))?;
        Ok(ConnectionRequest {
            id: ConnectionId::from(record.id),
            requester_id: UserId::from(record.requester_id),
            receiver_id: UserId::from(record.receiver_id),
            status,
            room_key,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, requester_id, receiver_id, status, room_key, created_at, updated_at";

pub struct PgConnectionRepository {
    pool: Arc<DbPool>,
}

impl PgConnectionRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionRepository for PgConnectionRepository {
    async fn insert(
        &self,
        request: ConnectionRequest,
    ) -> Result<ConnectionRequest, RepositoryError> {
        let record = sqlx::query_as::<_, ConnectionRecord>(
            r#"INSERT INTO chat_connections
                   (id, requester_id, receiver_id, status, room_key, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, requester_id, receiver_id, status, room_key, created_at, updated_at"#,
        )
        .bind(Uuid::from(request.id))
        .bind(Uuid::from(request.requester_id))
        .bind(Uuid::from(request.receiver_id))
        .bind(request.status.as_str())
        .bind(request.room_key.as_str())
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        record.try_into()
    }

    async fn update(
        &self,
        request: ConnectionRequest,
    ) -> Result<ConnectionRequest, RepositoryError> {
        let record = sqlx::query_as::<_, ConnectionRecord>(
            r#"UPDATE chat_connections
               SET requester_id = $2, receiver_id = $3, status = $4, updated_at = $5
               WHERE id = $1
               RETURNING id, requester_id, receiver_id, status, room_key, created_at, updated_at"#,
        )
        .bind(Uuid::from(request.id))
        .bind(Uuid::from(request.requester_id))
        .bind(Uuid::from(request.receiver_id))
        .bind(request.status.as_str())
        .bind(request.updated_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        record.try_into()
    }

    async fn find_by_id(
        &self,
        id: ConnectionId,
    ) -> Result<Option<ConnectionRequest>, RepositoryError> {
        let record = sqlx::query_as::<_, ConnectionRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM chat_connections WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        record.map(TryInto::try_into).transpose()
    }

    async fn find_by_room_key(
        &self,
        room_key: &RoomKey,
    ) -> Result<Option<ConnectionRequest>, RepositoryError> {
        let record = sqlx::query_as::<_, ConnectionRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM chat_connections WHERE room_key = $1"
        ))
        .bind(room_key.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        record.map(TryInto::try_into).transpose()
    }

    async fn delete(&self, id: ConnectionId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM chat_connections WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn list_pending_sent(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ConnectionRequest>, RepositoryError> {
        let records = sqlx::query_as::<_, ConnectionRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM chat_connections
             WHERE requester_id = $1 AND status = 'pending'
             ORDER BY created_at"
        ))
        .bind(Uuid::from(user_id))
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        records.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_pending_received(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ConnectionRequest>, RepositoryError> {
        let records = sqlx::query_as::<_, ConnectionRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM chat_connections
             WHERE receiver_id = $1 AND status = 'pending'
             ORDER BY created_at"
        ))
        .bind(Uuid::from(user_id))
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        records.into_iter().map(TryInto::try_into).collect()
    }
}
