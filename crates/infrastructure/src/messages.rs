//! 私聊与团队消息仓储实现

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use application::{MessageRepository, TeamMessageRepository};
use domain::{
    DeleteMode, MessageBody, MessageId, PersonalMessage, RepositoryError, RoomKey, TeamId,
    TeamMessage, Timestamp, UserId,
};

use crate::db::{map_sqlx, DbPool};

/// 数据库私聊消息模型
#[derive(Debug, Clone, FromRow)]
struct MessageRecord {
    pub id: Uuid,
    pub room_key: String,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub delete_mode: String,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for PersonalMessage {
    type Error = RepositoryError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let delete_mode = DeleteMode::parse(&record.delete_mode).ok_or_else(|| {
            RepositoryError::storage(format!("unknown delete mode: {}", record.delete_mode))
        })?;
        let room_key = RoomKey::parse(record.room_key)
            .map_err(|e| RepositoryError::storage(e.to_string()))?;
        let body = MessageBody::new(record.text, record.media_url)
            .map_err(|e| RepositoryError::storage(e.to_string()))?;
        Ok(PersonalMessage {
            id: MessageId::from(record.id),
            room_key,
            sender_id: UserId::from(record.sender_id),
            receiver_id: UserId::from(record.receiver_id),
            body,
            delete_mode,
            read: record.read,
            read_at: record.read_at,
            expires_at: record.expires_at,
            created_at: record.created_at,
        })
    }
}

const MESSAGE_COLUMNS: &str = "id, room_key, sender_id, receiver_id, text, media_url, \
                               delete_mode, read, read_at, expires_at, created_at";

pub struct PgMessageRepository {
    pool: Arc<DbPool>,
}

impl PgMessageRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert(
        &self,
        message: PersonalMessage,
    ) -> Result<PersonalMessage, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "INSERT INTO personal_messages
                 (id, room_key, sender_id, receiver_id, text, media_url,
                  delete_mode, read, read_at, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::from(message.id))
        .bind(message.room_key.as_str())
        .bind(Uuid::from(message.sender_id))
        .bind(Uuid::from(message.receiver_id))
        .bind(message.body.text_content())
        .bind(message.body.media_url())
        .bind(message.delete_mode.as_str())
        .bind(message.read)
        .bind(message.read_at)
        .bind(message.expires_at)
        .bind(message.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        record.try_into()
    }

    async fn update(
        &self,
        message: PersonalMessage,
    ) -> Result<PersonalMessage, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "UPDATE personal_messages
             SET read = $2, read_at = $3
             WHERE id = $1
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::from(message.id))
        .bind(message.read)
        .bind(message.read_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        record.try_into()
    }

    async fn find_by_id(
        &self,
        id: MessageId,
    ) -> Result<Option<PersonalMessage>, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM personal_messages WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        record.map(TryInto::try_into).transpose()
    }

    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM personal_messages WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn list_room(
        &self,
        room_key: &RoomKey,
        limit: u32,
    ) -> Result<Vec<PersonalMessage>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM personal_messages
             WHERE room_key = $1
             ORDER BY created_at
             LIMIT $2"
        ))
        .bind(room_key.as_str())
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        records.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_expired(&self, now: Timestamp) -> Result<Vec<MessageId>, RepositoryError> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM personal_messages
             WHERE expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(now)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(ids.into_iter().map(|(id,)| MessageId::from(id)).collect())
    }
}

/// 数据库团队消息模型
#[derive(Debug, Clone, FromRow)]
struct TeamMessageRecord {
    pub id: Uuid,
    pub team_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub linked_task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<TeamMessageRecord> for TeamMessage {
    fn from(record: TeamMessageRecord) -> Self {
        TeamMessage {
            id: MessageId::from(record.id),
            team_id: TeamId::from(record.team_id),
            sender_id: UserId::from(record.sender_id),
            text: record.text,
            linked_task_id: record.linked_task_id,
            created_at: record.created_at,
        }
    }
}

pub struct PgTeamMessageRepository {
    pool: Arc<DbPool>,
}

impl PgTeamMessageRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamMessageRepository for PgTeamMessageRepository {
    async fn insert(&self, message: TeamMessage) -> Result<TeamMessage, RepositoryError> {
        let record = sqlx::query_as::<_, TeamMessageRecord>(
            r#"INSERT INTO team_messages (id, team_id, sender_id, text, linked_task_id, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, team_id, sender_id, text, linked_task_id, created_at"#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.team_id))
        .bind(Uuid::from(message.sender_id))
        .bind(&message.text)
        .bind(message.linked_task_id)
        .bind(message.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(record.into())
    }

    async fn list_team(
        &self,
        team_id: TeamId,
        limit: u32,
    ) -> Result<Vec<TeamMessage>, RepositoryError> {
        let records = sqlx::query_as::<_, TeamMessageRecord>(
            r#"SELECT id, team_id, sender_id, text, linked_task_id, created_at
               FROM team_messages
               WHERE team_id = $1
               ORDER BY created_at
               LIMIT $2"#,
        )
        .bind(Uuid::from(team_id))
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(records.into_iter().map(Into::into).collect())
    }
}
