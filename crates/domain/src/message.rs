//! 私聊与团队消息实体

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::retention::DeleteMode;
use crate::value_objects::{MessageBody, MessageId, RoomKey, TeamId, Timestamp, UserId};

/// After24h 模式的存活时长（小时）
pub const AUTO_DELETE_TTL_HOURS: i64 = 24;

/// 私聊消息。删除模式在创建时固化，之后不随设置变化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalMessage {
    pub id: MessageId,
    pub room_key: RoomKey,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(flatten)]
    pub body: MessageBody,
    pub delete_mode: DeleteMode,
    pub read: bool,
    pub read_at: Option<Timestamp>,
    /// 仅 After24h 模式有值
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl PersonalMessage {
    pub fn new(
        id: MessageId,
        room_key: RoomKey,
        sender_id: UserId,
        receiver_id: UserId,
        body: MessageBody,
        delete_mode: DeleteMode,
        now: Timestamp,
    ) -> Self {
        let expires_at = match delete_mode {
            DeleteMode::After24h => Some(now + Duration::hours(AUTO_DELETE_TTL_HOURS)),
            _ => None,
        };
        Self {
            id,
            room_key,
            sender_id,
            receiver_id,
            body,
            delete_mode,
            read: false,
            read_at: None,
            expires_at,
            created_at: now,
        }
    }

    pub fn mark_read(&mut self, now: Timestamp) {
        self.read = true;
        self.read_at = Some(now);
    }

    /// 基于时间的过期判断，与清扫进程无关。
    pub fn is_expired(&self, now: Timestamp) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry <= now)
    }
}

/// 团队房间消息。团队消息不参与保留策略（永久保存）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMessage {
    pub id: MessageId,
    pub team_id: TeamId,
    pub sender_id: UserId,
    pub text: String,
    /// 关联任务（原始系统允许把消息挂到某个共享任务上）
    pub linked_task_id: Option<uuid::Uuid>,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn message(mode: DeleteMode, now: Timestamp) -> PersonalMessage {
        let sender = UserId::from(Uuid::new_v4());
        let receiver = UserId::from(Uuid::new_v4());
        PersonalMessage::new(
            MessageId::from(Uuid::new_v4()),
            RoomKey::personal(sender, receiver),
            sender,
            receiver,
            MessageBody::text("hello").unwrap(),
            mode,
            now,
        )
    }

    #[test]
    fn after_24h_sets_expiry() {
        let now = chrono::Utc::now();
        let msg = message(DeleteMode::After24h, now);
        assert_eq!(msg.expires_at, Some(now + Duration::hours(24)));
        assert!(!msg.is_expired(now));
        assert!(msg.is_expired(now + Duration::hours(25)));
    }

    #[test]
    fn other_modes_never_expire() {
        let now = chrono::Utc::now();
        for mode in [DeleteMode::Never, DeleteMode::AfterView] {
            let msg = message(mode, now);
            assert!(msg.expires_at.is_none());
            assert!(!msg.is_expired(now + Duration::days(365)));
        }
    }

    #[test]
    fn mark_read_records_timestamp() {
        let now = chrono::Utc::now();
        let mut msg = message(DeleteMode::Never, now);
        assert!(!msg.read);
        msg.mark_read(now);
        assert!(msg.read);
        assert_eq!(msg.read_at, Some(now));
    }
}
