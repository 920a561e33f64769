//! 消息用例服务
//!
//! 私聊消息的持久化、读取、已读标记与过期清扫，以及团队消息的
//! 持久化。发送私聊消息前必须通过连接授权；删除模式在写入时由
//! 保留策略解析并固化在消息上。

use std::sync::Arc;

use domain::{
    DeleteMode, DomainError, MessageBody, MessageId, PersonalMessage, RoomKey, TeamId,
    TeamMessage, UserId,
};
use uuid::Uuid;

use crate::clock::Clock;
use crate::directory::TeamDirectory;
use crate::error::ApplicationResult;
use crate::key_locks::KeyLocks;
use crate::repository::{MessageRepository, TeamMessageRepository};
use crate::services::connection_service::ConnectionService;
use crate::services::retention_service::RetentionService;

/// 发送私聊消息
#[derive(Debug, Clone)]
pub struct SendPersonalMessageRequest {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub room_key: RoomKey,
    pub text: Option<String>,
    pub media_url: Option<String>,
}

/// 发送团队消息
#[derive(Debug, Clone)]
pub struct SendTeamMessageRequest {
    pub sender_id: UserId,
    pub team_id: TeamId,
    pub text: String,
    pub linked_task_id: Option<Uuid>,
}

/// 已读标记的结果：更新后的消息，或按查看即删策略已被删除。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Read(PersonalMessage),
    Deleted {
        message_id: MessageId,
        room_key: RoomKey,
    },
}

impl ReadOutcome {
    pub fn room_key(&self) -> &RoomKey {
        match self {
            ReadOutcome::Read(message) => &message.room_key,
            ReadOutcome::Deleted { room_key, .. } => room_key,
        }
    }
}

pub struct MessageServiceDependencies {
    pub messages: Arc<dyn MessageRepository>,
    pub team_messages: Arc<dyn TeamMessageRepository>,
    pub connections: Arc<ConnectionService>,
    pub retention: Arc<RetentionService>,
    pub teams: Arc<dyn TeamDirectory>,
    pub clock: Arc<dyn Clock>,
    pub locks: Arc<KeyLocks>,
}

pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    /// 持久化一条私聊消息。
    /// 发送者必须经连接授权；删除模式由保留策略解析，After24h 设置
    /// 绝对过期时刻 now + 24h。
    pub async fn append_personal(
        &self,
        request: SendPersonalMessageRequest,
    ) -> ApplicationResult<PersonalMessage> {
        let authorized = self
            .deps
            .connections
            .authorize_room(request.sender_id, &request.room_key)
            .await?;
        if !authorized {
            return Err(DomainError::unauthorized(
                "no accepted connection for this room",
            )
            .into());
        }
        // 房间键双方必须与发送者/接收者一致
        let valid_pair = request
            .room_key
            .parties()
            .map(|(a, b)| {
                (a == request.sender_id && b == request.receiver_id)
                    || (a == request.receiver_id && b == request.sender_id)
            })
            .unwrap_or(false);
        if !valid_pair {
            return Err(
                DomainError::validation("room_key", "does not match sender and receiver").into(),
            );
        }

        let body = MessageBody::new(request.text, request.media_url)?;
        let delete_mode = self
            .deps
            .retention
            .resolve_delete_mode(request.sender_id, &request.room_key)
            .await?;
        let now = self.deps.clock.now();

        let message = PersonalMessage::new(
            MessageId::from(Uuid::new_v4()),
            request.room_key,
            request.sender_id,
            request.receiver_id,
            body,
            delete_mode,
            now,
        );
        let stored = self.deps.messages.insert(message).await?;

        tracing::debug!(
            message_id = %stored.id,
            room_key = %stored.room_key,
            delete_mode = stored.delete_mode.as_str(),
            "personal message appended"
        );
        Ok(stored)
    }

    /// 持久化一条团队消息。发送者必须是团队成员（外部目录校验）。
    pub async fn append_team(
        &self,
        request: SendTeamMessageRequest,
    ) -> ApplicationResult<TeamMessage> {
        let member = self
            .deps
            .teams
            .is_member(request.team_id, request.sender_id)
            .await?;
        if !member {
            return Err(DomainError::unauthorized("not a member of this team").into());
        }
        let text = request.text.trim().to_owned();
        if text.is_empty() {
            return Err(DomainError::validation("text", "cannot be empty").into());
        }

        let message = TeamMessage {
            id: MessageId::from(Uuid::new_v4()),
            team_id: request.team_id,
            sender_id: request.sender_id,
            text,
            linked_task_id: request.linked_task_id,
            created_at: self.deps.clock.now(),
        };
        Ok(self.deps.team_messages.insert(message).await?)
    }

    /// 私聊房间历史：按时间升序，最多 limit 条。
    /// 已过期的 After24h 消息在读取时过滤，不依赖清扫进程是否已运行。
    pub async fn list_room(
        &self,
        actor_id: UserId,
        room_key: &RoomKey,
        limit: u32,
    ) -> ApplicationResult<Vec<PersonalMessage>> {
        let authorized = self
            .deps
            .connections
            .authorize_room(actor_id, room_key)
            .await?;
        if !authorized {
            return Err(DomainError::unauthorized(
                "no accepted connection for this room",
            )
            .into());
        }

        let now = self.deps.clock.now();
        let items = self.deps.messages.list_room(room_key, limit).await?;
        Ok(items.into_iter().filter(|m| !m.is_expired(now)).collect())
    }

    /// 团队房间历史。
    pub async fn list_team(
        &self,
        actor_id: UserId,
        team_id: TeamId,
        limit: u32,
    ) -> ApplicationResult<Vec<TeamMessage>> {
        let member = self.deps.teams.is_member(team_id, actor_id).await?;
        if !member {
            return Err(DomainError::unauthorized("not a member of this team").into());
        }
        Ok(self.deps.team_messages.list_team(team_id, limit).await?)
    }

    /// 接收方标记已读。
    /// AfterView 模式立即删除并返回删除确认（至多一次：同一ID的再次
    /// 标记或查找都是 NotFound）。其余模式写回已读标记与时间。
    pub async fn mark_read(
        &self,
        message_id: MessageId,
        actor_id: UserId,
    ) -> ApplicationResult<ReadOutcome> {
        let _guard = self
            .deps
            .locks
            .acquire(&format!("message:{message_id}"))
            .await;

        let mut message = self
            .deps
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| DomainError::not_found("message"))?;
        if message.receiver_id != actor_id {
            return Err(
                DomainError::unauthorized("only the receiver may mark a message read").into(),
            );
        }

        let now = self.deps.clock.now();
        // 已过期消息视同不存在
        if message.is_expired(now) {
            self.deps.messages.delete(message_id).await?;
            return Err(DomainError::not_found("message").into());
        }

        if message.delete_mode == DeleteMode::AfterView {
            self.deps.messages.delete(message_id).await?;
            tracing::debug!(message_id = %message_id, "after-view message deleted on read");
            return Ok(ReadOutcome::Deleted {
                message_id,
                room_key: message.room_key,
            });
        }

        message.mark_read(now);
        let stored = self.deps.messages.update(message).await?;
        Ok(ReadOutcome::Read(stored))
    }

    /// 清扫：删除所有过期的 After24h 消息，与已读状态无关。
    /// 幂等；对每条消息持与 mark_read 相同的互斥锁，避免双删竞争。
    /// 失败只记录日志，由下一个周期重试，绝不向前台调用方传播。
    pub async fn sweep(&self) -> u64 {
        let now = self.deps.clock.now();
        let expired = match self.deps.messages.list_expired(now).await {
            Ok(ids) => ids,
            Err(err) => {
                tracing::warn!(error = %err, "sweep: listing expired messages failed");
                return 0;
            }
        };

        let mut deleted = 0;
        for message_id in expired {
            let _guard = self
                .deps
                .locks
                .acquire(&format!("message:{message_id}"))
                .await;
            // 持锁重读：mark_read 可能已经删除了它
            match self.deps.messages.find_by_id(message_id).await {
                Ok(Some(message)) if message.is_expired(now) => {
                    if let Err(err) = self.deps.messages.delete(message_id).await {
                        tracing::warn!(message_id = %message_id, error = %err, "sweep: delete failed");
                    } else {
                        deleted += 1;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(message_id = %message_id, error = %err, "sweep: lookup failed");
                }
            }
        }

        if deleted > 0 {
            tracing::info!(deleted, "sweep removed expired messages");
        }
        deleted
    }
}
