//! 连接请求用例服务
//!
//! 实现双方互相同意的状态机：发起、接受/拒绝、取消、授权检查。
//! 同一房间键上的并发操作通过按键互斥锁串行化，保证每个房间键
//! 最多存在一条记录，且并发转换只有一个获胜。

use std::sync::Arc;

use domain::{
    ChatEvent, ConnectionId, ConnectionRequest, ConnectionStatus, DomainError, RoomKey, UserId,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::directory::ProfileStore;
use crate::dto::{ConnectionRequestDto, PendingRequestsDto};
use crate::error::ApplicationResult;
use crate::key_locks::KeyLocks;
use crate::repository::ConnectionRepository;
use crate::router::RoomRouter;

/// 对请求的响应动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespondAction {
    Accept,
    Reject,
}

pub struct ConnectionServiceDependencies {
    pub connections: Arc<dyn ConnectionRepository>,
    pub profiles: Arc<dyn ProfileStore>,
    pub clock: Arc<dyn Clock>,
    pub router: Arc<RoomRouter>,
    pub locks: Arc<KeyLocks>,
}

pub struct ConnectionService {
    deps: ConnectionServiceDependencies,
}

impl ConnectionService {
    pub fn new(deps: ConnectionServiceDependencies) -> Self {
        Self { deps }
    }

    /// 发起连接请求。
    ///
    /// 房间键上无记录 → 创建 Pending；已 Accepted → AlreadyConnected；
    /// 已 Pending（无论方向）→ RequestPending；已 Rejected → 按新方向
    /// 重置为 Pending。成功路径都返回记录本身。
    pub async fn send_request(
        &self,
        requester_id: UserId,
        receiver_id: UserId,
    ) -> ApplicationResult<ConnectionRequest> {
        if requester_id == receiver_id {
            return Err(DomainError::SelfRequest.into());
        }
        let room_key = RoomKey::personal(requester_id, receiver_id);
        let _guard = self.deps.locks.acquire(room_key.as_str()).await;

        let now = self.deps.clock.now();
        let existing = self.deps.connections.find_by_room_key(&room_key).await?;

        let request = match existing {
            None => {
                let request = ConnectionRequest::new(
                    ConnectionId::from(Uuid::new_v4()),
                    requester_id,
                    receiver_id,
                    now,
                )?;
                self.deps.connections.insert(request).await?
            }
            Some(record) => match record.status {
                ConnectionStatus::Accepted => {
                    return Err(DomainError::AlreadyConnected.into());
                }
                ConnectionStatus::Pending => {
                    return Err(DomainError::RequestPending.into());
                }
                ConnectionStatus::Rejected => {
                    let mut record = record;
                    record.reopen(requester_id, receiver_id, now)?;
                    self.deps.connections.update(record).await?
                }
            },
        };

        tracing::info!(
            requester_id = %requester_id,
            receiver_id = %receiver_id,
            room_key = %request.room_key,
            "connection request sent"
        );
        self.notify_receiver(&request).await;
        Ok(request)
    }

    /// 接收方接受或拒绝请求。
    pub async fn respond(
        &self,
        connection_id: ConnectionId,
        actor_id: UserId,
        action: RespondAction,
    ) -> ApplicationResult<ConnectionRequest> {
        // 先定位记录以取得房间键，再持锁重读，避免与并发转换交错
        let record = self
            .deps
            .connections
            .find_by_id(connection_id)
            .await?
            .ok_or_else(|| DomainError::not_found("connection request"))?;
        let _guard = self.deps.locks.acquire(record.room_key.as_str()).await;

        let mut record = self
            .deps
            .connections
            .find_by_id(connection_id)
            .await?
            .ok_or_else(|| DomainError::not_found("connection request"))?;

        let now = self.deps.clock.now();
        match action {
            RespondAction::Accept => record.accept(actor_id, now)?,
            RespondAction::Reject => record.reject(actor_id, now)?,
        }
        let record = self.deps.connections.update(record).await?;

        tracing::info!(
            connection_id = %record.id,
            actor_id = %actor_id,
            status = record.status.as_str(),
            "connection request responded"
        );
        if record.status == ConnectionStatus::Accepted {
            self.notify_requester_accepted(&record).await;
        }
        Ok(record)
    }

    /// 请求方撤回自己的待处理请求，回到无记录状态。
    pub async fn cancel(
        &self,
        requester_id: UserId,
        receiver_id: UserId,
    ) -> ApplicationResult<()> {
        let room_key = RoomKey::personal(requester_id, receiver_id);
        let _guard = self.deps.locks.acquire(room_key.as_str()).await;

        let record = self.deps.connections.find_by_room_key(&room_key).await?;
        match record {
            Some(record)
                if record.status == ConnectionStatus::Pending
                    && record.requester_id == requester_id =>
            {
                self.deps.connections.delete(record.id).await?;
                tracing::info!(
                    requester_id = %requester_id,
                    room_key = %room_key,
                    "connection request cancelled"
                );
                Ok(())
            }
            _ => Err(DomainError::invalid_state(
                "no pending request from this requester",
            )
            .into()),
        }
    }

    /// 私聊房间授权：存在 Accepted 记录且用户是参与方之一。
    /// 所有私聊房间的加入与消息发送都必须经过这里。
    pub async fn authorize_room(
        &self,
        user_id: UserId,
        room_key: &RoomKey,
    ) -> ApplicationResult<bool> {
        let record = self.deps.connections.find_by_room_key(room_key).await?;
        Ok(record.map(|r| r.authorizes(user_id)).unwrap_or(false))
    }

    /// 用户的待处理请求（发出与收到两组），带对端档案。
    pub async fn list_pending(&self, user_id: UserId) -> ApplicationResult<PendingRequestsDto> {
        let sent = self.deps.connections.list_pending_sent(user_id).await?;
        let received = self
            .deps
            .connections
            .list_pending_received(user_id)
            .await?;

        let mut sent_dtos = Vec::with_capacity(sent.len());
        for request in sent {
            let counterpart = self.profile_of(request.receiver_id).await;
            sent_dtos.push(ConnectionRequestDto::new(request, counterpart));
        }
        let mut received_dtos = Vec::with_capacity(received.len());
        for request in received {
            let counterpart = self.profile_of(request.requester_id).await;
            received_dtos.push(ConnectionRequestDto::new(request, counterpart));
        }

        Ok(PendingRequestsDto {
            sent: sent_dtos,
            received: received_dtos,
        })
    }

    async fn profile_of(&self, user_id: UserId) -> Option<domain::UserProfile> {
        match self.deps.profiles.find_profile(user_id).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "profile lookup failed");
                None
            }
        }
    }

    /// 推送"收到新请求"到接收方的通知房间。接收方不在线时静默丢弃。
    async fn notify_receiver(&self, request: &ConnectionRequest) {
        let requester = self.profile_of(request.requester_id).await;
        let event = ChatEvent::RequestReceived {
            request: request.clone(),
            requester,
        };
        self.deps
            .router
            .broadcast(&RoomKey::user(request.receiver_id), event, None)
            .await;
    }

    /// 推送"请求被接受"到请求方的通知房间。
    async fn notify_requester_accepted(&self, request: &ConnectionRequest) {
        let receiver = self.profile_of(request.receiver_id).await;
        let event = ChatEvent::RequestAccepted {
            request: request.clone(),
            receiver,
        };
        self.deps
            .router
            .broadcast(&RoomKey::user(request.requester_id), event, None)
            .await;
    }
}
