//! 连接请求实体
//!
//! 双方互相同意的连接记录，是私聊授权的唯一依据。每个房间键最多存在一条记录。

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ConnectionId, RoomKey, Timestamp, UserId};

/// 连接请求状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
            ConnectionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ConnectionStatus::Pending),
            "accepted" => Some(ConnectionStatus::Accepted),
            "rejected" => Some(ConnectionStatus::Rejected),
            _ => None,
        }
    }
}

/// 连接请求记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub id: ConnectionId,
    pub requester_id: UserId,
    pub receiver_id: UserId,
    pub status: ConnectionStatus,
    pub room_key: RoomKey,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ConnectionRequest {
    pub fn new(
        id: ConnectionId,
        requester_id: UserId,
        receiver_id: UserId,
        now: Timestamp,
    ) -> Result<Self, DomainError> {
        if requester_id == receiver_id {
            return Err(DomainError::SelfRequest);
        }
        Ok(Self {
            id,
            requester_id,
            receiver_id,
            status: ConnectionStatus::Pending,
            room_key: RoomKey::personal(requester_id, receiver_id),
            created_at: now,
            updated_at: now,
        })
    }

    /// 接收方接受请求。只有接收方可以操作，且仅允许从 Pending 转换。
    pub fn accept(&mut self, actor: UserId, now: Timestamp) -> Result<(), DomainError> {
        self.transition(actor, ConnectionStatus::Accepted, now)
    }

    /// 接收方拒绝请求。
    pub fn reject(&mut self, actor: UserId, now: Timestamp) -> Result<(), DomainError> {
        self.transition(actor, ConnectionStatus::Rejected, now)
    }

    fn transition(
        &mut self,
        actor: UserId,
        target: ConnectionStatus,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        if actor != self.receiver_id {
            return Err(DomainError::unauthorized(
                "only the receiver may respond to a request",
            ));
        }
        if self.status != ConnectionStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "cannot respond to a {} request",
                self.status.as_str()
            )));
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    /// 被拒绝后重新发起请求：方向按新的请求者重置，状态回到 Pending。
    /// Accepted 是终态，不允许任何后续转换。
    pub fn reopen(
        &mut self,
        requester_id: UserId,
        receiver_id: UserId,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        if self.status != ConnectionStatus::Rejected {
            return Err(DomainError::invalid_state(format!(
                "cannot re-request a {} connection",
                self.status.as_str()
            )));
        }
        debug_assert_eq!(self.room_key, RoomKey::personal(requester_id, receiver_id));
        self.requester_id = requester_id;
        self.receiver_id = receiver_id;
        self.status = ConnectionStatus::Pending;
        self.updated_at = now;
        Ok(())
    }

    /// 用户是否为该记录的参与方之一。
    pub fn is_party(&self, user_id: UserId) -> bool {
        self.requester_id == user_id || self.receiver_id == user_id
    }

    /// 该记录是否授权此用户进入对应私聊房间。
    pub fn authorizes(&self, user_id: UserId) -> bool {
        self.status == ConnectionStatus::Accepted && self.is_party(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request() -> (ConnectionRequest, UserId, UserId) {
        let requester = UserId::from(Uuid::new_v4());
        let receiver = UserId::from(Uuid::new_v4());
        let req = ConnectionRequest::new(
            ConnectionId::from(Uuid::new_v4()),
            requester,
            receiver,
            chrono::Utc::now(),
        )
        .unwrap();
        (req, requester, receiver)
    }

    #[test]
    fn self_request_is_rejected() {
        let user = UserId::from(Uuid::new_v4());
        let err = ConnectionRequest::new(
            ConnectionId::from(Uuid::new_v4()),
            user,
            user,
            chrono::Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::SelfRequest);
    }

    #[test]
    fn only_receiver_may_respond() {
        let (mut req, requester, _receiver) = request();
        let err = req.accept(requester, chrono::Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized { .. }));
        assert_eq!(req.status, ConnectionStatus::Pending);
    }

    #[test]
    fn accept_is_terminal() {
        let (mut req, _requester, receiver) = request();
        req.accept(receiver, chrono::Utc::now()).unwrap();
        assert_eq!(req.status, ConnectionStatus::Accepted);

        let err = req.reject(receiver, chrono::Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));

        let err = req
            .reopen(receiver, req.requester_id, chrono::Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }

    #[test]
    fn rejected_can_be_reopened_in_either_direction() {
        let (mut req, requester, receiver) = request();
        req.reject(receiver, chrono::Utc::now()).unwrap();

        // 原接收方主动重新发起：方向翻转
        req.reopen(receiver, requester, chrono::Utc::now()).unwrap();
        assert_eq!(req.status, ConnectionStatus::Pending);
        assert_eq!(req.requester_id, receiver);
        assert_eq!(req.receiver_id, requester);
    }

    #[test]
    fn authorizes_only_accepted_parties() {
        let (mut req, requester, receiver) = request();
        assert!(!req.authorizes(requester));
        req.accept(receiver, chrono::Utc::now()).unwrap();
        assert!(req.authorizes(requester));
        assert!(req.authorizes(receiver));
        assert!(!req.authorizes(UserId::from(Uuid::new_v4())));
    }
}
