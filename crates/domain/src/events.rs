//! 实时通道事件
//!
//! 定义服务器推送给客户端的事件词汇表。所有事件以 `type` 标签序列化为 JSON。

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionRequest;
use crate::message::{PersonalMessage, TeamMessage};
use crate::user::UserProfile;
use crate::value_objects::{MessageId, RoomKey, Timestamp, UserId};

/// 服务器推送事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// 私聊消息投递。发送方也会收到回显副本，用于对账客户端生成的关联ID。
    ReceivePersonalMessage {
        message: PersonalMessage,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_correlation_id: Option<String>,
    },

    /// 团队消息投递
    ReceiveMessage {
        message: TeamMessage,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_correlation_id: Option<String>,
    },

    /// 正在输入（不回显给发起者）
    TypingStart { room_key: RoomKey, username: String },

    /// 停止输入（不回显给发起者）
    TypingStop { room_key: RoomKey, username: String },

    /// 已读回执扇出
    MessageRead {
        room_key: RoomKey,
        message_id: MessageId,
        reader_id: UserId,
    },

    /// 用户上下线广播
    UserStatusChange {
        user_id: UserId,
        online: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_seen: Option<Timestamp>,
    },

    /// 收到新的连接请求（推送到接收方的通知房间）
    RequestReceived {
        request: ConnectionRequest,
        #[serde(skip_serializing_if = "Option::is_none")]
        requester: Option<UserProfile>,
    },

    /// 请求被接受（推送到请求方的通知房间）
    RequestAccepted {
        request: ConnectionRequest,
        #[serde(skip_serializing_if = "Option::is_none")]
        receiver: Option<UserProfile>,
    },

    /// 业务规则错误，投递到当前连接，不关闭连接
    Error { message: String },
}

impl ChatEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ChatEvent::Error {
            message: message.into(),
        }
    }

    /// 获取事件类型名称
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::ReceivePersonalMessage { .. } => "receive_personal_message",
            ChatEvent::ReceiveMessage { .. } => "receive_message",
            ChatEvent::TypingStart { .. } => "typing_start",
            ChatEvent::TypingStop { .. } => "typing_stop",
            ChatEvent::MessageRead { .. } => "message_read",
            ChatEvent::UserStatusChange { .. } => "user_status_change",
            ChatEvent::RequestReceived { .. } => "request_received",
            ChatEvent::RequestAccepted { .. } => "request_accepted",
            ChatEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ChatEvent::UserStatusChange {
            user_id: UserId::from(Uuid::new_v4()),
            online: true,
            last_seen: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user_status_change");
        assert_eq!(json["online"], true);
        // last_seen 为 None 时不序列化
        assert!(json.get("last_seen").is_none());
    }

    #[test]
    fn error_event_roundtrip() {
        let event = ChatEvent::error("nope");
        let json = serde_json::to_string(&event).unwrap();
        let back: ChatEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), "error");
    }
}
