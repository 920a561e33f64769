//! HTTP 层响应 DTO

use serde::Serialize;

use domain::{
    ConnectionRequest, ConnectionStatus, DeleteMode, PersonalMessage, RetentionSetting,
    RoomOverride, UserProfile,
};

/// 连接请求视图，带对端档案用于列表展示。
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionRequestDto {
    pub id: domain::ConnectionId,
    pub requester_id: domain::UserId,
    pub receiver_id: domain::UserId,
    pub status: ConnectionStatus,
    pub room_key: domain::RoomKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<UserProfile>,
    pub created_at: domain::Timestamp,
    pub updated_at: domain::Timestamp,
}

impl ConnectionRequestDto {
    pub fn new(request: ConnectionRequest, counterpart: Option<UserProfile>) -> Self {
        Self {
            id: request.id,
            requester_id: request.requester_id,
            receiver_id: request.receiver_id,
            status: request.status,
            room_key: request.room_key,
            counterpart,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// 待处理请求列表：用户作为发起方与接收方的两组。
#[derive(Debug, Clone, Serialize)]
pub struct PendingRequestsDto {
    pub sent: Vec<ConnectionRequestDto>,
    pub received: Vec<ConnectionRequestDto>,
}

/// 消息视图。
#[derive(Debug, Clone, Serialize)]
pub struct MessageDto {
    pub id: domain::MessageId,
    pub room_key: domain::RoomKey,
    pub sender_id: domain::UserId,
    pub receiver_id: domain::UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub delete_mode: DeleteMode,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<domain::Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<domain::Timestamp>,
    pub created_at: domain::Timestamp,
}

impl From<&PersonalMessage> for MessageDto {
    fn from(message: &PersonalMessage) -> Self {
        Self {
            id: message.id,
            room_key: message.room_key.clone(),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            text: message.body.text_content().map(str::to_owned),
            media_url: message.body.media_url().map(str::to_owned),
            delete_mode: message.delete_mode,
            read: message.read,
            read_at: message.read_at,
            expires_at: message.expires_at,
            created_at: message.created_at,
        }
    }
}

/// 保留设置视图。
#[derive(Debug, Clone, Serialize)]
pub struct RetentionSettingsDto {
    pub default_delete_mode: DeleteMode,
    pub room_overrides: Vec<RoomOverride>,
}

impl From<&RetentionSetting> for RetentionSettingsDto {
    fn from(setting: &RetentionSetting) -> Self {
        Self {
            default_delete_mode: setting.default_mode,
            room_overrides: setting.room_overrides.clone(),
        }
    }
}
