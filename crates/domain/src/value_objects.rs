use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// 用户唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<UserId> for Uuid {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// 团队唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub Uuid);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TeamId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<TeamId> for Uuid {
    fn from(value: TeamId) -> Self {
        value.0
    }
}

/// 消息唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<MessageId> for Uuid {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

/// 连接请求记录唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ConnectionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<ConnectionId> for Uuid {
    fn from(value: ConnectionId) -> Self {
        value.0
    }
}

/// 一条活跃 WebSocket 连接的句柄标识。
/// 同一用户的多个设备持有不同的句柄。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(pub Uuid);

impl HandleId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 房间键：双人会话的规范标识。
///
/// 私聊房间键由两个用户ID的字符串形式按字典序排序后用 `_` 连接而成，
/// 保证 `personal(a, b) == personal(b, a)`。团队房间键为 `team_<uuid>`，
/// 用户通知房间键为用户ID本身。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RoomKey(String);

/// 反序列化必须走 `parse`，否则请求体里的任意字符串会绕过格式校验。
impl<'de> Deserialize<'de> for RoomKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        RoomKey::parse(value).map_err(serde::de::Error::custom)
    }
}

const TEAM_PREFIX: &str = "team_";

impl RoomKey {
    /// 由无序用户对生成规范的私聊房间键。
    pub fn personal(a: UserId, b: UserId) -> Self {
        let (first, second) = if a.0.to_string() <= b.0.to_string() {
            (a, b)
        } else {
            (b, a)
        };
        Self(format!("{}_{}", first.0, second.0))
    }

    /// 团队房间键。
    pub fn team(team_id: TeamId) -> Self {
        Self(format!("{TEAM_PREFIX}{}", team_id.0))
    }

    /// 用户通知房间键：每条连接自动订阅自己的通知房间，
    /// 用于定向推送请求通知等事件。
    pub fn user(user_id: UserId) -> Self {
        Self(user_id.0.to_string())
    }

    /// 校验外部传入的房间键格式。
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if let Some(rest) = value.strip_prefix(TEAM_PREFIX) {
            Uuid::parse_str(rest).map_err(|_| {
                DomainError::validation("room_key", "invalid team room key")
            })?;
            return Ok(Self(value));
        }
        match value.split_once('_') {
            Some((a, b)) => {
                let a = Uuid::parse_str(a)
                    .map_err(|_| DomainError::validation("room_key", "invalid room key"))?;
                let b = Uuid::parse_str(b)
                    .map_err(|_| DomainError::validation("room_key", "invalid room key"))?;
                if a.to_string() > b.to_string() {
                    return Err(DomainError::validation("room_key", "not in canonical order"));
                }
                Ok(Self(value))
            }
            None => {
                Uuid::parse_str(&value)
                    .map_err(|_| DomainError::validation("room_key", "invalid room key"))?;
                Ok(Self(value))
            }
        }
    }

    /// 若为私聊房间键，返回双方用户ID。
    pub fn parties(&self) -> Option<(UserId, UserId)> {
        if self.0.starts_with(TEAM_PREFIX) {
            return None;
        }
        let (a, b) = self.0.split_once('_')?;
        let a = Uuid::parse_str(a).ok()?;
        let b = Uuid::parse_str(b).ok()?;
        Some((UserId::from(a), UserId::from(b)))
    }

    pub fn is_team(&self) -> bool {
        self.0.starts_with(TEAM_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 消息正文：文本和/或媒体链接，至少一项非空。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    text: Option<String>,
    media_url: Option<String>,
}

impl MessageBody {
    pub fn new(
        text: Option<String>,
        media_url: Option<String>,
    ) -> Result<Self, DomainError> {
        let text = text
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());
        let media_url = media_url.filter(|m| !m.trim().is_empty());
        if text.is_none() && media_url.is_none() {
            return Err(DomainError::validation(
                "body",
                "message requires text or media",
            ));
        }
        Ok(Self { text, media_url })
    }

    pub fn text(text: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(Some(text.into()), None)
    }

    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn media_url(&self) -> Option<&str> {
        self.media_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_key_is_symmetric() {
        let a = UserId::from(Uuid::new_v4());
        let b = UserId::from(Uuid::new_v4());
        assert_eq!(RoomKey::personal(a, b), RoomKey::personal(b, a));
    }

    #[test]
    fn room_key_parse_roundtrip() {
        let a = UserId::from(Uuid::new_v4());
        let b = UserId::from(Uuid::new_v4());
        let key = RoomKey::personal(a, b);
        let parsed = RoomKey::parse(key.as_str().to_owned()).unwrap();
        assert_eq!(parsed, key);

        let (x, y) = parsed.parties().unwrap();
        assert!(x == a && y == b || x == b && y == a);
    }

    #[test]
    fn room_key_rejects_garbage() {
        assert!(RoomKey::parse("not-a-room").is_err());
        assert!(RoomKey::parse("team_garbage").is_err());
    }

    #[test]
    fn room_key_deserialization_validates_format() {
        assert!(serde_json::from_str::<RoomKey>(r#""!!!not-a-room!!!""#).is_err());
        assert!(serde_json::from_str::<RoomKey>(r#""team_garbage""#).is_err());

        let key = RoomKey::personal(
            UserId::from(Uuid::new_v4()),
            UserId::from(Uuid::new_v4()),
        );
        let json = serde_json::to_string(&key).unwrap();
        let back: RoomKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn team_room_key_has_no_parties() {
        let key = RoomKey::team(TeamId::from(Uuid::new_v4()));
        assert!(key.is_team());
        assert!(key.parties().is_none());
    }

    #[test]
    fn message_body_requires_content() {
        assert!(MessageBody::new(None, None).is_err());
        assert!(MessageBody::new(Some("   ".to_string()), None).is_err());
        let body = MessageBody::text("hi").unwrap();
        assert_eq!(body.text_content(), Some("hi"));
    }
}
