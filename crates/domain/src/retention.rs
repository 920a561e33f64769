//! 消息保留策略
//!
//! 每用户的默认删除模式加上按房间的覆盖项。
//! 新消息的删除模式解析顺序：房间覆盖 → 用户默认 → 系统默认（Never）。

use serde::{Deserialize, Serialize};

use crate::value_objects::{RoomKey, Timestamp, UserId};

/// 单条消息的删除模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    Never,
    AfterView,
    After24h,
}

impl Default for DeleteMode {
    fn default() -> Self {
        DeleteMode::Never
    }
}

impl DeleteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteMode::Never => "never",
            DeleteMode::AfterView => "after_view",
            DeleteMode::After24h => "after_24h",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "never" => Some(DeleteMode::Never),
            "after_view" => Some(DeleteMode::AfterView),
            "after_24h" => Some(DeleteMode::After24h),
            _ => None,
        }
    }
}

/// 按房间的删除模式覆盖项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomOverride {
    pub room_key: RoomKey,
    pub mode: DeleteMode,
}

/// 每用户的保留设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSetting {
    pub user_id: UserId,
    pub default_mode: DeleteMode,
    /// 房间键在集合内唯一
    pub room_overrides: Vec<RoomOverride>,
    pub updated_at: Timestamp,
}

impl RetentionSetting {
    pub fn new(user_id: UserId, now: Timestamp) -> Self {
        Self {
            user_id,
            default_mode: DeleteMode::Never,
            room_overrides: Vec::new(),
            updated_at: now,
        }
    }

    /// 解析指定房间的删除模式。
    pub fn resolve(&self, room_key: &RoomKey) -> DeleteMode {
        self.room_overrides
            .iter()
            .find(|o| &o.room_key == room_key)
            .map(|o| o.mode)
            .unwrap_or(self.default_mode)
    }

    pub fn set_default(&mut self, mode: DeleteMode, now: Timestamp) {
        self.default_mode = mode;
        self.updated_at = now;
    }

    /// 设置房间覆盖项，同一房间键的旧覆盖被替换。
    pub fn set_override(&mut self, room_key: RoomKey, mode: DeleteMode, now: Timestamp) {
        self.room_overrides.retain(|o| o.room_key != room_key);
        self.room_overrides.push(RoomOverride { room_key, mode });
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn key() -> RoomKey {
        RoomKey::personal(
            UserId::from(Uuid::new_v4()),
            UserId::from(Uuid::new_v4()),
        )
    }

    #[test]
    fn resolves_default_when_no_override() {
        let mut setting = RetentionSetting::new(UserId::from(Uuid::new_v4()), chrono::Utc::now());
        assert_eq!(setting.resolve(&key()), DeleteMode::Never);

        setting.set_default(DeleteMode::After24h, chrono::Utc::now());
        assert_eq!(setting.resolve(&key()), DeleteMode::After24h);
    }

    #[test]
    fn override_wins_over_default() {
        let mut setting = RetentionSetting::new(UserId::from(Uuid::new_v4()), chrono::Utc::now());
        let room = key();
        setting.set_default(DeleteMode::After24h, chrono::Utc::now());
        setting.set_override(room.clone(), DeleteMode::AfterView, chrono::Utc::now());

        assert_eq!(setting.resolve(&room), DeleteMode::AfterView);
        assert_eq!(setting.resolve(&key()), DeleteMode::After24h);
    }

    #[test]
    fn setting_override_twice_replaces() {
        let mut setting = RetentionSetting::new(UserId::from(Uuid::new_v4()), chrono::Utc::now());
        let room = key();
        setting.set_override(room.clone(), DeleteMode::AfterView, chrono::Utc::now());
        setting.set_override(room.clone(), DeleteMode::Never, chrono::Utc::now());

        assert_eq!(setting.room_overrides.len(), 1);
        assert_eq!(setting.resolve(&room), DeleteMode::Never);
    }

    #[test]
    fn delete_mode_wire_names() {
        assert_eq!(DeleteMode::parse("after_view"), Some(DeleteMode::AfterView));
        assert_eq!(DeleteMode::parse("bogus"), None);
        assert_eq!(DeleteMode::After24h.as_str(), "after_24h");
    }
}
