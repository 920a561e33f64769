//! 保留策略用例服务
//!
//! 新消息删除模式的解析是纯函数：房间覆盖 → 用户默认 → 系统默认（Never）。

use std::sync::Arc;

use domain::{DeleteMode, RetentionSetting, RoomKey, UserId};
use serde::Deserialize;

use crate::clock::Clock;
use crate::dto::RetentionSettingsDto;
use crate::error::ApplicationResult;
use crate::repository::RetentionRepository;

/// 设置更新请求：缺省字段保持不变。
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSettingsRequest {
    pub default_delete_mode: Option<DeleteMode>,
    pub room_key: Option<RoomKey>,
    pub delete_mode: Option<DeleteMode>,
}

pub struct RetentionServiceDependencies {
    pub settings: Arc<dyn RetentionRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct RetentionService {
    deps: RetentionServiceDependencies,
}

impl RetentionService {
    pub fn new(deps: RetentionServiceDependencies) -> Self {
        Self { deps }
    }

    /// 解析发送者在指定房间的删除模式。无设置时为系统默认 Never。
    pub async fn resolve_delete_mode(
        &self,
        sender_id: UserId,
        room_key: &RoomKey,
    ) -> ApplicationResult<DeleteMode> {
        let setting = self.deps.settings.find_by_user(sender_id).await?;
        Ok(setting
            .map(|s| s.resolve(room_key))
            .unwrap_or(DeleteMode::Never))
    }

    pub async fn get_settings(&self, user_id: UserId) -> ApplicationResult<RetentionSettingsDto> {
        let setting = self
            .deps
            .settings
            .find_by_user(user_id)
            .await?
            .unwrap_or_else(|| RetentionSetting::new(user_id, self.deps.clock.now()));
        Ok(RetentionSettingsDto::from(&setting))
    }

    /// 更新默认模式和/或单个房间覆盖项。
    pub async fn update_settings(
        &self,
        user_id: UserId,
        request: UpdateSettingsRequest,
    ) -> ApplicationResult<RetentionSettingsDto> {
        let now = self.deps.clock.now();
        let mut setting = self
            .deps
            .settings
            .find_by_user(user_id)
            .await?
            .unwrap_or_else(|| RetentionSetting::new(user_id, now));

        if let Some(mode) = request.default_delete_mode {
            setting.set_default(mode, now);
        }
        if let (Some(room_key), Some(mode)) = (request.room_key, request.delete_mode) {
            setting.set_override(room_key, mode, now);
        }

        let stored = self.deps.settings.upsert(setting).await?;
        tracing::info!(user_id = %user_id, "retention settings updated");
        Ok(RetentionSettingsDto::from(&stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::memory::MemoryRetentionRepository;
    use uuid::Uuid;

    fn service() -> RetentionService {
        RetentionService::new(RetentionServiceDependencies {
            settings: Arc::new(MemoryRetentionRepository::new()),
            clock: Arc::new(SystemClock),
        })
    }

    fn room() -> RoomKey {
        RoomKey::personal(
            UserId::from(Uuid::new_v4()),
            UserId::from(Uuid::new_v4()),
        )
    }

    #[tokio::test]
    async fn defaults_to_never_without_settings() {
        let service = service();
        let mode = service
            .resolve_delete_mode(UserId::from(Uuid::new_v4()), &room())
            .await
            .unwrap();
        assert_eq!(mode, DeleteMode::Never);
    }

    #[tokio::test]
    async fn override_beats_user_default() {
        let service = service();
        let user = UserId::from(Uuid::new_v4());
        let special = room();

        service
            .update_settings(
                user,
                UpdateSettingsRequest {
                    default_delete_mode: Some(DeleteMode::After24h),
                    room_key: Some(special.clone()),
                    delete_mode: Some(DeleteMode::AfterView),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            service.resolve_delete_mode(user, &special).await.unwrap(),
            DeleteMode::AfterView
        );
        assert_eq!(
            service.resolve_delete_mode(user, &room()).await.unwrap(),
            DeleteMode::After24h
        );
    }

    #[test]
    fn settings_request_rejects_malformed_room_key() {
        let malformed = serde_json::from_str::<UpdateSettingsRequest>(
            r#"{"room_key":"!!!not-a-room!!!","delete_mode":"never"}"#,
        );
        assert!(malformed.is_err());

        let valid = format!(r#"{{"room_key":"{}","delete_mode":"after_view"}}"#, room());
        let request: UpdateSettingsRequest = serde_json::from_str(&valid).unwrap();
        assert!(request.room_key.is_some());
    }

    #[tokio::test]
    async fn get_settings_returns_defaults_for_new_user() {
        let service = service();
        let dto = service
            .get_settings(UserId::from(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(dto.default_delete_mode, DeleteMode::Never);
        assert!(dto.room_overrides.is_empty());
    }
}
