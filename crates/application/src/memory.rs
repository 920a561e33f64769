//! 内存实现的仓储与目录适配器（用于测试和单机演示）

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    ConnectionId, ConnectionRequest, ConnectionStatus, MessageId, PersonalMessage,
    RepositoryError, RetentionSetting, RoomKey, TeamId, TeamMessage, Timestamp, UserId,
    UserProfile,
};
use tokio::sync::RwLock;

use crate::directory::{ProfileStore, TeamDirectory};
use crate::repository::{
    ConnectionRepository, MessageRepository, RetentionRepository, TeamMessageRepository,
};

#[derive(Default)]
pub struct MemoryConnectionRepository {
    records: RwLock<HashMap<ConnectionId, ConnectionRequest>>,
}

impl MemoryConnectionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRepository for MemoryConnectionRepository {
    async fn insert(
        &self,
        request: ConnectionRequest,
    ) -> Result<ConnectionRequest, RepositoryError> {
        let mut records = self.records.write().await;
        if records
            .values()
            .any(|r| r.room_key == request.room_key)
        {
            return Err(RepositoryError::conflict("room key already exists"));
        }
        records.insert(request.id, request.clone());
        Ok(request)
    }

    async fn update(
        &self,
        request: ConnectionRequest,
    ) -> Result<ConnectionRequest, RepositoryError> {
        let mut records = self.records.write().await;
        if !records.contains_key(&request.id) {
            return Err(RepositoryError::NotFound);
        }
        records.insert(request.id, request.clone());
        Ok(request)
    }

    async fn find_by_id(
        &self,
        id: ConnectionId,
    ) -> Result<Option<ConnectionRequest>, RepositoryError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_room_key(
        &self,
        room_key: &RoomKey,
    ) -> Result<Option<ConnectionRequest>, RepositoryError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| &r.room_key == room_key)
            .cloned())
    }

    async fn delete(&self, id: ConnectionId) -> Result<(), RepositoryError> {
        self.records.write().await.remove(&id);
        Ok(())
    }

    async fn list_pending_sent(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ConnectionRequest>, RepositoryError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == ConnectionStatus::Pending && r.requester_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_pending_received(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ConnectionRequest>, RepositoryError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == ConnectionStatus::Pending && r.receiver_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryMessageRepository {
    messages: RwLock<HashMap<MessageId, PersonalMessage>>,
}

impl MemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn insert(
        &self,
        message: PersonalMessage,
    ) -> Result<PersonalMessage, RepositoryError> {
        self.messages
            .write()
            .await
            .insert(message.id, message.clone());
        Ok(message)
    }

    async fn update(
        &self,
        message: PersonalMessage,
    ) -> Result<PersonalMessage, RepositoryError> {
        let mut messages = self.messages.write().await;
        if !messages.contains_key(&message.id) {
            return Err(RepositoryError::NotFound);
        }
        messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_by_id(
        &self,
        id: MessageId,
    ) -> Result<Option<PersonalMessage>, RepositoryError> {
        Ok(self.messages.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError> {
        self.messages.write().await.remove(&id);
        Ok(())
    }

    async fn list_room(
        &self,
        room_key: &RoomKey,
        limit: u32,
    ) -> Result<Vec<PersonalMessage>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut items: Vec<PersonalMessage> = messages
            .values()
            .filter(|m| &m.room_key == room_key)
            .cloned()
            .collect();
        items.sort_by_key(|m| m.created_at);
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn list_expired(&self, now: Timestamp) -> Result<Vec<MessageId>, RepositoryError> {
        Ok(self
            .messages
            .read()
            .await
            .values()
            .filter(|m| m.is_expired(now))
            .map(|m| m.id)
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryTeamMessageRepository {
    messages: RwLock<Vec<TeamMessage>>,
}

impl MemoryTeamMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TeamMessageRepository for MemoryTeamMessageRepository {
    async fn insert(&self, message: TeamMessage) -> Result<TeamMessage, RepositoryError> {
        self.messages.write().await.push(message.clone());
        Ok(message)
    }

    async fn list_team(
        &self,
        team_id: TeamId,
        limit: u32,
    ) -> Result<Vec<TeamMessage>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut items: Vec<TeamMessage> = messages
            .iter()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        items.sort_by_key(|m| m.created_at);
        items.truncate(limit as usize);
        Ok(items)
    }
}

#[derive(Default)]
pub struct MemoryRetentionRepository {
    settings: RwLock<HashMap<UserId, RetentionSetting>>,
}

impl MemoryRetentionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RetentionRepository for MemoryRetentionRepository {
    async fn find_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<RetentionSetting>, RepositoryError> {
        Ok(self.settings.read().await.get(&user_id).cloned())
    }

    async fn upsert(
        &self,
        setting: RetentionSetting,
    ) -> Result<RetentionSetting, RepositoryError> {
        self.settings
            .write()
            .await
            .insert(setting.user_id, setting.clone());
        Ok(setting)
    }
}

/// 内存用户档案，测试用。
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<UserId, UserProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, profile: UserProfile) {
        self.profiles.write().await.insert(profile.id, profile);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_profile(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }
}

/// 内存团队目录，测试用。
#[derive(Default)]
pub struct MemoryTeamDirectory {
    members: RwLock<HashMap<TeamId, Vec<UserId>>>,
}

impl MemoryTeamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_member(&self, team_id: TeamId, user_id: UserId) {
        self.members
            .write()
            .await
            .entry(team_id)
            .or_default()
            .push(user_id);
    }
}

#[async_trait]
impl TeamDirectory for MemoryTeamDirectory {
    async fn is_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .members
            .read()
            .await
            .get(&team_id)
            .map(|m| m.contains(&user_id))
            .unwrap_or(false))
    }
}

/// 便捷构造：一组全新的内存适配器。
pub fn test_adapters() -> (
    Arc<MemoryConnectionRepository>,
    Arc<MemoryMessageRepository>,
    Arc<MemoryRetentionRepository>,
) {
    (
        Arc::new(MemoryConnectionRepository::new()),
        Arc::new(MemoryMessageRepository::new()),
        Arc::new(MemoryRetentionRepository::new()),
    )
}
