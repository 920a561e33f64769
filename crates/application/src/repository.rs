use async_trait::async_trait;
use domain::{
    ConnectionId, ConnectionRequest, MessageId, PersonalMessage, RepositoryError,
    RetentionSetting, RoomKey, TeamId, TeamMessage, Timestamp, UserId,
};

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn insert(&self, request: ConnectionRequest)
        -> Result<ConnectionRequest, RepositoryError>;
    async fn update(&self, request: ConnectionRequest)
        -> Result<ConnectionRequest, RepositoryError>;
    async fn find_by_id(
        &self,
        id: ConnectionId,
    ) -> Result<Option<ConnectionRequest>, RepositoryError>;
    async fn find_by_room_key(
        &self,
        room_key: &RoomKey,
    ) -> Result<Option<ConnectionRequest>, RepositoryError>;
    async fn delete(&self, id: ConnectionId) -> Result<(), RepositoryError>;
    /// 用户作为请求方的待处理请求
    async fn list_pending_sent(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ConnectionRequest>, RepositoryError>;
    /// 用户作为接收方的待处理请求
    async fn list_pending_received(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ConnectionRequest>, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: PersonalMessage)
        -> Result<PersonalMessage, RepositoryError>;
    async fn update(&self, message: PersonalMessage)
        -> Result<PersonalMessage, RepositoryError>;
    async fn find_by_id(
        &self,
        id: MessageId,
    ) -> Result<Option<PersonalMessage>, RepositoryError>;
    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError>;
    /// 房间消息，按时间升序，最多 limit 条
    async fn list_room(
        &self,
        room_key: &RoomKey,
        limit: u32,
    ) -> Result<Vec<PersonalMessage>, RepositoryError>;
    /// 截至 now 已过期的 After24h 消息ID
    async fn list_expired(&self, now: Timestamp) -> Result<Vec<MessageId>, RepositoryError>;
}

#[async_trait]
pub trait TeamMessageRepository: Send + Sync {
    async fn insert(&self, message: TeamMessage) -> Result<TeamMessage, RepositoryError>;
    async fn list_team(
        &self,
        team_id: TeamId,
        limit: u32,
    ) -> Result<Vec<TeamMessage>, RepositoryError>;
}

#[async_trait]
pub trait RetentionRepository: Send + Sync {
    async fn find_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<RetentionSetting>, RepositoryError>;
    async fn upsert(&self, setting: RetentionSetting)
        -> Result<RetentionSetting, RepositoryError>;
}
