//! 私聊系统核心领域模型
//!
//! 包含连接请求、私聊消息、保留策略等核心实体，以及相关的业务规则。

pub mod connection;
pub mod errors;
pub mod events;
pub mod message;
pub mod retention;
pub mod user;
pub mod value_objects;

pub use connection::{ConnectionRequest, ConnectionStatus};
pub use errors::{DomainError, DomainResult, RepositoryError, RepositoryResult};
pub use events::ChatEvent;
pub use message::{PersonalMessage, TeamMessage, AUTO_DELETE_TTL_HOURS};
pub use retention::{DeleteMode, RetentionSetting, RoomOverride};
pub use user::UserProfile;
pub use value_objects::{
    ConnectionId, HandleId, MessageBody, MessageId, RoomKey, TeamId, Timestamp, UserId,
};
