//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、并发边界、
//! 以及对外部适配器（例如仓储、在线状态、房间路由）的抽象。

pub mod clock;
pub mod directory;
pub mod dto;
pub mod error;
pub mod key_locks;
pub mod memory;
pub mod presence;
pub mod repository;
pub mod router;
pub mod services;

pub use clock::{Clock, SystemClock};
pub use directory::{ProfileStore, TeamDirectory};
pub use error::ApplicationError;
pub use key_locks::KeyLocks;
pub use presence::{PresenceChange, PresenceTracker};
pub use repository::{
    ConnectionRepository, MessageRepository, RetentionRepository, TeamMessageRepository,
};
pub use router::RoomRouter;
pub use services::{
    ConnectionService, ConnectionServiceDependencies, MessageService, MessageServiceDependencies,
    ReadOutcome, RespondAction, RetentionService, RetentionServiceDependencies,
    SendPersonalMessageRequest, SendTeamMessageRequest, UpdateSettingsRequest,
};
