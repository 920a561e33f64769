//! 基础设施层：PostgreSQL 仓储适配器与后台任务。

pub mod connections;
pub mod db;
pub mod directory;
pub mod messages;
pub mod retention;
pub mod sweeper;

pub use connections::PgConnectionRepository;
pub use db::{create_pool, DbPool};
pub use directory::{PgProfileStore, PgTeamDirectory};
pub use messages::{PgMessageRepository, PgTeamMessageRepository};
pub use retention::PgRetentionRepository;
pub use sweeper::MessageSweeper;
