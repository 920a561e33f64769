mod connection_service;
mod message_service;
mod retention_service;

pub use connection_service::{
    ConnectionService, ConnectionServiceDependencies, RespondAction,
};
pub use message_service::{
    MessageService, MessageServiceDependencies, ReadOutcome, SendPersonalMessageRequest,
    SendTeamMessageRequest,
};
pub use retention_service::{
    RetentionService, RetentionServiceDependencies, UpdateSettingsRequest,
};

#[cfg(test)]
mod connection_service_tests;
