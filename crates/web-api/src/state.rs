use std::sync::Arc;

use application::{
    ConnectionService, MessageService, PresenceTracker, RetentionService, RoomRouter,
    TeamDirectory,
};
use config::RealtimeConfig;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub connection_service: Arc<ConnectionService>,
    pub message_service: Arc<MessageService>,
    pub retention_service: Arc<RetentionService>,
    pub presence: Arc<dyn PresenceTracker>,
    pub router: Arc<RoomRouter>,
    pub teams: Arc<dyn TeamDirectory>,
    pub jwt_service: Arc<JwtService>,
    pub realtime: RealtimeConfig,
}
