use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::dto::{MessageDto, PendingRequestsDto, RetentionSettingsDto};
use application::{ReadOutcome, RespondAction, UpdateSettingsRequest};
use domain::{ChatEvent, ConnectionId, ConnectionRequest, MessageId, RoomKey, UserId};

use crate::{error::ApiError, gateway, state::AppState};

#[derive(Debug, Deserialize)]
struct SendRequestPayload {
    receiver_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct RespondPayload {
    action: RespondAction,
}

#[derive(Debug, Deserialize)]
struct CancelPayload {
    receiver_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct MarkReadPayload {
    message_id: Uuid,
}

#[derive(Debug, Serialize)]
struct MarkReadResponse {
    message_id: domain::MessageId,
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/chat", chat_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/requests", post(send_request).get(list_requests))
        .route("/requests/{id}/respond", post(respond_request))
        .route("/requests/cancel", post(cancel_request))
        .route("/rooms/{room_key}/messages", get(get_history))
        .route("/messages/read", post(mark_read))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn send_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SendRequestPayload>,
) -> Result<(StatusCode, Json<ConnectionRequest>), ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let request = state
        .connection_service
        .send_request(user_id, UserId::from(payload.receiver_id))
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

async fn respond_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondPayload>,
) -> Result<Json<ConnectionRequest>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let request = state
        .connection_service
        .respond(ConnectionId::from(id), user_id, payload.action)
        .await?;

    Ok(Json(request))
}

async fn cancel_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CancelPayload>,
) -> Result<StatusCode, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    state
        .connection_service
        .cancel(user_id, UserId::from(payload.receiver_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PendingRequestsDto>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let pending = state.connection_service.list_pending(user_id).await?;

    Ok(Json(pending))
}

async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_key): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let room_key = RoomKey::parse(room_key).map_err(application::ApplicationError::from)?;
    let limit = query.limit.unwrap_or(50).min(200);
    let items = state
        .message_service
        .list_room(user_id, &room_key, limit)
        .await?;

    Ok(Json(items.iter().map(MessageDto::from).collect()))
}

async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MarkReadPayload>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let message_id = MessageId::from(payload.message_id);
    let outcome = state
        .message_service
        .mark_read(message_id, user_id)
        .await?;

    // 已读回执同样扇出到房间里的在线成员
    let room_key = outcome.room_key().clone();
    state
        .router
        .broadcast(
            &room_key.clone(),
            ChatEvent::MessageRead {
                room_key,
                message_id,
                reader_id: user_id,
            },
            None,
        )
        .await;

    Ok(Json(MarkReadResponse {
        message_id,
        deleted: matches!(outcome, ReadOutcome::Deleted { .. }),
    }))
}

async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RetentionSettingsDto>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let settings = state.retention_service.get_settings(user_id).await?;

    Ok(Json(settings))
}

async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<RetentionSettingsDto>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let settings = state
        .retention_service
        .update_settings(user_id, payload)
        .await?;

    Ok(Json(settings))
}

/// WebSocket 升级：token 在升级前验证，失败返回 401，不派发任何事件。
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = state.jwt_service.verify_token(&query.token)?;
    Ok(ws.on_upgrade(move |socket| gateway::handle_socket(socket, state, user_id)))
}
