//! 实时网关
//!
//! 每条 WebSocket 连接对应一个句柄：升级前验证 token，升级后注册到
//! 房间路由器并自动加入自己的通知房间。套接字拆分为发送任务
//! （mpsc → sink，序列化 ChatEvent）与接收循环（解析并分发客户端事件）。
//! 业务规则错误以 Error 事件回给当前连接，绝不断开；空闲超时则关闭。

use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use application::{
    ApplicationError, SendPersonalMessageRequest, SendTeamMessageRequest,
};
use domain::{ChatEvent, HandleId, MessageId, RoomKey, TeamId, UserId};

use crate::state::AppState;

/// 客户端到服务器的事件
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientEvent {
    JoinPersonalChat {
        room_key: String,
    },
    JoinTeam {
        team_id: Uuid,
    },
    SendPersonalMessage {
        room_key: String,
        receiver_id: Uuid,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        media_url: Option<String>,
        #[serde(default)]
        client_correlation_id: Option<String>,
    },
    SendMessage {
        team_id: Uuid,
        text: String,
        #[serde(default)]
        linked_task_id: Option<Uuid>,
        #[serde(default)]
        client_correlation_id: Option<String>,
    },
    TypingStart {
        room_key: String,
        username: String,
    },
    TypingStop {
        room_key: String,
        username: String,
    },
    MessageRead {
        message_id: Uuid,
    },
    /// 旧客户端在连接后仍会发送一次，身份已由 token 确定，忽略。
    UserConnected {},
}

pub async fn handle_socket(socket: WebSocket, state: AppState, user_id: UserId) {
    let handle = HandleId::generate();
    let (tx, mut rx) = mpsc::unbounded_channel::<ChatEvent>();

    state.router.register(handle, tx.clone()).await;
    // 每条连接自动订阅自己的通知房间
    state.router.join(handle, RoomKey::user(user_id)).await;

    if let Some(change) = state.presence.connect(handle, user_id).await {
        state
            .router
            .broadcast_all(ChatEvent::UserStatusChange {
                user_id: change.user_id,
                online: change.online,
                last_seen: change.last_seen,
            })
            .await;
    }
    tracing::info!(user_id = %user_id, handle = %handle, "websocket connected");

    let (mut sender, mut incoming) = socket.split();

    // 发送任务：路由器投递的事件统一从这里落到套接字
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize websocket payload");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // 接收循环：空闲超时关闭连接
    let idle_timeout = Duration::from_secs(state.realtime.idle_timeout_secs);
    loop {
        let message = match tokio::time::timeout(idle_timeout, incoming.next()).await {
            Ok(Some(Ok(message))) => message,
            Ok(_) => break,
            Err(_) => {
                tracing::info!(user_id = %user_id, "websocket idle timeout");
                break;
            }
        };

        match message {
            WsMessage::Text(text) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        // 畸形帧只回错误事件，不断开
                        let _ = tx.send(ChatEvent::error(format!("malformed event: {err}")));
                        continue;
                    }
                };
                if let Err(err) = dispatch(&state, user_id, handle, event).await {
                    let _ = tx.send(ChatEvent::error(err.to_string()));
                }
            }
            WsMessage::Close(_) => break,
            // ping/pong 由 axum 处理，二进制帧忽略
            _ => {}
        }
    }

    state.router.unregister(handle).await;
    if let Some(change) = state
        .presence
        .disconnect(handle, chrono::Utc::now())
        .await
    {
        state
            .router
            .broadcast_all(ChatEvent::UserStatusChange {
                user_id: change.user_id,
                online: change.online,
                last_seen: change.last_seen,
            })
            .await;
    }
    send_task.abort();
    tracing::info!(user_id = %user_id, handle = %handle, "websocket disconnected");
}

async fn dispatch(
    state: &AppState,
    user_id: UserId,
    handle: HandleId,
    event: ClientEvent,
) -> Result<(), ApplicationError> {
    match event {
        ClientEvent::JoinPersonalChat { room_key } => {
            let room_key = RoomKey::parse(room_key)?;
            let authorized = state
                .connection_service
                .authorize_room(user_id, &room_key)
                .await?;
            if !authorized {
                return Err(domain::DomainError::unauthorized(
                    "no accepted connection for this room",
                )
                .into());
            }
            state.router.join(handle, room_key).await;
        }
        ClientEvent::JoinTeam { team_id } => {
            let team_id = TeamId::from(team_id);
            let member = state
                .teams
                .is_member(team_id, user_id)
                .await
                .map_err(ApplicationError::from)?;
            if !member {
                return Err(
                    domain::DomainError::unauthorized("not a member of this team").into(),
                );
            }
            state.router.join(handle, RoomKey::team(team_id)).await;
        }
        ClientEvent::SendPersonalMessage {
            room_key,
            receiver_id,
            text,
            media_url,
            client_correlation_id,
        } => {
            let room_key = RoomKey::parse(room_key)?;
            let message = state
                .message_service
                .append_personal(SendPersonalMessageRequest {
                    sender_id: user_id,
                    receiver_id: UserId::from(receiver_id),
                    room_key: room_key.clone(),
                    text,
                    media_url,
                })
                .await?;
            // 发送方同样收到回显副本，用于对账关联ID
            state
                .router
                .broadcast(
                    &room_key,
                    ChatEvent::ReceivePersonalMessage {
                        message,
                        client_correlation_id,
                    },
                    None,
                )
                .await;
        }
        ClientEvent::SendMessage {
            team_id,
            text,
            linked_task_id,
            client_correlation_id,
        } => {
            let team_id = TeamId::from(team_id);
            let message = state
                .message_service
                .append_team(SendTeamMessageRequest {
                    sender_id: user_id,
                    team_id,
                    text,
                    linked_task_id,
                })
                .await?;
            state
                .router
                .broadcast(
                    &RoomKey::team(team_id),
                    ChatEvent::ReceiveMessage {
                        message,
                        client_correlation_id,
                    },
                    None,
                )
                .await;
        }
        ClientEvent::TypingStart { room_key, username } => {
            let room_key = RoomKey::parse(room_key)?;
            ensure_room_member(state, handle, &room_key).await?;
            // 输入指示不回显给发起者
            state
                .router
                .broadcast(
                    &room_key.clone(),
                    ChatEvent::TypingStart { room_key, username },
                    Some(handle),
                )
                .await;
        }
        ClientEvent::TypingStop { room_key, username } => {
            let room_key = RoomKey::parse(room_key)?;
            ensure_room_member(state, handle, &room_key).await?;
            state
                .router
                .broadcast(
                    &room_key.clone(),
                    ChatEvent::TypingStop { room_key, username },
                    Some(handle),
                )
                .await;
        }
        ClientEvent::MessageRead { message_id } => {
            let message_id = MessageId::from(message_id);
            let outcome = state.message_service.mark_read(message_id, user_id).await?;
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
        }
        ClientEvent::UserConnected {} => {}
    }
    Ok(())
}

/// 输入指示只能发往当前句柄已加入的房间，而 join 本身已做过
/// 连接授权或团队成员检查。
async fn ensure_room_member(
    state: &AppState,
    handle: HandleId,
    room_key: &RoomKey,
) -> Result<(), ApplicationError> {
    if state.router.is_member(handle, room_key).await {
        return Ok(());
    }
    Err(domain::DomainError::unauthorized("join the room first").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use application::memory::{
        test_adapters, MemoryProfileStore, MemoryTeamDirectory, MemoryTeamMessageRepository,
    };
    use application::presence::MemoryPresenceTracker;
    use application::{
        Clock, ConnectionService, ConnectionServiceDependencies, KeyLocks, MessageService,
        MessageServiceDependencies, RespondAction, RetentionService,
        RetentionServiceDependencies, RoomRouter, SystemClock,
    };
    use config::{JwtConfig, RealtimeConfig};
    use domain::DomainError;

    use crate::JwtService;

    fn make_state() -> AppState {
        let (connections, messages, settings) = test_adapters();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let locks = Arc::new(KeyLocks::new());
        let router = Arc::new(RoomRouter::new());
        let teams = Arc::new(MemoryTeamDirectory::new());

        let connection_service =
            Arc::new(ConnectionService::new(ConnectionServiceDependencies {
                connections,
                profiles: Arc::new(MemoryProfileStore::new()),
                clock: clock.clone(),
                router: router.clone(),
                locks: locks.clone(),
            }));
        let retention_service = Arc::new(RetentionService::new(RetentionServiceDependencies {
            settings,
            clock: clock.clone(),
        }));
        let message_service = Arc::new(MessageService::new(MessageServiceDependencies {
            messages,
            team_messages: Arc::new(MemoryTeamMessageRepository::new()),
            connections: connection_service.clone(),
            retention: retention_service.clone(),
            teams: teams.clone(),
            clock,
            locks,
        }));

        AppState {
            connection_service,
            message_service,
            retention_service,
            presence: Arc::new(MemoryPresenceTracker::new()),
            router,
            teams,
            jwt_service: Arc::new(JwtService::new(JwtConfig {
                secret: "test-secret".to_string(),
                expiration_hours: 1,
            })),
            realtime: RealtimeConfig {
                idle_timeout_secs: 900,
                sweep_interval_secs: 300,
            },
        }
    }

    async fn attach(state: &AppState) -> (HandleId, mpsc::UnboundedReceiver<ChatEvent>) {
        let handle = HandleId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        state.router.register(handle, tx).await;
        (handle, rx)
    }

    #[tokio::test]
    async fn typing_requires_room_membership() {
        let state = make_state();
        let alice = UserId::from(Uuid::new_v4());
        let bob = UserId::from(Uuid::new_v4());
        let mallory = UserId::from(Uuid::new_v4());

        let request = state
            .connection_service
            .send_request(alice, bob)
            .await
            .unwrap();
        state
            .connection_service
            .respond(request.id, bob, RespondAction::Accept)
            .await
            .unwrap();
        let room = RoomKey::personal(alice, bob);

        let (alice_handle, mut rx_alice) = attach(&state).await;
        dispatch(
            &state,
            alice,
            alice_handle,
            ClientEvent::JoinPersonalChat {
                room_key: room.as_str().to_owned(),
            },
        )
        .await
        .unwrap();

        // 第三方句柄未加入房间，输入指示必须被拒绝且不送达任何人
        let (mallory_handle, _rx_mallory) = attach(&state).await;
        let result = dispatch(
            &state,
            mallory,
            mallory_handle,
            ClientEvent::TypingStart {
                room_key: room.as_str().to_owned(),
                username: "alice".to_string(),
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::Unauthorized { .. }))
        ));
        assert!(rx_alice.try_recv().is_err());

        // 已加入的成员正常发送，对端收到且不回显给发起者
        let (bob_handle, mut rx_bob) = attach(&state).await;
        dispatch(
            &state,
            bob,
            bob_handle,
            ClientEvent::JoinPersonalChat {
                room_key: room.as_str().to_owned(),
            },
        )
        .await
        .unwrap();
        dispatch(
            &state,
            bob,
            bob_handle,
            ClientEvent::TypingStart {
                room_key: room.as_str().to_owned(),
                username: "bob".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            rx_alice.try_recv(),
            Ok(ChatEvent::TypingStart { .. })
        ));
        assert!(rx_bob.try_recv().is_err());
    }

    #[test]
    fn client_events_deserialize_by_type_tag() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"send_message","team_id":"8c1e9c60-5a5f-4f30-9c0a-7cf4d1c8a111","text":"hi"}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::SendMessage { .. }));

        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"typing_start","room_key":"a_b","username":"alice"}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::TypingStart { .. }));
    }

    #[test]
    fn unknown_event_type_is_an_error() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"shutdown"}"#).is_err());
    }
}
