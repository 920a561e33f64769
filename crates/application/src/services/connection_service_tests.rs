//! 连接请求状态机的用例级测试：全部走内存适配器。

use std::sync::Arc;

use domain::{ChatEvent, ConnectionStatus, DomainError, HandleId, RoomKey, UserId};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::clock::SystemClock;
use crate::error::ApplicationError;
use crate::key_locks::KeyLocks;
use crate::memory::{MemoryConnectionRepository, MemoryProfileStore};
use crate::router::RoomRouter;
use crate::services::connection_service::{
    ConnectionService, ConnectionServiceDependencies, RespondAction,
};

fn user() -> UserId {
    UserId::from(Uuid::new_v4())
}

fn build() -> (Arc<ConnectionService>, Arc<RoomRouter>) {
    let router = Arc::new(RoomRouter::new());
    let service = ConnectionService::new(ConnectionServiceDependencies {
        connections: Arc::new(MemoryConnectionRepository::new()),
        profiles: Arc::new(MemoryProfileStore::new()),
        clock: Arc::new(SystemClock),
        router: router.clone(),
        locks: Arc::new(KeyLocks::new()),
    });
    (Arc::new(service), router)
}

async fn attach_to_user_room(
    router: &RoomRouter,
    user_id: UserId,
) -> mpsc::UnboundedReceiver<ChatEvent> {
    let handle = HandleId::generate();
    let (tx, rx) = mpsc::unbounded_channel();
    router.register(handle, tx).await;
    router.join(handle, RoomKey::user(user_id)).await;
    rx
}

#[tokio::test]
async fn self_request_is_rejected() {
    let (service, _) = build();
    let a = user();
    let err = service.send_request(a, a).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::SelfRequest)));
}

#[tokio::test]
async fn pending_request_blocks_both_directions() {
    let (service, _) = build();
    let (a, b) = (user(), user());

    let request = service.send_request(a, b).await.unwrap();
    assert_eq!(request.status, ConnectionStatus::Pending);

    let same_direction = service.send_request(a, b).await.unwrap_err();
    assert!(matches!(
        same_direction,
        ApplicationError::Domain(DomainError::RequestPending)
    ));
    // 反向发起同样被挡住：同一房间键只有一条记录
    let reverse = service.send_request(b, a).await.unwrap_err();
    assert!(matches!(
        reverse,
        ApplicationError::Domain(DomainError::RequestPending)
    ));
}

#[tokio::test]
async fn accept_authorizes_both_parties_and_blocks_new_requests() {
    let (service, _) = build();
    let (a, b) = (user(), user());
    let room = RoomKey::personal(a, b);

    let request = service.send_request(a, b).await.unwrap();
    assert!(!service.authorize_room(a, &room).await.unwrap());

    let accepted = service
        .respond(request.id, b, RespondAction::Accept)
        .await
        .unwrap();
    assert_eq!(accepted.status, ConnectionStatus::Accepted);

    assert!(service.authorize_room(a, &room).await.unwrap());
    assert!(service.authorize_room(b, &room).await.unwrap());
    assert!(!service.authorize_room(user(), &room).await.unwrap());

    for (from, to) in [(a, b), (b, a)] {
        let err = service.send_request(from, to).await.unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::AlreadyConnected)
        ));
    }
}

#[tokio::test]
async fn rejected_request_can_be_reopened_with_flipped_direction() {
    let (service, _) = build();
    let (a, b) = (user(), user());

    let request = service.send_request(a, b).await.unwrap();
    service
        .respond(request.id, b, RespondAction::Reject)
        .await
        .unwrap();

    // 被拒后换方向重新发起：同一条记录翻转回 Pending
    let reopened = service.send_request(b, a).await.unwrap();
    assert_eq!(reopened.id, request.id);
    assert_eq!(reopened.status, ConnectionStatus::Pending);
    assert_eq!(reopened.requester_id, b);
    assert_eq!(reopened.receiver_id, a);
    assert_eq!(reopened.room_key, request.room_key);
}

#[tokio::test]
async fn only_receiver_may_respond() {
    let (service, _) = build();
    let (a, b) = (user(), user());
    let request = service.send_request(a, b).await.unwrap();

    let by_requester = service
        .respond(request.id, a, RespondAction::Accept)
        .await
        .unwrap_err();
    assert!(matches!(
        by_requester,
        ApplicationError::Domain(DomainError::Unauthorized { .. })
    ));

    let by_stranger = service
        .respond(request.id, user(), RespondAction::Reject)
        .await
        .unwrap_err();
    assert!(matches!(
        by_stranger,
        ApplicationError::Domain(DomainError::Unauthorized { .. })
    ));
}

#[tokio::test]
async fn responding_twice_fails_with_invalid_state() {
    let (service, _) = build();
    let (a, b) = (user(), user());
    let request = service.send_request(a, b).await.unwrap();

    service
        .respond(request.id, b, RespondAction::Accept)
        .await
        .unwrap();
    let second = service
        .respond(request.id, b, RespondAction::Reject)
        .await
        .unwrap_err();
    assert!(matches!(
        second,
        ApplicationError::Domain(DomainError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn concurrent_responses_have_exactly_one_winner() {
    let (service, _) = build();
    let (a, b) = (user(), user());
    let request = service.send_request(a, b).await.unwrap();

    let accept = {
        let service = service.clone();
        tokio::spawn(async move { service.respond(request.id, b, RespondAction::Accept).await })
    };
    let reject = {
        let service = service.clone();
        tokio::spawn(async move { service.respond(request.id, b, RespondAction::Reject).await })
    };

    let results = [accept.await.unwrap(), reject.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(ApplicationError::Domain(DomainError::InvalidState { .. }))
    )));
}

#[tokio::test]
async fn cancel_removes_pending_request_and_allows_fresh_start() {
    let (service, _) = build();
    let (a, b) = (user(), user());

    service.send_request(a, b).await.unwrap();
    service.cancel(a, b).await.unwrap();

    // 回到无记录状态，双方都能重新发起
    let fresh = service.send_request(b, a).await.unwrap();
    assert_eq!(fresh.status, ConnectionStatus::Pending);
    assert_eq!(fresh.requester_id, b);
}

#[tokio::test]
async fn cancel_rejects_non_requester_and_non_pending() {
    let (service, _) = build();
    let (a, b) = (user(), user());

    // 无记录
    assert!(matches!(
        service.cancel(a, b).await.unwrap_err(),
        ApplicationError::Domain(DomainError::InvalidState { .. })
    ));

    let request = service.send_request(a, b).await.unwrap();
    // 接收方不能以撤回的方式删除请求
    assert!(matches!(
        service.cancel(b, a).await.unwrap_err(),
        ApplicationError::Domain(DomainError::InvalidState { .. })
    ));

    service
        .respond(request.id, b, RespondAction::Accept)
        .await
        .unwrap();
    // 已接受的连接不能撤回
    assert!(matches!(
        service.cancel(a, b).await.unwrap_err(),
        ApplicationError::Domain(DomainError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn request_lifecycle_notifies_counterparties() {
    let (service, router) = build();
    let (a, b) = (user(), user());

    let mut rx_a = attach_to_user_room(&router, a).await;
    let mut rx_b = attach_to_user_room(&router, b).await;

    let request = service.send_request(a, b).await.unwrap();
    match rx_b.try_recv().unwrap() {
        ChatEvent::RequestReceived { request: received, .. } => {
            assert_eq!(received.id, request.id);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    service
        .respond(request.id, b, RespondAction::Accept)
        .await
        .unwrap();
    match rx_a.try_recv().unwrap() {
        ChatEvent::RequestAccepted { request: accepted, .. } => {
            assert_eq!(accepted.status, ConnectionStatus::Accepted);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn list_pending_splits_sent_and_received() {
    let (service, _) = build();
    let (a, b, c) = (user(), user(), user());

    service.send_request(a, b).await.unwrap();
    service.send_request(c, a).await.unwrap();

    let pending = service.list_pending(a).await.unwrap();
    assert_eq!(pending.sent.len(), 1);
    assert_eq!(pending.received.len(), 1);
    assert_eq!(pending.sent[0].receiver_id, b);
    assert_eq!(pending.received[0].requester_id, c);
}
