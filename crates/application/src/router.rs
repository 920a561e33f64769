//! 房间路由器
//!
//! 纯路由组件：维护房间键到活跃句柄集合的瞬态映射，并把事件扇出到
//! 房间成员。不持有任何消息内容。每个句柄注册一个发送端，
//! 由网关侧的转发任务落到真正的 WebSocket 上。

use std::collections::{HashMap, HashSet};

use domain::{ChatEvent, HandleId, RoomKey};
use tokio::sync::{mpsc, Mutex};

#[derive(Default)]
struct RouterState {
    senders: HashMap<HandleId, mpsc::UnboundedSender<ChatEvent>>,
    rooms: HashMap<RoomKey, HashSet<HandleId>>,
    memberships: HashMap<HandleId, HashSet<RoomKey>>,
}

impl RouterState {
    /// 移除句柄的发送端和全部房间成员关系。
    fn drop_handle(&mut self, handle: HandleId) {
        self.senders.remove(&handle);
        if let Some(rooms) = self.memberships.remove(&handle) {
            for room in rooms {
                if let Some(members) = self.rooms.get_mut(&room) {
                    members.remove(&handle);
                    if members.is_empty() {
                        self.rooms.remove(&room);
                    }
                }
            }
        }
    }
}

#[derive(Default)]
pub struct RoomRouter {
    state: Mutex<RouterState>,
}

impl RoomRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册句柄的事件发送端。必须在任何 join 之前调用。
    pub async fn register(&self, handle: HandleId, sender: mpsc::UnboundedSender<ChatEvent>) {
        let mut state = self.state.lock().await;
        state.senders.insert(handle, sender);
    }

    /// 注销句柄并移除其全部房间成员关系。
    pub async fn unregister(&self, handle: HandleId) {
        self.state.lock().await.drop_handle(handle);
    }

    /// 加入房间，幂等。
    pub async fn join(&self, handle: HandleId, room_key: RoomKey) {
        let mut state = self.state.lock().await;
        state
            .rooms
            .entry(room_key.clone())
            .or_default()
            .insert(handle);
        state.memberships.entry(handle).or_default().insert(room_key);
    }

    /// 离开房间，句柄不在房间时为 no-op。
    pub async fn leave(&self, handle: HandleId, room_key: &RoomKey) {
        let mut state = self.state.lock().await;
        if let Some(members) = state.rooms.get_mut(room_key) {
            members.remove(&handle);
            if members.is_empty() {
                state.rooms.remove(room_key);
            }
        }
        if let Some(rooms) = state.memberships.get_mut(&handle) {
            rooms.remove(room_key);
        }
    }

    pub async fn is_member(&self, handle: HandleId, room_key: &RoomKey) -> bool {
        let state = self.state.lock().await;
        state
            .rooms
            .get(room_key)
            .map(|members| members.contains(&handle))
            .unwrap_or(false)
    }

    /// 向房间所有成员投递事件。`exclude` 用于不回显给发起者的
    /// 输入指示；消息投递传 None，发送方同样收到回显副本。
    /// 返回实际投递的句柄数。
    pub async fn broadcast(
        &self,
        room_key: &RoomKey,
        event: ChatEvent,
        exclude: Option<HandleId>,
    ) -> usize {
        let mut state = self.state.lock().await;
        let Some(members) = state.rooms.get(room_key) else {
            return 0;
        };
        let targets: Vec<HandleId> = members
            .iter()
            .copied()
            .filter(|h| Some(*h) != exclude)
            .collect();

        let mut delivered = 0;
        let mut stale = Vec::new();
        for handle in targets {
            match state.senders.get(&handle) {
                Some(sender) if sender.send(event.clone()).is_ok() => delivered += 1,
                // 发送端已关闭，句柄视为失效
                _ => stale.push(handle),
            }
        }
        for handle in stale {
            state.drop_handle(handle);
        }
        delivered
    }

    /// 全局广播（在线状态变化使用）。
    pub async fn broadcast_all(&self, event: ChatEvent) -> usize {
        let mut state = self.state.lock().await;
        let mut delivered = 0;
        let mut stale = Vec::new();
        for (handle, sender) in &state.senders {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                stale.push(*handle);
            }
        }
        for handle in stale {
            state.drop_handle(handle);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{TeamId, UserId};
    use uuid::Uuid;

    fn room() -> RoomKey {
        RoomKey::personal(
            UserId::from(Uuid::new_v4()),
            UserId::from(Uuid::new_v4()),
        )
    }

    async fn attach(router: &RoomRouter) -> (HandleId, mpsc::UnboundedReceiver<ChatEvent>) {
        let handle = HandleId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        router.register(handle, tx).await;
        (handle, rx)
    }

    #[tokio::test]
    async fn broadcast_reaches_all_members() {
        let router = RoomRouter::new();
        let room = room();

        let (a, mut rx_a) = attach(&router).await;
        let (b, mut rx_b) = attach(&router).await;
        router.join(a, room.clone()).await;
        router.join(b, room.clone()).await;

        let delivered = router.broadcast(&room, ChatEvent::error("ping"), None).await;
        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn exclude_suppresses_echo_to_originator() {
        let router = RoomRouter::new();
        let room = room();

        let (a, mut rx_a) = attach(&router).await;
        let (b, mut rx_b) = attach(&router).await;
        router.join(a, room.clone()).await;
        router.join(b, room.clone()).await;

        let event = ChatEvent::TypingStart {
            room_key: room.clone(),
            username: "alice".to_string(),
        };
        let delivered = router.broadcast(&room, event, Some(a)).await;
        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn join_is_idempotent_and_leave_is_noop_when_absent() {
        let router = RoomRouter::new();
        let room = room();
        let (a, mut rx_a) = attach(&router).await;

        router.join(a, room.clone()).await;
        router.join(a, room.clone()).await;
        assert_eq!(router.broadcast(&room, ChatEvent::error("x"), None).await, 1);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());

        router.leave(a, &room).await;
        router.leave(a, &room).await;
        assert_eq!(router.broadcast(&room, ChatEvent::error("y"), None).await, 0);
    }

    #[tokio::test]
    async fn broadcast_prunes_closed_handles_from_rooms() {
        let router = RoomRouter::new();
        let room = room();
        let (a, rx_a) = attach(&router).await;
        router.join(a, room.clone()).await;

        drop(rx_a);
        assert_eq!(router.broadcast(&room, ChatEvent::error("x"), None).await, 0);
        assert!(!router.is_member(a, &room).await);
    }

    #[tokio::test]
    async fn unregister_drops_all_memberships() {
        let router = RoomRouter::new();
        let personal = room();
        let team = RoomKey::team(TeamId::from(Uuid::new_v4()));
        let (a, _rx) = attach(&router).await;

        router.join(a, personal.clone()).await;
        router.join(a, team.clone()).await;
        router.unregister(a).await;

        assert!(!router.is_member(a, &personal).await);
        assert!(!router.is_member(a, &team).await);
        assert_eq!(router.broadcast_all(ChatEvent::error("z")).await, 0);
    }
}
