//! 在线状态管理器
//!
//! 跟踪活跃连接句柄到用户的映射。同一用户可以有多个句柄（多设备），
//! 至少存在一个句柄即视为在线。句柄注册/移除与上下线判定在同一把锁下
//! 完成，避免几乎同时的断开与重连竞争出错误的"离线"广播。

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{HandleId, Timestamp, UserId};
use tokio::sync::Mutex;

/// 上下线转换结果，仅在用户的在线状态真正变化时产生。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceChange {
    pub user_id: UserId,
    pub online: bool,
    pub last_seen: Option<Timestamp>,
}

#[async_trait]
pub trait PresenceTracker: Send + Sync {
    /// 注册句柄。返回 Some 当且仅当这是该用户的第一个句柄。
    async fn connect(&self, handle: HandleId, user_id: UserId) -> Option<PresenceChange>;

    /// 移除句柄。返回 Some 当且仅当这是该用户的最后一个句柄，
    /// 此时记录 last_seen = now。
    async fn disconnect(&self, handle: HandleId, now: Timestamp) -> Option<PresenceChange>;

    async fn is_online(&self, user_id: UserId) -> bool;

    async fn online_users(&self) -> Vec<UserId>;

    async fn last_seen(&self, user_id: UserId) -> Option<Timestamp>;
}

#[derive(Default)]
struct PresenceState {
    handles: HashMap<HandleId, UserId>,
    counts: HashMap<UserId, usize>,
    last_seen: HashMap<UserId, Timestamp>,
}

/// 进程内实现。状态只存在于本进程的内存中，随进程消失。
#[derive(Default)]
pub struct MemoryPresenceTracker {
    state: Mutex<PresenceState>,
}

impl MemoryPresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceTracker for MemoryPresenceTracker {
    async fn connect(&self, handle: HandleId, user_id: UserId) -> Option<PresenceChange> {
        let mut state = self.state.lock().await;
        if state.handles.insert(handle, user_id).is_some() {
            // 同一句柄重复注册不改变在线状态
            return None;
        }
        let count = state.counts.entry(user_id).or_insert(0);
        *count += 1;
        if *count == 1 {
            tracing::debug!(user_id = %user_id, "user came online");
            Some(PresenceChange {
                user_id,
                online: true,
                last_seen: None,
            })
        } else {
            None
        }
    }

    async fn disconnect(&self, handle: HandleId, now: Timestamp) -> Option<PresenceChange> {
        let mut state = self.state.lock().await;
        let user_id = state.handles.remove(&handle)?;
        let count = state.counts.get_mut(&user_id)?;
        *count -= 1;
        if *count == 0 {
            state.counts.remove(&user_id);
            state.last_seen.insert(user_id, now);
            tracing::debug!(user_id = %user_id, "user went offline");
            Some(PresenceChange {
                user_id,
                online: false,
                last_seen: Some(now),
            })
        } else {
            None
        }
    }

    async fn is_online(&self, user_id: UserId) -> bool {
        let state = self.state.lock().await;
        state.counts.contains_key(&user_id)
    }

    async fn online_users(&self) -> Vec<UserId> {
        let state = self.state.lock().await;
        state.counts.keys().copied().collect()
    }

    async fn last_seen(&self, user_id: UserId) -> Option<Timestamp> {
        let state = self.state.lock().await;
        state.last_seen.get(&user_id).copied()
    }
}
