//! 按键互斥锁
//!
//! 为同一房间键（或消息ID）上的并发操作提供串行化：两个并发的状态转换
//! 必须只有一个获胜，失败方在持锁重读后观察到新状态。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct KeyLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指定键的互斥锁。guard 释放前，同键的其他调用方挂起等待。
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("key lock map poisoned");
            if map.len() > PRUNE_THRESHOLD {
                // 只保留仍被持有的锁，防止键空间无限增长
                map.retain(|_, l| Arc::strong_count(l) > 1);
            }
            map.entry(key.to_owned())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
