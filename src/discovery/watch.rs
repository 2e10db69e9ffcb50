//! 服务监听循环
//!
//! 每个 `WatchKey` 至多一个后台轮询任务：
//! 1. 从缓存取上一次快照的版本号（没有则为初始值）
//! 2. 发起一次阻塞查询
//! 3. 成功：快照与缓存不同时整体替换缓存，并按注册顺序同步通知所有订阅者；失败计数归零
//! 4. 失败：失败计数加一，超过重试上限则永久停止并通知错误回调，否则按退避策略等待后
//!    以**相同**版本号重试

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WatchSettings;
use crate::discovery::backend::DiscoveryBackend;
use crate::discovery::instance::{ServiceList, ServiceSnapshot};
use crate::discovery::request::{INITIAL_INDEX, WatchRequest};
use crate::error::DiscoveryError;

/// 快照更新回调
pub type UpdateCallback = Arc<dyn Fn(ServiceList) + Send + Sync>;

/// 永久失败回调
pub type ErrorCallback = Arc<dyn Fn(&DiscoveryError) + Send + Sync>;

/// 快照缓存：监听键 -> 最新快照
pub(crate) type SnapshotCache = DashMap<WatchKey, Arc<ServiceSnapshot>>;

/// 监听键：服务名 + 可选标签过滤
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchKey {
    pub service: String,
    pub tag: Option<String>,
}

impl WatchKey {
    pub fn service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            tag: None,
        }
    }

    pub fn tagged(service: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            tag: Some(tag.into()),
        }
    }
}

struct Subscriber {
    id: u64,
    on_update: UpdateCallback,
    on_error: Option<ErrorCallback>,
}

/// 单个监听键的共享状态
pub(crate) struct WatchState {
    key: WatchKey,
    subscribers: RwLock<Vec<Subscriber>>,
    next_subscriber_id: AtomicU64,
    failures: AtomicU32,
    running: AtomicBool,
    cancel: CancellationToken,
}

impl WatchState {
    pub(crate) fn new(key: WatchKey, cancel: CancellationToken) -> Self {
        Self {
            key,
            subscribers: RwLock::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
            failures: AtomicU32::new(0),
            running: AtomicBool::new(false),
            cancel,
        }
    }

    /// 注册订阅者；返回订阅 ID 以及调用方是否需要启动轮询任务
    ///
    /// 注册与“是否在运行”的判断在同一把写锁下完成，
    /// 与循环退出时的状态切换互斥，避免新订阅者挂在已停止的循环上
    pub(crate) fn add_subscriber(
        &self,
        on_update: UpdateCallback,
        on_error: Option<ErrorCallback>,
    ) -> (u64, bool) {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers.write();
        subscribers.push(Subscriber {
            id,
            on_update,
            on_error,
        });
        let should_start = !self.cancel.is_cancelled()
            && self
                .running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
        (id, should_start)
    }

    pub(crate) fn remove_subscriber(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    pub(crate) fn contains_subscriber(&self, id: u64) -> bool {
        self.subscribers.read().iter().any(|s| s.id == id)
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 轮询主循环，直到被取消或超过重试上限
    pub(crate) async fn run(
        self: Arc<Self>,
        backend: Arc<dyn DiscoveryBackend>,
        cache: Arc<SnapshotCache>,
        settings: WatchSettings,
    ) {
        info!(service = %self.key.service, tag = ?self.key.tag, "Watch loop started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let index = cache
                .get(&self.key)
                .and_then(|snapshot| snapshot.index.clone())
                .unwrap_or_else(|| INITIAL_INDEX.to_string());

            let request = match WatchRequest::builder()
                .for_service(self.key.service.clone())
                .tag(self.key.tag.clone())
                .last_index(index)
                .build()
            {
                Ok(request) => request,
                Err(e) => {
                    error!(service = %self.key.service, error = %e, "Invalid watch request");
                    self.stop_with_error(&e);
                    return;
                }
            };

            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = backend.discover_service(&request) => result,
            };

            match result {
                Ok(snapshot) => {
                    self.failures.store(0, Ordering::Release);
                    if let Some(snapshot) = snapshot {
                        self.publish(&cache, snapshot);
                    }
                    // 非成功状态码也会走到这里，让出执行权避免独占 worker
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    let attempt = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
                    warn!(
                        service = %self.key.service,
                        attempt,
                        error = %e,
                        "Failed to listen for service updates"
                    );

                    if let Some(max_retries) = settings.max_retries {
                        if attempt > max_retries {
                            let exhausted = DiscoveryError::RetriesExhausted {
                                service: self.key.service.clone(),
                                attempts: attempt,
                                reason: e.to_string(),
                            };
                            error!(
                                service = %self.key.service,
                                attempts = attempt,
                                "Retry budget exhausted, watch loop stopped"
                            );
                            self.stop_with_error(&exhausted);
                            return;
                        }
                    }

                    let delay = settings.backoff.delay(attempt);
                    warn!(
                        service = %self.key.service,
                        delay_ms = delay.as_millis() as u64,
                        "Delay next call to discover service"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(service = %self.key.service, tag = ?self.key.tag, "Watch loop cancelled");
        self.mark_stopped();
    }

    /// 快照与缓存不同（或尚无缓存）时替换缓存并通知订阅者
    fn publish(&self, cache: &SnapshotCache, snapshot: ServiceSnapshot) {
        let changed = cache
            .get(&self.key)
            .map(|current| **current != snapshot)
            .unwrap_or(true);
        if !changed {
            return;
        }

        let snapshot = Arc::new(snapshot);
        cache.insert(self.key.clone(), snapshot.clone());
        debug!(
            service = %self.key.service,
            index = ?snapshot.index,
            instances = snapshot.len(),
            "Service snapshot changed"
        );

        // 分发期间不持锁，订阅者可以在回调里取消订阅
        let callbacks: Vec<UpdateCallback> = self
            .subscribers
            .read()
            .iter()
            .map(|s| s.on_update.clone())
            .collect();
        for callback in callbacks {
            let instances = snapshot.instances.clone();
            if catch_unwind(AssertUnwindSafe(|| callback(instances))).is_err() {
                error!(service = %self.key.service, "Subscriber panicked while handling update");
            }
        }
    }

    fn stop_with_error(&self, err: &DiscoveryError) {
        let callbacks: Vec<ErrorCallback> = {
            let subscribers = self.subscribers.write();
            self.failures.store(0, Ordering::Release);
            self.running.store(false, Ordering::Release);
            subscribers.iter().filter_map(|s| s.on_error.clone()).collect()
        };
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(err))).is_err() {
                error!(service = %self.key.service, "Subscriber panicked while handling error");
            }
        }
    }

    fn mark_stopped(&self) {
        let _subscribers = self.subscribers.write();
        self.failures.store(0, Ordering::Release);
        self.running.store(false, Ordering::Release);
    }
}

/// 订阅句柄
///
/// `unsubscribe` 只移除本订阅者的回调，不会停止共享的轮询任务。
/// 丢弃句柄不会自动取消订阅。
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    key: WatchKey,
    state: Weak<WatchState>,
}

impl Subscription {
    pub(crate) fn new(id: u64, key: WatchKey, state: &Arc<WatchState>) -> Self {
        Self {
            id,
            key,
            state: Arc::downgrade(state),
        }
    }

    pub fn key(&self) -> &WatchKey {
        &self.key
    }

    /// 取消订阅，重复调用无副作用
    pub fn unsubscribe(&self) {
        if let Some(state) = self.state.upgrade() {
            if state.remove_subscriber(self.id) {
                debug!(service = %self.key.service, subscriber = self.id, "Unsubscribed");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.state
            .upgrade()
            .map(|state| state.contains_subscriber(self.id))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}
