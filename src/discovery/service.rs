//! 服务发现入口
//!
//! 持有按服务名缓存的最新快照与监听任务注册表：
//! - `get_services`：命中缓存直接返回，否则同步查询一次后端并缓存，从不启动后台任务
//! - `subscribe`：注册回调；该服务尚无监听任务时惰性启动，后续订阅者复用同一任务

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WatchSettings;
use crate::discovery::backend::DiscoveryBackend;
use crate::discovery::instance::{ServiceList, ServiceSnapshot};
use crate::discovery::request::WatchRequest;
use crate::discovery::watch::{
    ErrorCallback, SnapshotCache, Subscription, UpdateCallback, WatchKey, WatchState,
};
use crate::error::DiscoveryError;

/// 服务发现
pub struct DiscoveryService {
    backend: Arc<dyn DiscoveryBackend>,
    settings: WatchSettings,
    cache: Arc<SnapshotCache>,
    watches: DashMap<WatchKey, Arc<WatchState>>,
    shutdown: CancellationToken,
}

impl DiscoveryService {
    pub fn new(backend: Arc<dyn DiscoveryBackend>, settings: WatchSettings) -> Self {
        Self {
            backend,
            settings,
            cache: Arc::new(DashMap::new()),
            watches: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// 获取服务实例列表
    ///
    /// 后端失败或无数据时返回空列表：调用方对“没有实例”与“无法确定实例”的处理相同
    pub async fn get_services(&self, name: &str) -> ServiceList {
        let key = WatchKey::service(name);
        if let Some(snapshot) = self.cache.get(&key) {
            return snapshot.instances.clone();
        }

        let request = match WatchRequest::for_service(name) {
            Ok(request) => request,
            Err(e) => {
                warn!(service = %name, error = %e, "Invalid service lookup");
                return ServiceList::default();
            }
        };

        match self.backend.discover_service(&request).await {
            Ok(Some(snapshot)) => {
                // 等待期间监听任务可能已写入更新的快照，不覆盖
                let entry = self.cache.entry(key).or_insert_with(|| Arc::new(snapshot));
                entry.instances.clone()
            }
            Ok(None) => {
                debug!(service = %name, "No data returned for service lookup");
                ServiceList::default()
            }
            Err(e) => {
                warn!(service = %name, error = %e, "Failed to look up service");
                ServiceList::default()
            }
        }
    }

    /// 订阅服务变化，错误只记录日志
    pub fn subscribe<F>(&self, name: &str, on_update: F) -> Subscription
    where
        F: Fn(ServiceList) + Send + Sync + 'static,
    {
        self.register(WatchKey::service(name), Arc::new(on_update), None)
    }

    /// 订阅服务变化；监听任务超过重试上限永久停止时调用 `on_error`
    pub fn subscribe_with_error<F, E>(&self, name: &str, on_update: F, on_error: E) -> Subscription
    where
        F: Fn(ServiceList) + Send + Sync + 'static,
        E: Fn(&DiscoveryError) + Send + Sync + 'static,
    {
        let on_error: ErrorCallback = Arc::new(on_error);
        self.register(WatchKey::service(name), Arc::new(on_update), Some(on_error))
    }

    /// 带标签过滤的订阅，与不带标签的监听相互独立
    pub fn subscribe_tagged<F>(
        &self,
        name: &str,
        tag: &str,
        on_update: F,
        on_error: Option<ErrorCallback>,
    ) -> Subscription
    where
        F: Fn(ServiceList) + Send + Sync + 'static,
    {
        self.register(WatchKey::tagged(name, tag), Arc::new(on_update), on_error)
    }

    /// 当前缓存的快照
    pub fn cached_snapshot(&self, name: &str) -> Option<Arc<ServiceSnapshot>> {
        self.cached_snapshot_for(&WatchKey::service(name))
    }

    pub fn cached_snapshot_for(&self, key: &WatchKey) -> Option<Arc<ServiceSnapshot>> {
        self.cache.get(key).map(|snapshot| snapshot.value().clone())
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.watches
            .get(&WatchKey::service(name))
            .map(|state| state.subscriber_count())
            .unwrap_or(0)
    }

    /// 该服务是否有正在运行的监听任务
    pub fn is_watching(&self, name: &str) -> bool {
        self.watches
            .get(&WatchKey::service(name))
            .map(|state| state.is_running())
            .unwrap_or(false)
    }

    /// 当前连续失败次数
    pub fn failure_count(&self, name: &str) -> u32 {
        self.watches
            .get(&WatchKey::service(name))
            .map(|state| state.failures())
            .unwrap_or(0)
    }

    /// 停止所有监听任务并清空注册表；之后的订阅不会再启动轮询
    pub fn shutdown(&self) {
        info!(watches = self.watches.len(), "Shutting down discovery service");
        self.shutdown.cancel();
        for entry in self.watches.iter() {
            entry.value().cancel();
        }
        self.watches.clear();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn register(
        &self,
        key: WatchKey,
        on_update: UpdateCallback,
        on_error: Option<ErrorCallback>,
    ) -> Subscription {
        let state = self
            .watches
            .entry(key.clone())
            .or_insert_with(|| Arc::new(WatchState::new(key.clone(), self.shutdown.child_token())))
            .value()
            .clone();

        let (id, should_start) = state.add_subscriber(on_update, on_error);
        if should_start {
            tokio::spawn(state.clone().run(
                self.backend.clone(),
                self.cache.clone(),
                self.settings.clone(),
            ));
        } else if self.shutdown.is_cancelled() {
            warn!(service = %key.service, "Discovery service is shut down, watch not started");
        }

        Subscription::new(id, key, &state)
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
