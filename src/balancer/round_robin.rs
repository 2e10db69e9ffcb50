//! 轮询负载均衡

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, error};

use super::LoadBalancer;
use crate::discovery::{DiscoveryService, ServiceInstance, ServiceList, Subscription};
use crate::error::{DiscoveryError, Result};

/// 轮询负载均衡器
///
/// 实例列表整体替换（`ArcSwap`），选择路径上只有一次原子自增和一次列表读取，不加锁。
/// 列表变化时计数器不重置，扩缩容瞬间的分布偏差是可接受的。
pub struct RoundRobinLoadBalancer {
    service_name: String,
    discovery: Arc<DiscoveryService>,
    instances: Arc<ArcSwap<Vec<ServiceInstance>>>,
    next_index: AtomicUsize,
    subscription: Mutex<Option<Subscription>>,
}

impl RoundRobinLoadBalancer {
    /// 创建负载均衡器，调用 `init` 之前没有任何可用实例
    pub fn new(discovery: Arc<DiscoveryService>, service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            discovery,
            instances: Arc::new(ArcSwap::from_pointee(Vec::new())),
            next_index: AtomicUsize::new(0),
            subscription: Mutex::new(None),
        }
    }

    /// 拉取当前实例列表并订阅后续更新
    pub async fn init(&self) {
        let services = self.discovery.get_services(&self.service_name).await;
        debug!(
            service = %self.service_name,
            instances = services.len(),
            "Round robin balancer initialized"
        );
        self.instances.store(services);

        let instances = self.instances.clone();
        let service_name = self.service_name.clone();
        let subscription = self.discovery.subscribe_with_error(
            &self.service_name,
            move |services: ServiceList| {
                instances.store(services);
            },
            move |err: &DiscoveryError| {
                error!(service = %service_name, error = %err, "Failed to listen for service");
            },
        );

        if let Some(previous) = self.subscription.lock().replace(subscription) {
            previous.unsubscribe();
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// 当前持有的实例列表
    pub fn instances(&self) -> ServiceList {
        self.instances.load_full()
    }

    /// 取消对服务变化的订阅，已持有的列表保持不变
    pub fn close(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
    }

    fn next_instance(&self) -> Option<(ServiceList, usize)> {
        // 只读一次列表，列表并发缩短时也不会越界
        let services = self.instances.load_full();
        if services.is_empty() {
            return None;
        }
        let next = self.next_index.fetch_add(1, Ordering::Relaxed);
        let index = next % services.len();
        Some((services, index))
    }
}

impl LoadBalancer for RoundRobinLoadBalancer {
    fn with_next_endpoint<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&str, u16) -> T,
    {
        let (services, index) = self
            .next_instance()
            .ok_or_else(|| DiscoveryError::no_service_available(&self.service_name))?;
        let service = &services[index];
        Ok(f(&service.service_address, service.service_port))
    }
}
