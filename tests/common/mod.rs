//! 集成测试共用的脚本化后端与等待工具

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use discovery_agent::discovery::{DiscoveryBackend, ServiceInstance, ServiceSnapshot, WatchRequest};
use discovery_agent::error::{DiscoveryError, Result};

/// 单次后端响应
#[derive(Debug, Clone)]
pub enum Step {
    Snapshot(ServiceSnapshot),
    NoData,
    Fail(String),
}

/// 按脚本依次返回响应的后端
///
/// 脚本耗尽后调用会一直阻塞，直到推入新的响应，模拟没有变化时的阻塞查询
#[derive(Default)]
pub struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<WatchRequest>>,
    calls: AtomicUsize,
    notify: Notify,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_steps(steps: Vec<Step>) -> Arc<Self> {
        let backend = Self::new();
        for step in steps {
            backend.push(step);
        }
        backend
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().push_back(step);
        self.notify.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<WatchRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DiscoveryBackend for ScriptedBackend {
    async fn discover_service(&self, request: &WatchRequest) -> Result<Option<ServiceSnapshot>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        loop {
            let step = self.steps.lock().pop_front();
            match step {
                Some(Step::Snapshot(snapshot)) => return Ok(Some(snapshot)),
                Some(Step::NoData) => return Ok(None),
                Some(Step::Fail(reason)) => return Err(DiscoveryError::backend(reason)),
                None => self.notify.notified().await,
            }
        }
    }
}

pub fn pong_1() -> ServiceInstance {
    ServiceInstance::new("pong-service-1", "192.168.25.111", "pong", "pong", "192.168.25.111", 9877)
        .with_tag("jvm")
}

pub fn pong_2() -> ServiceInstance {
    ServiceInstance::new("pong-service-2", "192.168.25.112", "pong", "pong", "192.168.25.112", 9877)
        .with_tag("jvm")
}

pub fn pong_3() -> ServiceInstance {
    ServiceInstance::new("pong-service-3", "192.168.25.113", "pong", "pong", "192.168.25.113", 9878)
        .with_tag("jvm")
}

pub fn snapshot(instances: Vec<ServiceInstance>, index: &str) -> Step {
    Step::Snapshot(ServiceSnapshot::new(instances, Some(index.to_string())))
}

/// 轮询等待条件成立，超时返回 false
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .is_ok()
}
