//! Discovery Agent
//!
//! Consul 服务发现客户端：基于阻塞查询的长轮询监听、本地快照缓存，以及在实时实例列表上
//! 工作的轮询负载均衡。

pub mod balancer;
pub mod config;
pub mod discovery;
pub mod error;
pub mod retry;
pub mod telemetry;

// Re-exports
pub use balancer::{LoadBalancer, RoundRobinLoadBalancer};
pub use config::{AgentConfig, BackoffConfig, ConsulConfig, WatchConfig, WatchSettings};
pub use discovery::{
    ConsulClient, ConsulClientBuilder, DiscoveryBackend, DiscoveryFactory, DiscoveryService,
    KeyValue, ServiceInstance, ServiceList, ServiceSnapshot, Subscription, WatchKey, WatchRequest,
};
pub use error::{DiscoveryError, ErrorCategory, ErrorCode, Result};
pub use retry::{BackoffPolicy, ExponentialBackoff, FixedBackoff};
pub use telemetry::init_tracing;
