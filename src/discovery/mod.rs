//! 服务发现模块
//!
//! 基于阻塞查询的服务监听：每个服务名一个后台轮询任务，多个订阅者共享，
//! 变化时更新本地快照缓存并通知订阅者。

pub mod backend;
pub mod factory;
pub mod instance;
pub mod request;
pub mod service;
pub mod value;
pub mod watch;

pub use backend::DiscoveryBackend;
pub use backend::consul::{ConsulClient, ConsulClientBuilder};
pub use factory::DiscoveryFactory;
pub use instance::{ServiceInstance, ServiceList, ServiceSnapshot};
pub use request::{INITIAL_INDEX, WatchRequest, WatchRequestBuilder};
pub use service::DiscoveryService;
pub use value::KeyValue;
pub use watch::{ErrorCallback, Subscription, UpdateCallback, WatchKey};
