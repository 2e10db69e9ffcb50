//! 服务发现工厂
//!
//! 提供快速构建方法，使用默认配置组装 Consul 客户端、服务发现与负载均衡器

use std::sync::Arc;

use tracing::info;

use crate::balancer::RoundRobinLoadBalancer;
use crate::config::{AgentConfig, ConsulConfig, WatchSettings};
use crate::discovery::backend::consul::ConsulClient;
use crate::discovery::service::DiscoveryService;
use crate::error::Result;

/// 服务发现工厂
pub struct DiscoveryFactory;

impl DiscoveryFactory {
    /// 从配置创建 Consul 客户端，等待时间越界时直接失败
    pub fn create_client(config: &ConsulConfig) -> Result<ConsulClient> {
        ConsulClient::new(config)
    }

    /// 从完整配置创建服务发现
    pub fn create_service(config: AgentConfig) -> Result<Arc<DiscoveryService>> {
        let client = Self::create_client(&config.consul)?;
        info!(
            consul = %client.base_url(),
            wait_time_secs = client.wait_time_secs(),
            max_retries = ?config.watch.max_retries,
            "Discovery service created"
        );
        Ok(Arc::new(DiscoveryService::new(
            Arc::new(client),
            config.watch.into_settings(),
        )))
    }

    /// 使用调用方提供的重试参数创建服务发现
    pub fn create_service_with_settings(
        config: &ConsulConfig,
        settings: WatchSettings,
    ) -> Result<Arc<DiscoveryService>> {
        let client = Self::create_client(config)?;
        Ok(Arc::new(DiscoveryService::new(Arc::new(client), settings)))
    }

    /// 使用默认配置连接指定的 Consul agent
    ///
    /// # 默认配置
    /// - 阻塞查询等待：300 秒，读超时余量 10 秒
    /// - 重试：无限重试，指数退避 1 秒起、最长 30 秒
    pub fn create_with_defaults(host: impl Into<String>, port: u16) -> Result<Arc<DiscoveryService>> {
        let config = AgentConfig {
            consul: ConsulConfig {
                host: host.into(),
                port,
                ..ConsulConfig::default()
            },
            ..AgentConfig::default()
        };
        Self::create_service(config)
    }

    /// 创建并初始化轮询负载均衡器
    pub async fn create_round_robin(
        discovery: Arc<DiscoveryService>,
        service_name: impl Into<String>,
    ) -> RoundRobinLoadBalancer {
        let balancer = RoundRobinLoadBalancer::new(discovery, service_name);
        balancer.init().await;
        balancer
    }
}
