//! Consul 服务发现后端
//!
//! 基于 Consul HTTP API 的阻塞查询（blocking query）实现：
//! - `/v1/health/service/:name`：健康实例列表，`X-Consul-Index` 作为版本号
//! - `/v1/kv/:key`：单值读取与监听
//! - `/v1/catalog/datacenters`：数据中心列表

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ConsulConfig;
use crate::discovery::backend::DiscoveryBackend;
use crate::discovery::instance::{ServiceInstance, ServiceSnapshot};
use crate::discovery::request::WatchRequest;
use crate::discovery::value::KeyValue;
use crate::error::Result;

/// 阻塞查询版本号所在的响应头
pub const INDEX_HEADER_NAME: &str = "X-Consul-Index";

/// Consul 客户端
///
/// 请求超时取 `wait + margin`，严格大于服务端等待时间，
/// 这样超时一定意味着网络故障而不是“没有变化”。
#[derive(Clone, Debug)]
pub struct ConsulClient {
    http_client: HttpClient,
    base_url: String,
    wait_time_secs: u64,
}

impl ConsulClient {
    /// 创建构建器
    pub fn builder() -> ConsulClientBuilder {
        ConsulClientBuilder::default()
    }

    /// 使用给定配置创建客户端
    pub fn new(config: &ConsulConfig) -> Result<Self> {
        ConsulClientBuilder::from_config(config.clone()).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn wait_time_secs(&self) -> u64 {
        self.wait_time_secs
    }

    /// 带版本号的阻塞查询，`request.tag()` 不为空时附加标签过滤
    pub async fn discover_service(&self, request: &WatchRequest) -> Result<Option<ServiceSnapshot>> {
        let url = self.health_url(request.service_name());
        let wait = self.wait_param();
        let mut query = vec![("index", request.index()), ("wait", wait.as_str())];
        if let Some(tag) = request.tag() {
            query.push(("tag", tag));
        }

        let builder = self.http_client.get(&url).query(&query);
        self.fetch_snapshot(builder, request.service_name()).await
    }

    /// 不带版本号的即时查询
    pub async fn discover_service_now(&self, service_name: &str) -> Result<Option<ServiceSnapshot>> {
        let url = self.health_url(service_name);
        let builder = self.http_client.get(&url);
        self.fetch_snapshot(builder, service_name).await
    }

    /// 读取 KV
    pub async fn key_value(&self, key: &str) -> Result<Option<KeyValue>> {
        let url = format!("{}/v1/kv/{}", self.base_url, key);
        self.fetch_value(self.http_client.get(&url), key).await
    }

    /// 以阻塞查询方式读取 KV：`index` 之后没有修改时最多等待 wait 时间
    pub async fn key_value_with_index(&self, key: &str, index: &str) -> Result<Option<KeyValue>> {
        let url = format!("{}/v1/kv/{}", self.base_url, key);
        let wait = self.wait_param();
        let builder = self
            .http_client
            .get(&url)
            .query(&[("index", index), ("wait", wait.as_str())]);
        self.fetch_value(builder, key).await
    }

    /// 数据中心列表，非成功状态码时返回空列表
    pub async fn datacenters(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1/catalog/datacenters", self.base_url);
        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Failed to get datacenter list");
            return Ok(Vec::new());
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn health_url(&self, service_name: &str) -> String {
        format!("{}/v1/health/service/{}?passing", self.base_url, service_name)
    }

    fn wait_param(&self) -> String {
        format!("{}s", self.wait_time_secs)
    }

    async fn fetch_snapshot(
        &self,
        builder: reqwest::RequestBuilder,
        service_name: &str,
    ) -> Result<Option<ServiceSnapshot>> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                service = %service_name,
                status = %status,
                body = %body,
                "Failed to get service"
            );
            return Ok(None);
        }

        let index = response
            .headers()
            .get(INDEX_HEADER_NAME)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        let snapshot = decode_health_entries(&body)?.map(|instances| {
            debug!(
                service = %service_name,
                index = ?index,
                instances = instances.len(),
                "Received service snapshot"
            );
            ServiceSnapshot::new(instances, index)
        });
        Ok(snapshot)
    }

    async fn fetch_value(&self, builder: reqwest::RequestBuilder, key: &str) -> Result<Option<KeyValue>> {
        let response = builder.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(key = %key, "Key not found");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(key = %key, status = %status, body = %body, "Failed to get key");
            return Ok(None);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let values: Option<Vec<KeyValue>> = serde_json::from_str(&body)?;
        Ok(values.and_then(|values| values.into_iter().next()))
    }
}

#[async_trait]
impl DiscoveryBackend for ConsulClient {
    async fn discover_service(&self, request: &WatchRequest) -> Result<Option<ServiceSnapshot>> {
        ConsulClient::discover_service(self, request).await
    }
}

/// Consul 客户端构建器
///
/// 等待时间必须位于 1..=600 秒，越界在 `build` 时直接失败
#[derive(Debug, Clone, Default)]
pub struct ConsulClientBuilder {
    config: ConsulConfig,
    http_client: Option<HttpClient>,
}

impl ConsulClientBuilder {
    pub fn from_config(config: ConsulConfig) -> Self {
        Self {
            config,
            http_client: None,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn wait_time_secs(mut self, secs: u64) -> Self {
        self.config.wait_time_secs = secs;
        self
    }

    pub fn read_timeout_margin_secs(mut self, secs: u64) -> Self {
        self.config.read_timeout_margin_secs = secs;
        self
    }

    /// 使用外部构建的 HTTP 客户端（调用方自行负责超时设置）
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> Result<ConsulClient> {
        self.config.validate()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(self.config.request_timeout())
                .build()?,
        };

        Ok(ConsulClient {
            http_client,
            base_url: self.config.base_url(),
            wait_time_secs: self.config.wait_time_secs,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    node: NodeEntry,
    service: ServiceEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeEntry {
    node: String,
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceEntry {
    #[serde(rename = "ID")]
    id: String,
    service: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    address: String,
    port: u16,
}

impl From<HealthEntry> for ServiceInstance {
    fn from(entry: HealthEntry) -> Self {
        // 服务未声明地址时 Consul 约定使用节点地址
        let service_address = if entry.service.address.is_empty() {
            entry.node.address.clone()
        } else {
            entry.service.address
        };

        ServiceInstance::new(
            entry.node.node,
            entry.node.address,
            entry.service.id,
            entry.service.service,
            service_address,
            entry.service.port,
        )
        .with_tags(entry.service.tags.unwrap_or_default())
    }
}

/// 解析 `/v1/health/service` 响应体
///
/// 空响应体或 JSON `null` 返回 `None`，保持后端返回的实例顺序
pub fn decode_health_entries(body: &str) -> Result<Option<Vec<ServiceInstance>>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let entries: Option<Vec<HealthEntry>> = serde_json::from_str(body)?;
    Ok(entries.map(|entries| entries.into_iter().map(ServiceInstance::from).collect()))
}
