//! 配置、退避策略与请求构建测试

use std::time::Duration;

use discovery_agent::config::{AgentConfig, BackoffConfig, ConsulConfig, WatchConfig};
use discovery_agent::discovery::{INITIAL_INDEX, ServiceInstance, WatchRequest};
use discovery_agent::error::{DiscoveryError, ErrorCategory, ErrorCode};
use discovery_agent::retry::{BackoffPolicy, ExponentialBackoff, FixedBackoff};

#[test]
fn defaults_match_local_agent() {
    let config = AgentConfig::default();

    assert_eq!(config.consul.host, "localhost");
    assert_eq!(config.consul.port, 8500);
    assert_eq!(config.consul.wait_time_secs, 300);
    assert_eq!(config.consul.base_url(), "http://localhost:8500");
    assert_eq!(config.consul.request_timeout(), Duration::from_secs(310));
    assert_eq!(config.watch.max_retries, None);
    assert_eq!(
        config.watch.backoff,
        BackoffConfig::Exponential {
            base_ms: 1_000,
            max_ms: 30_000
        }
    );
}

#[test]
fn request_timeout_always_exceeds_wait() {
    let config = ConsulConfig {
        wait_time_secs: 5,
        read_timeout_margin_secs: 0,
        ..ConsulConfig::default()
    };
    assert!(config.request_timeout() > Duration::from_secs(5));
}

#[test]
fn toml_config_is_parsed() {
    let config = AgentConfig::from_toml(
        r#"
        [consul]
        host = "consul.internal"
        port = 8501
        wait_time_secs = 60

        [watch]
        max_retries = 5

        [watch.backoff]
        type = "fixed"
        delay_ms = 250
        "#,
    )
    .unwrap();

    assert_eq!(config.consul.host, "consul.internal");
    assert_eq!(config.consul.port, 8501);
    assert_eq!(config.consul.wait_time_secs, 60);
    assert_eq!(config.consul.read_timeout_margin_secs, 10);
    assert_eq!(config.watch.max_retries, Some(5));
    assert_eq!(config.watch.backoff, BackoffConfig::Fixed { delay_ms: 250 });

    let settings = config.watch.into_settings();
    assert_eq!(settings.max_retries, Some(5));
    assert_eq!(settings.backoff.delay(1), Duration::from_millis(250));
    assert_eq!(settings.backoff.delay(7), Duration::from_millis(250));
}

#[test]
fn empty_toml_uses_defaults() {
    let config = AgentConfig::from_toml("").unwrap();
    assert_eq!(config.consul.port, 8500);
    assert_eq!(config.watch.max_retries, None);
}

#[test]
fn out_of_range_wait_in_toml_is_rejected() {
    let err = AgentConfig::from_toml("[consul]\nwait_time_secs = 601\n").unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidConfig(_)));
    assert_eq!(err.code().category(), ErrorCategory::Configuration);
}

#[test]
fn malformed_toml_is_a_configuration_error() {
    let err = AgentConfig::from_toml("[consul\nport = ").unwrap_err();
    assert!(matches!(err, DiscoveryError::Toml(_)));
    assert_eq!(err.code(), ErrorCode::ConfigurationError);
}

#[test]
fn missing_config_file_is_an_io_error() {
    let err = AgentConfig::load_from_file("/nonexistent/discovery-agent.toml").unwrap_err();
    assert!(matches!(err, DiscoveryError::Io(_)));
}

#[test]
fn blank_host_is_rejected() {
    let config = ConsulConfig {
        host: "  ".into(),
        ..ConsulConfig::default()
    };
    tokio_test::assert_err!(config.validate());
    tokio_test::assert_ok!(ConsulConfig::default().validate());
}

#[test]
fn exponential_backoff_doubles_until_capped() {
    let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1));

    assert_eq!(backoff.delay(1), Duration::from_millis(100));
    assert_eq!(backoff.delay(2), Duration::from_millis(200));
    assert_eq!(backoff.delay(4), Duration::from_millis(800));
    assert_eq!(backoff.delay(5), Duration::from_secs(1));
    assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1));
}

#[test]
fn fixed_backoff_ignores_attempt() {
    let backoff = FixedBackoff::new(Duration::from_millis(40));
    assert_eq!(backoff.delay(1), backoff.delay(100));
}

#[test]
fn closures_are_backoff_policies() {
    let linear = |attempt: u32| Duration::from_millis(u64::from(attempt) * 10);
    assert_eq!(linear.delay(3), Duration::from_millis(30));

    let settings = WatchConfig::default().into_settings();
    assert_eq!(settings.backoff.delay(1), Duration::from_secs(1));
    assert_eq!(settings.backoff.delay(10), Duration::from_secs(30));
}

#[test]
fn watch_request_requires_service_name() {
    for name in ["", "   "] {
        let err = WatchRequest::for_service(name).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidConfig(_)));
    }
    assert!(WatchRequest::builder().build().is_err());
}

#[test]
fn watch_request_defaults_to_initial_index() {
    let request = WatchRequest::for_service("pong").unwrap();
    assert_eq!(request.index(), INITIAL_INDEX);
    assert_eq!(request.tag(), None);

    let request = WatchRequest::builder()
        .for_service("pong")
        .with_tag("jvm")
        .last_index("17")
        .build()
        .unwrap();
    assert_eq!(request.service_name(), "pong");
    assert_eq!(request.index(), "17");
    assert_eq!(request.tag(), Some("jvm"));
}

#[test]
fn instance_endpoint_and_url() {
    let instance = ServiceInstance::new("n1", "10.0.0.1", "api-1", "api", "10.0.0.2", 8080)
        .with_tag("blue");

    assert_eq!(instance.endpoint(), "10.0.0.2:8080");
    assert_eq!(instance.to_http_url(), "http://10.0.0.2:8080");
    assert!(instance.has_tag("blue"));
    assert!(!instance.has_tag("green"));
}

#[test]
fn error_codes_are_classified() {
    let exhausted = DiscoveryError::RetriesExhausted {
        service: "pong".into(),
        attempts: 4,
        reason: "refused".into(),
    };
    assert_eq!(exhausted.code(), ErrorCode::RetriesExhausted);
    assert_eq!(exhausted.code().category(), ErrorCategory::Backend);
    assert!(!exhausted.is_retryable());

    let backend = DiscoveryError::backend("boom");
    assert_eq!(backend.code().as_u32(), 2003);
    assert!(backend.is_retryable());

    let missing = DiscoveryError::no_service_available("pong");
    assert_eq!(missing.code().category(), ErrorCategory::Balancer);
    assert_eq!(missing.code().as_str(), "NO_SERVICE_AVAILABLE");
}

#[test]
fn tracing_can_only_be_installed_once() {
    assert!(discovery_agent::init_tracing("debug", false));
    assert!(!discovery_agent::init_tracing("info", true));
}
