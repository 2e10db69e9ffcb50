//! 轮询负载均衡测试

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedBackend, Step, pong_1, pong_2, pong_3, snapshot, wait_until};
use discovery_agent::balancer::{LoadBalancer, RoundRobinLoadBalancer};
use discovery_agent::config::WatchSettings;
use discovery_agent::discovery::{DiscoveryFactory, DiscoveryService};
use discovery_agent::error::{DiscoveryError, ErrorCode};

fn discovery_with(steps: Vec<Step>) -> (Arc<ScriptedBackend>, Arc<DiscoveryService>) {
    let backend = ScriptedBackend::with_steps(steps);
    let settings = WatchSettings::with_delay_fn(None, |_| Duration::from_millis(1));
    let discovery = Arc::new(DiscoveryService::new(backend.clone(), settings));
    (backend, discovery)
}

fn next_endpoint(balancer: &RoundRobinLoadBalancer) -> String {
    balancer
        .with_next_endpoint(|address, port| format!("{address}:{port}"))
        .expect("instance expected")
}

#[tokio::test]
async fn empty_service_reports_no_service_available() {
    let (_backend, discovery) = discovery_with(vec![Step::NoData]);
    let balancer = DiscoveryFactory::create_round_robin(discovery, "pong").await;

    let err = balancer.with_next_endpoint(|_, _| ()).unwrap_err();
    assert!(matches!(err, DiscoveryError::NoServiceAvailable { ref service } if service == "pong"));
    assert_eq!(err.code(), ErrorCode::NoServiceAvailable);
    assert_eq!(err.to_string(), "There is no \"pong\" service available");
}

#[tokio::test]
async fn uninitialized_balancer_has_no_instances() {
    let (backend, discovery) = discovery_with(vec![snapshot(vec![pong_1()], "1")]);
    let balancer = RoundRobinLoadBalancer::new(discovery, "pong");

    assert!(balancer.instances().is_empty());
    assert!(balancer.with_next_endpoint(|_, _| ()).is_err());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn endpoints_are_selected_in_order() {
    let (_backend, discovery) = discovery_with(vec![snapshot(vec![pong_1(), pong_2()], "1")]);
    let balancer = DiscoveryFactory::create_round_robin(discovery, "pong").await;

    assert_eq!(balancer.service_name(), "pong");
    assert_eq!(next_endpoint(&balancer), "192.168.25.111:9877");
    assert_eq!(next_endpoint(&balancer), "192.168.25.112:9877");
    assert_eq!(next_endpoint(&balancer), "192.168.25.111:9877");
}

#[tokio::test]
async fn kth_call_selects_k_mod_n() {
    let instances = vec![pong_1(), pong_2(), pong_3()];
    let (_backend, discovery) = discovery_with(vec![snapshot(instances.clone(), "1")]);
    let balancer = DiscoveryFactory::create_round_robin(discovery, "pong").await;

    for k in 0..10 {
        assert_eq!(next_endpoint(&balancer), instances[k % instances.len()].endpoint());
    }
}

#[tokio::test]
async fn balancer_follows_subscription_updates() {
    let (backend, discovery) = discovery_with(vec![snapshot(vec![pong_1(), pong_2()], "1")]);
    let balancer = DiscoveryFactory::create_round_robin(discovery.clone(), "pong").await;
    assert_eq!(balancer.instances().len(), 2);
    assert_eq!(discovery.subscriber_count("pong"), 1);

    backend.push(snapshot(vec![pong_3()], "2"));
    assert!(wait_until(Duration::from_secs(2), || balancer.instances().len() == 1).await);
    assert_eq!(next_endpoint(&balancer), "192.168.25.113:9878");
    assert_eq!(next_endpoint(&balancer), "192.168.25.113:9878");
}

#[tokio::test]
async fn close_stops_following_updates() {
    let (backend, discovery) = discovery_with(vec![snapshot(vec![pong_1()], "1")]);
    let balancer = DiscoveryFactory::create_round_robin(discovery.clone(), "pong").await;

    balancer.close();
    assert_eq!(discovery.subscriber_count("pong"), 0);

    backend.push(snapshot(vec![pong_2(), pong_3()], "2"));
    assert!(wait_until(Duration::from_secs(2), || backend.calls() == 3).await);
    assert_eq!(balancer.instances().as_ref(), &vec![pong_1()]);
}

#[tokio::test]
async fn reinit_replaces_previous_subscription() {
    let (_backend, discovery) = discovery_with(vec![snapshot(vec![pong_1()], "1")]);
    let balancer = RoundRobinLoadBalancer::new(discovery.clone(), "pong");

    balancer.init().await;
    balancer.init().await;
    assert_eq!(discovery.subscriber_count("pong"), 1);
}

#[tokio::test]
async fn concurrent_selection_is_balanced() {
    let instances = vec![pong_1(), pong_2(), pong_3()];
    let (_backend, discovery) = discovery_with(vec![snapshot(instances.clone(), "1")]);
    let balancer = DiscoveryFactory::create_round_robin(discovery, "pong").await;

    let counts: HashMap<String, usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    (0..300)
                        .map(|_| next_endpoint(&balancer))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts = HashMap::new();
        for handle in handles {
            for endpoint in handle.join().unwrap() {
                *counts.entry(endpoint).or_insert(0) += 1;
            }
        }
        counts
    });

    assert_eq!(counts.len(), 3);
    for instance in &instances {
        assert_eq!(counts[&instance.endpoint()], 400);
    }
}
