use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dockhook_core::{ClientRegistry, CoreError, EngineConnector, Host, RegistryConfig};
use dockhook_engine::{ContainerEngine, EngineError};

mod common;
use common::{FakeEngine, summary};

/// Connector handing out fake engines per host ID
#[derive(Default)]
struct FakeConnector {
    local: Option<Arc<FakeEngine>>,
    remotes: HashMap<String, Arc<FakeEngine>>,
    local_attempts: AtomicUsize,
}

#[async_trait]
impl EngineConnector for FakeConnector {
    async fn connect_local(&self) -> Result<Arc<dyn ContainerEngine>, EngineError> {
        self.local_attempts.fetch_add(1, Ordering::SeqCst);
        match &self.local {
            Some(engine) => Ok(Arc::clone(engine) as Arc<dyn ContainerEngine>),
            None => Err(EngineError::ConnectionFailed("no socket".to_string())),
        }
    }

    async fn connect_remote(&self, host: &Host) -> Result<Arc<dyn ContainerEngine>, EngineError> {
        match self.remotes.get(&host.id) {
            Some(engine) => Ok(Arc::clone(engine) as Arc<dyn ContainerEngine>),
            None => Err(EngineError::ConnectionFailed(host.id.clone())),
        }
    }
}

fn config(remote_hosts: &[&str]) -> RegistryConfig {
    RegistryConfig {
        remote_hosts: remote_hosts.iter().map(ToString::to_string).collect(),
        retry_interval: Duration::from_millis(10),
        certs_dir: PathBuf::from("/nonexistent/certs"),
        ..Default::default()
    }
}

fn healthy_engine() -> Arc<FakeEngine> {
    Arc::new(FakeEngine::new(vec![summary(
        "abcdefghijklmnop",
        "/web",
        "running",
        "Up",
    )]))
}

#[tokio::test]
async fn test_local_and_remote() {
    let connector = FakeConnector {
        local: Some(healthy_engine()),
        remotes: HashMap::from([("tcp:10.0.0.5:2375".to_string(), healthy_engine())]),
        ..Default::default()
    };

    let registry = ClientRegistry::build(&config(&["tcp://10.0.0.5:2375|edge"]), &connector)
        .await
        .unwrap();

    assert_eq!(registry.host_ids(), vec!["localhost", "tcp:10.0.0.5:2375"]);
    let remote = registry.client("tcp:10.0.0.5:2375").unwrap();
    assert_eq!(remote.host().name, "edge");
    assert_eq!(remote.host().n_cpu, 4);
}

#[tokio::test]
async fn test_unreachable_local_keeps_remote() {
    let connector = FakeConnector {
        remotes: HashMap::from([("tcp:10.0.0.5:2375".to_string(), healthy_engine())]),
        ..Default::default()
    };

    let registry = ClientRegistry::build(&config(&["tcp://10.0.0.5:2375"]), &connector)
        .await
        .unwrap();

    assert_eq!(registry.host_ids(), vec!["tcp:10.0.0.5:2375"]);
    assert_eq!(connector.local_attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_reachable_hosts() {
    let connector = FakeConnector::default();

    let result = ClientRegistry::build(&config(&["tcp://10.0.0.9:2375"]), &connector).await;

    assert!(matches!(result, Err(CoreError::NoClients)));
}

#[tokio::test]
async fn test_remote_failing_validation_is_dropped() {
    let broken = healthy_engine();
    broken.fail_list(Some(EngineError::ConnectionFailed("timeout".to_string())));
    let connector = FakeConnector {
        local: Some(healthy_engine()),
        remotes: HashMap::from([("tcp:10.0.0.6:2375".to_string(), broken)]),
        ..Default::default()
    };

    let registry = ClientRegistry::build(&config(&["tcp://10.0.0.6:2375"]), &connector)
        .await
        .unwrap();

    assert_eq!(registry.host_ids(), vec!["localhost"]);
    assert!(matches!(
        registry.client("tcp:10.0.0.6:2375"),
        Err(CoreError::HostNotFound(_))
    ));
}

#[tokio::test]
async fn test_malformed_remote_is_fatal() {
    let connector = FakeConnector {
        local: Some(healthy_engine()),
        ..Default::default()
    };

    let extra_separator =
        ClientRegistry::build(&config(&["tcp://a:2375|b|c"]), &connector).await;
    assert!(matches!(
        extra_separator,
        Err(CoreError::InvalidConnection { .. })
    ));

    let wrong_scheme = ClientRegistry::build(&config(&["http://a:2375"]), &connector).await;
    assert!(matches!(
        wrong_scheme,
        Err(CoreError::UnsupportedScheme { .. })
    ));
}

#[tokio::test]
async fn test_local_retries_within_wait_budget() {
    let local = healthy_engine();
    local.fail_list(Some(EngineError::ConnectionFailed("starting".to_string())));
    let connector = FakeConnector {
        local: Some(Arc::clone(&local)),
        ..Default::default()
    };
    let mut config = config(&[]);
    config.wait_for_docker = Duration::from_millis(30);

    let result = ClientRegistry::build(&config, &connector).await;

    // 30ms budget at 10ms per attempt: the first try plus three retries
    assert!(matches!(result, Err(CoreError::NoClients)));
    assert_eq!(connector.local_attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_local_comes_up_while_waiting() {
    let local = healthy_engine();
    local.fail_list(Some(EngineError::ConnectionFailed("starting".to_string())));
    let connector = Arc::new(FakeConnector {
        local: Some(Arc::clone(&local)),
        ..Default::default()
    });
    let mut config = config(&[]);
    config.wait_for_docker = Duration::from_secs(5);

    let recover = tokio::spawn({
        let local = Arc::clone(&local);
        async move {
            tokio::time::sleep(Duration::from_millis(25)).await;
            local.fail_list(None);
        }
    });

    let registry = ClientRegistry::build(&config, connector.as_ref()).await.unwrap();
    recover.await.unwrap();

    assert_eq!(registry.host_ids(), vec!["localhost"]);
    assert!(connector.local_attempts.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn test_hostname_override_applies_to_local_only() {
    let connector = FakeConnector {
        local: Some(healthy_engine()),
        remotes: HashMap::from([("tcp:10.0.0.5:2375".to_string(), healthy_engine())]),
        ..Default::default()
    };
    let mut config = config(&["tcp://10.0.0.5:2375"]);
    config.hostname = Some("build-box".to_string());

    let registry = ClientRegistry::build(&config, &connector).await.unwrap();

    let local = registry.client("localhost").unwrap();
    assert_eq!(local.host().id, "localhost");
    assert_eq!(local.host().name, "build-box");
    let remote = registry.client("tcp:10.0.0.5:2375").unwrap();
    assert_eq!(remote.host().name, "10.0.0.5");
}
