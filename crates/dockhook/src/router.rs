//! HTTP router configuration

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::api::{hosts, system, webhooks};
use crate::auth::require_auth;
use crate::state::AppState;

/// Create the application router, nested under the configured base path
///
/// Everything except the healthcheck and the OpenAPI document sits behind
/// authentication when a provider is configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let base = state.config.base_path();

    let mut protected = Router::new()
        .route("/version", get(system::version))
        // Webhooks
        .route("/api/webhooks/{uuid}", post(webhooks::trigger_webhook))
        // Hosts
        .route("/api/hosts", get(hosts::list_hosts))
        .route("/api/hosts/{host}/containers", get(hosts::list_containers))
        .route("/api/hosts/{host}/events", get(hosts::host_events));

    if let Some(auth) = &state.auth {
        protected =
            protected.route_layer(middleware::from_fn_with_state(Arc::clone(auth), require_auth));
    }

    let routes = Router::new()
        // System endpoints
        .route("/healthcheck", get(system::healthcheck))
        .route("/api/openapi.json", get(system::openapi))
        .merge(protected);

    let router = if base.is_empty() {
        routes
    } else {
        Router::new().nest(&base, routes)
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use dockhook_api::{ActionResponse, Container, ContainerAction, HostSummary, Webhook};
    use dockhook_core::{Client, ClientRegistry, Host};
    use dockhook_engine::models::{
        ContainerInspectResponse, ContainerSummary, EventMessage, SystemInfo,
    };
    use dockhook_engine::{
        ContainerEngine, ContainerSpec, EngineError, EventStream, LogOptions, LogStream,
        RegistryCredentials,
    };
    use futures::StreamExt;
    use reqwest::StatusCode;
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::auth::BasicAuth;
    use crate::config::{AuthProvider, Config};
    use crate::users::{User, UserDatabase};
    use crate::webhooks::{WebhookDatabase, derive_uuid};

    const FULL_ID: &str = "abcdefghijkl0123456789abcdef0123456789abcdef0123456789abcdef0123";

    /// Engine with a single running `web` container
    #[derive(Default)]
    struct StubEngine {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContainerEngine for StubEngine {
        async fn list_containers(
            &self,
            _filters: &HashMap<String, Vec<String>>,
        ) -> Result<Vec<ContainerSummary>, EngineError> {
            Ok(vec![ContainerSummary {
                id: Some(FULL_ID.to_string()),
                names: Some(vec!["/web".to_string()]),
                image: Some("nginx:latest".to_string()),
                state: Some("running".to_string()),
                status: Some("Up 2 hours (healthy)".to_string()),
                created: Some(1_700_000_000),
                ..Default::default()
            }])
        }

        async fn inspect_container(
            &self,
            _id: &str,
        ) -> Result<ContainerInspectResponse, EngineError> {
            Ok(ContainerInspectResponse::default())
        }

        async fn start_container(&self, id: &str) -> Result<(), EngineError> {
            self.calls.lock().unwrap().push(format!("start {id}"));
            Ok(())
        }

        async fn stop_container(&self, id: &str) -> Result<(), EngineError> {
            self.calls.lock().unwrap().push(format!("stop {id}"));
            Ok(())
        }

        async fn restart_container(&self, id: &str) -> Result<(), EngineError> {
            self.calls.lock().unwrap().push(format!("restart {id}"));
            Ok(())
        }

        async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
            self.calls.lock().unwrap().push(format!("remove {id}"));
            Ok(())
        }

        async fn create_container(&self, _spec: ContainerSpec) -> Result<String, EngineError> {
            Ok(FULL_ID.to_string())
        }

        async fn pull_image(
            &self,
            _image: &str,
            _credentials: Option<&RegistryCredentials>,
        ) -> Result<(), EngineError> {
            Ok(())
        }

        async fn ping(&self) -> Result<String, EngineError> {
            Ok("1.47".to_string())
        }

        async fn info(&self) -> Result<SystemInfo, EngineError> {
            Ok(SystemInfo::default())
        }

        fn logs(&self, _id: &str, _options: LogOptions) -> LogStream {
            futures::stream::empty().boxed()
        }

        fn events(&self) -> EventStream {
            futures::stream::pending::<Result<EventMessage, EngineError>>().boxed()
        }

        fn engine_type(&self) -> &'static str {
            "stub"
        }
    }

    struct TestServer {
        url: String,
        http: reqwest::Client,
        state: Arc<AppState>,
        _dir: tempfile::TempDir,
    }

    async fn serve(config: Config) -> TestServer {
        let dir = tempfile::tempdir().unwrap();
        let webhooks = WebhookDatabase::open(dir.path().join("webhooks.toml"))
            .await
            .unwrap();

        let auth = match config.server.auth_provider {
            AuthProvider::Basic => {
                let users = UserDatabase::open(dir.path().join("users.toml"))
                    .await
                    .unwrap();
                users
                    .create(User::new("admin", "secret", None, None))
                    .await
                    .unwrap();
                Some(BasicAuth::new(users))
            }
            AuthProvider::None => None,
        };

        let client = Client::connect(
            Arc::new(StubEngine::default()),
            HashMap::new(),
            Host::local(),
        )
        .await;
        let registry = ClientRegistry::from_clients([Arc::new(client)]);

        let state = Arc::new(AppState::new(
            registry,
            webhooks,
            auth,
            config,
            CancellationToken::new(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = create_router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        TestServer {
            url: format!("http://{addr}"),
            http: reqwest::Client::new(),
            state,
            _dir: dir,
        }
    }

    /// Config with every route public
    fn public() -> Config {
        let mut config = Config::default();
        config.server.auth_provider = AuthProvider::None;
        config
    }

    fn webhook(host: &str, action: ContainerAction) -> Webhook {
        Webhook {
            uuid: derive_uuid("abcdefghijkl", host, action).to_string(),
            container_id: "abcdefghijkl".to_string(),
            container_name: "web".to_string(),
            host: host.to_string(),
            action,
            auth: None,
            created: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_version() {
        let server = serve(public()).await;

        let response = server
            .http
            .get(format!("{}/version", server.url))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_healthcheck_reports_api_version() {
        let server = serve(public()).await;

        let response = server
            .http
            .get(format!("{}/healthcheck", server.url))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["api_version"], "1.47");
    }

    #[tokio::test]
    async fn test_base_path() {
        let mut config = public();
        config.server.base = "/hooks/".to_string();
        let server = serve(config).await;

        let nested = server
            .http
            .get(format!("{}/hooks/version", server.url))
            .send()
            .await
            .unwrap();
        let root = server
            .http
            .get(format!("{}/version", server.url))
            .send()
            .await
            .unwrap();

        assert_eq!(nested.status(), StatusCode::OK);
        assert_eq!(root.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_webhook_id() {
        let server = serve(public()).await;

        let response = server
            .http
            .post(format!("{}/api/webhooks/not-a-uuid", server.url))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_webhook() {
        let server = serve(public()).await;

        let response = server
            .http
            .post(format!(
                "{}/api/webhooks/0190a6e4-8c1f-7d2e-9f3a-1b2c3d4e5f60",
                server.url
            ))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_runs_action() {
        let server = serve(public()).await;
        let hook = server
            .state
            .webhooks
            .create(webhook("localhost", ContainerAction::Restart))
            .await
            .unwrap();

        let response = server
            .http
            .post(format!("{}/api/webhooks/{}", server.url, hook.uuid))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ActionResponse = response.json().await.unwrap();
        assert_eq!(body.status, "ok");
        assert_eq!(body.action, ContainerAction::Restart);
        assert_eq!(body.container.id, "abcdefghijkl");
        assert_eq!(body.container.name, "web");
    }

    #[tokio::test]
    async fn test_webhook_for_disconnected_host() {
        let server = serve(public()).await;
        let hook = server
            .state
            .webhooks
            .create(webhook("remote", ContainerAction::Start))
            .await
            .unwrap();

        let response = server
            .http
            .post(format!("{}/api/webhooks/{}", server.url, hook.uuid))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_list_hosts_and_containers() {
        let server = serve(public()).await;

        let hosts: Vec<HostSummary> = server
            .http
            .get(format!("{}/api/hosts", server.url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].id, "localhost");

        let containers: Vec<Container> = server
            .http
            .get(format!("{}/api/hosts/localhost/containers", server.url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].health.as_deref(), Some("healthy"));

        let missing = server
            .http
            .get(format!("{}/api/hosts/nowhere/containers", server.url))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_protected_routes_require_credentials() {
        let server = serve(Config::default()).await;

        for path in ["/version", "/api/hosts", "/api/hosts/localhost/containers"] {
            let response = server
                .http
                .get(format!("{}{path}", server.url))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");
            assert_eq!(
                response.headers()["www-authenticate"],
                r#"Basic realm="Restricted""#
            );
        }

        let response = server
            .http
            .post(format!(
                "{}/api/webhooks/0190a6e4-8c1f-7d2e-9f3a-1b2c3d4e5f60",
                server.url
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // The healthcheck stays public
        let health = server
            .http
            .get(format!("{}/healthcheck", server.url))
            .send()
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_with_credentials() {
        let server = serve(Config::default()).await;
        let hook = server
            .state
            .webhooks
            .create(webhook("localhost", ContainerAction::Stop))
            .await
            .unwrap();

        let wrong = server
            .http
            .post(format!("{}/api/webhooks/{}", server.url, hook.uuid))
            .basic_auth("admin", Some("wrong"))
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let response = server
            .http
            .post(format!("{}/api/webhooks/{}", server.url, hook.uuid))
            .basic_auth("admin", Some("secret"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: ActionResponse = response.json().await.unwrap();
        assert_eq!(body.action, ContainerAction::Stop);
    }

    #[tokio::test]
    async fn test_repeated_attempts_are_blocked() {
        let server = serve(Config::default()).await;
        let url = format!("{}/version", server.url);

        for _ in 0..5 {
            let response = server
                .http
                .get(&url)
                .basic_auth("admin", Some("secret"))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let blocked = server
            .http
            .get(&url)
            .basic_auth("admin", Some("secret"))
            .send()
            .await
            .unwrap();
        assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(blocked.headers()["retry-after"], "3600");
    }
}
