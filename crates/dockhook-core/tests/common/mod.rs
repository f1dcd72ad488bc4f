//! Shared test engine

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dockhook_engine::models::{
    ContainerConfig, ContainerInspectResponse, ContainerState, ContainerSummary, EventActor,
    EventMessage, EventMessageTypeEnum, SystemInfo,
};
use dockhook_engine::{
    ContainerEngine, ContainerSpec, EngineError, EventStream, LogLine, LogOptions, LogStream,
    RegistryCredentials, StdType,
};
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use tokio::sync::Semaphore;

pub type EventFeed = UnboundedSender<Result<EventMessage, EngineError>>;

/// Full ID handed out by `create_container`
pub const CREATED_ID: &str = "0123456789ab0123456789ab0123456789ab";

/// In-memory engine recording every mutating call
#[derive(Default)]
pub struct FakeEngine {
    containers: Mutex<Vec<ContainerSummary>>,
    calls: Mutex<Vec<String>>,
    feeds: Mutex<VecDeque<UnboundedReceiver<Result<EventMessage, EngineError>>>>,
    list_error: Mutex<Option<EngineError>>,
    pull_error: Mutex<Option<EngineError>>,
    create_error: Mutex<Option<EngineError>>,
    log_lines: Mutex<Vec<LogLine>>,
    last_log_options: Mutex<Option<LogOptions>>,
    list_gate: Option<Arc<Semaphore>>,
    pub list_calls: AtomicUsize,
    pub events_calls: AtomicUsize,
}

impl FakeEngine {
    pub fn new(containers: Vec<ContainerSummary>) -> Self {
        Self {
            containers: Mutex::new(containers),
            ..Default::default()
        }
    }

    /// Listing blocks until permits are added to the returned semaphore
    pub fn gated(containers: Vec<ContainerSummary>) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let engine = Self {
            containers: Mutex::new(containers),
            list_gate: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        (engine, gate)
    }

    /// Queue an event stream for the next `events()` call
    pub fn event_feed(&self) -> EventFeed {
        let (tx, rx) = unbounded();
        self.feeds.lock().unwrap().push_back(rx);
        tx
    }

    pub fn fail_list(&self, error: Option<EngineError>) {
        *self.list_error.lock().unwrap() = error;
    }

    pub fn fail_pull(&self, error: EngineError) {
        *self.pull_error.lock().unwrap() = Some(error);
    }

    pub fn fail_create(&self, error: EngineError) {
        *self.create_error.lock().unwrap() = Some(error);
    }

    /// Output returned by every `logs()` call, regardless of the options
    pub fn set_logs(&self, messages: &[&str]) {
        *self.log_lines.lock().unwrap() = messages
            .iter()
            .map(|message| LogLine {
                stream: StdType::Stdout,
                message: (*message).to_string(),
            })
            .collect();
    }

    pub fn add_container(&self, container: ContainerSummary) {
        self.containers.lock().unwrap().push(container);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_log_options(&self) -> Option<LogOptions> {
        self.last_log_options.lock().unwrap().clone()
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn events_count(&self) -> usize {
        self.events_calls.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn find(&self, id: &str) -> Option<ContainerSummary> {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id.as_deref().is_some_and(|full| full.starts_with(id)))
            .cloned()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn list_containers(
        &self,
        _filters: &HashMap<String, Vec<String>>,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.list_gate {
            let _permit = gate.acquire().await.unwrap();
        }

        if let Some(error) = self.list_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.containers.lock().unwrap().clone())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, EngineError> {
        let summary = self
            .find(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let running = summary.state.as_deref() == Some("running");

        Ok(ContainerInspectResponse {
            id: summary.id.clone(),
            name: summary.names.as_ref().and_then(|n| n.first().cloned()),
            config: Some(ContainerConfig {
                image: summary.image.clone(),
                tty: Some(true),
                ..Default::default()
            }),
            state: Some(ContainerState {
                running: Some(running),
                started_at: Some("2024-03-01T10:00:00.123456789Z".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(format!("start:{id}"));
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(format!("stop:{id}"));
        Ok(())
    }

    async fn restart_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(format!("restart:{id}"));
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(format!("remove:{id}"));
        self.containers
            .lock()
            .unwrap()
            .retain(|c| !c.id.as_deref().is_some_and(|full| full.starts_with(id)));
        Ok(())
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<String, EngineError> {
        self.record(format!("create:{}", spec.name));
        if let Some(error) = self.create_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.add_container(summary(
            CREATED_ID,
            &format!("/{}", spec.name),
            "created",
            "Created",
        ));
        Ok(CREATED_ID.to_string())
    }

    async fn pull_image(
        &self,
        image: &str,
        _credentials: Option<&RegistryCredentials>,
    ) -> Result<(), EngineError> {
        self.record(format!("pull:{image}"));
        match self.pull_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn ping(&self) -> Result<String, EngineError> {
        Ok("1.45".to_string())
    }

    async fn info(&self) -> Result<SystemInfo, EngineError> {
        Ok(SystemInfo {
            ncpu: Some(4),
            mem_total: Some(8 * 1024 * 1024 * 1024),
            ..Default::default()
        })
    }

    fn logs(&self, _id: &str, options: LogOptions) -> LogStream {
        *self.last_log_options.lock().unwrap() = Some(options);
        let lines = self.log_lines.lock().unwrap().clone();
        futures::stream::iter(lines.into_iter().map(Ok)).boxed()
    }

    fn events(&self) -> EventStream {
        self.events_calls.fetch_add(1, Ordering::SeqCst);
        match self.feeds.lock().unwrap().pop_front() {
            Some(rx) => rx.boxed(),
            None => futures::stream::pending().boxed(),
        }
    }

    fn engine_type(&self) -> &'static str {
        "fake"
    }
}

pub fn summary(id: &str, name: &str, state: &str, status: &str) -> ContainerSummary {
    ContainerSummary {
        id: Some(id.to_string()),
        names: Some(vec![name.to_string()]),
        image: Some("nginx:latest".to_string()),
        image_id: Some("sha256:feedface".to_string()),
        command: Some("nginx".to_string()),
        created: Some(1_700_000_000),
        state: Some(state.to_string()),
        status: Some(status.to_string()),
        ..Default::default()
    }
}

pub fn container_event(id: &str, action: &str) -> EventMessage {
    EventMessage {
        typ: Some(EventMessageTypeEnum::CONTAINER),
        action: Some(action.to_string()),
        actor: Some(EventActor {
            id: Some(id.to_string()),
            attributes: None,
        }),
        ..Default::default()
    }
}

/// Poll `check` until it holds or a second passes
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    check()
}
