#![allow(clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tempfile::TempDir;

use sift_core::Session;
use sift_core::config::Config;
use sift_core::config::ConfigOverrides;
use sift_core::config::ConfigToml;
use sift_core::error::TransportError;
use sift_core::transport::ChannelEventSource;
use sift_core::transport::Connector;
use sift_core::transport::EventSource;
use sift_core::transport::TransportEvent;
use sift_protocol::protocol::EventMsg;

pub fn load_default_config_for_test(sift_home: &TempDir) -> Config {
    Config::load_from_base_config_with_overrides(
        ConfigToml::default(),
        ConfigOverrides::default(),
        sift_home.path().to_path_buf(),
    )
}

/// Renders `(event name, JSON payload)` pairs as an SSE body.
pub fn sse(events: &[(&str, serde_json::Value)]) -> String {
    events
        .iter()
        .map(|(name, data)| format!("event: {name}\ndata: {data}\n\n"))
        .collect()
}

pub fn message(name: &str, data: serde_json::Value) -> TransportEvent {
    TransportEvent::Message {
        name: name.to_string(),
        data: data.to_string(),
    }
}

/// Connector that plays one pre-recorded script per `open` call.
///
/// After its script runs out, a stream stays open until the session closes
/// it, so scripts decide for themselves whether to end with `Closed`.
#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Vec<TransportEvent>>>,
    opened: Mutex<Vec<String>>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Vec<TransportEvent>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        })
    }

    /// Queries passed to `open`, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("lock").clone()
    }

    /// Number of streams the session has closed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, query: &str) -> Result<Box<dyn EventSource>, TransportError> {
        self.opened.lock().expect("lock").push(query.to_string());
        let script = self
            .scripts
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_default();

        let (tx, source) = ChannelEventSource::pair();
        let token = source.cancellation_token();
        let closed = Arc::clone(&self.closed);
        tokio::spawn(async move {
            for event in script {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            token.cancelled().await;
            closed.fetch_add(1, Ordering::SeqCst);
        });
        Ok(Box::new(source))
    }
}

pub async fn wait_for_event<F>(session: &Session, mut predicate: F) -> EventMsg
where
    F: FnMut(&EventMsg) -> bool,
{
    use tokio::time::Duration;
    use tokio::time::timeout;
    loop {
        let ev = timeout(Duration::from_secs(1), session.next_event())
            .await
            .expect("timeout waiting for event")
            .expect("stream ended unexpectedly");
        if predicate(&ev.msg) {
            return ev.msg;
        }
    }
}

/// Polls `check` until it holds or a second has passed.
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    use tokio::time::Duration;
    use tokio::time::Instant;
    let deadline = Instant::now() + Duration::from_secs(1);
    while !check() {
        assert!(Instant::now() < deadline, "condition not met within 1s");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Starts a mock backend answering `GET /stream-search` with `body` as an
/// SSE stream.
pub async fn start_mock_sse_server(body: String) -> wiremock::MockServer {
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream-search"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(body, "text/event-stream"),
        )
        .mount(&server)
        .await;
    server
}
