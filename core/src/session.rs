//! Async front end for a [`SessionController`].
//!
//! One task owns the controller and the active transport; callers talk to it
//! through a submission queue and an event queue.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use async_channel::Receiver;
use async_channel::Sender;
use sift_protocol::protocol::Event;
use sift_protocol::protocol::EventMsg;
use sift_protocol::protocol::Op;
use sift_protocol::protocol::Submission;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;

use crate::config::Config;
use crate::controller::Disposition;
use crate::controller::SessionController;
use crate::error::Result as SiftResult;
use crate::error::SessionErr;
use crate::transport::Connector;
use crate::transport::EventSource;
use crate::transport::FixtureConnector;
use crate::transport::SseConnector;
use crate::transport::TransportEvent;

const SUBMISSION_CHANNEL_CAPACITY: usize = 64;

/// Handle to a running session task. Dropping it closes the submission
/// queue, which stops the task and closes any open stream.
pub struct Session {
    next_id: AtomicU64,
    tx_sub: Sender<Submission>,
    rx_event: Receiver<Event>,
}

impl Session {
    /// Spawns the session task. Must be called from within a tokio runtime.
    pub fn spawn(config: Config, connector: Arc<dyn Connector>) -> Session {
        let (tx_sub, rx_sub) = async_channel::bounded(SUBMISSION_CHANNEL_CAPACITY);
        let (tx_event, rx_event) = async_channel::unbounded();

        debug!(base_url = %config.base_url, fixture = ?config.fixture, "spawning session");
        tokio::spawn(submission_loop(connector, rx_sub, tx_event));

        Session {
            next_id: AtomicU64::new(0),
            tx_sub,
            rx_event,
        }
    }

    /// Submit the `op` wrapped in a `Submission` with a unique ID.
    pub async fn submit(&self, op: Op) -> SiftResult<String> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            .to_string();
        let sub = Submission { id: id.clone(), op };
        self.submit_with_id(sub).await?;
        Ok(id)
    }

    /// Use sparingly: prefer `submit()` so the session generates unique IDs.
    pub async fn submit_with_id(&self, sub: Submission) -> SiftResult<()> {
        self.tx_sub
            .send(sub)
            .await
            .map_err(|_| SessionErr::InternalSessionDied)?;
        Ok(())
    }

    pub async fn next_event(&self) -> SiftResult<Event> {
        let event = self
            .rx_event
            .recv()
            .await
            .map_err(|_| SessionErr::InternalSessionDied)?;
        Ok(event)
    }
}

/// Picks the transport for `config`: the fixture replay when one is
/// configured, the HTTP SSE endpoint otherwise.
pub fn connector_for_config(config: &Config) -> Arc<dyn Connector> {
    match &config.fixture {
        Some(path) => Arc::new(FixtureConnector::new(path, config.stream_idle_timeout)),
        None => Arc::new(SseConnector::from_config(config)),
    }
}

/// State owned by the session task.
struct SessionTask {
    controller: SessionController,
    connector: Arc<dyn Connector>,
    source: Option<Box<dyn EventSource>>,
    /// Submission that started the in-flight turn; stream events carry its id.
    active_sub_id: Option<String>,
    tx_event: Sender<Event>,
}

async fn submission_loop(
    connector: Arc<dyn Connector>,
    rx_sub: Receiver<Submission>,
    tx_event: Sender<Event>,
) {
    let mut task = SessionTask {
        controller: SessionController::new(),
        connector,
        source: None,
        active_sub_id: None,
        tx_event,
    };

    loop {
        tokio::select! {
            sub = rx_sub.recv() => {
                let Ok(sub) = sub else {
                    debug!("submission channel closed; stopping session");
                    break;
                };
                trace!(id = %sub.id, op = ?sub.op, "submission");
                if !task.handle_submission(sub).await {
                    break;
                }
            }
            event = next_transport_event(&mut task.source) => {
                task.handle_transport_event(event).await;
            }
        }
    }

    task.close_source();
}

/// Waits on the active source; never resolves when there is none.
async fn next_transport_event(source: &mut Option<Box<dyn EventSource>>) -> TransportEvent {
    match source.as_mut() {
        // A source that runs dry without saying why counts as a close.
        Some(source) => source.next_event().await.unwrap_or(TransportEvent::Closed),
        None => std::future::pending().await,
    }
}

impl SessionTask {
    async fn send_event(&mut self, id: &str, msg: EventMsg) {
        let event = Event {
            id: id.to_string(),
            msg,
        };
        if let Err(e) = self.tx_event.send(event).await {
            error!("failed to send event: {e}");
        }
    }

    async fn send_error(&mut self, id: &str, err: SessionErr) {
        self.send_event(
            id,
            EventMsg::Error {
                message: err.to_string(),
            },
        )
        .await;
    }

    async fn send_cursor(&mut self, id: &str) {
        self.send_event(
            id,
            EventMsg::CursorChanged {
                cursor: self.controller.cursor(),
            },
        )
        .await;
    }

    fn close_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            trace!("closing event source");
            source.close();
        }
    }

    /// Returns `false` once the loop should stop.
    async fn handle_submission(&mut self, sub: Submission) -> bool {
        let id = sub.id;
        match sub.op {
            Op::Submit { query } => self.start_turn(&id, &query).await,
            Op::Cancel => {
                self.close_source();
                self.active_sub_id = None;
                match self.controller.cancel() {
                    Some(turn_id) => {
                        self.send_event(&id, EventMsg::TurnCancelled { turn_id }).await;
                        self.send_cursor(&id).await;
                    }
                    None => {
                        self.send_event(
                            &id,
                            EventMsg::Error {
                                message: "no turn in flight".to_string(),
                            },
                        )
                        .await;
                    }
                }
            }
            Op::Previous => {
                self.controller.previous();
                self.send_cursor(&id).await;
            }
            Op::Next => {
                self.controller.next();
                self.send_cursor(&id).await;
            }
            Op::JumpTo { index } => match self.controller.jump_to(index) {
                Ok(()) => self.send_cursor(&id).await,
                Err(e) => self.send_error(&id, e).await,
            },
            Op::SetPinned { pinned } => {
                self.controller.set_pinned(pinned);
                self.send_cursor(&id).await;
            }
            Op::GetSnapshot => {
                let snapshot = self.controller.snapshot();
                self.send_event(&id, EventMsg::Snapshot(snapshot)).await;
            }
            Op::Shutdown => {
                info!("shutting down session");
                self.close_source();
                if let Some(turn_id) = self.controller.cancel() {
                    self.send_event(&id, EventMsg::TurnCancelled { turn_id }).await;
                }
                self.send_event(&id, EventMsg::ShutdownComplete).await;
                return false;
            }
        }
        true
    }

    async fn start_turn(&mut self, sub_id: &str, query: &str) {
        if let Err(e) = self.controller.submit(query) {
            self.send_error(sub_id, e).await;
            return;
        }
        self.active_sub_id = Some(sub_id.to_string());
        if let Some(turn) = self.controller.in_flight().cloned() {
            self.send_event(sub_id, EventMsg::TurnStarted(turn)).await;
        }
        self.send_cursor(sub_id).await;

        match self.connector.open(query).await {
            Ok(source) => self.source = Some(source),
            Err(e) => {
                debug!("failed to open stream: {e}");
                self.handle_transport_event(TransportEvent::Error(e.to_string()))
                    .await;
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        let sub_id = self.active_sub_id.clone().unwrap_or_default();
        match self.controller.handle_transport_event(event) {
            Disposition::Continue => {
                if let Some(turn) = self.controller.in_flight().cloned() {
                    self.send_event(&sub_id, EventMsg::TurnUpdated(turn)).await;
                }
            }
            Disposition::Close => {
                self.close_source();
                self.active_sub_id = None;
                if let Some(turn) = self.controller.finish() {
                    self.send_event(&sub_id, EventMsg::TurnComplete(turn)).await;
                    self.send_cursor(&sub_id).await;
                }
            }
        }
    }
}
