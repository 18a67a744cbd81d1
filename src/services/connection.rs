//! Connection manager: owns the single event stream connection.
//!
//! DESIGN
//! ======
//! One control task drives an explicit state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Reconnecting(delay) -> Connecting ...
//!                      \______________________/
//!                       handshake failure
//! any state -> Stopped (shutdown requested)
//! ```
//!
//! The control task is the only writer of [`ConnectionState`] and the only
//! place a connection attempt or a reconnect wait can start, so there is
//! never more than one attempt in flight and never more than one pending
//! timer. `start`/`stop` arriving from outside are serialized by the async
//! mutex around the control handle.
//!
//! LIFECYCLE
//! =========
//! 1. `start` spawns the control task and returns at once.
//! 2. Each text frame is classified in arrival order; accepted posts go to
//!    the forward queue without waiting on delivery.
//! 3. A transport error or remote close schedules a reconnect after the
//!    current backoff delay; bad frames are only logged.
//! 4. `stop` flips the shutdown watch, which cancels a pending connect or
//!    wait, closes the stream with a normal-closure frame and joins the task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::classifier::{Classification, classify_frame};
use super::forwarder::ForwardQueue;
use crate::mattermost::stream::{EventStream, StreamConnector, StreamError};

const FRAME_LOG_LIMIT: usize = 200;

// =============================================================================
// STATE + BACKOFF
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting `delay` before the next connection attempt.
    Reconnecting { delay: Duration },
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { initial: Duration::from_secs(1), max: Duration::from_secs(30) }
    }
}

/// Exponential reconnect delay: `initial * 2^(n-1)` after the n-th
/// consecutive failure, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, current: policy.initial }
    }

    /// Delay for the failure being handled now; doubles the one after it.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.policy.max);
        delay
    }

    /// Called once per successful connection.
    pub fn reset(&mut self) {
        self.current = self.policy.initial;
    }
}

// =============================================================================
// MANAGER
// =============================================================================

pub struct ConnectionManager {
    connector: Arc<dyn StreamConnector>,
    queue: ForwardQueue,
    bot_user_id: Option<String>,
    policy: ReconnectPolicy,
    state: Arc<watch::Sender<ConnectionState>>,
    control: Mutex<Option<Running>>,
}

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        queue: ForwardQueue,
        bot_user_id: Option<String>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self { connector, queue, bot_user_id, policy, state: Arc::new(state), control: Mutex::new(None) }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Spawn the control task. No-op while it is already running.
    pub async fn start(&self) {
        let mut control = self.control.lock().await;
        if control.as_ref().is_some_and(|running| !running.task.is_finished()) {
            debug!("connection manager already running");
            return;
        }

        info!("starting event stream");
        let (shutdown, shutdown_rx) = watch::channel(false);
        let control_loop = ControlLoop {
            connector: self.connector.clone(),
            queue: self.queue.clone(),
            bot_user_id: self.bot_user_id.clone(),
            policy: self.policy,
            state: self.state.clone(),
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(control_loop.run());
        *control = Some(Running { shutdown, task });
    }

    /// Cancel any pending wait, close the stream and wait for the control
    /// task to exit. Safe to call repeatedly.
    pub async fn stop(&self) {
        let mut control = self.control.lock().await;
        if let Some(running) = control.take() {
            info!("stopping event stream");
            let _ = running.shutdown.send(true);
            if let Err(e) = running.task.await {
                error!(error = %e, "event stream task failed");
            }
        }
        self.state.send_replace(ConnectionState::Stopped);
    }
}

// =============================================================================
// CONTROL LOOP
// =============================================================================

enum Disconnect {
    Shutdown,
    Closed,
    Lost(StreamError),
}

struct ControlLoop {
    connector: Arc<dyn StreamConnector>,
    queue: ForwardQueue,
    bot_user_id: Option<String>,
    policy: ReconnectPolicy,
    state: Arc<watch::Sender<ConnectionState>>,
    shutdown: watch::Receiver<bool>,
}

impl ControlLoop {
    async fn run(mut self) {
        let mut backoff = Backoff::new(self.policy);

        loop {
            self.set_state(ConnectionState::Connecting);
            let attempt = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                result = self.connector.connect() => result,
            };

            match attempt {
                Ok(mut stream) => {
                    backoff.reset();
                    self.set_state(ConnectionState::Connected);
                    info!("event stream connected");

                    match self.receive(stream.as_mut()).await {
                        Disconnect::Shutdown => {
                            stream.close().await;
                            break;
                        }
                        Disconnect::Closed => warn!("event stream closed by server"),
                        Disconnect::Lost(e) => warn!(error = %e, "event stream lost"),
                    }
                }
                Err(e) if e.is_auth_rejection() => {
                    error!(error = %e, "event stream handshake rejected; check MATTERMOST_BOT_TOKEN");
                }
                Err(e) => error!(error = %e, "event stream connect failed"),
            }

            let delay = backoff.next_delay();
            self.set_state(ConnectionState::Reconnecting { delay });
            info!(delay_ms = delay.as_millis(), "reconnecting event stream after delay");

            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Stopped);
        info!("event stream stopped");
    }

    async fn receive(&mut self, stream: &mut dyn EventStream) -> Disconnect {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.changed() => return Disconnect::Shutdown,
                next = stream.next_text() => next,
            };

            match next {
                Some(Ok(text)) => self.handle_frame(&text),
                Some(Err(e)) => return Disconnect::Lost(e),
                None => return Disconnect::Closed,
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        match classify_frame(text, self.bot_user_id.as_deref()) {
            Ok(Classification::Forward(inbound)) => {
                info!(
                    post_id = %inbound.post.id,
                    channel_id = %inbound.post.channel_id,
                    direct = inbound.is_direct(),
                    "received forwardable post"
                );
                self.queue.enqueue(inbound);
            }
            Ok(Classification::Skip(reason)) => trace!(?reason, "skipping event"),
            Err(e) => {
                let frame: String = text.chars().take(FRAME_LOG_LIMIT).collect();
                warn!(error = %e, %frame, "dropping malformed event frame");
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
