// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection supervision.
//!
//! [`SessionManager`] owns the single protocol connection. Each connection
//! attempt gets a new generation number; its events are drained by one pump
//! task, in order, and fed through [`SessionSnapshot::transition`]. Events
//! from superseded generations are ignored there.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use notigate_config::WhatsAppConfig;
use notigate_core::{
    AdapterType, ConnectionUpdate, DisconnectReason, HealthStatus, NotigateError, PluginAdapter,
    ProtocolConnection, ProtocolConnector, ProtocolEvent,
};
use tokio::sync::{Mutex, MutexGuard, mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::address::AddressNormalizer;
use crate::credentials::CredentialStore;
use crate::error::SessionError;
use crate::observer::InboundObserver;
use crate::pairing::PairingPresenter;
use crate::state::{Effect, SessionSnapshot, Transition};
use crate::types::ConnectionStatus;

/// Runtime settings for a [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub auth_dir: PathBuf,
    pub country_code: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub settle_timeout: Duration,
    /// Upper bound on opening one connection.
    pub connect_timeout: Duration,
    pub text_pacing: Duration,
    pub image_pacing: Duration,
    pub print_qr: bool,
}

impl SessionConfig {
    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self {
            auth_dir: PathBuf::from(&config.auth_dir),
            country_code: config.country_code.clone(),
            max_reconnect_attempts: config.max_reconnect_attempts,
            reconnect_delay: config.reconnect_delay(),
            settle_timeout: config.settle_timeout(),
            connect_timeout: config.connect_timeout(),
            text_pacing: config.text_pacing(),
            image_pacing: config.image_pacing(),
            print_qr: config.print_qr,
        }
    }

    /// Default settings with credentials under `auth_dir`.
    pub fn with_auth_dir(auth_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::from_config(&WhatsAppConfig::default());
        config.auth_dir = auth_dir.into();
        config
    }
}

/// The live connection and the generation it belongs to.
pub(crate) struct Link {
    pub(crate) generation: u64,
    pub(crate) connection: Arc<dyn ProtocolConnection>,
}

/// Owns the WhatsApp session.
///
/// Construct once with [`SessionManager::new`] and share the returned `Arc`.
pub struct SessionManager {
    pub(crate) config: SessionConfig,
    connector: Arc<dyn ProtocolConnector>,
    credentials: CredentialStore,
    pub(crate) normalizer: AddressNormalizer,
    presenter: PairingPresenter,
    observer: InboundObserver,
    state: watch::Sender<SessionSnapshot>,
    pub(crate) link: Mutex<Option<Link>>,
    /// Serializes connection setup and teardown.
    init_lock: Mutex<()>,
    /// One outbound command at a time.
    pub(crate) send_lock: Mutex<()>,
    generations: AtomicU64,
    shutdown: CancellationToken,
    this: Weak<SessionManager>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(config: SessionConfig, connector: Arc<dyn ProtocolConnector>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionSnapshot::new(config.max_reconnect_attempts));
        Arc::new_cyclic(|this| Self {
            credentials: CredentialStore::new(&config.auth_dir),
            normalizer: AddressNormalizer::new(config.country_code.clone()),
            presenter: PairingPresenter::new(config.print_qr),
            observer: InboundObserver::new(),
            config,
            connector,
            state,
            link: Mutex::new(None),
            init_lock: Mutex::new(()),
            send_lock: Mutex::new(()),
            generations: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
            this: this.clone(),
        })
    }

    /// Receives every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from(&*self.state.borrow())
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// The QR payload awaiting a scan, if any.
    pub fn pairing_token(&self) -> Option<String> {
        self.state.borrow().pairing_token.clone()
    }

    pub fn normalizer(&self) -> &AddressNormalizer {
        &self.normalizer
    }

    /// Runs one input through the transition function and publishes the
    /// result if anything changed.
    pub(crate) fn apply(&self, input: Transition) -> Effect {
        let mut effect = Effect::None;
        self.state.send_if_modified(|snapshot| {
            let before = snapshot.clone();
            effect = snapshot.transition(input);
            *snapshot != before
        });
        effect
    }

    /// Opens a connection unless one is already live or being established.
    ///
    /// Returns once the connection object exists, not once it is open.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        self.initialize_by(Instant::now() + self.config.connect_timeout)
            .await
    }

    async fn initialize_by(&self, deadline: Instant) -> Result<(), SessionError> {
        let _setup = self.lock_setup(deadline).await?;
        if self.shutdown.is_cancelled() {
            return Err(SessionError::ShutDown);
        }

        let live = self.link.lock().await.is_some();
        let snapshot = self.snapshot();
        if live && snapshot.state != crate::state::ConnectionState::Disconnected {
            debug!(
                generation = snapshot.generation,
                state = %snapshot.state,
                "connection already live, initialize is a no-op"
            );
            return Ok(());
        }

        self.open_connection(deadline).await
    }

    async fn lock_setup(&self, deadline: Instant) -> Result<MutexGuard<'_, ()>, SessionError> {
        tokio::time::timeout_at(deadline, self.init_lock.lock())
            .await
            .map_err(|_| SessionError::Connection("connection setup still in progress".into()))
    }

    /// Caller must hold `init_lock`.
    async fn open_connection(&self, deadline: Instant) -> Result<(), SessionError> {
        let credentials = match self.credentials.load().await {
            Ok(credentials) => credentials,
            Err(e) => {
                self.apply(Transition::ConnectFailed);
                return Err(e.into());
            }
        };

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        self.apply(Transition::ConnectStarted { generation });
        info!(
            generation,
            paired = !credentials.is_empty(),
            "opening WhatsApp connection"
        );

        let connected =
            tokio::time::timeout_at(deadline, self.connector.connect(credentials)).await;
        let session = match connected {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                warn!(generation, error = %e, "failed to open WhatsApp connection");
                self.apply(Transition::ConnectFailed);
                return Err(SessionError::Connection(format!(
                    "failed to open connection: {e}"
                )));
            }
            Err(_) => {
                warn!(generation, "WhatsApp connection attempt timed out");
                self.apply(Transition::ConnectFailed);
                return Err(SessionError::Connection(
                    "connection attempt timed out".into(),
                ));
            }
        };

        let previous = self.link.lock().await.replace(Link {
            generation,
            connection: session.connection,
        });
        if let Some(old) = previous {
            debug!(generation = old.generation, "ending superseded connection");
            old.connection.end().await;
        }

        tokio::spawn(run_event_pump(
            self.this.clone(),
            generation,
            session.events,
            self.shutdown.clone(),
        ));
        Ok(())
    }

    async fn handle_event(&self, generation: u64, event: ProtocolEvent) {
        match event {
            ProtocolEvent::PairingToken(token) => {
                self.apply(Transition::PairingRequested {
                    generation,
                    token: token.clone(),
                });
                if self.pairing_token().as_deref() == Some(token.as_str()) {
                    self.presenter.present(&token);
                } else {
                    debug!(generation, "ignoring pairing token from superseded connection");
                }
            }
            ProtocolEvent::Connection(ConnectionUpdate::Open) => {
                self.apply(Transition::Opened { generation });
                if self.snapshot().generation == generation && self.is_connected() {
                    info!(generation, "WhatsApp connection open");
                }
            }
            ProtocolEvent::Connection(ConnectionUpdate::Close(reason)) => {
                self.on_close(generation, reason).await;
            }
            ProtocolEvent::CredentialsRotated(update) => {
                if self.snapshot().generation != generation {
                    debug!(generation, "dropping credential update from superseded connection");
                    return;
                }
                if let Err(e) = self.credentials.apply(update).await {
                    error!(generation, error = %e, "failed to persist rotated credentials");
                }
            }
            ProtocolEvent::Messages { live, messages } => {
                self.observer.observe(live, &messages);
            }
        }
    }

    async fn on_close(&self, generation: u64, reason: DisconnectReason) {
        let effect = self.apply(Transition::Closed {
            generation,
            reason: reason.clone(),
        });
        match effect {
            Effect::LoggedOut => {
                warn!(
                    generation,
                    "WhatsApp session logged out remotely; force a reconnect to pair again"
                );
                self.release_link(generation).await;
            }
            Effect::RequestReconnect => {
                warn!(generation, %reason, "WhatsApp connection closed");
                self.release_link(generation).await;
                self.handle_reconnect();
            }
            _ => debug!(generation, %reason, "ignoring close for superseded connection"),
        }
    }

    async fn release_link(&self, generation: u64) {
        let released = {
            let mut link = self.link.lock().await;
            if link.as_ref().is_some_and(|l| l.generation == generation) {
                link.take()
            } else {
                None
            }
        };
        if let Some(link) = released {
            link.connection.end().await;
        }
    }

    /// Schedules one reconnect attempt after the fixed delay.
    ///
    /// No-op while an attempt is in flight, after a logout, or once the
    /// attempt budget is spent. Returns whether an attempt was scheduled.
    pub fn handle_reconnect(&self) -> bool {
        match self.apply(Transition::ReconnectRequested) {
            Effect::ScheduleReconnect { attempt } => {
                let snapshot = self.snapshot();
                info!(
                    attempt,
                    max = snapshot.max_reconnect_attempts,
                    delay_ms = self.config.reconnect_delay.as_millis() as u64,
                    "scheduling reconnect"
                );

                let this = self.this.clone();
                let delay = self.config.reconnect_delay;
                let shutdown = self.shutdown.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    if let Some(manager) = this.upgrade() {
                        manager.run_reconnect(attempt, snapshot.generation).await;
                    }
                });
                true
            }
            Effect::ReconnectExhausted => {
                error!(
                    attempts = self.snapshot().reconnect_attempts,
                    "reconnect attempts exhausted; force a reconnect to try again"
                );
                false
            }
            _ => {
                debug!("reconnect already in flight or not permitted");
                false
            }
        }
    }

    async fn run_reconnect(&self, attempt: u32, scheduled_generation: u64) {
        let snapshot = self.snapshot();
        if snapshot.generation != scheduled_generation || !snapshot.is_reconnecting {
            debug!(attempt, "reconnect superseded before it ran");
            return;
        }
        match self.initialize().await {
            Ok(()) => debug!(attempt, "reconnect attempt opened a connection"),
            Err(e) => {
                warn!(attempt, error = %e, "reconnect attempt failed");
                self.handle_reconnect();
            }
        }
    }

    /// Makes sure the session is connected before a command runs.
    ///
    /// From an idle session this resets the attempt budget, initializes
    /// once, and waits for the open event. Both steps together are bounded
    /// by the settle timeout.
    pub async fn ensure_connection(&self) -> Result<(), SessionError> {
        let snapshot = self.snapshot();
        if snapshot.shut_down {
            return Err(SessionError::ShutDown);
        }
        if snapshot.is_connected() {
            return Ok(());
        }
        if snapshot.is_reconnecting {
            return Err(SessionError::ConnectionBusy);
        }
        if snapshot.logged_out {
            return Err(SessionError::PermanentLogout);
        }

        info!(state = %snapshot.state, "not connected, initializing before command");
        let deadline = Instant::now() + self.config.settle_timeout;
        self.apply(Transition::ManualConnect);
        self.initialize_by(deadline).await?;
        self.wait_until_connected(deadline.saturating_duration_since(Instant::now()))
            .await
    }

    /// Resolves on the open event, a logout, shutdown, or the deadline.
    pub async fn wait_until_connected(&self, deadline: Duration) -> Result<(), SessionError> {
        let mut rx = self.state.subscribe();
        let waited = tokio::time::timeout(deadline, async {
            rx.wait_for(|s| s.is_connected() || s.logged_out || s.shut_down)
                .await
                .map(|s| (s.is_connected(), s.logged_out))
        })
        .await;

        match waited {
            Ok(Ok((true, _))) => Ok(()),
            Ok(Ok((false, true))) => Err(SessionError::PermanentLogout),
            Ok(Ok((false, false))) | Ok(Err(_)) => Err(SessionError::ShutDown),
            Err(_) if self.pairing_token().is_some() => Err(SessionError::Connection(
                "pairing required, scan the QR code first".into(),
            )),
            Err(_) => Err(SessionError::Connection(format!(
                "connection did not open within {} ms",
                deadline.as_millis()
            ))),
        }
    }

    /// Tears down the live connection, resets all session state, and opens a
    /// fresh connection. After a logout the stored credentials are discarded
    /// so the new connection starts a pairing.
    pub async fn force_reconnect(&self) -> Result<ConnectionStatus, SessionError> {
        let _setup = self
            .lock_setup(Instant::now() + self.config.connect_timeout)
            .await?;
        if self.shutdown.is_cancelled() {
            return Err(SessionError::ShutDown);
        }

        let was_logged_out = self.snapshot().logged_out;
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        self.apply(Transition::Reset { generation });

        let old = self.link.lock().await.take();
        if let Some(old) = old {
            info!(generation = old.generation, "tearing down WhatsApp connection");
            old.connection.end().await;
        }

        if was_logged_out {
            self.credentials.clear().await?;
            info!("discarded logged-out credentials, a new pairing is required");
        }

        self.open_connection(Instant::now() + self.config.connect_timeout)
            .await?;
        Ok(self.status())
    }

    /// Terminal teardown. Every later call fails with [`SessionError::ShutDown`].
    pub async fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.apply(Transition::Shutdown);

        let old = self.link.lock().await.take();
        if let Some(old) = old {
            old.connection.end().await;
        }
        info!("WhatsApp session shut down");
    }
}

async fn run_event_pump(
    manager: Weak<SessionManager>,
    generation: u64,
    mut events: mpsc::Receiver<ProtocolEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(manager) = manager.upgrade() else {
            break;
        };
        match event {
            Some(event) => manager.handle_event(generation, event).await,
            None => {
                // Stream ended without a close event.
                manager
                    .on_close(generation, DisconnectReason::ConnectionLost)
                    .await;
                break;
            }
        }
    }
    debug!(generation, "event pump stopped");
}

#[async_trait]
impl PluginAdapter for SessionManager {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, NotigateError> {
        let snapshot = self.snapshot();
        Ok(if snapshot.is_connected() {
            HealthStatus::Healthy
        } else if snapshot.shut_down {
            HealthStatus::Unhealthy("session shut down".into())
        } else if snapshot.logged_out {
            HealthStatus::Unhealthy("logged out, force a reconnect to pair again".into())
        } else if snapshot.is_reconnecting {
            HealthStatus::Degraded(format!(
                "reconnecting (attempt {}/{})",
                snapshot.reconnect_attempts, snapshot.max_reconnect_attempts
            ))
        } else if snapshot.pairing_token.is_some() {
            HealthStatus::Degraded("awaiting QR scan".into())
        } else if snapshot.reconnect_attempts >= snapshot.max_reconnect_attempts
            && snapshot.reconnect_attempts > 0
        {
            HealthStatus::Unhealthy("reconnect attempts exhausted".into())
        } else {
            // Idle sessions connect on the next command.
            HealthStatus::Degraded(format!("session {}", snapshot.state))
        })
    }

    async fn shutdown(&self) -> Result<(), NotigateError> {
        SessionManager::shutdown(self).await;
        Ok(())
    }
}
