//! One tenant's long-lived WhatsApp session.

use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};

use {
    tokio::{sync::RwLock, task::JoinHandle},
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    normalize::normalize_jid,
    state::{
        MAX_RECONNECT_ATTEMPTS, QrChallenge, SessionSnapshot, SessionState, now_unix,
        reconnect_delay,
    },
    transport::{EventReceiver, SessionTransport, TransportEvent, TransportHandle},
};

/// A per-tenant WhatsApp session driving the connection state machine.
///
/// Cheap to clone the handle type: obtained from the
/// [`SessionRegistry`](crate::SessionRegistry) as `Arc<Session>`.
pub struct Session {
    shared: Arc<Shared>,
}

struct Shared {
    tenant_id: String,
    transport: Arc<dyn SessionTransport>,
    snapshot: StdRwLock<SessionSnapshot>,
    handle: RwLock<Option<Arc<dyn TransportHandle>>>,
    tasks: StdMutex<Tasks>,
}

#[derive(Default)]
struct Tasks {
    event_loop: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    /// Set by teardown, cleared by `initialize`. Checked under this lock so
    /// a reconnect timer can never be armed after teardown ran.
    destroyed: bool,
}

impl Session {
    pub(crate) fn new(tenant_id: impl Into<String>, transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            shared: Arc::new(Shared {
                tenant_id: tenant_id.into(),
                transport,
                snapshot: StdRwLock::new(SessionSnapshot::default()),
                handle: RwLock::new(None),
                tasks: StdMutex::new(Tasks::default()),
            }),
        }
    }

    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.shared.tenant_id
    }

    /// Start (or restart) the connection. Resets the reconnect budget and
    /// cancels any pending reconnect timer.
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut tasks = self.shared.tasks.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(timer) = tasks.reconnect.take() {
                timer.abort();
            }
            tasks.destroyed = false;
        }
        {
            let mut snap = self
                .shared
                .snapshot
                .write()
                .unwrap_or_else(|e| e.into_inner());
            snap.state = SessionState::Connecting;
            snap.reconnect_attempts = 0;
            snap.qr = None;
            snap.last_error = None;
        }

        info!(tenant_id = %self.shared.tenant_id, "initializing whatsapp session");

        connect(&self.shared).await.inspect_err(|_| {
            let mut snap = self
                .shared
                .snapshot
                .write()
                .unwrap_or_else(|e| e.into_inner());
            snap.state = SessionState::Disconnected;
        })
    }

    #[must_use]
    pub fn status(&self) -> SessionState {
        self.shared
            .snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .state
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared
            .snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Current QR challenge, if one is pending and still scannable.
    #[must_use]
    pub fn qr_code(&self) -> Option<QrChallenge> {
        let snap = self
            .shared
            .snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner());
        snap.qr.clone().filter(|qr| !qr.is_expired(now_unix()))
    }

    /// Send a text message. Valid only in state `ready`; the recipient must
    /// be a registered account on the channel.
    pub async fn send_text(&self, recipient: &str, text: &str) -> Result<String> {
        let (handle, jid) = self.ready_handle(recipient).await?;
        handle.send_text(&jid, text).await
    }

    /// Send media by URL with a caption. Same preconditions as `send_text`.
    pub async fn send_media(&self, recipient: &str, url: &str, caption: &str) -> Result<String> {
        let (handle, jid) = self.ready_handle(recipient).await?;
        handle.send_media(&jid, url, caption).await
    }

    async fn ready_handle(&self, recipient: &str) -> Result<(Arc<dyn TransportHandle>, String)> {
        let state = self.status();
        if state != SessionState::Ready {
            return Err(Error::SessionNotReady {
                tenant_id: self.shared.tenant_id.clone(),
                state,
            });
        }

        let jid = normalize_jid(recipient)?;

        let handle =
            self.shared
                .handle
                .read()
                .await
                .clone()
                .ok_or_else(|| Error::SessionNotReady {
                    tenant_id: self.shared.tenant_id.clone(),
                    state,
                })?;

        if !handle.is_registered(&jid).await? {
            return Err(Error::RecipientNotOnChannel { recipient: jid });
        }

        Ok((handle, jid))
    }

    /// Log out the remote client and tear the session down.
    pub async fn logout(&self) -> Result<()> {
        self.teardown(true).await
    }

    /// Tear down without asking the remote side to drop its auth state.
    pub(crate) async fn destroy(&self) {
        let _ = self.teardown(false).await;
    }

    async fn teardown(&self, remote_logout: bool) -> Result<()> {
        {
            let mut tasks = self.shared.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.destroyed = true;
            if let Some(timer) = tasks.reconnect.take() {
                timer.abort();
            }
            if let Some(task) = tasks.event_loop.take() {
                task.abort();
            }
        }

        let handle = self.shared.handle.write().await.take();
        if remote_logout && let Some(handle) = handle {
            if let Err(e) = handle.logout().await {
                warn!(
                    tenant_id = %self.shared.tenant_id,
                    error = %e,
                    "remote logout failed during teardown"
                );
            }
        }

        {
            let mut snap = self
                .shared
                .snapshot
                .write()
                .unwrap_or_else(|e| e.into_inner());
            *snap = SessionSnapshot::default();
        }

        info!(tenant_id = %self.shared.tenant_id, "whatsapp session torn down");
        Ok(())
    }
}

/// Open a connection and start consuming its event stream. On success the
/// state machine sits in `connecting` until the transport reports QR or
/// ready.
async fn connect(shared: &Arc<Shared>) -> Result<()> {
    match shared.transport.connect(&shared.tenant_id).await {
        Ok((events, handle)) => {
            *shared.handle.write().await = Some(handle);
            {
                let mut snap = shared.snapshot.write().unwrap_or_else(|e| e.into_inner());
                snap.state = SessionState::Connecting;
            }
            let task = tokio::spawn(run_event_loop(Arc::clone(shared), events));
            let mut tasks = shared.tasks.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(old) = tasks.event_loop.replace(task) {
                old.abort();
            }
            Ok(())
        },
        Err(e) => {
            let mut snap = shared.snapshot.write().unwrap_or_else(|e| e.into_inner());
            snap.last_error = Some(e.to_string());
            Err(e)
        },
    }
}

async fn run_event_loop(shared: Arc<Shared>, mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Qr { payload } => {
                debug!(tenant_id = %shared.tenant_id, "whatsapp qr challenge issued");
                let mut snap = shared.snapshot.write().unwrap_or_else(|e| e.into_inner());
                snap.state = SessionState::QrPending;
                snap.qr = Some(QrChallenge::issue(payload, now_unix()));
            },
            TransportEvent::Authenticated => {
                info!(tenant_id = %shared.tenant_id, "whatsapp session authenticated");
                let mut snap = shared.snapshot.write().unwrap_or_else(|e| e.into_inner());
                snap.state = SessionState::Authenticated;
                snap.qr = None;
            },
            TransportEvent::Ready { phone_number } => {
                info!(
                    tenant_id = %shared.tenant_id,
                    ?phone_number,
                    "whatsapp session ready"
                );
                let mut snap = shared.snapshot.write().unwrap_or_else(|e| e.into_inner());
                snap.state = SessionState::Ready;
                snap.phone_number = phone_number;
                snap.reconnect_attempts = 0;
            },
            TransportEvent::Disconnected { reason } => {
                warn!(tenant_id = %shared.tenant_id, reason, "whatsapp session disconnected");
                handle_disconnect(&shared, reason).await;
                return;
            },
            TransportEvent::LoggedOut => {
                info!(tenant_id = %shared.tenant_id, "whatsapp session logged out remotely");
                *shared.handle.write().await = None;
                let mut snap = shared.snapshot.write().unwrap_or_else(|e| e.into_inner());
                *snap = SessionSnapshot::default();
                return;
            },
        }
    }

    // The transport dropped the stream without an explicit disconnect event.
    handle_disconnect(&shared, "event stream closed".to_string()).await;
}

async fn handle_disconnect(shared: &Arc<Shared>, reason: String) {
    // The event loop may still be draining when teardown aborts it; once
    // teardown ran, the disconnect is moot.
    if is_destroyed(shared) {
        return;
    }

    *shared.handle.write().await = None;
    {
        let mut snap = shared.snapshot.write().unwrap_or_else(|e| e.into_inner());
        snap.state = SessionState::Disconnected;
        snap.last_error = Some(reason);
        snap.qr = None;
    }
    schedule_reconnect(shared);
}

/// Arrange the next reconnect attempt, or transition to `failed` once the
/// budget is spent.
fn schedule_reconnect(shared: &Arc<Shared>) {
    // Decide, spawn, and register under the tasks lock, and re-check inside
    // the timer body, so teardown can never lose the race against timer
    // registration.
    let mut tasks = shared.tasks.lock().unwrap_or_else(|e| e.into_inner());
    if tasks.destroyed {
        return;
    }

    let attempt = {
        let mut snap = shared.snapshot.write().unwrap_or_else(|e| e.into_inner());
        if snap.reconnect_attempts >= MAX_RECONNECT_ATTEMPTS {
            snap.state = SessionState::Failed;
            snap.last_error = Some(format!(
                "gave up after {MAX_RECONNECT_ATTEMPTS} reconnect attempts"
            ));
            None
        } else {
            snap.state = SessionState::Reconnecting;
            let attempt = snap.reconnect_attempts;
            snap.reconnect_attempts += 1;
            Some(attempt)
        }
    };

    let Some(attempt) = attempt else {
        warn!(
            tenant_id = %shared.tenant_id,
            max_attempts = MAX_RECONNECT_ATTEMPTS,
            "whatsapp session failed: reconnect attempts exhausted"
        );
        return;
    };

    let delay = reconnect_delay(attempt);
    info!(
        tenant_id = %shared.tenant_id,
        attempt = attempt + 1,
        delay_ms = delay.as_millis() as u64,
        "scheduling whatsapp reconnect"
    );

    let task_shared = Arc::clone(shared);
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if is_destroyed(&task_shared) {
            return;
        }
        if let Err(e) = connect(&task_shared).await {
            warn!(
                tenant_id = %task_shared.tenant_id,
                error = %e,
                "whatsapp reconnect attempt failed"
            );
            schedule_reconnect(&task_shared);
        }
    });
    tasks.reconnect = Some(task);
}

fn is_destroyed(shared: &Arc<Shared>) -> bool {
    shared
        .tasks
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .destroyed
}
