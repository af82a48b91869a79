use std::{collections::HashMap, sync::Arc};

use {tokio::sync::Mutex, tracing::info};

use crate::{session::Session, transport::SessionTransport};

/// Process-wide map of tenant id to session. At most one [`Session`] exists
/// per tenant at any time.
pub struct SessionRegistry {
    transport: Arc<dyn SessionTransport>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            transport,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Return the tenant's session, creating it on first use. Concurrent
    /// callers for the same tenant observe the same instance; a freshly
    /// created session is uninitialized until `initialize` is called on it.
    pub async fn get_or_create(&self, tenant_id: &str) -> Arc<Session> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(tenant_id) {
            return Arc::clone(session);
        }

        info!(tenant_id, "creating whatsapp session");
        let session = Arc::new(Session::new(tenant_id, Arc::clone(&self.transport)));
        sessions.insert(tenant_id.to_string(), Arc::clone(&session));
        session
    }

    pub async fn get(&self, tenant_id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(tenant_id).cloned()
    }

    /// Remove the tenant's session and tear it down without a remote logout.
    pub async fn remove(&self, tenant_id: &str) {
        let session = self.sessions.lock().await.remove(tenant_id);
        if let Some(session) = session {
            session.destroy().await;
            info!(tenant_id, "whatsapp session removed");
        }
    }

    /// Tear down every session. Used on shutdown.
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self.sessions.lock().await.drain().collect();
        for (tenant_id, session) in sessions {
            session.destroy().await;
            info!(tenant_id, "whatsapp session shut down");
        }
    }
}
