//! WebSocket client for the sidecar process that owns the actual WhatsApp
//! Web client. The sidecar speaks newline-free JSON frames: commands go out
//! with a `request_id`, acks and lifecycle events come back.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    futures::{SinkExt, StreamExt},
    serde::{Deserialize, Serialize},
    tokio::sync::{mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, warn},
    uuid::Uuid,
};

use crate::{
    Error, Result,
    transport::{EventReceiver, SessionTransport, TransportEvent, TransportHandle},
};

pub const DEFAULT_BRIDGE_PORT: u16 = 8466;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const OUTBOUND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Login {
        tenant_id: &'a str,
    },
    SendText {
        request_id: &'a str,
        jid: &'a str,
        text: &'a str,
    },
    SendMedia {
        request_id: &'a str,
        jid: &'a str,
        url: &'a str,
        caption: &'a str,
    },
    CheckRegistered {
        request_id: &'a str,
        jid: &'a str,
    },
    Logout,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum BridgeFrame {
    Qr {
        payload: String,
    },
    Authenticated,
    Ready {
        #[serde(default)]
        phone_number: Option<String>,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    LoggedOut,
    Ack {
        request_id: String,
        success: bool,
        #[serde(default)]
        message_id: Option<String>,
        #[serde(default)]
        registered: Option<bool>,
        #[serde(default)]
        error: Option<String>,
    },
}

#[derive(Debug)]
struct Ack {
    success: bool,
    message_id: Option<String>,
    registered: Option<bool>,
    error: Option<String>,
}

type Pending = Arc<StdMutex<HashMap<String, oneshot::Sender<Ack>>>>;

/// [`SessionTransport`] backed by the WebSocket sidecar.
pub struct BridgeTransport {
    host: String,
    port: u16,
}

impl BridgeTransport {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for BridgeTransport {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_BRIDGE_PORT)
    }
}

#[async_trait]
impl SessionTransport for BridgeTransport {
    async fn connect(&self, tenant_id: &str) -> Result<(EventReceiver, Arc<dyn TransportHandle>)> {
        let url = format!("ws://{}:{}/session", self.host, self.port);
        debug!(tenant_id, url, "connecting to whatsapp bridge");

        let (ws, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
            .await
            .map_err(|_| Error::message("bridge connect timed out"))?
            .map_err(|e| Error::transport("bridge connect", e))?;

        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(EVENT_BUFFER);
        let pending: Pending = Arc::new(StdMutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if sink.send(Message::text(text)).await.is_err() {
                    break;
                }
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_tenant = tenant_id.to_string();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(tenant_id = %reader_tenant, error = %e, "bridge socket error");
                        break;
                    },
                };

                let parsed = match serde_json::from_str::<BridgeFrame>(text.as_str()) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!(tenant_id = %reader_tenant, error = %e, "unparseable bridge frame");
                        continue;
                    },
                };

                let event = match parsed {
                    BridgeFrame::Ack {
                        request_id,
                        success,
                        message_id,
                        registered,
                        error,
                    } => {
                        let waiter = reader_pending
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .remove(&request_id);
                        if let Some(waiter) = waiter {
                            let _ = waiter.send(Ack {
                                success,
                                message_id,
                                registered,
                                error,
                            });
                        }
                        continue;
                    },
                    BridgeFrame::Qr { payload } => TransportEvent::Qr { payload },
                    BridgeFrame::Authenticated => TransportEvent::Authenticated,
                    BridgeFrame::Ready { phone_number } => TransportEvent::Ready { phone_number },
                    BridgeFrame::Disconnected { reason } => TransportEvent::Disconnected { reason },
                    BridgeFrame::LoggedOut => TransportEvent::LoggedOut,
                };

                if event_tx.send(event).await.is_err() {
                    return;
                }
            }

            let _ = event_tx
                .send(TransportEvent::Disconnected {
                    reason: "bridge connection closed".to_string(),
                })
                .await;
        });

        let login = serde_json::to_string(&BridgeCommand::Login { tenant_id })?;
        out_tx
            .send(login)
            .await
            .map_err(|_| Error::message("bridge connection closed before login"))?;

        let handle = BridgeHandle {
            out: out_tx,
            pending,
        };
        Ok((event_rx, Arc::new(handle)))
    }
}

struct BridgeHandle {
    out: mpsc::Sender<String>,
    pending: Pending,
}

impl BridgeHandle {
    async fn roundtrip(&self, request_id: String, payload: String) -> Result<Ack> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request_id.clone(), tx);

        if self.out.send(payload).await.is_err() {
            self.forget(&request_id);
            return Err(Error::message("bridge connection closed"));
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(_)) => Err(Error::message("bridge dropped the request")),
            Err(_) => {
                self.forget(&request_id);
                Err(Error::message("bridge request timed out"))
            },
        }
    }

    fn forget(&self, request_id: &str) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(request_id);
    }
}

fn ack_failure(ack: Ack, context: &str) -> Error {
    Error::message(format!(
        "{context}: {}",
        ack.error.unwrap_or_else(|| "unknown bridge error".to_string())
    ))
}

#[async_trait]
impl TransportHandle for BridgeHandle {
    async fn send_text(&self, jid: &str, text: &str) -> Result<String> {
        let request_id = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(&BridgeCommand::SendText {
            request_id: &request_id,
            jid,
            text,
        })?;
        let ack = self.roundtrip(request_id, payload).await?;
        if !ack.success {
            return Err(ack_failure(ack, "send_text rejected"));
        }
        ack.message_id
            .ok_or_else(|| Error::message("bridge ack missing message id"))
    }

    async fn send_media(&self, jid: &str, url: &str, caption: &str) -> Result<String> {
        let request_id = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(&BridgeCommand::SendMedia {
            request_id: &request_id,
            jid,
            url,
            caption,
        })?;
        let ack = self.roundtrip(request_id, payload).await?;
        if !ack.success {
            return Err(ack_failure(ack, "send_media rejected"));
        }
        ack.message_id
            .ok_or_else(|| Error::message("bridge ack missing message id"))
    }

    async fn is_registered(&self, jid: &str) -> Result<bool> {
        let request_id = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(&BridgeCommand::CheckRegistered {
            request_id: &request_id,
            jid,
        })?;
        let ack = self.roundtrip(request_id, payload).await?;
        if !ack.success {
            return Err(ack_failure(ack, "registration check rejected"));
        }
        Ok(ack.registered.unwrap_or(false))
    }

    async fn logout(&self) -> Result<()> {
        let payload = serde_json::to_string(&BridgeCommand::Logout)?;
        self.out
            .send(payload)
            .await
            .map_err(|_| Error::message("bridge connection closed"))
    }
}
