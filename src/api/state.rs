use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::autofill::{FieldResult, FillReport, PageSession, ProfileRegistry};
use crate::automation::{AutomationBackend, HttpAutomationClient, PollOutcome, TaskStatus};
use crate::config::Config;
use crate::error::AppError;
use crate::messaging::MessageContext;
use crate::payload::Mailbox;

/// WebSocket event types broadcast to clients
#[derive(Debug, Clone)]
pub enum WsEvent {
    FillProgress {
        page_id: String,
        result: FieldResult,
    },
    FillComplete {
        page_id: String,
        report: FillReport,
    },
    AutomationStatus {
        task_id: String,
        status: TaskStatus,
    },
    AutomationFinished {
        task_id: String,
        outcome: PollOutcome,
    },
    Error {
        page_id: String,
        error: String,
    },
}

impl WsEvent {
    /// Page the event concerns; automation events belong to no page
    pub fn page_id(&self) -> Option<&str> {
        match self {
            WsEvent::FillProgress { page_id, .. }
            | WsEvent::FillComplete { page_id, .. }
            | WsEvent::Error { page_id, .. } => Some(page_id),
            WsEvent::AutomationStatus { .. } | WsEvent::AutomationFinished { .. } => None,
        }
    }
}

/// Connected WebSocket client info
#[derive(Debug)]
pub struct ConnectedClient {
    pub connected_at: Instant,
    /// Page whose events the client asked for; all pages when unset
    pub page_filter: Option<String>,
}

/// Shared application state
pub struct AppState {
    pub config: Config,

    pub profiles: ProfileRegistry,

    /// Payloads waiting for their receiving page
    pub mailbox: Mailbox,

    /// Registered pages: page_id -> page
    pub pages: DashMap<String, Arc<Mutex<PageSession>>>,

    /// Automation tasks currently being polled: task_id -> started
    pub tracked_tasks: DashMap<String, Instant>,

    pub automation: Option<Arc<dyn AutomationBackend>>,

    /// Connected WebSocket clients: client_id -> client info
    pub connected_clients: DashMap<String, ConnectedClient>,

    /// Total connection count (for metrics)
    connection_count: AtomicUsize,

    /// Broadcast channel for WebSocket events
    pub ws_broadcast: broadcast::Sender<WsEvent>,
}

impl AppState {
    pub fn new(config: Config, profiles: ProfileRegistry) -> Self {
        let (tx, _) = broadcast::channel(1024);

        let automation = config.automation_base_url.as_deref().map(|base| {
            tracing::info!("Automation backend at {}", base);
            Arc::new(HttpAutomationClient::new(base)) as Arc<dyn AutomationBackend>
        });

        Self {
            config,
            profiles,
            mailbox: Mailbox::new(),
            pages: DashMap::new(),
            tracked_tasks: DashMap::new(),
            automation,
            connected_clients: DashMap::new(),
            connection_count: AtomicUsize::new(0),
            ws_broadcast: tx,
        }
    }

    /// Replace the automation backend (used by tests and embedders)
    pub fn with_automation(mut self, backend: Arc<dyn AutomationBackend>) -> Self {
        self.automation = Some(backend);
        self
    }

    pub fn broadcast(&self, event: WsEvent) {
        // Ignore send errors (no receivers)
        let _ = self.ws_broadcast.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.ws_broadcast.subscribe()
    }

    pub fn page(&self, page_id: &str) -> Result<Arc<Mutex<PageSession>>, AppError> {
        self.pages
            .get(page_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AppError::PageNotFound(page_id.to_string()))
    }

    /// Message context whose per-field progress is broadcast for `page_id`.
    /// The returned task ends once the context and every sender cloned from
    /// it are dropped, after the last progress event went out.
    pub fn message_context<'a>(
        self: &'a Arc<Self>,
        page_id: &str,
    ) -> (MessageContext<'a>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<FieldResult>();
        let state = Arc::clone(self);
        let page_id = page_id.to_string();
        let forwarder = tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                state.broadcast(WsEvent::FillProgress {
                    page_id: page_id.clone(),
                    result,
                });
            }
        });

        let ctx = MessageContext {
            profiles: &self.profiles,
            mailbox: &self.mailbox,
            readiness: self.config.readiness(),
            typing_tick: self.config.typing_tick,
            user_data_key: self.config.user_data_key.as_deref(),
            progress: Some(tx),
        };
        (ctx, forwarder)
    }

    /// Register a WebSocket client connection
    pub fn client_connected(&self, client_id: &str) {
        self.connected_clients.insert(
            client_id.to_string(),
            ConnectedClient {
                connected_at: Instant::now(),
                page_filter: None,
            },
        );
        let count = self.connection_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            "Client {} connected (total: {}, active: {})",
            client_id,
            count,
            self.connected_clients.len()
        );
    }

    /// Restrict a client's page events to `page_id` (or lift the filter)
    pub fn set_page_filter(&self, client_id: &str, page_id: Option<String>) {
        if let Some(mut client) = self.connected_clients.get_mut(client_id) {
            tracing::debug!("Client {} page filter: {:?}", client_id, page_id);
            client.page_filter = page_id;
        }
    }

    /// Whether `event` should go out to `client_id`
    pub fn wants_event(&self, client_id: &str, event: &WsEvent) -> bool {
        let Some(page_id) = event.page_id() else {
            return true;
        };
        self.connected_clients
            .get(client_id)
            .map(|client| client.page_filter.as_deref().map_or(true, |f| f == page_id))
            .unwrap_or(false)
    }

    /// Unregister a WebSocket client connection
    pub fn client_disconnected(&self, client_id: &str) {
        if let Some((_, client)) = self.connected_clients.remove(client_id) {
            let duration = client.connected_at.elapsed();
            tracing::debug!(
                "Client {} disconnected after {:?} (active: {})",
                client_id,
                duration,
                self.connected_clients.len()
            );
        }
    }

    /// Get the number of active WebSocket connections
    pub fn active_connection_count(&self) -> usize {
        self.connected_clients.len()
    }
}
