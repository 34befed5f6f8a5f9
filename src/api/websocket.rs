use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc};

use super::state::{AppState, WsEvent};

/// Client commands: `ping`, `subscribe` (with `page_id`), `unsubscribe`
#[derive(Debug, Deserialize)]
struct WsIncoming {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    page_id: Option<String>,
}

#[derive(Debug, Serialize, Default)]
struct WsOutgoing {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl WsOutgoing {
    fn reply(msg_type: &str, page_id: Option<String>) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            page_id,
            ..Default::default()
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

impl From<WsEvent> for WsOutgoing {
    fn from(event: WsEvent) -> Self {
        match event {
            WsEvent::FillProgress { page_id, result } => WsOutgoing {
                result: to_value(&result),
                ..WsOutgoing::reply("fill_progress", Some(page_id))
            },
            WsEvent::FillComplete { page_id, report } => WsOutgoing {
                report: to_value(&report),
                ..WsOutgoing::reply("fill_complete", Some(page_id))
            },
            WsEvent::AutomationStatus { task_id, status } => WsOutgoing {
                task_id: Some(task_id),
                status: to_value(&status),
                ..WsOutgoing::reply("automation_status", None)
            },
            WsEvent::AutomationFinished { task_id, outcome } => WsOutgoing {
                task_id: Some(task_id),
                result: to_value(&outcome),
                ..WsOutgoing::reply("automation_finished", None)
            },
            WsEvent::Error { page_id, error } => WsOutgoing {
                error: Some(error),
                ..WsOutgoing::reply("error", Some(page_id))
            },
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request from client: {}", client_id);
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state))
}

async fn handle_socket(socket: WebSocket, client_id: String, state: Arc<AppState>) {
    tracing::info!("WebSocket connected: {}", client_id);
    state.client_connected(&client_id);

    let (mut sender, mut receiver) = socket.split();
    let mut events = state.subscribe();
    // Direct replies to this client only
    let (reply_tx, mut replies) = mpsc::unbounded_channel::<WsOutgoing>();

    let send_state = state.clone();
    let send_id = client_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                event = events.recv() => match event {
                    Ok(event) if send_state.wants_event(&send_id, &event) => WsOutgoing::from(event),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Client {} lagged, {} events dropped", send_id, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(reply) = replies.recv() => reply,
            };

            let Ok(json) = serde_json::to_string(&outgoing) else {
                continue;
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_id = client_id.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let Message::Text(text) = msg else {
                continue;
            };
            let Ok(incoming) = serde_json::from_str::<WsIncoming>(&text) else {
                tracing::debug!("Ignoring malformed message from {}", recv_id);
                continue;
            };
            let reply = match incoming.msg_type.as_str() {
                "ping" => WsOutgoing::reply("pong", None),
                "subscribe" => {
                    recv_state.set_page_filter(&recv_id, incoming.page_id.clone());
                    WsOutgoing::reply("subscribed", incoming.page_id)
                }
                "unsubscribe" => {
                    recv_state.set_page_filter(&recv_id, None);
                    WsOutgoing::reply("unsubscribed", None)
                }
                other => {
                    tracing::debug!("Unknown message type '{}' from {}", other, recv_id);
                    continue;
                }
            };
            if reply_tx.send(reply).is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.client_disconnected(&client_id);
    tracing::info!("WebSocket disconnected: {}", client_id);
}
