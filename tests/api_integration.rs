//! HTTP surface tests against a sidecar bound to an ephemeral port.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use portal_autofill::api::{routes::create_router, state::AppState};
use portal_autofill::autofill::ProfileRegistry;
use portal_autofill::automation::{AutomationBackend, StartResponse, TaskState, TaskStatus};
use portal_autofill::config::Config;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TORRENT_URL: &str = "https://connect.torrentpower.com/tplcp/application/namechangerequest";

struct TestServer {
    base: String,
    client: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(AppState::new(
            Config::default(),
            ProfileRegistry::builtin().unwrap(),
        ))
        .await
    }

    async fn start_with(state: AppState) -> Self {
        let state = Arc::new(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Open `/ws/:client_id` and wait until the server has registered it
    async fn socket(&self, client_id: &str) -> Socket {
        let url = format!("{}/ws/{}", self.base.replacen("http", "ws", 1), client_id);
        let (mut socket, _) = connect_async(url).await.unwrap();
        socket
            .send(Message::Text(json!({ "type": "ping" }).to_string()))
            .await
            .unwrap();
        let pong = next_json(&mut socket).await;
        assert_eq!(pong["type"], "pong");
        socket
    }

    async fn register_torrent_page(&self) -> String {
        let html = std::fs::read_to_string(format!(
            "{}/tests/fixtures/torrent_power_form.html",
            env!("CARGO_MANIFEST_DIR")
        ))
        .unwrap();
        let page: Value = self
            .client
            .post(self.url("/pages"))
            .json(&json!({ "url": TORRENT_URL, "html": html }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(page["profile"], "Torrent Power");
        page["page_id"].as_str().unwrap().to_string()
    }
}

/// Next JSON text frame, failing the test after two seconds of silence
async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("no WebSocket message within 2s")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Backend whose tasks report `replies` in order, then stay running
struct ScriptedBackend {
    replies: std::sync::Mutex<Vec<TaskState>>,
}

impl ScriptedBackend {
    fn new(mut replies: Vec<TaskState>) -> Arc<Self> {
        replies.reverse();
        Arc::new(Self {
            replies: std::sync::Mutex::new(replies),
        })
    }
}

#[async_trait]
impl AutomationBackend for ScriptedBackend {
    async fn start(
        &self,
        _kind: &str,
        _fields: &BTreeMap<String, String>,
    ) -> anyhow::Result<StartResponse> {
        Ok(StartResponse {
            success: true,
            message: "queued".to_string(),
            details: None,
            task_id: Some("task-1".to_string()),
        })
    }

    async fn status(&self, _task_id: &str) -> anyhow::Result<TaskStatus> {
        let state = self.replies.lock().unwrap().pop().unwrap_or(TaskState::Running);
        Ok(TaskStatus {
            status: state,
            result: None,
        })
    }
}

fn automation_state(backend: Arc<ScriptedBackend>) -> AppState {
    let config = Config {
        automation_poll_interval: Duration::from_millis(20),
        automation_timeout: Duration::from_millis(500),
        ..Config::default()
    };
    AppState::new(config, ProfileRegistry::builtin().unwrap()).with_automation(backend)
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;
    let body: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["profiles"], 6);
}

#[tokio::test]
async fn test_mailbox_then_extension_fill() {
    let server = TestServer::start().await;
    let page_id = server.register_torrent_page().await;

    let put = server
        .client
        .put(server.url("/mailbox/torrent_autofill_data"))
        .json(&json!({
            "city": "Ahmedabad",
            "serviceNumber": "3012345678",
            "tNo": "T-4471",
            "mobile": "9876543210",
            "email": "citizen@example.com"
        }))
        .send()
        .await
        .unwrap();
    assert!(put.status().is_success());
    let put: Value = put.json().await.unwrap();
    assert_eq!(put["ttl_secs"], 600);

    let message = json!({ "action": "fillForm" });
    let reply: Value = server
        .client
        .post(server.url(&format!("/pages/{}/message", page_id)))
        .json(&message)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply, json!({ "success": true, "filledCount": 5 }));

    // The mailbox entry was consumed by the first fill
    let again: Value = server
        .client
        .post(server.url(&format!("/pages/{}/message", page_id)))
        .json(&message)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["success"], false);
    assert_eq!(
        again["message"],
        "No autofill data found. Please submit your application from the portal first"
    );

    let page: Value = server
        .client
        .get(server.url(&format!("/pages/{}", page_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["last_report"]["filled"], 5);
    assert_eq!(page["last_report"]["source"], "mailbox");
}

#[tokio::test]
async fn test_frame_message_locks_submit() {
    let server = TestServer::start().await;
    let page_id = server.register_torrent_page().await;

    let body: Value = server
        .client
        .post(server.url(&format!("/pages/{}/frame-message", page_id)))
        .json(&json!({
            "type": "FILL_FORM",
            "data": { "service_number": "3012345678", "mobile": "9876543210" }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["handled"], true);
    assert_eq!(body["report"]["filled"], 2);
    assert_eq!(body["report"]["locked_buttons"], 1);
    assert_eq!(body["report"]["source"], "message");
}

#[tokio::test]
async fn test_take_is_at_most_once() {
    let server = TestServer::start().await;
    let put = server
        .client
        .put(server.url("/mailbox/amc_autofill_data?ttl_secs=60"))
        .json(&json!({ "mobile": "9876543210" }))
        .send()
        .await
        .unwrap();
    assert!(put.status().is_success());

    let take = server.url("/mailbox/amc_autofill_data/take");
    let first = server.client.post(&take).send().await.unwrap();
    assert_eq!(first.status(), 200);
    let payload: Value = first.json().await.unwrap();
    assert_eq!(payload["mobile"], "9876543210");

    let second = server.client.post(&take).send().await.unwrap();
    assert_eq!(second.status(), 404);
}

#[tokio::test]
async fn test_error_bodies() {
    let server = TestServer::start().await;

    let missing = server
        .client
        .get(server.url("/pages/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "Not Found");

    let empty = server
        .client
        .put(server.url("/mailbox/torrent_autofill_data"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 400);

    let automation = server
        .client
        .post(server.url("/automation/track"))
        .json(&json!({ "task_id": "t-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(automation.status(), 503);
}

#[tokio::test]
async fn test_oversized_ttl_rejected() {
    let server = TestServer::start().await;
    let response = server
        .client
        .put(server.url("/mailbox/torrent_autofill_data?ttl_secs=9223372036854775"))
        .json(&json!({ "mobile": "9876543210" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let week = server
        .client
        .put(server.url("/mailbox/user_data?ttl_secs=604800"))
        .json(&json!({ "mobile": "9876543210" }))
        .send()
        .await
        .unwrap();
    assert!(week.status().is_success());
}

#[tokio::test]
async fn test_progress_precedes_completion_on_socket() {
    let server = TestServer::start().await;
    let page_id = server.register_torrent_page().await;
    let mut socket = server.socket("watcher").await;

    server
        .client
        .put(server.url("/mailbox/torrent_autofill_data"))
        .json(&json!({
            "city": "Ahmedabad",
            "serviceNumber": "3012345678",
            "tNo": "T-4471",
            "mobile": "9876543210",
            "email": "citizen@example.com"
        }))
        .send()
        .await
        .unwrap();
    let reply: Value = server
        .client
        .post(server.url(&format!("/pages/{}/message", page_id)))
        .json(&json!({ "action": "fillForm" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["filledCount"], 5);

    let mut progress = 0;
    let report = loop {
        let event = next_json(&mut socket).await;
        assert_eq!(event["page_id"], page_id.as_str());
        match event["type"].as_str().unwrap() {
            "fill_progress" => progress += 1,
            "fill_complete" => break event["report"].clone(),
            other => panic!("unexpected event {}", other),
        }
    };
    assert_eq!(report["filled"], 5);
    assert_eq!(progress, report["results"].as_array().unwrap().len());
}

#[tokio::test]
async fn test_subscribed_socket_skips_other_pages() {
    let server = TestServer::start().await;
    let watched = server.register_torrent_page().await;
    let other = server.register_torrent_page().await;
    let mut socket = server.socket("narrow").await;

    socket
        .send(Message::Text(
            json!({ "type": "subscribe", "page_id": watched }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(next_json(&mut socket).await["type"], "subscribed");

    for page_id in [&other, &watched] {
        server
            .client
            .post(server.url(&format!("/pages/{}/message", page_id)))
            .json(&json!({ "action": "fillForm" }))
            .send()
            .await
            .unwrap();
    }

    // Only the watched page's "no data" error arrives
    let event = next_json(&mut socket).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["page_id"], watched.as_str());
}

#[tokio::test]
async fn test_automation_status_streamed() {
    let backend = ScriptedBackend::new(vec![TaskState::Queued, TaskState::Completed]);
    let server = TestServer::start_with(automation_state(backend)).await;
    let mut socket = server.socket("ops").await;

    let tracked: Value = server
        .client
        .post(server.url("/automation/track"))
        .json(&json!({ "kind": "torrent-power", "fields": { "mobile": "9876543210" } }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tracked, json!({ "task_id": "task-1", "status": "tracking" }));

    let first = next_json(&mut socket).await;
    assert_eq!(first["type"], "automation_status");
    assert_eq!(first["status"]["status"], "queued");
    let second = next_json(&mut socket).await;
    assert_eq!(second["status"]["status"], "completed");
    let finished = next_json(&mut socket).await;
    assert_eq!(finished["type"], "automation_finished");
    assert_eq!(finished["task_id"], "task-1");
    assert_eq!(finished["result"]["outcome"], "completed");
}

#[tokio::test]
async fn test_concurrent_track_spawns_one_poller() {
    let backend = ScriptedBackend::new(vec![]);
    let server = TestServer::start_with(automation_state(backend)).await;
    let track = || {
        server
            .client
            .post(server.url("/automation/track"))
            .json(&json!({ "task_id": "shared" }))
            .send()
    };

    let (a, b) = tokio::join!(track(), track());
    let a: Value = a.unwrap().json().await.unwrap();
    let b: Value = b.unwrap().json().await.unwrap();

    let mut statuses = vec![
        a["status"].as_str().unwrap().to_string(),
        b["status"].as_str().unwrap().to_string(),
    ];
    statuses.sort();
    assert_eq!(statuses, vec!["already_tracking", "tracking"]);
}
