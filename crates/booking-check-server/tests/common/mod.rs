//! Fake Telegram Bot API for integration tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use booking_check_server::ServerConfig;

pub const TOKEN: &str = "123456:TEST-token";

/// One request received by the fake API.
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub bot: String,
    pub method: String,
    pub content_type: String,
    pub body: Bytes,
}

impl ApiCall {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Clone, Default)]
pub struct FakeBotApi {
    calls: Arc<Mutex<Vec<ApiCall>>>,
    pending: Arc<Mutex<VecDeque<Value>>>,
    blocked: Arc<Mutex<HashSet<i64>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    next_update: Arc<Mutex<i64>>,
}

impl FakeBotApi {
    /// Serve the fake API on an ephemeral local port.
    pub async fn spawn() -> (Self, SocketAddr) {
        let api = Self::default();
        let app = Router::new()
            .route("/:bot/:method", post(handle))
            .with_state(api.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (api, addr)
    }

    /// Queue a text message to be returned by the next `getUpdates`.
    pub fn push_message(&self, chat_id: i64, text: &str) {
        let mut next = self.next_update.lock();
        *next += 1;
        self.pending.lock().push_back(json!({
            "update_id": *next,
            "message": {
                "message_id": *next,
                "date": 0,
                "chat": {"id": chat_id, "type": "private"},
                "text": text
            }
        }));
    }

    /// Make `sendMessage` to `chat_id` fail as if the user blocked the bot.
    pub fn block(&self, chat_id: i64) {
        self.blocked.lock().insert(chat_id);
    }

    /// Make every call to `method` fail with a Bot API error.
    pub fn fail_method(&self, method: &str) {
        self.failing.lock().insert(method.to_string());
    }

    pub fn calls(&self, method: &str) -> Vec<ApiCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    /// Successfully delivered texts, in order.
    pub fn sent_texts(&self) -> Vec<(i64, String)> {
        let blocked = self.blocked.lock().clone();
        self.calls("sendMessage")
            .iter()
            .map(|call| call.json())
            .filter_map(|body| {
                let chat = body["chat_id"].as_i64()?;
                let text = body["text"].as_str()?.to_string();
                (!blocked.contains(&chat)).then_some((chat, text))
            })
            .collect()
    }
}

async fn handle(
    State(api): State<FakeBotApi>,
    Path((bot, method)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    api.calls.lock().push(ApiCall {
        bot,
        method: method.clone(),
        content_type,
        body: body.clone(),
    });

    if api.failing.lock().contains(&method) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: description is too long"
            })),
        );
    }

    match method.as_str() {
        "getMe" => ok(json!({"id": 1, "is_bot": true, "username": "booking_check_bot"})),
        "setMyDescription" | "setMyCommands" => ok(json!(true)),
        "getUpdates" => {
            let updates: Vec<Value> = api.pending.lock().drain(..).collect();
            if updates.is_empty() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            ok(Value::Array(updates))
        }
        "sendMessage" => {
            let request: Value = serde_json::from_slice(&body).unwrap_or_default();
            let chat_id = request["chat_id"].as_i64().unwrap_or_default();
            if api.blocked.lock().contains(&chat_id) {
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({
                        "ok": false,
                        "error_code": 403,
                        "description": "Forbidden: bot was blocked by the user"
                    })),
                );
            }
            ok(json!({"message_id": 1, "date": 0, "chat": {"id": chat_id, "type": "private"}}))
        }
        "sendPhoto" => ok(json!({"message_id": 2, "date": 0, "chat": {"id": 0, "type": "private"}})),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"ok": false, "error_code": 404, "description": "Not Found"})),
        ),
    }
}

fn ok(result: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({"ok": true, "result": result})))
}

/// Configuration pointing at the fake API, with a short poll timeout.
pub fn config(db_path: &std::path::Path, api: SocketAddr, owner: i64) -> ServerConfig {
    ServerConfig::new(db_path, TOKEN, owner)
        .with_listen_addr("127.0.0.1:0")
        .with_telegram_api_url(format!("http://{}", api))
        .with_poll_timeout(Duration::from_secs(1))
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
