//! Local fake of the ListenBrainz API

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

/// How the fake service answers submissions
#[derive(Clone, Copy)]
pub enum SubmitReply {
    Ok,
    NotOk,
    ServerError,
    Unauthorized,
}

#[derive(Clone)]
pub struct FakeBrainz {
    token_valid: bool,
    submit_reply: SubmitReply,
    pub submissions: Arc<Mutex<Vec<Value>>>,
    pub auth_headers: Arc<Mutex<Vec<String>>>,
}

impl FakeBrainz {
    pub fn new(token_valid: bool, submit_reply: SubmitReply) -> Self {
        Self {
            token_valid,
            submit_reply,
            submissions: Arc::new(Mutex::new(Vec::new())),
            auth_headers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record_auth(&self, headers: &HeaderMap) {
        let value = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.auth_headers.lock().unwrap().push(value);
    }
}

async fn validate_token(State(fake): State<FakeBrainz>, headers: HeaderMap) -> Response {
    fake.record_auth(&headers);
    if fake.token_valid {
        Json(json!({"code": 200, "message": "Token valid.", "valid": true, "user_name": "deezer-fan"}))
            .into_response()
    } else {
        Json(json!({"code": 200, "message": "Token invalid.", "valid": false})).into_response()
    }
}

async fn submit_listens(
    State(fake): State<FakeBrainz>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.record_auth(&headers);
    fake.submissions.lock().unwrap().push(body);

    let rate_headers = [
        ("x-ratelimit-remaining", "0"),
        ("x-ratelimit-reset-in", "0"),
    ];
    match fake.submit_reply {
        SubmitReply::Ok => (rate_headers, Json(json!({"status": "ok"}))).into_response(),
        SubmitReply::NotOk => (rate_headers, Json(json!({"status": "error"}))).into_response(),
        SubmitReply::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response()
        }
        SubmitReply::Unauthorized => {
            (StatusCode::UNAUTHORIZED, Json(json!({"code": 401, "error": "Invalid authorization token."})))
                .into_response()
        }
    }
}

/// Start the fake service on an ephemeral port, returning its base URL
pub async fn spawn_fake(fake: FakeBrainz) -> String {
    let app = Router::new()
        .route("/1/validate-token", get(validate_token))
        .route("/1/submit-listens", post(submit_listens))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/", addr)
}

/// URL of a local port with nothing listening on it
pub fn dead_url() -> String {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    format!("http://{}", addr)
}
