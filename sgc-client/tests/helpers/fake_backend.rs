//! In-process fake of the style backend
//!
//! Every request is recorded and answered from a per-path canned reply.
//! Paths without a reply get 404. Each handler is also recorded as finished
//! (its reply was produced) or dropped (the client went away first).

use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned response for one path
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl Reply {
    /// 200 with a JSON body
    pub fn json(value: Value) -> Self {
        Self::with_status(200, value)
    }

    pub fn with_status(status: u16, value: Value) -> Self {
        Self {
            status,
            body: value.to_string(),
            delay: None,
        }
    }

    /// 200 with a body sent as-is
    pub fn raw(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// One request as the fake saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Default)]
struct FakeState {
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
    finished: Mutex<Vec<String>>,
    dropped: Mutex<Vec<String>>,
}

/// Marks the handler for `path` as dropped unless it got to reply
struct HandlerTracker {
    state: Arc<FakeState>,
    path: String,
    finished: bool,
}

impl Drop for HandlerTracker {
    fn drop(&mut self) {
        let list = if self.finished {
            &self.state.finished
        } else {
            &self.state.dropped
        };
        list.lock().unwrap().push(self.path.clone());
    }
}

#[derive(Clone)]
pub struct FakeBackend {
    state: Arc<FakeState>,
    base_url: String,
}

impl FakeBackend {
    /// Bind an ephemeral local port and start serving
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            base_url: format!("http://{}", addr),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn reply(&self, path: &str, reply: Reply) {
        self.state
            .replies
            .lock()
            .unwrap()
            .insert(path.to_string(), reply);
    }

    /// Number of requests received for `path`
    pub fn calls(&self, path: &str) -> usize {
        self.requests(path).len()
    }

    pub fn requests(&self, path: &str) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    /// Handlers for `path` that produced their reply
    pub fn finished(&self, path: &str) -> usize {
        count(&self.state.finished, path)
    }

    /// Handlers for `path` cancelled because the client disconnected
    pub fn dropped(&self, path: &str) -> usize {
        count(&self.state.dropped, path)
    }

    /// Wait up to `limit` for a handler on `path` to be dropped
    pub async fn wait_dropped(&self, path: &str, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.dropped(path) > 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.dropped(path) > 0
    }
}

fn count(list: &Mutex<Vec<String>>, path: &str) -> usize {
    list.lock().unwrap().iter().filter(|p| *p == path).count()
}

async fn handle(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path: path.clone(),
        query: uri.query().map(str::to_string),
        body,
    });

    let reply = state.replies.lock().unwrap().get(&path).cloned();
    let Some(reply) = reply else {
        return (StatusCode::NOT_FOUND, "no reply configured").into_response();
    };

    let mut tracker = HandlerTracker {
        state: state.clone(),
        path,
        finished: false,
    };
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    tracker.finished = true;

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], reply.body).into_response()
}
