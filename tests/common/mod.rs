// Each integration test file is a separate binary; helpers not used in every
// binary would otherwise trigger dead_code warnings.
#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    routing::get,
    Router,
};
use link_preview_card::Fetcher;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const METADATA_PATH: &str = "/api/services/website/metadata";

pub const PSU_METADATA: &str = r#"{
    "title": {"title": "Penn State"},
    "description": {"description": "A page"},
    "image": {"logo": "https://x/img.png"},
    "url": {"url": "https://psu.edu/page"},
    "themeColor": {"themeColor": "var(--ddd-theme-2)"}
}"#;

#[derive(Deserialize)]
struct MetadataQuery {
    q: Option<String>,
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    body: &'static str,
    delay: Option<Duration>,
    queries: Arc<Mutex<Vec<String>>>,
}

async fn metadata(
    State(stub): State<StubState>,
    Query(query): Query<MetadataQuery>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], &'static str) {
    stub.queries
        .lock()
        .unwrap()
        .push(query.q.unwrap_or_default());

    if let Some(delay) = stub.delay {
        tokio::time::sleep(delay).await;
    }

    (
        stub.status,
        [(header::CONTENT_TYPE, "application/json")],
        stub.body,
    )
}

/// Metadata service stand-in answering every request with one canned response.
pub struct StubServer {
    pub endpoint: String,
    queries: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn respond_with(status: u16, body: &'static str) -> Self {
        Self::spawn(status, body, None).await
    }

    /// Answers with 200 after waiting `delay`.
    pub async fn respond_after(delay: Duration, body: &'static str) -> Self {
        Self::spawn(200, body, Some(delay)).await
    }

    async fn spawn(status: u16, body: &'static str, delay: Option<Duration>) -> Self {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            status: StatusCode::from_u16(status).unwrap(),
            body,
            delay,
            queries: queries.clone(),
        };
        let app = Router::new()
            .route(METADATA_PATH, get(metadata))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            endpoint: format!("http://{addr}{METADATA_PATH}"),
            queries,
        }
    }

    /// Decoded `q` parameter of every request received so far.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn fetcher(&self) -> Fetcher {
        fetcher_for(&self.endpoint, None)
    }
}

/// A fetcher that ignores any proxy configured in the environment.
pub fn fetcher_for(endpoint: &str, timeout: Option<Duration>) -> Fetcher {
    let mut builder = reqwest::Client::builder().no_proxy();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Fetcher::with_client(builder.build().unwrap(), endpoint).unwrap()
}

/// An endpoint nothing is listening on.
pub async fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}{METADATA_PATH}")
}
