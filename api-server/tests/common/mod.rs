//! Common test utilities.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_server::config::Config;
use api_server::server::{self, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use share_queue::client::{ShareCall, ShareClient, ShareOutcome};
use share_queue::executor::{ExecutorSettings, FailurePolicy, Strategy};
use share_queue::{
    ClientIdentities, InMemoryLedger, ShareExecutor, ShareManager, TaskLedger, TokenResolver,
};
use tokio::sync::Notify;
use tower::ServiceExt;

pub const LOCAL_PEER: ([u8; 4], u16) = ([127, 0, 0, 1], 40000);
pub const REMOTE_PEER: ([u8; 4], u16) = ([203, 0, 113, 7], 40000);

pub struct FakeResolver(pub Option<String>);

#[async_trait]
impl TokenResolver for FakeResolver {
    async fn resolve(&self, _credential: &str, _identity: &str) -> Option<String> {
        self.0.clone()
    }
}

/// Always succeeds. When `hold_at` is reached the call parks until
/// `release` is notified.
pub struct FakeShareClient {
    pub calls: AtomicU32,
    pub hold_at: u32,
    pub reached: Notify,
    pub release: Notify,
}

impl FakeShareClient {
    pub fn new(hold_at: u32) -> Self {
        Self {
            calls: AtomicU32::new(0),
            hold_at,
            reached: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShareClient for FakeShareClient {
    async fn share(&self, _call: ShareCall<'_>) -> ShareOutcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.hold_at {
            self.reached.notify_one();
            self.release.notified().await;
        }
        ShareOutcome::Shared(format!("post_{n}"))
    }
}

pub struct TestApp {
    pub router: Router,
    pub manager: ShareManager,
    pub ledger: Arc<dyn TaskLedger>,
    pub client: Arc<FakeShareClient>,
}

pub struct TestOptions {
    pub token: Option<String>,
    pub hold_at: u32,
    pub api_token: Option<String>,
    pub peer: ([u8; 4], u16),
    pub capacity: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            token: Some("tok".to_string()),
            hold_at: u32::MAX,
            api_token: None,
            peer: LOCAL_PEER,
            capacity: 100,
        }
    }
}

pub fn test_app() -> TestApp {
    test_app_with(TestOptions::default())
}

pub fn test_app_with(options: TestOptions) -> TestApp {
    let ledger: Arc<dyn TaskLedger> = Arc::new(InMemoryLedger::new(options.capacity));
    let client = Arc::new(FakeShareClient::new(options.hold_at));
    let executor = ShareExecutor::new(
        client.clone(),
        ledger.clone(),
        ExecutorSettings {
            strategy: Strategy::Sequential,
            batch_size: 1,
            delay_ms: 0,
            jitter_ms: 0,
            failure_policy: FailurePolicy::Continue,
            rate_limit_pause_ms: 0,
        },
    );
    let manager = ShareManager::new(
        ledger.clone(),
        Arc::new(FakeResolver(options.token)),
        Arc::new(executor),
        ClientIdentities::default(),
    );

    let mut config = Config::default();
    config.server.api_token = options.api_token;
    config.limits.max_limit = 100;

    let state = AppState::new(manager.clone(), &config);
    let router = server::build_app(state, 30).layer(MockConnectInfo(SocketAddr::from(options.peer)));

    TestApp {
        router,
        manager,
        ledger,
        client,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(Request::post(uri).body(Body::empty()).unwrap()).await
    }

    /// Submit a share and return its id.
    pub async fn start_share(&self, limit: u32) -> String {
        let (status, json) = self
            .post_json(
                "/api/share",
                serde_json::json!({
                    "cookie": "c_user=1",
                    "link": "https://example.com/post",
                    "limit": limit,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        json["share_id"].as_str().unwrap().to_string()
    }

    /// Poll the progress route until the share leaves `processing`.
    pub async fn wait_for_terminal(&self, id: &str) -> serde_json::Value {
        for _ in 0..500 {
            let (status, json) = self.get(&format!("/api/share/{id}")).await;
            assert_eq!(status, StatusCode::OK);
            if json["share"]["status"] != "processing" {
                return json["share"].clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("share {id} never finished");
    }
}
