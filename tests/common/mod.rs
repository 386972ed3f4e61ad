#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
};
use gatehouse::config::{Config, LogFormat, RuntimeMode};
use gatehouse::constants::DEFAULT_LOG_FILTER;
use gatehouse::database::{MemoryConnector, MemoryUserStore};
use gatehouse::server;
use serde_json::{Value, json};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

pub const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";
pub const INDEX_HTML: &str = "<!doctype html><title>Sign in</title>";

pub fn valid_vars() -> Vec<(&'static str, &'static str)> {
    vec![("MONGO_URI", "mongodb://x"), ("JWT_SECRET", TEST_SECRET)]
}

/// Config that binds an ephemeral port on all interfaces.
pub fn test_config() -> Config {
    Config {
        port: 0,
        mongo_uri: "mongodb://x".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        node_env: RuntimeMode::Test,
        log_filter: DEFAULT_LOG_FILTER.to_string(),
        log_format: LogFormat::Pretty,
    }
}

pub fn static_root() -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create static root");
    std::fs::write(dir.path().join("index.html"), INDEX_HTML).expect("Failed to write index.html");
    std::fs::write(dir.path().join("app.js"), "console.log('ok');").expect("Failed to write app.js");
    dir
}

pub struct TestApp {
    pub base_url: String,
    pub store: MemoryUserStore,
    _static_root: TempDir,
}

/// Runs the full startup sequence against an in-memory store.
pub async fn spawn_app() -> TestApp {
    let static_root = static_root();
    let store = MemoryUserStore::new();
    let connector = MemoryConnector::new(store.clone());

    let server = server::start(&test_config(), &connector, static_root.path())
        .await
        .expect("Failed to start server");
    let port = server.local_addr().expect("Failed to read local address").port();

    tokio::spawn(server.serve(std::future::pending()));

    TestApp {
        base_url: format!("http://127.0.0.1:{}", port),
        store,
        _static_root: static_root,
    }
}

/// Log sink shared between a test and the subscriber writing into it.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Routes this thread's log output into a fresh buffer until the guard drops.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

pub struct StubApi {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
}

impl StubApi {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn echo(State(hits): State<Arc<AtomicUsize>>, headers: HeaderMap) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "authorization": header("authorization"),
        "x-request-source": header("x-request-source"),
        "content-type": header("content-type"),
    }))
}

async fn rejected(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, &'static str) {
    hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::UNAUTHORIZED, "token expired: secret details")
}

/// Local API stub that counts every request it receives.
pub async fn spawn_stub_api() -> StubApi {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/echo", get(echo).post(echo))
        .route("/rejected", get(rejected))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub API");
    let addr: SocketAddr = listener.local_addr().expect("Failed to read stub address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Stub API failed");
    });

    StubApi {
        base_url: format!("http://{}", addr),
        hits,
    }
}

/// An address with nothing listening on it.
pub async fn closed_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe listener");
    let addr = listener.local_addr().expect("Failed to read probe address");
    drop(listener);
    format!("http://{}", addr)
}
