//! 通过真实的 WebSocket 连接驱动完整路由

use async_trait::async_trait;
use catalog_dl::config::AppConfig;
use catalog_dl::persistence::{JobDocument, JobStore, PersistenceError};
use catalog_dl::{build_router, AppState, JobStatus};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Default)]
struct MemoryStore {
    writes: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn upsert(&self, job_id: &str, doc: &JobDocument) -> Result<(), PersistenceError> {
        self.writes
            .lock()
            .unwrap()
            .push((job_id.to_string(), doc.status.clone()));
        Ok(())
    }
}

async fn serve(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    ws
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

async fn recv(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("等待消息超时")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn setup(files: &[(&str, usize)]) -> (MockServer, AppState, Arc<MemoryStore>, TempDir) {
    let upstream = MockServer::start().await;
    let mut entries = Vec::new();
    for (name, len) in files {
        Mock::given(method("GET"))
            .and(path(format!("/roms/{}", name)))
            .and(header("user-agent", "Tinfoil"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0xAB; *len])
                    .set_delay(Duration::from_millis(50)),
            )
            .mount(&upstream)
            .await;
        entries.push(json!({"url": format!("{}/roms/{}", upstream.uri(), name), "size": len}));
    }
    Mock::given(method("GET"))
        .and(path("/catalog.json"))
        .and(header("user-agent", "Tinfoil"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": entries })))
        .mount(&upstream)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.catalog.url = format!("{}/catalog.json", upstream.uri());
    config.download.download_dir = dir.path().join("downloads");
    config.download.max_concurrent_tasks = 1;
    config.server.static_dir = dir.path().join("static");

    let store = Arc::new(MemoryStore::default());
    let state = AppState::with_store(config, store.clone()).unwrap();
    (upstream, state, store, dir)
}

#[tokio::test]
async fn search_then_download_over_websocket() {
    let (_upstream, state, store, dir) =
        setup(&[("Zelda_BOTW.nsp", 64 * 1024), ("mario.nsp", 10)]).await;
    let addr = serve(state.clone()).await;
    let mut ws = connect(addr).await;

    send(&mut ws, json!({"command": "search", "data": {"search": "zelda"}})).await;
    let results = recv(&mut ws).await;
    assert_eq!(results["type"], "search_results");
    let list = results["results"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    let id = list[0]["id"].as_str().unwrap().to_string();

    // 重复搜索得到相同的 ID
    send(&mut ws, json!({"command": "search", "data": {"search": "ZELDA"}})).await;
    let again = recv(&mut ws).await;
    assert_eq!(again["results"][0]["id"], id.as_str());

    send(&mut ws, json!({"command": "download", "data": {"download": id}})).await;
    assert_eq!(recv(&mut ws).await["type"], "queued");

    let mut percents = Vec::new();
    let complete = loop {
        let msg = recv(&mut ws).await;
        match msg["type"].as_str() {
            Some("progress") => percents.push(msg["progress"].as_u64().unwrap()),
            Some("download_complete") => break msg,
            other => panic!("意外的消息类型: {:?}", other),
        }
    };

    assert_eq!(complete["file"], "Zelda_BOTW.nsp");
    assert!(percents.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(percents.last(), Some(&100));
    let saved = std::fs::read(dir.path().join("downloads").join("Zelda_BOTW.nsp")).unwrap();
    assert_eq!(saved.len(), 64 * 1024);

    let jobs = state.registry.list();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Completed);

    state.shutdown().await;
    let statuses: Vec<String> = store
        .writes
        .lock()
        .unwrap()
        .iter()
        .map(|(_, s)| s.clone())
        .collect();
    assert_eq!(statuses, vec!["queued", "downloading", "completed"]);
}

#[tokio::test]
async fn unknown_id_and_bad_command() {
    let (_upstream, state, _store, _dir) = setup(&[("mario.nsp", 10)]).await;
    let addr = serve(state.clone()).await;
    let mut ws = connect(addr).await;

    send(&mut ws, json!({"command": "download", "data": {"download": "missing"}})).await;
    let err = recv(&mut ws).await;
    assert_eq!(err["type"], "download_error");
    assert!(err.get("file").is_none());

    ws.send(Message::Text("hello".to_string())).await.unwrap();
    assert_eq!(recv(&mut ws).await["type"], "error");

    // 二进制帧里的 JSON 同样会被处理
    let cmd = json!({"command": "search", "data": {"search": "mario"}}).to_string();
    ws.send(Message::Binary(cmd.into_bytes())).await.unwrap();
    assert_eq!(recv(&mut ws).await["type"], "search_results");

    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn downloads_continue_after_disconnect() {
    let (_upstream, state, _store, dir) = setup(&[("a.nsp", 4096), ("b.nsp", 4096)]).await;
    let addr = serve(state.clone()).await;
    let mut ws = connect(addr).await;

    send(&mut ws, json!({"command": "search", "data": {"search": ".nsp"}})).await;
    let results = recv(&mut ws).await;
    let ids: Vec<String> = results["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 2);

    for id in &ids {
        send(&mut ws, json!({"command": "download", "data": {"download": id}})).await;
        assert_eq!(recv(&mut ws).await["type"], "queued");
    }
    ws.close(None).await.unwrap();
    drop(ws);

    tokio::time::timeout(Duration::from_secs(10), async {
        while state.registry.count_by_status(JobStatus::Completed) < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert!(dir.path().join("downloads/a.nsp").exists());
    assert!(dir.path().join("downloads/b.nsp").exists());
}
