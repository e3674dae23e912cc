//! HTTP API tests against a live gateway on an ephemeral port

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use veil_crypto::Signer;
use veil_gateway::{routes, AppState, GatewayConfig};
use veil_storage::{CryptConfig, LocalConfig, MountConfig, StorageSettings, UrlObject, UrlTreeConfig};

// Helper to spawn a server on a random port
async fn spawn_server(config: GatewayConfig) -> String {
    let state = Arc::new(AppState::new(config).unwrap());
    let app = routes::create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    format!("http://{}", addr)
}

fn base_config() -> GatewayConfig {
    GatewayConfig {
        token: "api-token".to_string(),
        sign_all: false,
        mounts: vec![
            MountConfig::UrlTree(UrlTreeConfig {
                mount_path: "/web".to_string(),
                objects: vec![UrlObject {
                    path: "/a.txt".to_string(),
                    url: "https://objects.example/a".to_string(),
                    size: 7,
                    concurrency: 64,
                    part_size: 1 << 20,
                    ..Default::default()
                }],
                ..Default::default()
            }),
            MountConfig::Crypt(CryptConfig::new("/vault", "/web/enc").with_password("secret")),
        ],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ping() {
    let base_url = spawn_server(base_config()).await;
    let res = Client::new().get(format!("{}/ping", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "pong");
}

#[tokio::test]
async fn test_direct_link_over_post() {
    let base_url = spawn_server(base_config()).await;
    let res = Client::new()
        .post(format!("{}/api/fs/crypt_meta", base_url))
        .json(&json!({ "path": "/web/a.txt" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], 200);
    assert_eq!(body["message"], "success");
    let data = &body["data"];
    assert_eq!(data["mode"], "plain");
    assert_eq!(data["file_name"], "a.txt");
    assert_eq!(data["remote"]["url"], "https://objects.example/a");
    assert_eq!(data["remote"]["concurrency"], 16);
    assert_eq!(data["remote"]["part_size"], 1 << 20);
    assert!(data["remote"]["headers"].is_object());
}

#[tokio::test]
async fn test_local_storage_is_proxied_with_signature() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

    let mut config = base_config();
    config.sign_all = true;
    config.mounts.push(MountConfig::Local(LocalConfig {
        mount_path: "/disk".to_string(),
        root: dir.path().to_path_buf(),
        settings: StorageSettings::default(),
    }));
    let base_url = spawn_server(config).await;

    let res = Client::new()
        .get(format!("{}/api/fs/crypt_meta", base_url))
        .query(&[("path", "/disk/notes.txt")])
        .header("x-forwarded-proto", "https")
        .header("x-forwarded-host", "files.example")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    let remote = &body["data"]["remote"];
    assert!(remote.get("headers").is_none());
    assert!(remote.get("concurrency").is_none());

    let url = remote["url"].as_str().unwrap();
    let (base, token) = url.split_once("?sign=").unwrap();
    assert_eq!(base, "https://files.example/p/disk/notes.txt");
    Signer::new("api-token", None).verify("/disk/notes.txt", token).unwrap();
}

#[tokio::test]
async fn test_not_found_envelope() {
    let base_url = spawn_server(base_config()).await;
    let res = Client::new()
        .post(format!("{}/api/fs/crypt_meta", base_url))
        .json(&json!({ "path": "/web/missing.txt" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], 404);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_bad_requests() {
    let base_url = spawn_server(base_config()).await;
    let client = Client::new();

    for path in ["", "/", "/web"] {
        let res = client
            .post(format!("{}/api/fs/crypt_meta", base_url))
            .json(&json!({ "path": path }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "path {:?}", path);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], 400);
    }
}

#[tokio::test]
async fn test_unknown_mount_is_not_found() {
    let base_url = spawn_server(base_config()).await;
    let res = Client::new()
        .get(format!("{}/api/fs/crypt_meta?path=/nowhere/a.txt", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
