//! Server startup tests
//!
//! Binds a real listener on an ephemeral port and talks plain HTTP/1.1 to it.

use std::path::Path;

use helpline_core::{QueueState, Ticket};
use helpline_server::{Config, ConfigError, Credentials, Server, ServerError};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

fn write_config(dir: &Path, extra: &str) -> Config {
    let store_path = dir.join("persistence.json");
    let path = dir.join("helpline.toml");
    let text = format!(
        "listen_address = \"127.0.0.1:0\"\nauth_secret = \"seed\"\nstore_path = {:?}\n{extra}",
        store_path.display().to_string()
    );
    std::fs::write(&path, text).unwrap();
    Config::load(&path).unwrap()
}

async fn get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

async fn post_json(addr: std::net::SocketAddr, path: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn serves_status_over_tcp() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let server = Server::bind(config, Credentials::from_pairs([("ta", "pass")])).await.unwrap();
    let addr = server.local_addr().unwrap();
    assert_ne!(addr.port(), 0);

    let handle = tokio::spawn(server.run());

    let response = get(addr, "/status").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("\"is_open\":true"));

    let response = get(addr, "/staff/queue").await;
    assert!(response.starts_with("HTTP/1.1 401"), "{response}");

    handle.abort();
}

#[tokio::test]
async fn restores_queue_from_store_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let state = QueueState {
        tickets: vec![Ticket::new("a1b2", "Ada", "", chrono::DateTime::<chrono::Utc>::UNIX_EPOCH)],
        is_open: false,
    };
    std::fs::write(&config.store_path, state.encode().unwrap()).unwrap();

    let server = Server::bind(config, Credentials::from_pairs([("ta", "pass")])).await.unwrap();
    let store = server.desk().store();
    assert!(!store.is_open());
    assert_eq!(store.position_of("a1b2"), Some(0));
}

#[tokio::test]
async fn invalid_access_range_fails_bind() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[access]\nallowed_ranges = [\"10.0.0.0/99\"]\n");

    let err = Server::bind(config, Credentials::from_pairs([("ta", "pass")])).await.err();
    assert!(matches!(err, Some(ServerError::Config(ConfigError::Invalid(_)))));
}

#[tokio::test]
async fn trusted_suffix_does_not_admit_unrelated_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "[access]\nallowed_ranges = [\"206.87.0.0/16\"]\ntrusted_suffix = \".ubc.ca.\"\n",
    );

    let server = Server::bind(config, Credentials::from_pairs([("ta", "pass")])).await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = tokio::spawn(server.run());

    // Loopback is outside the ranges and never resolves under the suffix.
    let body = r#"{"student_id":"a1b2","name":"Ada","task_info":""}"#;
    let response = post_json(addr, "/join", body).await;
    assert!(response.starts_with("HTTP/1.1 403"), "{response}");

    let response = get(addr, "/status").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");

    handle.abort();
}
