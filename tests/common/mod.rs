#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bookmate_rs::{BmClient, RetryPolicy};
use httpmock::MockServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

/// Millisecond backoff and no jitter, so retry tests stay fast.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(1),
        Duration::from_millis(5),
        Duration::from_secs(2),
    )
    .unwrap()
    .with_max_jitter(Duration::ZERO)
}

pub fn base_api(server: &MockServer) -> Url {
    Url::parse(&format!("{}/api/v5/", server.base_url())).unwrap()
}

pub fn url(server: &MockServer, path: &str) -> Url {
    Url::parse(&server.url(path)).unwrap()
}

/// A client pointed at `server` with three fast attempts for every request kind.
pub fn client_for(server: &MockServer) -> BmClient {
    BmClient::builder()
        .base_api(base_api(server))
        .auth_token("test-token")
        .metadata_policy(fast_policy(3))
        .download_policy(fast_policy(3))
        .build()
        .unwrap()
}

/// A raw HTTP server that answers every connection with a status (200 unless built with
/// [`TruncatingServer::stalling_status`]) whose headers announce
/// `announced` bytes, sends `sent` bytes of body, then either closes the socket or keeps
/// it open without sending anything more.
pub struct TruncatingServer {
    pub url: Url,
    connections: Arc<AtomicUsize>,
}

impl TruncatingServer {
    pub async fn closing(announced: usize, sent: usize) -> Self {
        Self::start(200, announced, sent, false).await
    }

    pub async fn stalling(announced: usize, sent: usize) -> Self {
        Self::start(200, announced, sent, true).await
    }

    pub async fn stalling_status(status: u16, announced: usize, sent: usize) -> Self {
        Self::start(status, announced, sent, true).await
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    async fn start(status: u16, announced: usize, sent: usize, stall: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = sock.read(&mut buf).await;
                    let reason = if status == 200 { "OK" } else { "Error" };
                    let head = format!(
                        "HTTP/1.1 {status} {reason}\r\ncontent-type: application/octet-stream\r\ncontent-length: {announced}\r\n\r\n"
                    );
                    let _ = sock.write_all(head.as_bytes()).await;
                    let _ = sock.write_all(&vec![b'x'; sent]).await;
                    let _ = sock.flush().await;
                    if stall {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                });
            }
        });

        Self {
            url: Url::parse(&format!("http://{addr}/file.bin")).unwrap(),
            connections,
        }
    }
}
