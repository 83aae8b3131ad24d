//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use openapi_gate::config::ValidationConfig;
use openapi_gate::description::{load_description, ApiDescription};
use openapi_gate::http::GateState;
use openapi_gate::lifecycle::{prepare_gate_from, Gate};
use openapi_gate::validation::ValidationMode;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

pub fn petstore() -> ApiDescription {
    load_description(&fixture("petstore.yaml")).unwrap()
}

#[allow(dead_code)]
pub fn petstore_gate(mode: ValidationMode) -> Gate {
    let config = ValidationConfig {
        mode,
        ..ValidationConfig::default()
    };
    prepare_gate_from(&petstore(), &config).unwrap()
}

#[allow(dead_code)]
pub fn gate_state(mode: ValidationMode, max_body_bytes: usize) -> GateState {
    GateState::new(Arc::clone(&petstore_gate(mode).orchestrator), max_body_bytes)
}

/// Start a mock backend that answers every request with its request line
/// (`GET /pets?limit=1 HTTP/1.1`) as the body.
#[allow(dead_code)]
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut received = Vec::new();
                        let mut buf = [0u8; 1024];
                        let head_end = loop {
                            if let Some(pos) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                                break pos + 4;
                            }
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => received.extend_from_slice(&buf[..n]),
                            }
                        };

                        let head = String::from_utf8_lossy(&received[..head_end]).to_string();
                        let line = head.lines().next().unwrap_or_default().to_string();
                        let body_len = head
                            .lines()
                            .filter_map(|l| l.split_once(':'))
                            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        while received.len() < head_end + body_len {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => received.extend_from_slice(&buf[..n]),
                            }
                        }

                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            line.len(),
                            line
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
