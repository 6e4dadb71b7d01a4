use crate::common::{
    CHROME, client, create_test_config, echo_roundtrip, send_raw, spawn_gateway, upgrade_request,
};
use portal_gate::core::gateway::Handlers;
use portal_gate::features::{EGRESS_HEADER, UpstreamForwarder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Minimal upstream: answers plain requests with the egress header it saw,
/// accepts upgrades and echoes the tunnel.
async fn spawn_mock_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                continue;
            };
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut byte = [0u8; 1];
                while !head.ends_with(b"\r\n\r\n") {
                    match socket.read(&mut byte).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => head.push(byte[0]),
                    }
                }
                let head = String::from_utf8_lossy(&head).to_ascii_lowercase();

                if head.contains("\r\nupgrade: websocket") {
                    let response = "HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n";
                    if socket.write_all(response.as_bytes()).await.is_err() {
                        return;
                    }
                    let mut buf = [0u8; 1024];
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 || socket.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                } else {
                    let egress = head
                        .lines()
                        .find_map(|line| line.strip_prefix(&format!("{EGRESS_HEADER}: ")))
                        .unwrap_or("none")
                        .trim()
                        .to_string();
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{egress}",
                        egress.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                }
            });
        }
    });

    addr
}

fn forwarding_handlers(bare: SocketAddr, wisp: SocketAddr, app: SocketAddr) -> Handlers {
    Handlers {
        proxy: Arc::new(UpstreamForwarder::new(bare, "/bare/")),
        wisp: Arc::new(UpstreamForwarder::new(wisp, "/wisp/")),
        app: Arc::new(UpstreamForwarder::new(app, "/")),
    }
}

#[tokio::test]
async fn test_forwarder_passes_egress_address() {
    let upstream = spawn_mock_upstream().await;
    let config = create_test_config();
    let port = spawn_gateway(&config, forwarding_handlers(upstream, upstream, upstream)).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/bare/v3/"))
        .header("user-agent", CHROME)
        .header("cookie", "verified=ok")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let egress: std::net::Ipv6Addr = resp.text().await.unwrap().parse().unwrap();
    assert!(config.egress_block.contains(egress));
}

#[tokio::test]
async fn test_app_forwarding_is_untagged() {
    let upstream = spawn_mock_upstream().await;
    let config = create_test_config();
    let port = spawn_gateway(&config, forwarding_handlers(upstream, upstream, upstream)).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/index.html"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "none");
}

#[tokio::test]
async fn test_forwarder_relays_wisp_upgrade() {
    let upstream = spawn_mock_upstream().await;
    let config = create_test_config();
    let port = spawn_gateway(&config, forwarding_handlers(upstream, upstream, upstream)).await;

    let (mut stream, head) = send_raw(port, &upgrade_request("/wisp/", &[])).await;
    assert!(head.starts_with("HTTP/1.1 101"), "{head}");
    assert_eq!(echo_roundtrip(&mut stream, b"\x02\x00\x00").await, b"\x02\x00\x00");
}

#[tokio::test]
async fn test_dead_upstream_is_bad_gateway() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let config = create_test_config();
    let port = spawn_gateway(&config, forwarding_handlers(dead, dead, dead)).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/bare/"))
        .header("user-agent", CHROME)
        .header("cookie", "verified=ok")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
}
