use crate::common::{CHROME, CURL, client, create_test_config, spawn_recording_gateway};
use portal_gate::security::verification::{BotToken, now_ms};

#[tokio::test]
async fn test_curl_to_proxy_is_forbidden() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/bare/"))
        .header("user-agent", CURL)
        .header("accept", "*/*")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 403);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    assert_eq!(resp.text().await.unwrap(), "Forbidden");
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_verified_browser_forwarded_with_address() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/bare/v3/"))
        .header("user-agent", CHROME)
        .header("accept", "text/html")
        .header("cookie", "verified=ok")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "proxied");

    let calls = recorder.calls_to("proxy");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/bare/v3/");
    let egress = calls[0].egress.expect("proxied request carries an address");
    assert!(config.egress_block.contains(egress.0));
    assert!(!config.egress_reserved.unwrap().contains(egress.0));
}

#[tokio::test]
async fn test_unverified_browser_challenged() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/bare/"))
        .header("user-agent", CHROME)
        .header("accept", "text/html,application/xhtml+xml,*/*;q=0.8")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let cookie = resp.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(cookie.starts_with("verified=ok;"));
    assert!(cookie.contains("Max-Age=3600"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let body = resp.text().await.unwrap();
    assert!(body.contains("location.reload()"));
    assert!(body.contains("<noscript>"));
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_unverified_non_html_browser_forwarded() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/bare/v3/"))
        .header("user-agent", CHROME)
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(recorder.calls_to("proxy").len(), 1);
    assert!(recorder.calls_to("proxy")[0].egress.is_some());
}

#[tokio::test]
async fn test_application_traffic_skips_verification() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;
    let client = client();

    for path in ["/", "/games/index.html", "/wisp/"] {
        let resp = client
            .get(format!("http://127.0.0.1:{port}{path}"))
            .header("user-agent", CURL)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "{path}");
        assert_eq!(resp.text().await.unwrap(), "app");
    }

    let calls = recorder.calls_to("app");
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.egress.is_none()));
}

#[tokio::test]
async fn test_bot_token_admits_once() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;
    let client = client();
    let token = BotToken::encode(now_ms() - 5_000, "integration");

    let first = client
        .get(format!("http://127.0.0.1:{port}/bare/"))
        .header("user-agent", CHROME)
        .header("accept", "text/html")
        .header("x-bot-token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);
    assert_eq!(first.text().await.unwrap(), "proxied");

    let replay = client
        .get(format!("http://127.0.0.1:{port}/bare/"))
        .header("user-agent", CHROME)
        .header("accept", "text/html")
        .header("x-bot-token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), 200);
    assert!(replay.headers().get("set-cookie").is_some());

    assert_eq!(recorder.calls_to("proxy").len(), 1);
}

#[tokio::test]
async fn test_concurrent_token_replays_admit_one() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;
    let token = BotToken::encode(now_ms() - 5_000, "race");

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let token = token.clone();
        tasks.push(tokio::spawn(async move {
            client()
                .get(format!("http://127.0.0.1:{port}/bare/"))
                .header("user-agent", CHROME)
                .header("accept", "text/html")
                .header("x-bot-token", token)
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap()
        }));
    }

    let mut admitted = 0;
    for task in tasks {
        if task.await.unwrap() == "proxied" {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(recorder.calls_to("proxy").len(), 1);
}
