use crate::common::{
    CHROME, CURL, Recorder, client, create_policy, create_test_config, spawn_listener,
};
use portal_gate::core::gateway::{Gateway, Handlers};
use portal_gate::core::middleware::AppGate;
use std::sync::Arc;

async fn spawn_gated_gateway() -> (u16, Arc<Recorder>) {
    let mut config = (*create_test_config()).clone();
    config.app_gated_paths = vec!["/play/".to_string()];

    let recorder = Arc::new(Recorder::default());
    let policy = create_policy(&config);
    let handlers = Handlers {
        proxy: recorder.clone(),
        wisp: recorder.clone(),
        app: Arc::new(AppGate::new(&config, policy.clone(), recorder.clone())),
    };
    let gateway = Arc::new(Gateway::new(&config, policy, handlers).unwrap());
    (spawn_listener(gateway, &config).await, recorder)
}

#[tokio::test]
async fn test_gated_path_rejects_non_browser() {
    let (port, recorder) = spawn_gated_gateway().await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/play/snake"))
        .header("user-agent", CURL)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 403);
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_gated_path_challenges_then_admits() {
    let (port, recorder) = spawn_gated_gateway().await;
    let client = client();

    let challenge = client
        .get(format!("http://127.0.0.1:{port}/play/snake"))
        .header("user-agent", CHROME)
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(challenge.status(), 200);
    let set_cookie = challenge.headers()["set-cookie"].to_str().unwrap().to_string();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    assert!(challenge.text().await.unwrap().contains("location.reload()"));
    assert!(recorder.calls().is_empty());

    let retry = client
        .get(format!("http://127.0.0.1:{port}/play/snake"))
        .header("user-agent", CHROME)
        .header("accept", "text/html")
        .header("cookie", cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(retry.status(), 200);
    assert_eq!(retry.text().await.unwrap(), "app");

    let calls = recorder.calls_to("app");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/play/snake");
}

#[tokio::test]
async fn test_ungated_path_passes_through() {
    let (port, recorder) = spawn_gated_gateway().await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/about"))
        .header("user-agent", CURL)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "app");
    assert_eq!(recorder.calls_to("app").len(), 1);
}
