use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use news_ledger::category::Category;
use news_ledger::config::{Config, SourceConfig};
use news_ledger::feed::StaticFeed;
use news_ledger::models::{ArticleRecord, Entry};
use news_ledger::pipeline::Pipeline;
use news_ledger::server::{router, AppState};
use news_ledger::store::InMemoryStore;

async fn serve(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

fn state(config: Config, store: Arc<InMemoryStore>) -> AppState {
    let feed = Arc::new(StaticFeed::new(vec![
        Entry::new("1", "UPSC Key — October data", "https://x/key"),
        Entry::new("2", "Random headline", "https://x/random"),
    ]));
    let pipeline = Pipeline::new(Arc::new(config), store.clone(), store).with_feed(feed);
    AppState::new(Arc::new(pipeline))
}

#[tokio::test]
async fn test_health_and_idle_status() {
    let tmp = TempDir::new().unwrap();
    let base = serve(state(Config::in_dir(tmp.path()), Arc::new(InMemoryStore::new()))).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let status: Value = client
        .get(format!("{}/pipeline/status", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status, json!({ "running": false }));
}

#[tokio::test]
async fn test_run_returns_report() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let base = serve(state(Config::in_dir(tmp.path()), store.clone())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/pipeline/run", base))
        .json(&json!({ "user_id": "api-user" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let report: Value = response.json().await.unwrap();
    assert_eq!(report["status"], "success");
    assert_eq!(report["feed_new"], 2);
    assert_eq!(report["db_new"], 2);
    assert_eq!(report["errors"], json!([]));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_run_while_running_is_refused() {
    let tmp = TempDir::new().unwrap();
    let app = state(Config::in_dir(tmp.path()), Arc::new(InMemoryStore::new()));
    let _permit = app.gate().try_acquire().unwrap();
    let base = serve(app.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/pipeline/run", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 429);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "already_running");

    let status: Value = client
        .get(format!("{}/pipeline/status", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["running"], true);
}

#[tokio::test]
async fn test_failed_run_returns_500_with_report() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::in_dir(tmp.path());
    config.source = Some(SourceConfig {
        path: tmp.path().join("missing.json"),
        remove_after_sync: false,
    });
    let base = serve(state(config, Arc::new(InMemoryStore::new()))).await;

    let response = reqwest::Client::new()
        .post(format!("{}/pipeline/run", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);

    let report: Value = response.json().await.unwrap();
    assert_eq!(report["status"], "failed");
    // The feed stage ran before the source failed.
    assert_eq!(report["feed_new"], 2);
    assert_eq!(report["db_new"], 0);
    assert_eq!(report["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_notebook_update_and_listing() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::with_records([
        ArticleRecord::new_uncovered("uKey0001", "October data", Category::UpscKey, "https://x/key"),
        ArticleRecord::new_uncovered("genArt0001", "Headline", Category::GeneralArticle, "https://x/gen"),
    ]));
    let base = serve(state(Config::in_dir(tmp.path()), store)).await;
    let client = reqwest::Client::new();

    let updated = client
        .post(format!("{}/articles/notebook", base))
        .json(&json!({ "url": "https://x/key", "notebook_link": "https://nb/1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), 200);
    let body: Value = updated.json().await.unwrap();
    assert_eq!(body["result"], "updated");

    let missing = client
        .post(format!("{}/articles/notebook", base))
        .json(&json!({ "url": "https://x/none", "notebook_link": "https://nb/2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let empty = client
        .post(format!("{}/articles/notebook", base))
        .json(&json!({ "url": "https://x/key", "notebook_link": " " }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 400);

    let keys: Value = client
        .get(format!("{}/articles?category=UPSC%20Key", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let keys = keys.as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["notebook_link"], "https://nb/1");
    assert_eq!(keys[0]["category"], "UPSC Key");
    assert_eq!(keys[0]["status"], "Not Covered");

    let bad = client
        .get(format!("{}/articles?status=maybe", base))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);
}
