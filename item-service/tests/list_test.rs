mod common;

use common::TestApp;
use item_service::config::ApiConfig;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn seed(app: &TestApp) {
    for (id, pk) in [("a", "t1"), ("b", "t1"), ("c", "t2"), ("d", "t3"), ("e", "t1")] {
        let response = app
            .create_item(&json!({"id": id, "pk": pk, "name": format!("item {}", id)}))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}

async fn ids(response: reqwest::Response) -> Vec<String> {
    assert_eq!(response.status(), StatusCode::OK);
    let body: Vec<Value> = response.json().await.expect("list returns an array");
    body.into_iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn list_by_partition_returns_only_that_partition() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let response = app.list_items("?pk=t1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let items: Vec<Value> = response.json().await.unwrap();

    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| item["pk"] == "t1"));
}

#[tokio::test]
async fn list_without_partition_spans_all_partitions() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let all = ids(app.list_items("").await).await;

    assert_eq!(all, ["a", "b", "e", "c", "d"]);
}

#[tokio::test]
async fn list_of_unknown_partition_is_empty() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    assert!(ids(app.list_items("?pk=nope").await).await.is_empty());
}

#[tokio::test]
async fn list_pages_with_limit_and_offset() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let first = ids(app.list_items("?limit=2").await).await;
    let second = ids(app.list_items("?limit=2&offset=2").await).await;
    let third = ids(app.list_items("?limit=2&offset=4").await).await;

    assert_eq!(first, ["a", "b"]);
    assert_eq!(second, ["e", "c"]);
    assert_eq!(third, ["d"]);
}

#[tokio::test]
async fn list_page_size_is_capped_by_configuration() {
    let app = TestApp::spawn_with(ApiConfig {
        max_page_size: 2,
        ..ApiConfig::default()
    })
    .await;
    seed(&app).await;

    assert_eq!(ids(app.list_items("").await).await.len(), 2);
    assert_eq!(ids(app.list_items("?limit=50").await).await.len(), 2);
    assert_eq!(ids(app.list_items("?pk=t1&limit=1").await).await, ["a"]);
}

#[tokio::test]
async fn list_rejects_malformed_paging() {
    let app = TestApp::spawn().await;

    let response = app.list_items("?limit=many").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
