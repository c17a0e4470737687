mod common;

use std::time::Duration;

use serde_json::json;
use tokio::task::JoinSet;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{REFRESH_PATH, client, refresh_calls};

async fn mount_items(server: &MockServer, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("Authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(calls)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(calls)
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, delay: Duration) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(header("X-XSRF-TOKEN", "xsrf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": "fresh" }))
                .set_delay(delay),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    mount_items(&server, 5).await;
    mount_refresh(&server, Duration::from_millis(300)).await;

    let client = client(&server, Some("stale"), Some("xsrf"));
    let mut tasks = JoinSet::new();
    for _ in 0..5 {
        let client = client.clone();
        tasks.spawn(async move { client.get("/items").await });
    }

    let mut ok = 0;
    while let Some(joined) = tasks.join_next().await {
        let response = joined.expect("task").expect("request should recover");
        assert_eq!(response.status(), 200);
        ok += 1;
    }
    assert_eq!(ok, 5);
    assert_eq!(refresh_calls(&server).await, 1);
    assert_eq!(client.credential().unwrap().value(), "fresh");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_callers_still_refresh_once() {
    let server = MockServer::start().await;
    mount_items(&server, 25).await;
    mount_refresh(&server, Duration::from_millis(500)).await;

    let client = client(&server, Some("stale"), Some("xsrf"));
    let mut tasks = JoinSet::new();
    for _ in 0..25 {
        let client = client.clone();
        tasks.spawn(async move { client.get("/items").await });
    }
    while let Some(joined) = tasks.join_next().await {
        assert_eq!(joined.unwrap().unwrap().status(), 200);
    }
    assert_eq!(refresh_calls(&server).await, 1);
}

#[tokio::test]
async fn retry_resends_same_method_and_body() {
    let server = MockServer::start().await;
    let order = json!({ "productId": 7, "quantity": 2 });

    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("Authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("Authorization", "Bearer fresh"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(order.clone()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, Duration::ZERO).await;

    let client = client(&server, Some("stale"), Some("xsrf"));
    let response = client.post_json("/orders", &order).await.expect("order");
    assert_eq!(response.status(), 201);
}
