//! HTTPS icon API.

mod common;

use serde_json::{json, Value};

use common::start_server;

fn http_client() -> reqwest::Client {
    // the test server runs on a self-signed certificate
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .expect("http client")
}

#[tokio::test]
async fn lists_all_icon_ids() {
    let server = start_server().await;
    let url = format!("https://127.0.0.1:{}/api/2.2.0/user-icons", server.api_port());

    let response = http_client().get(url).send().await.expect("request");
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body: Value = response.json().await.expect("json");
    assert_eq!(body, json!([{ "id": 16_688_710 }, { "id": 4_151_541 }]));
    server.stop().await;
}

#[tokio::test]
async fn returns_requested_icons_with_images() {
    let server = start_server().await;
    let url = format!(
        "https://127.0.0.1:{}/api/2.2.0/user-icons?ids=16688710,4151541&include=images",
        server.api_port()
    );

    let body: Value =
        http_client().get(url).send().await.expect("request").json().await.expect("json");
    assert_eq!(
        body,
        json!([
            {
                "id": 16_688_710,
                "images": ["aWNvbjE=", "aWNvbjI="],
                "imagesDark": ["aWNvbjE=", "aWNvbjI="],
            },
            {
                "id": 4_151_541,
                "images": ["aWNvbjM="],
                "imagesDark": ["aWNvbjM="],
            },
        ])
    );
    server.stop().await;
}

#[tokio::test]
async fn returns_a_single_icon() {
    let server = start_server().await;
    let url = format!(
        "https://127.0.0.1:{}/api/2.2.0/user-icons?ids=4151541&include=images",
        server.api_port()
    );

    let body: Value =
        http_client().get(url).send().await.expect("request").json().await.expect("json");
    assert_eq!(
        body,
        json!([
            {
                "id": 4_151_541,
                "images": ["aWNvbjM="],
                "imagesDark": ["aWNvbjM="],
            },
        ])
    );
    server.stop().await;
}

#[tokio::test]
async fn unknown_paths_are_json_404s() {
    let server = start_server().await;
    let url = format!("https://127.0.0.1:{}/api/2.2.0/foo", server.api_port());

    let response = http_client().get(url).send().await.expect("request");
    assert_eq!(response.status(), 404);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body: Value = response.json().await.expect("json");
    assert_eq!(body, json!({ "message": "Not found" }));
    server.stop().await;
}
