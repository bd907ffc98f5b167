//! Integration tests for the liveness endpoint

mod common;

#[tokio::test]
async fn health_check_works() {
    let app = common::spawn_app().await;

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}
