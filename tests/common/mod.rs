use std::net::TcpListener;
use std::sync::Arc;

use session_core::auth::{seed_account, AuthService};
use session_core::clock::SystemClock;
use session_core::configuration::JwtSettings;
use session_core::startup::run;
use session_core::store::InMemoryStore;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "admin123";

#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub jwt: JwtSettings,
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "http-test-secret-key-at-least-32-bytes".to_string(),
        issuer: "session-core".to_string(),
        audience: "session-core-clients".to_string(),
        access_token_ttl_minutes: 15,
        refresh_token_ttl_days: 7,
    }
}

/// Serve the app on a random port over a fresh in-memory store with one
/// seeded account.
pub async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(SystemClock);
    seed_account(store.as_ref(), clock.as_ref(), USERNAME, PASSWORD)
        .await
        .expect("Failed to seed account");

    let jwt = jwt_settings();
    let service = AuthService::new(store.clone(), store.clone(), &jwt, clock);
    let server = run(listener, service, jwt.clone()).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        jwt,
    }
}
