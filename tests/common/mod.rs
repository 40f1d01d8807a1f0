use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Duration;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use userbase::config::Config;
use userbase::db::Stores;
use userbase::email::{MemoryTransport, Notification, NotificationKind, Notifier};
use userbase::state::{AppState, SharedState};

/// A running test server backed by in-memory stores and a recording mail transport.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: SharedState,
    pub mailbox: Arc<MemoryTransport>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> (Value, StatusCode) {
        self.post(
            "/auth/register",
            &json!({
                "name": name,
                "email": email,
                "password": password,
                "password_confirmation": password,
            }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        self.post("/auth/login", &json!({ "email": email, "password": password }))
            .await
    }

    /// Wait for the `nth` notification of `kind` sent to `email`.
    pub async fn mail(&self, email: &str, kind: NotificationKind, nth: usize) -> Notification {
        self.mailbox
            .wait_for(email, kind, nth)
            .await
            .unwrap_or_else(|| panic!("no {kind:?} #{nth} delivered to {email}"))
    }

    /// Follow the latest verification link sent to `email`, returning the status.
    pub async fn follow_verification(&self, email: &str, nth: usize) -> StatusCode {
        let link = self.mail(email, NotificationKind::VerifyEmail, nth).await.link;
        self.client
            .get(&link)
            .send()
            .await
            .expect("verification request failed")
            .status()
    }

    /// Register a user, verify their email and return the access token.
    pub async fn verified_user(&self, name: &str, email: &str, password: &str) -> String {
        let (body, status) = self.register(name, email, password).await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        assert_eq!(self.follow_verification(email, 1).await, StatusCode::NO_CONTENT);
        body["access_token"].as_str().unwrap().to_string()
    }

    /// The first registered user is the admin.
    pub async fn bootstrap_admin(&self) -> String {
        self.verified_user("Admin", "admin@test.com", "password123").await
    }

    /// Raw token from the `nth` reset link sent to `email`.
    pub async fn reset_token(&self, email: &str, nth: usize) -> String {
        let link = self.mail(email, NotificationKind::PasswordReset, nth).await.link;
        let query = link.split_once('?').expect("reset link has a query").1;
        form_urlencoded_value(query, "token").expect("reset link carries a token")
    }

    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

fn form_urlencoded_value(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.to_string())
    })
}

/// Spawn a test app on a random port.
pub async fn spawn_app() -> TestApp {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    let config = Config {
        database_url: None,
        app_key: "test-app-key-that-is-long-enough".to_string(),
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        host: addr.ip(),
        port: addr.port(),
        base_url: format!("http://{addr}"),
        reset_token_ttl: Duration::minutes(60),
        verification_ttl: Duration::minutes(60),
        trusted_proxies: vec![],
        log_level: "warn".to_string(),
        smtp: None,
    };

    let mailbox = Arc::new(MemoryTransport::new());
    let (notifier, _) = Notifier::spawn(mailbox.clone());
    let state = AppState::new(config, Stores::in_memory(), notifier);
    let app = userbase::build_app(state.clone());

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        client,
        state,
        mailbox,
    }
}
