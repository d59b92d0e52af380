#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use primaria::api::AppState;
use primaria::config::Config;
use primaria::db::NewUser;
use primaria::domain::Role;
use primaria::services::CredentialHasher;
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "parola-sigura-1";

pub fn test_config() -> Config {
    let db_path = std::env::temp_dir().join(format!("primaria-it-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.server.secure_cookies = false;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.security.auth_throttle.failure_delay_ms = 0;
    config.observability.metrics_enabled = false;
    config
}

pub async fn spawn_app() -> (Router, Arc<AppState>) {
    let state = primaria::api::create_app_state_from_config(test_config(), None)
        .await
        .expect("Failed to create app state");
    (primaria::api::router(state.clone()), state)
}

pub async fn seed_user(state: &AppState, username: &str, role: Role) -> i32 {
    let hasher = CredentialHasher::new(&state.config.security).unwrap();
    let password_hash = hasher.hash(PASSWORD).await.unwrap();

    state
        .store
        .create_user(NewUser {
            username: username.to_string(),
            full_name: format!("{username} test"),
            role,
            password_hash,
        })
        .await
        .unwrap()
        .id
}

pub fn form_body(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Pulls the hidden CSRF field out of the rendered login form.
pub fn csrf_from_html(html: &str) -> String {
    let marker = "name=\"csrf_token\" value=\"";
    let start = html.find(marker).expect("no csrf field in page") + marker.len();
    let end = html[start..].find('"').unwrap() + start;
    html[start..end].to_string()
}

/// A browser stand-in that keeps the session cookie between requests.
pub struct Client {
    pub app: Router,
    pub cookie: Option<String>,
}

impl Client {
    pub fn new(app: &Router) -> Self {
        Self {
            app: app.clone(),
            cookie: None,
        }
    }

    async fn send(&mut self, mut request: Request<Body>) -> Response {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.app.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }

        response
    }

    pub async fn get(&mut self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form_body(fields)))
                .unwrap(),
        )
        .await
    }

    /// Loads the login form and returns its CSRF token.
    pub async fn open_login_page(&mut self) -> String {
        let response = self.get("/login").await;
        assert_eq!(response.status(), StatusCode::OK);
        csrf_from_html(&body_string(response).await)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Response {
        let token = self.open_login_page().await;
        self.post_form(
            "/login",
            &[
                ("username", username),
                ("password", password),
                ("csrf_token", &token),
            ],
        )
        .await
    }

    /// Logs in and returns the post-login CSRF token from the dashboard.
    pub async fn login_ok(&mut self, username: &str) -> String {
        let response = self.login(username, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin");

        let dashboard = self.get("/admin").await;
        assert_eq!(dashboard.status(), StatusCode::OK);
        body_json(dashboard).await["data"]["csrf_token"]
            .as_str()
            .unwrap()
            .to_string()
    }
}
