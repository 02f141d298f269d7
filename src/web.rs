use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::SignedCookieJar;
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::handlers::MessageHandler;
use crate::services::{AuthService, Database};

pub mod api;
pub mod session;

pub use session::{CurrentUser, SessionSigner};

const STATIC_DIR: &str = "static";

const LOGIN_PAGE: &str = include_str!("../templates/login.html");
const SIGNUP_PAGE: &str = include_str!("../templates/signup.html");
const CHAT_PAGE: &str = include_str!("../templates/index.html");
const HELP_PAGE: &str = include_str!("../templates/help.html");
const NOT_FOUND_PAGE: &str = include_str!("../templates/404.html");
const SERVER_ERROR_PAGE: &str = include_str!("../templates/500.html");

pub struct AppState {
    pub db: Arc<Database>,
    pub auth: AuthService,
    pub message_handler: MessageHandler,
    pub sessions: SessionSigner,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login_page).post(api::login))
        .route("/signup", get(signup_page).post(api::signup))
        .route("/logout", get(logout))
        .route("/chat", get(chat_page))
        .route("/help", get(help_page))
        .route("/api/chat", post(api::chat))
        .route("/api/history", get(api::history))
        .route("/api/clear-history", post(api::clear_history))
        .route("/api/health-tool", post(api::health_tool))
        .route("/api/user-stats", get(api::user_stats))
        .route("/health", get(health_check))
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .fallback(not_found)
        .with_state(state)
}

/// Unexpected failure inside a handler; logged and rendered as the 500 page
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        log::error!("❌ Request failed: {:#}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, Html(SERVER_ERROR_PAGE)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Redirect {
    if state.sessions.read(&state.sessions.jar(&headers)).is_some() {
        Redirect::to("/chat")
    } else {
        Redirect::to("/login")
    }
}

async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

async fn signup_page() -> Html<&'static str> {
    Html(SIGNUP_PAGE)
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> (SignedCookieJar, Redirect) {
    let jar = state.sessions.jar(&headers);
    if let Some(session) = state.sessions.read(&jar) {
        log::info!("👋 User logged out: {}", session.username);
    }
    (jar.remove(state.sessions.logout_cookie()), Redirect::to("/login"))
}

async fn chat_page(user: CurrentUser) -> Html<String> {
    Html(CHAT_PAGE.replace("{{username}}", &escape_html(&user.username)))
}

async fn help_page(_user: CurrentUser) -> Html<&'static str> {
    Html(HELP_PAGE)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> (StatusCode, Html<&'static str>) {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::ChatbotEngine;
    use crate::services::ApiService;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let config = Config::default();
        let db = Arc::new(Database::in_memory(config.max_chat_history).await.unwrap());
        let state = Arc::new(AppState {
            db: db.clone(),
            auth: AuthService::new(db.clone()),
            message_handler: MessageHandler::new(
                db,
                Arc::new(ChatbotEngine::default()),
                Arc::new(ApiService::new(&config)),
            ),
            sessions: SessionSigner::new("test-secret", false),
        });
        create_router(state)
    }

    async fn send(
        app: &Router,
        method: &str,
        path: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(path);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    /// `name=value` part of the Set-Cookie header
    fn session_cookie(response: &Response) -> String {
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn signup(app: &Router, username: &str) -> String {
        let response = send(
            app,
            "POST",
            "/signup",
            None,
            Some(json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "secret123"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["redirect"], "/chat");
        cookie
    }

    #[tokio::test]
    async fn test_health_and_not_found() {
        let app = test_app().await;

        let response = send(&app, "GET", "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");

        let response = send(&app, "GET", "/does-not-exist", None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("404"));
    }

    #[tokio::test]
    async fn test_protected_routes_redirect_to_login() {
        let app = test_app().await;

        for path in ["/", "/chat", "/help", "/api/history", "/api/user-stats"] {
            let response = send(&app, "GET", path, None, None).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
            assert_eq!(location(&response), "/login");
        }

        let response = send(&app, "GET", "/chat", Some("session=forged.value"), None).await;
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_cookie_from_another_key_or_edited_is_rejected() {
        let app = test_app().await;
        let cookie = signup(&app, "erin").await;

        let response = send(&app, "GET", "/chat", Some(&cookie), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut edited = cookie.clone();
        let last = edited.pop().unwrap();
        edited.push(if last == 'A' { 'B' } else { 'A' });
        let response = send(&app, "GET", "/chat", Some(&edited), None).await;
        assert_eq!(location(&response), "/login");

        let other = SessionSigner::new("other-secret", false);
        let foreign = other
            .jar(&HeaderMap::new())
            .add(other.login_cookie(1, "erin").unwrap())
            .into_response();
        let foreign = session_cookie(&foreign);
        let response = send(&app, "GET", "/chat", Some(&foreign), None).await;
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_signup_login_and_chat_page() {
        let app = test_app().await;
        let cookie = signup(&app, "Alice").await;

        let response = send(&app, "GET", "/", Some(&cookie), None).await;
        assert_eq!(location(&response), "/chat");

        let response = send(&app, "GET", "/chat", Some(&cookie), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Hi, alice!"));

        let response = send(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({"username": "ALICE", "password": "secret123"})),
        )
        .await;
        assert!(response.headers().contains_key(header::SET_COOKIE));
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Login successful! 🎉");
    }

    #[tokio::test]
    async fn test_login_rejections() {
        let app = test_app().await;
        signup(&app, "alice").await;

        let response = send(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({"username": "alice", "password": "nope-nope"})),
        )
        .await;
        assert!(!response.headers().contains_key(header::SET_COOKIE));
        let body = body_json(response).await;
        assert_eq!(body, json!({"success": false, "message": "Invalid username or password"}));

        let response = send(&app, "POST", "/login", None, Some(json!({"username": "alice"}))).await;
        let body = body_json(response).await;
        assert_eq!(body["message"], "Please provide both username and password");

        let response = send(
            &app,
            "POST",
            "/signup",
            None,
            Some(json!({"username": "alice", "email": "x@example.com", "password": "secret123"})),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["message"], "Username or email already exists");
    }

    #[tokio::test]
    async fn test_chat_history_stats_and_clear() {
        let app = test_app().await;
        let cookie = signup(&app, "bob").await;

        let response = send(&app, "POST", "/api/chat", Some(&cookie), Some(json!({"message": "  "}))).await;
        assert_eq!(body_json(response).await["reply"], "Please say something! 😊");

        let response = send(
            &app,
            "POST",
            "/api/chat",
            Some(&cookie),
            Some(json!({"message": "My weight is 70 kg and height is 175 cm, bmi?"})),
        )
        .await;
        let reply = body_json(response).await["reply"].as_str().unwrap().to_string();
        assert!(reply.contains("22.9"));

        let response = send(&app, "GET", "/api/history", Some(&cookie), None).await;
        let history = body_json(response).await["history"].as_array().unwrap().clone();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["is_user_message"], true);
        assert_eq!(history[1]["message"], reply.as_str());

        let response = send(&app, "GET", "/api/user-stats", Some(&cookie), None).await;
        let body = body_json(response).await;
        assert_eq!(body["user"]["username"], "bob");
        assert!(body["user"].get("password_hash").is_none());
        assert_eq!(body["stats"]["total_messages"], 2);
        assert_eq!(body["stats"]["user_messages"], 1);

        let response = send(&app, "POST", "/api/clear-history", Some(&cookie), None).await;
        assert_eq!(
            body_json(response).await,
            json!({"success": true, "message": "Chat history cleared! 🗑️"})
        );

        let response = send(&app, "GET", "/api/history", Some(&cookie), None).await;
        assert_eq!(body_json(response).await["history"], json!([]));
    }

    #[tokio::test]
    async fn test_health_tool_endpoint() {
        let app = test_app().await;
        let cookie = signup(&app, "carol").await;

        let response = send(
            &app,
            "POST",
            "/api/health-tool",
            Some(&cookie),
            Some(json!({"tool": "bmi", "weight": "70", "height": 175})),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["bmi"], 22.9);
        assert_eq!(body["category"], "Normal weight");

        let response = send(
            &app,
            "POST",
            "/api/health-tool",
            Some(&cookie),
            Some(json!({"tool": "teleport"})),
        )
        .await;
        assert_eq!(body_json(response).await, json!({"error": "Invalid tool type"}));
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let app = test_app().await;
        let cookie = signup(&app, "dave").await;

        let response = send(&app, "GET", "/logout", Some(&cookie), None).await;
        assert_eq!(location(&response), "/login");
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("session=;"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#x27;Jerry&#x27;&lt;/b&gt;"
        );
    }
}
