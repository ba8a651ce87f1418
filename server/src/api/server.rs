//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::middleware::{self, AllowedOrigins};
use super::openapi::{openapi_json, swagger_ui_html};
use super::routes::health::{self, HealthState};
use super::routes::{auth, permissions};
use crate::core::CoreApp;
use crate::core::constants::DEFAULT_BODY_LIMIT;
use crate::data::TransactionalService;
use crate::data::cache::CacheService;
use crate::domain::auth::AuthCore;

/// Assemble every route with the shared layers
pub fn build_router(
    core: &AuthCore,
    database: Arc<TransactionalService>,
    cache: Arc<CacheService>,
    allowed_origins: &AllowedOrigins,
) -> Router {
    let health_routes = Router::new()
        .route("/", get(health::health))
        .with_state(HealthState { database, cache });

    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui_html))
        .route("/docs/", get(swagger_ui_html))
        .nest("/health", health_routes)
        .nest("/auth", auth::routes(core))
        .nest("/permissions", permissions::routes(core))
        .fallback(middleware::handle_404)
        .layer(middleware::cors(allowed_origins))
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server);
        Self {
            app,
            allowed_origins,
        }
    }

    /// Serve until shutdown is triggered. Returns CoreApp for graceful shutdown.
    pub async fn start(self) -> Result<CoreApp> {
        let Self {
            app,
            allowed_origins,
        } = self;

        let shutdown = app.shutdown.clone();
        let host = app.config.server.host.clone();
        let port = app.config.server.port;

        let router = build_router(
            &app.auth,
            app.database.clone(),
            app.cache.clone(),
            &allowed_origins,
        );

        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", host, port))?;
        tracing::info!(address = %listener.local_addr()?, "Listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use axum::response::Response;
    use tower::ServiceExt;

    use crate::core::config::{AuthConfig, ServerConfig};
    use crate::data::types::{NewUser, Role, UserRow};
    use crate::data::{MemoryStore, UserRepository};
    use crate::domain::auth::notify::testing::RecordingNotifier;
    use crate::domain::auth::password::{BcryptHasher, PasswordHasher};

    const PASSWORD: &str = "correct-password";

    struct TestApp {
        router: Router,
        core: AuthCore,
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn test_app() -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let database = Arc::new(TransactionalService::Memory(store.clone()));
        let cache = Arc::new(CacheService::in_memory(1000));
        let notifier = Arc::new(RecordingNotifier::default());
        let config = AuthConfig {
            bcrypt_cost: 4,
            ..Default::default()
        };
        let core = AuthCore::new(&config, &[7u8; 32], &database, cache.clone(), notifier.clone());
        let allowed = AllowedOrigins::new(&ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5390,
            cors_origins: Vec::new(),
        });
        TestApp {
            router: build_router(&core, database, cache, &allowed),
            core,
            store,
            notifier,
        }
    }

    impl TestApp {
        async fn add_user(&self, username: &str, role: Role) -> UserRow {
            let hash = BcryptHasher::new(4).hash(PASSWORD).await.unwrap();
            self.store
                .insert_user(NewUser {
                    username: username.to_string(),
                    email: Some(format!("{}@pharmacy.test", username)),
                    phone: Some(format!("+1555-{}", username)),
                    role,
                    password_hash: Some(hash),
                    is_active: true,
                })
                .await
                .unwrap()
        }

        fn token_for(&self, user: &UserRow) -> String {
            self.core.signer.sign(user).unwrap().token
        }

        async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn bare_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let response = app.send(bare_request(Method::GET, "/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let app = test_app();
        let response = app.send(bare_request(Method::GET, "/nope", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "ROUTE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_openapi_served() {
        let app = test_app();
        let response = app.send(bare_request(Method::GET, "/openapi.json", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["info"]["title"], "RxGate API");
    }

    #[tokio::test]
    async fn test_login_otp_me_logout_flow() {
        let app = test_app();
        app.add_user("staff", Role::PharmacyStaff).await;

        let response = app
            .send(json_request(
                Method::POST,
                "/auth/login",
                None,
                serde_json::json!({"identifier": "staff@pharmacy.test", "password": PASSWORD}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["username"], "staff");

        let code = app.notifier.last_code().unwrap();
        let response = app
            .send(json_request(
                Method::POST,
                "/auth/verify-otp",
                None,
                serde_json::json!({"username": "staff", "code": code}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let tokens = body_json(response).await;
        assert_eq!(tokens["token_type"], "Bearer");
        let token = tokens["access_token"].as_str().unwrap().to_string();

        let response = app.send(bare_request(Method::GET, "/auth/me", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["role"], "PHARMACY_STAFF");

        let response = app
            .send(bare_request(Method::POST, "/auth/logout", Some(&token)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);

        let response = app.send(bare_request(Method::GET, "/auth/me", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "TOKEN_REVOKED");
    }

    #[tokio::test]
    async fn test_wrong_password_is_generic_401() {
        let app = test_app();
        app.add_user("staff", Role::PharmacyStaff).await;

        let response = app
            .send(json_request(
                Method::POST,
                "/auth/login",
                None,
                serde_json::json!({"identifier": "staff", "password": "wrong-password"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_invalid_body_is_400() {
        let app = test_app();
        let response = app
            .send(json_request(
                Method::POST,
                "/auth/login",
                None,
                serde_json::json!({"identifier": "", "password": "x"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_logout_without_token_succeeds() {
        let app = test_app();
        let response = app.send(bare_request(Method::POST, "/auth/logout", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let app = test_app();
        let user = app.add_user("admin", Role::Admin).await;
        let token = app.token_for(&user);

        let response = app
            .send(bare_request(Method::POST, "/auth/refresh-token", None))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .send(bare_request(Method::POST, "/auth/refresh-token", Some(&token)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let fresh = body_json(response).await["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .send(bare_request(Method::POST, "/auth/refresh-token", Some(&token)))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.send(bare_request(Method::GET, "/auth/me", Some(&fresh))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let app = test_app();
        let response = app.send(bare_request(Method::GET, "/permissions/me", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "AUTH_REQUIRED");

        let response = app
            .send(bare_request(Method::GET, "/permissions/me", Some("not-a-jwt")))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn test_check_permission() {
        let app = test_app();
        let user = app.add_user("viewer", Role::Viewer).await;
        let token = app.token_for(&user);

        let response = app
            .send(bare_request(
                Method::GET,
                "/permissions/check/dashboard:read",
                Some(&token),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["permission"], "dashboard:read");
        assert_eq!(body["allowed"], true);

        let response = app
            .send(bare_request(
                Method::GET,
                "/permissions/check/orders:write",
                Some(&token),
            ))
            .await;
        assert_eq!(body_json(response).await["allowed"], false);
    }

    #[tokio::test]
    async fn test_role_update_requires_manage_permission() {
        let app = test_app();
        let admin = app.add_user("admin", Role::Admin).await;
        let root = app.add_user("root", Role::SuperAdmin).await;
        let body = serde_json::json!({"permissions": ["orders:read", "orders:write"]});

        let response = app
            .send(json_request(
                Method::PUT,
                "/permissions/roles/PHARMACIST",
                Some(&app.token_for(&admin)),
                body.clone(),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .send(json_request(
                Method::PUT,
                "/permissions/roles/PHARMACIST",
                Some(&app.token_for(&root)),
                body,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let names: Vec<String> = body_json(response).await["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["orders:read", "orders:write"]);
    }

    #[tokio::test]
    async fn test_unknown_role_is_400() {
        let app = test_app();
        let admin = app.add_user("admin", Role::Admin).await;
        let response = app
            .send(bare_request(
                Method::GET,
                "/permissions/roles/OWNER",
                Some(&app.token_for(&admin)),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_user_override_lifecycle() {
        let app = test_app();
        let root = app.add_user("root", Role::SuperAdmin).await;
        let viewer = app.add_user("viewer", Role::Viewer).await;
        let root_token = app.token_for(&root);
        let uri = format!("/permissions/users/{}/orders:read", viewer.id);

        let response = app
            .send(json_request(
                Method::PUT,
                &uri,
                Some(&root_token),
                serde_json::json!({"granted": true}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .send(bare_request(
                Method::GET,
                "/permissions/check/orders:read",
                Some(&app.token_for(&viewer)),
            ))
            .await;
        assert_eq!(body_json(response).await["allowed"], true);

        let response = app
            .send(bare_request(Method::DELETE, &uri, Some(&root_token)))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .send(bare_request(Method::DELETE, &uri, Some(&root_token)))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
