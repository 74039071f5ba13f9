//! Common Test Utilities
//!
//! In-process application over in-memory stores, token minting and request helpers.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use dm_server::config::{
    ChatSettings, CorsSettings, DatabaseSettings, JwtSettings, RedisSettings, ServerSettings,
    Settings, WebSocketSettings,
};
use dm_server::domain::UserProfile;
use dm_server::infrastructure::repositories::{
    InMemoryConversationRepository, InMemoryMessageRepository, InMemoryUserDirectory,
};
use dm_server::presentation::middleware::Claims;
use dm_server::startup::{build_router, AppState};

pub const TEST_SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://unused".into(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: 1,
            run_migrations: false,
        },
        redis: RedisSettings {
            url: "redis://unused".into(),
            profile_ttl_secs: 60,
            key_prefix: None,
        },
        jwt: JwtSettings {
            secret: TEST_SECRET.into(),
            issuer: None,
            audience: None,
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        websocket: WebSocketSettings {
            max_message_size: 65536,
            max_frame_size: 16384,
            heartbeat_interval_ms: 45000,
        },
        chat: ChatSettings {
            rest_push_fanout: false,
        },
        environment: "test".into(),
    }
}

/// Test application over in-memory stores
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub directory: Arc<InMemoryUserDirectory>,
    pub messages: Arc<InMemoryMessageRepository>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let state = AppState::new(
            settings,
            Arc::new(InMemoryConversationRepository::new()),
            messages.clone(),
            directory.clone(),
        );

        Self {
            router: build_router(state.clone()),
            state,
            directory,
            messages,
        }
    }

    /// Register a user in the directory and return its id and a valid token.
    pub fn user(&self, user_name: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        self.directory.insert(UserProfile {
            id,
            user_name: user_name.into(),
            first_name: None,
            last_name: None,
            profile_picture_url: None,
        });
        (id, token_for(id))
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }
}

/// Sign a token the way the account service would.
pub fn token_for(user_id: Uuid) -> String {
    sign(&user_id.to_string(), 3600)
}

pub fn sign(sub: &str, expires_in: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: sub.into(),
        exp: now + expires_in,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}
