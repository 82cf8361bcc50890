use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;

use probelog::app::build_router;
use probelog::configs::{Auth, Database, SchemaManager, Storage};
use probelog::models::{Sensor, SensorReading, User};
use probelog::services::{AuthService, Token, TokenService};

pub const TEST_PASSWORD: &str = "password123";

pub struct MockApp {
    pub router: Router,
    pub storage: Arc<Storage>,
    pub auth_service: Arc<AuthService>,
    pub token_service: Arc<TokenService>,
}

impl MockApp {
    pub async fn new() -> Self {
        let storage = Arc::new(
            Storage::new(
                Database {
                    clean_start: true,
                    url: String::from("sqlite::memory:"),
                },
                SchemaManager::default(),
            )
            .await
            .unwrap(),
        );

        let auth_service = Arc::new(AuthService::new());
        let token_service = Arc::new(TokenService::new(Auth {
            secret: String::from("test"),
            expiration: 1000,
        }));

        let router = build_router(
            storage.clone(),
            auth_service.clone(),
            token_service.clone(),
        );

        Self {
            router,
            storage,
            auth_service,
            token_service,
        }
    }

    pub async fn register_user(&self, username: &str) -> (User, Token) {
        let password = self.auth_service.hash(TEST_PASSWORD).unwrap();

        let user: User =
            sqlx::query_as("INSERT INTO users (username, password) VALUES (?, ?) RETURNING *")
                .bind(username)
                .bind(&password)
                .fetch_one(self.storage.get_pool())
                .await
                .unwrap();

        let token = self
            .token_service
            .issue(&user, HashMap::new(), None)
            .unwrap();

        (user, token)
    }

    pub async fn create_sensor(&self, user_id: i64, name: &str) -> Sensor {
        sqlx::query_as("INSERT INTO sensors (user_id, name) VALUES (?, ?) RETURNING *")
            .bind(user_id)
            .bind(name)
            .fetch_one(self.storage.get_pool())
            .await
            .unwrap()
    }

    pub async fn insert_reading(
        &self,
        sensor_id: i64,
        value: Option<f64>,
        datetime: DateTime<Utc>,
    ) -> SensorReading {
        sqlx::query_as(
            "INSERT INTO sensor_readings (sensor_id, value, datetime) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(sensor_id)
        .bind(value)
        .bind(datetime)
        .fetch_one(self.storage.get_pool())
        .await
        .unwrap()
    }

    pub async fn count_sensors(&self) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sensors")
            .fetch_one(self.storage.get_pool())
            .await
            .unwrap();
        count
    }

    pub async fn count_readings(&self) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sensor_readings")
            .fetch_one(self.storage.get_pool())
            .await
            .unwrap();
        count
    }

    pub fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .uri(uri)
            .method(method)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let body = match body {
            Some(value) => Body::from(serde_json::to_string(&value).unwrap()),
            None => Body::empty(),
        };

        builder.body(body).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, body)
    }
}
