use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::configs::{SchemaManager, Settings, Storage};
use crate::handles::*;
use crate::middlewares::{auth, TokenState};
use crate::services::{AuthService, TokenService};

pub async fn create_app(settings: &Arc<Settings>) -> Router {
    let storage = Arc::new(
        Storage::new(settings.database.clone(), SchemaManager::default())
            .await
            .unwrap(),
    );

    let auth_service = Arc::new(AuthService::new());
    let token_service = Arc::new(TokenService::new(settings.auth.clone()));

    build_router(storage, auth_service, token_service)
}

pub fn build_router(
    storage: Arc<Storage>,
    auth_service: Arc<AuthService>,
    token_service: Arc<TokenService>,
) -> Router {
    let token_state = TokenState {
        token_service: token_service.clone(),
        storage: storage.clone(),
    };

    let users = Router::new()
        .route(
            "/account",
            delete(delete_account)
                .route_layer(middleware::from_fn_with_state(token_state.clone(), auth)),
        )
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(UserState {
            auth_service,
            token_service,
            storage: storage.clone(),
        });

    let readings = Router::new()
        .route("/", get(get_readings).post(create_readings))
        .route("/:reading_id", put(update_reading).delete(delete_reading))
        .route_layer(middleware::from_fn_with_state(token_state.clone(), auth))
        .route("/columns", get(reading_columns))
        .with_state(ReadingState {
            storage: storage.clone(),
        });

    let sensors = Router::new()
        .route("/", get(get_sensors).post(create_sensor))
        .route("/:sensor_id", put(update_sensor).delete(delete_sensor))
        .route_layer(middleware::from_fn_with_state(token_state.clone(), auth))
        .route("/columns", get(sensor_columns))
        .with_state(SensorState { storage })
        .nest("/reading", readings);

    Router::new()
        .nest("/api/auth", users)
        .nest("/api/sensor", sensors)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
