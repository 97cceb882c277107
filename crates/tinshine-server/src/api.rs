use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use tinshine_shared::constants::API_PREFIX;
use tinshine_shared::models::DeleteResponse;
use tinshine_shared::{Collection, Fields, Record, SyncPayload, VersionInfo};

use crate::config::ServerConfig;
use crate::error::{noun, ServerError};
use crate::record_store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let api = Router::new()
        .route("/version", get(version))
        .route("/sync/all", get(sync_all))
        .route("/health", get(health_check))
        .merge(collection_routes(Collection::Products))
        .merge(collection_routes(Collection::BlogPosts));

    Router::new()
        .nest(API_PREFIX, api)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CRUD routes for one served collection, mounted at its REST path.
fn collection_routes(collection: Collection) -> Router<AppState> {
    let Some(path) = collection.endpoint() else {
        return Router::new();
    };

    Router::new()
        .route(
            path,
            get(move |state: State<AppState>| list(state, collection))
                .post(move |state: State<AppState>, body: Json<Fields>| {
                    create(state, collection, body)
                }),
        )
        .route(
            &format!("{path}/:id"),
            get(move |state: State<AppState>, id: Path<i64>| fetch(state, collection, id))
                .put(
                    move |state: State<AppState>, id: Path<i64>, body: Json<Fields>| {
                        update(state, collection, id, body)
                    },
                )
                .delete(move |state: State<AppState>, id: Path<i64>| {
                    remove(state, collection, id)
                }),
        )
}

async fn list(
    State(state): State<AppState>,
    collection: Collection,
) -> Result<Json<Vec<Record>>, ServerError> {
    Ok(Json(state.store.list(collection).await?))
}

async fn fetch(
    State(state): State<AppState>,
    collection: Collection,
    Path(id): Path<i64>,
) -> Result<Json<Record>, ServerError> {
    Ok(Json(state.store.get(collection, id).await?))
}

async fn create(
    State(state): State<AppState>,
    collection: Collection,
    Json(fields): Json<Fields>,
) -> Result<(StatusCode, Json<Record>), ServerError> {
    let record = state.store.create(collection, fields).await?;
    info!(collection = %collection, id = record.id, "Record created via API");
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update(
    State(state): State<AppState>,
    collection: Collection,
    Path(id): Path<i64>,
    Json(patch): Json<Fields>,
) -> Result<Json<Record>, ServerError> {
    Ok(Json(state.store.update(collection, id, patch).await?))
}

async fn remove(
    State(state): State<AppState>,
    collection: Collection,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ServerError> {
    if !state.store.delete(collection, id).await? {
        return Err(ServerError::NotFound { collection, id });
    }
    info!(collection = %collection, id, "Record deleted via API");
    Ok(Json(DeleteResponse {
        success: true,
        message: format!("{} deleted", noun(&collection)),
    }))
}

async fn version(State(state): State<AppState>) -> Result<Json<VersionInfo>, ServerError> {
    Ok(Json(state.store.version().await?))
}

/// Full payload for clients. A failure still answers with a usable default
/// body so offline-first clients can render something.
async fn sync_all(State(state): State<AppState>) -> Response {
    match state.store.sync_all().await {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => {
            error!(error = %e, "Sync payload unavailable, serving fallback");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(SyncPayload::fallback())).into_response()
        }
    }
}

async fn health_check(State(state): State<AppState>) -> Response {
    match state.store.health().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            error!(error = %e, "Health check failed");
            let body = serde_json::json!({
                "status": "DOWN",
                "timestamp": Utc::now(),
                "error": e.to_string(),
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
