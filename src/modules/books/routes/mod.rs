//! HTTP handlers for `/api/books`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;
use shelf_db::DbError;
use shelf_http::AppError;

use super::models::{BookRequest, BookRequestChanges, BookRequestPayload, StatusPayload};
use super::store::BookRequestStore;
use super::validation;

pub type SharedStore = Arc<dyn BookRequestStore>;

/// Build the module router; mounted under `/api/books` by the HTTP facade.
/// Record paths are served with and without a trailing slash.
pub fn router(store: SharedStore) -> Router {
    let record = get(retrieve_request)
        .put(replace_request)
        .patch(update_request)
        .delete(delete_request);
    let status = patch(update_status);

    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route("/health", get(health_check))
        .route("/{id}", record.clone())
        .route("/{id}/", record)
        .route("/{id}/update_status", status.clone())
        .route("/{id}/update_status/", status)
        .with_state(store)
}

async fn health_check() -> &'static str {
    "books module is healthy"
}

/// Non-numeric ids cannot name a record, so they are reported the same way
/// as unknown ones.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found(format!("Book request {raw} not found")))
}

fn not_found_for(id: i64) -> impl FnOnce(DbError) -> AppError {
    move |err| match err {
        DbError::NotFound => AppError::not_found(format!("Book request {id} not found")),
        other => other.into(),
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

async fn list_requests(State(store): State<SharedStore>) -> Result<Json<Vec<BookRequest>>, AppError> {
    let records = store.list().await?;
    Ok(Json(records))
}

async fn create_request(
    State(store): State<SharedStore>,
    payload: Result<Json<BookRequestPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<BookRequest>), AppError> {
    let payload = body(payload)?;
    let new = validation::validate_new(&payload)?;

    let record = store.insert(new).await?;
    tracing::info!(id = record.id, status = %record.status, "book request created");

    Ok((StatusCode::CREATED, Json(record)))
}

async fn retrieve_request(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Json<BookRequest>, AppError> {
    let id = parse_id(&id)?;
    let record = store.get(id).await.map_err(not_found_for(id))?;
    Ok(Json(record))
}

async fn replace_request(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
    payload: Result<Json<BookRequestPayload>, JsonRejection>,
) -> Result<Json<BookRequest>, AppError> {
    let id = parse_id(&id)?;
    store.get(id).await.map_err(not_found_for(id))?;

    let record = validation::validate_new(&body(payload)?)?;
    let updated = store.replace(id, record).await.map_err(not_found_for(id))?;
    tracing::info!(id, "book request replaced");

    Ok(Json(updated))
}

async fn update_request(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
    payload: Result<Json<BookRequestPayload>, JsonRejection>,
) -> Result<Json<BookRequest>, AppError> {
    let id = parse_id(&id)?;
    store.get(id).await.map_err(not_found_for(id))?;

    let changes = validation::validate_changes(&body(payload)?)?;
    let updated = store.merge(id, changes).await.map_err(not_found_for(id))?;
    tracing::info!(id, "book request updated");

    Ok(Json(updated))
}

async fn delete_request(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let id = parse_id(&id)?;
    store.delete(id).await.map_err(not_found_for(id))?;
    tracing::info!(id, "book request deleted");

    Ok((
        StatusCode::NO_CONTENT,
        Json(json!({ "message": "Book request deleted" })),
    ))
}

async fn update_status(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
    payload: Result<Json<StatusPayload>, JsonRejection>,
) -> Result<Json<BookRequest>, AppError> {
    let id = parse_id(&id)?;
    let current = store.get(id).await.map_err(not_found_for(id))?;

    let status = validation::validate_status_change(&body(payload)?)?;
    let updated = store
        .merge(id, BookRequestChanges::status(status))
        .await
        .map_err(not_found_for(id))?;
    tracing::info!(id, from = %current.status, to = %updated.status, "book request status changed");

    Ok(Json(updated))
}
