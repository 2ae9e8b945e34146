use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use libroteca_core::{models::Book, AppError};
use serde_json::json;

use crate::error::HttpAppError;
use crate::services::with_call_timeout;
use crate::state::AppState;

/// Lists every non-blacklisted book together with its enrichment detail.
pub async fn list_books(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let books = state.db.books.list_with_details().await?;
    let count = books.len();
    Ok(Json(json!({
        "books": books,
        "count": count,
    })))
}

/// Resolves a fresh download link at the origin and counts the download.
/// The counter only moves once a link was actually handed out.
pub async fn download_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let book = state
        .db
        .books
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {id} not found")))?;

    let url = resolve_download_url(&state, &book).await?;
    let downloads = state.db.books.increment_downloads(id).await?;

    Ok(Json(json!({
        "book_id": id,
        "download_url": url,
        "downloads": downloads,
    })))
}

async fn resolve_download_url(state: &AppState, book: &Book) -> Result<String, HttpAppError> {
    let uploader = state
        .db
        .uploaders
        .find_by_id(&book.uploader_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Uploader {} not found", book.uploader_id)))?;

    let source = state.source_for(uploader.source).ok_or_else(|| {
        AppError::Config(format!(
            "No source adapter registered for {}",
            uploader.source
        ))
    })?;

    let resolved = with_call_timeout(
        state.config.call_timeout(),
        "resolving download url",
        source.resolve_download_url(book),
    )
    .await?;

    resolved
        .ok_or_else(|| AppError::NotFound(format!("Source has no file for book {}", book.id)).into())
}
