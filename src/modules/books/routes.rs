use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use shelf_authz::{require_identity, Gatekeeper, Identity};
use shelf_http::AppError;

use super::{
    models::{Book, BookPatch, NewBook},
    repository::{BookRepository, DeleteMode},
};
use crate::utils::{blocking, json_body, path_param, query_params};

#[derive(Clone)]
pub struct BooksState {
    pub repo: BookRepository,
    pub gate: Gatekeeper,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub mode: DeleteMode,
}

/// Every book route requires a verified identity.
pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/search", get(search_books))
        .route(
            "/{id}",
            get(get_book)
                .put(update_book)
                .patch(update_book)
                .delete(delete_book),
        )
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            require_identity,
        ))
        .with_state(state)
}

async fn list_books(State(state): State<BooksState>) -> Result<Json<Vec<Book>>, AppError> {
    let books = blocking(move || state.repo.list()).await?;
    Ok(Json(books))
}

async fn search_books(
    State(state): State<BooksState>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<Book>>, AppError> {
    let SearchParams { name } = query_params(query)?;
    let books = blocking(move || state.repo.search(&name)).await?;
    Ok(Json(books))
}

async fn get_book(
    State(state): State<BooksState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Book>, AppError> {
    let id = path_param(id)?;
    let book = blocking(move || state.repo.get(id)).await?;
    Ok(Json(book))
}

async fn create_book(
    State(state): State<BooksState>,
    identity: Identity,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let new = json_body(payload)?;
    let book = blocking(move || state.repo.create(new)).await?;

    tracing::debug!(book_id = book.id, user_id = identity.user_id, "create_book handled");
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(state): State<BooksState>,
    identity: Identity,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<BookPatch>, JsonRejection>,
) -> Result<Json<Book>, AppError> {
    let id = path_param(id)?;
    let patch = json_body(payload)?;
    let book = blocking(move || state.repo.update(id, patch)).await?;

    tracing::debug!(book_id = id, user_id = identity.user_id, "update_book handled");
    Ok(Json(book))
}

async fn delete_book(
    State(state): State<BooksState>,
    identity: Identity,
    id: Result<Path<i64>, PathRejection>,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<StatusCode, AppError> {
    let id = path_param(id)?;
    let DeleteParams { mode } = query_params(params)?;
    blocking(move || state.repo.delete(id, mode)).await?;

    tracing::debug!(book_id = id, user_id = identity.user_id, ?mode, "delete_book handled");
    Ok(StatusCode::NO_CONTENT)
}
