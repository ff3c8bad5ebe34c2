use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, StatusCode},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use shelf_authz::{require_identity, Gatekeeper, Identity};
use shelf_http::AppError;

use super::{
    models::{Credentials, LoginResponse, User},
    store::{CredentialError, CredentialStore},
};
use crate::utils::{blocking, json_body};

#[derive(Clone)]
pub struct UsersState {
    pub store: CredentialStore,
    pub gate: Gatekeeper,
}

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            require_identity,
        ))
        // Registered after the layer so they stay public.
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .with_state(state)
}

async fn register(
    State(state): State<UsersState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let credentials = json_body(payload)?;
    let user = blocking(move || {
        state
            .store
            .register(&credentials.email, &credentials.password)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<UsersState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let credentials = json_body(payload)?;
    let store = state.store.clone();
    let identity = blocking(move || store.authenticate(&credentials.email, &credentials.password))
        .await?;

    let token = state.gate.tokens().issue(identity.user_id)?;
    let cookie = state.gate.session_cookie(&token);

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(LoginResponse {
            message: "Login successful",
            token,
        }),
    ))
}

/// Tokens are stateless; logging out only clears the browser cookie.
async fn logout(State(state): State<UsersState>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, state.gate.expired_cookie())]),
    )
}

async fn me(
    State(state): State<UsersState>,
    identity: Identity,
) -> Result<Json<User>, AppError> {
    let user = blocking(move || {
        state.store.find_by_id(identity.user_id).map_err(|e| match e {
            // Token outlived its account.
            CredentialError::NotFound => AppError::unauthorized("authentication required"),
            other => other.into(),
        })
    })
    .await?;

    Ok(Json(user))
}
