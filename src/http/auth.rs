use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::{AppState, Envelope, JsonBody};
use crate::domain::aggregates::{Registration, User};
use crate::services::Credentials;
use crate::session::{expired_cookie, session_cookie};
use crate::{Result, SessionContext};

pub async fn register(
    State(state): State<AppState>,
    JsonBody(registration): JsonBody<Registration>,
) -> Result<(StatusCode, Json<Envelope<User>>)> {
    let user = state.auth.register(registration).await?;
    Ok((StatusCode::CREATED, Envelope::json("User registered successfully", user)))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<impl IntoResponse> {
    let session = state.auth.login(credentials).await?;
    let cookie = session_cookie(&state.config.session_cookie, session.session_id, state.sessions.ttl());
    Ok(([(header::SET_COOKIE, cookie)], Envelope::json("Login successful", session)))
}

pub async fn logout(State(state): State<AppState>, session: SessionContext) -> impl IntoResponse {
    state.auth.logout(session.session_id);
    tracing::info!(user_id = %session.user_id, "session ended");
    (
        [(header::SET_COOKIE, expired_cookie(&state.config.session_cookie))],
        Json(json!({ "message": "Logged out" })),
    )
}

pub async fn session(session: SessionContext) -> Json<Envelope<SessionContext>> {
    Envelope::json("Session active", session)
}
