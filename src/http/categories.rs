use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{AppState, Envelope, JsonBody, PathParam};
use crate::domain::aggregates::{Category, CategoryUpdate, NestedCategory, NewCategory};
use crate::{Result, SessionContext};

pub async fn list(State(state): State<AppState>) -> Result<Json<Envelope<Vec<NestedCategory>>>> {
    Ok(Envelope::json("Categories fetched", state.catalog.category_tree().await?))
}

pub async fn create(
    State(state): State<AppState>,
    session: SessionContext,
    JsonBody(category): JsonBody<NewCategory>,
) -> Result<(StatusCode, Json<Envelope<Category>>)> {
    session.require_admin()?;
    let category = state.catalog.create_category(category).await?;
    Ok((StatusCode::CREATED, Envelope::json("Category successfully created", category)))
}

pub async fn update(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<Uuid>,
    JsonBody(update): JsonBody<CategoryUpdate>,
) -> Result<Json<Envelope<Category>>> {
    session.require_admin()?;
    Ok(Envelope::json("Category successfully updated", state.catalog.update_category(id, update).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>> {
    session.require_admin()?;
    state.catalog.delete_category(id).await?;
    Ok(Json(json!({ "message": "Category successfully deleted" })))
}
