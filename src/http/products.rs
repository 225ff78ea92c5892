use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{AppState, Envelope, JsonBody, PathParam, QueryParams};
use crate::domain::aggregates::{NewProduct, NewVariant, Product, ProductPatch, ProductVariant};
use crate::{Result, SessionContext};

#[derive(Debug, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct QuantityCheck {
    pub variant_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<ProductFilter>,
) -> Result<Json<Envelope<Vec<Product>>>> {
    let products = state.catalog.list_products(filter.category_id).await?;
    Ok(Envelope::json("Products fetched", products))
}

pub async fn get(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Envelope<Product>>> {
    Ok(Envelope::json("Product found", state.catalog.get_product(id).await?))
}

pub async fn quantity_check(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
    QueryParams(query): QueryParams<QuantityCheck>,
) -> Result<Json<Value>> {
    let available = state.ledger.available(id, query.variant_id).await?;
    Ok(Json(json!({
        "message": "Quantity check successful",
        "available_quantity": available,
    })))
}

pub async fn create(
    State(state): State<AppState>,
    session: SessionContext,
    JsonBody(product): JsonBody<NewProduct>,
) -> Result<(StatusCode, Json<Envelope<Product>>)> {
    session.require_admin()?;
    let product = state.catalog.create_product(product).await?;
    Ok((StatusCode::CREATED, Envelope::json("Product created successfully", product)))
}

pub async fn update(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<Uuid>,
    JsonBody(patch): JsonBody<ProductPatch>,
) -> Result<Json<Envelope<Product>>> {
    session.require_admin()?;
    Ok(Envelope::json("Product successfully updated", state.catalog.update_product(id, patch).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>> {
    session.require_admin()?;
    state.catalog.delete_product(id).await?;
    Ok(Json(json!({ "message": "Product successfully deleted" })))
}

pub async fn add_variant(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<Uuid>,
    JsonBody(variant): JsonBody<NewVariant>,
) -> Result<(StatusCode, Json<Envelope<ProductVariant>>)> {
    session.require_admin()?;
    let variant = state.catalog.add_variant(id, variant).await?;
    Ok((StatusCode::CREATED, Envelope::json("Variant created successfully", variant)))
}

pub async fn delete_variant(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam((id, variant_id)): PathParam<(Uuid, Uuid)>,
) -> Result<Json<Value>> {
    session.require_admin()?;
    state.catalog.delete_variant(id, variant_id).await?;
    Ok(Json(json!({ "message": "Variant successfully deleted" })))
}
