use axum::{
    body::Bytes,
    extract::State,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{AppState, Envelope, JsonBody, PathParam};
use crate::domain::aggregates::CartLine;
use crate::services::{AddToCart, RemoveFromCart, SetQuantity};
use crate::store::CheckoutReceipt;
use crate::{Result, SessionContext, StorefrontError};

pub async fn add(
    State(state): State<AppState>,
    session: SessionContext,
    JsonBody(request): JsonBody<AddToCart>,
) -> Result<Json<Envelope<CartLine>>> {
    let line = state.cart.add(session.user_id, request).await?;
    Ok(Envelope::json("Product successfully added to your cart", line))
}

pub async fn list(State(state): State<AppState>, session: SessionContext) -> Result<Json<Value>> {
    let cart = state.cart.list(session.user_id).await?;
    Ok(Json(json!({
        "message": "Cart successfully fetched",
        "data": cart.lines,
        "subtotal": cart.subtotal,
        "total_quantity": cart.total_quantity,
    })))
}

pub async fn update(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(line_id): PathParam<Uuid>,
    JsonBody(SetQuantity { quantity }): JsonBody<SetQuantity>,
) -> Result<Json<Envelope<Option<CartLine>>>> {
    let line = state.cart.update_quantity(session.user_id, line_id, quantity).await?;
    let message = match line {
        Some(_) => "Cart item quantity updated",
        None => "Product successfully removed from your cart",
    };
    Ok(Envelope::json(message, line))
}

/// The body is optional; without one the whole line goes.
pub async fn remove(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(line_id): PathParam<Uuid>,
    body: Bytes,
) -> Result<Json<Envelope<Option<CartLine>>>> {
    let request: RemoveFromCart = if body.iter().all(u8::is_ascii_whitespace) {
        RemoveFromCart::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| StorefrontError::Validation(format!("Invalid request body: {e}")))?
    };
    let line = state.cart.remove(session.user_id, line_id, request.quantity).await?;
    let message = match line {
        Some(_) => "Product quantity reduced in your cart",
        None => "Product successfully removed from your cart",
    };
    Ok(Envelope::json(message, line))
}

pub async fn checkout(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Json<Envelope<CheckoutReceipt>>> {
    let receipt = state.checkout.checkout(session.user_id).await?;
    Ok(Envelope::json("Checkout completed", receipt))
}
