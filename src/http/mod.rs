//! HTTP surface.

mod auth;
mod cart;
mod categories;
mod error;
mod products;

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::publisher::EventPublisher;
use crate::services::{AuthService, CartService, CatalogService, CheckoutProcessor, StockLedger};
use crate::session::SessionStore;
use crate::store::Store;
use crate::StorefrontError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: SessionStore,
    pub catalog: CatalogService,
    pub ledger: StockLedger,
    pub cart: CartService,
    pub checkout: CheckoutProcessor,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, publisher: EventPublisher) -> Self {
        let sessions = SessionStore::new(config.session_ttl);
        let ledger = StockLedger::new(store.clone());
        Self {
            catalog: CatalogService::new(store.clone()),
            cart: CartService::new(store.clone(), ledger.clone(), publisher.clone()),
            checkout: CheckoutProcessor::new(store.clone(), publisher, config.checkout_mode),
            auth: AuthService::new(store, sessions.clone(), config.allow_admin_signup),
            ledger,
            sessions,
            config: Arc::new(config),
        }
    }
}

/// JSON body whose rejection renders like every other error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(StorefrontError))]
pub struct JsonBody<T>(pub T);

/// Path parameters; a malformed id is a 400 with a JSON body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(StorefrontError))]
pub struct PathParam<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(StorefrontError))]
pub struct QueryParams<T>(pub T);

/// Success envelope: `{ "message": ..., "data": ... }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub message: &'static str,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn json(message: &'static str, data: T) -> Json<Self> {
        Json(Self { message, data })
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::session))
        .route("/products", get(products::list).post(products::create))
        .route("/products/:id", get(products::get).put(products::update).delete(products::remove))
        .route("/products/:id/quantity_check", get(products::quantity_check))
        .route("/products/:id/variants", post(products::add_variant))
        .route("/products/:id/variants/:variant_id", delete(products::delete_variant))
        .route("/categories", get(categories::list).post(categories::create))
        .route("/categories/:id", put(categories::update).delete(categories::remove))
        .route("/cart", get(cart::list))
        .route("/cart/add", post(cart::add))
        .route("/cart/update/:id", put(cart::update))
        .route("/cart/remove/:id", delete(cart::remove))
        .route("/cart/checkout", post(cart::checkout))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

/// Credentialed CORS for one configured origin, permissive otherwise.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let Some(origin) = config.cors_origin.as_deref() else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]),
        Err(_) => {
            tracing::warn!(origin, "CORS_ORIGIN is not a valid header value, falling back to permissive CORS");
            CorsLayer::permissive()
        }
    }
}
