//! Fulfillment API Library
//!
//! Multi-tenant warehouse fulfillment: sales orders flow through pick lists, packing tasks and
//! shipments, and delivered orders may come back through return authorizations.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    http::HeaderValue,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer};
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub auth: Arc<auth::AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires every service against one connection and event channel.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
    ) -> Self {
        let auth = Arc::new(auth::AuthService::new(
            auth::AuthConfig::from(&config),
            db.clone(),
        ));
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            auth,
            services,
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Authenticated `/api/v1` routes. Role checks happen in the services.
pub fn api_v1_routes() -> Router<AppState> {
    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route(
            "/orders/:id",
            get(handlers::orders::get_order)
                .put(handlers::orders::update_order)
                .delete(handlers::orders::delete_order),
        )
        .route(
            "/orders/:id/pick-list",
            get(handlers::orders::get_order_pick_list),
        );

    let picking = Router::new()
        .route("/pick-lists", get(handlers::pick_lists::list_pick_lists))
        .route("/pick-lists/:id", get(handlers::pick_lists::get_pick_list))
        .route(
            "/pick-lists/:id/assign",
            post(handlers::pick_lists::assign_picker),
        )
        .route(
            "/pick-lists/:id/start",
            post(handlers::pick_lists::start_picking),
        )
        .route(
            "/pick-lists/:id/complete",
            post(handlers::pick_lists::complete_picking),
        )
        .route(
            "/pick-list-items/:id/pick",
            post(handlers::pick_lists::record_pick),
        );

    let packing = Router::new()
        .route("/packing-tasks", get(handlers::packing::list_packing_tasks))
        .route(
            "/packing-tasks/:id",
            get(handlers::packing::get_packing_task),
        )
        .route(
            "/packing-tasks/:id/assign",
            post(handlers::packing::assign_packer),
        )
        .route(
            "/packing-tasks/:id/start",
            post(handlers::packing::start_packing),
        )
        .route(
            "/packing-tasks/:id/complete",
            post(handlers::packing::complete_packing),
        );

    let shipments = Router::new()
        .route(
            "/shipments",
            get(handlers::shipments::list_shipments).post(handlers::shipments::create_shipment),
        )
        .route(
            "/shipments/:id",
            get(handlers::shipments::get_shipment).put(handlers::shipments::update_shipment),
        )
        .route(
            "/shipments/:id/deliver",
            post(handlers::shipments::mark_delivered),
        );

    let returns = Router::new()
        .route(
            "/returns",
            get(handlers::returns::list_returns).post(handlers::returns::create_return),
        )
        .route("/returns/:id", get(handlers::returns::get_return))
        .route(
            "/returns/:id/awaiting",
            post(handlers::returns::mark_awaiting_return),
        )
        .route("/returns/:id/receive", post(handlers::returns::receive_item))
        .route(
            "/returns/:id/inspection",
            post(handlers::returns::start_inspection),
        )
        .route(
            "/returns/:id/inspect",
            post(handlers::returns::inspect_return),
        )
        .route(
            "/returns/:id/refund",
            post(handlers::returns::process_refund),
        )
        .route("/returns/:id/close", post(handlers::returns::close_return));

    let stock = Router::new()
        .route(
            "/stock/:product_id/:warehouse_id",
            get(handlers::stock::get_stock_level),
        )
        .route("/stock/adjust", post(handlers::stock::adjust_stock));

    let users = Router::new().route(
        "/users",
        get(handlers::users::list_users).post(handlers::users::create_user),
    );

    Router::new()
        .route("/auth/me", get(handlers::auth::whoami))
        .merge(orders)
        .merge(picking)
        .merge(packing)
        .merge(shipments)
        .merge(returns)
        .merge(stock)
        .merge(users)
}

/// CORS from `cors_allowed_origins`; permissive in development when none are configured.
pub fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    } else if config.is_development() {
        CorsLayer::permissive()
    } else {
        ::tracing::warn!("no CORS origins configured; cross-origin requests will be rejected");
        CorsLayer::new()
    }
}

/// The complete HTTP application.
pub fn build_router(state: AppState) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.auth.clone(), auth::auth_middleware);
    let cors = cors_layer(&state.config);
    let health_state = health::HealthState::new(state.db.clone());

    Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .nest("/api/v1", api_v1_routes().route_layer(auth_layer))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/metrics/json", get(metrics::metrics_json_handler))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .merge(health::health_routes(health_state))
        .with_state(state)
        .layer(middleware::from_fn(metrics::http_metrics_middleware))
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(middleware::from_fn(crate::tracing::request_id_middleware))
}
