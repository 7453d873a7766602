//! Route definitions for the Warehouse Stock Management Platform

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::actor_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - stock positions and ledger
        .nest("/stock", stock_routes())
        // Protected routes - reorder thresholds
        .nest("/thresholds", threshold_routes())
        // Protected routes - shipment requests
        .nest("/shipments", shipment_routes())
        // Protected routes - restock requests
        .nest("/restocks", restock_routes())
        // Protected routes - purchase orders
        .nest("/purchase-orders", purchase_order_routes())
        // Protected routes - production plans
        .nest("/production-plans", production_routes())
        // Protected routes - sales orders
        .nest("/sales-orders", sales_order_routes())
}

/// Stock position and ledger routes (protected)
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/positions", get(handlers::list_positions))
        .route(
            "/positions/:location_id/:sku_id",
            get(handlers::get_position),
        )
        .route("/ledger", get(handlers::list_ledger_entries))
        .route("/adjustments", post(handlers::record_adjustment))
        .route_layer(middleware::from_fn(actor_middleware))
}

/// Reorder threshold routes (protected)
fn threshold_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_thresholds).put(handlers::set_threshold),
        )
        .route("/low-stock", get(handlers::get_low_stock))
        .route_layer(middleware::from_fn(actor_middleware))
}

/// Shipment request routes (protected)
fn shipment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_shipments).post(handlers::create_shipment),
        )
        .route(
            "/:shipment_id",
            get(handlers::get_shipment).delete(handlers::delete_shipment),
        )
        .route(
            "/:shipment_id/transition",
            post(handlers::transition_shipment),
        )
        .route_layer(middleware::from_fn(actor_middleware))
}

/// Restock request routes (protected)
fn restock_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_restocks).post(handlers::create_restock),
        )
        .route(
            "/:restock_id",
            get(handlers::get_restock).delete(handlers::delete_restock),
        )
        .route(
            "/:restock_id/transition",
            post(handlers::transition_restock),
        )
        .route_layer(middleware::from_fn(actor_middleware))
}

/// Purchase order routes (protected)
fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route(
            "/:order_id",
            get(handlers::get_purchase_order).delete(handlers::delete_purchase_order),
        )
        .route(
            "/:order_id/transition",
            post(handlers::transition_purchase_order),
        )
        .route("/:order_id/receive", post(handlers::receive_purchase_order))
        .route_layer(middleware::from_fn(actor_middleware))
}

/// Production plan routes (protected)
fn production_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_production_plans).post(handlers::create_production_plan),
        )
        .route(
            "/:plan_id",
            get(handlers::get_production_plan).delete(handlers::delete_production_plan),
        )
        .route(
            "/:plan_id/transition",
            post(handlers::transition_production_plan),
        )
        .route_layer(middleware::from_fn(actor_middleware))
}

/// Sales order routes (protected)
fn sales_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_sales_orders).post(handlers::create_sales_order),
        )
        .route(
            "/:order_id",
            get(handlers::get_sales_order).delete(handlers::delete_sales_order),
        )
        .route("/:order_id/records", get(handlers::get_sale_records))
        .route(
            "/:order_id/transition",
            post(handlers::transition_sales_order),
        )
        .route_layer(middleware::from_fn(actor_middleware))
}
