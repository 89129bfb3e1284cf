//! Route definitions for the Trade Ledger API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Catalog
        .nest("/items", item_routes())
        .nest("/warehouses", warehouse_routes())
        .nest("/manufacturers", manufacturer_routes())
        .nest("/buyers", buyer_routes())
        .nest("/transporters", transporter_routes())
        .nest("/prices", price_routes())
        // Order/purchase pipeline
        .nest("/orders", order_routes())
        .nest("/purchases", purchase_routes())
        // Booking/sale pipeline
        .nest("/bookings", booking_routes())
        .nest("/sales", sale_routes())
        .nest("/total-sales", total_sale_routes())
        .nest("/credit-notes", credit_note_routes())
        // Read-only views
        .route("/item-history", get(handlers::list_item_history))
        .route("/reminders", get(handlers::list_reminders))
}

/// Item catalog routes
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route("/:item_id", get(handlers::get_item))
}

/// Warehouse routes
fn warehouse_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_warehouses).post(handlers::create_warehouse),
        )
        .route("/:warehouse_id", get(handlers::get_warehouse))
        .route(
            "/:warehouse_id/items/:item_id",
            get(handlers::get_pool_snapshot),
        )
}

fn manufacturer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_manufacturers).post(handlers::create_manufacturer),
        )
        .route("/:id", get(handlers::get_manufacturer))
}

fn buyer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_buyers).post(handlers::create_buyer))
        .route("/:id", get(handlers::get_buyer))
}

fn transporter_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_transporters).post(handlers::create_transporter),
        )
        .route("/:id", get(handlers::get_transporter))
}

/// Price book routes
fn price_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_prices).put(handlers::set_price))
        .route("/:item_id", get(handlers::get_price))
}

/// Order routes
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route(
            "/:order_id",
            get(handlers::get_order).delete(handlers::delete_order),
        )
}

/// Purchase routes
fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchases).post(handlers::create_purchase),
        )
        .route(
            "/:purchase_id",
            get(handlers::get_purchase).delete(handlers::delete_purchase),
        )
}

/// Booking routes
fn booking_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_bookings).post(handlers::create_booking),
        )
        .route(
            "/:booking_id",
            get(handlers::get_booking)
                .put(handlers::update_booking)
                .delete(handlers::delete_booking),
        )
}

/// Sale routes
fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route(
            "/:sale_id",
            get(handlers::get_sale).delete(handlers::delete_sale),
        )
}

/// Total sale routes
fn total_sale_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_total_sales).post(handlers::create_total_sale),
        )
        .route("/:total_sale_id", get(handlers::get_total_sale))
}

/// Credit note routes
fn credit_note_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_credit_notes).post(handlers::create_credit_note),
        )
        .route("/:credit_note_id", get(handlers::get_credit_note))
        .route(
            "/:credit_note_id/settle",
            post(handlers::settle_credit_note),
        )
}
