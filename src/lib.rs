pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod midtrans;
pub mod ports;
pub mod services;
pub mod startup;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::health::HealthChecker;
use crate::middleware::{request_logger_middleware, JwtVerifier, RequestLogSettings};
use crate::ports::TransactionRepository;
use crate::services::{TransactionCreator, WebhookReconciler};

#[derive(Clone)]
pub struct AppState {
    pub creator: Arc<TransactionCreator>,
    pub reconciler: Arc<WebhookReconciler>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub jwt: Arc<JwtVerifier>,
    pub health: Arc<HealthChecker>,
    pub request_log: RequestLogSettings,
}

/// Builds the HTTP router.
///
/// `request_timeout` bounds creation and query requests. The notification
/// route has no timeout; its reconciliation always runs to completion.
pub fn create_app(state: AppState, request_timeout: Duration) -> Router {
    let transactions = Router::new()
        .route(
            "/product-transactions",
            post(handlers::product_transactions::create_product_transaction),
        )
        .route(
            "/product-transactions/:id",
            get(handlers::product_transactions::get_product_transaction),
        )
        .route(
            "/event-transactions",
            post(handlers::event_transactions::create_event_transaction),
        )
        .route(
            "/event-transactions/:id",
            get(handlers::event_transactions::get_event_transaction),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/midtrans-notification",
            post(handlers::notification::midtrans_notification),
        )
        .merge(transactions)
        .layer(axum::middleware::from_fn_with_state(
            state.request_log,
            request_logger_middleware,
        ))
        .with_state(state)
}
