//! Ports consumed by the transaction services.
//! Adapters for Postgres, Redis and Midtrans live in `crate::adapters` and `crate::midtrans`.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{StatusChange, StatusUpdate, Transaction, TransactionKind};

// --- Transaction store ---

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction>;

    /// Kind of the stored transaction, `None` when no row exists.
    async fn find_kind(&self, id: Uuid) -> RepositoryResult<Option<TransactionKind>>;

    /// Applies `update` to the row `(id, kind)` in one atomic step.
    ///
    /// The status only moves forward in rank. Re-asserting the current status
    /// may fill a missing payment method and otherwise changes nothing.
    /// Returns `NotFound` when no row matches both `id` and `kind`.
    async fn apply_status(
        &self,
        id: Uuid,
        kind: TransactionKind,
        update: &StatusUpdate,
    ) -> RepositoryResult<StatusChange>;
}

/// Notification that could not be matched to a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnroutedNotification {
    pub id: Uuid,
    pub order_id: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub payment_type: Option<String>,
    pub gross_amount: String,
    pub error_reason: String,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationDlq: Send + Sync {
    async fn push(&self, entry: &UnroutedNotification) -> RepositoryResult<()>;

    async fn list(&self, limit: i64) -> RepositoryResult<Vec<UnroutedNotification>>;
}

// --- Cart / catalog collaborator ---

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("catalog lookup failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Priced snapshot of a cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartTotal {
    pub item_count: i64,
    pub total: BigDecimal,
}

#[async_trait]
pub trait PriceCatalog: Send + Sync {
    /// Total of the cart `cart_id` owned by `user_id`.
    async fn cart_total(&self, user_id: Uuid, cart_id: Uuid) -> Result<CartTotal, CatalogError>;

    async fn event_unit_price(&self, event_price_id: Uuid) -> Result<BigDecimal, CatalogError>;
}

// --- Payment gateway ---

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("gateway returned an empty checkout session")]
    EmptyResponse,

    #[error("amount not accepted by the gateway: {0}")]
    InvalidAmount(String),

    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub order_id: Uuid,
    pub gross_amount: BigDecimal,
    pub customer: Option<CustomerDetails>,
}

/// Hosted checkout session issued by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub token: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &SessionRequest) -> Result<CheckoutSession, GatewayError>;
}

// --- Key/value cache ---

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("invalid cache entry: {0}")]
    InvalidEntry(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Short-lived `transaction id -> kind` hints used to route notifications.
#[async_trait]
pub trait RoutingMarkers: Send + Sync {
    async fn put(&self, id: Uuid, kind: TransactionKind, ttl: Duration) -> Result<(), CacheError>;

    async fn get(&self, id: Uuid) -> Result<Option<TransactionKind>, CacheError>;
}

/// Gateway session whose transaction row was never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DanglingSession {
    pub order_id: Uuid,
    pub kind: TransactionKind,
    pub checkout_url: String,
    pub gross_amount: String,
    pub error: String,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait DanglingSessions: Send + Sync {
    async fn record(&self, session: &DanglingSession) -> Result<(), CacheError>;

    async fn list(&self) -> Result<Vec<DanglingSession>, CacheError>;
}
