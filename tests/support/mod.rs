#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use checkout_core::domain::{
    PaymentNotification, StatusChange, StatusUpdate, Transaction, TransactionKind, Transition,
};
use checkout_core::health::HealthChecker;
use checkout_core::middleware::{JwtVerifier, RequestLogSettings};
use checkout_core::midtrans::{signature, SignatureVerifier};
use checkout_core::ports::{
    CacheError, CartTotal, CatalogError, CheckoutSession, DanglingSession, DanglingSessions,
    GatewayError, NotificationDlq, PaymentGateway, PriceCatalog, RepositoryError,
    RepositoryResult, RoutingMarkers, SessionRequest, TransactionRepository,
    UnroutedNotification,
};
use checkout_core::services::{TransactionCreator, WebhookReconciler};
use checkout_core::{create_app, AppState};

pub const SERVER_KEY: &str = "SB-Mid-server-test-key";
pub const JWT_SECRET: &str = "test-jwt-secret";

pub fn amount(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

// --- Transaction store ---

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    rows: RwLock<HashMap<Uuid, Transaction>>,
    fail_writes: AtomicBool,
    insert_delay: std::sync::Mutex<Option<Duration>>,
}

impl InMemoryTransactionRepository {
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn delay_inserts(&self, delay: Duration) {
        *self.insert_delay.lock().unwrap() = Some(delay);
    }

    pub async fn seed(&self, tx: Transaction) {
        self.rows.write().await.insert(tx.id, tx);
    }

    pub async fn get(&self, id: Uuid) -> Option<Transaction> {
        self.rows.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    fn check_writable(&self) -> RepositoryResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_writable()?;
        self.rows.write().await.insert(tx.id, tx.clone());
        Ok(tx.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.get(id)
            .await
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn find_kind(&self, id: Uuid) -> RepositoryResult<Option<TransactionKind>> {
        Ok(self.get(id).await.map(|tx| tx.kind()))
    }

    async fn apply_status(
        &self,
        id: Uuid,
        kind: TransactionKind,
        update: &StatusUpdate,
    ) -> RepositoryResult<StatusChange> {
        self.check_writable()?;

        // Single write lock mirrors the atomic conditional UPDATE.
        let mut rows = self.rows.write().await;
        let tx = rows
            .get_mut(&id)
            .filter(|tx| tx.kind() == kind)
            .ok_or_else(|| RepositoryError::NotFound(format!("{kind} transaction {id}")))?;

        match tx.status.transition_to(update.status) {
            Transition::Advance => {
                tx.status = update.status;
                if update.payment_method.is_some() {
                    tx.payment_method = update.payment_method.clone();
                }
                tx.updated_at = chrono::Utc::now();
                Ok(StatusChange::Applied(tx.clone()))
            }
            Transition::Replay if tx.payment_method.is_none() && update.payment_method.is_some() => {
                tx.payment_method = update.payment_method.clone();
                tx.updated_at = chrono::Utc::now();
                Ok(StatusChange::Applied(tx.clone()))
            }
            Transition::Replay => Ok(StatusChange::Unchanged(tx.clone())),
            Transition::Regress => Ok(StatusChange::Stale(tx.clone())),
        }
    }
}

// --- Catalog ---

#[derive(Default)]
pub struct StaticPriceCatalog {
    carts: HashMap<Uuid, (Uuid, CartTotal)>,
    event_prices: HashMap<Uuid, BigDecimal>,
}

impl StaticPriceCatalog {
    pub fn with_cart(mut self, user_id: Uuid, cart_id: Uuid, item_count: i64, total: &str) -> Self {
        self.carts.insert(
            cart_id,
            (
                user_id,
                CartTotal {
                    item_count,
                    total: amount(total),
                },
            ),
        );
        self
    }

    pub fn with_event_price(mut self, event_price_id: Uuid, price: &str) -> Self {
        self.event_prices.insert(event_price_id, amount(price));
        self
    }
}

#[async_trait]
impl PriceCatalog for StaticPriceCatalog {
    async fn cart_total(&self, user_id: Uuid, cart_id: Uuid) -> Result<CartTotal, CatalogError> {
        match self.carts.get(&cart_id) {
            Some((owner, total)) if *owner == user_id => Ok(total.clone()),
            _ => Err(CatalogError::NotFound(format!("cart {}", cart_id))),
        }
    }

    async fn event_unit_price(&self, event_price_id: Uuid) -> Result<BigDecimal, CatalogError> {
        self.event_prices
            .get(&event_price_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("event price {}", event_price_id)))
    }
}

// --- Gateway ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Ok,
    Empty,
    Fail,
}

pub struct FakeGateway {
    mode: std::sync::Mutex<GatewayMode>,
    calls: AtomicUsize,
    requests: RwLock<Vec<SessionRequest>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            mode: std::sync::Mutex::new(GatewayMode::Ok),
            calls: AtomicUsize::new(0),
            requests: RwLock::new(Vec::new()),
        }
    }
}

impl FakeGateway {
    pub fn set_mode(&self, mode: GatewayMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn last_request(&self) -> Option<SessionRequest> {
        self.requests.read().await.last().cloned()
    }

    pub fn redirect_url(order_id: Uuid) -> String {
        format!("https://app.sandbox.midtrans.com/snap/v4/redirection/{}", order_id)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<CheckoutSession, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(request.clone());

        let mode = *self.mode.lock().unwrap();
        match mode {
            GatewayMode::Ok => Ok(CheckoutSession {
                token: format!("snap-token-{}", request.order_id),
                redirect_url: Self::redirect_url(request.order_id),
            }),
            GatewayMode::Empty => Err(GatewayError::EmptyResponse),
            GatewayMode::Fail => Err(GatewayError::Rejected {
                status: 500,
                message: "internal error".to_string(),
            }),
        }
    }
}

// --- Cache ---

#[derive(Default)]
pub struct InMemoryCache {
    markers: RwLock<HashMap<Uuid, (TransactionKind, Duration)>>,
    sessions: RwLock<Vec<DanglingSession>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryCache {
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Simulates TTL expiry.
    pub async fn expire(&self, id: Uuid) {
        self.markers.write().await.remove(&id);
    }

    pub async fn marker(&self, id: Uuid) -> Option<(TransactionKind, Duration)> {
        self.markers.read().await.get(&id).copied()
    }

    pub async fn marker_count(&self) -> usize {
        self.markers.read().await.len()
    }

    pub async fn sessions(&self) -> Vec<DanglingSession> {
        self.sessions.read().await.clone()
    }

    fn unavailable() -> CacheError {
        CacheError::InvalidEntry("cache unavailable".to_string())
    }
}

#[async_trait]
impl RoutingMarkers for InMemoryCache {
    async fn put(&self, id: Uuid, kind: TransactionKind, ttl: Duration) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.markers.write().await.insert(id, (kind, ttl));
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TransactionKind>, CacheError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.markers.read().await.get(&id).map(|(kind, _)| *kind))
    }
}

#[async_trait]
impl DanglingSessions for InMemoryCache {
    async fn record(&self, session: &DanglingSession) -> Result<(), CacheError> {
        self.sessions.write().await.push(session.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DanglingSession>, CacheError> {
        Ok(self.sessions().await)
    }
}

// --- DLQ ---

#[derive(Default)]
pub struct InMemoryDlq {
    entries: RwLock<Vec<UnroutedNotification>>,
}

impl InMemoryDlq {
    pub async fn entries(&self) -> Vec<UnroutedNotification> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl NotificationDlq for InMemoryDlq {
    async fn push(&self, entry: &UnroutedNotification) -> RepositoryResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn list(&self, limit: i64) -> RepositoryResult<Vec<UnroutedNotification>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit.max(0) as usize).cloned().collect())
    }
}

// --- Notifications ---

/// Builds a notification signed with [`SERVER_KEY`].
pub fn notification(
    order_id: &str,
    transaction_status: &str,
    fraud_status: Option<&str>,
    payment_type: Option<&str>,
    gross_amount: &str,
) -> PaymentNotification {
    let status_code = match transaction_status {
        "capture" | "settlement" => "200",
        "pending" => "201",
        _ => "202",
    };

    PaymentNotification {
        order_id: order_id.to_string(),
        transaction_status: transaction_status.to_string(),
        fraud_status: fraud_status.map(str::to_string),
        payment_type: payment_type.map(str::to_string),
        gross_amount: gross_amount.to_string(),
        status_code: Some(status_code.to_string()),
        signature_key: Some(signature::sign(order_id, status_code, gross_amount, SERVER_KEY)),
        transaction_id: Some(Uuid::new_v4().to_string()),
        transaction_time: Some("2024-03-01 10:00:00".to_string()),
        settlement_time: None,
        status_message: Some("midtrans payment notification".to_string()),
        merchant_id: Some("G000000000".to_string()),
        currency: Some("IDR".to_string()),
    }
}

// --- Wiring ---

pub struct TestContext {
    pub user_id: Uuid,
    pub cart_id: Uuid,
    pub empty_cart_id: Uuid,
    pub fractional_cart_id: Uuid,
    pub event_price_id: Uuid,
    pub repository: Arc<InMemoryTransactionRepository>,
    pub gateway: Arc<FakeGateway>,
    pub cache: Arc<InMemoryCache>,
    pub dlq: Arc<InMemoryDlq>,
    pub creator: Arc<TransactionCreator>,
    pub reconciler: Arc<WebhookReconciler>,
}

impl TestContext {
    /// One user owning a two-item cart worth 150000, an empty cart and a
    /// cart totalling 37501.50; one event price `E1` at 50000.
    pub fn new() -> Self {
        let user_id = Uuid::new_v4();
        let cart_id = Uuid::new_v4();
        let empty_cart_id = Uuid::new_v4();
        let fractional_cart_id = Uuid::new_v4();
        let event_price_id = Uuid::new_v4();

        let catalog = StaticPriceCatalog::default()
            .with_cart(user_id, cart_id, 2, "150000.00")
            .with_cart(user_id, empty_cart_id, 0, "0")
            .with_cart(user_id, fractional_cart_id, 3, "37501.50")
            .with_event_price(event_price_id, "50000.00");

        let repository = Arc::new(InMemoryTransactionRepository::default());
        let gateway = Arc::new(FakeGateway::default());
        let cache = Arc::new(InMemoryCache::default());
        let dlq = Arc::new(InMemoryDlq::default());

        let creator = TransactionCreator::new(
            repository.clone(),
            Arc::new(catalog),
            gateway.clone(),
            cache.clone(),
            cache.clone(),
        );
        let reconciler = WebhookReconciler::new(
            repository.clone(),
            cache.clone(),
            dlq.clone(),
            Some(SignatureVerifier::new(SERVER_KEY)),
        );

        Self {
            user_id,
            cart_id,
            empty_cart_id,
            fractional_cart_id,
            event_price_id,
            repository,
            gateway,
            cache,
            dlq,
            creator: Arc::new(creator),
            reconciler: Arc::new(reconciler),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            creator: self.creator.clone(),
            reconciler: self.reconciler.clone(),
            transactions: self.repository.clone(),
            jwt: Arc::new(JwtVerifier::new(JWT_SECRET)),
            health: Arc::new(HealthChecker::new(Instant::now())),
            request_log: RequestLogSettings { log_body: true },
        }
    }

    pub fn app(&self) -> Router {
        self.app_with_timeout(Duration::from_secs(5))
    }

    pub fn app_with_timeout(&self, request_timeout: Duration) -> Router {
        create_app(self.state(), request_timeout)
    }

    pub fn token(&self) -> String {
        token_for(self.user_id)
    }
}

pub fn token_for(user_id: Uuid) -> String {
    JwtVerifier::new(JWT_SECRET).issue(user_id, 3600).unwrap()
}
