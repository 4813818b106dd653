//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    BuyerInfo, PurchaseSubject, StatusChange, StatusUpdate, Transaction, TransactionKind,
    TransactionStatus,
};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const TRANSACTION_COLUMNS: &str = "id, kind, user_id, cart_id, event_price_id, quantity, \
    buyer_identity_number, buyer_full_name, buyer_email, buyer_phone, total_amount, status, \
    payment_method, checkout_url, gateway_token, created_at, updated_at";

/// SQL expression ranking the stored `status` column with `TransactionStatus::rank`.
fn status_rank_sql() -> String {
    let arms: String = TransactionStatus::ALL
        .iter()
        .map(|status| format!(" WHEN '{}' THEN {}", status.as_str(), status.rank()))
        .collect();
    format!("(CASE status{arms} END)")
}

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: Uuid, kind: Option<TransactionKind>) -> RepositoryResult<Option<Transaction>> {
        let row = match kind {
            Some(kind) => {
                sqlx::query_as::<_, TransactionRow>(&format!(
                    "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 AND kind = $2"
                ))
                .bind(id)
                .bind(kind.as_str())
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, TransactionRow>(&format!(
                    "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
                ))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(TransactionRow::into_domain).transpose()
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let (cart_id, event_price_id, quantity, buyer) = match &tx.subject {
            PurchaseSubject::Cart { cart_id } => (Some(*cart_id), None, None, None),
            PurchaseSubject::EventTicket {
                event_price_id,
                quantity,
                buyer,
            } => (None, Some(*event_price_id), Some(*quantity), Some(buyer)),
        };

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                id, kind, user_id, cart_id, event_price_id, quantity,
                buyer_identity_number, buyer_full_name, buyer_email, buyer_phone,
                total_amount, status, payment_method, checkout_url, gateway_token,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(tx.id)
        .bind(tx.kind().as_str())
        .bind(tx.user_id)
        .bind(cart_id)
        .bind(event_price_id)
        .bind(quantity)
        .bind(buyer.map(|b| b.identity_number.as_str()))
        .bind(buyer.map(|b| b.full_name.as_str()))
        .bind(buyer.map(|b| b.email.as_str()))
        .bind(buyer.map(|b| b.phone.as_str()))
        .bind(&tx.total_amount)
        .bind(tx.status.as_str())
        .bind(&tx.payment_method)
        .bind(&tx.checkout_url)
        .bind(&tx.gateway_token)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.fetch(id, None)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn find_kind(&self, id: Uuid) -> RepositoryResult<Option<TransactionKind>> {
        let kind: Option<String> = sqlx::query_scalar("SELECT kind FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        kind.map(|k| {
            k.parse::<TransactionKind>()
                .map_err(|e| RepositoryError::Corrupt(format!("transaction {id}: {e}")))
        })
        .transpose()
    }

    async fn apply_status(
        &self,
        id: Uuid,
        kind: TransactionKind,
        update: &StatusUpdate,
    ) -> RepositoryResult<StatusChange> {
        let status_rank = status_rank_sql();
        let updated = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET status = $3,
                payment_method = COALESCE($4, payment_method),
                updated_at = NOW()
            WHERE id = $1 AND kind = $2
              AND (
                {status_rank} < $5
                OR (status = $3 AND payment_method IS NULL AND $4 IS NOT NULL)
              )
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(kind.as_str())
        .bind(update.status.as_str())
        .bind(&update.payment_method)
        .bind(update.status.rank())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(StatusChange::Applied(row.into_domain()?));
        }

        let current = self
            .fetch(id, Some(kind))
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("{kind} transaction {id}")))?;

        if current.status == update.status {
            Ok(StatusChange::Unchanged(current))
        } else {
            Ok(StatusChange::Stale(current))
        }
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    kind: String,
    user_id: Uuid,
    cart_id: Option<Uuid>,
    event_price_id: Option<Uuid>,
    quantity: Option<i32>,
    buyer_identity_number: Option<String>,
    buyer_full_name: Option<String>,
    buyer_email: Option<String>,
    buyer_phone: Option<String>,
    total_amount: bigdecimal::BigDecimal,
    status: String,
    payment_method: Option<String>,
    checkout_url: String,
    gateway_token: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let id = self.id;
        let corrupt = |what: &str| RepositoryError::Corrupt(format!("transaction {id}: {what}"));

        let kind = self
            .kind
            .parse::<TransactionKind>()
            .map_err(|e| corrupt(&e.to_string()))?;
        let status = self
            .status
            .parse::<TransactionStatus>()
            .map_err(|e| corrupt(&e.to_string()))?;

        let subject = match kind {
            TransactionKind::Product => PurchaseSubject::Cart {
                cart_id: self.cart_id.ok_or_else(|| corrupt("missing cart_id"))?,
            },
            TransactionKind::Event => PurchaseSubject::EventTicket {
                event_price_id: self
                    .event_price_id
                    .ok_or_else(|| corrupt("missing event_price_id"))?,
                quantity: self.quantity.ok_or_else(|| corrupt("missing quantity"))?,
                buyer: BuyerInfo {
                    identity_number: self
                        .buyer_identity_number
                        .ok_or_else(|| corrupt("missing buyer identity number"))?,
                    full_name: self
                        .buyer_full_name
                        .ok_or_else(|| corrupt("missing buyer name"))?,
                    email: self.buyer_email.ok_or_else(|| corrupt("missing buyer email"))?,
                    phone: self.buyer_phone.ok_or_else(|| corrupt("missing buyer phone"))?,
                },
            },
        };

        Ok(Transaction {
            id,
            user_id: self.user_id,
            subject,
            total_amount: self.total_amount,
            status,
            payment_method: self.payment_method,
            checkout_url: self.checkout_url,
            gateway_token: self.gateway_token,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
