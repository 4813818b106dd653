//! Dead-letter storage for notifications that could not be routed.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::ports::{NotificationDlq, RepositoryResult, UnroutedNotification};

#[derive(Clone)]
pub struct PostgresNotificationDlq {
    pool: PgPool,
}

impl PostgresNotificationDlq {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationDlq for PostgresNotificationDlq {
    async fn push(&self, entry: &UnroutedNotification) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_dlq (
                id, order_id, transaction_status, fraud_status, payment_type,
                gross_amount, error_reason, payload, received_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.order_id)
        .bind(&entry.transaction_status)
        .bind(&entry.fraud_status)
        .bind(&entry.payment_type)
        .bind(&entry.gross_amount)
        .bind(&entry.error_reason)
        .bind(&entry.payload)
        .bind(entry.received_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, limit: i64) -> RepositoryResult<Vec<UnroutedNotification>> {
        let rows = sqlx::query_as::<_, DlqRow>(
            r#"
            SELECT id, order_id, transaction_status, fraud_status, payment_type,
                   gross_amount, error_reason, payload, received_at
            FROM notification_dlq
            ORDER BY received_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DlqRow::into_domain).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DlqRow {
    id: uuid::Uuid,
    order_id: String,
    transaction_status: String,
    fraud_status: Option<String>,
    payment_type: Option<String>,
    gross_amount: String,
    error_reason: String,
    payload: serde_json::Value,
    received_at: chrono::DateTime<chrono::Utc>,
}

impl DlqRow {
    fn into_domain(self) -> UnroutedNotification {
        UnroutedNotification {
            id: self.id,
            order_id: self.order_id,
            transaction_status: self.transaction_status,
            fraud_status: self.fraud_status,
            payment_type: self.payment_type,
            gross_amount: self.gross_amount,
            error_reason: self.error_reason,
            payload: self.payload,
            received_at: self.received_at,
        }
    }
}
