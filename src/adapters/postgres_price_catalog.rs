//! Price lookups against the catalog tables owned by the cart service.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::ports::{CartTotal, CatalogError, PriceCatalog};

#[derive(Clone)]
pub struct PostgresPriceCatalog {
    pool: PgPool,
}

impl PostgresPriceCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceCatalog for PostgresPriceCatalog {
    async fn cart_total(&self, user_id: Uuid, cart_id: Uuid) -> Result<CartTotal, CatalogError> {
        let row: Option<(i64, BigDecimal)> = sqlx::query_as(
            r#"
            SELECT COUNT(ci.product_id), COALESCE(SUM(p.price * ci.quantity), 0)
            FROM carts c
            LEFT JOIN cart_items ci ON ci.cart_id = c.id
            LEFT JOIN products p ON p.id = ci.product_id
            WHERE c.id = $1 AND c.user_id = $2
            GROUP BY c.id
            "#,
        )
        .bind(cart_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let (item_count, total) =
            row.ok_or_else(|| CatalogError::NotFound(format!("cart {cart_id}")))?;

        Ok(CartTotal { item_count, total })
    }

    async fn event_unit_price(&self, event_price_id: Uuid) -> Result<BigDecimal, CatalogError> {
        sqlx::query_scalar::<_, BigDecimal>("SELECT price FROM event_prices WHERE id = $1")
            .bind(event_price_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("event price {event_price_id}")))
    }
}
