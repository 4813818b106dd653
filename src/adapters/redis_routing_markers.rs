use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::TransactionKind;
use crate::ports::{CacheError, DanglingSession, DanglingSessions, RoutingMarkers};

const ROUTING_PREFIX: &str = "transaction-";
const DANGLING_PREFIX: &str = "dangling-session-";
const DANGLING_INDEX: &str = "dangling-sessions";
const DANGLING_SESSION_TTL: u64 = 7 * 86400; // 7 days in seconds

/// Redis-backed routing markers and dangling session log.
///
/// Holds one multiplexed connection opened at start-up; clones share it.
#[derive(Clone)]
pub struct RedisRoutingMarkers {
    conn: MultiplexedConnection,
}

impl RedisRoutingMarkers {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    /// Shared connection, for health checks.
    pub fn connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    pub fn routing_key(id: Uuid) -> String {
        format!("{}{}", ROUTING_PREFIX, id)
    }

    fn dangling_key(id: &str) -> String {
        format!("{}{}", DANGLING_PREFIX, id)
    }
}

#[async_trait]
impl RoutingMarkers for RedisRoutingMarkers {
    async fn put(&self, id: Uuid, kind: TransactionKind, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // Redis rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(Self::routing_key(id), kind.as_str(), seconds).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TransactionKind>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(Self::routing_key(id)).await?;

        value
            .map(|v| {
                v.parse::<TransactionKind>()
                    .map_err(|e| CacheError::InvalidEntry(format!("{}: {}", Self::routing_key(id), e)))
            })
            .transpose()
    }
}

#[async_trait]
impl DanglingSessions for RedisRoutingMarkers {
    async fn record(&self, session: &DanglingSession) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let id = session.order_id.to_string();
        let serialized = serde_json::to_string(session)?;

        let _: () = conn
            .set_ex(Self::dangling_key(&id), serialized, DANGLING_SESSION_TTL)
            .await?;
        let _: () = conn.sadd(DANGLING_INDEX, &id).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DanglingSession>, CacheError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(DANGLING_INDEX).await?;

        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            let value: Option<String> = conn.get(Self::dangling_key(&id)).await?;
            match value {
                Some(value) => sessions.push(serde_json::from_str(&value)?),
                None => {
                    // Entry expired, drop it from the index.
                    let _: () = conn.srem(DANGLING_INDEX, &id).await?;
                }
            }
        }

        sessions.sort_by_key(|s: &DanglingSession| s.recorded_at);
        Ok(sessions)
    }
}
