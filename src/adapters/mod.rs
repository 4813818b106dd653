pub mod postgres_notification_dlq;
pub mod postgres_price_catalog;
pub mod postgres_transaction_repository;
pub mod redis_routing_markers;

pub use postgres_notification_dlq::PostgresNotificationDlq;
pub use postgres_price_catalog::PostgresPriceCatalog;
pub use postgres_transaction_repository::PostgresTransactionRepository;
pub use redis_routing_markers::RedisRoutingMarkers;
