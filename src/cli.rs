use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{StatusChange, StatusUpdate, TransactionStatus};
use crate::ports::{DanglingSessions, NotificationDlq, TransactionRepository};

#[derive(Parser)]
#[command(name = "checkout-core")]
#[command(about = "Checkout Core - transaction creation and Midtrans payment reconciliation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transaction inspection and manual reconciliation
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Unroutable notifications
    #[command(subcommand)]
    Dlq(DlqCommands),

    /// Gateway sessions whose transaction was never stored
    #[command(subcommand)]
    Sessions(SessionCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Print a transaction
    Show {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },

    /// Apply a status as if the gateway had reported it
    Reconcile {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,

        /// pending, challenge, paid, rejected or canceled
        #[arg(value_name = "STATUS")]
        status: TransactionStatus,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum DlqCommands {
    /// List the most recent unroutable notifications
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List dangling checkout sessions
    Dangling,
}

pub async fn handle_tx_show(repository: &dyn TransactionRepository, tx_id: Uuid) -> anyhow::Result<()> {
    let tx = repository.get_by_id(tx_id).await?;

    println!("Transaction {}", tx.id);
    println!("  Kind:           {}", tx.kind());
    println!("  User:           {}", tx.user_id);
    println!("  Status:         {}", tx.status);
    println!("  Total:          {}", tx.total_amount);
    println!(
        "  Payment method: {}",
        tx.payment_method.as_deref().unwrap_or("-")
    );
    println!("  Checkout URL:   {}", tx.checkout_url);
    println!("  Created:        {}", tx.created_at.to_rfc3339());
    println!("  Updated:        {}", tx.updated_at.to_rfc3339());

    Ok(())
}

/// Runs a status through the same monotonic guard as gateway notifications.
pub async fn handle_tx_reconcile(
    repository: &dyn TransactionRepository,
    tx_id: Uuid,
    status: TransactionStatus,
) -> anyhow::Result<StatusChange> {
    let kind = repository
        .find_kind(tx_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Transaction {} not found", tx_id))?;

    let update = StatusUpdate {
        status,
        payment_method: None,
    };
    let change = repository.apply_status(tx_id, kind, &update).await?;

    match &change {
        StatusChange::Applied(tx) => {
            tracing::info!(order_id = %tx_id, status = %tx.status, "Manual reconciliation applied");
            println!("Transaction {} is now {}", tx_id, tx.status);
        }
        StatusChange::Unchanged(tx) => {
            println!("Transaction {} is already {}", tx_id, tx.status);
        }
        StatusChange::Stale(tx) => {
            tracing::warn!(order_id = %tx_id, current = %tx.status, requested = %status, "Manual reconciliation refused");
            println!(
                "Transaction {} is {}; refusing to move it back to {}",
                tx_id, tx.status, status
            );
        }
    }

    Ok(change)
}

pub async fn handle_dlq_list(dlq: &dyn NotificationDlq, limit: i64) -> anyhow::Result<usize> {
    let entries = dlq.list(limit).await?;

    if entries.is_empty() {
        println!("No unroutable notifications");
        return Ok(0);
    }

    println!(
        "{:<38} {:<14} {:<16} {:<20} Reason",
        "Order", "Status", "Amount", "Received"
    );
    println!("{}", "-".repeat(110));
    for entry in &entries {
        println!(
            "{:<38} {:<14} {:<16} {:<20} {}",
            entry.order_id,
            entry.transaction_status,
            entry.gross_amount,
            entry.received_at.format("%Y-%m-%d %H:%M:%S"),
            entry.error_reason
        );
    }

    Ok(entries.len())
}

pub async fn handle_sessions_dangling(sessions: &dyn DanglingSessions) -> anyhow::Result<usize> {
    let entries = sessions.list().await?;

    if entries.is_empty() {
        println!("No dangling sessions");
        return Ok(0);
    }

    for entry in &entries {
        println!(
            "{} [{}] {} {} ({})",
            entry.order_id,
            entry.kind,
            entry.gross_amount,
            entry.checkout_url,
            entry.error
        );
    }

    Ok(entries.len())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Redis URL: {}", mask_password(&config.redis_url));
    println!("  Midtrans Snap URL: {}", config.midtrans_snap_url);
    println!("  Signature Verification: {}", config.midtrans_verify_signature);
    println!("  Routing Marker TTL: {}s", config.routing_marker_ttl_secs);

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
