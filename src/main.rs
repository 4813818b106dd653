use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use checkout_core::adapters::{
    PostgresNotificationDlq, PostgresPriceCatalog, PostgresTransactionRepository,
    RedisRoutingMarkers,
};
use checkout_core::cli::{
    self, Cli, Commands, DbCommands, DlqCommands, SessionCommands, TxCommands,
};
use checkout_core::config::{Config, LogFormat};
use checkout_core::health::{GatewayChecker, HealthChecker, PostgresChecker, RedisChecker};
use checkout_core::middleware::{JwtVerifier, RequestLogSettings};
use checkout_core::midtrans::{MidtransClient, SignatureVerifier};
use checkout_core::services::{TransactionCreator, WebhookReconciler};
use checkout_core::{create_app, db, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => {
            let pool = db::create_pool(&config).await?;
            db::run_migrations(&pool).await?;
            println!("Database migrations completed");
            Ok(())
        }
        Commands::Config => {
            cli::handle_config_validate(&config)?;
            let pool = db::create_pool(&config).await?;
            let report = startup::validate_environment(&config, &pool).await;
            report.print();
            if !report.is_valid() {
                anyhow::bail!("Configuration validation failed");
            }
            Ok(())
        }
        Commands::Tx(TxCommands::Show { tx_id }) => {
            let pool = db::create_pool(&config).await?;
            let repository = PostgresTransactionRepository::new(pool);
            cli::handle_tx_show(&repository, tx_id).await
        }
        Commands::Tx(TxCommands::Reconcile { tx_id, status }) => {
            let pool = db::create_pool(&config).await?;
            let repository = PostgresTransactionRepository::new(pool);
            cli::handle_tx_reconcile(&repository, tx_id, status).await?;
            Ok(())
        }
        Commands::Dlq(DlqCommands::List { limit }) => {
            let pool = db::create_pool(&config).await?;
            let dlq = PostgresNotificationDlq::new(pool);
            cli::handle_dlq_list(&dlq, limit).await?;
            Ok(())
        }
        Commands::Sessions(SessionCommands::Dangling) => {
            let sessions = RedisRoutingMarkers::connect(&config.redis_url).await?;
            cli::handle_sessions_dangling(&sessions).await?;
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let start_time = Instant::now();

    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let redis = RedisRoutingMarkers::connect(&config.redis_url).await?;
    tracing::info!("Redis connection established");

    let midtrans = Arc::new(MidtransClient::new(
        config.midtrans_snap_url.clone(),
        config.midtrans_server_key.clone(),
    ));
    tracing::info!(base_url = %config.midtrans_snap_url, "Midtrans client initialized");

    startup::validate_environment(&config, &pool).await.log();

    let transactions = Arc::new(PostgresTransactionRepository::new(pool.clone()));
    let markers = Arc::new(redis.clone());

    let creator = TransactionCreator::new(
        transactions.clone(),
        Arc::new(PostgresPriceCatalog::new(pool.clone())),
        midtrans.clone(),
        markers.clone(),
        markers.clone(),
    )
    .with_marker_ttl(config.routing_marker_ttl());

    let verifier = config
        .midtrans_verify_signature
        .then(|| SignatureVerifier::new(config.midtrans_server_key.clone()));
    let reconciler = WebhookReconciler::new(
        transactions.clone(),
        markers,
        Arc::new(PostgresNotificationDlq::new(pool.clone())),
        verifier,
    );

    let health = HealthChecker::new(start_time)
        .with_dependency("postgres", true, PostgresChecker::new(pool.clone()))
        .with_dependency("redis", false, RedisChecker::new(redis.connection()))
        .with_dependency("midtrans", false, GatewayChecker::new(midtrans));

    let state = AppState {
        creator: Arc::new(creator),
        reconciler: Arc::new(reconciler),
        transactions,
        jwt: Arc::new(JwtVerifier::new(config.jwt_secret.clone())),
        health: Arc::new(health),
        request_log: RequestLogSettings {
            log_body: config.log_request_body,
        },
    };

    let app = create_app(state, config.request_timeout());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
