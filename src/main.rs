use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tourpay::config::Config;
use tourpay::db::{AppState, create_pool, init_db, queries};
use tourpay::email::{DeliveryMode, EmailService};
use tourpay::handlers;
use tourpay::notifier::{Notifier, spawn_worker};
use tourpay::payments::GatewayClient;

const NOTIFY_DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "tourpay")]
#[command(about = "Payment back end for tour bookings")]
struct Cli {
    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Create admin users for ADMIN_EMAILS that don't exist yet.
fn bootstrap_admins(state: &AppState, emails: &[String]) {
    let mut conn = state
        .db
        .get()
        .expect("Failed to get db connection for bootstrap");

    for email in emails {
        match queries::ensure_admin_user(&mut conn, email) {
            Ok(Some(api_key)) => {
                tracing::info!("============================================");
                tracing::info!("ADMIN USER CREATED");
                tracing::info!("Email: {}", email);
                tracing::info!("API Key: {}", api_key);
                tracing::info!("============================================");
                tracing::info!("SAVE THIS API KEY - IT WILL NOT BE SHOWN AGAIN");
                tracing::info!("============================================");
            }
            Ok(None) => {
                tracing::info!("Admin {} already exists, skipping bootstrap", email);
            }
            Err(e) => {
                tracing::error!("Failed to bootstrap admin {}: {}", email, e);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tourpay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let gateway = config.gateway.as_ref().map(GatewayClient::new);
    if gateway.is_none() {
        tracing::warn!("Gateway credentials not configured, order creation and refunds are disabled");
    }
    if config.webhook_secret.is_none() {
        tracing::warn!("GATEWAY_WEBHOOK_SECRET not set, webhooks will be rejected");
    }

    let email_service = EmailService::new(&config.email);
    match email_service.mode() {
        DeliveryMode::Resend { .. } => tracing::info!("Confirmations sent via Resend"),
        DeliveryMode::Webhook { url } => tracing::info!("Confirmations POSTed to {}", url),
        DeliveryMode::Disabled => tracing::info!("Confirmation delivery disabled (log only)"),
    }

    let (notifier, notice_rx) = Notifier::channel(config.notify_queue_capacity);
    let worker = spawn_worker(notice_rx, email_service);

    let state = AppState {
        db: db_pool,
        gateway,
        webhook_secret: config.webhook_secret.clone(),
        notifier,
    };

    if !config.admin_emails.is_empty() {
        bootstrap_admins(&state, &config.admin_emails);
    }

    let app = handlers::app(state, config.rate_limit).layer(TraceLayer::new_for_http());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    if cli.ephemeral && !config.dev_mode {
        tracing::warn!("--ephemeral ignored: not in dev mode (set TOURPAY_ENV=dev)");
    }
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("tourpay listening on {}", addr);

    // connect_info enables IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    // The router (and its notifier handles) is gone; let queued notices drain
    match tokio::time::timeout(NOTIFY_DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Notification worker ended abnormally: {}", e),
        Err(_) => tracing::warn!("Pending notifications not drained before shutdown"),
    }

    if cleanup_on_exit {
        let db_path = &config.database_path;
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
