use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::{
    AppointmentBookingService, AppointmentStore, InMemoryAppointmentStore, StoreSeed,
    SupabaseAppointmentStore,
};
use payment_cell::models::PaymentSettings;
use payment_cell::services::{PaymentReconciler, RazorpayClient, StripeClient};
use shared_config::AppConfig;

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn AppointmentStore>> {
    if config.is_configured() {
        info!("Using Supabase appointment store at {}", config.supabase_url);
        return Ok(Arc::new(SupabaseAppointmentStore::new(config)));
    }

    warn!("Supabase is not configured, using the in-memory appointment store");
    let store = InMemoryAppointmentStore::new();

    match &config.in_memory_seed_file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read seed file {}", path))?;
            let seed: StoreSeed = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse seed file {}", path))?;
            store.load_seed(seed).await;
        }
        None => warn!(
            "IN_MEMORY_SEED_FILE not set: the in-memory store has no doctors and every booking will fail with DoctorNotFound"
        ),
    }

    Ok(Arc::new(store))
}

fn build_reconciler(config: &AppConfig, store: Arc<dyn AppointmentStore>) -> PaymentReconciler {
    let mut reconciler = PaymentReconciler::new(store, PaymentSettings::from_config(config));

    match RazorpayClient::new(config) {
        Ok(client) => reconciler = reconciler.with_order_gateway(Arc::new(client)),
        Err(e) => warn!("Razorpay disabled: {}", e),
    }

    match StripeClient::new(config) {
        Ok(client) => reconciler = reconciler.with_checkout_gateway(Arc::new(client)),
        Err(e) => warn!("Stripe disabled: {}", e),
    }

    if config.stripe_trust_client_confirmation {
        warn!("Stripe confirmations are trusted without re-fetching the session");
    }

    reconciler
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic booking API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    // Wire the store and both services onto it
    let store = build_store(&config).await?;
    let booking = Arc::new(AppointmentBookingService::new(store.clone()));
    let reconciler = Arc::new(build_reconciler(&config, store));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(config.clone(), booking, reconciler)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .await
        .context("server error")?;

    Ok(())
}
