//! Marquee - video rental storefront core
//!
//! Thin entry point: loads configuration, verifies the startup session
//! against the primary store, and reports entitlement state.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marquee_app::AppState;
use marquee_net::Config;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Marquee");

    let config_path = AppState::config_path();
    let config = Config::load(config_path.as_deref());
    if config.remote_mode() {
        tracing::info!("Primary store configured; running in remote mode");
    } else {
        tracing::info!("No primary store configured; running local-only");
    }

    let state = match AppState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    match state.resolver.initialize_on_startup().await {
        Some(user) => tracing::info!(email = %user.email, "Session verified"),
        None => tracing::info!("No active session"),
    }

    if let Err(e) = state.rentals.load_for_current_user().await {
        tracing::error!("Failed to load rentals: {}", e);
        std::process::exit(1);
    }

    tracing::info!(
        active_rentals = state.rentals.active_count(),
        "Rental library loaded"
    );
}
