// src/main.rs

use quiz_backend::config::Config;
use quiz_backend::services::grading::grader_from_config;
use quiz_backend::state::AppState;
use quiz_backend::{db, logging, routes};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize Tracing (Logging)
    let _guard = logging::init(&config.rust_log, "app.log");

    // Initialize Database Pool with Retry
    let pool = db::connect(&config.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database after 5 retries: {}", e));

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    db::migrate(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Seed Admin User
    if let Err(e) = db::seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    if let Err(e) = tokio::fs::create_dir_all(&config.cert_folder).await {
        tracing::warn!(folder = %config.cert_folder.display(), error = %e, "Could not create certificate folder");
    }

    let grader = grader_from_config(&config, pool.clone()).await;
    tracing::info!(mode = grader.mode(), "Essay grader ready");

    // Create AppState
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        grader,
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listening address");

    // Start the server
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    pool.close().await;
    tracing::info!("Shut down cleanly");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
