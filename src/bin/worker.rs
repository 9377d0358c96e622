// src/bin/worker.rs

use quiz_backend::config::Config;
use quiz_backend::db;
use quiz_backend::logging;
use quiz_backend::services::grading::run_worker;
use quiz_backend::services::queue::RedisQueue;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let _guard = logging::init(&config.rust_log, "worker.log");

    let Some(broker_url) = config.broker_url.clone() else {
        tracing::error!("BROKER_URL must be set to run the grading worker");
        std::process::exit(1);
    };
    let results_url = config
        .result_backend_url
        .clone()
        .unwrap_or_else(|| broker_url.clone());

    let pool = db::connect(&config.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database after 5 retries: {}", e));

    // The web process owns migrations, but a worker started first still needs the schema.
    db::migrate(&pool)
        .await
        .expect("Failed to run database migrations");

    let broker = RedisQueue::connect(&broker_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to broker: {}", e));
    let results = RedisQueue::connect(&results_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to result backend: {}", e));

    tokio::select! {
        _ = run_worker(pool.clone(), broker, results) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Worker shutting down");
        }
    }

    pool.close().await;
}
