// src/state.rs

use std::sync::Arc;

use crate::{config::Config, services::grading::EssayGrader};
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    /// Chosen once at startup: inline or queued essay grading.
    pub grader: Arc<dyn EssayGrader>,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn EssayGrader> {
    fn from_ref(state: &AppState) -> Self {
        state.grader.clone()
    }
}
