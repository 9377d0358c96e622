// src/services/queue.rs

use redis::aio::ConnectionManager;
use redis::{Client, RedisError, cmd};

/// Redis list holding submission ids waiting for essay grading.
pub const ESSAY_QUEUE_KEY: &str = "quiz:essay_grading";

/// How long task statuses stay in the result backend.
const RESULT_TTL_SECS: u64 = 24 * 60 * 60;

pub fn result_key(submission_id: i64) -> String {
    format!("{}:result:{}", ESSAY_QUEUE_KEY, submission_id)
}

/// Thin client over a Redis connection, used both as the task broker and as
/// the result backend.
#[derive(Clone)]
pub struct RedisQueue {
    manager: ConnectionManager,
}

impl RedisQueue {
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        let queue = Self { manager };
        queue.ping().await?;
        Ok(queue)
    }

    pub async fn ping(&self) -> Result<(), RedisError> {
        let mut manager = self.manager.clone();
        cmd("PING").query_async::<_, String>(&mut manager).await?;
        Ok(())
    }

    pub async fn push(&self, key: &str, submission_id: i64) -> Result<(), RedisError> {
        let mut manager = self.manager.clone();
        cmd("LPUSH")
            .arg(key)
            .arg(submission_id)
            .query_async::<_, i64>(&mut manager)
            .await?;
        Ok(())
    }

    /// Blocks up to `timeout_secs` for the next id. `None` on timeout.
    pub async fn pop(&self, key: &str, timeout_secs: u64) -> Result<Option<i64>, RedisError> {
        let mut manager = self.manager.clone();
        let reply = cmd("BRPOP")
            .arg(key)
            .arg(timeout_secs)
            .query_async::<_, Option<(String, i64)>>(&mut manager)
            .await?;
        Ok(reply.map(|(_, id)| id))
    }

    pub async fn store_result(&self, submission_id: i64, status: &str) -> Result<(), RedisError> {
        let mut manager = self.manager.clone();
        cmd("SET")
            .arg(result_key(submission_id))
            .arg(status)
            .arg("EX")
            .arg(RESULT_TTL_SECS)
            .query_async::<_, ()>(&mut manager)
            .await
    }
}
