use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::rate_limit::RateLimiter;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub booking_limiter: RateLimiter,
}

impl AppState {
    pub fn new(conn: Connection, config: &AppConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            booking_limiter: RateLimiter::new(config.booking_rate_limit, Duration::from_secs(60)),
        }
    }

    /// Exclusive access to the database. Reservations rely on this lock
    /// being held from the conflict check through the insert.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database lock poisoned")))
    }
}
