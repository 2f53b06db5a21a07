use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::booking_flow::BookingFlow;
use crate::services::repository::{AppointmentRepository, SqliteAppointmentRepository};

/// An open booking wizard and when it was last used.
#[derive(Debug, Clone)]
pub struct BookingSession {
    pub flow: BookingFlow,
    pub last_touched: Instant,
}

impl BookingSession {
    pub fn new(flow: BookingFlow) -> Self {
        Self {
            flow,
            last_touched: Instant::now(),
        }
    }
}

pub type Sessions = HashMap<String, BookingSession>;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub appointments: Arc<dyn AppointmentRepository>,
    /// In-progress booking sessions by session id.
    pub flows: Mutex<Sessions>,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        let db = Arc::new(Mutex::new(conn));
        Self {
            appointments: Arc::new(SqliteAppointmentRepository::new(Arc::clone(&db))),
            db,
            config,
            flows: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> anyhow::Result<MutexGuard<'_, Sessions>> {
        self.flows
            .lock()
            .map_err(|_| anyhow::anyhow!("booking sessions lock poisoned"))
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.config.session_ttl_minutes * 60)
    }
}

/// Drops sessions idle for `ttl` or longer. Returns how many were dropped.
pub fn evict_idle_sessions(sessions: &mut Sessions, ttl: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| s.last_touched.elapsed() < ttl);
    before - sessions.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_only_idle_sessions() {
        let mut sessions = Sessions::new();
        sessions.insert("fresh".to_string(), BookingSession::new(BookingFlow::new()));

        let mut stale = BookingSession::new(BookingFlow::new());
        stale.last_touched = Instant::now()
            .checked_sub(Duration::from_secs(120))
            .unwrap();
        sessions.insert("stale".to_string(), stale);

        assert_eq!(evict_idle_sessions(&mut sessions, Duration::from_secs(60)), 1);
        assert!(sessions.contains_key("fresh"));
        assert!(!sessions.contains_key("stale"));
    }

    #[test]
    fn test_zero_ttl_evicts_everything() {
        let mut sessions = Sessions::new();
        sessions.insert("a".to_string(), BookingSession::new(BookingFlow::new()));
        assert_eq!(evict_idle_sessions(&mut sessions, Duration::ZERO), 1);
        assert!(sessions.is_empty());
    }
}
