use std::env;

use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub migrations_dir: String,
    pub admin_token: String,
    pub business_name: String,
    /// The single business timezone, as a fixed offset from UTC.
    pub business_utc_offset_minutes: i32,
    /// Booking sessions untouched for this long are dropped.
    pub session_ttl_minutes: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "salonbook.db".to_string()),
            migrations_dir: env::var("MIGRATIONS_DIR").unwrap_or_else(|_| "migrations".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            business_name: env::var("BUSINESS_NAME").unwrap_or_else(|_| "Salon".to_string()),
            business_utc_offset_minutes: env::var("BUSINESS_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|m: &i32| m.abs() < 24 * 60)
                .unwrap_or(0),
            session_ttl_minutes: env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Wall-clock time at the business.
    pub fn business_now(&self) -> NaiveDateTime {
        let offset = FixedOffset::east_opt(self.business_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());
        Utc::now().with_timezone(&offset).naive_local()
    }
}
