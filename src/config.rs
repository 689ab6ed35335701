// Runtime configuration read from the environment (after `.env` is loaded)

use std::env;
use std::str::FromStr;

use chrono::Duration;

use crate::bookings::QueueSettings;
use crate::queue::{DEFAULT_AVG_SERVICE_MINUTES, DEFAULT_EVENT_CHANNEL_CAPACITY};

/// Where bookings and queue entries live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(format!("Unknown STORE_BACKEND: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub arrival_grace_minutes: i64,
    pub default_avg_service_minutes: i32,
    pub max_write_attempts: u32,
    pub event_channel_capacity: usize,
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let store_backend = match env::var("STORE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StoreBackend::Postgres,
        };
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err("DATABASE_URL must be set when STORE_BACKEND=postgres".to_string());
        }

        Ok(Self {
            database_url,
            store_backend,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed("PORT", 8080),
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 5),
            arrival_grace_minutes: parsed("ARRIVAL_GRACE_MINUTES", 10),
            default_avg_service_minutes: parsed("DEFAULT_AVG_SERVICE_MINUTES", DEFAULT_AVG_SERVICE_MINUTES),
            max_write_attempts: parsed("MAX_WRITE_ATTEMPTS", 3u32).max(1),
            event_channel_capacity: parsed("EVENT_CHANNEL_CAPACITY", DEFAULT_EVENT_CHANNEL_CAPACITY),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            arrival_grace: Duration::minutes(self.arrival_grace_minutes),
            default_avg_service_minutes: self.default_avg_service_minutes,
            max_write_attempts: self.max_write_attempts,
        }
    }
}
