use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// One opening window of the weekly schedule, in the salon's local time
///
/// `close <= open` denotes a window that runs past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub weekday: Weekday,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

/// Salon fields the queue engine reads
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Salon {
    pub id: Uuid,
    pub name: String,
    /// Online/offline toggle controlled by the owner
    pub is_active: bool,
    /// Average service time in minutes; `None` falls back to the engine default
    pub avg_service_time: Option<i32>,
    pub max_queue_size: Option<i32>,
    pub accepts_walkins: bool,
    /// Fixed offset of the salon's local time from UTC
    pub utc_offset_minutes: i32,
    pub business_hours: Json<Vec<BusinessHours>>,
    pub created_at: DateTime<Utc>,
}

impl Salon {
    /// An open, walk-in friendly salon with no schedule restrictions
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_active: true,
            avg_service_time: None,
            max_queue_size: None,
            accepts_walkins: true,
            utc_offset_minutes: 0,
            business_hours: Json(Vec::new()),
            created_at: Utc::now(),
        }
    }

    pub fn with_avg_service_time(mut self, minutes: i32) -> Self {
        self.avg_service_time = Some(minutes);
        self
    }

    pub fn with_max_queue_size(mut self, size: i32) -> Self {
        self.max_queue_size = Some(size);
        self
    }

    pub fn with_business_hours(mut self, hours: Vec<BusinessHours>) -> Self {
        self.business_hours = Json(hours);
        self
    }
}

/// Registered customer; only the risk counter matters to the engine
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub cancellation_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.into(),
            phone: None,
            cancellation_count: 0,
            created_at: Utc::now(),
        }
    }
}
