//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    state::{IndexPath, TimerConfig, TimerId, TimerState},
    sync::SyncRole,
};

/// API response structure for state change endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerState,
}

impl ApiResponse {
    pub fn new(status: String, message: String, timer: TimerState) -> Self {
        Self {
            status,
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    pub fn ok(message: String, timer: TimerState) -> Self {
        Self::new("ok".to_string(), message, timer)
    }

    /// The request was understood but did not change anything
    pub fn unchanged(message: String, timer: TimerState) -> Self {
        Self::new("unchanged".to_string(), message, timer)
    }
}

/// Returned by structural endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerResponse {
    pub status: String,
    pub timer_id: TimerId,
    pub groups: usize,
    pub timers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub timer: TimerState,
    pub role: SyncRole,
    pub groups: usize,
    pub timers: usize,
    pub peer_reachable: Option<bool>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTimerRequest {
    pub section: usize,
    pub item: usize,
    #[serde(default)]
    pub config: TimerConfig,
}

impl CreateTimerRequest {
    pub fn index_path(&self) -> IndexPath {
        IndexPath::new(self.section, self.item)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveTimerRequest {
    pub from: IndexPath,
    pub to: IndexPath,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandRequest {
    pub value: Option<String>,
}
