//! Session registry data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One live session as reported by the registry and stored in snapshots
///
/// Timestamps serialize as RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineInfo {
    pub uuid: Uuid,
    pub username: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    /// Last heartbeat
    pub updated_at: DateTime<Utc>,
}
