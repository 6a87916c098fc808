//! API Models
//!
//! Response bodies of the relay's HTTP surface, documented with `utoipa`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A snapshot of the relay's health.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct RelayStatus {
    /// Number of currently registered connections.
    #[schema(example = 2)]
    pub connections: usize,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
}
