use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transient progress notification, one per acknowledged chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub percent_complete: u8,
    pub bytes_sent: u64,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(bytes_sent: u64, total_bytes: u64, timestamp: DateTime<Utc>) -> Self {
        let percent_complete = if total_bytes == 0 {
            100
        } else {
            ((u128::from(bytes_sent) * 100) / u128::from(total_bytes)).min(100) as u8
        };
        Self {
            percent_complete,
            bytes_sent,
            timestamp,
        }
    }
}
