//! Purchase records read from the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment status of a purchase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Succeeded,
    Failed,
    Refunded,
}

impl PurchaseStatus {
    /// Completed and succeeded purchases are the only ones that count as a
    /// buying signal.
    pub fn is_qualifying(&self) -> bool {
        matches!(self, PurchaseStatus::Completed | PurchaseStatus::Succeeded)
    }

    /// Parse a catalog status column. Unknown values map to `Pending`.
    pub fn from_db(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" => PurchaseStatus::Completed,
            "succeeded" => PurchaseStatus::Succeeded,
            "failed" => PurchaseStatus::Failed,
            "refunded" => PurchaseStatus::Refunded,
            _ => PurchaseStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseRecord {
    pub buyer_id: Uuid,
    pub resource_id: Uuid,
    pub status: PurchaseStatus,
    pub purchased_at: DateTime<Utc>,
}
