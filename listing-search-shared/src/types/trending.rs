//! Trending score types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Score breakdown for a single listing, as computed by the trending engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrendingScore {
    pub resource_id: Uuid,
    /// Engagement before decay.
    pub raw_score: f64,
    pub purchase_count: u64,
    pub view_count: u64,
    /// Whole days since upload, never below one.
    pub age_days: i64,
    /// Final decayed score.
    pub score: f64,
}

/// A ranked entry of the trending list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingResult {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    pub price_cents: u64,
    pub score: f64,
    /// 1-based rank, 1 being the highest score.
    pub rank: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_name: Option<String>,
}
